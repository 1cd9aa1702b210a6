//! Tests for request dispatch through the application coordinator.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use proptest::prelude::*;
use tempfile::TempDir;
use weft_component::{
    FormField, FormState, Handler, Label, Link, Model, ModelRef, Page, RenderInterrupt, ROOT,
    SharedValue, Submitter,
};
use weft_core::{Application, RequestTarget, WeftError, bookmarkable_url, decode_url, listener_url};
use weft_model::{
    ApplicationSettings, ComponentPath, CookieMutation, ListenerInterface, PageId, PageKey,
    PageMapName, PageParameters, Parameters, RenderStrategy, RenderingNumber, SessionId, Value,
    VersionNumber, WebRequest, WebResponse,
};

/// Sends requests within one session, like a browser holding the cookie.
struct Browser<'a> {
    app: &'a Application,
    session: Option<SessionId>,
}

impl<'a> Browser<'a> {
    fn new(app: &'a Application) -> Self {
        Self { app, session: None }
    }

    fn send(&mut self, mut request: WebRequest) -> WebResponse {
        if let Some(session) = &self.session {
            request = request.with_session(session.clone());
        }
        let response = self.app.process(&request);
        let cookie = &self.app.settings().session_cookie_name;
        for mutation in &response.cookies {
            if let CookieMutation::Set { name, value, .. } = mutation
                && name == cookie
            {
                self.session = Some(SessionId::new(value.clone()));
            }
        }
        response
    }

    fn get(&mut self, url: &str) -> WebResponse {
        self.send(WebRequest::get(url))
    }

    fn post(&mut self, url: &str, body: Parameters) -> WebResponse {
        self.send(WebRequest::post(url, body))
    }

    fn session(&self) -> &SessionId {
        self.session.as_ref().expect("no session yet")
    }
}

fn key(id: u32, version: u32) -> PageKey {
    PageKey {
        map: PageMapName::default(),
        id: PageId(id),
        version: VersionNumber(version),
    }
}

fn click_url(page: &PageKey, component: &str, rendering: u64) -> String {
    listener_url(
        page,
        &ComponentPath::parse(component).unwrap(),
        ListenerInterface::Click,
        RenderingNumber(rendering),
    )
}

/// The `action` of the first form in `html`, unescaped.
fn form_action(html: &str) -> String {
    let start = html.find("action=\"").expect("no form action") + "action=\"".len();
    let end = start + html[start..].find('"').unwrap();
    html[start..end].replace("&amp;", "&")
}

fn counting_page(clicks: &Arc<AtomicUsize>) -> Page {
    let mut page = Page::new("Counter");
    let seen = Arc::clone(clicks);
    page.tree
        .add(
            ROOT,
            "next",
            Link::new(
                "Next",
                Handler::new(move |page, _| {
                    seen.fetch_add(1, Ordering::SeqCst);
                    page.tree.mark_changed();
                    Ok(())
                }),
            ),
        )
        .unwrap();
    page
}

fn counter_app(strategy: RenderStrategy) -> (Application, Arc<AtomicUsize>) {
    let clicks = Arc::new(AtomicUsize::new(0));
    let factory_clicks = Arc::clone(&clicks);
    let settings = ApplicationSettings::default()
        .with_home_page("Counter")
        .with_render_strategy(strategy);
    let app = Application::builder(settings)
        .page("Counter", move |_| Ok(counting_page(&factory_clicks)))
        .build()
        .unwrap();
    (app, clicks)
}

#[test]
fn stale_rendering_is_redirected_without_invoking_the_listener() {
    let (app, clicks) = counter_app(RenderStrategy::DirectRender);
    let mut browser = Browser::new(&app);
    assert_eq!(browser.get("/").status, 200);

    // Rendering 1 produced the link; clicking it renders the page again.
    assert_eq!(browser.get(&click_url(&key(0, 1), "next", 1)).status, 200);
    assert_eq!(clicks.load(Ordering::SeqCst), 1);

    // Version 2 is now at rendering 2; a URL from rendering 1 is stale.
    let response = browser.get(&click_url(&key(0, 2), "next", 1));
    assert_eq!(
        response.redirect_location(),
        Some("/?component=0&interface=redirect&version=2")
    );
    assert_eq!(clicks.load(Ordering::SeqCst), 1);
}

#[test]
fn listener_urls_without_a_rendering_number_are_treated_as_stale() {
    let (app, clicks) = counter_app(RenderStrategy::DirectRender);
    let mut browser = Browser::new(&app);
    assert_eq!(browser.get("/").status, 200);

    let response = browser.get("/?component=0.next&interface=click&version=1");
    assert_eq!(
        response.redirect_location(),
        Some("/?component=0&interface=redirect&version=1")
    );
    assert_eq!(clicks.load(Ordering::SeqCst), 0);
}

#[test]
fn stale_rendering_goes_to_the_stale_data_page_when_configured() {
    let settings = ApplicationSettings::default()
        .with_home_page("Counter")
        .with_stale_data_page("Stale")
        .with_render_strategy(RenderStrategy::DirectRender);
    let clicks = Arc::new(AtomicUsize::new(0));
    let factory_clicks = Arc::clone(&clicks);
    let app = Application::builder(settings)
        .page("Counter", move |_| Ok(counting_page(&factory_clicks)))
        .page("Stale", |_| Ok(Page::new("Stale")))
        .build()
        .unwrap();
    let mut browser = Browser::new(&app);
    browser.get("/");

    let response = browser.get(&click_url(&key(0, 1), "next", 7));
    assert_eq!(
        response.redirect_location(),
        Some("/?bookmarkablePage=Stale")
    );
    assert_eq!(clicks.load(Ordering::SeqCst), 0);
}

#[test]
fn changed_shared_model_sends_the_user_home() {
    let shared = SharedValue::new(Some(Value::text("v1")));
    let model = Arc::clone(&shared);
    let settings = ApplicationSettings::default()
        .with_home_page("Home")
        .with_render_strategy(RenderStrategy::DirectRender);
    let app = Application::builder(settings)
        .page("Home", |_| Ok(Page::new("Home")))
        .page("Report", move |_| {
            let mut page = Page::new("Report");
            page.tree.add(
                ROOT,
                "value",
                Label {
                    text: ModelRef::shared(model.clone()),
                },
            )?;
            page.tree
                .add(ROOT, "refresh", Link::new("Refresh", Handler::new(|_, _| Ok(()))))?;
            Ok(page)
        })
        .build()
        .unwrap();
    let mut browser = Browser::new(&app);
    assert!(browser.get("/?bookmarkablePage=Report").body_text().contains("v1"));

    shared.set(Some(Value::text("v2")));
    let response = browser.get(&click_url(&key(0, 1), "refresh", 1));
    assert_eq!(response.redirect_location(), Some("/?bookmarkablePage=Home"));
}

#[test]
fn dispatch_expires_versions_newer_than_the_addressed_one() {
    let (app, clicks) = counter_app(RenderStrategy::DirectRender);
    let mut browser = Browser::new(&app);
    browser.get("/");
    browser.get(&click_url(&key(0, 1), "next", 1));
    browser.get(&click_url(&key(0, 2), "next", 2));
    {
        let handle = app.sessions().get(browser.session()).unwrap();
        let session = weft_store::lock_session(&handle);
        assert!(session.pages.contains(&key(0, 3)));
    }

    // Back button: the user acts on version 2 again.
    assert_eq!(browser.get(&click_url(&key(0, 2), "next", 2)).status, 200);
    assert_eq!(clicks.load(Ordering::SeqCst), 3);

    let handle = app.sessions().get(browser.session()).unwrap();
    let session = weft_store::lock_session(&handle);
    assert!(!session.pages.contains(&key(0, 3)));
    assert!(session.pages.contains(&key(0, 1)));
    assert!(session.pages.contains(&key(0, 2)));
    assert!(session.pages.contains(&key(0, 4)));
}

#[test]
fn buffered_response_is_served_once() {
    let (app, _) = counter_app(RenderStrategy::RedirectToBuffer);
    let mut browser = Browser::new(&app);
    assert_eq!(browser.get("/").status, 200);

    let response = browser.get(&click_url(&key(0, 1), "next", 1));
    let location = response.redirect_location().unwrap().to_string();
    assert!(matches!(
        decode_url(&location).unwrap(),
        RequestTarget::Buffered { .. }
    ));

    let first = browser.get(&location);
    assert_eq!(first.status, 200);
    assert!(first.body_text().contains("rendering=2"));

    // The buffer is gone; the same URL renders the page afresh.
    let second = browser.get(&location);
    assert_eq!(second.status, 200);
    assert!(second.body_text().contains("rendering=3"));
    assert_ne!(first.body_text(), second.body_text());
}

#[test]
fn redirect_to_render_defers_rendering_to_the_follow_up_get() {
    let (app, clicks) = counter_app(RenderStrategy::RedirectToRender);
    let mut browser = Browser::new(&app);
    browser.get("/");

    let response = browser.get(&click_url(&key(0, 1), "next", 1));
    assert_eq!(
        response.redirect_location(),
        Some("/?component=0&interface=redirect&version=2")
    );
    let rendered = browser.get("/?component=0&interface=redirect&version=2");
    assert!(rendered.body_text().contains("rendering=2"));
    assert_eq!(clicks.load(Ordering::SeqCst), 1);
}

#[test]
fn expired_pages() {
    let (app, _) = counter_app(RenderStrategy::DirectRender);
    let mut browser = Browser::new(&app);
    let response = browser.get(&click_url(&key(5, 1), "next", 1));
    assert_eq!(response.status, 410);

    let settings = ApplicationSettings::default()
        .with_home_page("Home")
        .with_page_expired_page("Expired");
    let app = Application::builder(settings)
        .page("Home", |_| Ok(Page::new("Home")))
        .page("Expired", |_| Ok(Page::new("Expired")))
        .build()
        .unwrap();
    let mut browser = Browser::new(&app);
    let response = browser.get(&click_url(&key(5, 1), "next", 1));
    assert_eq!(
        response.redirect_location(),
        Some("/?bookmarkablePage=Expired")
    );
}

#[test]
fn hidden_and_disabled_components_are_refused() {
    let settings = ApplicationSettings::default()
        .with_home_page("Home")
        .with_render_strategy(RenderStrategy::DirectRender);
    let app = Application::builder(settings)
        .page("Home", |_| {
            let mut page = Page::new("Home");
            let hidden = page
                .tree
                .add(ROOT, "hidden", Link::new("Hidden", Handler::new(|_, _| Ok(()))))?;
            let disabled = page
                .tree
                .add(ROOT, "disabled", Link::new("Off", Handler::new(|_, _| Ok(()))))?;
            page.tree.set_visible(hidden, false)?;
            page.tree.set_enabled(disabled, false)?;
            Ok(page)
        })
        .build()
        .unwrap();
    let mut browser = Browser::new(&app);
    browser.get("/");
    assert_eq!(browser.get(&click_url(&key(0, 1), "hidden", 1)).status, 403);
    assert_eq!(browser.get(&click_url(&key(0, 1), "disabled", 1)).status, 403);
    assert_eq!(browser.get(&click_url(&key(0, 1), "missing", 1)).status, 500);
}

#[test]
fn failing_listener_renders_the_internal_error_page() {
    let settings = ApplicationSettings::default()
        .with_home_page("Home")
        .with_internal_error_page("Oops")
        .with_render_strategy(RenderStrategy::DirectRender);
    let app = Application::builder(settings)
        .page("Home", |_| {
            let mut page = Page::new("Home");
            page.tree.add(
                ROOT,
                "boom",
                Link::new("Boom", Handler::new(|_, _| Err("database is down".into()))),
            )?;
            Ok(page)
        })
        .page("Oops", |_| Ok(Page::new("Oops").with_title("Something went wrong")))
        .build()
        .unwrap();
    let mut browser = Browser::new(&app);
    browser.get("/");
    let response = browser.get(&click_url(&key(0, 1), "boom", 1));
    assert_eq!(response.status, 500);
    assert!(response.body_text().contains("Something went wrong"));
}

#[test]
fn unknown_pages_and_interfaces_are_bad_requests() {
    let (app, _) = counter_app(RenderStrategy::DirectRender);
    let mut browser = Browser::new(&app);
    assert_eq!(browser.get("/?bookmarkablePage=Nope").status, 404);
    assert_eq!(
        browser.get("/?component=0.next&interface=toString").status,
        400
    );
}

#[test]
fn build_rejects_unregistered_home_page() {
    let err = Application::builder(ApplicationSettings::default().with_home_page("Missing"))
        .build()
        .unwrap_err();
    assert!(matches!(err, WeftError::UnknownPage(class) if class == "Missing"));
}

#[test]
fn intercept_page_returns_to_the_original_destination() {
    let signed_in = SharedValue::new(None);
    let guard = Arc::clone(&signed_in);
    let sign_in = Arc::clone(&signed_in);
    let settings = ApplicationSettings::default()
        .with_home_page("Account")
        .with_render_strategy(RenderStrategy::DirectRender);
    let app = Application::builder(settings)
        .page("Account", move |_| {
            let guard = Arc::clone(&guard);
            let mut page = Page::new("Account").with_before_render(move |_| {
                (guard.get() != Some(Value::Bool(true))).then(|| RenderInterrupt::Intercept {
                    page_class: "SignIn".to_string(),
                })
            });
            page.tree.add(
                ROOT,
                "balance",
                Label {
                    text: ModelRef::local(Value::text("42 coins")),
                },
            )?;
            Ok(page)
        })
        .page("SignIn", move |_| {
            let sign_in = Arc::clone(&sign_in);
            let mut page = Page::new("SignIn");
            page.tree.add(
                ROOT,
                "go",
                Link::new(
                    "Sign in",
                    Handler::new(move |_, cx| {
                        sign_in.set(Some(Value::Bool(true)));
                        cx.continue_to_original_destination();
                        Ok(())
                    }),
                ),
            )?;
            Ok(page)
        })
        .build()
        .unwrap();
    let mut browser = Browser::new(&app);

    let response = browser.get("/");
    assert_eq!(
        response.redirect_location(),
        Some("/?bookmarkablePage=SignIn")
    );
    assert_eq!(browser.get("/?bookmarkablePage=SignIn").status, 200);

    let response = browser.get(&click_url(&key(1, 1), "go", 1));
    let destination = response.redirect_location().unwrap().to_string();
    assert_eq!(destination, "/?component=0&interface=redirect&version=1");

    let account = browser.get(&destination);
    assert_eq!(account.status, 200);
    assert!(account.body_text().contains("42 coins"));
}

#[test]
fn form_submission_through_the_application() {
    let saved = SharedValue::new(None);
    let model = Arc::clone(&saved);
    let settings = ApplicationSettings::default()
        .with_home_page("Profile")
        .with_render_strategy(RenderStrategy::DirectRender);
    let app = Application::builder(settings)
        .page("Profile", move |_| {
            let mut page = Page::new("Profile");
            page.tree.add_feedback_panel(ROOT, "feedback")?;
            let form = page.tree.add(ROOT, "form", FormState::new())?;
            page.tree.add(
                form,
                "name",
                FormField::text()
                    .with_label("Name")
                    .required()
                    .with_model(ModelRef::shared(model.clone())),
            )?;
            page.tree.add(form, "save", Submitter::button("Save"))?;
            Ok(page)
        })
        .build()
        .unwrap();
    let mut browser = Browser::new(&app);
    let page = browser.get("/");

    let body: Parameters = [("form:name", ""), ("form:save", "Save")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let rejected = browser.post(&form_action(&page.body_text()), body);
    assert_eq!(rejected.status, 200);
    assert!(rejected.body_text().contains("Field 'Name' is required."));
    assert_eq!(saved.get(), None);

    let body: Parameters = [("form:name", "Ada"), ("form:save", "Save")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let accepted = browser.post(&form_action(&rejected.body_text()), body);
    assert_eq!(accepted.status, 200);
    assert!(!accepted.body_text().contains("is required"));
    assert_eq!(saved.get(), Some(Value::text("Ada")));
}

#[test]
fn static_resources_bypass_sessions() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("site.css"), "body { margin: 0 }").unwrap();
    let settings = ApplicationSettings::default()
        .with_home_page("Home")
        .with_static_root(dir.path());
    let app = Application::builder(settings)
        .page("Home", |_| Ok(Page::new("Home")))
        .build()
        .unwrap();

    let response = app.process(&WebRequest::get("/site.css"));
    assert_eq!(response.status, 200);
    assert_eq!(response.content_type(), Some("text/css; charset=utf-8"));
    assert_eq!(response.body_text(), "body { margin: 0 }");
    assert!(response.cookies.is_empty());
    assert_eq!(app.process(&WebRequest::get("/missing.css")).status, 404);
    assert!(app.sessions().is_empty());
}

#[test]
fn bookmarkable_pages_see_their_parameters() {
    let settings = ApplicationSettings::default().with_home_page("Home");
    let app = Application::builder(settings)
        .page("Home", |_| Ok(Page::new("Home")))
        .page("Article", |parameters: &PageParameters| {
            let slug = parameters.get("slug").unwrap_or("none").to_string();
            Ok(Page::new("Article").with_title(format!("Article {slug}")))
        })
        .build()
        .unwrap();
    let mut parameters = PageParameters::new();
    parameters.insert("slug", "hello world");
    let url = bookmarkable_url("Article", &parameters);

    let response = Browser::new(&app).get(&url);
    assert!(response.body_text().contains("<title>Article hello world</title>"));
}

proptest! {
    #[test]
    fn bookmarkable_urls_round_trip(
        class in "[A-Z][A-Za-z0-9]{0,12}",
        entries in proptest::collection::btree_map("p[a-z0-9_]{0,6}", "\\PC{0,12}", 0..5),
    ) {
        let mut parameters = PageParameters::new();
        for (name, value) in &entries {
            parameters.insert(name.as_str(), value.as_str());
        }
        let decoded = decode_url(&bookmarkable_url(&class, &parameters)).unwrap();
        prop_assert_eq!(
            decoded,
            RequestTarget::Bookmarkable { class, parameters }
        );
    }
}

#[test]
fn cookieless_requests_do_not_grow_the_session_table_past_its_limit() {
    let settings = ApplicationSettings::default()
        .with_home_page("Counter")
        .with_max_sessions(3);
    let app = Application::builder(settings)
        .page("Counter", |_| Ok(counting_page(&Arc::new(AtomicUsize::new(0)))))
        .build()
        .unwrap();

    for _ in 0..20 {
        assert_eq!(app.process(&WebRequest::get("/")).status, 200);
    }

    assert_eq!(app.sessions().len(), 3);
}

#[test]
fn only_the_bare_root_url_serves_the_home_page() {
    let settings = ApplicationSettings::default().with_home_page("Home");
    let app = Application::builder(settings)
        .page("Home", |_| Ok(Page::new("Home")))
        .build()
        .unwrap();

    assert_eq!(app.process(&WebRequest::get("/?utm_source=mail")).status, 404);
    assert!(app.sessions().is_empty());
    assert_eq!(app.process(&WebRequest::get("/")).status, 200);
}
