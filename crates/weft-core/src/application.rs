//! The application coordinator: one request in, one response out.
//!
//! Processing a request runs with the session locked:
//!
//! 1. decode the target from the URL
//! 2. serve a buffered response, build a bookmarkable page, or dispatch a
//!    listener on a stored page
//! 3. store the page and produce the response according to the render
//!    strategy
//! 4. map any failure to a redirect or a diagnostic response
//! 5. attach cookie mutations and the session cookie

use std::time::Duration;

use tracing::{debug, error, info, info_span, warn};
use weft_component::{
    BoxError, ModelBound, Page, PathLookup, ResponsePage, Validatable, Widget,
};
use weft_form::{
    CookieValuePersister, FormEnvironment, FormError, FormOutcome, SubmitRequest, ValuePersister,
    format_error, hidden_field_name, on_form_submitted, restore_persisted_values,
};
use weft_model::{
    ApplicationSettings, ComponentId, CookieMutation, ListenerInterface, MessageCatalog,
    PageParameters, PagePath, Parameters, RenderStrategy, RenderingNumber, SessionId,
    VersionNumber, WebRequest, WebResponse,
};
use weft_store::{BufferedResponse, BufferedResponseStore, Session, SessionStore, lock_session};

use crate::auth::{AllowAll, AuthorizationStrategy};
use crate::cycle::{RequestCycle, Requested};
use crate::error::{ErrorKind, Result, WeftError};
use crate::registry::PageRegistry;
use crate::render::{HtmlRenderer, RenderOutcome, Renderer};
use crate::resource::{DirectoryLocator, ResourceLocator};
use crate::url::{self, RequestTarget, bookmarkable_url, buffered_url, page_url};

/// How many hidden-field deferrals one request may follow.
const MAX_DEFERRALS: usize = 1;

/// A listener invocation decoded from a URL.
#[derive(Debug, Clone)]
struct ListenerCall {
    path: PagePath,
    version: Option<VersionNumber>,
    interface: ListenerInterface,
    rendering: Option<RenderingNumber>,
}

/// A submit that handed dispatch over to another listener URL.
#[derive(Debug)]
struct Deferral {
    url: String,
    /// Parameter to drop before dispatching again.
    hidden_field: Option<String>,
}

/// Builder for [`Application`].
pub struct ApplicationBuilder {
    settings: ApplicationSettings,
    registry: PageRegistry,
    renderer: Box<dyn Renderer>,
    authorizer: Box<dyn AuthorizationStrategy>,
    locator: Option<Box<dyn ResourceLocator>>,
    persister: Box<dyn ValuePersister>,
}

impl ApplicationBuilder {
    fn new(settings: ApplicationSettings) -> Self {
        let locator = settings
            .static_root
            .clone()
            .map(|root| Box::new(DirectoryLocator::new(root)) as Box<dyn ResourceLocator>);
        Self {
            settings,
            registry: PageRegistry::new(),
            renderer: Box::new(HtmlRenderer),
            authorizer: Box::new(AllowAll),
            locator,
            persister: Box::new(CookieValuePersister::default()),
        }
    }

    /// Registers a bookmarkable page class.
    #[must_use]
    pub fn page<F>(mut self, class: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&PageParameters) -> std::result::Result<Page, BoxError> + Send + Sync + 'static,
    {
        self.registry.register(class, factory);
        self
    }

    #[must_use]
    pub fn renderer(mut self, renderer: impl Renderer + 'static) -> Self {
        self.renderer = Box::new(renderer);
        self
    }

    #[must_use]
    pub fn authorization(mut self, strategy: impl AuthorizationStrategy + 'static) -> Self {
        self.authorizer = Box::new(strategy);
        self
    }

    /// Replaces the locator derived from `static_root`.
    #[must_use]
    pub fn resource_locator(mut self, locator: impl ResourceLocator + 'static) -> Self {
        self.locator = Some(Box::new(locator));
        self
    }

    #[must_use]
    pub fn persister(mut self, persister: impl ValuePersister + 'static) -> Self {
        self.persister = Box::new(persister);
        self
    }

    /// Finish the application.
    ///
    /// # Errors
    ///
    /// [`WeftError::UnknownPage`] when the home page or one of the configured
    /// error pages is not registered.
    pub fn build(self) -> Result<Application> {
        let configured = [
            Some(&self.settings.home_page),
            self.settings.page_expired_page.as_ref(),
            self.settings.stale_data_page.as_ref(),
            self.settings.internal_error_page.as_ref(),
        ];
        if let Some(missing) = configured
            .into_iter()
            .flatten()
            .find(|class| !self.registry.contains(class))
        {
            return Err(WeftError::UnknownPage(missing.clone()));
        }
        info!(
            pages = self.registry.len(),
            strategy = self.settings.render_strategy.as_str(),
            "application ready"
        );
        Ok(Application {
            messages: self.settings.message_catalog(),
            sessions: SessionStore::new(self.settings.max_pages_per_map)
                .with_idle_timeout(Duration::from_secs(self.settings.session_timeout_secs))
                .with_max_sessions(self.settings.max_sessions),
            buffers: BufferedResponseStore::new(self.settings.buffer_capacity_per_session),
            settings: self.settings,
            registry: self.registry,
            renderer: self.renderer,
            authorizer: self.authorizer,
            locator: self.locator,
            persister: self.persister,
        })
    }
}

/// A configured weft application.
pub struct Application {
    settings: ApplicationSettings,
    messages: MessageCatalog,
    registry: PageRegistry,
    renderer: Box<dyn Renderer>,
    authorizer: Box<dyn AuthorizationStrategy>,
    locator: Option<Box<dyn ResourceLocator>>,
    persister: Box<dyn ValuePersister>,
    sessions: SessionStore,
    buffers: BufferedResponseStore,
}

impl Application {
    pub fn builder(settings: ApplicationSettings) -> ApplicationBuilder {
        ApplicationBuilder::new(settings)
    }

    pub fn settings(&self) -> &ApplicationSettings {
        &self.settings
    }

    pub fn registry(&self) -> &PageRegistry {
        &self.registry
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Process one request. Never fails: every error becomes a redirect or
    /// a diagnostic response.
    pub fn process(&self, request: &WebRequest) -> WebResponse {
        let target = match url::decode(request) {
            Ok(target) => target,
            Err(err) => return self.diagnostic(&err),
        };
        if let RequestTarget::Static { path } = &target {
            return self
                .serve_static(path)
                .unwrap_or_else(|err| self.diagnostic(&err));
        }

        let requested = request.session_id.clone().or_else(|| {
            request
                .cookies
                .get(&self.settings.session_cookie_name)
                .map(SessionId::new)
        });
        let access = self.sessions.get_or_create(requested.as_ref());
        for evicted in &access.evicted {
            self.buffers.remove_session(evicted);
        }
        let created = access.created;
        let handle = access.handle;
        let mut session = lock_session(&handle);
        let session_id = session.id().clone();
        let span = info_span!(
            "request",
            session = %session_id,
            method = %request.method,
            path = %request.path
        );
        let _entered = span.enter();

        let mut cycle = RequestCycle::new(request, session.take_original_destination());
        let response = match self.respond(&mut session, &mut cycle, request, target) {
            Ok(response) => response,
            Err(err) => self.error_response(&mut session, &mut cycle, &err),
        };
        if let Some(url) = cycle.take_original_destination() {
            session.set_original_destination(url);
        }

        let mut cookies = cycle.take_cookie_mutations();
        if created {
            cookies.push(CookieMutation::Set {
                name: self.settings.session_cookie_name.clone(),
                value: session_id.to_string(),
                max_age: None,
                path: "/".to_string(),
            });
        }
        info!(status = response.status, "request complete");
        response.with_cookies(cookies)
    }

    fn respond(
        &self,
        session: &mut Session,
        cycle: &mut RequestCycle,
        request: &WebRequest,
        target: RequestTarget,
    ) -> Result<WebResponse> {
        match target {
            RequestTarget::Buffered { id, fallback } => {
                if let Some(buffered) = self.buffers.take(session.id(), &id) {
                    debug!(buffer = %id, "serving buffered response");
                    return Ok(WebResponse::bytes(200, buffered.content_type, buffered.body));
                }
                debug!(buffer = %id, "buffered response is gone, handling the page instead");
                self.respond(session, cycle, request, *fallback)
            }
            RequestTarget::Listener {
                path,
                version,
                interface,
                rendering,
            } => {
                let call = ListenerCall {
                    path,
                    version,
                    interface,
                    rendering,
                };
                let parameters = request.parameters();
                self.dispatch(session, cycle, request, &parameters, call, 0)
            }
            RequestTarget::Bookmarkable { class, parameters } => {
                self.bookmarkable(session, cycle, &class, &parameters)
            }
            RequestTarget::Home => self.bookmarkable(
                session,
                cycle,
                &self.settings.home_page,
                &PageParameters::new(),
            ),
            RequestTarget::Static { path } => self.serve_static(&path),
        }
    }

    fn serve_static(&self, path: &str) -> Result<WebResponse> {
        let resource = match &self.locator {
            Some(locator) => locator.locate(path)?,
            None => None,
        };
        let resource = resource.ok_or_else(|| WeftError::ResourceNotFound(path.to_string()))?;
        debug!(path, bytes = resource.bytes.len(), "serving static resource");
        Ok(WebResponse::bytes(200, resource.content_type, resource.bytes))
    }

    fn bookmarkable(
        &self,
        session: &mut Session,
        cycle: &mut RequestCycle,
        class: &str,
        parameters: &PageParameters,
    ) -> Result<WebResponse> {
        if !self.authorizer.is_instantiation_authorized(class) {
            return Err(WeftError::InstantiationRefused(class.to_string()));
        }
        let page = self.registry.create(class, parameters)?;
        debug!(page = class, "created bookmarkable page");
        self.respond_with_page(session, cycle, page, RenderStrategy::DirectRender)
    }

    /// Invoke a listener on a stored page and respond.
    fn dispatch(
        &self,
        session: &mut Session,
        cycle: &mut RequestCycle,
        request: &WebRequest,
        parameters: &Parameters,
        call: ListenerCall,
        deferrals: usize,
    ) -> Result<WebResponse> {
        let ListenerCall {
            path,
            version,
            interface,
            rendering,
        } = call;
        let mut page = session
            .pages
            .checkout(&path.page_only(), version)
            .ok_or_else(|| WeftError::Expired {
                path: path.to_string(),
            })?;
        let key = page.key().cloned().ok_or_else(|| WeftError::Expired {
            path: path.to_string(),
        })?;

        if interface == ListenerInterface::Redirect {
            debug!(page = %key, "rendering stored page");
            return self.respond_with_page(session, cycle, page, RenderStrategy::DirectRender);
        }

        if page.is_stale() {
            let fresh = session
                .pages
                .freshest_page(&key.map)
                .filter(|fresh| !fresh.is_stale())
                .and_then(Page::key)
                .map(page_url);
            warn!(page = %key, fresh = ?fresh, "page data is stale");
            let home = || bookmarkable_url(&self.settings.home_page, &PageParameters::new());
            return Ok(WebResponse::redirect(fresh.unwrap_or_else(home)));
        }
        // A listener URL without a rendering number cannot be checked, so
        // it is treated like one from an earlier rendering.
        if rendering.is_none_or(|rendering| page.is_rendering_stale(rendering)) {
            warn!(
                page = %key,
                rendering = ?rendering,
                current = %page.rendering(),
                "listener URL from an earlier rendering"
            );
            return Err(WeftError::Stale {
                path: path.to_string(),
                current: page_url(&key),
            });
        }

        let Some(component_path) = &path.component else {
            return Err(WeftError::BadRequest(format!(
                "{interface} on {path} needs a component"
            )));
        };
        let component = match page.find(component_path) {
            PathLookup::Found(id) => id,
            PathLookup::NotVisible(_) => {
                return Err(WeftError::NotVisible {
                    path: path.to_string(),
                });
            }
            PathLookup::NotFound => {
                return Err(WeftError::ComponentNotFound {
                    path: path.to_string(),
                });
            }
        };
        if !page.tree.is_enabled_in_hierarchy(component)
            || !self
                .authorizer
                .is_action_authorized(&page, component, interface)
        {
            return Err(WeftError::Unauthorized {
                interface,
                path: path.to_string(),
            });
        }

        session.pages.expire_newer_than(&key);
        page.feedback.clear();
        debug!(page = %key, component = %component_path, %interface, "invoking listener");

        if let Some(deferral) =
            self.invoke(&mut page, component, interface, &path, request, parameters, cycle)?
        {
            if deferrals >= MAX_DEFERRALS {
                return Err(WeftError::BadRequest(format!(
                    "hidden field of {path} defers more than {MAX_DEFERRALS} time(s)"
                )));
            }
            let RequestTarget::Listener {
                path,
                version,
                interface,
                rendering,
            } = url::decode_url(&deferral.url)?
            else {
                return Err(WeftError::BadRequest(format!(
                    "hidden field of {path} does not name a listener"
                )));
            };
            let parameters = match &deferral.hidden_field {
                Some(name) => parameters.without(&[name.as_str()]),
                None => parameters.clone(),
            };
            let call = ListenerCall {
                path,
                version,
                interface,
                rendering,
            };
            return self.dispatch(session, cycle, request, &parameters, call, deferrals + 1);
        }

        page.acknowledge_model_changes();
        let strategy = self.settings.render_strategy;
        match cycle.take_requested() {
            Requested::Current => self.respond_with_page(session, cycle, page, strategy),
            Requested::Redirect(url) => {
                session.pages.put(page);
                Ok(WebResponse::redirect(url))
            }
            Requested::Page(ResponsePage::Bookmarkable { class, parameters }) => {
                session.pages.put(page);
                Ok(WebResponse::redirect(bookmarkable_url(&class, &parameters)))
            }
            Requested::Page(ResponsePage::Instance(next)) => {
                session.pages.put(page);
                self.respond_with_page(session, cycle, *next, strategy)
            }
            Requested::Page(ResponsePage::Existing(existing)) => {
                session.pages.put(page);
                let existing_key = session
                    .pages
                    .get(&existing.page_only(), None)
                    .and_then(Page::key)
                    .ok_or_else(|| WeftError::Expired {
                        path: existing.to_string(),
                    })?;
                Ok(WebResponse::redirect(page_url(existing_key)))
            }
        }
    }

    /// Run the listener itself. Returns a deferral when a form handed the
    /// request over to another URL.
    #[allow(clippy::too_many_arguments)]
    fn invoke(
        &self,
        page: &mut Page,
        component: ComponentId,
        interface: ListenerInterface,
        path: &PagePath,
        request: &WebRequest,
        parameters: &Parameters,
        cycle: &mut RequestCycle,
    ) -> Result<Option<Deferral>> {
        let listener_error = |source: BoxError| WeftError::Listener {
            interface,
            path: path.to_string(),
            source,
        };
        let unsupported = || WeftError::UnsupportedInterface {
            interface,
            path: path.to_string(),
        };

        match interface {
            ListenerInterface::Submit => {
                let form = if page.tree.is_form(component) {
                    component
                } else {
                    page.tree
                        .submitter(component)
                        .and(page.tree.form_of(component))
                        .ok_or_else(unsupported)?
                };
                let submit = SubmitRequest {
                    parameters,
                    content_type: request.content_type.as_deref(),
                    body: &request.raw_body,
                };
                let env = FormEnvironment {
                    persister: self.persister.as_ref(),
                    messages: &self.messages,
                    default_max_upload_size: self.settings.default_max_upload_size,
                };
                match on_form_submitted(page, form, &submit, &env, cycle) {
                    Ok(FormOutcome::Deferred(url)) => {
                        let root = page.tree.root_form(form).unwrap_or(form);
                        return Ok(Some(Deferral {
                            url,
                            hidden_field: hidden_field_name(page, root),
                        }));
                    }
                    Ok(outcome) => debug!(?outcome, "submission handled"),
                    Err(FormError::Handler { source, .. }) => return Err(listener_error(source)),
                    Err(err) => return Err(err.into()),
                }
            }
            ListenerInterface::Click => {
                let handler = page
                    .tree
                    .link(component)
                    .ok_or_else(unsupported)?
                    .on_click
                    .clone();
                if let Some(handler) = handler {
                    handler.call(page, cycle).map_err(listener_error)?;
                }
            }
            ListenerInterface::SelectionChange => {
                let notifies = page.tree.field(component).is_some_and(|field| {
                    matches!(
                        field.widget,
                        Widget::DropDownChoice {
                            notify_selection_change: true,
                            ..
                        }
                    )
                });
                if !notifies {
                    return Err(unsupported());
                }
                let name = page.tree.input_name(component).ok_or_else(unsupported)?;
                let label = page.tree.label_of(component);
                let raw = parameters.get_all(&name).to_vec();
                let field = page.tree.field_mut(component).ok_or_else(unsupported)?;
                field.clear_input();
                field.set_raw_input(raw);
                if let Err(error) = field.validate_input() {
                    field.set_valid(false);
                    debug!(component = %component, key = ?error.key, "selection rejected");
                    page.feedback
                        .error(component, format_error(&self.messages, &label, &error));
                    return Ok(None);
                }
                field.set_valid(true);
                let changed = field.update_model(component)?;
                field.clear_input();
                let handler = field.on_selection_changed.clone();
                if changed {
                    page.tree.mark_changed();
                }
                if let Some(handler) = handler {
                    handler.call(page, cycle).map_err(listener_error)?;
                }
            }
            // Handled before the component is resolved.
            ListenerInterface::Redirect => {}
        }
        Ok(None)
    }

    /// Store `page`, render it and shape the response.
    fn respond_with_page(
        &self,
        session: &mut Session,
        cycle: &mut RequestCycle,
        mut page: Page,
        strategy: RenderStrategy,
    ) -> Result<WebResponse> {
        restore_persisted_values(&mut page, self.persister.as_ref(), cycle.cookie_jar());
        let key = session.pages.put(page);
        if strategy == RenderStrategy::RedirectToRender {
            debug!(page = %key, "redirecting to render");
            return Ok(WebResponse::redirect(page_url(&key)));
        }

        let mut page = session
            .pages
            .checkout(&key.path(), Some(key.version))
            .ok_or_else(|| WeftError::Expired {
                path: key.to_string(),
            })?;
        let outcome = self.renderer.render(&mut page)?;
        session.pages.put(page);

        match outcome {
            RenderOutcome::Rendered(body) => match strategy {
                RenderStrategy::RedirectToBuffer => {
                    let id = self.buffers.put(
                        session.id(),
                        BufferedResponse {
                            content_type: self.renderer.content_type().to_string(),
                            body,
                        },
                    );
                    debug!(page = %key, buffer = %id, "buffered rendering");
                    Ok(WebResponse::redirect(buffered_url(&id, &key)))
                }
                RenderStrategy::DirectRender | RenderStrategy::RedirectToRender => Ok(
                    WebResponse::bytes(200, self.renderer.content_type(), body),
                ),
            },
            RenderOutcome::RedirectTo(url) => {
                debug!(page = %key, %url, "render redirected");
                Ok(WebResponse::redirect(url))
            }
            RenderOutcome::Intercepted(class) => {
                info!(page = %key, intercept = %class, "showing intercept page first");
                cycle.remember_original_destination(page_url(&key));
                Ok(WebResponse::redirect(bookmarkable_url(
                    &class,
                    &PageParameters::new(),
                )))
            }
        }
    }

    /// The single catch point for request errors.
    fn error_response(
        &self,
        session: &mut Session,
        cycle: &mut RequestCycle,
        err: &WeftError,
    ) -> WebResponse {
        match err.kind() {
            ErrorKind::Expired => {
                warn!(error = %err, "page expired");
                match &self.settings.page_expired_page {
                    Some(class) => {
                        WebResponse::redirect(bookmarkable_url(class, &PageParameters::new()))
                    }
                    None => WebResponse::text(err.status(), err.to_string()),
                }
            }
            ErrorKind::Stale => {
                let current = match err {
                    WeftError::Stale { current, .. } => Some(current.clone()),
                    _ => None,
                };
                match (&self.settings.stale_data_page, current) {
                    (Some(class), _) => {
                        WebResponse::redirect(bookmarkable_url(class, &PageParameters::new()))
                    }
                    (None, Some(current)) => WebResponse::redirect(current),
                    (None, None) => WebResponse::text(err.status(), err.to_string()),
                }
            }
            ErrorKind::Unauthorized | ErrorKind::BadRequest | ErrorKind::NotFound => {
                self.diagnostic(err)
            }
            ErrorKind::Internal => {
                error!(error = %err, cause = ?std::error::Error::source(err), "request failed");
                if let Some(class) = self.settings.internal_error_page.clone() {
                    let page = self.registry.create(&class, &PageParameters::new());
                    match page.and_then(|page| {
                        self.respond_with_page(session, cycle, page, RenderStrategy::DirectRender)
                    }) {
                        Ok(mut response) => {
                            if response.status == 200 {
                                response.status = 500;
                            }
                            return response;
                        }
                        Err(inner) => error!(error = %inner, "internal error page failed"),
                    }
                }
                WebResponse::text(500, "internal error")
            }
        }
    }

    /// Plain-text response for an error that has no page to show.
    fn diagnostic(&self, err: &WeftError) -> WebResponse {
        match err.kind() {
            ErrorKind::Internal => error!(error = %err, "request failed"),
            _ => warn!(error = %err, status = err.status(), "request refused"),
        }
        WebResponse::text(err.status(), err.to_string())
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("settings", &self.settings)
            .field("registry", &self.registry)
            .field("sessions", &self.sessions.len())
            .finish_non_exhaustive()
    }
}
