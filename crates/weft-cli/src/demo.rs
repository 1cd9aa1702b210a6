//! The demo application served by `weft serve`.
//!
//! A registration form (nested address form, cross-field password check, a
//! drop-down that notifies on change, a persistent check box), a members
//! area guarded by an intercept page, and the three error pages.

use std::sync::Arc;

use weft_component::{
    BoxError, Choice, EmailValidator, EqualInputValidator, FormField, FormState, Handler, Label,
    Link, Model, ModelRef, Page, PatternValidator, RenderInterrupt, ResponsePage, ROOT,
    SharedList, SharedValue, StringLengthValidator, Submitter, Widget,
};
use weft_core::{Application, Result};
use weft_model::{ApplicationSettings, PageParameters, Value};

pub const HOME: &str = "Home";
pub const REGISTER: &str = "Register";
pub const MEMBERS: &str = "Members";
pub const SIGN_IN: &str = "SignIn";
pub const PAGE_EXPIRED: &str = "PageExpired";
pub const STALE_DATA: &str = "StaleData";
pub const INTERNAL_ERROR: &str = "InternalError";

/// Every page class the demo registers, in menu order.
pub const PAGE_CLASSES: [&str; 7] = [
    HOME,
    REGISTER,
    MEMBERS,
    SIGN_IN,
    PAGE_EXPIRED,
    STALE_DATA,
    INTERNAL_ERROR,
];

type PageResult = std::result::Result<Page, BoxError>;

/// Application-wide state shared by all sessions.
#[derive(Debug, Clone)]
pub struct DemoState {
    pub members: Arc<SharedList>,
    pub signed_in: Arc<SharedValue>,
}

impl DemoState {
    pub fn new() -> Self {
        Self {
            members: SharedList::new(Vec::new()),
            signed_in: SharedValue::new(Some(Value::Bool(false))),
        }
    }

    pub fn is_signed_in(&self) -> bool {
        self.signed_in.get() == Some(Value::Bool(true))
    }
}

impl Default for DemoState {
    fn default() -> Self {
        Self::new()
    }
}

/// Fill in the demo's error pages where `settings` leaves them unset.
pub fn demo_settings(mut settings: ApplicationSettings) -> ApplicationSettings {
    settings
        .page_expired_page
        .get_or_insert_with(|| PAGE_EXPIRED.to_string());
    settings
        .stale_data_page
        .get_or_insert_with(|| STALE_DATA.to_string());
    settings
        .internal_error_page
        .get_or_insert_with(|| INTERNAL_ERROR.to_string());
    settings
}

pub fn demo_application(settings: ApplicationSettings) -> Result<Application> {
    demo_application_with_state(settings, DemoState::new())
}

/// Build the demo over caller-provided state, so tests can observe it.
pub fn demo_application_with_state(
    settings: ApplicationSettings,
    state: DemoState,
) -> Result<Application> {
    let home = state.clone();
    let register = state.clone();
    let members = state.clone();
    let sign_in = state;
    Application::builder(demo_settings(settings))
        .page(HOME, move |_| home_page(&home))
        .page(REGISTER, move |_| register_page(&register))
        .page(MEMBERS, move |_| members_page(&members))
        .page(SIGN_IN, move |_| sign_in_page(&sign_in))
        .page(PAGE_EXPIRED, |_| {
            notice_page(
                PAGE_EXPIRED,
                "Page expired",
                "That page is no longer available.",
            )
        })
        .page(STALE_DATA, |_| {
            notice_page(
                STALE_DATA,
                "Stale data",
                "The data on that page changed since it was shown.",
            )
        })
        .page(INTERNAL_ERROR, |_| {
            notice_page(
                INTERNAL_ERROR,
                "Internal error",
                "Something went wrong while handling the request.",
            )
        })
        .build()
}

fn bookmarkable(class: &str) -> ResponsePage {
    ResponsePage::Bookmarkable {
        class: class.to_string(),
        parameters: PageParameters::new(),
    }
}

fn go_to(class: &'static str) -> Handler {
    Handler::new(move |_, cx| {
        cx.set_response_page(bookmarkable(class));
        Ok(())
    })
}

fn text(text: impl Into<String>) -> Label {
    Label {
        text: ModelRef::local(Value::text(text)),
    }
}

fn home_page(state: &DemoState) -> PageResult {
    let mut page = Page::new(HOME).with_title("weft demo");
    page.tree
        .add(ROOT, "welcome", text("Welcome to the weft demo."))?;
    page.tree.add(
        ROOT,
        "members",
        Label {
            text: ModelRef::shared(Arc::clone(&state.members) as Arc<dyn Model>),
        },
    )?;
    page.tree
        .add(ROOT, "register", Link::new("Register", go_to(REGISTER)))?;
    page.tree
        .add(ROOT, "members_area", Link::new("Members area", go_to(MEMBERS)))?;
    Ok(page)
}

fn register_page(state: &DemoState) -> PageResult {
    let mut page = Page::new(REGISTER).with_title("Register");
    page.tree.add_feedback_panel(ROOT, "feedback")?;
    let form = page.tree.add(ROOT, "form", FormState::new())?;

    let name = page.tree.add(
        form,
        "name",
        FormField::text()
            .with_label("Name")
            .required()
            .with_validator(StringLengthValidator::between(2, 40)),
    )?;
    page.tree.add(
        form,
        "email",
        FormField::text()
            .with_label("E-mail")
            .required()
            .with_validator(EmailValidator),
    )?;
    let password = page.tree.add(
        form,
        "password",
        FormField::new(Widget::PasswordField)
            .with_label("Password")
            .required(),
    )?;
    let confirm = page.tree.add(
        form,
        "confirm",
        FormField::new(Widget::PasswordField)
            .with_label("Confirm password")
            .required(),
    )?;
    page.tree
        .form_mut(form)
        .ok_or("registration form missing")?
        .validators
        .push(Arc::new(EqualInputValidator::new(password, confirm)));

    let address = page.tree.add(form, "address", FormState::new())?;
    page.tree
        .add(address, "street", FormField::text().with_label("Street"))?;
    page.tree.add(
        address,
        "zip",
        FormField::text()
            .with_label("Postal code")
            .with_validator(PatternValidator::new(r"^[0-9]{4,5}$")?),
    )?;
    page.tree.add(
        address,
        "check",
        Submitter::button("Check address").on_submit(Handler::new(|page, _| {
            page.feedback.info(None, "The address looks fine.");
            Ok(())
        })),
    )?;

    let country = page.tree.add(
        form,
        "country",
        FormField::new(Widget::DropDownChoice {
            choices: vec![
                Choice::text("Belgium"),
                Choice::text("Germany"),
                Choice::text("Netherlands"),
            ],
            notify_selection_change: true,
        })
        .with_label("Country"),
    )?;
    let shipping = page.tree.add(form, "shipping", text(""))?;
    page.tree
        .field_mut(country)
        .ok_or("country field missing")?
        .on_selection_changed = Some(Handler::new(move |page, _| {
        let note = match page.tree.field(country).and_then(|field| field.model.get()) {
            Some(value) => format!("Shipping to {}.", value.to_input_string()),
            None => String::new(),
        };
        page.tree
            .set_label_text(shipping, ModelRef::local(Value::text(note)))?;
        Ok(())
    }));

    page.tree.add(
        form,
        "remember",
        FormField::new(Widget::CheckBox)
            .with_label("Remember me")
            .persistent(),
    )?;

    let members = Arc::clone(&state.members);
    let save = page.tree.add(
        form,
        "save",
        Submitter::button("Register").on_submit(Handler::new(move |page, cx| {
            let Some(registered) = page.tree.field(name).and_then(|field| field.model.get())
            else {
                return Err("name missing after validation".into());
            };
            let mut items = members.items();
            items.push(registered);
            members.set(Some(Value::List(items)));
            cx.set_response_page(bookmarkable(HOME));
            Ok(())
        })),
    )?;
    page.tree.add(
        form,
        "cancel",
        Submitter::button("Cancel")
            .skip_default_processing()
            .on_submit(go_to(HOME)),
    )?;
    page.tree.set_default_button(form, save)?;
    Ok(page)
}

fn members_page(state: &DemoState) -> PageResult {
    let guard = state.clone();
    let mut page = Page::new(MEMBERS)
        .with_title("Members")
        .with_before_render(move |_| {
            (!guard.is_signed_in()).then(|| RenderInterrupt::Intercept {
                page_class: SIGN_IN.to_string(),
            })
        });
    page.tree.add(
        ROOT,
        "list",
        Label {
            text: ModelRef::shared(Arc::clone(&state.members) as Arc<dyn Model>),
        },
    )?;
    let signed_in = Arc::clone(&state.signed_in);
    page.tree.add(
        ROOT,
        "sign_out",
        Link::new(
            "Sign out",
            Handler::new(move |_, cx| {
                signed_in.set(Some(Value::Bool(false)));
                cx.set_response_page(bookmarkable(HOME));
                Ok(())
            }),
        ),
    )?;
    Ok(page)
}

fn sign_in_page(state: &DemoState) -> PageResult {
    let mut page = Page::new(SIGN_IN).with_title("Sign in");
    page.tree.add_feedback_panel(ROOT, "feedback")?;
    let form = page.tree.add(ROOT, "form", FormState::new())?;
    page.tree.add(
        form,
        "user",
        FormField::text().with_label("User name").required(),
    )?;
    let signed_in = Arc::clone(&state.signed_in);
    page.tree.add(
        form,
        "sign_in",
        Submitter::button("Sign in").on_submit(Handler::new(move |_, cx| {
            signed_in.set(Some(Value::Bool(true)));
            if !cx.continue_to_original_destination() {
                cx.set_response_page(bookmarkable(MEMBERS));
            }
            Ok(())
        })),
    )?;
    Ok(page)
}

fn notice_page(class: &str, title: &str, message: &str) -> PageResult {
    let mut page = Page::new(class).with_title(title);
    page.tree.add(ROOT, "message", text(message))?;
    page.tree
        .add(ROOT, "home", Link::new("Back to the home page", go_to(HOME)))?;
    Ok(page)
}
