//! Node kinds of the component tree.

use std::sync::Arc;

use weft_model::ComponentId;

use crate::field::FormField;
use crate::handler::Handler;
use crate::model::ModelRef;
use crate::validator::FormValidator;

#[derive(Debug, Clone, Default)]
pub struct FormState {
    pub multipart: bool,
    /// Overrides the application default for multipart uploads.
    pub max_upload_size: Option<u64>,
    pub validators: Vec<Arc<dyn FormValidator>>,
    pub on_submit: Option<Handler>,
    pub on_error: Option<Handler>,
    /// Runs after validation succeeded, before models are updated.
    pub on_validated: Option<Handler>,
    pub(crate) default_button: Option<ComponentId>,
    submitted: bool,
}

impl FormState {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn multipart(mut self) -> Self {
        self.multipart = true;
        self
    }

    #[must_use]
    pub fn with_max_upload_size(mut self, bytes: u64) -> Self {
        self.max_upload_size = Some(bytes);
        self
    }

    #[must_use]
    pub fn with_validator(mut self, validator: impl FormValidator + 'static) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }

    #[must_use]
    pub fn on_submit(mut self, handler: Handler) -> Self {
        self.on_submit = Some(handler);
        self
    }

    #[must_use]
    pub fn on_error(mut self, handler: Handler) -> Self {
        self.on_error = Some(handler);
        self
    }

    #[must_use]
    pub fn on_validated(mut self, handler: Handler) -> Self {
        self.on_validated = Some(handler);
        self
    }

    pub fn default_button(&self) -> Option<ComponentId> {
        self.default_button
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    pub fn set_submitted(&mut self, submitted: bool) {
        self.submitted = submitted;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmitStyle {
    #[default]
    Button,
    /// Browsers submit `name.x`/`name.y` instead of `name`.
    ImageButton,
    /// An anchor that submits its form through the hidden dispatch field.
    SubmitLink,
}

/// A component that submits its form.
#[derive(Debug, Clone)]
pub struct Submitter {
    pub style: SubmitStyle,
    pub label: String,
    /// When false the form is not validated or updated; only `on_submit` runs.
    pub default_processing: bool,
    pub on_submit: Option<Handler>,
}

impl Submitter {
    pub fn button(label: impl Into<String>) -> Self {
        Self {
            style: SubmitStyle::Button,
            label: label.into(),
            default_processing: true,
            on_submit: None,
        }
    }

    #[must_use]
    pub fn with_style(mut self, style: SubmitStyle) -> Self {
        self.style = style;
        self
    }

    #[must_use]
    pub fn skip_default_processing(mut self) -> Self {
        self.default_processing = false;
        self
    }

    #[must_use]
    pub fn on_submit(mut self, handler: Handler) -> Self {
        self.on_submit = Some(handler);
        self
    }
}

#[derive(Debug, Clone)]
pub struct Link {
    pub label: String,
    pub on_click: Option<Handler>,
}

impl Link {
    pub fn new(label: impl Into<String>, on_click: Handler) -> Self {
        Self {
            label: label.into(),
            on_click: Some(on_click),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Label {
    pub text: ModelRef,
}

#[derive(Debug, Clone)]
pub enum ComponentKind {
    Container,
    /// Wraps markup around its children; a form inside a border also owns
    /// the border's other form components.
    Border,
    Label(Label),
    Link(Link),
    Form(Box<FormState>),
    Field(Box<FormField>),
    Submitter(Submitter),
    /// Renders the page's feedback messages.
    FeedbackPanel,
}

impl ComponentKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Container => "container",
            Self::Border => "border",
            Self::Label(_) => "label",
            Self::Link(_) => "link",
            Self::Form(_) => "form",
            Self::Field(_) => "form field",
            Self::Submitter(_) => "submitter",
            Self::FeedbackPanel => "feedback panel",
        }
    }

    pub fn model(&self) -> Option<&ModelRef> {
        match self {
            Self::Label(label) => Some(&label.text),
            Self::Field(field) => Some(&field.model),
            _ => None,
        }
    }
}

impl From<FormState> for ComponentKind {
    fn from(form: FormState) -> Self {
        Self::Form(Box::new(form))
    }
}

impl From<FormField> for ComponentKind {
    fn from(field: FormField) -> Self {
        Self::Field(Box::new(field))
    }
}

impl From<Submitter> for ComponentKind {
    fn from(submitter: Submitter) -> Self {
        Self::Submitter(submitter)
    }
}

impl From<Link> for ComponentKind {
    fn from(link: Link) -> Self {
        Self::Link(link)
    }
}

impl From<Label> for ComponentKind {
    fn from(label: Label) -> Self {
        Self::Label(label)
    }
}
