use thiserror::Error;
use weft_component::{BoxError, ComponentError};
use weft_form::FormError;
use weft_model::{ListenerInterface, ModelError};

/// How the request cycle answers an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The addressed page is gone; redirect to the page-expired page.
    Expired,
    /// The addressed page or rendering is out of date.
    Stale,
    /// Not visible, not enabled or not authorized.
    Unauthorized,
    BadRequest,
    NotFound,
    Internal,
}

/// The one error family surfaced by request processing.
#[derive(Debug, Error)]
pub enum WeftError {
    #[error("page {path} has expired")]
    Expired { path: String },

    /// A listener URL from an earlier rendering; `current` re-renders the page.
    #[error("page {path} is stale")]
    Stale { path: String, current: String },

    #[error("component {path} is not visible")]
    NotVisible { path: String },

    #[error("{interface} on {path} is not authorized")]
    Unauthorized {
        interface: ListenerInterface,
        path: String,
    },

    #[error("page class '{0}' may not be instantiated")]
    InstantiationRefused(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unknown page class '{0}'")]
    UnknownPage(String),

    #[error("no static resource at {0}")]
    ResourceNotFound(String),

    #[error("component {path} not found on a live page")]
    ComponentNotFound { path: String },

    #[error("{interface} is not supported by {path}")]
    UnsupportedInterface {
        interface: ListenerInterface,
        path: String,
    },

    #[error("{interface} listener on {path} failed")]
    Listener {
        interface: ListenerInterface,
        path: String,
        #[source]
        source: BoxError,
    },

    #[error("could not construct page '{class}'")]
    PageConstruction {
        class: String,
        #[source]
        source: BoxError,
    },

    #[error("render failed: {0}")]
    Render(String),

    #[error("failed to read static resource {path}")]
    Resource {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Form(#[from] FormError),

    #[error(transparent)]
    Component(#[from] ComponentError),

    #[error(transparent)]
    Model(#[from] ModelError),
}

impl WeftError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Expired { .. } => ErrorKind::Expired,
            Self::Stale { .. } => ErrorKind::Stale,
            Self::NotVisible { .. } | Self::Unauthorized { .. } | Self::InstantiationRefused(_) => {
                ErrorKind::Unauthorized
            }
            Self::BadRequest(_) | Self::Model(_) | Self::UnsupportedInterface { .. } => {
                ErrorKind::BadRequest
            }
            Self::UnknownPage(_) | Self::ResourceNotFound(_) => ErrorKind::NotFound,
            Self::ComponentNotFound { .. }
            | Self::Listener { .. }
            | Self::PageConstruction { .. }
            | Self::Render(_)
            | Self::Resource { .. }
            | Self::Form(_)
            | Self::Component(_) => ErrorKind::Internal,
        }
    }

    /// HTTP status of the diagnostic response for this error.
    pub fn status(&self) -> u16 {
        match self.kind() {
            ErrorKind::Expired => 410,
            ErrorKind::Stale => 409,
            ErrorKind::Unauthorized => 403,
            ErrorKind::BadRequest => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Internal => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, WeftError>;
