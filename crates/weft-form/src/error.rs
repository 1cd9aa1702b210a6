use thiserror::Error;
use weft_component::{BoxError, ComponentError};
use weft_model::ComponentId;

/// Failures while decoding a multipart body. These are reported to the user
/// as feedback, never raised.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("upload of {actual} bytes exceeds the limit of {limit} bytes")]
    SizeLimitExceeded { limit: u64, actual: u64 },

    #[error("multipart request without a boundary")]
    MissingBoundary,

    #[error("malformed multipart body: {0}")]
    Malformed(String),
}

/// Fatal form processing errors.
#[derive(Debug, Error)]
pub enum FormError {
    #[error("component {0} is not a form")]
    NotAForm(ComponentId),

    #[error("submitting component {path} was found but is not visible")]
    InvisibleSubmitter { path: String },

    #[error("{hook} handler of {component} failed")]
    Handler {
        hook: &'static str,
        component: String,
        #[source]
        source: BoxError,
    },

    #[error(transparent)]
    Component(#[from] ComponentError),
}

pub type Result<T> = std::result::Result<T, FormError>;
