//! Form submission handling for weft pages.
//!
//! [`on_form_submitted`] drives one submission through input capture,
//! conversion, field and form validation, model update and value
//! persistence. Multipart bodies are decoded here as well.

pub mod error;
pub mod multipart;
pub mod persister;
pub mod submit;

pub use error::{FormError, Result, UploadError};
pub use multipart::{MultipartForm, decode_multipart};
pub use persister::{
    CookieValuePersister, ValuePersister, persistence_key, restore_persisted_values,
};
pub use submit::{
    FormEnvironment, FormOutcome, HIDDEN_FIELD_SUFFIX, SubmitRequest, format_error,
    hidden_field_name, on_form_submitted,
};
