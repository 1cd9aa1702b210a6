//! Shared vocabulary of the weft component framework.
//!
//! Everything here is plain data: identifiers and paths, converted values,
//! request parameters, transport-neutral request/response types, feedback
//! messages and application settings.

pub mod error;
pub mod feedback;
pub mod http;
pub mod ids;
pub mod listener;
pub mod messages;
pub mod options;
pub mod params;
pub mod value;

pub use error::{ModelError, Result};
pub use feedback::{FeedbackLevel, FeedbackMessage, FeedbackMessages};
pub use http::{
    CookieJar, CookieMutation, Method, ResponseBody, WebRequest, WebResponse, parse_cookie_header,
};
pub use ids::{
    BufferId, ComponentId, ComponentPath, DEFAULT_PAGE_MAP, PageId, PageKey, PageMapName,
    PagePath, RenderingNumber, SessionId, VersionNumber,
};
pub use listener::ListenerInterface;
pub use messages::{MessageCatalog, MessageKey};
pub use options::{ApplicationSettings, RenderStrategy};
pub use params::{PageParameters, Parameters};
pub use value::{UploadedFile, Value, ValueType};
