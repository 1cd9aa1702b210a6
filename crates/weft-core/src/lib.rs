//! Request processing for weft applications.
//!
//! [`Application::process`] turns a transport-neutral [`WebRequest`] into a
//! [`WebResponse`]: it decodes the target URL, dispatches listener
//! interfaces against stored pages, runs form processing, renders, and
//! applies the configured render strategy.
//!
//! [`WebRequest`]: weft_model::WebRequest
//! [`WebResponse`]: weft_model::WebResponse

pub mod application;
pub mod auth;
pub mod cycle;
pub mod error;
pub mod registry;
pub mod render;
pub mod resource;
pub mod url;

pub use application::{Application, ApplicationBuilder};
pub use auth::{AllowAll, AuthorizationStrategy};
pub use cycle::RequestCycle;
pub use error::{ErrorKind, Result, WeftError};
pub use registry::PageRegistry;
pub use render::{HTML_CONTENT_TYPE, HtmlRenderer, RenderOutcome, Renderer};
pub use resource::{DirectoryLocator, ResourceLocator, StaticResource, content_type_for};
pub use url::{
    RequestTarget, bookmarkable_url, buffered_url, decode, decode_url, listener_url, page_url,
};
