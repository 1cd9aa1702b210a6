//! Event handlers and the request context they run against.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use weft_model::{CookieJar, PageParameters, PagePath, Parameters};

use crate::page::Page;

pub type BoxError = Box<dyn Error + Send + Sync>;
pub type HandlerResult = Result<(), BoxError>;

/// What the cycle should respond with once the listener has run.
#[derive(Debug, Clone)]
pub enum ResponsePage {
    /// Construct a fresh page from the registry.
    Bookmarkable {
        class: String,
        parameters: PageParameters,
    },
    /// Render this (new) page instance.
    Instance(Box<Page>),
    /// Render an already stored page.
    Existing(PagePath),
}

/// Services available to a handler while a request is being processed.
pub trait RequestContext {
    /// Merged query and body parameters of the current request.
    fn parameters(&self) -> &Parameters;

    fn set_response_page(&mut self, page: ResponsePage);

    /// Respond with a plain redirect instead of a page.
    fn redirect_to(&mut self, url: String);

    /// Redirect to the URL remembered when an intercept page was shown.
    /// Returns false when there is no such URL.
    fn continue_to_original_destination(&mut self) -> bool;

    fn cookies(&mut self) -> &mut CookieJar;
}

type HandlerFn = dyn Fn(&mut Page, &mut dyn RequestContext) -> HandlerResult + Send + Sync;

/// A user callback bound to a component event (submit, click, error, ...).
#[derive(Clone)]
pub struct Handler(Arc<HandlerFn>);

impl Handler {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut Page, &mut dyn RequestContext) -> HandlerResult + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, page: &mut Page, cx: &mut dyn RequestContext) -> HandlerResult {
        (self.0)(page, cx)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Handler(..)")
    }
}
