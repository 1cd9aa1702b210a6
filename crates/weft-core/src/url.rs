//! Encoding and decoding of request targets.
//!
//! Every URL the framework hands out points at the application root and
//! carries its target in the query string:
//!
//! ```text
//! /?component=1.form&interface=submit&rendering=3&version=2   listener
//! /?bookmarkablePage=Register&ref=mail                         bookmarkable page
//! /?buffer=01j...&component=1&interface=redirect&version=2     buffered response
//! /                                                            home page
//! /css/site.css                                                static resource
//! ```

use tracing::debug;
use weft_model::{
    BufferId, ComponentPath, ListenerInterface, PageKey, PageParameters, PagePath, Parameters,
    RenderingNumber, VersionNumber, WebRequest,
};

use crate::error::{Result, WeftError};

pub const COMPONENT_PARAM: &str = "component";
pub const INTERFACE_PARAM: &str = "interface";
pub const RENDERING_PARAM: &str = "rendering";
pub const VERSION_PARAM: &str = "version";
pub const BOOKMARKABLE_PARAM: &str = "bookmarkablePage";
pub const BUFFER_PARAM: &str = "buffer";

const ROOT_PATH: &str = "/";

/// What a request asks the application to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestTarget {
    /// Serve a buffered response; when it is gone, handle `fallback` instead.
    Buffered {
        id: BufferId,
        fallback: Box<RequestTarget>,
    },
    /// Invoke a listener interface on a stored page or one of its components.
    Listener {
        path: PagePath,
        version: Option<VersionNumber>,
        interface: ListenerInterface,
        rendering: Option<RenderingNumber>,
    },
    Bookmarkable {
        class: String,
        parameters: PageParameters,
    },
    /// The bare root URL with no query parameters.
    Home,
    Static { path: String },
}

/// Decode the target of a request. Only the query string is consulted, so
/// posted form fields can never redirect dispatch.
///
/// # Errors
///
/// Returns [`WeftError::BadRequest`] or [`WeftError::Model`] for listener
/// URLs that name an unknown interface or carry malformed numbers and paths.
pub fn decode(request: &WebRequest) -> Result<RequestTarget> {
    decode_parts(&request.path, &request.query)
}

/// Decode a URL string such as the value of a form's hidden dispatch field.
pub fn decode_url(url: &str) -> Result<RequestTarget> {
    let (path, query) = url.split_once('?').unwrap_or((url, ""));
    let path = if path.is_empty() { ROOT_PATH } else { path };
    decode_parts(path, &Parameters::from_query(query))
}

fn decode_parts(path: &str, query: &Parameters) -> Result<RequestTarget> {
    let target = if let Some(buffer) = query.get(BUFFER_PARAM) {
        let fallback = decode_parts(path, &query.without(&[BUFFER_PARAM]))?;
        RequestTarget::Buffered {
            id: BufferId::new(buffer),
            fallback: Box::new(fallback),
        }
    } else if let Some(component) = query.get(COMPONENT_PARAM) {
        decode_listener(component, query)?
    } else if let Some(class) = query.get(BOOKMARKABLE_PARAM) {
        if class.is_empty() {
            return Err(WeftError::BadRequest("empty page class".to_string()));
        }
        RequestTarget::Bookmarkable {
            class: class.to_string(),
            parameters: query.without(&[BOOKMARKABLE_PARAM]),
        }
    } else if path == ROOT_PATH && query.is_empty() {
        RequestTarget::Home
    } else {
        RequestTarget::Static {
            path: path.to_string(),
        }
    };
    debug!(?target, "decoded request target");
    Ok(target)
}

fn decode_listener(component: &str, query: &Parameters) -> Result<RequestTarget> {
    let path: PagePath = component.parse()?;
    let interface = match query.get(INTERFACE_PARAM) {
        Some(name) => name.parse::<ListenerInterface>()?,
        None if path.component.is_none() => ListenerInterface::Redirect,
        None => {
            return Err(WeftError::BadRequest(format!(
                "listener URL for {path} without an interface"
            )));
        }
    };
    let version = query.get(VERSION_PARAM).map(str::parse).transpose()?;
    let rendering = query.get(RENDERING_PARAM).map(str::parse).transpose()?;
    Ok(RequestTarget::Listener {
        path,
        version,
        interface,
        rendering,
    })
}

fn root_url(query: &Parameters) -> String {
    if query.is_empty() {
        ROOT_PATH.to_string()
    } else {
        format!("{ROOT_PATH}?{}", query.to_query())
    }
}

fn listener_query(
    key: &PageKey,
    component: Option<&ComponentPath>,
    interface: ListenerInterface,
    rendering: Option<RenderingNumber>,
) -> Parameters {
    let mut path = key.path();
    path.component = component.cloned();
    let mut query = Parameters::new();
    query.insert(COMPONENT_PARAM, path.to_string());
    query.insert(INTERFACE_PARAM, interface.as_str());
    query.insert(VERSION_PARAM, key.version.to_string());
    if let Some(rendering) = rendering {
        query.insert(RENDERING_PARAM, rendering.to_string());
    }
    query
}

/// URL invoking `interface` on a component of a stored page, bound to the
/// rendering it was produced by.
pub fn listener_url(
    key: &PageKey,
    component: &ComponentPath,
    interface: ListenerInterface,
    rendering: RenderingNumber,
) -> String {
    root_url(&listener_query(
        key,
        Some(component),
        interface,
        Some(rendering),
    ))
}

/// URL that renders a stored page again.
pub fn page_url(key: &PageKey) -> String {
    root_url(&listener_query(
        key,
        None,
        ListenerInterface::Redirect,
        None,
    ))
}

pub fn bookmarkable_url(class: &str, parameters: &PageParameters) -> String {
    let mut query = parameters.without(&[BOOKMARKABLE_PARAM]);
    query.insert(BOOKMARKABLE_PARAM, class);
    root_url(&query)
}

/// URL serving a buffered rendering of `key` once, falling back to a fresh
/// render of the same page.
pub fn buffered_url(id: &BufferId, key: &PageKey) -> String {
    let mut query = listener_query(key, None, ListenerInterface::Redirect, None);
    query.insert(BUFFER_PARAM, id.as_str());
    root_url(&query)
}
