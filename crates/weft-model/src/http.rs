//! Transport-neutral request and response types.
//!
//! The HTTP edge converts whatever server library it runs on into a
//! [`WebRequest`] and writes back a [`WebResponse`]; nothing below the edge
//! sees the transport.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use percent_encoding::percent_decode_str;

use crate::ModelError;
use crate::ids::SessionId;
use crate::params::{Parameters, encode_component};

/// The only methods accepted at the edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Method {
    #[default]
    Get,
    Post,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            _ => Err(ModelError::UnsupportedMethod(s.to_string())),
        }
    }
}

pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
pub const MULTIPART_FORM_DATA: &str = "multipart/form-data";

#[derive(Debug, Clone, Default)]
pub struct WebRequest {
    pub method: Method,
    /// Path without the query string, always starting with `/`.
    pub path: String,
    pub query: Parameters,
    /// Decoded url-encoded body parameters. Empty for multipart bodies,
    /// which are decoded lazily by the form that asks for them.
    pub body: Parameters,
    pub content_type: Option<String>,
    pub raw_body: Vec<u8>,
    pub cookies: BTreeMap<String, String>,
    pub session_id: Option<SessionId>,
}

impl WebRequest {
    /// Build a GET from a path-and-query string such as `/?component=1.form`.
    pub fn get(url: &str) -> Self {
        let (path, query) = split_url(url);
        Self {
            method: Method::Get,
            path,
            query: Parameters::from_query(query),
            ..Self::default()
        }
    }

    /// Build a url-encoded POST.
    pub fn post(url: &str, body: Parameters) -> Self {
        let raw_body = body.to_query().into_bytes();
        Self {
            method: Method::Post,
            content_type: Some(FORM_URLENCODED.to_string()),
            raw_body,
            body,
            ..Self::get(url)
        }
    }

    #[must_use]
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_session(mut self, session: SessionId) -> Self {
        self.session_id = Some(session);
        self
    }

    #[must_use]
    pub fn with_multipart_body(mut self, boundary: &str, raw_body: Vec<u8>) -> Self {
        self.method = Method::Post;
        self.content_type = Some(format!("{MULTIPART_FORM_DATA}; boundary={boundary}"));
        self.raw_body = raw_body;
        self.body = Parameters::new();
        self
    }

    /// Query and body parameters merged, query values first.
    pub fn parameters(&self) -> Parameters {
        let mut merged = self.query.clone();
        merged.merge(&self.body);
        merged
    }

    pub fn is_multipart(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.trim_start().to_ascii_lowercase().starts_with(MULTIPART_FORM_DATA))
    }

    pub fn multipart_boundary(&self) -> Option<&str> {
        let content_type = self.content_type.as_deref()?;
        content_type.split(';').skip(1).find_map(|part| {
            let (key, value) = part.trim().split_once('=')?;
            key.trim()
                .eq_ignore_ascii_case("boundary")
                .then(|| value.trim().trim_matches('"'))
        })
    }
}

fn split_url(url: &str) -> (String, &str) {
    let (path, query) = url.split_once('?').unwrap_or((url, ""));
    let path = if path.is_empty() { "/" } else { path };
    (path.to_string(), query)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    Empty,
    Bytes { content_type: String, bytes: Vec<u8> },
    Redirect(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub cookies: Vec<CookieMutation>,
    pub body: ResponseBody,
}

impl WebResponse {
    pub fn html(status: u16, html: impl Into<String>) -> Self {
        Self::bytes(status, "text/html; charset=utf-8", html.into().into_bytes())
    }

    pub fn text(status: u16, text: impl Into<String>) -> Self {
        Self::bytes(status, "text/plain; charset=utf-8", text.into().into_bytes())
    }

    pub fn bytes(status: u16, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            cookies: Vec::new(),
            body: ResponseBody::Bytes {
                content_type: content_type.into(),
                bytes,
            },
        }
    }

    pub fn redirect(location: impl Into<String>) -> Self {
        Self {
            status: 302,
            headers: Vec::new(),
            cookies: Vec::new(),
            body: ResponseBody::Redirect(location.into()),
        }
    }

    pub fn redirect_location(&self) -> Option<&str> {
        match &self.body {
            ResponseBody::Redirect(location) => Some(location),
            _ => None,
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        match &self.body {
            ResponseBody::Bytes { content_type, .. } => Some(content_type),
            _ => None,
        }
    }

    pub fn body_bytes(&self) -> &[u8] {
        match &self.body {
            ResponseBody::Bytes { bytes, .. } => bytes,
            _ => &[],
        }
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(self.body_bytes()).into_owned()
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_cookies(mut self, cookies: impl IntoIterator<Item = CookieMutation>) -> Self {
        self.cookies.extend(cookies);
        self
    }
}

/// A cookie change to emit as a `Set-Cookie` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookieMutation {
    Set {
        name: String,
        value: String,
        max_age: Option<u64>,
        path: String,
    },
    Clear {
        name: String,
        path: String,
    },
}

impl CookieMutation {
    pub fn name(&self) -> &str {
        match self {
            Self::Set { name, .. } | Self::Clear { name, .. } => name,
        }
    }

    pub fn to_header_value(&self) -> String {
        match self {
            Self::Set {
                name,
                value,
                max_age,
                path,
            } => {
                let mut header = format!("{name}={}; Path={path}; HttpOnly", encode_component(value));
                if let Some(max_age) = max_age {
                    header.push_str(&format!("; Max-Age={max_age}"));
                }
                header
            }
            Self::Clear { name, path } => format!("{name}=; Path={path}; Max-Age=0"),
        }
    }
}

/// Parse a `Cookie:` request header into name/value pairs.
pub fn parse_cookie_header(header: &str) -> BTreeMap<String, String> {
    header
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            let value = percent_decode_str(value.trim().trim_matches('"'))
                .decode_utf8_lossy()
                .into_owned();
            Some((name.to_string(), value))
        })
        .collect()
}

/// Request cookies overlaid with the mutations made during this cycle.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    request: BTreeMap<String, String>,
    mutations: Vec<CookieMutation>,
}

impl CookieJar {
    pub fn new(request: BTreeMap<String, String>) -> Self {
        Self {
            request,
            mutations: Vec::new(),
        }
    }

    /// Latest visible value: the last mutation wins over the request cookie.
    pub fn get(&self, name: &str) -> Option<&str> {
        for mutation in self.mutations.iter().rev() {
            match mutation {
                CookieMutation::Set { name: n, value, .. } if n == name => {
                    return Some(value);
                }
                CookieMutation::Clear { name: n, .. } if n == name => return None,
                _ => {}
            }
        }
        self.request.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>, max_age: Option<u64>) {
        self.mutations.push(CookieMutation::Set {
            name: name.into(),
            value: value.into(),
            max_age,
            path: "/".to_string(),
        });
    }

    /// Clear a cookie; a no-op when the browser never sent it and nothing set it.
    pub fn clear(&mut self, name: &str) {
        if self.get(name).is_none() {
            return;
        }
        self.mutations.push(CookieMutation::Clear {
            name: name.to_string(),
            path: "/".to_string(),
        });
    }

    pub fn mutations(&self) -> &[CookieMutation] {
        &self.mutations
    }

    pub fn take_mutations(&mut self) -> Vec<CookieMutation> {
        std::mem::take(&mut self.mutations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_get_and_post_parse() {
        assert_eq!("get".parse::<Method>().unwrap(), Method::Get);
        assert_eq!("POST".parse::<Method>().unwrap(), Method::Post);
        assert!("PUT".parse::<Method>().is_err());
        assert!("DELETE".parse::<Method>().is_err());
    }

    #[test]
    fn request_merges_query_before_body() {
        let body: Parameters = [("name", "body")].into_iter().collect();
        let request = WebRequest::post("/app?name=query&x=1", body);
        assert_eq!(request.path, "/app");
        let params = request.parameters();
        assert_eq!(params.get_all("name"), ["query", "body"]);
        assert_eq!(params.get("x"), Some("1"));
    }

    #[test]
    fn multipart_boundary_is_extracted() {
        let request = WebRequest::get("/").with_multipart_body("XyZ", Vec::new());
        assert!(request.is_multipart());
        assert_eq!(request.multipart_boundary(), Some("XyZ"));
        assert!(!WebRequest::get("/").is_multipart());
    }

    #[test]
    fn jar_overlays_mutations_on_request_cookies() {
        let mut jar = CookieJar::new(parse_cookie_header("a=1; b=two%20words"));
        assert_eq!(jar.get("b"), Some("two words"));
        jar.set("a", "2", None);
        assert_eq!(jar.get("a"), Some("2"));
        jar.clear("a");
        assert_eq!(jar.get("a"), None);
        jar.clear("never-sent");
        assert_eq!(jar.mutations().len(), 2);
    }

    #[test]
    fn set_cookie_header_encodes_value() {
        let mutation = CookieMutation::Set {
            name: "k".into(),
            value: "a b".into(),
            max_age: Some(60),
            path: "/".into(),
        };
        assert_eq!(mutation.to_header_value(), "k=a%20b; Path=/; HttpOnly; Max-Age=60");
    }
}
