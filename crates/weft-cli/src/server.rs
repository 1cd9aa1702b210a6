//! The HTTP edge: axum requests in, [`WebRequest`]s through the
//! application, [`WebResponse`]s back out.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method as HttpMethod, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use weft_core::Application;
use weft_model::http::FORM_URLENCODED;
use weft_model::{ApplicationSettings, Method, Parameters, ResponseBody, WebRequest, WebResponse, parse_cookie_header};

/// Room for the non-file fields posted next to an upload.
const FORM_FIELD_HEADROOM: u64 = 1024 * 1024;

/// Largest request body read at the edge.
///
/// Uploads within the configured limits have to reach form processing,
/// which reports an oversized file as feedback on the page.
pub fn body_limit(settings: &ApplicationSettings) -> usize {
    let uploads = settings
        .default_max_upload_size
        .saturating_add(FORM_FIELD_HEADROOM);
    usize::try_from(settings.max_request_body_size.max(uploads)).unwrap_or(usize::MAX)
}

/// Every path is handled by the application, so the router is a single
/// fallback.
pub fn router(app: Arc<Application>) -> Router {
    let limit = body_limit(app.settings());
    Router::new()
        .fallback(handle)
        .layer(DefaultBodyLimit::max(limit))
        .with_state(app)
}

/// Bind `addr` and serve until ctrl-c.
pub async fn serve(app: Arc<Application>, addr: SocketAddr) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, router(app))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "cannot install ctrl-c handler");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

async fn handle(
    State(app): State<Arc<Application>>,
    method: HttpMethod,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = match to_web_request(&method, &uri, &headers, body.to_vec()) {
        Ok(request) => request,
        Err(StatusCode::METHOD_NOT_ALLOWED) => {
            return (
                StatusCode::METHOD_NOT_ALLOWED,
                [(header::ALLOW, "GET, POST")],
            )
                .into_response();
        }
        Err(status) => return status.into_response(),
    };
    // Page processing holds the session lock and runs user handlers.
    match tokio::task::spawn_blocking(move || app.process(&request)).await {
        Ok(response) => into_response(response),
        Err(join_error) => {
            error!(error = %join_error, "request processing panicked");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Convert the parts of an HTTP request into a [`WebRequest`].
///
/// Url-encoded bodies are decoded here; multipart bodies are passed through
/// raw for the form that asks for them.
///
/// # Errors
///
/// `405` for methods other than GET and POST, `400` for a url-encoded body
/// that is not UTF-8.
pub fn to_web_request(
    method: &HttpMethod,
    uri: &Uri,
    headers: &HeaderMap,
    body: Vec<u8>,
) -> Result<WebRequest, StatusCode> {
    let method: Method = method
        .as_str()
        .parse()
        .map_err(|_| StatusCode::METHOD_NOT_ALLOWED)?;
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let cookies = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(parse_cookie_header)
        .collect();

    let url_encoded = content_type.as_deref().is_some_and(|content_type| {
        content_type
            .split(';')
            .next()
            .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(FORM_URLENCODED))
    });
    let body_parameters = if method == Method::Post && url_encoded {
        let text = std::str::from_utf8(&body).map_err(|_| StatusCode::BAD_REQUEST)?;
        Parameters::from_query(text)
    } else {
        Parameters::new()
    };

    Ok(WebRequest {
        method,
        path: uri.path().to_string(),
        query: Parameters::from_query(uri.query().unwrap_or_default()),
        body: body_parameters,
        content_type,
        raw_body: body,
        cookies,
        session_id: None,
    })
}

/// Convert a [`WebResponse`] into an axum response, emitting one
/// `Set-Cookie` header per cookie mutation.
pub fn into_response(response: WebResponse) -> Response {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut out = match response.body {
        ResponseBody::Empty => status.into_response(),
        ResponseBody::Bytes {
            content_type,
            bytes,
        } => (status, [(header::CONTENT_TYPE, content_type)], bytes).into_response(),
        ResponseBody::Redirect(location) => {
            (status, [(header::LOCATION, location)]).into_response()
        }
    };

    let headers = out.headers_mut();
    for (name, value) in response.headers {
        match (HeaderName::try_from(name.as_str()), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => warn!(header = %name, "dropping invalid response header"),
        }
    }
    for cookie in &response.cookies {
        match HeaderValue::from_str(&cookie.to_header_value()) {
            Ok(value) => {
                headers.append(header::SET_COOKIE, value);
            }
            Err(_) => warn!(cookie = cookie.name(), "dropping unencodable cookie"),
        }
    }
    out
}
