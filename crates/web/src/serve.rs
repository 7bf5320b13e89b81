use std::net::SocketAddr;

use axum::body::{to_bytes, Body};
use axum::extract::{Request as HttpRequest, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::info;

use crate::app::App;
use crate::error::WebError;
use crate::request::Request;
use crate::response::HttpResponse;
use crate::router::Method;

const BODY_LIMIT: usize = 1 << 20;

/// Expose an application as an axum router. Every request falls through to
/// [`App::dispatch`].
pub fn router(app: App) -> axum::Router {
    axum::Router::new().fallback(handle).with_state(app)
}

async fn handle(State(app): State<App>, request: HttpRequest) -> Response {
    let (parts, body) = request.into_parts();
    let bytes = match to_bytes(body, BODY_LIMIT).await {
        Ok(bytes) => bytes,
        Err(e) => return (StatusCode::PAYLOAD_TOO_LARGE, e.to_string()).into_response(),
    };
    let Some(method) = Method::parse(parts.method.as_str()) else {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    };
    let target = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let content_type = parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let req = Request::from_target(method, target).with_raw_body(bytes.to_vec(), content_type);
    into_response(app.dispatch(req))
}

fn into_response(response: HttpResponse) -> Response {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut builder = Response::builder().status(status);
    if let Some(content_type) = &response.content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type.as_str());
    }
    if let Some(location) = &response.location {
        builder = builder.header(header::LOCATION, location.as_str());
    }
    builder
        .body(Body::from(response.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// Bind the port the application asked for in `listen` (or `port_override`),
/// run its listen callback, then serve until the process stops.
pub async fn serve(app: App, port_override: Option<u16>) -> Result<(), WebError> {
    let port = port_override
        .or_else(|| app.listening_port())
        .ok_or_else(|| WebError::Internal("the application never called listen".into()))?;
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening");
    if let Some(on_listening) = app.take_listen_callback() {
        on_listening();
    }
    axum::serve(listener, router(app)).await?;
    Ok(())
}
