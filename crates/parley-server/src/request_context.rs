use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use http::HeaderValue;
use parley_core::{REQUEST_ID_HEADER, RequestContext};

/// Middleware that pins a correlation id on every request
///
/// A well-formed inbound `x-request-id` is kept; otherwise a fresh id is
/// written into the request headers so handlers see the same value. The id
/// is echoed on the response.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let context = RequestContext::from_headers(request.headers().clone());
    let value = HeaderValue::from_str(&context.request_id).ok();

    if let Some(value) = &value {
        request.headers_mut().insert(REQUEST_ID_HEADER, value.clone());
    }

    let mut response = next.run(request).await;

    if let Some(value) = value {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}
