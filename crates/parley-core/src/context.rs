use http::HeaderMap;

/// Header carrying a caller-supplied correlation id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Runtime context for a single completion request
///
/// Created when a request arrives and dropped with its response; nothing
/// in here outlives the request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Correlation id used in logs and response ids
    pub request_id: String,
    /// Inbound request headers
    pub headers: HeaderMap,
}

impl RequestContext {
    /// Build a context from inbound headers
    ///
    /// Reuses a well-formed `x-request-id` header when the caller sends one,
    /// otherwise generates a fresh id.
    pub fn from_headers(headers: HeaderMap) -> Self {
        let request_id = headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty() && id.len() <= 128 && id.chars().all(|c| c.is_ascii_graphic()))
            .map_or_else(new_request_id, ToOwned::to_owned);

        Self { request_id, headers }
    }

    /// Create a minimal context for embedded (non-HTTP) use
    pub fn empty() -> Self {
        Self {
            request_id: new_request_id(),
            headers: HeaderMap::new(),
        }
    }
}

fn new_request_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
