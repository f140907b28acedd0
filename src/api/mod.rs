//! HTTP adapters. Handlers translate between requests and coordinator
//! calls; none of them contain retrieval or indexing logic.

pub mod answer;
pub mod repos;

use axum::http::StatusCode;

use crate::error::Error;

/// Map core errors onto HTTP status codes; the message passes through
/// verbatim.
pub(crate) fn error_response(err: Error) -> (StatusCode, String) {
    let status = match &err {
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::Config(_) => StatusCode::BAD_REQUEST,
        Error::Aborted => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}
