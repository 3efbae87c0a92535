//! Shared primitives for the Parley workspace
//!
//! Holds the per-request context and the error-to-HTTP contract used by
//! feature crates so they stay decoupled from axum.

#![allow(clippy::must_use_candidate)]

mod context;
mod error;

pub use context::{REQUEST_ID_HEADER, RequestContext};
pub use error::HttpError;
