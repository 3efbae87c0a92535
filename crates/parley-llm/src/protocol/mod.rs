//! Wire format types for the two dialects the adapter speaks
//!
//! `openai` is the caller-facing Chat Completions shape; `backend` is the
//! single-shot prompt/tool dialect of the generation backend. These types
//! only exist at the serialization boundary.

pub mod backend;
pub mod openai;
