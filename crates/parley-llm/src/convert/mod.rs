//! Bidirectional conversion between internal canonical types and wire formats
//!
//! `openai` handles the caller-facing dialect, `backend` the generation
//! backend's tool and tool-choice shapes.

pub mod backend;
pub mod openai;

pub use backend::{ConversionReport, FormatConverter, ToolConversionError, parse_tool_choice};
pub use openai::ChunkBuilder;
