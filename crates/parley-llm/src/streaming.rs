//! Turns a backend fragment stream into delta-bearing frames
//!
//! Fragments are cumulative. Each frame carries only the suffix that is new
//! since the previous frame. Tool calling is buffered: detection and
//! enforcement run once, over the fully accumulated text, right before the
//! terminal frame.

use std::pin::Pin;
use std::sync::Arc;

use futures_util::{Stream, StreamExt, stream};

use crate::backend::FragmentStream;
use crate::error::LlmError;
use crate::tools::ToolCallingPass;
use crate::types::{StreamFrame, ToolChoiceConstraint, ToolDefinition};

/// Stream of frames; faults arrive as a terminal error frame
pub type FrameStream = Pin<Box<dyn Stream<Item = StreamFrame> + Send>>;

/// Everything the backend produced, drained in one go
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Drained {
    /// Final accumulated content
    pub content: String,
    /// Fragments received
    pub fragments: usize,
}

/// Drain a fragment stream to completion
///
/// # Errors
///
/// Returns the first channel error
pub async fn drain(mut fragments: FragmentStream) -> Result<Drained, LlmError> {
    let mut drained = Drained::default();

    while let Some(fragment) = fragments.next().await {
        let fragment = fragment?;
        drained.fragments += 1;
        extend_emitted(&mut drained.content, fragment.content);
        if fragment.finished {
            break;
        }
    }

    Ok(drained)
}

/// Fold one cumulative fragment into `emitted` and return the new part
///
/// Content that does not extend `emitted` replaces it whole; empty content
/// leaves it untouched. Both delivery paths accumulate through here.
fn extend_emitted(emitted: &mut String, content: String) -> Option<String> {
    let delta = if let Some(suffix) = content.strip_prefix(emitted.as_str()) {
        suffix.to_owned()
    } else {
        tracing::debug!(
            emitted = emitted.len(),
            received = content.len(),
            "fragment does not extend emitted content, sending it whole"
        );
        content.clone()
    };

    if delta.is_empty() {
        return None;
    }

    *emitted = content;
    Some(delta)
}

/// Per-response streaming assembler
#[derive(Debug, Clone)]
pub struct StreamingAssembler {
    pass: Arc<ToolCallingPass>,
    declared: Arc<[ToolDefinition]>,
    constraint: ToolChoiceConstraint,
}

impl StreamingAssembler {
    /// Assembler for one response
    pub fn new(pass: Arc<ToolCallingPass>, declared: Vec<ToolDefinition>, constraint: ToolChoiceConstraint) -> Self {
        Self {
            pass,
            declared: declared.into(),
            constraint,
        }
    }

    /// Consume `fragments` and produce frames
    ///
    /// Dropping the returned stream drops `fragments`; nothing is pulled
    /// from the channel after that.
    pub fn assemble(self, fragments: FragmentStream) -> FrameStream {
        let state = Assembly {
            fragments,
            assembler: self,
            last_emitted: String::new(),
            received: 0,
            finishing: false,
        };

        Box::pin(stream::unfold(Some(state), |state| async move {
            let mut state = state?;

            loop {
                if state.finishing {
                    let frame = state.terminal_frame();
                    return Some((frame, None));
                }

                match state.fragments.next().await {
                    Some(Ok(fragment)) => {
                        state.received += 1;
                        state.finishing = fragment.finished;
                        if let Some(delta) = state.advance(fragment.content) {
                            let frame = StreamFrame::delta(state.last_emitted.clone(), delta);
                            return Some((frame, Some(state)));
                        }
                    }
                    Some(Err(e)) => {
                        tracing::error!(
                            error = %e,
                            fragments = state.received,
                            "backend channel failed mid-stream"
                        );
                        let frame = StreamFrame::error(state.last_emitted.clone(), &e);
                        return Some((frame, None));
                    }
                    None => state.finishing = true,
                }
            }
        }))
    }
}

struct Assembly {
    fragments: FragmentStream,
    assembler: StreamingAssembler,
    last_emitted: String,
    received: usize,
    finishing: bool,
}

impl Assembly {
    /// Record `content` and return the part not yet emitted
    fn advance(&mut self, content: String) -> Option<String> {
        extend_emitted(&mut self.last_emitted, content)
    }

    fn terminal_frame(&self) -> StreamFrame {
        let assembler = &self.assembler;
        let outcome = match assembler
            .pass
            .run(&self.last_emitted, &assembler.declared, &assembler.constraint)
        {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(error = %e, constraint = %assembler.constraint, "rejecting streamed response");
                return StreamFrame::error(self.last_emitted.clone(), &e);
            }
        };

        tracing::debug!(
            fragments = self.received,
            tools = ?outcome.detected_tools,
            action = %outcome.action,
            compliant = outcome.compliant,
            "stream assembled"
        );

        let metadata = outcome.metadata(self.received);
        let turn = outcome.turn;

        StreamFrame {
            finished: true,
            finish_reason: Some(turn.finish_reason),
            tool_calls: Some(turn.tool_calls).filter(|calls| !calls.is_empty()),
            metadata: Some(metadata),
            ..StreamFrame::delta(self.last_emitted.clone(), String::new())
        }
    }
}
