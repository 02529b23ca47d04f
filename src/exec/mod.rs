//! Pipeline execution: one thread per stage, bounded links between
//! neighbours, cooperative cancellation and deferred error rendering.

/// Cooperative cancellation signal with wake-up callbacks.
pub mod cancel;
/// First-stage input, last-stage output and redirect files.
pub mod chain;
/// Per-stage handle given to command bodies.
pub mod context;
/// Byte-encoding detection for input redirect files.
pub mod encoding;
/// Resolved pipeline stages.
pub mod invocation;
/// Input, output and error-output capabilities.
pub mod io;
/// Raw key buffers fed from the terminal.
pub mod keyboard;
/// Bounded character channel between adjacent stages.
pub mod link;
/// The pipeline runner.
pub mod pipeline;

pub use cancel::{CancelGuard, CancellationToken};
pub use context::{Context, ContextBuilder};
pub use invocation::{Invocation, Stage, StageError};
pub use io::{CommandInput, CommandOutput, ErrorOutput};
pub use keyboard::{Keyboard, KeyboardBuffer};
pub use link::Link;
pub use pipeline::{Pipeline, PipelineReport, PipelineSettings, PipelineState, Runtime};
