pub mod allocator;
pub mod dispatch;
pub mod envelope;
pub mod handler;
pub mod museca;

pub use dispatch::{DispatchTable, GameHandler, HandlerRegistry, RenderOutput, RevisionRange};
pub use envelope::{ModelId, SubmissionEnvelope};
pub use handler::create_scorecard_router;
