pub mod blanket;
pub mod check;
pub mod client;
pub mod error;
pub mod metadata;
pub mod output;
pub mod pipeline;
pub mod refine;
pub mod repair;

pub use blanket::{BlanketRefiner, RefinementLogEntry, StandaloneRefiner};
pub use check::{CheckCollaborator, CommandChecker, Diagnostics};
pub use client::{GenerationClient, GenerationOptions, Message, OpenAiClient, Role};
pub use error::{AgentError, CheckError, ClientError};
pub use metadata::{GenerationEntry, Metadata, MetadataRecorder};
pub use pipeline::{GenerationSummary, Generator};
pub use refine::BoundedRefiner;
pub use repair::{RefineState, RepairAttempt, RepairReport, RepairStrategy, RepairTarget};
