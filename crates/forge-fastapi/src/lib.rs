pub mod error;
pub mod prompts;

pub use error::PromptError;
pub use prompts::{PromptAssembler, PromptRequest, PromptTemplate, STACK, SYSTEM_PROMPT};
