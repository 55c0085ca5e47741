pub mod config;
pub mod error;
pub mod ident;
pub mod parse;
pub mod plan;
pub mod tags;

pub use error::{ConfigError, ParseError, PlanError};
pub use ident::RouterIdent;
pub use plan::{FileKind, FilePlan, FileSpec, Snippet, build_plan};
pub use tags::{TagSet, TagSource};
