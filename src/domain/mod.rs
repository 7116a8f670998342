pub mod post;
pub mod types;

pub use post::Post;
pub use types::{Classification, PipelineReport, RefreshRecord, RelevanceVerdict, RunStatus};
