pub mod dedup;
pub mod pipeline;
pub mod prefilter;
pub mod scheduler;
