pub mod client;
pub mod inference;

use futures::future::BoxFuture;

use crate::domain::Classification;

pub use client::OllamaClient;

/// Anything that can judge a post's text. Implementations must not fail:
/// problems are reported as an indeterminate classification.
pub trait RelevanceClassifier: Send + Sync {
    fn classify<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Classification>;
}
