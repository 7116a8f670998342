//! In-memory stand-ins for the pipeline's collaborators.

use std::{collections::VecDeque, sync::Arc};

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use futures::{future::BoxFuture, FutureExt};
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::{
    ai::RelevanceClassifier,
    db::{HistoryStore, StoreError},
    domain::{Classification, Post, RefreshRecord},
    feed::FeedSource,
    infrastructure::notifier::{Notification, Notifier},
};

#[derive(Default)]
pub struct MemoryStore {
    posts: Mutex<Vec<Post>>,
    last_refresh: Mutex<Option<DateTime<Utc>>>,
    fail_writes: Mutex<bool>,
}

impl MemoryStore {
    pub fn with_posts(posts: Vec<Post>) -> Self {
        Self {
            posts: Mutex::new(posts),
            ..Self::default()
        }
    }

    pub fn fail_writes(&self) {
        *self.fail_writes.lock() = true;
    }

    pub fn posts(&self) -> Vec<Post> {
        self.posts.lock().clone()
    }

    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        *self.last_refresh.lock()
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if *self.fail_writes.lock() {
            return Err(StoreError::Backend(sqlx::Error::PoolClosed));
        }
        Ok(())
    }
}

impl HistoryStore for MemoryStore {
    fn load_posts(&self) -> BoxFuture<'_, Result<Vec<Post>, StoreError>> {
        let posts = self.posts();
        async move { Ok(posts) }.boxed()
    }

    fn save_posts<'a>(&'a self, posts: &'a [Post]) -> BoxFuture<'a, Result<(), StoreError>> {
        async move {
            self.check_writable()?;
            *self.posts.lock() = posts.to_vec();
            Ok(())
        }
        .boxed()
    }

    fn load_refresh(&self) -> BoxFuture<'_, Result<RefreshRecord, StoreError>> {
        let last_refresh = self.last_refresh();
        async move { Ok(RefreshRecord { last_refresh }) }.boxed()
    }

    fn save_last_refresh(&self, at: DateTime<Utc>) -> BoxFuture<'_, Result<(), StoreError>> {
        async move {
            self.check_writable()?;
            *self.last_refresh.lock() = Some(at);
            Ok(())
        }
        .boxed()
    }
}

/// Replays queued classifications, then falls back to a fixed one.
pub struct ScriptedClassifier {
    queued: Mutex<VecDeque<Classification>>,
    fallback: Classification,
    seen: Mutex<Vec<String>>,
}

impl ScriptedClassifier {
    pub fn always(result: Classification) -> Self {
        Self::sequence_then(Vec::new(), result)
    }

    pub fn sequence(results: Vec<Classification>) -> Self {
        Self::sequence_then(results, Classification::indeterminate("script exhausted"))
    }

    fn sequence_then(results: Vec<Classification>, fallback: Classification) -> Self {
        Self {
            queued: Mutex::new(results.into()),
            fallback,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().clone()
    }
}

impl RelevanceClassifier for ScriptedClassifier {
    fn classify<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Classification> {
        self.seen.lock().push(text.to_string());
        let result = self
            .queued
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        async move { result }.boxed()
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    failures_left: Mutex<usize>,
}

impl RecordingNotifier {
    pub fn failing_first(count: usize) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failures_left: Mutex::new(count),
        }
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn dispatch<'a>(&'a self, notification: &'a Notification) -> BoxFuture<'a, anyhow::Result<()>> {
        async move {
            {
                let mut left = self.failures_left.lock();
                if *left > 0 {
                    *left -= 1;
                    return Err(anyhow!("notification service unavailable"));
                }
            }
            self.sent.lock().push(notification.clone());
            Ok(())
        }
        .boxed()
    }
}

/// Feed that hands out the same batch every time. A gated feed holds each
/// fetch until the returned [`Notify`] is signalled.
pub struct StaticFeed {
    batch: Result<Vec<Post>, String>,
    gate: Option<Arc<Notify>>,
    fetches: Mutex<usize>,
}

impl StaticFeed {
    pub fn new(batch: Vec<Post>) -> Self {
        Self {
            batch: Ok(batch),
            gate: None,
            fetches: Mutex::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            batch: Err(message.to_string()),
            gate: None,
            fetches: Mutex::new(0),
        }
    }

    pub fn gated(batch: Vec<Post>) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let feed = Self {
            batch: Ok(batch),
            gate: Some(gate.clone()),
            fetches: Mutex::new(0),
        };
        (feed, gate)
    }

    pub fn fetches(&self) -> usize {
        *self.fetches.lock()
    }
}

impl FeedSource for StaticFeed {
    fn fetch_latest(&self) -> BoxFuture<'_, anyhow::Result<Vec<Post>>> {
        async move {
            *self.fetches.lock() += 1;
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.batch.clone().map_err(|message| anyhow!(message))
        }
        .boxed()
    }
}
