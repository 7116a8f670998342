use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use crate::{
    ai::RelevanceClassifier,
    db::{HistoryStore, StoreError},
    domain::{PipelineReport, Post, RelevanceVerdict},
    infrastructure::notifier::{Notification, Notifier},
};

use super::{
    dedup::{dedupe, merge_and_cap},
    prefilter::KeywordPrefilter,
};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to load post history: {0}")]
    LoadHistory(#[source] StoreError),
    #[error("failed to save post history: {0}")]
    SaveHistory(#[source] StoreError),
    #[error("failed to record refresh time: {0}")]
    SaveRefresh(#[source] StoreError),
}

/// Turns a scraped batch into notifications and an updated history.
pub struct PostPipeline {
    store: Arc<dyn HistoryStore>,
    classifier: Arc<dyn RelevanceClassifier>,
    notifier: Arc<dyn Notifier>,
    prefilter: KeywordPrefilter,
    notification_title: String,
}

impl PostPipeline {
    pub fn new(
        store: Arc<dyn HistoryStore>,
        classifier: Arc<dyn RelevanceClassifier>,
        notifier: Arc<dyn Notifier>,
        prefilter: KeywordPrefilter,
        notification_title: impl Into<String>,
    ) -> Self {
        Self {
            store,
            classifier,
            notifier,
            prefilter,
            notification_title: notification_title.into(),
        }
    }

    pub async fn run(&self, batch: Vec<Post>) -> Result<PipelineReport, PipelineError> {
        let history = self
            .store
            .load_posts()
            .await
            .map_err(PipelineError::LoadHistory)?;

        let fresh = dedupe(&batch, &history);
        tracing::info!(
            target: "pipeline",
            scraped = batch.len(),
            fresh = fresh.len(),
            history = history.len(),
            "deduplicated batch"
        );

        let mut report = PipelineReport {
            scraped: batch.len(),
            fresh: fresh.len(),
            prefiltered_out: 0,
            classified: 0,
            relevant: 0,
            indeterminate: 0,
            notified: 0,
            notify_failures: 0,
            retained: 0,
            refreshed_at: Utc::now(),
        };

        // One classifier request in flight at a time.
        for post in &fresh {
            if !self.prefilter.passes(&post.text) {
                report.prefiltered_out += 1;
                tracing::debug!(
                    target: "pipeline",
                    permalink = %post.permalink,
                    keyword = self.prefilter.keyword(),
                    "skipped by keyword prefilter"
                );
                continue;
            }

            let classification = self.classifier.classify(&post.text).await;
            report.classified += 1;
            tracing::info!(
                target: "pipeline",
                permalink = %post.permalink,
                verdict = %classification.verdict,
                reason = %classification.reason,
                "post classified"
            );

            match classification.verdict {
                RelevanceVerdict::Relevant => report.relevant += 1,
                RelevanceVerdict::Indeterminate => report.indeterminate += 1,
                RelevanceVerdict::NotRelevant => {}
            }
            if !classification.verdict.should_notify() {
                continue;
            }

            let notification = Notification::for_post(&self.notification_title, post);
            match self.notifier.dispatch(&notification).await {
                Ok(()) => report.notified += 1,
                Err(err) => {
                    report.notify_failures += 1;
                    tracing::error!(
                        target: "pipeline",
                        error = %err,
                        permalink = %post.permalink,
                        "failed to dispatch notification"
                    );
                }
            }
        }

        let merged = merge_and_cap(fresh, history);
        report.retained = merged.len();
        self.store
            .save_posts(&merged)
            .await
            .map_err(PipelineError::SaveHistory)?;

        report.refreshed_at = Utc::now();
        self.store
            .save_last_refresh(report.refreshed_at)
            .await
            .map_err(PipelineError::SaveRefresh)?;

        tracing::info!(
            target: "pipeline",
            scraped = report.scraped,
            fresh = report.fresh,
            skipped = report.prefiltered_out,
            classified = report.classified,
            relevant = report.relevant,
            indeterminate = report.indeterminate,
            notified = report.notified,
            notify_failures = report.notify_failures,
            retained = report.retained,
            "pipeline run completed"
        );
        Ok(report)
    }
}
