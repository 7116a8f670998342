use std::{future::Future, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use chrono_tz::Tz;
use reqwest::Client;
use teloxide::Bot;
use tokio::time::timeout;
use tokio_cron_scheduler::JobScheduler;

use crate::{
    ai::OllamaClient,
    config::AppConfig,
    db::{self, HistoryStore, SqliteHistoryStore},
    domain::{Post, RefreshRecord, RunStatus},
    feed::HttpFeedSource,
    infrastructure::{
        directories::ResolvedPaths,
        notifier::{LogNotifier, Notifier, TelegramNotifier},
        readiness::{wait_until, WaitOutcome, MAX_WAIT, WAIT_INTERVAL},
        shutdown::{CheckNowCallback, Shutdown, ShutdownListener},
    },
    tasks::{
        pipeline::PostPipeline,
        prefilter::KeywordPrefilter,
        scheduler::{configure_refresh_job, RunCoordinator, Trigger, REFRESH_PERIOD},
    },
};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

pub struct WatchApp {
    scheduler: JobScheduler,
    coordinator: Arc<RunCoordinator>,
    classifier: Arc<OllamaClient>,
    store: Arc<SqliteHistoryStore>,
    shutdown: Shutdown,
}

impl WatchApp {
    pub async fn initialize(
        config: AppConfig,
        paths: &ResolvedPaths,
        shutdown: Shutdown,
    ) -> Result<Self> {
        let pool = db::init_pool(&paths.db_path).await?;
        let store = Arc::new(SqliteHistoryStore::new(pool));

        let http_client = Client::builder()
            .user_agent(format!("post-watch/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        let classifier = Arc::new(OllamaClient::new(
            http_client.clone(),
            config.classifier.clone(),
            config.watch.topic.clone(),
        ));
        let feed = Arc::new(HttpFeedSource::new(http_client, config.feed.clone()));
        let notifier = build_notifier(&config);
        let prefilter =
            KeywordPrefilter::new(&config.watch.keyword).context("invalid watch keyword")?;

        let pipeline = PostPipeline::new(
            store.clone(),
            classifier.clone(),
            notifier,
            prefilter,
            config.notify.title.clone(),
        );
        let coordinator = Arc::new(RunCoordinator::new(pipeline, feed));
        let scheduler = configure_refresh_job(coordinator.clone(), REFRESH_PERIOD).await?;

        Ok(Self {
            scheduler,
            coordinator,
            classifier,
            store,
            shutdown,
        })
    }

    /// Callback for external check requests. Each request queues one run and
    /// logs the resulting status line.
    pub fn check_now_callback(&self) -> CheckNowCallback {
        let coordinator = self.coordinator.clone();
        Arc::new(move || {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                let status = coordinator.run_on_demand().await;
                match &status {
                    RunStatus::Completed(report) => tracing::info!(
                        target: "scheduler",
                        notified = report.notified,
                        "{}",
                        status.status_line()
                    ),
                    RunStatus::Failed(reason) => tracing::warn!(
                        target: "scheduler",
                        reason = %reason,
                        "{}",
                        status.status_line()
                    ),
                }
            });
        })
    }

    pub async fn run(self) -> Result<()> {
        let WatchApp {
            mut scheduler,
            coordinator,
            classifier,
            store,
            shutdown,
        } = self;

        tracing::info!("post watcher started");

        let mut shutdown_listener = shutdown.subscribe();
        let mut startup = tokio::spawn({
            let coordinator = coordinator.clone();
            let listener = shutdown.subscribe();
            async move {
                let target = classifier.as_ref();
                startup_check(coordinator, move || target.probe(), listener).await;
            }
        });

        shutdown_listener.notified().await;
        tracing::info!("shutdown signal received (CTRL+C / SIGTERM)");

        if timeout(SHUTDOWN_TIMEOUT, &mut startup).await.is_err() {
            tracing::warn!(
                target: "scheduler",
                "startup check did not finish within {:?}; its results may be lost",
                SHUTDOWN_TIMEOUT
            );
            startup.abort();
        }

        match timeout(SHUTDOWN_TIMEOUT, scheduler.shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::error!(?err, "failed to stop job scheduler");
            }
            Err(_) => {
                tracing::warn!(
                    target: "scheduler",
                    "job scheduler did not stop within {:?}",
                    SHUTDOWN_TIMEOUT
                );
            }
        }

        if timeout(SHUTDOWN_TIMEOUT, coordinator.wait_idle()).await.is_err() {
            tracing::warn!(
                target: "scheduler",
                "in-flight run did not finish within {:?}; its results may be lost",
                SHUTDOWN_TIMEOUT
            );
        }

        if timeout(SHUTDOWN_TIMEOUT, store.close()).await.is_err() {
            tracing::warn!(
                target: "db",
                "history store did not close within {:?}",
                SHUTDOWN_TIMEOUT
            );
        }

        tracing::info!("post watcher stopped");
        Ok(())
    }
}

/// Waits for the classifier endpoint, then runs the first check. Shutdown
/// during the wait skips the check; once the check has started it runs to
/// completion so its notifications always reach history.
async fn startup_check<F, Fut>(
    coordinator: Arc<RunCoordinator>,
    probe: F,
    mut shutdown: ShutdownListener,
) -> Option<RunStatus>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let outcome = tokio::select! {
        outcome = wait_until(probe, WAIT_INTERVAL, MAX_WAIT) => outcome,
        _ = shutdown.notified() => {
            tracing::info!(target: "scheduler", "shutdown before startup check; skipping it");
            return None;
        }
    };

    match outcome {
        WaitOutcome::Ready => {
            tracing::info!(target: "classifier", "classifier endpoint reachable");
        }
        WaitOutcome::TimedOut { waited } => {
            tracing::warn!(
                target: "classifier",
                "classifier endpoint not reachable after {:?}; posts will stay unclassified until it is",
                waited
            );
        }
    }

    if shutdown.is_triggered() {
        return None;
    }
    coordinator.run_scheduled(Trigger::Startup).await
}

fn build_notifier(config: &AppConfig) -> Arc<dyn Notifier> {
    match (&config.notify.telegram_bot_token, config.notify.chat_id) {
        (Some(token), Some(chat_id)) => {
            let tz: Tz = config.timezone.parse().unwrap_or(chrono_tz::Europe::Amsterdam);
            tracing::info!(target: "notify", chat_id, "notifications go to Telegram");
            Arc::new(TelegramNotifier::new(Bot::new(token), chat_id, tz))
        }
        (Some(_), None) => {
            tracing::warn!(
                target: "notify",
                "TELEGRAM_BOT_TOKEN is set but NOTIFY_CHAT_ID is not; notifications go to the log"
            );
            Arc::new(LogNotifier)
        }
        _ => Arc::new(LogNotifier),
    }
}

/// Prints the newest stored post and the last refresh time.
pub async fn print_status(config: &AppConfig, paths: &ResolvedPaths) -> Result<()> {
    let pool = db::init_pool(&paths.db_path).await?;
    let store = SqliteHistoryStore::new(pool);
    let posts = store.load_posts().await?;
    let refresh = store.load_refresh().await?;
    store.close().await;

    let tz: Tz = config.timezone.parse().unwrap_or(chrono_tz::Europe::Amsterdam);
    println!("{}", format_status(posts.first(), refresh, tz));
    Ok(())
}

fn format_status(latest: Option<&Post>, refresh: RefreshRecord, tz: Tz) -> String {
    let latest = match latest {
        Some(post) => format!(
            "Latest post from {} at {}: \"{}\"",
            post.author,
            post.timestamp.with_timezone(&tz).format("%Y-%m-%d %H:%M:%S"),
            post.text
        ),
        None => "No posts found.".to_string(),
    };
    let refreshed = match refresh.last_refresh {
        Some(at) => format!(
            "Last refresh: {}",
            at.with_timezone(&tz).format("%Y-%m-%d %H:%M:%S")
        ),
        None => "Last refresh: Never.".to_string(),
    };
    format!("{latest}\n{refreshed}")
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::{
        domain::{Classification, RelevanceVerdict},
        testing::{MemoryStore, RecordingNotifier, ScriptedClassifier, StaticFeed},
    };

    fn fan_post() -> Post {
        Post {
            author: "fan".into(),
            timestamp: Utc.with_ymd_and_hms(2024, 10, 5, 19, 45, 0).unwrap(),
            text: "Excelsior - ADO".into(),
            permalink: "https://x.com/fan/status/1".into(),
        }
    }

    fn coordinator(
        store: &Arc<MemoryStore>,
        notifier: &Arc<RecordingNotifier>,
        feed: &Arc<StaticFeed>,
    ) -> Arc<RunCoordinator> {
        let classifier = Arc::new(ScriptedClassifier::always(Classification::new(
            RelevanceVerdict::Relevant,
            "yes",
        )));
        let pipeline = PostPipeline::new(
            store.clone(),
            classifier,
            notifier.clone(),
            KeywordPrefilter::new("excelsior").unwrap(),
            "New Excelsior Post",
        );
        Arc::new(RunCoordinator::new(pipeline, feed.clone()))
    }

    #[tokio::test]
    async fn shutdown_mid_startup_check_still_persists_history() {
        let store = Arc::new(MemoryStore::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let (feed, gate) = StaticFeed::gated(vec![fan_post()]);
        let feed = Arc::new(feed);
        let shutdown = Shutdown::new();

        let check = tokio::spawn(startup_check(
            coordinator(&store, &notifier, &feed),
            || async { true },
            shutdown.subscribe(),
        ));
        while feed.fetches() < 1 {
            tokio::task::yield_now().await;
        }

        shutdown.trigger();
        gate.notify_one();

        let status = check.await.unwrap().expect("startup check ran");
        assert!(status.is_success());
        assert_eq!(notifier.sent().len(), 1);
        assert_eq!(store.posts().len(), 1);
        assert!(store.last_refresh().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_during_readiness_wait_skips_startup_check() {
        let store = Arc::new(MemoryStore::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let feed = Arc::new(StaticFeed::new(vec![fan_post()]));
        let shutdown = Shutdown::new();

        let check = tokio::spawn(startup_check(
            coordinator(&store, &notifier, &feed),
            || async { false },
            shutdown.subscribe(),
        ));
        tokio::task::yield_now().await;
        shutdown.trigger();

        assert!(check.await.unwrap().is_none());
        assert_eq!(feed.fetches(), 0);
        assert!(store.last_refresh().is_none());
    }

    #[test]
    fn status_for_empty_store() {
        let text = format_status(
            None,
            RefreshRecord { last_refresh: None },
            chrono_tz::Europe::Amsterdam,
        );
        assert_eq!(text, "No posts found.\nLast refresh: Never.");
    }

    #[test]
    fn status_renders_in_local_time() {
        let post = Post {
            author: "Het Legioen".into(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 20, 13, 30, 0).unwrap(),
            text: "Excelsior thuis".into(),
            permalink: "https://x.com/l/status/9".into(),
        };
        let refresh = RefreshRecord {
            last_refresh: Some(Utc.with_ymd_and_hms(2024, 1, 20, 14, 0, 0).unwrap()),
        };
        let text = format_status(Some(&post), refresh, chrono_tz::Europe::Amsterdam);
        assert_eq!(
            text,
            "Latest post from Het Legioen at 2024-01-20 14:30:00: \"Excelsior thuis\"\n\
             Last refresh: 2024-01-20 15:00:00"
        );
    }
}
