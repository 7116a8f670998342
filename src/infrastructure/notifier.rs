use anyhow::Context;
use chrono_tz::Tz;
use futures::{future::BoxFuture, FutureExt};
use teloxide::{prelude::*, types::ParseMode};

use crate::domain::Post;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub link: String,
}

impl Notification {
    pub fn for_post(title: &str, post: &Post) -> Self {
        Self {
            title: title.to_string(),
            body: format!("{}: {}", post.author, post.text),
            link: post.permalink.clone(),
        }
    }
}

/// Fire-and-forget delivery of a single notification.
pub trait Notifier: Send + Sync {
    fn dispatch<'a>(&'a self, notification: &'a Notification) -> BoxFuture<'a, anyhow::Result<()>>;
}

/// Sends each notification as an HTML message to one Telegram chat.
pub struct TelegramNotifier {
    bot: Bot,
    chat_id: ChatId,
    timezone: Tz,
}

impl TelegramNotifier {
    pub fn new(bot: Bot, chat_id: i64, timezone: Tz) -> Self {
        Self {
            bot,
            chat_id: ChatId(chat_id),
            timezone,
        }
    }

    fn render(&self, notification: &Notification) -> String {
        let sent = chrono::Utc::now().with_timezone(&self.timezone);
        format!(
            "<b>{}</b>\n{}\n\n<a href=\"{}\">Open post</a> · {}",
            escape_html(&notification.title),
            escape_html(&notification.body),
            escape_html(&notification.link),
            sent.format("%Y-%m-%d %H:%M")
        )
    }
}

impl Notifier for TelegramNotifier {
    fn dispatch<'a>(&'a self, notification: &'a Notification) -> BoxFuture<'a, anyhow::Result<()>> {
        async move {
            self.bot
                .send_message(self.chat_id, self.render(notification))
                .parse_mode(ParseMode::Html)
                .await
                .with_context(|| format!("failed to notify about {}", notification.link))?;
            Ok(())
        }
        .boxed()
    }
}

/// Used when no chat is configured: the notification only goes to the log.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn dispatch<'a>(&'a self, notification: &'a Notification) -> BoxFuture<'a, anyhow::Result<()>> {
        async move {
            tracing::info!(
                target: "notify",
                title = %notification.title,
                link = %notification.link,
                "{}",
                notification.body
            );
            Ok(())
        }
        .boxed()
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
