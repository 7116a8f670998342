use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single scraped post. `permalink` is the identity used for deduplication.
///
/// Field names on the wire follow what the page scraper emits, so history
/// written by earlier versions still loads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    #[serde(rename = "from")]
    pub author: String,
    #[serde(rename = "time")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "message")]
    pub text: String,
    #[serde(rename = "link_to_post")]
    pub permalink: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_scraper_field_names() {
        let raw = r#"{
            "from": "Kralingen Fan",
            "time": "2024-03-01T18:30:00.000Z",
            "message": "Excelsior wint!",
            "link_to_post": "https://x.com/fan/status/1"
        }"#;
        let post: Post = serde_json::from_str(raw).unwrap();
        assert_eq!(post.author, "Kralingen Fan");
        assert_eq!(post.permalink, "https://x.com/fan/status/1");
        assert_eq!(post.timestamp.to_rfc3339(), "2024-03-01T18:30:00+00:00");

        let back = serde_json::to_value(&post).unwrap();
        assert_eq!(back["message"], "Excelsior wint!");
        assert!(back.get("text").is_none());
    }
}
