use regex::{Regex, RegexBuilder};

/// Case-insensitive keyword gate that runs before the classifier.
#[derive(Debug, Clone)]
pub struct KeywordPrefilter {
    keyword: String,
    pattern: Regex,
}

impl KeywordPrefilter {
    pub fn new(keyword: &str) -> Result<Self, regex::Error> {
        let pattern = RegexBuilder::new(&regex::escape(keyword))
            .case_insensitive(true)
            .build()?;
        Ok(Self {
            keyword: keyword.to_string(),
            pattern,
        })
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn passes(&self, text: &str) -> bool {
        !text.is_empty() && self.pattern.is_match(text)
    }
}
