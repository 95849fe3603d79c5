use regex::{Regex, RegexBuilder};

/// Case-insensitive substring matcher for library search.
#[derive(Debug, Clone)]
pub struct Matcher {
    regex: Regex,
}

impl Matcher {
    pub fn new(pattern: &str) -> Result<Self, String> {
        let regex = RegexBuilder::new(&regex::escape(pattern))
            .case_insensitive(true)
            .build()
            .map_err(|err| err.to_string())?;
        Ok(Self { regex })
    }

    pub fn is_match(&self, text: &str) -> bool {
        !text.is_empty() && self.regex.is_match(text)
    }
}

/// One-shot form of [`Matcher::is_match`].
pub fn matches_ignore_case(text: &str, pattern: &str) -> bool {
    match Matcher::new(pattern) {
        Ok(matcher) => matcher.is_match(text),
        Err(err) => {
            log::warn!("invalid search pattern {:?}: {}", pattern, err);
            false
        }
    }
}
