use std::fmt;
use std::sync::OnceLock;

use anyhow::{anyhow, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Default narration language.
pub const DEFAULT_LANGUAGE: &str = "en";

/// A validated language code (`en`, `hi`, ...).
///
/// Codes are short lower-case ISO 639 identifiers. Anything else is rejected
/// at the boundary so that phrase lookups never see free-form input.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Language(String);

fn code_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z]{2,3}$").expect("language code pattern"))
}

impl Language {
    pub fn parse(code: &str) -> Result<Self> {
        let normalized = code.trim().to_lowercase();
        if !code_pattern().is_match(&normalized) {
            return Err(anyhow!(
                "invalid language code '{}': expected 2-3 lowercase letters",
                code.trim()
            ));
        }
        Ok(Self(normalized))
    }

    pub fn english() -> Self {
        Self(DEFAULT_LANGUAGE.to_string())
    }

    pub fn code(&self) -> &str {
        &self.0
    }
}

impl Default for Language {
    fn default() -> Self {
        Self::english()
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Language {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Language> for String {
    fn from(value: Language) -> Self {
        value.0
    }
}
