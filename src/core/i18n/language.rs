use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ReplacerError;

/// Supported display languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Language {
    /// Japanese (default)
    #[default]
    #[serde(rename = "ja")]
    Japanese,
    /// English
    #[serde(rename = "en")]
    English,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::Japanese, Language::English];

    pub fn code(&self) -> &'static str {
        match self {
            Language::Japanese => "ja",
            Language::English => "en",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Strict parsing used for CLI arguments; unknown codes are rejected
impl FromStr for Language {
    type Err = ReplacerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ja" | "ja-jp" => Ok(Language::Japanese),
            "en" | "en-us" | "en-gb" => Ok(Language::English),
            other => {
                let codes: Vec<&str> = Language::ALL.iter().map(Language::code).collect();
                Err(ReplacerError::invalid_argument(format!(
                    "Invalid language code: {}. Available codes: {}",
                    other,
                    codes.join(", ")
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str_rejects_unknown() {
        assert_eq!("ja".parse::<Language>().unwrap(), Language::Japanese);
        assert_eq!("EN".parse::<Language>().unwrap(), Language::English);
        let err = "pt".parse::<Language>().unwrap_err();
        assert!(err.to_string().contains("ja, en"));
    }

    #[test]
    fn test_serde_uses_code() {
        let json = serde_json::to_string(&Language::English).unwrap();
        assert_eq!(json, "\"en\"");
        let parsed: Language = serde_json::from_str("\"ja\"").unwrap();
        assert_eq!(parsed, Language::Japanese);
    }
}
