//! Error classifier.
//!
//! Maps free-form failure text onto the fixed [`ErrorKind`] taxonomy by
//! case-insensitive substring matching. Rules are evaluated in table order
//! and the first matching rule wins, so the table order is the precedence:
//! resource exhaustion beats rate limiting beats bot detection beats network
//! beats timeout beats auth beats parse. Anything unmatched is
//! [`ErrorKind::Unknown`].
//!
//! The phrases themselves are plain data ([`PhraseTable`]) and can be loaded
//! from JSON to extend the built-in set without touching matching logic.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{HealthError, Result};
use crate::types::ErrorKind;

lazy_static! {
    static ref DEFAULT_CLASSIFIER: ErrorClassifier = ErrorClassifier::new();
}

/// Classify with the built-in phrase table.
pub fn classify(message: &str) -> ErrorKind {
    DEFAULT_CLASSIFIER.classify(message)
}

/// Phrases that map to one error kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhraseRule {
    pub kind: ErrorKind,
    pub phrases: Vec<String>,
}

impl PhraseRule {
    pub fn new(kind: ErrorKind, phrases: &[&str]) -> Self {
        Self {
            kind,
            phrases: phrases.iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// Ordered classification rules. Earlier rules take precedence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhraseTable {
    pub rules: Vec<PhraseRule>,
}

impl Default for PhraseTable {
    fn default() -> Self {
        Self {
            rules: vec![
                PhraseRule::new(
                    ErrorKind::Socket,
                    &[
                        "resource temporarily unavailable",
                        "too many open files",
                        "eagain",
                        "ewouldblock",
                        "emfile",
                        "[errno 11]",
                        "[errno 24]",
                        "[errno 35]",
                    ],
                ),
                PhraseRule::new(
                    ErrorKind::RateLimit,
                    &["429", "rate limit", "too many requests", "throttl"],
                ),
                PhraseRule::new(
                    ErrorKind::Captcha,
                    &["captcha", "bot", "cloudflare", "challenge"],
                ),
                PhraseRule::new(
                    ErrorKind::Network,
                    &[
                        "connection",
                        "dns",
                        "network",
                        "unreachable",
                        "refused",
                        "reset by peer",
                        "broken pipe",
                    ],
                ),
                PhraseRule::new(ErrorKind::Timeout, &["timeout", "timed out"]),
                PhraseRule::new(
                    ErrorKind::Auth,
                    &["401", "403", "forbidden", "unauthorized", "auth"],
                ),
                PhraseRule::new(
                    ErrorKind::Parse,
                    &[
                        "parse",
                        "json",
                        "html",
                        "selector",
                        "element not found",
                        "no events found",
                        "structure changed",
                    ],
                ),
            ],
        }
    }
}

impl PhraseTable {
    /// Parse a table from its JSON form.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a JSON table from disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| HealthError::PhraseTable {
            reason: format!("cannot read {}: {}", path.display(), e),
        })?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// First-match-wins classifier over a [`PhraseTable`].
#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    rules: Vec<PhraseRule>,
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorClassifier {
    /// Classifier over the built-in table.
    pub fn new() -> Self {
        Self {
            rules: normalize(PhraseTable::default()),
        }
    }

    /// Classifier over a custom table.
    ///
    /// Rejects blank phrases, which would otherwise match every message.
    pub fn with_table(table: PhraseTable) -> Result<Self> {
        for rule in &table.rules {
            if rule.phrases.iter().any(|p| p.trim().is_empty()) {
                return Err(HealthError::PhraseTable {
                    reason: format!("blank phrase in {} rule", rule.kind),
                });
            }
        }
        Ok(Self {
            rules: normalize(table),
        })
    }

    pub fn rules(&self) -> &[PhraseRule] {
        &self.rules
    }

    /// Classify a failure message. Total: never fails.
    pub fn classify(&self, message: &str) -> ErrorKind {
        let haystack = message.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.phrases.iter().any(|p| haystack.contains(p.as_str())))
            .map(|rule| rule.kind)
            .unwrap_or(ErrorKind::Unknown)
    }
}

fn normalize(table: PhraseTable) -> Vec<PhraseRule> {
    table
        .rules
        .into_iter()
        .map(|rule| PhraseRule {
            kind: rule.kind,
            phrases: rule.phrases.iter().map(|p| p.to_lowercase()).collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_kind_has_a_phrase() {
        let cases = [
            ("Resource temporarily unavailable", ErrorKind::Socket),
            ("OSError: [Errno 24] Too many open files", ErrorKind::Socket),
            ("HTTP 429", ErrorKind::RateLimit),
            ("Request throttled by upstream", ErrorKind::RateLimit),
            ("Cloudflare challenge page", ErrorKind::Captcha),
            ("DNS lookup failed", ErrorKind::Network),
            ("Connection reset by peer", ErrorKind::Network),
            ("Navigation timeout of 30000 ms exceeded", ErrorKind::Timeout),
            ("403 Forbidden", ErrorKind::Auth),
            ("Could not parse JSON body", ErrorKind::Parse),
            ("No events found on page", ErrorKind::Parse),
            ("something odd happened", ErrorKind::Unknown),
            ("", ErrorKind::Unknown),
        ];

        for (message, expected) in cases {
            assert_eq!(classify(message), expected, "message: {:?}", message);
        }
    }

    #[test]
    fn test_socket_beats_timeout_and_network() {
        assert_eq!(
            classify("Connection timed out: too many open files"),
            ErrorKind::Socket
        );
    }

    #[test]
    fn test_rate_limit_beats_network() {
        assert_eq!(
            classify("connection closed: 429 too many requests"),
            ErrorKind::RateLimit
        );
    }

    #[test]
    fn test_network_beats_timeout() {
        assert_eq!(classify("connection timed out"), ErrorKind::Network);
    }

    #[test]
    fn test_linux_etimedout_errno_is_not_socket() {
        assert_eq!(
            classify("[Errno 110] Operation timed out"),
            ErrorKind::Timeout
        );
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(classify("CAPTCHA REQUIRED"), ErrorKind::Captcha);
    }

    #[test]
    fn test_custom_table_extends_phrases() {
        let mut table = PhraseTable::default();
        table
            .rules
            .iter_mut()
            .find(|r| r.kind == ErrorKind::Parse)
            .unwrap()
            .phrases
            .push("Unexpected Layout".to_string());

        let classifier = ErrorClassifier::with_table(table).unwrap();
        assert_eq!(
            classifier.classify("unexpected layout on listing page"),
            ErrorKind::Parse
        );
    }

    #[test]
    fn test_blank_phrase_rejected() {
        let table = PhraseTable {
            rules: vec![PhraseRule::new(ErrorKind::Network, &["  "])],
        };
        assert!(matches!(
            ErrorClassifier::with_table(table),
            Err(HealthError::PhraseTable { .. })
        ));
    }

    #[test]
    fn test_table_json_round_trip_preserves_order() {
        let json = PhraseTable::default().to_json().unwrap();
        let table = PhraseTable::from_json(&json).unwrap();
        let kinds: Vec<_> = table.rules.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ErrorKind::Socket,
                ErrorKind::RateLimit,
                ErrorKind::Captcha,
                ErrorKind::Network,
                ErrorKind::Timeout,
                ErrorKind::Auth,
                ErrorKind::Parse,
            ]
        );
    }
}
