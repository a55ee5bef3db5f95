//! The fixed crawl error taxonomy.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Category of a failed crawl attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Network,
    RateLimit,
    Auth,
    Parse,
    Socket,
    Timeout,
    Captcha,
    Unknown,
}

/// Static metadata attached to every [`ErrorKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorKindInfo {
    /// Whether the failure is expected to clear up on its own.
    pub is_transient: bool,
    /// Suggested wait before the next attempt against the same source.
    pub retry_after_seconds: u64,
    pub description: &'static str,
}

const NETWORK: ErrorKindInfo = ErrorKindInfo {
    is_transient: true,
    retry_after_seconds: 30,
    description: "Connection, DNS or routing failure",
};

const RATE_LIMIT: ErrorKindInfo = ErrorKindInfo {
    is_transient: true,
    retry_after_seconds: 300,
    description: "Source is throttling requests",
};

const AUTH: ErrorKindInfo = ErrorKindInfo {
    is_transient: false,
    retry_after_seconds: 3600,
    description: "Access denied or credentials rejected",
};

const PARSE: ErrorKindInfo = ErrorKindInfo {
    is_transient: false,
    retry_after_seconds: 3600,
    description: "Page structure changed or content could not be parsed",
};

const SOCKET: ErrorKindInfo = ErrorKindInfo {
    is_transient: true,
    retry_after_seconds: 60,
    description: "Local resource exhaustion (EAGAIN, too many open files)",
};

const TIMEOUT: ErrorKindInfo = ErrorKindInfo {
    is_transient: true,
    retry_after_seconds: 60,
    description: "Request or page load timed out",
};

const CAPTCHA: ErrorKindInfo = ErrorKindInfo {
    is_transient: true,
    retry_after_seconds: 900,
    description: "Bot detection or challenge page",
};

const UNKNOWN: ErrorKindInfo = ErrorKindInfo {
    is_transient: false,
    retry_after_seconds: 300,
    description: "Unrecognised failure",
};

impl ErrorKind {
    /// Every kind, in declaration order.
    pub const ALL: [ErrorKind; 8] = [
        ErrorKind::Network,
        ErrorKind::RateLimit,
        ErrorKind::Auth,
        ErrorKind::Parse,
        ErrorKind::Socket,
        ErrorKind::Timeout,
        ErrorKind::Captcha,
        ErrorKind::Unknown,
    ];

    pub fn info(self) -> &'static ErrorKindInfo {
        match self {
            ErrorKind::Network => &NETWORK,
            ErrorKind::RateLimit => &RATE_LIMIT,
            ErrorKind::Auth => &AUTH,
            ErrorKind::Parse => &PARSE,
            ErrorKind::Socket => &SOCKET,
            ErrorKind::Timeout => &TIMEOUT,
            ErrorKind::Captcha => &CAPTCHA,
            ErrorKind::Unknown => &UNKNOWN,
        }
    }

    pub fn is_transient(self) -> bool {
        self.info().is_transient
    }

    pub fn retry_after(self) -> Duration {
        Duration::from_secs(self.info().retry_after_seconds)
    }

    pub fn description(self) -> &'static str {
        self.info().description
    }

    /// Stable storage/wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Network => "network",
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::Auth => "auth",
            ErrorKind::Parse => "parse",
            ErrorKind::Socket => "socket",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Captcha => "captcha",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ErrorKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown error kind: {}", s))
    }
}
