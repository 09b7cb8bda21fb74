//! Shared types and error definitions for the eventcap workspace.
//!
//! This crate provides the foundational vocabulary used by the capture engine
//! and the registry: the ordinal [`ConsolePolicy`] scale that gates console
//! output, the mapping from free-form record levels onto that scale, and the
//! [`CaptureError`] type (via `thiserror`) raised for configuration mistakes.
//!
//! No crate in the workspace depends on anything *except* `eventcap-types`
//! for cross-cutting type definitions.

use serde::{Deserialize, Serialize};

mod error;
pub use error::CaptureError;

/// Ordinal console verbosity scale, from most silent to most verbose.
///
/// A stream prints a record when its policy is at least as verbose as the
/// severity derived from the record's level (see [`ConsolePolicy::for_level`]).
/// `Off` never prints and `All` always prints.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ConsolePolicy {
    /// Nothing is printed.
    #[default]
    Off = 0,
    /// Only `error` records.
    Error = 1,
    /// `warn` and above.
    Warn = 2,
    /// `info` and above.
    Info = 3,
    /// Everything with a recognised or unrecognised level.
    Log = 4,
    /// Everything, unconditionally.
    All = 5,
}

impl ConsolePolicy {
    /// Every policy in ascending order.
    pub const ALL_LEVELS: [ConsolePolicy; 6] = [
        Self::Off,
        Self::Error,
        Self::Warn,
        Self::Info,
        Self::Log,
        Self::All,
    ];

    /// Returns the ordinal for this policy.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Converts an ordinal back to a policy.
    ///
    /// Returns `None` if the ordinal is above `All`.
    pub fn from_u8(ordinal: u8) -> Option<Self> {
        match ordinal {
            0 => Some(Self::Off),
            1 => Some(Self::Error),
            2 => Some(Self::Warn),
            3 => Some(Self::Info),
            4 => Some(Self::Log),
            5 => Some(Self::All),
            _ => None,
        }
    }

    /// Returns the canonical lowercase label for this policy.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Log => "log",
            Self::All => "all",
        }
    }

    /// Derives the severity ordinal of a record level.
    ///
    /// `error` maps to `Error`, `warn`/`warning` to `Warn`, `info` to `Info`;
    /// every other level (including `log` and `debug`) maps to `Log`.
    /// Matching ignores ASCII case.
    pub fn for_level(level: &str) -> Self {
        let level = level.trim();
        if level.eq_ignore_ascii_case("error") {
            Self::Error
        } else if level.eq_ignore_ascii_case("warn") || level.eq_ignore_ascii_case("warning") {
            Self::Warn
        } else if level.eq_ignore_ascii_case("info") {
            Self::Info
        } else {
            Self::Log
        }
    }

    /// Whether a record of the given severity is printed under this policy.
    pub fn allows(self, severity: ConsolePolicy) -> bool {
        match self {
            Self::Off => false,
            Self::All => true,
            policy => policy >= severity,
        }
    }
}

impl std::fmt::Display for ConsolePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ConsolePolicy {
    type Err = ParseConsolePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL_LEVELS
            .into_iter()
            .find(|policy| policy.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ParseConsolePolicyError(s.to_string()))
    }
}

/// Error returned when parsing an unknown console policy name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseConsolePolicyError(pub String);

impl std::fmt::Display for ParseConsolePolicyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown console policy: {}", self.0)
    }
}

impl std::error::Error for ParseConsolePolicyError {}

/// Level used when a caller does not name one.
pub const DEFAULT_LEVEL: &str = "log";
