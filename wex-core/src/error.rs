//! Core error handling module
//!
//! • Unified error enumeration for build/config failures
//! • Near-zero allocation payloads (`CompactString`)
//! • `#[non_exhaustive]` for forward-compatible extension
//!
//! Read operations on the tree never error by contract: `find` returns
//! `Option`, `remove` of an unknown identity is a no-op. Errors here cover
//! the enumeration boundary and the configuration layer.

use std::io::{self, ErrorKind};

use compact_str::CompactString;
use thiserror::Error;

/// Convenient alias carrying our unified error type
pub type TreeResult<T> = Result<T, TreeError>;

/// Primary error enumeration (grouped by concern)
#[non_exhaustive] // allow adding variants without breaking callers
#[derive(Error, Debug)]
pub enum TreeError {
    // ────────────────────────────────────────────────────────────
    // Enumeration boundary
    // ────────────────────────────────────────────────────────────
    /// The external enumerator could not produce any result for the scope.
    /// The previously installed generation stays active.
    #[error("Enumeration failed for {scope}: {reason}")]
    EnumerationFailed {
        scope: CompactString,
        reason: CompactString,
    },

    /// A build pass was abandoned at a cancellation checkpoint. The
    /// in-progress generation is discarded; the installed one is untouched.
    #[error("Build cancelled before completion")]
    BuildCancelled,

    // ────────────────────────────────────────────────────────────
    // Configuration layer
    // ────────────────────────────────────────────────────────────
    #[error("Config parse error: {0}")]
    ConfigParse(CompactString),

    #[error("Config serialize error: {0}")]
    ConfigSerialize(CompactString),

    #[error("I/O error: {kind:?}")]
    Io {
        kind: ErrorKind,
        #[source] // keep causal chain intact
        source: Box<io::Error>,
    },

    /// Any other error, with description.
    #[error("Unexpected error: {0}")]
    Other(CompactString),
}

// ────────────────────────────────────────────────────────────────────────────
// Fast classification helpers
// ────────────────────────────────────────────────────────────────────────────
impl TreeError {
    /// Determine whether downstream logic may safely recover: a failed or
    /// cancelled build leaves the last-known-good tree installed, so the
    /// caller can simply retry on the next refresh trigger.
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::EnumerationFailed { .. } | Self::BuildCancelled
        )
    }

    /// Attribute helper used for log grouping
    #[inline]
    #[must_use]
    pub const fn operation_type(&self) -> &'static str {
        match self {
            Self::EnumerationFailed { .. } => "enumeration",
            Self::BuildCancelled => "build_cancel",
            Self::ConfigParse(_) | Self::ConfigSerialize(_) => "config",
            Self::Io { .. } => "io",
            Self::Other(_) => "unknown_error",
        }
    }

    // ────────────────────────────────────────────────────────────
    // Lightweight smart-constructors (stack-allocated)
    // ────────────────────────────────────────────────────────────
    #[inline]
    #[must_use]
    pub fn enumeration_failed(scope: &str, reason: &str) -> Self {
        Self::EnumerationFailed {
            scope: CompactString::new(scope),
            reason: CompactString::new(reason),
        }
    }

    #[inline]
    #[must_use]
    pub fn other(message: &str) -> Self {
        Self::Other(CompactString::new(message))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Loss-free mappings from library error types
// ────────────────────────────────────────────────────────────────────────────
impl From<io::Error> for TreeError {
    fn from(err: io::Error) -> Self {
        Self::Io {
            kind: err.kind(),
            source: Box::new(err),
        }
    }
}

impl From<toml::de::Error> for TreeError {
    fn from(err: toml::de::Error) -> Self {
        Self::ConfigParse(CompactString::from(err.to_string()))
    }
}

impl From<toml::ser::Error> for TreeError {
    fn from(err: toml::ser::Error) -> Self {
        Self::ConfigSerialize(CompactString::from(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_classification() {
        assert!(TreeError::enumeration_failed("desktop", "access denied").is_recoverable());
        assert!(TreeError::BuildCancelled.is_recoverable());
        assert!(!TreeError::other("boom").is_recoverable());
    }

    #[test]
    fn io_error_keeps_kind() {
        let err: TreeError = io::Error::new(ErrorKind::NotFound, "gone").into();
        match err {
            TreeError::Io { kind, .. } => assert_eq!(kind, ErrorKind::NotFound),
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
