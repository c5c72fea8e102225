// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Crate-wide error type.
//!
//! # Example
//!
//! ```
//! use meshwire::Error;
//!
//! fn classify(err: &Error) -> &'static str {
//!     match err {
//!         Error::TopicTypeMismatch { .. } => "programmer error: reused topic with a new type",
//!         Error::UnknownEndpoint(_) => "destination not (yet) present in the discovery table",
//!         _ => "other",
//!     }
//! }
//! ```

use std::fmt;

/// Every error this crate can surface to a caller.
///
/// Most failure modes named in the wire protocol (malformed datagrams,
/// transient send/receive errors, unexpected ACKs) are handled locally by
/// logging and dropping; they never reach this type. Only conditions a
/// caller must react to synchronously are represented here.
#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// A socket address or interface name supplied at startup could not be
    /// parsed or bound.
    InvalidConfig(String),

    // ========================================================================
    // Discovery Errors
    // ========================================================================
    /// `publish`/`send` targeted an endpoint name absent from the discovery
    /// table.
    UnknownEndpoint(String),

    // ========================================================================
    // Topics Errors
    // ========================================================================
    /// A topic was published or subscribed to with a `topic_type` different
    /// from the one it was first registered with.
    TopicTypeMismatch {
        /// Name of the offending topic.
        topic_name: String,
        /// Type the topic was first registered with.
        expected: String,
        /// Type of this call.
        actual: String,
    },

    // ========================================================================
    // Transport / I/O Errors
    // ========================================================================
    /// A fatal I/O error occurred while setting up a socket (bind, join,
    /// configure). Transient per-packet I/O errors do not produce this
    /// variant; they are logged and retried by the owning worker.
    Io(std::io::Error),

    /// Serialization or deserialization of a wire container failed outside
    /// of the drop-and-log path (used for malformed data handed in directly,
    /// e.g. via tests or tooling, rather than received off the wire).
    Codec(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidConfig(msg) => write!(f, "invalid configuration: {msg}"),

            Error::UnknownEndpoint(name) => {
                write!(f, "unknown endpoint: no live peer named '{name}'")
            }

            Error::TopicTypeMismatch {
                topic_name,
                expected,
                actual,
            } => write!(
                f,
                "topic '{topic_name}' already exists with type '{expected}', got '{actual}'"
            ),

            Error::Io(e) => write!(f, "I/O error: {e}"),
            Error::Codec(msg) => write!(f, "codec error: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

/// Crate-wide result alias.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_topic_name() {
        let err = Error::TopicTypeMismatch {
            topic_name: "sensors/temp".into(),
            expected: "f64".into(),
            actual: "f32".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("sensors/temp"));
        assert!(msg.contains("f64"));
        assert!(msg.contains("f32"));
    }

    #[test]
    fn io_error_is_source() {
        use std::error::Error as _;
        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err: Error = io_err.into();
        assert!(err.source().is_some());
    }
}
