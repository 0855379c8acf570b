// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the curtain engine.
//!
//! Failures are split by where they originate: validation of device
//! reports and rule updates, the backing document store, the message
//! channel, and payload parsing. Sleep-mode transition conflicts are
//! reported as dedicated variants on [`Error`].

use thiserror::Error;

/// The main error type for this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// A reading or rule update failed validation.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The document store rejected or could not serve a request.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Publishing to or connecting with the message channel failed.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// An inbound payload could not be parsed.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Sleep mode was activated while already active.
    #[error("sleep mode is already active")]
    AlreadyActive,

    /// Sleep mode was deactivated while not active.
    #[error("sleep mode is not active")]
    NotActive,

    /// The requested operation is not allowed while sleep mode is active.
    #[error("operation not allowed while sleep mode is active")]
    SleepModeActive,
}

/// Errors raised while validating device readings and rule updates.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// A required field is absent.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A field is present but has the wrong type.
    #[error("field {field} must be {expected}")]
    TypeMismatch {
        /// The offending field.
        field: &'static str,
        /// Human readable description of the expected type.
        expected: &'static str,
    },

    /// A field has the right type but an unusable value.
    #[error("invalid value for {field}: {message}")]
    InvalidValue {
        /// The offending field.
        field: &'static str,
        /// Description of the problem.
        message: String,
    },

    /// The light open threshold is not strictly below the close threshold.
    #[error("light open threshold {open} must be less than close threshold {close}")]
    InvalidThresholds {
        /// Light level below which the curtain opens.
        open: i32,
        /// Light level above which the curtain closes.
        close: i32,
    },
}

/// Errors reported by a [`DocumentStore`](crate::store::DocumentStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store cannot be reached; the engine runs degraded.
    #[error("document store unavailable")]
    Unavailable,

    /// A store round trip exceeded its deadline.
    #[error("store operation timed out after {0} ms")]
    Timeout(u64),

    /// A document could not be converted to or from its typed form.
    #[error("document serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors related to the message channel.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// MQTT client request failed.
    #[cfg(feature = "mqtt")]
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// Connection to the broker failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The channel is not connected.
    #[error("message channel is not connected")]
    NotConnected,

    /// Invalid broker address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Internal channel was closed.
    #[error("channel closed: {0}")]
    ChannelClosed(String),

    /// An outbound payload could not be encoded.
    #[error("payload encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Errors related to parsing inbound payloads.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The payload is not valid UTF-8.
    #[error("payload is not valid UTF-8")]
    Utf8,

    /// The topic is not one the engine listens on.
    #[error("unknown topic: {0}")]
    UnknownTopic(String),

    /// Failed to parse a specific value.
    #[error("failed to parse {field}: {message}")]
    InvalidValue {
        /// The field that failed to parse.
        field: String,
        /// Description of the parsing failure.
        message: String,
    },
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
