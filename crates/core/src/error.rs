// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stable, user-visible error taxonomy shared across every component.
//!
//! Drivers and adapters translate their own error types into [`ErrorKind`]
//! at their boundary; nothing above storage/supervisor/hub boundaries should
//! ever match on a driver-specific error type.

use thiserror::Error;

/// A stable, machine-readable error kind. Every externally reachable
/// operation fails with one of these, never a raw driver error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    AlreadyExists,
    Conflict,
    VersionMismatch,
    Unauthorized,
    Forbidden,
    Timeout,
    Cancelled,
    RateLimited,
    ConnectionFailed,
    TransactionFailed,
    SpawnFailed,
    ProcessCrashed,
    SlowConsumer,
    CircuitOpen,
    Internal,
}

impl ErrorKind {
    /// Transient kinds are retried internally per the retry policies owned
    /// by the lifecycle orchestrator; terminal kinds are surfaced as-is.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            ErrorKind::ConnectionFailed | ErrorKind::Timeout | ErrorKind::TransactionFailed | ErrorKind::SpawnFailed
        )
    }
}

crate::simple_display! {
    ErrorKind {
        InvalidInput => "invalid_input",
        NotFound => "not_found",
        AlreadyExists => "already_exists",
        Conflict => "conflict",
        VersionMismatch => "version_mismatch",
        Unauthorized => "unauthorized",
        Forbidden => "forbidden",
        Timeout => "timeout",
        Cancelled => "cancelled",
        RateLimited => "rate_limited",
        ConnectionFailed => "connection_failed",
        TransactionFailed => "transaction_failed",
        SpawnFailed => "spawn_failed",
        ProcessCrashed => "process_crashed",
        SlowConsumer => "slow_consumer",
        CircuitOpen => "circuit_open",
        Internal => "internal",
    }
}

/// The error type returned by every externally reachable operation in this
/// workspace: a stable kind plus a human-readable message.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct CoreError {
    pub kind: ErrorKind,
    pub message: String,
}

impl CoreError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    pub fn version_mismatch(expected: u64, actual: u64) -> Self {
        Self::new(
            ErrorKind::VersionMismatch,
            format!("expected version {expected}, found {actual}"),
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
