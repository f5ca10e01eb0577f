/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - GRAPHWATCH Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use graphwatch_protocol::ActionOutcome;
use thiserror::Error;

/// Failures reported by the remote relationship-graph client.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("session rejected by remote service: {0}")]
    Auth(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("remote call failed: {0}")]
    Transient(String),
}

impl RemoteError {
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    pub fn outcome(&self) -> ActionOutcome {
        match self {
            Self::NotFound(_) => ActionOutcome::NotFound,
            _ => ActionOutcome::Error,
        }
    }
}

#[derive(Debug, Error)]
pub enum GraphError {
    /// Session invalid or expired; the caller must log in again.
    #[error("authentication required ({context}): {message}")]
    Auth { context: String, message: String },
    #[error("{context}: not found")]
    NotFound { context: String },
    #[error("{context}: {message}")]
    Transient { context: String, message: String },
    #[error("storage error ({context}): {source:#}")]
    Storage {
        context: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("pending-link queue unavailable: {source:#}")]
    QueueConnection {
        #[source]
        source: anyhow::Error,
    },
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl GraphError {
    pub fn remote(context: impl Into<String>, err: RemoteError) -> Self {
        let context = context.into();
        match err {
            RemoteError::Auth(message) => Self::Auth { context, message },
            RemoteError::NotFound(_) => Self::NotFound { context },
            RemoteError::Transient(message) => Self::Transient { context, message },
        }
    }

    pub fn storage(context: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Storage {
            context: context.into(),
            source,
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }
}

pub type GraphResult<T> = std::result::Result<T, GraphError>;
