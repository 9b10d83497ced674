/*
 * error.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Postino, a command-line mail submission tool.
 *
 * Postino is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Postino is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Postino.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Errors from composing and submitting a message.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// First failure of a compose or send. Every layer stops at the first error; nothing is retried.
#[derive(Debug, Error)]
pub enum MailError {
    /// Missing or malformed required input, detected before any I/O.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A body or attachment file could not be stat'd while estimating the message size.
    #[error("cannot determine size of {}: {source}", path.display())]
    SizeEstimation {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Writing the message into its sink (or reading a source file) failed.
    #[error("failed to compose message: {0}")]
    Compose(#[source] io::Error),

    /// The server rejected a command, or the exchange did not follow the protocol.
    #[error("{stage} failed: {}", reply_text(*code, message))]
    Protocol {
        stage: &'static str,
        code: Option<u16>,
        message: String,
    },

    /// Connection could not be established, or the socket failed mid-session.
    #[error("transport error: {0}")]
    Transport(#[source] io::Error),
}

impl MailError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Protocol failure without a reply code (e.g. TLS handshake, unsupported mechanism).
    pub fn protocol(stage: &'static str, msg: impl Into<String>) -> Self {
        Self::Protocol {
            stage,
            code: None,
            message: msg.into(),
        }
    }

    pub fn rejected(stage: &'static str, code: u16, msg: impl Into<String>) -> Self {
        Self::Protocol {
            stage,
            code: Some(code),
            message: msg.into(),
        }
    }

    /// Reply code carried by a protocol rejection.
    pub fn reply_code(&self) -> Option<u16> {
        match self {
            MailError::Protocol { code, .. } => *code,
            _ => None,
        }
    }

    pub fn is_config(&self) -> bool {
        matches!(self, MailError::Config(_))
    }
}

fn reply_text(code: Option<u16>, message: &str) -> String {
    match code {
        Some(c) => format!("{} {}", c, message),
        None => message.to_string(),
    }
}
