/*
 * lib.rs
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

//! Postino core: compose a MIME message from a [`MessageSpec`] into a spooling [`Sink`] and
//! submit it over SMTP with STARTTLS and SASL authentication.
//!
//! ```no_run
//! use postino_core::{MessageSpec, SmtpTransport};
//!
//! let spec = MessageSpec::new("me@example.com", "you@example.com")
//!     .subject("Report")
//!     .text("See attached.")
//!     .attach("report.pdf");
//! let transport = SmtpTransport::from_host_string("localhost:25")?;
//! transport.deliver(&spec)?;
//! # Ok::<(), postino_core::MailError>(())
//! ```

pub mod config;
pub mod error;
pub mod message;
pub mod mime;
pub mod net;
pub mod protocol;
pub mod sasl;
pub mod sink;

pub use config::MailConfig;
pub use error::MailError;
pub use message::{BodySource, MessageSpec};
pub use protocol::smtp::{compose, estimate_size, Credentials, SmtpTransport};
pub use sasl::SaslMechanism;
pub use sink::{select_sink, Backing, MemorySink, Sink, SpoolFile, SPOOL_THRESHOLD};
