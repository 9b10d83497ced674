/*
 * mod.rs
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

//! SMTP submission transport: one connection per message, closed after QUIT.
//! Supports implicit TLS (465), STARTTLS (587/25) and optional AUTH.

mod build_mime;
mod client;
pub mod dot_stuffer;

pub use build_mime::{compose, estimate_size};
pub use dot_stuffer::DotStuffer;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_rustls::rustls::ClientConfig;
use tokio_rustls::TlsConnector;

use crate::error::MailError;
use crate::message::MessageSpec;
use crate::sasl::SaslMechanism;
use crate::sink::{self, Sink};

pub const DEFAULT_PORT: u16 = 25;
pub const IMPLICIT_TLS_PORT: u16 = 465;

/// Externally supplied login. For XOAUTH2 `secret` is the access token.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub secret: String,
    pub mechanism: SaslMechanism,
}

impl Credentials {
    pub fn new(username: impl Into<String>, secret: impl Into<String>, mechanism: SaslMechanism) -> Self {
        Self {
            username: username.into(),
            secret: secret.into(),
            mechanism,
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("mechanism", &self.mechanism)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct SmtpTransport {
    host: String,
    port: u16,
    use_implicit_tls: bool,
    use_starttls: bool,
    ehlo_hostname: Option<String>,
    auth: Option<Credentials>,
    spool_dir: PathBuf,
    /// None: platform roots via `net::default_connector`.
    tls_config: Option<Arc<ClientConfig>>,
}

impl SmtpTransport {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            use_implicit_tls: port == IMPLICIT_TLS_PORT,
            use_starttls: true,
            ehlo_hostname: None,
            auth: None,
            spool_dir: PathBuf::from("."),
            tls_config: None,
        }
    }

    /// Parse `hostname[:port]`. The port defaults to 25; `[v6addr]:port` is accepted.
    pub fn from_host_string(s: &str) -> Result<Self, MailError> {
        let (host, port) = split_host_port(s)?;
        Ok(Self::new(host, port))
    }

    /// Use implicit TLS (e.g. 465). Default is true when port is 465.
    pub fn set_implicit_tls(&mut self, use_tls: bool) -> &mut Self {
        self.use_implicit_tls = use_tls;
        self
    }

    /// Use STARTTLS when the server advertises it on a plain connection. Default true.
    pub fn set_use_starttls(&mut self, use_starttls: bool) -> &mut Self {
        self.use_starttls = use_starttls;
        self
    }

    pub fn set_auth(&mut self, credentials: Credentials) -> &mut Self {
        self.auth = Some(credentials);
        self
    }

    /// Name sent with EHLO/HELO. Defaults to the host being connected to.
    pub fn set_ehlo_hostname(&mut self, name: impl Into<String>) -> &mut Self {
        let name = name.into();
        self.ehlo_hostname = if name.trim().is_empty() { None } else { Some(name) };
        self
    }

    /// Directory for spool files of large messages. Default is the working directory.
    pub fn set_spool_dir(&mut self, dir: impl Into<PathBuf>) -> &mut Self {
        self.spool_dir = dir.into();
        self
    }

    /// TLS client settings for STARTTLS and implicit TLS, e.g. a private trust root.
    pub fn set_tls_config(&mut self, config: Arc<ClientConfig>) -> &mut Self {
        self.tls_config = Some(config);
        self
    }

    fn tls_connector(&self) -> TlsConnector {
        match &self.tls_config {
            Some(config) => TlsConnector::from(Arc::clone(config)),
            None => crate::net::default_connector().clone(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn spool_dir(&self) -> &Path {
        &self.spool_dir
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.auth.as_ref()
    }

    fn ehlo_name(&self) -> &str {
        self.ehlo_hostname.as_deref().unwrap_or(&self.host)
    }

    /// Submit the message already composed into `body`. Blocks until QUIT completes or the
    /// first failure. The sink is rewound before reading.
    pub fn send(&self, spec: &MessageSpec, body: &mut dyn Sink) -> Result<(), MailError> {
        spec.validate()?;
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(MailError::Transport)?;
        rt.block_on(client::run_session(self, spec, body))
    }

    /// `send` for callers already running inside a tokio runtime.
    ///
    /// The sink is read with blocking `std::io::Read` between socket writes. On a multi-thread
    /// runtime a spooled message therefore occupies a worker thread while it streams; run it
    /// under `spawn_blocking` or a current-thread runtime when that matters.
    pub async fn send_async(&self, spec: &MessageSpec, body: &mut dyn Sink) -> Result<(), MailError> {
        spec.validate()?;
        client::run_session(self, spec, body).await
    }

    /// Validate, estimate, pick a sink, compose into it, then send. The sink (and any spool
    /// file) is dropped before returning.
    pub fn deliver(&self, spec: &MessageSpec) -> Result<(), MailError> {
        spec.validate()?;
        let estimate = estimate_size(spec)?;
        let mut body = sink::select_sink(estimate, &self.spool_dir)?;
        compose(spec, &mut body)?;
        self.send(spec, body.as_mut())
    }
}

fn split_host_port(s: &str) -> Result<(&str, u16), MailError> {
    let s = s.trim();
    let (host, port) = if let Some(rest) = s.strip_prefix('[') {
        let end = rest
            .find(']')
            .ok_or_else(|| MailError::config(format!("invalid host {:?}", s)))?;
        let tail = &rest[end + 1..];
        let port = match tail.strip_prefix(':') {
            Some(p) => Some(p),
            None if tail.is_empty() => None,
            None => return Err(MailError::config(format!("invalid host {:?}", s))),
        };
        (&rest[..end], port)
    } else {
        match s.rsplit_once(':') {
            Some((h, p)) => (h, Some(p)),
            None => (s, None),
        }
    };
    if host.is_empty() {
        return Err(MailError::config("host is empty"));
    }
    let port = match port {
        None => DEFAULT_PORT,
        Some(p) => p
            .parse::<u16>()
            .ok()
            .filter(|&p| p != 0)
            .ok_or_else(|| MailError::config(format!("invalid port {:?}", p)))?,
    };
    Ok((host, port))
}
