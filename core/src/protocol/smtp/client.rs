/*
 * client.rs
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

//! Async SMTP submission session: greeting, EHLO, STARTTLS, AUTH, MAIL FROM, RCPT TO, DATA, QUIT.
//!
//! One session sends one message and then closes. The first failure ends the session; after a
//! rejected reply a best-effort QUIT is still sent. The socket is shut down on every path.

use std::io;
use std::net::IpAddr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_rustls::TlsConnector;

use super::{Credentials, SmtpTransport};
use crate::error::MailError;
use crate::message::MessageSpec;
use crate::net::SmtpStream;
use crate::protocol::smtp::dot_stuffer::DotStuffer;
use crate::sasl;
use crate::sink::Sink;

const DATA_CHUNK: usize = 8192;

/// Parsed SMTP reply (code + text of each line).
#[derive(Debug)]
struct Reply {
    code: u16,
    lines: Vec<String>,
}

impl Reply {
    fn message(&self) -> String {
        self.lines.join(" ")
    }

    fn is_positive(&self) -> bool {
        (200..300).contains(&self.code)
    }

    fn reject(&self, stage: &'static str) -> MailError {
        MailError::rejected(stage, self.code, self.message())
    }
}

/// What the server advertised in its EHLO reply.
#[derive(Debug, Default, PartialEq, Eq)]
struct Extensions {
    starttls: bool,
    auth: Vec<String>,
}

impl Extensions {
    /// The first line is the server greeting; keywords start on the second.
    fn parse(reply: &Reply) -> Self {
        let mut ext = Extensions::default();
        for line in reply.lines.iter().skip(1) {
            let mut words = line.split_whitespace();
            let Some(keyword) = words.next() else { continue };
            let keyword = keyword.to_ascii_uppercase();
            if keyword == "STARTTLS" {
                ext.starttls = true;
            } else if keyword == "AUTH" || keyword.starts_with("AUTH=") {
                let inline = keyword.strip_prefix("AUTH=").filter(|s| !s.is_empty());
                for mech in inline.into_iter().map(str::to_string).chain(words.map(str::to_ascii_uppercase)) {
                    if !ext.auth.contains(&mech) {
                        ext.auth.push(mech);
                    }
                }
            }
        }
        ext
    }

    fn supports(&self, mechanism: sasl::SaslMechanism) -> bool {
        self.auth.iter().any(|m| m == mechanism.name())
    }
}

/// Read one reply, following `NNN-` continuation lines.
async fn read_reply<R>(reader: &mut R, stage: &'static str) -> Result<Reply, MailError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = Vec::new();
    let mut buf = Vec::with_capacity(128);
    loop {
        buf.clear();
        let n = reader.read_until(b'\n', &mut buf).await.map_err(MailError::Transport)?;
        if n == 0 {
            return Err(MailError::Transport(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("connection closed during {}", stage),
            )));
        }
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\r', '\n']);
        let code = line
            .get(..3)
            .filter(|c| c.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|c| c.parse::<u16>().ok())
            .ok_or_else(|| MailError::protocol(stage, format!("malformed reply {:?}", line)))?;
        let continuation = line.as_bytes().get(3) == Some(&b'-');
        lines.push(line.get(4..).unwrap_or("").trim().to_string());
        tracing::debug!("< {}", line);
        if !continuation {
            return Ok(Reply { code, lines });
        }
    }
}

fn is_loopback(host: &str) -> bool {
    host.eq_ignore_ascii_case("localhost")
        || host
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<IpAddr>()
            .map(|ip| ip.is_loopback())
            .unwrap_or(false)
}

struct Session {
    /// None once the stream has been consumed by a failed TLS upgrade.
    conn: Option<BufReader<SmtpStream>>,
    connector: TlsConnector,
    quit_sent: bool,
}

impl Session {
    fn conn(&mut self) -> Result<&mut BufReader<SmtpStream>, MailError> {
        self.conn.as_mut().ok_or_else(|| {
            MailError::Transport(io::Error::new(io::ErrorKind::NotConnected, "connection closed"))
        })
    }

    async fn write_raw(&mut self, bytes: &[u8]) -> Result<(), MailError> {
        let conn = self.conn()?.get_mut();
        conn.write_all(bytes).await.map_err(MailError::Transport)
    }

    async fn send_line(&mut self, line: &str) -> Result<(), MailError> {
        tracing::debug!("> {}", line);
        self.send_line_quiet(line).await
    }

    /// Like `send_line` without logging the payload (credentials).
    async fn send_line_quiet(&mut self, line: &str) -> Result<(), MailError> {
        let conn = self.conn()?.get_mut();
        conn.write_all(line.as_bytes()).await.map_err(MailError::Transport)?;
        conn.write_all(b"\r\n").await.map_err(MailError::Transport)?;
        conn.flush().await.map_err(MailError::Transport)
    }

    async fn reply(&mut self, stage: &'static str) -> Result<Reply, MailError> {
        read_reply(self.conn()?, stage).await
    }

    async fn command(&mut self, line: &str, stage: &'static str) -> Result<Reply, MailError> {
        self.send_line(line).await?;
        self.reply(stage).await
    }

    /// Command whose reply must be 2xx.
    async fn expect_positive(&mut self, line: &str, stage: &'static str) -> Result<Reply, MailError> {
        let r = self.command(line, stage).await?;
        if !r.is_positive() {
            return Err(r.reject(stage));
        }
        Ok(r)
    }

    async fn converse(
        &mut self,
        transport: &SmtpTransport,
        spec: &MessageSpec,
        body: &mut dyn Sink,
    ) -> Result<(), MailError> {
        let greeting = self.reply("greeting").await?;
        if greeting.code != 220 {
            return Err(greeting.reject("greeting"));
        }

        let name = transport.ehlo_name();
        let mut ext = self.hello(name).await?;

        let is_tls = self.conn()?.get_ref().is_tls();
        if !is_tls && transport.use_starttls && ext.starttls {
            self.starttls(transport.host()).await?;
            ext = self.hello(name).await?;
        } else if !is_tls && ext.starttls {
            tracing::warn!("STARTTLS offered but disabled; continuing in plaintext");
        }

        if let Some(creds) = transport.credentials() {
            self.authenticate(transport.host(), creds, &ext).await?;
        }

        self.expect_positive(&format!("MAIL FROM:<{}>", spec.from_address()), "MAIL FROM")
            .await?;
        for rcpt in spec.recipients() {
            self.expect_positive(&format!("RCPT TO:<{}>", rcpt), "RCPT TO").await?;
        }

        let r = self.command("DATA", "DATA").await?;
        if r.code != 354 {
            return Err(r.reject("DATA"));
        }
        let bytes = self.stream_body(body).await?;
        let r = self.reply("DATA").await?;
        if !r.is_positive() {
            return Err(r.reject("DATA"));
        }
        tracing::info!(bytes, recipients = spec.recipients().len(), "message accepted");

        self.quit_sent = true;
        self.expect_positive("QUIT", "QUIT").await?;
        Ok(())
    }

    /// EHLO, falling back to HELO when the server does not know EHLO.
    async fn hello(&mut self, name: &str) -> Result<Extensions, MailError> {
        let r = self.command(&format!("EHLO {}", name), "EHLO").await?;
        if r.is_positive() {
            return Ok(Extensions::parse(&r));
        }
        if r.code != 500 && r.code != 502 {
            return Err(r.reject("EHLO"));
        }
        tracing::warn!(code = r.code, "EHLO rejected, falling back to HELO");
        self.expect_positive(&format!("HELO {}", name), "HELO").await?;
        Ok(Extensions::default())
    }

    async fn starttls(&mut self, host: &str) -> Result<(), MailError> {
        let r = self.command("STARTTLS", "STARTTLS").await?;
        if r.code != 220 {
            return Err(r.reject("STARTTLS"));
        }
        let reader = self.conn.take().ok_or_else(|| MailError::protocol("STARTTLS", "no connection"))?;
        if !reader.buffer().is_empty() {
            return Err(MailError::protocol("STARTTLS", "server sent data before the TLS handshake"));
        }
        let stream = reader
            .into_inner()
            .upgrade_to_tls(&self.connector, host)
            .await
            .map_err(|e| MailError::protocol("STARTTLS", e.to_string()))?;
        tracing::debug!(host, "TLS established");
        self.conn = Some(BufReader::new(stream));
        Ok(())
    }

    async fn authenticate(&mut self, host: &str, creds: &Credentials, ext: &Extensions) -> Result<(), MailError> {
        let mech = creds.mechanism;
        if ext.auth.is_empty() {
            return Err(MailError::protocol("AUTH", "server does not support authentication"));
        }
        if !ext.supports(mech) {
            return Err(MailError::protocol("AUTH", format!("server does not support {}", mech)));
        }
        if mech.requires_tls() && !self.conn()?.get_ref().is_tls() && !is_loopback(host) {
            return Err(MailError::protocol(
                "AUTH",
                format!("refusing {} over an unencrypted connection", mech),
            ));
        }

        let cmd = match sasl::initial_response(mech, &creds.username, &creds.secret) {
            Some(ir) if ir.is_empty() => format!("AUTH {} =", mech),
            Some(ir) => format!("AUTH {} {}", mech, STANDARD.encode(ir)),
            None => format!("AUTH {}", mech),
        };
        tracing::debug!("> AUTH {} ****", mech);
        self.send_line_quiet(&cmd).await?;

        loop {
            let r = self.reply("AUTH").await?;
            match r.code {
                235 => {
                    tracing::debug!(mechanism = %mech, "authenticated");
                    return Ok(());
                }
                334 => {
                    let challenge = r.lines.last().map(String::as_str).unwrap_or("");
                    let response = sasl::respond_to_challenge(mech, challenge, &creds.username, &creds.secret)
                        .map_err(|e| MailError::protocol("AUTH", e.to_string()))?;
                    tracing::debug!("> ****");
                    self.send_line_quiet(&STANDARD.encode(response)).await?;
                }
                _ => return Err(r.reject("AUTH")),
            }
        }
    }

    /// Rewind the sink and send it dot-stuffed, followed by the terminator line.
    async fn stream_body(&mut self, body: &mut dyn Sink) -> Result<u64, MailError> {
        let reader = body.rewind_reader().map_err(MailError::Compose)?;
        let mut stuffer = DotStuffer::new();
        let mut chunk = vec![0u8; DATA_CHUNK];
        let mut out = Vec::with_capacity(DATA_CHUNK + DATA_CHUNK / 8);
        let mut total = 0u64;
        loop {
            let n = match reader.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(MailError::Compose(e)),
            };
            total += n as u64;
            out.clear();
            stuffer.process_chunk(&chunk[..n], |s| out.extend_from_slice(s));
            self.write_raw(&out).await?;
        }
        out.clear();
        stuffer.end_message(|s| out.extend_from_slice(s));
        self.write_raw(&out).await?;
        self.conn()?.get_mut().flush().await.map_err(MailError::Transport)?;
        Ok(total)
    }

    async fn quit_best_effort(&mut self) {
        if self.quit_sent || self.conn.is_none() {
            return;
        }
        self.quit_sent = true;
        if let Err(e) = self.command("QUIT", "QUIT").await {
            tracing::warn!(error = %e, "QUIT after failure did not complete");
        }
    }

    async fn close(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            let _ = conn.get_mut().shutdown().await;
        }
    }
}

/// Run one submission session for `spec`, reading the composed message from `body`.
pub(super) async fn run_session(
    transport: &SmtpTransport,
    spec: &MessageSpec,
    body: &mut dyn Sink,
) -> Result<(), MailError> {
    let connector = transport.tls_connector();
    let stream = SmtpStream::connect(&connector, transport.host(), transport.port, transport.use_implicit_tls)
        .await
        .map_err(MailError::Transport)?;
    tracing::info!(
        host = transport.host(),
        port = transport.port,
        tls = stream.is_tls(),
        "connected"
    );
    let mut session = Session {
        conn: Some(BufReader::new(stream)),
        connector,
        quit_sent: false,
    };
    let result = session.converse(transport, spec, body).await;
    if let Err(MailError::Protocol { .. }) = &result {
        session.quit_best_effort().await;
    }
    session.close().await;
    result
}
