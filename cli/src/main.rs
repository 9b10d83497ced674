/*
 * main.rs
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

//! postino: compose a message from the command line and submit it over SMTP.
//!
//! Flags override values from the optional JSON `--config` file. Set `RUST_LOG=debug` to trace
//! the SMTP dialogue (credentials are masked).

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use postino_core::config::{MailConfig, Overrides};
use postino_core::{MailError, SaslMechanism};

/// Send an email with optional text body and attachments
#[derive(Parser, Debug)]
#[command(name = "postino")]
#[command(about = "Send an email through an SMTP submission server", long_about = None)]
#[command(version)]
struct Cli {
    /// JSON file with default values for any of the options below
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Login name; the password is read from the keychain when not given
    #[arg(short, long)]
    user: Option<String>,

    #[arg(short, long)]
    password: Option<String>,

    /// Server as hostname[:port]; port 465 uses implicit TLS
    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    from: Option<String>,

    /// Comma-separated recipients
    #[arg(long)]
    to: Option<String>,

    /// Text subtype of the body (plain, html)
    #[arg(long = "type")]
    content_type: Option<String>,

    #[arg(short, long)]
    subject: Option<String>,

    /// Inline body text; wins over --content-path
    #[arg(long)]
    content: Option<String>,

    /// File holding the body text
    #[arg(long)]
    content_path: Option<PathBuf>,

    /// Comma-separated files to attach
    #[arg(short, long)]
    attachments: Option<String>,

    /// Name announced in EHLO (default: the server host)
    #[arg(long)]
    ehlo_hostname: Option<String>,

    /// Do not upgrade with STARTTLS even when the server offers it
    #[arg(long)]
    no_starttls: bool,

    /// Connect with TLS from the start regardless of port
    #[arg(long)]
    implicit_tls: bool,

    /// SASL mechanism: PLAIN, LOGIN, CRAM-MD5, XOAUTH2
    #[arg(short, long)]
    mechanism: Option<SaslMechanism>,

    /// Directory for the temporary spool file of large messages
    #[arg(long)]
    spool_dir: Option<PathBuf>,
}

impl Cli {
    fn overrides(self) -> Overrides {
        Overrides {
            user: self.user,
            password: self.password,
            host: self.host,
            from: self.from,
            to: self.to,
            content_type: self.content_type,
            subject: self.subject,
            content: self.content,
            content_path: self.content_path,
            attachments: self.attachments,
            ehlo_hostname: self.ehlo_hostname,
            starttls: self.no_starttls.then_some(false),
            implicit_tls: self.implicit_tls.then_some(true),
            mechanism: self.mechanism,
            spool_dir: self.spool_dir,
        }
    }
}

fn run(cli: Cli) -> Result<(), MailError> {
    let mut config = match &cli.config {
        Some(path) => MailConfig::load(path)?,
        None => MailConfig::default(),
    };
    config.apply(cli.overrides());
    config.resolve_password()?;
    config.validate()?;

    let spec = config.message_spec();
    let transport = config.transport()?;
    transport.deliver(&spec)?;
    tracing::info!(to = %spec.recipients().join(", "), "sent");
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("postino: {}", e);
            ExitCode::FAILURE
        }
    }
}
