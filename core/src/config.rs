/*
 * config.rs
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

//! Command configuration: a JSON file (all fields optional) with command-line overrides on top.
//! When no password is configured it can be read from the system keychain (service `postino`,
//! account = user name).

use std::fs;
use std::path::{Path, PathBuf};

use keyring::Entry;
use serde::Deserialize;

use crate::error::MailError;
use crate::message::{BodySource, MessageSpec};
use crate::protocol::smtp::{Credentials, SmtpTransport};
use crate::sasl::SaslMechanism;

const KEYRING_SERVICE: &str = "postino";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MailConfig {
    pub user: String,
    pub password: String,
    /// `hostname[:port]`
    pub host: String,
    pub from: String,
    /// Comma-delimited recipients.
    pub to: String,
    /// Text subtype of the body (`plain`, `html`).
    #[serde(rename = "type")]
    pub content_type: String,
    pub subject: String,
    pub content: String,
    pub content_path: Option<PathBuf>,
    /// Comma-delimited attachment paths.
    pub attachments: String,
    pub ehlo_hostname: Option<String>,
    pub starttls: bool,
    /// Unset means implicit TLS on port 465 only.
    pub implicit_tls: Option<bool>,
    pub mechanism: SaslMechanism,
    pub spool_dir: Option<PathBuf>,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            user: String::new(),
            password: String::new(),
            host: String::new(),
            from: String::new(),
            to: String::new(),
            content_type: "plain".to_string(),
            subject: String::new(),
            content: String::new(),
            content_path: None,
            attachments: String::new(),
            ehlo_hostname: None,
            starttls: true,
            implicit_tls: None,
            mechanism: SaslMechanism::default(),
            spool_dir: None,
        }
    }
}

/// Field-by-field overrides (command-line flags). `None` keeps the configured value.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub user: Option<String>,
    pub password: Option<String>,
    pub host: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub content_type: Option<String>,
    pub subject: Option<String>,
    pub content: Option<String>,
    pub content_path: Option<PathBuf>,
    pub attachments: Option<String>,
    pub ehlo_hostname: Option<String>,
    pub starttls: Option<bool>,
    pub implicit_tls: Option<bool>,
    pub mechanism: Option<SaslMechanism>,
    pub spool_dir: Option<PathBuf>,
}

impl MailConfig {
    pub fn load(path: &Path) -> Result<Self, MailError> {
        let text = fs::read_to_string(path)
            .map_err(|e| MailError::config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json(&text).map_err(|e| match e {
            MailError::Config(msg) => MailError::config(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    pub fn from_json(text: &str) -> Result<Self, MailError> {
        serde_json::from_str(text).map_err(|e| MailError::config(e.to_string()))
    }

    pub fn apply(&mut self, o: Overrides) {
        fn set<T>(field: &mut T, value: Option<T>) {
            if let Some(v) = value {
                *field = v;
            }
        }
        set(&mut self.user, o.user);
        set(&mut self.password, o.password);
        set(&mut self.host, o.host);
        set(&mut self.from, o.from);
        set(&mut self.to, o.to);
        set(&mut self.content_type, o.content_type);
        set(&mut self.subject, o.subject);
        set(&mut self.content, o.content);
        set(&mut self.attachments, o.attachments);
        set(&mut self.starttls, o.starttls);
        set(&mut self.mechanism, o.mechanism);
        if o.content_path.is_some() {
            self.content_path = o.content_path;
        }
        if o.ehlo_hostname.is_some() {
            self.ehlo_hostname = o.ehlo_hostname;
        }
        if o.implicit_tls.is_some() {
            self.implicit_tls = o.implicit_tls;
        }
        if o.spool_dir.is_some() {
            self.spool_dir = o.spool_dir;
        }
    }

    /// Fill an empty password from the keychain. Leaves it empty when there is no entry.
    pub fn resolve_password(&mut self) -> Result<(), MailError> {
        if self.password.is_empty() && !self.user.is_empty() {
            if let Some(p) = password_from_keychain(&self.user)? {
                tracing::debug!(user = %self.user, "password read from keychain");
                self.password = p;
            }
        }
        Ok(())
    }

    /// Every required field, named in the error.
    pub fn validate(&self) -> Result<(), MailError> {
        for (name, value) in [
            ("user", &self.user),
            ("password", &self.password),
            ("host", &self.host),
            ("from", &self.from),
            ("to", &self.to),
        ] {
            if value.trim().is_empty() {
                return Err(MailError::config(format!("{} is required", name)));
            }
        }
        Ok(())
    }

    pub fn message_spec(&self) -> MessageSpec {
        let content = Some(self.content.as_str());
        MessageSpec::new(self.from.as_str(), &self.to)
            .subject(self.subject.as_str())
            .body(BodySource::from_parts(content, self.content_path.as_deref()))
            .subtype(self.content_type.as_str())
            .attachments(&self.attachments)
    }

    pub fn transport(&self) -> Result<SmtpTransport, MailError> {
        let mut t = SmtpTransport::from_host_string(&self.host)?;
        t.set_use_starttls(self.starttls);
        if let Some(implicit) = self.implicit_tls {
            t.set_implicit_tls(implicit);
        }
        if let Some(name) = &self.ehlo_hostname {
            t.set_ehlo_hostname(name.as_str());
        }
        if let Some(dir) = &self.spool_dir {
            t.set_spool_dir(dir);
        }
        if !self.user.is_empty() {
            t.set_auth(Credentials::new(
                self.user.as_str(),
                self.password.as_str(),
                self.mechanism,
            ));
        }
        Ok(t)
    }
}

/// Look up the stored secret for `user`. `Ok(None)` when there is no entry or no usable keychain
/// on this host, so a missing password is reported by `validate`.
pub fn password_from_keychain(user: &str) -> Result<Option<String>, MailError> {
    let lookup = Entry::new(KEYRING_SERVICE, user).and_then(|entry| entry.get_password());
    keychain_outcome(user, lookup)
}

fn keychain_outcome(user: &str, lookup: keyring::Result<String>) -> Result<Option<String>, MailError> {
    match lookup {
        Ok(p) => Ok(Some(p)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(keyring::Error::PlatformFailure(e)) | Err(keyring::Error::NoStorageAccess(e)) => {
            tracing::debug!(user, error = %e, "keychain not available");
            Ok(None)
        }
        Err(e) => Err(MailError::config(format!("keychain lookup for {} failed: {}", user, e))),
    }
}
