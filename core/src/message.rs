/*
 * message.rs
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

//! Outgoing message description.

use std::path::{Path, PathBuf};

use crate::error::MailError;

/// Where the text body comes from. The alternative part is only emitted for `InlineText` and `FileText`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodySource {
    NoBody,
    InlineText(String),
    FileText(PathBuf),
}

impl BodySource {
    /// Inline text wins over a path when both are given; empty values count as absent.
    pub fn from_parts(content: Option<&str>, content_path: Option<&Path>) -> Self {
        match (content, content_path) {
            (Some(text), _) if !text.is_empty() => BodySource::InlineText(text.to_string()),
            (_, Some(path)) if !path.as_os_str().is_empty() => BodySource::FileText(path.to_path_buf()),
            _ => BodySource::NoBody,
        }
    }

    pub fn is_present(&self) -> bool {
        !matches!(self, BodySource::NoBody)
    }
}

/// One outgoing email. Built once, then composed and sent; never mutated in between.
#[derive(Debug, Clone)]
pub struct MessageSpec {
    from: String,
    to: Vec<String>,
    subject: String,
    body: BodySource,
    subtype: String,
    attachments: Vec<PathBuf>,
}

impl MessageSpec {
    /// `to` is a comma-delimited recipient list; order is preserved.
    pub fn new(from: impl Into<String>, to: &str) -> Self {
        Self {
            from: from.into().trim().to_string(),
            to: split_list(to),
            subject: String::new(),
            body: BodySource::NoBody,
            subtype: "plain".to_string(),
            attachments: Vec::new(),
        }
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn body(mut self, body: BodySource) -> Self {
        self.body = body;
        self
    }

    pub fn text(self, text: impl Into<String>) -> Self {
        self.body(BodySource::InlineText(text.into()))
    }

    /// Content subtype of the text part (`plain`, `html`). Empty keeps `plain`.
    pub fn subtype(mut self, subtype: impl Into<String>) -> Self {
        let subtype = subtype.into();
        if !subtype.trim().is_empty() {
            self.subtype = subtype.trim().to_string();
        }
        self
    }

    /// Comma-delimited attachment paths, in send order.
    pub fn attachments(mut self, list: &str) -> Self {
        self.attachments = split_list(list).into_iter().map(PathBuf::from).collect();
        self
    }

    pub fn attach(mut self, path: impl Into<PathBuf>) -> Self {
        self.attachments.push(path.into());
        self
    }

    pub fn from_address(&self) -> &str {
        &self.from
    }

    pub fn recipients(&self) -> &[String] {
        &self.to
    }

    pub fn subject_text(&self) -> &str {
        &self.subject
    }

    pub fn body_source(&self) -> &BodySource {
        &self.body
    }

    pub fn content_subtype(&self) -> &str {
        &self.subtype
    }

    pub fn attachment_paths(&self) -> &[PathBuf] {
        &self.attachments
    }

    /// Sender and at least one recipient are required.
    pub fn validate(&self) -> Result<(), MailError> {
        if self.from.is_empty() {
            return Err(MailError::config("a From address is required"));
        }
        if self.to.is_empty() {
            return Err(MailError::config("at least one To address is required"));
        }
        Ok(())
    }
}

/// Split a comma-delimited list, trimming entries and dropping empty ones.
pub fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
