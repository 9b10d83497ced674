/*
 * build_mime.rs
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

//! Compose the RFC 5322 / MIME message for a MessageSpec straight into a sink.
//!
//! Layout: top-level headers, then `multipart/mixed` holding an optional `multipart/alternative`
//! text section followed by one base64 part per attachment.

use std::fs::{self, File};
use std::io::{self, BufReader, Write};
use std::path::Path;

use crate::error::MailError;
use crate::message::{BodySource, MessageSpec};
use crate::mime::{self, content_type, quote_parameter, MimeWriter};

/// Advisory size of the message: body length plus attachment sizes, without MIME overhead.
/// Only used to choose the sink backing.
pub fn estimate_size(spec: &MessageSpec) -> Result<u64, MailError> {
    let mut total = match spec.body_source() {
        BodySource::NoBody => 0,
        BodySource::InlineText(text) => text.len() as u64,
        BodySource::FileText(path) => file_size(path)?,
    };
    for path in spec.attachment_paths() {
        total += file_size(path)?;
    }
    Ok(total)
}

fn file_size(path: &Path) -> Result<u64, MailError> {
    fs::metadata(path)
        .map(|m| m.len())
        .map_err(|source| MailError::SizeEstimation {
            path: path.to_path_buf(),
            source,
        })
}

/// Write the complete message for `spec` into `sink`. On error the sink holds a partial message
/// and must be discarded.
pub fn compose<W: Write + ?Sized>(spec: &MessageSpec, sink: &mut W) -> Result<(), MailError> {
    write_message(spec, sink).map_err(MailError::Compose)
}

fn write_message<W: Write + ?Sized>(spec: &MessageSpec, sink: &mut W) -> io::Result<()> {
    let mut w = MimeWriter::new(sink);

    let to = spec.recipients().join(", ");
    for (name, value) in [
        ("To", to.as_str()),
        ("Subject", spec.subject_text()),
        ("From", spec.from_address()),
    ] {
        if !value.is_empty() {
            w.text_header(name, value)?;
        }
    }
    w.raw_header("MIME-Version", "1.0")?;
    w.begin_multipart("mixed")?;

    if spec.body_source().is_present() {
        w.delimiter()?;
        w.begin_multipart("alternative")?;
        let ct = content_type::text(spec.content_subtype());
        w.begin_part(&[
            ("Content-Type", ct.as_str()),
            ("Content-Transfer-Encoding", "quoted-printable"),
        ])?;
        match spec.body_source() {
            BodySource::InlineText(text) => {
                mime::quoted_printable::encode_text(text, w.body())?;
            }
            BodySource::FileText(path) => {
                let mut src = BufReader::new(File::open(path).map_err(|e| with_path(e, path))?);
                mime::quoted_printable::encode_stream(&mut src, w.body())?;
            }
            BodySource::NoBody => {}
        }
        w.end_multipart()?;
    }

    for path in spec.attachment_paths() {
        write_attachment(&mut w, path)?;
    }

    w.finish()
}

fn write_attachment<W: Write + ?Sized>(w: &mut MimeWriter<'_, W>, path: &Path) -> io::Result<()> {
    let mut file = File::open(path).map_err(|e| with_path(e, path))?;
    let basename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let disposition = format!("attachment;\r\n filename=\"{}\"", quote_parameter(&basename));
    let content_id = format!("<{}>", basename);
    w.begin_part(&[
        ("Content-Type", content_type::for_path(path)),
        ("Content-Disposition", disposition.as_str()),
        ("Content-ID", content_id.as_str()),
        ("Content-Transfer-Encoding", "base64"),
    ])?;
    let n = mime::base64::encode_wrapped(&mut file, w.body())?;
    tracing::debug!(path = %path.display(), bytes = n, "attached file");
    Ok(())
}

fn with_path(e: io::Error, path: &Path) -> io::Error {
    io::Error::new(e.kind(), format!("{}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn composed(spec: &MessageSpec) -> String {
        let mut out = Vec::new();
        compose(spec, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn headers_in_order_and_encoded() {
        let spec = MessageSpec::new("a@x.com", "b@x.com,c@x.com")
            .subject("caf\u{e9}")
            .text("hello");
        let msg = composed(&spec);
        assert!(msg.starts_with(
            "To: b@x.com, c@x.com\r\nSubject: =?UTF-8?q?caf=C3=A9?=\r\nFrom: a@x.com\r\nMIME-Version: 1.0\r\nContent-Type: multipart/mixed;\r\n boundary="
        ));
    }

    #[test]
    fn empty_subject_omitted() {
        let spec = MessageSpec::new("a@x.com", "b@x.com").text("x");
        assert!(!composed(&spec).contains("Subject:"));
    }

    #[test]
    fn body_wrapped_in_alternative() {
        let spec = MessageSpec::new("a@x.com", "b@x.com").subtype("html").text("<b>hi</b>");
        let msg = composed(&spec);
        assert!(msg.contains("Content-Type: multipart/alternative;\r\n boundary="));
        assert!(msg.contains(
            "Content-Type: text/html; charset=UTF-8\r\nContent-Transfer-Encoding: quoted-printable\r\n\r\n<b>hi</b>\r\n--"
        ));
    }

    #[test]
    fn no_body_means_no_alternative() {
        let spec = MessageSpec::new("a@x.com", "b@x.com");
        let msg = composed(&spec);
        assert!(!msg.contains("multipart/alternative"));
        assert!(msg.ends_with("--\r\n"));
    }

    #[test]
    fn every_boundary_closed_once() {
        let dir = tempfile::tempdir().unwrap();
        let att = dir.path().join("data.bin");
        fs::write(&att, [1u8, 2, 3]).unwrap();
        let spec = MessageSpec::new("a@x.com", "b@x.com").text("hello").attach(&att);
        let msg = composed(&spec);
        let boundaries: Vec<&str> = msg
            .match_indices("boundary=")
            .map(|(i, _)| {
                let rest = &msg[i + "boundary=".len()..];
                &rest[..rest.find("\r\n").unwrap()]
            })
            .collect();
        assert_eq!(boundaries.len(), 2);
        for b in &boundaries {
            assert_eq!(msg.matches(&format!("--{}--\r\n", b)).count(), 1);
        }
        // inner closes before the outer one
        let inner_close = msg.find(&format!("--{}--", boundaries[1])).unwrap();
        let outer_close = msg.find(&format!("--{}--", boundaries[0])).unwrap();
        assert!(inner_close < outer_close);
        assert!(msg.ends_with(&format!("\r\n--{}--\r\n", boundaries[0])));
    }

    #[test]
    fn attachment_headers() {
        let dir = tempfile::tempdir().unwrap();
        let att = dir.path().join("report.pdf");
        fs::write(&att, b"%PDF-1.4").unwrap();
        let spec = MessageSpec::new("a@x.com", "b@x.com").attach(&att);
        let msg = composed(&spec);
        assert!(msg.contains(
            "Content-Type: application/pdf\r\nContent-Disposition: attachment;\r\n filename=\"report.pdf\"\r\nContent-ID: <report.pdf>\r\nContent-Transfer-Encoding: base64\r\n\r\nJVBERi0xLjQ=\r\n"
        ));
    }

    #[test]
    fn estimate_sums_body_and_attachments() {
        let dir = tempfile::tempdir().unwrap();
        let body = dir.path().join("body.txt");
        let att = dir.path().join("a.bin");
        fs::write(&body, vec![b'x'; 100]).unwrap();
        fs::write(&att, vec![0u8; 50]).unwrap();

        let spec = MessageSpec::new("a@x.com", "b@x.com");
        assert_eq!(estimate_size(&spec).unwrap(), 0);

        let spec = MessageSpec::new("a@x.com", "b@x.com").text("hello");
        assert_eq!(estimate_size(&spec).unwrap(), 5);

        let spec = MessageSpec::new("a@x.com", "b@x.com")
            .body(BodySource::FileText(body))
            .attach(&att);
        assert_eq!(estimate_size(&spec).unwrap(), 150);
    }

    #[test]
    fn missing_attachment_fails_estimation() {
        let spec = MessageSpec::new("a@x.com", "b@x.com").attachments("/nonexistent/postino/x.bin");
        match estimate_size(&spec) {
            Err(MailError::SizeEstimation { path, .. }) => {
                assert_eq!(path, Path::new("/nonexistent/postino/x.bin"))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn missing_body_file_fails_compose() {
        let spec = MessageSpec::new("a@x.com", "b@x.com")
            .body(BodySource::FileText("/nonexistent/postino/body.txt".into()));
        let mut out = Vec::new();
        assert!(matches!(compose(&spec, &mut out), Err(MailError::Compose(_))));
    }
}
