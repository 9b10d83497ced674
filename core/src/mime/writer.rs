/*
 * writer.rs
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

//! Streaming multipart writer. Keeps a stack of open multipart boundaries; parts are delimited
//! in the innermost one and closing pops in LIFO order.

use std::io::{self, Write};

use super::rfc2047::encode_q;
use super::utils::{generate_boundary, is_valid_boundary};

struct Level {
    boundary: String,
    parts: usize,
}

pub struct MimeWriter<'a, W: Write + ?Sized> {
    out: &'a mut W,
    open: Vec<Level>,
}

impl<'a, W: Write + ?Sized> MimeWriter<'a, W> {
    pub fn new(out: &'a mut W) -> Self {
        Self {
            out,
            open: Vec::new(),
        }
    }

    /// Free-text header; the value is Q-encoded when it is not plain ASCII.
    pub fn text_header(&mut self, name: &str, value: &str) -> io::Result<()> {
        self.raw_header(name, &encode_q(value))
    }

    /// Structural header (Content-Type, Content-Disposition, ...), written as given.
    pub fn raw_header(&mut self, name: &str, value: &str) -> io::Result<()> {
        self.out.write_all(name.as_bytes())?;
        self.out.write_all(b": ")?;
        self.out.write_all(value.as_bytes())?;
        self.out.write_all(b"\r\n")
    }

    /// Blank line ending a header block.
    pub fn end_headers(&mut self) -> io::Result<()> {
        self.out.write_all(b"\r\n")
    }

    /// Write the multipart Content-Type for the current entity, end its headers and open a new level.
    /// Returns the generated boundary.
    pub fn begin_multipart(&mut self, subtype: &str) -> io::Result<String> {
        let boundary = generate_boundary()?;
        debug_assert!(is_valid_boundary(&boundary));
        self.raw_header(
            "Content-Type",
            &format!("multipart/{};\r\n boundary={}", subtype, boundary),
        )?;
        self.end_headers()?;
        self.open.push(Level {
            boundary: boundary.clone(),
            parts: 0,
        });
        Ok(boundary)
    }

    /// Delimiter starting the next part of the innermost multipart. The caller writes the part headers.
    pub fn delimiter(&mut self) -> io::Result<()> {
        let level = self.open.last_mut().ok_or_else(no_open_multipart)?;
        if level.parts > 0 {
            self.out.write_all(b"\r\n")?;
        }
        level.parts += 1;
        self.out.write_all(b"--")?;
        self.out.write_all(level.boundary.as_bytes())?;
        self.out.write_all(b"\r\n")
    }

    /// Delimiter, structural headers and the blank line; the body follows.
    pub fn begin_part(&mut self, headers: &[(&str, &str)]) -> io::Result<()> {
        self.delimiter()?;
        for (name, value) in headers {
            self.raw_header(name, value)?;
        }
        self.end_headers()
    }

    /// Body bytes of the current part.
    pub fn body(&mut self) -> &mut W {
        &mut *self.out
    }

    /// Close the innermost multipart.
    pub fn end_multipart(&mut self) -> io::Result<()> {
        let level = self.open.pop().ok_or_else(no_open_multipart)?;
        if level.parts > 0 {
            self.out.write_all(b"\r\n")?;
        }
        self.out.write_all(b"--")?;
        self.out.write_all(level.boundary.as_bytes())?;
        self.out.write_all(b"--\r\n")
    }

    /// Close whatever is still open and flush.
    pub fn finish(mut self) -> io::Result<()> {
        while !self.open.is_empty() {
            self.end_multipart()?;
        }
        self.out.flush()
    }
}

fn no_open_multipart() -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, "no open multipart")
}
