/*
 * base64.rs
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

//! Base64 body encoder for Content-Transfer-Encoding (RFC 2045), wrapped at 76 columns.

use std::io::{self, Read, Write};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Raw bytes per encoded line: 57 bytes encode to exactly 76 characters.
pub const RAW_LINE_LEN: usize = 57;

/// Longest encoded line RFC 2045 allows, excluding CRLF.
pub const MAX_LINE_LEN: usize = 76;

/// Stream `src` into `dst` as CRLF-terminated base64 lines.
/// Every full 57-byte chunk becomes a 76-character line; a final short chunk becomes one shorter,
/// padded line. Empty input writes nothing. Returns the number of raw bytes consumed.
pub fn encode_wrapped<R, W>(src: &mut R, dst: &mut W) -> io::Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut raw = [0u8; RAW_LINE_LEN];
    let mut line = [0u8; MAX_LINE_LEN + 2];
    let mut total = 0u64;
    loop {
        let n = fill(src, &mut raw)?;
        if n == 0 {
            return Ok(total);
        }
        total += n as u64;
        let len = STANDARD
            .encode_slice(&raw[..n], &mut line[..MAX_LINE_LEN])
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        line[len] = b'\r';
        line[len + 1] = b'\n';
        dst.write_all(&line[..len + 2])?;
        if n < RAW_LINE_LEN {
            return Ok(total);
        }
    }
}

/// Read until `buf` is full or the source is exhausted; short reads are retried.
fn fill<R: Read + ?Sized>(src: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match src.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
