/*
 * utils.rs
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

//! MIME utilities: boundary generation and validation (RFC 2046), header value quoting.

use std::io;

/// Random bytes per boundary; hex-encoded to 60 characters.
const BOUNDARY_BYTES: usize = 30;

/// Checks if a character is valid in a MIME boundary (RFC 2046).
#[inline]
pub fn is_boundary_char(c: u8) -> bool {
    matches!(c,
        b'0'..=b'9' | b'A'..=b'Z' | b'a'..=b'z' |
        b'\'' | b'(' | b')' | b'+' | b'_' | b',' | b'-' | b'.' |
        b'/' | b':' | b'=' | b'?'
    )
}

/// Validates MIME boundary: 1-70 chars from boundary set (RFC 2046).
pub fn is_valid_boundary(boundary: &str) -> bool {
    let b = boundary.as_bytes();
    (1..=70).contains(&b.len()) && b.iter().copied().all(is_boundary_char)
}

/// New random boundary from the OS random source.
pub fn generate_boundary() -> io::Result<String> {
    let mut raw = [0u8; BOUNDARY_BYTES];
    getrandom::getrandom(&mut raw).map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
    let mut s = String::with_capacity(BOUNDARY_BYTES * 2);
    for b in raw {
        s.push_str(&format!("{:02x}", b));
    }
    Ok(s)
}

/// Escape a filename for use inside a quoted-string parameter.
pub fn quote_parameter(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
