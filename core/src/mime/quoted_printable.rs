/*
 * quoted_printable.rs
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

//! Quoted-Printable encoder for Content-Transfer-Encoding (RFC 2045).
//!
//! Streams a text source line by line: each line is encoded on its own (soft breaks at 76 columns),
//! and every LF or CRLF line terminator in the source becomes a hard CRLF break.

use std::io::{self, BufRead, Write};

/// Encode everything from `src` into `dst`. Returns the number of source bytes consumed.
pub fn encode_stream<R, W>(src: &mut R, dst: &mut W) -> io::Result<u64>
where
    R: BufRead + ?Sized,
    W: Write + ?Sized,
{
    let mut line = Vec::with_capacity(256);
    let mut total = 0u64;
    loop {
        line.clear();
        let n = src.read_until(b'\n', &mut line)?;
        if n == 0 {
            return Ok(total);
        }
        total += n as u64;
        let terminated = strip_terminator(&mut line);
        dst.write_all(&quoted_printable::encode(&line))?;
        if terminated {
            dst.write_all(b"\r\n")?;
        }
    }
}

/// Convenience for in-memory text.
pub fn encode_text<W: Write + ?Sized>(text: &str, dst: &mut W) -> io::Result<u64> {
    encode_stream(&mut text.as_bytes(), dst)
}

/// Remove a trailing LF or CRLF; returns whether one was present.
fn strip_terminator(line: &mut Vec<u8>) -> bool {
    if line.last() != Some(&b'\n') {
        return false;
    }
    line.pop();
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    true
}
