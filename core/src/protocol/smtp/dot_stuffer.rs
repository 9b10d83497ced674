/*
 * dot_stuffer.rs
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

//! Dot stuffing for SMTP DATA (RFC 5321 4.5.2: lines starting with . get an extra .).
//! Bare LF is sent as CRLF. State carries across chunks, so input can be streamed.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    /// At the start of a line (also the start of the message).
    LineStart,
    Data,
    SawCr,
}

pub struct DotStuffer {
    state: State,
}

impl Default for DotStuffer {
    fn default() -> Self {
        Self {
            state: State::LineStart,
        }
    }
}

impl DotStuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a chunk; call `out` for each slice to send.
    pub fn process_chunk<F>(&mut self, chunk: &[u8], mut out: F)
    where
        F: FnMut(&[u8]),
    {
        let mut start = 0;
        for (i, &b) in chunk.iter().enumerate() {
            match (self.state, b) {
                (State::LineStart, b'.') => {
                    out(&chunk[start..i]);
                    out(b".");
                    // the original dot stays in the pending run
                    start = i;
                    self.state = State::Data;
                }
                (State::SawCr, b'\n') => self.state = State::LineStart,
                (_, b'\n') => {
                    out(&chunk[start..i]);
                    out(b"\r\n");
                    start = i + 1;
                    self.state = State::LineStart;
                }
                (_, b'\r') => self.state = State::SawCr,
                _ => self.state = State::Data,
            }
        }
        if start < chunk.len() {
            out(&chunk[start..]);
        }
    }

    /// Finish the current line if needed, emit the `.` terminator line and reset.
    pub fn end_message<F>(&mut self, mut out: F)
    where
        F: FnMut(&[u8]),
    {
        match self.state {
            State::LineStart => out(b".\r\n"),
            State::SawCr => out(b"\n.\r\n"),
            State::Data => out(b"\r\n.\r\n"),
        }
        self.reset();
    }

    pub fn reset(&mut self) {
        self.state = State::LineStart;
    }
}
