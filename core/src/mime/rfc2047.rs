/*
 * rfc2047.rs
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

//! RFC 2047 encoded-word encoding (=?UTF-8?q?text?=) for free-text header values.

/// Longest encoded-word RFC 2047 permits.
const MAX_ENCODED_WORD_LEN: usize = 75;

const PREFIX: &str = "=?UTF-8?q?";
const SUFFIX: &str = "?=";

const HEX: &[u8; 16] = b"0123456789ABCDEF";

/// True when the value contains anything besides printable ASCII and tab.
pub fn needs_encoding(value: &str) -> bool {
    value.chars().any(|c| (c < ' ' || c > '~') && c != '\t')
}

/// Q-encode `value` in UTF-8 if needed; printable ASCII is returned unchanged.
/// Long values are split into several encoded-words separated by a space; a character's bytes never
/// straddle two words.
pub fn encode_q(value: &str) -> String {
    if !needs_encoding(value) {
        return value.to_string();
    }
    let max_payload = MAX_ENCODED_WORD_LEN - PREFIX.len() - SUFFIX.len();
    let mut out = String::with_capacity(value.len() * 3);
    let mut word = String::new();
    let mut buf = [0u8; 4];
    for c in value.chars() {
        let mut encoded = String::new();
        for &b in c.encode_utf8(&mut buf).as_bytes() {
            push_q_byte(&mut encoded, b);
        }
        if !word.is_empty() && word.len() + encoded.len() > max_payload {
            flush_word(&mut out, &word);
            word.clear();
        }
        word.push_str(&encoded);
    }
    flush_word(&mut out, &word);
    out
}

fn flush_word(out: &mut String, payload: &str) {
    if !out.is_empty() {
        out.push(' ');
    }
    out.push_str(PREFIX);
    out.push_str(payload);
    out.push_str(SUFFIX);
}

fn push_q_byte(out: &mut String, b: u8) {
    match b {
        b' ' => out.push('_'),
        b'=' | b'?' | b'_' => push_hex(out, b),
        0x21..=0x7e => out.push(b as char),
        _ => push_hex(out, b),
    }
}

fn push_hex(out: &mut String, b: u8) {
    out.push('=');
    out.push(HEX[(b >> 4) as usize] as char);
    out.push(HEX[(b & 15) as usize] as char);
}
