/*
 * mod.rs
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

//! MIME output: multipart writer, transfer encodings (base64, quoted-printable), RFC 2047 header words.

pub mod base64;
pub mod content_type;
pub mod quoted_printable;
pub mod rfc2047;
mod utils;
mod writer;

pub use utils::{generate_boundary, is_boundary_char, is_valid_boundary, quote_parameter};
pub use writer::MimeWriter;
