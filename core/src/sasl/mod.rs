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

//! SASL client steps for SMTP AUTH: PLAIN, LOGIN, CRAM-MD5, XOAUTH2.
//!
//! Everything here works on raw bytes; base64 framing for the wire is done by the caller.

mod mechanism;
mod plain;

pub use mechanism::SaslMechanism;
pub use plain::encode_plain;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use thiserror::Error;

type HmacMd5 = Hmac<md5::Md5>;

#[derive(Debug, Error)]
#[error("{message}")]
pub struct SaslError {
    pub message: String,
}

impl SaslError {
    pub fn invalid(msg: &str) -> Self {
        Self {
            message: msg.to_string(),
        }
    }
}

/// Initial response sent with the AUTH command, if the mechanism has one.
/// For XOAUTH2 `secret` is the OAuth2 access token and `authcid` the email address.
pub fn initial_response(mechanism: SaslMechanism, authcid: &str, secret: &str) -> Option<Vec<u8>> {
    match mechanism {
        SaslMechanism::Plain => Some(encode_plain("", authcid, secret)),
        SaslMechanism::XOAuth2 => Some(xoauth2_initial_response(authcid, secret)),
        SaslMechanism::Login | SaslMechanism::CramMd5 => None,
    }
}

/// Answer a 334 challenge. `challenge_b64` is the text after the reply code.
pub fn respond_to_challenge(
    mechanism: SaslMechanism,
    challenge_b64: &str,
    authcid: &str,
    secret: &str,
) -> Result<Vec<u8>, SaslError> {
    match mechanism {
        SaslMechanism::Login => login_respond_to_challenge(challenge_b64, authcid, secret),
        SaslMechanism::CramMd5 => cram_md5_response(authcid, secret, challenge_b64),
        // PLAIN servers that ignore the initial response send an empty challenge
        SaslMechanism::Plain => Ok(encode_plain("", authcid, secret)),
        // XOAUTH2 failure details arrive as a challenge; an empty reply ends the exchange
        SaslMechanism::XOAuth2 => Ok(Vec::new()),
    }
}

/// LOGIN: first challenge is "Username:", second is "Password:".
fn login_respond_to_challenge(challenge_b64: &str, authcid: &str, password: &str) -> Result<Vec<u8>, SaslError> {
    let decoded = base64_decode(challenge_b64)?;
    let s = String::from_utf8_lossy(&decoded).to_lowercase();
    if s.contains("username") {
        Ok(authcid.as_bytes().to_vec())
    } else if s.contains("password") {
        Ok(password.as_bytes().to_vec())
    } else {
        Err(SaslError::invalid("unexpected LOGIN challenge"))
    }
}

/// CRAM-MD5: "authcid hex(hmac_md5(password, challenge))".
fn cram_md5_response(authcid: &str, password: &str, challenge_b64: &str) -> Result<Vec<u8>, SaslError> {
    let challenge = base64_decode(challenge_b64)?;
    let mut mac = HmacMd5::new_from_slice(password.as_bytes())
        .map_err(|_| SaslError::invalid("CRAM-MD5 key rejected"))?;
    mac.update(&challenge);
    let digest = mac.finalize().into_bytes();
    Ok(format!("{} {}", authcid, bytes_to_hex(&digest)).into_bytes())
}

/// Format: `user={user}\x01auth=Bearer {access_token}\x01\x01`
pub fn xoauth2_initial_response(user: &str, access_token: &str) -> Vec<u8> {
    format!("user={}\x01auth=Bearer {}\x01\x01", user, access_token).into_bytes()
}

fn base64_decode(encoded: &str) -> Result<Vec<u8>, SaslError> {
    STANDARD
        .decode(encoded.trim())
        .map_err(|_| SaslError::invalid("invalid base64 in server challenge"))
}

fn bytes_to_hex(b: &[u8]) -> String {
    const HEX: &[u8] = b"0123456789abcdef";
    let mut s = String::with_capacity(b.len() * 2);
    for &x in b {
        s.push(HEX[(x >> 4) as usize] as char);
        s.push(HEX[(x & 15) as usize] as char);
    }
    s
}
