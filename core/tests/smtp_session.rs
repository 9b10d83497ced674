/*
 * smtp_session.rs
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

//! Submission sessions against a scripted in-process SMTP server.

use std::fs;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use postino_core::{compose, Credentials, MailError, MemorySink, MessageSpec, SaslMechanism, SmtpTransport};
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use tokio_rustls::rustls::{ClientConfig, RootCertStore, ServerConfig, ServerConnection, StreamOwned};

#[derive(Clone)]
struct Script {
    greeting: &'static str,
    ehlo_supported: bool,
    extensions: Vec<&'static str>,
    /// 1-based RCPT that gets a 550.
    reject_rcpt: Option<usize>,
    /// None: reply 220 and drop the connection, as if the handshake failed.
    starttls_reply: Option<&'static str>,
    auth_final: &'static str,
    /// When set, STARTTLS really upgrades using this server config.
    tls: Option<Arc<ServerConfig>>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            greeting: "220 mock.test ESMTP",
            ehlo_supported: true,
            extensions: vec!["PIPELINING", "8BITMIME"],
            reject_rcpt: None,
            starttls_reply: Some("454 4.7.0 TLS not available"),
            auth_final: "235 2.7.0 authenticated",
            tls: None,
        }
    }
}

/// What the server saw: command lines (plus `<eof>` when the client closed) and the DATA payload.
#[derive(Debug, Default)]
struct Recording {
    commands: Vec<String>,
    payload: Vec<String>,
}

impl Recording {
    fn count(&self, prefix: &str) -> usize {
        self.commands.iter().filter(|c| c.starts_with(prefix)).count()
    }
}

enum Wire {
    Plain(TcpStream),
    Tls(Box<StreamOwned<ServerConnection, TcpStream>>),
}

impl Read for Wire {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Wire::Plain(s) => s.read(buf),
            Wire::Tls(s) => s.read(buf),
        }
    }
}

impl Write for Wire {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Wire::Plain(s) => s.write(buf),
            Wire::Tls(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Wire::Plain(s) => s.flush(),
            Wire::Tls(s) => s.flush(),
        }
    }
}

struct Conn {
    reader: BufReader<Wire>,
}

impl Conn {
    /// Wraps the socket in a server-side TLS session; the handshake runs on the next read.
    fn upgrade(self, config: Arc<ServerConfig>) -> Conn {
        let tcp = match self.reader.into_inner() {
            Wire::Plain(tcp) => tcp,
            Wire::Tls(_) => panic!("already on TLS"),
        };
        let tls = ServerConnection::new(config).unwrap();
        Conn {
            reader: BufReader::new(Wire::Tls(Box::new(StreamOwned::new(tls, tcp)))),
        }
    }

    fn line(&mut self) -> Option<String> {
        let mut buf = Vec::new();
        match self.reader.read_until(b'\n', &mut buf) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(String::from_utf8_lossy(&buf).trim_end_matches(['\r', '\n']).to_string()),
        }
    }

    fn reply(&mut self, text: &str) {
        let wire = self.reader.get_mut();
        let _ = wire.write_all(format!("{}\r\n", text).as_bytes());
        let _ = wire.flush();
    }
}

fn spawn_server(script: Script) -> (u16, JoinHandle<Recording>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        let mut conn = Conn {
            reader: BufReader::new(Wire::Plain(stream)),
        };
        let mut rec = Recording::default();
        let mut rcpts = 0;
        let mut secure = false;
        conn.reply(script.greeting);
        loop {
            let Some(line) = conn.line() else {
                rec.commands.push("<eof>".into());
                break;
            };
            rec.commands.push(line.clone());
            let verb = line.split_whitespace().next().unwrap_or("").to_ascii_uppercase();
            match verb.as_str() {
                "EHLO" if !script.ehlo_supported => conn.reply("502 5.5.1 command not implemented"),
                "EHLO" => {
                    let mut lines = vec!["mock.test greets you".to_string()];
                    lines.extend(
                        script
                            .extensions
                            .iter()
                            .filter(|e| !(secure && **e == "STARTTLS"))
                            .map(|e| e.to_string()),
                    );
                    let last = lines.len() - 1;
                    for (i, l) in lines.iter().enumerate() {
                        let sep = if i == last { ' ' } else { '-' };
                        conn.reply(&format!("250{}{}", sep, l));
                    }
                }
                "HELO" => conn.reply("250 mock.test"),
                "STARTTLS" if script.tls.is_some() && !secure => {
                    conn.reply("220 2.0.0 ready to start TLS");
                    conn = conn.upgrade(Arc::clone(script.tls.as_ref().unwrap()));
                    secure = true;
                    rec.commands.push("<tls>".into());
                }
                "STARTTLS" => match script.starttls_reply {
                    Some(r) => conn.reply(r),
                    None => {
                        conn.reply("220 2.0.0 ready to start TLS");
                        rec.commands.push("<dropped>".into());
                        break;
                    }
                },
                "AUTH" if line.to_ascii_uppercase().starts_with("AUTH LOGIN") => {
                    conn.reply("334 VXNlcm5hbWU6");
                    let user = conn.line().unwrap_or_default();
                    rec.commands.push(user);
                    conn.reply("334 UGFzc3dvcmQ6");
                    let pass = conn.line().unwrap_or_default();
                    rec.commands.push(pass);
                    conn.reply(script.auth_final);
                }
                "AUTH" => conn.reply(script.auth_final),
                "MAIL" => conn.reply("250 2.1.0 ok"),
                "RCPT" => {
                    rcpts += 1;
                    if script.reject_rcpt == Some(rcpts) {
                        conn.reply("550 5.1.1 no such user");
                    } else {
                        conn.reply("250 2.1.5 ok");
                    }
                }
                "DATA" => {
                    conn.reply("354 end with <CRLF>.<CRLF>");
                    while let Some(l) = conn.line() {
                        if l == "." {
                            break;
                        }
                        rec.payload.push(l);
                    }
                    conn.reply("250 2.0.0 queued");
                }
                "QUIT" => conn.reply("221 2.0.0 bye"),
                _ => conn.reply("500 5.5.2 unrecognised"),
            }
        }
        rec
    });
    (port, handle)
}

fn local(port: u16) -> SmtpTransport {
    SmtpTransport::new("127.0.0.1", port)
}

/// Self-signed certificate for "localhost": server config plus a client config trusting only it.
fn localhost_tls() -> (Arc<ServerConfig>, Arc<ClientConfig>) {
    let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let der = CertificateDer::from(cert.serialize_der().unwrap());
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(cert.serialize_private_key_der()));
    let server = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(vec![der.clone()], key)
        .unwrap();
    let mut roots = RootCertStore::empty();
    roots.add(der).unwrap();
    let client = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    (Arc::new(server), Arc::new(client))
}

fn spec() -> MessageSpec {
    MessageSpec::new("a@x.com", "b@x.com,c@x.com")
        .subject("greetings")
        .text("hello")
}

#[test]
fn delivers_message() {
    let (port, server) = spawn_server(Script::default());
    local(port).deliver(&spec()).unwrap();
    let rec = server.join().unwrap();
    assert_eq!(
        rec.commands,
        vec![
            "EHLO 127.0.0.1",
            "MAIL FROM:<a@x.com>",
            "RCPT TO:<b@x.com>",
            "RCPT TO:<c@x.com>",
            "DATA",
            "QUIT",
            "<eof>",
        ]
    );
    assert_eq!(rec.payload[0], "To: b@x.com, c@x.com");
    assert!(rec.payload.iter().any(|l| l == "hello"));
}

#[test]
fn second_recipient_rejected() {
    let (port, server) = spawn_server(Script {
        reject_rcpt: Some(2),
        ..Default::default()
    });
    let err = local(port).deliver(&spec()).unwrap_err();
    match &err {
        MailError::Protocol { stage, code, .. } => {
            assert_eq!(*stage, "RCPT TO");
            assert_eq!(*code, Some(550));
        }
        other => panic!("unexpected {:?}", other),
    }
    let rec = server.join().unwrap();
    assert_eq!(rec.count("RCPT TO:"), 2);
    assert_eq!(rec.count("DATA"), 0);
    assert_eq!(rec.commands.last().map(String::as_str), Some("<eof>"));
    assert!(rec.payload.is_empty());
}

#[test]
fn empty_recipients_fail_before_connecting() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let port = listener.local_addr().unwrap().port();
    let spec = MessageSpec::new("a@x.com", "").text("hello");

    assert!(local(port).deliver(&spec).unwrap_err().is_config());
    let mut body = MemorySink::default();
    assert!(local(port).send(&spec, &mut body).unwrap_err().is_config());
    assert_eq!(
        listener.accept().unwrap_err().kind(),
        std::io::ErrorKind::WouldBlock
    );
}

#[tokio::test]
async fn send_async_delivers_composed_body() {
    let (port, server) = spawn_server(Script::default());
    let mut body = MemorySink::default();
    compose(&spec(), &mut body).unwrap();
    local(port).send_async(&spec(), &mut body).await.unwrap();
    let rec = tokio::task::spawn_blocking(move || server.join().unwrap()).await.unwrap();
    assert_eq!(rec.count("MAIL FROM:<a@x.com>"), 1);
    assert_eq!(rec.count("RCPT TO:"), 2);
    assert_eq!(rec.commands[rec.commands.len() - 2..], ["QUIT", "<eof>"]);
    assert!(rec.payload.iter().any(|l| l == "Subject: greetings"));
    assert!(rec.payload.iter().any(|l| l == "hello"));
}

#[test]
fn starttls_upgrade_then_delivers_over_tls() {
    let (server_tls, client_tls) = localhost_tls();
    let (port, server) = spawn_server(Script {
        extensions: vec!["STARTTLS", "8BITMIME"],
        tls: Some(server_tls),
        ..Default::default()
    });
    let mut t = SmtpTransport::new("localhost", port);
    t.set_tls_config(client_tls);
    t.deliver(&spec()).unwrap();
    let rec = server.join().unwrap();
    assert_eq!(
        rec.commands,
        vec![
            "EHLO localhost",
            "STARTTLS",
            "<tls>",
            "EHLO localhost",
            "MAIL FROM:<a@x.com>",
            "RCPT TO:<b@x.com>",
            "RCPT TO:<c@x.com>",
            "DATA",
            "QUIT",
            "<eof>",
        ]
    );
    assert!(rec.payload.iter().any(|l| l == "hello"));
}

#[test]
fn refused_starttls_is_fatal() {
    let (port, server) = spawn_server(Script {
        extensions: vec!["STARTTLS"],
        ..Default::default()
    });
    let err = local(port).deliver(&spec()).unwrap_err();
    assert!(matches!(
        err,
        MailError::Protocol { stage: "STARTTLS", code: Some(454), .. }
    ));
    let rec = server.join().unwrap();
    assert_eq!(rec.commands, vec!["EHLO 127.0.0.1", "STARTTLS", "QUIT", "<eof>"]);
}

#[test]
fn failed_tls_handshake_does_not_fall_back_to_plaintext() {
    let (port, server) = spawn_server(Script {
        extensions: vec!["STARTTLS"],
        starttls_reply: None,
        ..Default::default()
    });
    let err = local(port).deliver(&spec()).unwrap_err();
    assert!(matches!(err, MailError::Protocol { stage: "STARTTLS", code: None, .. }));
    let rec = server.join().unwrap();
    assert_eq!(rec.count("MAIL"), 0);
}

#[test]
fn starttls_not_used_when_disabled() {
    let (port, server) = spawn_server(Script {
        extensions: vec!["STARTTLS"],
        ..Default::default()
    });
    let mut t = local(port);
    t.set_use_starttls(false);
    t.deliver(&spec()).unwrap();
    let rec = server.join().unwrap();
    assert_eq!(rec.count("STARTTLS"), 0);
    assert_eq!(rec.count("DATA"), 1);
}

#[test]
fn falls_back_to_helo() {
    let (port, server) = spawn_server(Script {
        ehlo_supported: false,
        ..Default::default()
    });
    let mut t = local(port);
    t.set_ehlo_hostname("client.test");
    t.deliver(&spec()).unwrap();
    let rec = server.join().unwrap();
    assert_eq!(rec.commands[..2], ["EHLO client.test", "HELO client.test"]);
}

#[test]
fn rejected_greeting() {
    let (port, server) = spawn_server(Script {
        greeting: "554 5.3.2 not accepting mail",
        ..Default::default()
    });
    let err = local(port).deliver(&spec()).unwrap_err();
    assert_eq!(err.reply_code(), Some(554));
    let rec = server.join().unwrap();
    assert_eq!(rec.commands, vec!["QUIT", "<eof>"]);
}

#[test]
fn auth_plain_on_loopback() {
    let (port, server) = spawn_server(Script {
        extensions: vec!["AUTH PLAIN LOGIN"],
        ..Default::default()
    });
    let mut t = local(port);
    t.set_auth(Credentials::new("tim", "secret", SaslMechanism::Plain));
    t.deliver(&spec()).unwrap();
    let rec = server.join().unwrap();
    assert_eq!(rec.commands[1], "AUTH PLAIN AHRpbQBzZWNyZXQ=");
    assert_eq!(rec.commands[2], "MAIL FROM:<a@x.com>");
}

#[test]
fn auth_login_answers_prompts() {
    let (port, server) = spawn_server(Script {
        extensions: vec!["AUTH LOGIN"],
        ..Default::default()
    });
    let mut t = local(port);
    t.set_auth(Credentials::new("tim", "secret", SaslMechanism::Login));
    t.deliver(&spec()).unwrap();
    let rec = server.join().unwrap();
    assert_eq!(rec.commands[1..4], ["AUTH LOGIN", "dGlt", "c2VjcmV0"]);
}

#[test]
fn auth_rejected() {
    let (port, server) = spawn_server(Script {
        extensions: vec!["AUTH PLAIN"],
        auth_final: "535 5.7.8 authentication failed",
        ..Default::default()
    });
    let mut t = local(port);
    t.set_auth(Credentials::new("tim", "wrong", SaslMechanism::Plain));
    let err = t.deliver(&spec()).unwrap_err();
    assert!(matches!(err, MailError::Protocol { stage: "AUTH", code: Some(535), .. }));
    let rec = server.join().unwrap();
    assert_eq!(rec.count("MAIL"), 0);
    assert_eq!(rec.count("QUIT"), 1);
}

#[test]
fn auth_mechanism_must_be_advertised() {
    let (port, server) = spawn_server(Script {
        extensions: vec!["AUTH LOGIN"],
        ..Default::default()
    });
    let mut t = local(port);
    t.set_auth(Credentials::new("tim", "secret", SaslMechanism::CramMd5));
    let err = t.deliver(&spec()).unwrap_err();
    assert!(matches!(err, MailError::Protocol { stage: "AUTH", code: None, .. }));
    let rec = server.join().unwrap();
    assert_eq!(rec.commands, vec!["EHLO 127.0.0.1", "QUIT", "<eof>"]);
}

#[test]
fn large_message_spooled_and_removed() {
    let files = tempfile::tempdir().unwrap();
    let spool = tempfile::tempdir().unwrap();
    let att = files.path().join("big.bin");
    fs::write(&att, vec![0x5au8; 10 << 20]).unwrap();

    let (port, server) = spawn_server(Script::default());
    let mut t = local(port);
    t.set_spool_dir(spool.path());
    t.deliver(&spec().attach(&att)).unwrap();
    let rec = server.join().unwrap();

    assert_eq!(rec.count("DATA"), 1);
    assert!(rec.payload.iter().any(|l| l.contains("filename=\"big.bin\"")));
    assert_eq!(fs::read_dir(spool.path()).unwrap().count(), 0);
}

#[test]
fn unreachable_server_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    let err = local(port).deliver(&spec()).unwrap_err();
    assert!(matches!(err, MailError::Transport(_)));
}
