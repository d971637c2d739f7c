//! Shared test helpers
//!
//! Reply builders and a small in-process server speaking the Gibson
//! protocol, good enough to drive a `Client` end to end.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener};
use std::thread::{self, JoinHandle};

use bytes::{BufMut, Bytes, BytesMut};
use gibson_client::protocol::{decode_request, encode_reply, Encoding, Opcode, ReplyCode};
use gibson_client::{Address, Config};

// =============================================================================
// Reply Builders
// =============================================================================

pub fn ok_reply() -> Bytes {
    encode_reply(ReplyCode::Ok, Encoding::Plain, &[])
}

pub fn plain_reply(value: &str) -> Bytes {
    encode_reply(ReplyCode::Val, Encoding::Plain, value.as_bytes())
}

pub fn i32_reply(value: i32) -> Bytes {
    encode_reply(ReplyCode::Val, Encoding::Number, &value.to_le_bytes())
}

pub fn i64_reply(value: i64) -> Bytes {
    encode_reply(ReplyCode::Val, Encoding::Number, &value.to_le_bytes())
}

pub fn error_reply(code: ReplyCode) -> Bytes {
    encode_reply(code, Encoding::Plain, &[])
}

/// Builder for KVAL payloads
pub struct MapPayload {
    count: u32,
    body: BytesMut,
}

impl MapPayload {
    pub fn new() -> Self {
        Self {
            count: 0,
            body: BytesMut::new(),
        }
    }

    pub fn raw(mut self, key: &str, encoding: u8, data: &[u8]) -> Self {
        self.body.put_u32_le(key.len() as u32);
        self.body.put_slice(key.as_bytes());
        self.body.put_u8(encoding);
        self.body.put_u32_le(data.len() as u32);
        self.body.put_slice(data);
        self.count += 1;
        self
    }

    pub fn plain(self, key: &str, value: &str) -> Self {
        self.raw(key, Encoding::Plain as u8, value.as_bytes())
    }

    pub fn i32(self, key: &str, value: i32) -> Self {
        self.raw(key, Encoding::Number as u8, &value.to_le_bytes())
    }

    pub fn i64(self, key: &str, value: i64) -> Self {
        self.raw(key, Encoding::Number as u8, &value.to_le_bytes())
    }

    /// Payload with an explicit (possibly lying) entry count
    pub fn build_with_count(self, count: u32) -> Bytes {
        let mut payload = BytesMut::with_capacity(4 + self.body.len());
        payload.put_u32_le(count);
        payload.put_slice(&self.body);
        payload.freeze()
    }

    pub fn build(self) -> Bytes {
        let count = self.count;
        self.build_with_count(count)
    }

    pub fn reply(self) -> Bytes {
        encode_reply(ReplyCode::KVal, Encoding::Plain, &self.build())
    }
}

pub fn concat(frames: &[Bytes]) -> Vec<u8> {
    frames.iter().flat_map(|f| f.iter().copied()).collect()
}

// =============================================================================
// Mock Server
// =============================================================================

/// What the server does with one request: bytes to send back, or `None`
/// to hang up without answering
pub type Handler = Box<dyn FnMut(Opcode, Vec<String>) -> Option<Vec<u8>> + Send>;

/// A one-connection server on a background thread
pub struct MockServer {
    pub address: Address,
    handle: Option<JoinHandle<()>>,
}

impl MockServer {
    /// Listen on an ephemeral local TCP port
    pub fn tcp(handler: Handler) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();

        let handle = thread::spawn(move || {
            if let Ok((stream, _)) = listener.accept() {
                serve(stream, handler);
            }
        });

        Self {
            address: Address::Tcp(addr.to_string()),
            handle: Some(handle),
        }
    }

    /// Listen on a unix socket at `path`
    #[cfg(unix)]
    pub fn unix(path: &std::path::Path, handler: Handler) -> Self {
        let listener = std::os::unix::net::UnixListener::bind(path).unwrap();

        let handle = thread::spawn(move || {
            if let Ok((stream, _)) = listener.accept() {
                serve(stream, handler);
            }
        });

        Self {
            address: Address::Unix(path.to_path_buf()),
            handle: Some(handle),
        }
    }

    pub fn config(&self) -> Config {
        Config::builder()
            .address(self.address.clone())
            .reply_timeout_ms(5000)
            .build()
    }

    /// Wait for the server thread to finish
    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.join().unwrap();
        }
    }
}

/// Read requests, answer each through `handler`, until the peer hangs up
fn serve<S: Read + Write>(mut stream: S, mut handler: Handler) {
    let mut buffer: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let n = match stream.read(&mut chunk) {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        buffer.extend_from_slice(&chunk[..n]);

        while buffer.len() >= 4 {
            let total = u32::from_le_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]) as usize;
            if buffer.len() < 4 + total {
                break;
            }

            let (opcode, args) = decode_request(&buffer[..4 + total]).unwrap();
            buffer.drain(..4 + total);

            match handler(opcode, args) {
                Some(reply) => {
                    if stream.write_all(&reply).is_err() {
                        return;
                    }
                }
                None => return,
            }
        }
    }
}

/// Handler backed by an in-memory map, roughly following server semantics
pub fn kv_handler() -> Handler {
    let mut store: BTreeMap<String, String> = BTreeMap::new();

    Box::new(move |opcode, args| {
        let arg = |i: usize| args.get(i).cloned().unwrap_or_default();

        let reply = match opcode {
            Opcode::Set => {
                let value = args.get(2..).map(|v| v.join(" ")).unwrap_or_default();
                store.insert(arg(1), value.clone());
                plain_reply(&value)
            }
            Opcode::Get => match store.get(&arg(0)) {
                Some(v) => plain_reply(v),
                None => error_reply(ReplyCode::ErrNotFound),
            },
            Opcode::Del => match store.remove(&arg(0)) {
                Some(_) => ok_reply(),
                None => error_reply(ReplyCode::ErrNotFound),
            },
            Opcode::Inc | Opcode::Dec => match store.get(&arg(0)).map(|v| v.parse::<i64>()) {
                Some(Ok(n)) => {
                    let n = if opcode == Opcode::Inc { n + 1 } else { n - 1 };
                    store.insert(arg(0), n.to_string());
                    i64_reply(n)
                }
                Some(Err(_)) => error_reply(ReplyCode::ErrNan),
                None => error_reply(ReplyCode::ErrNotFound),
            },
            Opcode::MGet => {
                let prefix = arg(0);
                let mut map = MapPayload::new();
                for (k, v) in store.iter().filter(|(k, _)| k.starts_with(&prefix)) {
                    map = map.plain(k, v);
                }
                map.reply()
            }
            Opcode::MSet => {
                let prefix = arg(0);
                let value = args.get(1..).map(|v| v.join(" ")).unwrap_or_default();
                let mut count = 0;
                for (_, v) in store.iter_mut().filter(|(k, _)| k.starts_with(&prefix)) {
                    *v = value.clone();
                    count += 1;
                }
                i32_reply(count)
            }
            Opcode::MDel => {
                let prefix = arg(0);
                let before = store.len();
                store.retain(|k, _| !k.starts_with(&prefix));
                match before - store.len() {
                    0 => error_reply(ReplyCode::ErrNotFound),
                    n => i32_reply(n as i32),
                }
            }
            Opcode::MInc => {
                let prefix = arg(0);
                let mut count = 0;
                for (_, v) in store.iter_mut().filter(|(k, _)| k.starts_with(&prefix)) {
                    if let Ok(n) = v.parse::<i64>() {
                        *v = (n + 1).to_string();
                        count += 1;
                    }
                }
                i32_reply(count)
            }
            Opcode::Count => i32_reply(store.len() as i32),
            Opcode::Stats => MapPayload::new()
                .i64("total_items", store.len() as i64)
                .plain("server_version", "mock")
                .reply(),
            Opcode::Ping => ok_reply(),
            Opcode::End => return None,
            _ => error_reply(ReplyCode::Err),
        };

        Some(reply.to_vec())
    })
}
