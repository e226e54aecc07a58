//! # Summary
//!
//! This module abstracts over connections to peer servers.
//!
//! Every exchange uses a fresh TCP connection carrying JSON-encoded
//! `Envelope`s. There is no length prefix: `EnvelopeCodec` finds the end of
//! each record with `serde_json`'s streaming deserializer, and wraps the
//! stream with `tokio-util`'s `Framed` so both ends can treat it as a
//! `Stream` and `Sink` of envelopes.

use std::time::Duration;

use bytes::{Buf, BufMut, BytesMut};
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio_util::codec::{Decoder, Encoder, Framed};

use crate::error::Error;
use crate::message::Envelope;

/// Largest envelope a peer will buffer before giving up on the connection.
pub const MAX_ENVELOPE: usize = 1 << 20;

/// Newline-terminated JSON records, delimited by the JSON syntax itself.
///
/// Incoming bytes are scanned once: the codec tracks nesting depth and
/// string state across partial reads, and only hands a record to
/// `serde_json` once its closing brace has arrived.
#[derive(Copy, Clone, Debug, Default)]
pub struct EnvelopeCodec {
    /// Bytes of the current record already scanned
    scanned: usize,

    /// Open objects and arrays
    depth: usize,

    in_string: bool,

    /// Previous byte was a backslash inside a string
    escaped: bool,
}

/// Framed connection reading and writing envelopes.
pub type Connection = Framed<TcpStream, EnvelopeCodec>;

pub fn wrap(stream: TcpStream) -> Connection {
    Framed::new(stream, EnvelopeCodec::default())
}

impl EnvelopeCodec {
    /// Advances the scan over `bytes`, returning the length of the first
    /// complete record if it ends within them.
    fn scan(&mut self, bytes: &[u8]) -> Option<usize> {
        for (at, &byte) in bytes.iter().enumerate().skip(self.scanned) {
            if self.in_string {
                match byte {
                | _ if self.escaped => self.escaped = false,
                | b'\\' => self.escaped = true,
                | b'"' => self.in_string = false,
                | _ => (),
                }
                continue
            }
            match byte {
            | b'{' | b'[' => self.depth += 1,
            | b'}' | b']' => {
                self.depth = self.depth.saturating_sub(1);
                if self.depth == 0 {
                    return Some(at + 1)
                }
            }
            // Anything but an object at the top level is left for serde to reject
            | _ if self.depth == 0 => return Some(at + 1),
            | b'"' => self.in_string = true,
            | _ => (),
            }
        }
        self.scanned = bytes.len();
        None
    }
}

impl Decoder for EnvelopeCodec {
    type Item = Envelope;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Envelope>, Error> {
        if self.scanned == 0 {
            let skip = src.iter().take_while(|b| b.is_ascii_whitespace()).count();
            src.advance(skip);
        }

        let end = match self.scan(&src[..]) {
        | Some(end) => end,
        | None if src.len() > MAX_ENVELOPE => return Err(Error::Oversized(MAX_ENVELOPE)),
        | None => return Ok(None),
        };

        *self = EnvelopeCodec::default();
        let envelope = serde_json::from_slice(&src[..end]);
        src.advance(end);
        Ok(Some(envelope?))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Envelope>, Error> {
        match self.decode(src)? {
        | Some(envelope) => Ok(Some(envelope)),
        | None if src.is_empty() => Ok(None),
        | None => Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "connection closed mid-envelope",
        ))),
        }
    }
}

impl Encoder<Envelope> for EnvelopeCodec {
    type Error = Error;

    fn encode(&mut self, item: Envelope, dst: &mut BytesMut) -> Result<(), Error> {
        let encoded = serde_json::to_vec(&item)?;
        dst.reserve(encoded.len() + 1);
        dst.extend_from_slice(&encoded);
        dst.put_u8(b'\n');
        Ok(())
    }
}

async fn within<T, F>(timeout: Duration, future: F) -> Result<T, Error>
where F: std::future::Future<Output = Result<T, Error>>,
{
    tokio::time::timeout(timeout, future)
        .await
        .map_err(|_| Error::Timeout(timeout))?
}

/// Sends `request` to `addr` and waits for a single response.
/// Returns `None` if the peer closed the connection without replying.
pub async fn request<A: ToSocketAddrs>(addr: A, request: Envelope, timeout: Duration) -> Result<Option<Envelope>, Error> {
    within(timeout, async move {
        let mut connection = wrap(TcpStream::connect(addr).await?);
        connection.send(request).await?;
        connection.next().await.transpose()
    }).await
}

/// Sends `message` to `addr` without waiting for anything back.
pub async fn notify<A: ToSocketAddrs>(addr: A, message: Envelope, timeout: Duration) -> Result<(), Error> {
    within(timeout, async move {
        let mut connection = wrap(TcpStream::connect(addr).await?);
        connection.send(message).await?;
        connection.close().await
    }).await
}
