//! Frame codecs for the startup phase and the query phase.

use std::collections::HashMap;
use std::io;

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::Decoder;

use super::frontend::{FrontendMessage, StartupMessage};
use super::{PROTOCOL_VERSION, SSL_REQUEST_CODE};

/// Upper bound on any frame we are willing to buffer.
const MAX_MESSAGE_LEN: usize = 16 * 1024 * 1024;

/// Appends a null-terminated string.
pub fn put_cstring(dst: &mut BytesMut, s: &str) {
    dst.put_slice(s.as_bytes());
    dst.put_u8(0);
}

/// Reads a null-terminated string from the front of `buf`.
fn get_cstring(buf: &mut &[u8]) -> Option<String> {
    let end = buf.iter().position(|&b| b == 0)?;
    let s = String::from_utf8_lossy(&buf[..end]).into_owned();
    *buf = &buf[end + 1..];
    Some(s)
}

/// Decoder for the startup phase: frames carry only a length and a body.
#[derive(Debug, Default)]
pub struct StartupCodec;

impl Decoder for StartupCodec {
    type Item = StartupMessage;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < 4 {
            return Ok(None);
        }
        let len = i32::from_be_bytes(src[0..4].try_into().unwrap()) as usize;
        if !(8..=MAX_MESSAGE_LEN).contains(&len) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("bad startup packet length {len}"),
            ));
        }
        if src.len() < len {
            return Ok(None);
        }

        let mut frame = src.split_to(len);
        frame.advance(4);
        let code = i32::from_be_bytes(frame[0..4].try_into().unwrap());
        frame.advance(4);

        match code {
            SSL_REQUEST_CODE => Ok(Some(StartupMessage::SslRequest)),
            PROTOCOL_VERSION => {
                let mut parameters = HashMap::new();
                let mut rest: &[u8] = &frame;
                while let Some(key) = get_cstring(&mut rest) {
                    if key.is_empty() {
                        break;
                    }
                    let Some(value) = get_cstring(&mut rest) else {
                        break;
                    };
                    parameters.insert(key, value);
                }
                Ok(Some(StartupMessage::Startup { parameters }))
            }
            other => Ok(Some(StartupMessage::Unknown(other))),
        }
    }
}

/// Decoder for the query phase: type byte + length + body.
#[derive(Debug, Default)]
pub struct MessageCodec;

impl Decoder for MessageCodec {
    type Item = FrontendMessage;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < 5 {
            return Ok(None);
        }
        let message_type = src[0];
        let len = i32::from_be_bytes(src[1..5].try_into().unwrap()) as usize;
        if !(4..=MAX_MESSAGE_LEN).contains(&len) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("bad message length {len}"),
            ));
        }
        if src.len() < 1 + len {
            return Ok(None);
        }

        let mut frame = src.split_to(1 + len);
        frame.advance(5);

        match message_type {
            b'Q' => {
                let mut rest: &[u8] = &frame;
                let sql = get_cstring(&mut rest).unwrap_or_default();
                Ok(Some(FrontendMessage::Query(sql)))
            }
            b'X' => Ok(Some(FrontendMessage::Terminate)),
            other => Ok(Some(FrontendMessage::Unknown(other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn startup_frame(code: i32, tail: &[u8]) -> BytesMut {
        let mut buf = BytesMut::new();
        buf.put_i32(8 + tail.len() as i32);
        buf.put_i32(code);
        buf.put_slice(tail);
        buf
    }

    #[test]
    fn test_decode_ssl_request() {
        let mut buf = startup_frame(SSL_REQUEST_CODE, &[]);
        let msg = StartupCodec.decode(&mut buf).unwrap();
        assert_eq!(msg, Some(StartupMessage::SslRequest));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_startup_with_parameters() {
        let mut tail = BytesMut::new();
        put_cstring(&mut tail, "user");
        put_cstring(&mut tail, "alice");
        put_cstring(&mut tail, "database");
        put_cstring(&mut tail, "rookdb");
        tail.put_u8(0);

        let mut buf = startup_frame(PROTOCOL_VERSION, &tail);
        let Some(StartupMessage::Startup { parameters }) =
            StartupCodec.decode(&mut buf).unwrap()
        else {
            panic!("expected startup");
        };
        assert_eq!(parameters.get("user").map(String::as_str), Some("alice"));
        assert_eq!(parameters.get("database").map(String::as_str), Some("rookdb"));
    }

    #[test]
    fn test_decode_partial_frame_waits() {
        let full = startup_frame(SSL_REQUEST_CODE, &[]);
        let mut partial = BytesMut::from(&full[..6]);
        assert_eq!(StartupCodec.decode(&mut partial).unwrap(), None);
    }

    #[test]
    fn test_decode_query() {
        let mut buf = BytesMut::new();
        buf.put_u8(b'Q');
        let sql = b"SELECT 1\0";
        buf.put_i32(4 + sql.len() as i32);
        buf.put_slice(sql);

        let msg = MessageCodec.decode(&mut buf).unwrap();
        assert_eq!(msg, Some(FrontendMessage::Query("SELECT 1".into())));
    }

    #[test]
    fn test_decode_terminate_and_unknown() {
        let mut buf = BytesMut::new();
        buf.put_u8(b'X');
        buf.put_i32(4);
        assert_eq!(
            MessageCodec.decode(&mut buf).unwrap(),
            Some(FrontendMessage::Terminate)
        );

        let mut buf = BytesMut::new();
        buf.put_u8(b'F');
        buf.put_i32(4);
        assert_eq!(
            MessageCodec.decode(&mut buf).unwrap(),
            Some(FrontendMessage::Unknown(b'F'))
        );
    }

    #[test]
    fn test_reject_absurd_length() {
        let mut buf = BytesMut::new();
        buf.put_i32(2);
        buf.put_i32(SSL_REQUEST_CODE);
        assert!(StartupCodec.decode(&mut buf).is_err());
    }
}
