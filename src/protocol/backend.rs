//! Messages sent to the client.

use std::io;

use bytes::{BufMut, BytesMut};
use tokio_util::codec::Encoder;

use crate::value::ValueKind;

use super::codec::{put_cstring, MessageCodec, StartupCodec};
use super::types::oid_for;

/// Transaction status byte of ReadyForQuery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    /// 'I': idle, no transaction block.
    Idle,
    /// 'T': inside a transaction block.
    InTransaction,
    /// 'E': inside a failed transaction block.
    Failed,
}

impl TransactionStatus {
    fn as_byte(self) -> u8 {
        match self {
            TransactionStatus::Idle => b'I',
            TransactionStatus::InTransaction => b'T',
            TransactionStatus::Failed => b'E',
        }
    }
}

/// One column of a RowDescription.
#[derive(Debug)]
pub struct FieldDescription {
    pub name: String,
    pub kind: ValueKind,
}

/// Messages sent by the server.
#[derive(Debug)]
pub enum BackendMessage {
    /// 'R' code 0.
    AuthenticationOk,
    /// 'S' name/value, sent after authentication.
    ParameterStatus { name: String, value: String },
    /// 'Z' + status byte.
    ReadyForQuery { status: TransactionStatus },
    /// 'T' column metadata.
    RowDescription { fields: Vec<FieldDescription> },
    /// 'D' one row; `None` renders SQL NULL.
    DataRow { values: Vec<Option<String>> },
    /// 'C' command tag.
    CommandComplete { tag: String },
    /// 'I' the query string was empty.
    EmptyQueryResponse,
    /// 'E' severity/code/message.
    ErrorResponse {
        severity: &'static str,
        code: &'static str,
        message: String,
    },
}

impl BackendMessage {
    fn message_type(&self) -> u8 {
        match self {
            BackendMessage::AuthenticationOk => b'R',
            BackendMessage::ParameterStatus { .. } => b'S',
            BackendMessage::ReadyForQuery { .. } => b'Z',
            BackendMessage::RowDescription { .. } => b'T',
            BackendMessage::DataRow { .. } => b'D',
            BackendMessage::CommandComplete { .. } => b'C',
            BackendMessage::EmptyQueryResponse => b'I',
            BackendMessage::ErrorResponse { .. } => b'E',
        }
    }

    /// Encodes the full message: type byte, then a self-inclusive length
    /// patched in after the body is written.
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.put_u8(self.message_type());
        let len_pos = dst.len();
        dst.put_i32(0); // placeholder
        self.encode_body(dst);
        let total = (dst.len() - len_pos) as i32;
        dst[len_pos..len_pos + 4].copy_from_slice(&total.to_be_bytes());
    }

    fn encode_body(&self, dst: &mut BytesMut) {
        match self {
            BackendMessage::AuthenticationOk => {
                dst.put_i32(0);
            }
            BackendMessage::ParameterStatus { name, value } => {
                put_cstring(dst, name);
                put_cstring(dst, value);
            }
            BackendMessage::ReadyForQuery { status } => {
                dst.put_u8(status.as_byte());
            }
            BackendMessage::RowDescription { fields } => {
                dst.put_i16(fields.len() as i16);
                for field in fields {
                    put_cstring(dst, &field.name);
                    dst.put_i32(0); // originating table oid
                    dst.put_i16(0); // attribute number
                    dst.put_i32(oid_for(field.kind));
                    dst.put_i16(-1); // type size (variable)
                    dst.put_i32(-1); // type modifier
                    dst.put_i16(0); // text format
                }
            }
            BackendMessage::DataRow { values } => {
                dst.put_i16(values.len() as i16);
                for value in values {
                    match value {
                        None => dst.put_i32(-1),
                        Some(text) => {
                            dst.put_i32(text.len() as i32);
                            dst.put_slice(text.as_bytes());
                        }
                    }
                }
            }
            BackendMessage::CommandComplete { tag } => {
                put_cstring(dst, tag);
            }
            BackendMessage::EmptyQueryResponse => {}
            BackendMessage::ErrorResponse {
                severity,
                code,
                message,
            } => {
                dst.put_u8(b'S');
                put_cstring(dst, severity);
                dst.put_u8(b'C');
                put_cstring(dst, code);
                dst.put_u8(b'M');
                put_cstring(dst, message);
                dst.put_u8(0);
            }
        }
    }
}

impl Encoder<BackendMessage> for StartupCodec {
    type Error = io::Error;

    fn encode(&mut self, msg: BackendMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        msg.encode(dst);
        Ok(())
    }
}

impl Encoder<BackendMessage> for MessageCodec {
    type Error = io::Error;

    fn encode(&mut self, msg: BackendMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        msg.encode(dst);
        Ok(())
    }
}
