//! PostgreSQL wire protocol (server side, simple-query subset).
//!
//! Only the boundary the engine needs: the SSL-negotiation refusal, the
//! startup handshake (AuthenticationOk + ReadyForQuery), simple `Q`
//! queries answered with RowDescription/DataRow/CommandComplete or
//! ErrorResponse, and `X` termination. Framing uses `tokio_util` codecs
//! over `bytes` buffers.

mod backend;
mod codec;
mod frontend;
mod types;

pub use backend::{BackendMessage, FieldDescription, TransactionStatus};
pub use codec::{put_cstring, MessageCodec, StartupCodec};
pub use frontend::{FrontendMessage, StartupMessage};
pub use types::type_oid;

/// Magic code of an SSLRequest message.
pub const SSL_REQUEST_CODE: i32 = 80877103;

/// Protocol version 3.0.
pub const PROTOCOL_VERSION: i32 = 196608;
