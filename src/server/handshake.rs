//! Connection handshake.
//!
//! Sequence: the client may send an SSLRequest, which is answered with a
//! single `N` (no TLS); the StartupMessage is then answered with
//! AuthenticationOk, a couple of ParameterStatus fields, and
//! ReadyForQuery. Authentication always succeeds (trust).

use futures_util::{SinkExt, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::debug;

use crate::protocol::{
    BackendMessage, MessageCodec, StartupCodec, StartupMessage, TransactionStatus,
};

/// Runs the startup handshake, returning a connection framed with the
/// query-phase codec.
pub async fn handshake(
    stream: TcpStream,
) -> Result<Framed<TcpStream, MessageCodec>, std::io::Error> {
    let mut framed = Framed::new(stream, StartupCodec);

    loop {
        let Some(message) = framed.next().await.transpose()? else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "client closed during handshake",
            ));
        };
        match message {
            StartupMessage::SslRequest => {
                // One raw byte, outside any frame: no TLS here.
                framed.get_mut().write_u8(b'N').await?;
                debug!("refused ssl negotiation");
            }
            StartupMessage::Startup { parameters } => {
                debug!(user = parameters.get("user").map(String::as_str), "startup");
                framed.send(BackendMessage::AuthenticationOk).await?;
                framed
                    .send(BackendMessage::ParameterStatus {
                        name: "server_version".into(),
                        value: "15.0 (rookdb)".into(),
                    })
                    .await?;
                framed
                    .send(BackendMessage::ParameterStatus {
                        name: "client_encoding".into(),
                        value: "UTF8".into(),
                    })
                    .await?;
                framed
                    .send(BackendMessage::ReadyForQuery {
                        status: TransactionStatus::Idle,
                    })
                    .await?;
                return Ok(framed.map_codec(|_| MessageCodec));
            }
            StartupMessage::Unknown(code) => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("unknown startup code {code}"),
                ));
            }
        }
    }
}
