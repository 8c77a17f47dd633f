//! Per-connection query loop.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::debug;

use crate::engine::{Engine, Session, StatementResult};
use crate::error::EngineError;
use crate::protocol::{
    BackendMessage, FieldDescription, FrontendMessage, MessageCodec, TransactionStatus,
};

/// One client connection after a successful handshake.
pub struct Connection {
    framed: Framed<TcpStream, MessageCodec>,
    engine: Arc<Engine>,
    session: Session,
}

impl Connection {
    /// Wraps a framed stream.
    pub fn new(framed: Framed<TcpStream, MessageCodec>, engine: Arc<Engine>) -> Self {
        Self {
            framed,
            engine,
            session: Session::new(),
        }
    }

    /// Serves queries until the client terminates or the peer closes.
    pub async fn run(mut self) -> Result<(), std::io::Error> {
        while let Some(message) = self.framed.next().await.transpose()? {
            match message {
                FrontendMessage::Query(sql) => self.handle_query(sql).await?,
                FrontendMessage::Terminate => {
                    debug!("client terminated");
                    break;
                }
                FrontendMessage::Unknown(message_type) => {
                    self.framed
                        .send(BackendMessage::ErrorResponse {
                            severity: "ERROR",
                            code: "0A000",
                            message: format!(
                                "message type '{}' is not supported",
                                message_type as char
                            ),
                        })
                        .await?;
                    self.send_ready().await?;
                }
            }
        }
        Ok(())
    }

    async fn handle_query(&mut self, sql: String) -> Result<(), std::io::Error> {
        debug!(sql = %sql, "query");

        // The engine is synchronous; enter it through a blocking section
        // so the runtime's other connections keep making progress.
        let engine = Arc::clone(&self.engine);
        let session = &mut self.session;
        let result =
            tokio::task::block_in_place(|| engine.execute(&sql, session));

        match result {
            Ok(StatementResult::Rows { columns, rows }) => {
                let fields = columns
                    .iter()
                    .map(|column| FieldDescription {
                        name: column.name.clone(),
                        kind: column.kind,
                    })
                    .collect();
                self.framed
                    .send(BackendMessage::RowDescription { fields })
                    .await?;

                let count = rows.len();
                for row in rows {
                    let values = row
                        .values
                        .iter()
                        .map(|value| {
                            if value.is_null() {
                                None
                            } else {
                                Some(value.to_string())
                            }
                        })
                        .collect();
                    self.framed.send(BackendMessage::DataRow { values }).await?;
                }
                self.framed
                    .send(BackendMessage::CommandComplete {
                        tag: format!("SELECT {count}"),
                    })
                    .await?;
            }
            Ok(StatementResult::Empty) => {
                self.framed.send(BackendMessage::EmptyQueryResponse).await?;
            }
            Ok(other) => {
                self.framed
                    .send(BackendMessage::CommandComplete {
                        tag: other.command_tag(),
                    })
                    .await?;
            }
            Err(error) => {
                self.send_error(&error).await?;
            }
        }

        self.send_ready().await
    }

    async fn send_error(&mut self, error: &EngineError) -> Result<(), std::io::Error> {
        self.framed
            .send(BackendMessage::ErrorResponse {
                severity: "ERROR",
                code: error.sql_state(),
                message: error.to_string(),
            })
            .await
    }

    async fn send_ready(&mut self) -> Result<(), std::io::Error> {
        let status = if self.session.failed() {
            TransactionStatus::Failed
        } else if self.session.in_transaction() {
            TransactionStatus::InTransaction
        } else {
            TransactionStatus::Idle
        };
        self.framed
            .send(BackendMessage::ReadyForQuery { status })
            .await
    }
}
