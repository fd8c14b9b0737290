//! WebSocket connection handler
//!
//! Exposes the bus operations over one WebSocket connection: each text
//! frame is a JSON `RequestFrame`, each reply a JSON `ResponseFrame`.
//!
//! Every request runs on its own task, so a blocking Receive never holds
//! up other calls on the same connection. Closing the connection cancels
//! calls still in flight but does not log anybody out.

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::broker::Broker;
use crate::error::AppError;
use crate::message::{RequestFrame, ResponseFrame};
use crate::types::ConnectionId;

/// Reply channel buffer per connection
const REPLY_BUFFER_SIZE: usize = 32;

/// Handle a new connection
///
/// Performs the WebSocket handshake, then serves requests until the peer
/// closes the connection or the socket fails.
pub async fn handle_connection<S>(stream: S, broker: Broker) -> Result<(), AppError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    // WebSocket handshake
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let conn_id = ConnectionId::new();
    info!("Connection {} opened", conn_id);

    // Channel for replies from call tasks -> socket
    let (reply_tx, mut reply_rx) = mpsc::channel::<ResponseFrame>(REPLY_BUFFER_SIZE);

    // Spawn read task (WebSocket -> bus calls)
    let mut read_task = tokio::spawn(async move {
        let mut calls = JoinSet::new();

        let result = loop {
            let Some(msg_result) = ws_receiver.next().await else {
                break Ok(());
            };

            // Reap finished calls so the set only holds pending ones
            while calls.try_join_next().is_some() {}

            match msg_result {
                Ok(Message::Text(text)) => match serde_json::from_str::<RequestFrame>(&text) {
                    Ok(RequestFrame { id, request }) => {
                        debug!("Connection {} call {}: {:?}", conn_id, id, request);
                        let broker = broker.clone();
                        let reply_tx = reply_tx.clone();
                        calls.spawn(async move {
                            let frame = match broker.handle(request).await {
                                Ok(response) => ResponseFrame::reply(id, response),
                                Err(e) => ResponseFrame::error(Some(id), e.to_string()),
                            };
                            let _ = reply_tx.send(frame).await;
                        });
                    }
                    Err(e) => {
                        warn!("Invalid request from {}: {}", conn_id, e);
                        let frame = ResponseFrame::error(None, format!("Invalid request: {}", e));
                        if reply_tx.send(frame).await.is_err() {
                            break Err(AppError::ChannelSend);
                        }
                    }
                },
                Ok(Message::Close(_)) => {
                    debug!("Connection {} sent close frame", conn_id);
                    break Ok(());
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                    // Pong replies are handled by tungstenite
                }
                Ok(_) => {
                    // Binary or other message types - ignore
                }
                Err(e) => {
                    error!("WebSocket error for {}: {}", conn_id, e);
                    break Err(AppError::from(e));
                }
            }
        };

        // Abort calls still waiting (e.g. a pending Receive)
        calls.shutdown().await;
        debug!("Read task ended for {}", conn_id);
        result
    });

    // Spawn write task (ResponseFrame -> WebSocket)
    let mut write_task = tokio::spawn(async move {
        let result: Result<(), AppError> = async {
            while let Some(frame) = reply_rx.recv().await {
                let json = serde_json::to_string(&frame)?;
                ws_sender.send(Message::Text(json.into())).await?;
            }
            Ok(())
        }
        .await;

        let _ = ws_sender.close().await;
        result
    });

    // Wait for either task to complete, then stop the other
    let result = tokio::select! {
        res = &mut read_task => {
            write_task.abort();
            res
        }
        res = &mut write_task => {
            read_task.abort();
            res
        }
    };

    info!("Connection {} closed", conn_id);

    result?
}
