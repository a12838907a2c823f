use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use super::ChannelError;

/// An open connection, seen as two text pipes.
///
/// The connection is closed from the remote side when `inbound` yields
/// `None`; dropping `outbound` closes it from our side.
pub struct Connection {
    pub outbound: mpsc::UnboundedSender<String>,
    pub inbound: mpsc::UnboundedReceiver<String>,
}

/// Opens connections for a [`super::ReconnectingChannel`].
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, url: &str) -> Result<Connection, ChannelError>;
}

/// WebSocket transport.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Connection, ChannelError> {
        let (stream, _) = connect_async(url).await.map_err(Box::new)?;
        let (mut sink, mut source) = stream.split();

        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let (inbound_tx, inbound) = mpsc::unbounded_channel::<String>();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    outgoing = outbound_rx.recv() => match outgoing {
                        Some(text) => {
                            if let Err(e) = sink.send(Message::text(text)).await {
                                warn!(error = %e, "WebSocket send failed");
                                break;
                            }
                        }
                        None => {
                            let _ = sink.close().await;
                            break;
                        }
                    },
                    incoming = source.next() => match incoming {
                        Some(Ok(Message::Text(text))) => {
                            if inbound_tx.send(text.as_str().to_owned()).is_err() {
                                break;
                            }
                        }
                        Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                            Ok(text) => {
                                if inbound_tx.send(text).is_err() {
                                    break;
                                }
                            }
                            Err(_) => warn!(len = bytes.len(), "Dropping non-UTF-8 binary frame"),
                        },
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            warn!(error = %e, "WebSocket receive failed");
                            break;
                        }
                    },
                }
            }
            debug!("WebSocket pump finished");
        });

        Ok(Connection { outbound, inbound })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    #[tokio::test]
    async fn test_ws_connector_pumps_both_directions() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(tcp).await.unwrap();
            ws.send(Message::text("hello")).await.unwrap();
            ws.send(Message::binary(br#"{"n":1}"#.to_vec())).await.unwrap();
            // Not UTF-8, dropped by the client
            ws.send(Message::binary(vec![0xff, 0xfe])).await.unwrap();
            ws.send(Message::text("after")).await.unwrap();

            let received = loop {
                match ws.next().await {
                    Some(Ok(Message::Text(text))) => break text.as_str().to_owned(),
                    Some(Ok(_)) => continue,
                    other => panic!("connection ended early: {:?}", other),
                }
            };
            ws.close(None).await.unwrap();
            received
        });

        let mut connection = WsConnector.connect(&format!("ws://{}", addr)).await.unwrap();
        assert_eq!(connection.inbound.recv().await.as_deref(), Some("hello"));
        assert_eq!(connection.inbound.recv().await.as_deref(), Some(r#"{"n":1}"#));
        assert_eq!(connection.inbound.recv().await.as_deref(), Some("after"));

        connection.outbound.send("ping".to_string()).unwrap();
        assert_eq!(server.await.unwrap(), "ping");

        // Remote close ends the inbound pipe
        assert_eq!(connection.inbound.recv().await, None);
    }

    #[tokio::test]
    async fn test_ws_connector_reports_refused_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = WsConnector.connect(&format!("ws://{}", addr)).await;
        assert!(matches!(result, Err(ChannelError::WebSocket(_))));
    }
}
