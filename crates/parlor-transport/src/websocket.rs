//! WebSocket client transport using `tokio-tungstenite`.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::error::ProtocolError as WsProtocolError;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use crate::{CloseInfo, Connection, Dialer, Incoming, TransportError};

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// A [`Dialer`] that opens WebSocket connections.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketDialer;

impl Dialer for WebSocketDialer {
    type Connection = WebSocketConnection;

    async fn dial(
        &self,
        url: &str,
    ) -> Result<Self::Connection, TransportError> {
        let (ws, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| TransportError::ConnectFailed(e.to_string()))?;
        tracing::debug!(url, "WebSocket connection opened");
        let (writer, reader) = ws.split();
        Ok(WebSocketConnection {
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
        })
    }
}

/// A single client WebSocket connection.
///
/// The stream is split into independently locked halves: a read pump can
/// sit in `recv` waiting for the server while another task sends, without
/// either blocking the other.
///
/// Frames are sent as text — the wire format is JSON and the server reads
/// it either way, but text keeps captures readable.
pub struct WebSocketConnection {
    writer: Mutex<SplitSink<WsStream, Message>>,
    reader: Mutex<SplitStream<WsStream>>,
}

impl Connection for WebSocketConnection {
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let text = String::from_utf8(data.to_vec())
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        self.writer
            .lock()
            .await
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn recv(&self) -> Result<Incoming, TransportError> {
        let mut reader = self.reader.lock().await;
        loop {
            match reader.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Incoming::Frame(text.as_bytes().to_vec()));
                }
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Incoming::Frame(data.into()));
                }
                Some(Ok(Message::Close(frame))) => {
                    return Ok(Incoming::Closed(frame.map(|f| {
                        CloseInfo {
                            code: u16::from(f.code),
                            reason: f.reason.to_string(),
                        }
                    })));
                }
                None => return Ok(Incoming::Closed(None)),
                Some(Ok(_)) => continue, // skip ping/pong/raw frames
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(
                        e.to_string(),
                    ));
                }
            }
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        // Closing again reports AlreadyClosed or SendAfterClosing
        // depending on how far the first close got; callers treat close as
        // best-effort, so swallow those cases here.
        match self.writer.lock().await.close().await {
            Ok(())
            | Err(WsError::AlreadyClosed)
            | Err(WsError::ConnectionClosed)
            | Err(WsError::Protocol(
                WsProtocolError::SendAfterClosing,
            )) => Ok(()),
            Err(e) => Err(TransportError::SendFailed(e.to_string())),
        }
    }
}
