use crate::stream::{StreamConnection, StreamConnector};
use crate::update::SubscribeRequest;
use crate::ListenerError;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

/// Public RIS Live WebSocket endpoint.
pub const DEFAULT_RIS_LIVE_URL: &str = "wss://ris-live.ripe.net/v1/ws/?client=bgp-listener";

/// Opens WebSocket connections to a RIS Live compatible endpoint.
#[derive(Debug, Clone, Default)]
pub struct RisLiveConnector;

pub struct RisLiveConnection {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl StreamConnector for RisLiveConnector {
    type Connection = RisLiveConnection;

    async fn connect(&self, endpoint: &str) -> Result<Self::Connection, ListenerError> {
        let (ws, response) = connect_async(endpoint).await?;
        info!(
            "connected to RIS Live at {} (status {})",
            endpoint,
            response.status()
        );
        Ok(RisLiveConnection { ws })
    }
}

#[async_trait]
impl StreamConnection for RisLiveConnection {
    async fn subscribe(&mut self, host: &str) -> Result<(), ListenerError> {
        let request = serde_json::to_string(&SubscribeRequest::new(host))?;
        self.ws.send(Message::Text(request)).await?;
        Ok(())
    }

    async fn next_frame(&mut self) -> Result<Option<Vec<u8>>, ListenerError> {
        while let Some(msg) = self.ws.next().await {
            match msg? {
                Message::Text(text) => return Ok(Some(text.into_bytes())),
                Message::Binary(bytes) => return Ok(Some(bytes)),
                Message::Close(None) => return Ok(None),
                Message::Close(Some(frame)) => {
                    return match frame.code {
                        CloseCode::Normal | CloseCode::Away => {
                            debug!("stream closed by server: {}", frame.reason);
                            Ok(None)
                        }
                        code => Err(ListenerError::TransportError(format!(
                            "stream closed abnormally ({}): {}",
                            code, frame.reason
                        ))),
                    };
                }
                // ping/pong are answered by tungstenite
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            }
        }
        Ok(None)
    }
}
