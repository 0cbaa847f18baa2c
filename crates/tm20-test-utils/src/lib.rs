// tm20-test-utils: a mock TM20 terminal for driving hub integration tests.
//
// Plays the part of a physical terminal: connects over plain WebSocket (no
// bearer token -- the wire protocol has no Origin/auth header requirement,
// §6), sends raw `cmd` frames, and reads back `ret` frames as
// `serde_json::Value` rather than a typed envelope, since the hub's own
// protocol has no single discriminated message type.

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::MaybeTlsStream;

type WsStream = tokio_tungstenite::WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

pub struct MockTerminalClient {
    write: futures_util::stream::SplitSink<WsStream, Message>,
    read: futures_util::stream::SplitStream<WsStream>,
}

impl MockTerminalClient {
    pub async fn connect(url: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let (ws_stream, _response) = tokio_tungstenite::connect_async(url).await?;
        let (write, read) = ws_stream.split();
        Ok(Self { write, read })
    }

    /// Send a `cmd` frame built from a JSON value, e.g.
    /// `json!({"cmd": "reg", "sn": "TM20-001", ...})`.
    pub async fn send_cmd(&mut self, frame: &Value) -> Result<(), Box<dyn std::error::Error>> {
        let text = serde_json::to_string(frame)?;
        self.write.send(Message::Text(text.into())).await?;
        Ok(())
    }

    /// Receive the next `ret` frame as a raw JSON value.
    pub async fn recv_ret(&mut self) -> Result<Value, Box<dyn std::error::Error>> {
        loop {
            match self.read.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(serde_json::from_str(&text)?);
                }
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                Some(Ok(Message::Close(_))) => return Err("connection closed by hub".into()),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
                None => return Err("connection stream ended".into()),
            }
        }
    }

    pub async fn reg(
        &mut self,
        sn: &str,
        cpusn: &str,
        devinfo: Value,
    ) -> Result<Value, Box<dyn std::error::Error>> {
        self.send_cmd(&serde_json::json!({
            "cmd": "reg",
            "sn": sn,
            "cpusn": cpusn,
            "devinfo": devinfo,
        }))
        .await?;
        self.recv_ret().await
    }

    pub async fn sendlog(
        &mut self,
        sn: &str,
        logindex: i64,
        record: Vec<Value>,
    ) -> Result<Value, Box<dyn std::error::Error>> {
        self.send_cmd(&serde_json::json!({
            "cmd": "sendlog",
            "sn": sn,
            "count": record.len(),
            "logindex": logindex,
            "record": record,
        }))
        .await?;
        self.recv_ret().await
    }

    pub async fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.write.send(Message::Close(None)).await?;
        Ok(())
    }
}
