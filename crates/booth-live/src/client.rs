//! WebSocket live-session client.
//!
//! One writer task owns the sink, one reader task owns the stream; the
//! handle talks to the writer through a bounded channel. A single
//! [`LiveEvent::Closed`] is emitted when either side goes down.

use async_trait::async_trait;
use base64::Engine;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use booth_core::types::{AudioChunk, CapabilityOutput, Frame, FunctionCall};

use crate::protocol::{
    self, Blob, ClientContent, ClientContentFrame, Content, FunctionResponse, Part,
    RealtimeInput, RealtimeInputFrame, ServerMessage, ToolResponse, ToolResponseFrame,
};
use crate::{LiveConnector, LiveEvent, LiveTransport, ToolDeclaration};

/// Everything needed to open a session.
#[derive(Debug, Clone)]
pub struct LiveOptions {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub system_instruction: String,
    pub declarations: Vec<ToolDeclaration>,
    pub response_modalities: Vec<String>,
    /// Capture sample rate, used for the outbound audio mime type.
    pub sample_rate: u32,
}

pub struct GeminiLive {
    out_tx: mpsc::Sender<Message>,
    audio_mime: String,
    cancel: CancellationToken,
}

impl GeminiLive {
    /// Connect, send the setup frame, and spawn the reader/writer tasks.
    ///
    /// Inbound session traffic arrives on the returned receiver.
    pub async fn connect(
        opts: LiveOptions,
    ) -> anyhow::Result<(Self, mpsc::Receiver<LiveEvent>)> {
        let url = format!("{}?key={}", opts.endpoint, opts.api_key);
        let (ws, _response) = connect_async(url.as_str()).await?;
        info!(model = %opts.model, "Live session connected");

        let (mut sink, mut stream) = ws.split();

        let setup = protocol::setup_frame(
            &opts.model,
            &opts.system_instruction,
            &opts.declarations,
            &opts.response_modalities,
        );
        sink.send(Message::text(serde_json::to_string(&setup)?))
            .await?;

        let (out_tx, mut out_rx) = mpsc::channel::<Message>(64);
        let (event_tx, event_rx) = mpsc::channel::<LiveEvent>(64);
        let cancel = CancellationToken::new();

        let writer_cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = writer_cancel.cancelled() => {
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                    msg = out_rx.recv() => match msg {
                        Some(msg) => {
                            if let Err(e) = sink.send(msg).await {
                                warn!(%e, "Session write failed");
                                writer_cancel.cancel();
                                break;
                            }
                        }
                        None => {
                            let _ = sink.send(Message::Close(None)).await;
                            break;
                        }
                    }
                }
            }
            debug!("Session writer stopped");
        });

        let reader_cancel = cancel.clone();
        tokio::spawn(async move {
            let close_reason = 'read: loop {
                tokio::select! {
                    _ = reader_cancel.cancelled() => break 'read None,
                    msg = stream.next() => match msg {
                        Some(Ok(msg)) => {
                            let payload: Option<Vec<u8>> = match msg {
                                Message::Text(text) => Some(text.as_bytes().to_vec()),
                                Message::Binary(bytes) => Some(bytes.to_vec()),
                                Message::Close(frame) => {
                                    break 'read frame.map(|f| f.reason.to_string());
                                }
                                _ => None,
                            };
                            if let Some(bytes) = payload {
                                match serde_json::from_slice::<ServerMessage>(&bytes) {
                                    Ok(server_msg) => {
                                        for event in events_from(server_msg) {
                                            if event_tx.send(event).await.is_err() {
                                                break 'read None;
                                            }
                                        }
                                    }
                                    Err(e) => debug!(%e, "Unparseable session message"),
                                }
                            }
                        }
                        Some(Err(e)) => break 'read Some(e.to_string()),
                        None => break 'read None,
                    }
                }
            };

            reader_cancel.cancel();
            let _ = event_tx.send(LiveEvent::Closed(close_reason)).await;
            info!("Live session closed");
        });

        Ok((
            Self {
                out_tx,
                audio_mime: format!("audio/pcm;rate={}", opts.sample_rate),
                cancel,
            },
            event_rx,
        ))
    }

    async fn send_frame_json(&self, frame: &impl serde::Serialize) -> anyhow::Result<()> {
        let json = serde_json::to_string(frame)?;
        self.out_tx
            .send(Message::text(json))
            .await
            .map_err(|_| anyhow::anyhow!("session writer closed"))
    }
}

/// Flatten one server message into zero or more events.
fn events_from(msg: ServerMessage) -> Vec<LiveEvent> {
    let mut events = Vec::new();

    if msg.setup_complete.is_some() {
        events.push(LiveEvent::SetupComplete);
    }

    if let Some(content) = msg.server_content {
        let turn_complete = content.turn_complete;
        if let Some(turn) = content.model_turn {
            for part in turn.parts {
                if let Some(blob) = part.inline_data {
                    if blob.mime_type.starts_with("audio/") {
                        match base64::engine::general_purpose::STANDARD.decode(&blob.data) {
                            Ok(bytes) => events.push(LiveEvent::Audio(bytes)),
                            Err(e) => debug!(%e, "Bad audio payload"),
                        }
                    }
                }
                if let Some(text) = part.text {
                    events.push(LiveEvent::Text {
                        content: text,
                        turn_complete,
                    });
                }
            }
        }
    }

    if let Some(tool_call) = msg.tool_call {
        if !tool_call.function_calls.is_empty() {
            let calls = tool_call
                .function_calls
                .into_iter()
                .map(|c| FunctionCall {
                    id: c.id,
                    name: c.name,
                    args: c.args,
                })
                .collect();
            events.push(LiveEvent::ToolCall(calls));
        }
    }

    events
}

#[async_trait]
impl LiveTransport for GeminiLive {
    async fn send_text(&self, text: &str) -> anyhow::Result<()> {
        self.send_frame_json(&ClientContentFrame {
            client_content: ClientContent {
                turns: vec![Content {
                    role: Some("user".into()),
                    parts: vec![Part {
                        text: Some(text.to_string()),
                        inline_data: None,
                    }],
                }],
                turn_complete: true,
            },
        })
        .await
    }

    async fn send_audio(&self, chunk: AudioChunk) -> anyhow::Result<()> {
        self.send_frame_json(&RealtimeInputFrame {
            realtime_input: RealtimeInput {
                media_chunks: vec![Blob {
                    mime_type: self.audio_mime.clone(),
                    data: base64::engine::general_purpose::STANDARD.encode(&chunk.data),
                }],
            },
        })
        .await
    }

    async fn send_frame(&self, frame: &Frame) -> anyhow::Result<()> {
        self.send_frame_json(&RealtimeInputFrame {
            realtime_input: RealtimeInput {
                media_chunks: vec![Blob {
                    mime_type: "image/jpeg".into(),
                    data: base64::engine::general_purpose::STANDARD.encode(&frame.jpeg),
                }],
            },
        })
        .await
    }

    async fn send_tool_response(
        &self,
        name: &str,
        id: Option<&str>,
        output: &CapabilityOutput,
    ) -> anyhow::Result<()> {
        self.send_frame_json(&ToolResponseFrame {
            tool_response: ToolResponse {
                function_responses: vec![FunctionResponse {
                    id: id.map(str::to_string),
                    name: name.to_string(),
                    response: output.to_json(),
                }],
            },
        })
        .await
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.cancel.cancel();
        Ok(())
    }
}

/// Connection settings that are known before the session contents are.
#[derive(Debug, Clone)]
pub struct GeminiConnector {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub response_modalities: Vec<String>,
    pub sample_rate: u32,
}

#[async_trait]
impl LiveConnector for GeminiConnector {
    async fn connect(
        &self,
        system_instruction: String,
        declarations: Vec<ToolDeclaration>,
    ) -> anyhow::Result<(
        std::sync::Arc<dyn LiveTransport>,
        mpsc::Receiver<LiveEvent>,
    )> {
        let (client, events) = GeminiLive::connect(LiveOptions {
            endpoint: self.endpoint.clone(),
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            system_instruction,
            declarations,
            response_modalities: self.response_modalities.clone(),
            sample_rate: self.sample_rate,
        })
        .await?;
        Ok((std::sync::Arc::new(client), events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_from_tool_call() {
        let msg: ServerMessage = serde_json::from_str(
            r#"{"toolCall": {"functionCalls": [{"name": "displayOnTV", "args": {"img_b64": "eA=="}}]}}"#,
        )
        .unwrap();

        let events = events_from(msg);
        assert_eq!(events.len(), 1);
        match &events[0] {
            LiveEvent::ToolCall(calls) => {
                assert_eq!(calls.len(), 1);
                assert_eq!(calls[0].name, "displayOnTV");
                assert_eq!(calls[0].args["img_b64"], "eA==");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_events_from_audio_and_text() {
        let pcm = base64::engine::general_purpose::STANDARD.encode([1u8, 2, 3, 4]);
        let raw = format!(
            r#"{{"serverContent": {{"modelTurn": {{"parts": [
                {{"inlineData": {{"mimeType": "audio/pcm;rate=24000", "data": "{pcm}"}}}},
                {{"text": "smile!"}}
            ]}}, "turnComplete": true}}}}"#
        );
        let msg: ServerMessage = serde_json::from_str(&raw).unwrap();

        let events = events_from(msg);
        assert_eq!(events.len(), 2);
        match &events[0] {
            LiveEvent::Audio(bytes) => assert_eq!(bytes, &[1u8, 2, 3, 4]),
            other => panic!("unexpected event {other:?}"),
        }
        match &events[1] {
            LiveEvent::Text { content, turn_complete } => {
                assert_eq!(content, "smile!");
                assert!(turn_complete);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_events_from_setup_complete() {
        let msg: ServerMessage = serde_json::from_str(r#"{"setupComplete": {}}"#).unwrap();
        let events = events_from(msg);
        assert!(matches!(events[0], LiveEvent::SetupComplete));
    }

    #[test]
    fn test_empty_tool_call_yields_no_event() {
        let msg: ServerMessage =
            serde_json::from_str(r#"{"toolCall": {"functionCalls": []}}"#).unwrap();
        assert!(events_from(msg).is_empty());
    }
}
