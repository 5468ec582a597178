//! Bidirectional session wire frames.
//!
//! JSON-over-WebSocket; every message is a single-key envelope. Field
//! names are camelCase on the wire.

use serde::{Deserialize, Serialize};

use crate::ToolDeclaration;

// --- Outbound ---

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupFrame {
    pub setup: Setup,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    pub model: String,
    pub generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolSet>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSet {
    pub function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInputFrame {
    pub realtime_input: RealtimeInput,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInput {
    pub media_chunks: Vec<Blob>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientContentFrame {
    pub client_content: ClientContent,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientContent {
    pub turns: Vec<Content>,
    pub turn_complete: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponseFrame {
    pub tool_response: ToolResponse,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    pub function_responses: Vec<FunctionResponse>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub response: serde_json::Value,
}

// --- Shared ---

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<Blob>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub mime_type: String,
    pub data: String,
}

// --- Inbound ---

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerMessage {
    pub setup_complete: Option<serde_json::Value>,
    pub server_content: Option<ServerContent>,
    pub tool_call: Option<ToolCallMessage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerContent {
    pub model_turn: Option<Content>,
    pub turn_complete: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolCallMessage {
    pub function_calls: Vec<WireFunctionCall>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireFunctionCall {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

/// Build the session setup frame from the declared capabilities.
pub fn setup_frame(
    model: &str,
    system_instruction: &str,
    declarations: &[ToolDeclaration],
    response_modalities: &[String],
) -> SetupFrame {
    let tools = if declarations.is_empty() {
        Vec::new()
    } else {
        vec![ToolSet {
            function_declarations: declarations
                .iter()
                .map(|d| FunctionDeclaration {
                    name: d.name.clone(),
                    description: d.description.clone(),
                    parameters: d.parameters.clone(),
                })
                .collect(),
        }]
    };

    SetupFrame {
        setup: Setup {
            model: model.to_string(),
            generation_config: GenerationConfig {
                response_modalities: response_modalities.to_vec(),
            },
            system_instruction: Some(Content {
                role: None,
                parts: vec![Part {
                    text: Some(system_instruction.to_string()),
                    inline_data: None,
                }],
            }),
            tools,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_setup_frame_wire_shape() {
        let frame = setup_frame(
            "models/demo-live",
            "greet the visitor",
            &[ToolDeclaration {
                name: "captureSnapshot".into(),
                description: "Take webcam snapshot".into(),
                parameters: json!({"type": "object", "properties": {}}),
            }],
            &["AUDIO".to_string(), "TEXT".to_string()],
        );

        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["setup"]["model"], "models/demo-live");
        assert_eq!(
            value["setup"]["generationConfig"]["responseModalities"][0],
            "AUDIO"
        );
        assert_eq!(
            value["setup"]["tools"][0]["functionDeclarations"][0]["name"],
            "captureSnapshot"
        );
        assert_eq!(
            value["setup"]["systemInstruction"]["parts"][0]["text"],
            "greet the visitor"
        );
    }

    #[test]
    fn test_tool_call_parses() {
        let raw = r#"{
            "toolCall": {
                "functionCalls": [
                    {"id": "fc-1", "name": "generateQR", "args": {"url": "https://x"}},
                    {"name": "captureSnapshot"}
                ]
            }
        }"#;

        let msg: ServerMessage = serde_json::from_str(raw).unwrap();
        let calls = msg.tool_call.unwrap().function_calls;
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].id.as_deref(), Some("fc-1"));
        assert_eq!(calls[0].name, "generateQR");
        assert_eq!(calls[0].args["url"], "https://x");
        assert_eq!(calls[1].id, None);
        assert!(calls[1].args.is_null());
    }

    #[test]
    fn test_server_content_audio_parses() {
        let raw = r#"{
            "serverContent": {
                "modelTurn": {
                    "parts": [
                        {"inlineData": {"mimeType": "audio/pcm;rate=24000", "data": "AAAA"}},
                        {"text": "done"}
                    ]
                },
                "turnComplete": true
            }
        }"#;

        let msg: ServerMessage = serde_json::from_str(raw).unwrap();
        let content = msg.server_content.unwrap();
        assert!(content.turn_complete);
        let parts = content.model_turn.unwrap().parts;
        assert_eq!(parts[0].inline_data.as_ref().unwrap().mime_type, "audio/pcm;rate=24000");
        assert_eq!(parts[1].text.as_deref(), Some("done"));
    }

    #[test]
    fn test_tool_response_frame_keys() {
        let frame = ToolResponseFrame {
            tool_response: ToolResponse {
                function_responses: vec![FunctionResponse {
                    id: None,
                    name: "uploadToS3".into(),
                    response: json!({"url": "https://festival-booth.s3.amazonaws.com/x.jpg"}),
                }],
            },
        };

        let value = serde_json::to_value(&frame).unwrap();
        let responses = &value["toolResponse"]["functionResponses"];
        assert_eq!(responses[0]["name"], "uploadToS3");
        // absent id must not serialize as null
        assert!(responses[0].get("id").is_none());
    }
}
