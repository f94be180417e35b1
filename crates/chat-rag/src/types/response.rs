//! Response types: retrieved passages, pipeline results and stream messages

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Metadata key holding the passage's origin URI
pub const SOURCE_KEY: &str = "source";

/// Terminal payload of the `end` stream message
pub const DONE_MARKER: &str = "[DONE]";

/// A passage returned by the vector index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedPassage {
    /// Passage text
    #[serde(rename = "pageContent")]
    pub content: String,
    /// `source` plus whatever else the ingestion job stored
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Similarity reported by the index (higher is closer)
    #[serde(skip)]
    pub score: f32,
}

impl RetrievedPassage {
    pub fn new(content: impl Into<String>, metadata: Map<String, Value>, score: f32) -> Self {
        Self {
            content: content.into(),
            metadata,
            score,
        }
    }

    /// Origin URI of the passage, if the index stored one
    pub fn source(&self) -> Option<&str> {
        self.metadata.get(SOURCE_KEY).and_then(Value::as_str)
    }
}

/// Terminal artifact of one successful request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    /// Full answer; equals the concatenation of every streamed token
    pub text: String,
    /// Exactly the passages the answer was conditioned on
    #[serde(rename = "sourceDocuments")]
    pub sources: Vec<RetrievedPassage>,
}

/// Body of a buffered (non-streaming) success response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferedResponse {
    pub response: PipelineResult,
}

impl From<PipelineResult> for BufferedResponse {
    fn from(response: PipelineResult) -> Self {
        Self { response }
    }
}

/// One message on the event stream.
///
/// Serialized as `{"object": <kind>, "data": <payload>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "object", content = "data", rename_all = "camelCase")]
pub enum StreamMessage {
    /// One answer token
    Message(String),
    /// Passages backing the answer; only sent after successful synthesis
    SourceDocuments(Vec<RetrievedPassage>),
    /// Always last; payload is `[DONE]`
    End(String),
}

impl StreamMessage {
    pub fn end() -> Self {
        Self::End(DONE_MARKER.to_string())
    }

    pub fn is_end(&self) -> bool {
        matches!(self, Self::End(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn passage() -> RetrievedPassage {
        let mut metadata = Map::new();
        metadata.insert(SOURCE_KEY.into(), json!("https://example.com/jwick"));
        metadata.insert("title".into(), json!("Jwick Semi-Silent review"));
        RetrievedPassage::new("Muted, creamy bottom out.", metadata, 0.91)
    }

    #[test]
    fn test_passage_wire_shape() {
        let value = serde_json::to_value(passage()).unwrap();
        assert_eq!(
            value,
            json!({
                "pageContent": "Muted, creamy bottom out.",
                "metadata": {
                    "source": "https://example.com/jwick",
                    "title": "Jwick Semi-Silent review"
                }
            })
        );
    }

    #[test]
    fn test_passage_source_lookup() {
        assert_eq!(passage().source(), Some("https://example.com/jwick"));
        assert_eq!(RetrievedPassage::new("x", Map::new(), 0.0).source(), None);
    }

    #[test]
    fn test_stream_message_wire_shape() {
        assert_eq!(
            serde_json::to_value(StreamMessage::Message(" sound".into())).unwrap(),
            json!({"object": "message", "data": " sound"})
        );
        assert_eq!(
            serde_json::to_value(StreamMessage::end()).unwrap(),
            json!({"object": "end", "data": "[DONE]"})
        );

        let sources = serde_json::to_value(StreamMessage::SourceDocuments(vec![passage()])).unwrap();
        assert_eq!(sources["object"], "sourceDocuments");
        assert_eq!(sources["data"][0]["pageContent"], "Muted, creamy bottom out.");
    }

    #[test]
    fn test_buffered_response_shape() {
        let body = BufferedResponse::from(PipelineResult {
            text: "The sound signature is...".into(),
            sources: vec![passage()],
        });
        let value = serde_json::to_value(body).unwrap();
        assert_eq!(value["response"]["text"], "The sound signature is...");
        assert_eq!(
            value["response"]["sourceDocuments"][0]["metadata"]["source"],
            "https://example.com/jwick"
        );
    }
}
