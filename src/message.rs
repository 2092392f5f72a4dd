use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Payload variants a message can carry. Tagged as `type` on the wire, which
/// is the shape the browser client sends and renders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MessageContent {
    Text {
        body: String,
    },
    File {
        #[serde(rename = "fileUrl")]
        file_url: String,
        #[serde(rename = "fileName")]
        file_name: String,
    },
}

impl MessageContent {
    /// Discriminant as stored in the `kind` column.
    pub fn kind(&self) -> &'static str {
        match self {
            MessageContent::Text { .. } => "text",
            MessageContent::File { .. } => "file",
        }
    }
}

/// A persisted chat message. `id` and `createdAt` are assigned by the store
/// and never change; messages are immutable once saved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(flatten)]
    pub content: MessageContent,
    #[serde(rename = "from")]
    pub sender: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// A message that has not been persisted yet.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub content: MessageContent,
    pub sender: String,
}

impl NewMessage {
    pub fn text(body: impl Into<String>, sender: impl Into<String>) -> Self {
        Self {
            content: MessageContent::Text { body: body.into() },
            sender: sender.into(),
        }
    }

    pub fn file(
        file_url: impl Into<String>,
        file_name: impl Into<String>,
        sender: impl Into<String>,
    ) -> Self {
        Self {
            content: MessageContent::File {
                file_url: file_url.into(),
                file_name: file_name.into(),
            },
            sender: sender.into(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing or empty field: {0}")]
    MissingField(&'static str),
}

/// Shared by the relay (which drops invalid messages silently) and the HTTP
/// path (which rejects them with a 400). Same rules, different surfacing.
pub fn validate_text(body: &str, sender: &str) -> Result<(), ValidationError> {
    validate_sender(sender)?;
    if body.trim().is_empty() {
        return Err(ValidationError::MissingField("body"));
    }
    Ok(())
}

pub fn validate_sender(sender: &str) -> Result<(), ValidationError> {
    if sender.trim().is_empty() {
        return Err(ValidationError::MissingField("from"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn created_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_text_message_serialization() {
        let msg = Message {
            id: "m1".to_string(),
            content: MessageContent::Text {
                body: "hello".to_string(),
            },
            sender: "C1".to_string(),
            created_at: created_at(),
        };

        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"text\""));
        assert!(json.contains("\"body\":\"hello\""));
        assert!(json.contains("\"from\":\"C1\""));
        assert!(json.contains("\"id\":\"m1\""));
        assert!(json.contains("\"createdAt\""));
        // File fields must not leak into text messages
        assert!(!json.contains("fileUrl"));
        assert!(!json.contains("fileName"));
    }

    #[test]
    fn test_file_message_serialization() {
        let msg = Message {
            id: "m2".to_string(),
            content: MessageContent::File {
                file_url: "http://localhost:3000/files/abc.png".to_string(),
                file_name: "cat.png".to_string(),
            },
            sender: "C2".to_string(),
            created_at: created_at(),
        };

        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"file\""));
        assert!(json.contains("\"fileUrl\":\"http://localhost:3000/files/abc.png\""));
        assert!(json.contains("\"fileName\":\"cat.png\""));
        assert!(!json.contains("\"body\""));
    }

    #[test]
    fn test_message_round_trip() {
        let msg = Message {
            id: "m3".to_string(),
            content: MessageContent::File {
                file_url: "http://x/files/y".to_string(),
                file_name: "y.pdf".to_string(),
            },
            sender: "C3".to_string(),
            created_at: created_at(),
        };

        let json = serde_json::to_string(&msg).unwrap();
        let parsed: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn test_deserialize_wire_format() {
        let json = r#"{"id":"m4","type":"text","body":"hi","from":"C1","createdAt":"2024-05-01T12:00:00Z"}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.sender, "C1");
        if let MessageContent::Text { body } = msg.content {
            assert_eq!(body, "hi");
        } else {
            panic!("Expected text content");
        }
    }

    #[test]
    fn test_kind_discriminant() {
        assert_eq!(
            MessageContent::Text {
                body: "x".to_string()
            }
            .kind(),
            "text"
        );
        assert_eq!(
            MessageContent::File {
                file_url: "u".to_string(),
                file_name: "n".to_string()
            }
            .kind(),
            "file"
        );
    }

    #[test]
    fn test_validate_text_accepts_valid_input() {
        assert!(validate_text("hello", "C1").is_ok());
    }

    #[test]
    fn test_validate_text_rejects_empty_body() {
        assert_eq!(
            validate_text("", "C1"),
            Err(ValidationError::MissingField("body"))
        );
        assert_eq!(
            validate_text("   \t\n", "C1"),
            Err(ValidationError::MissingField("body"))
        );
    }

    #[test]
    fn test_validate_text_rejects_empty_sender() {
        assert_eq!(
            validate_text("hello", ""),
            Err(ValidationError::MissingField("from"))
        );
        assert_eq!(
            validate_text("hello", "  "),
            Err(ValidationError::MissingField("from"))
        );
    }

    #[test]
    fn test_validate_sender() {
        assert!(validate_sender("C1").is_ok());
        assert_eq!(
            validate_sender(" "),
            Err(ValidationError::MissingField("from"))
        );
    }
}
