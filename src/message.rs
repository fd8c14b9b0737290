//! Message protocol definitions
//!
//! Typed requests and replies for the four bus operations, the JSON frames
//! that carry them over the transport, and the classification of delivered
//! payloads that consumers use to tell system notices from chat lines.

use serde::{Deserialize, Serialize};

use crate::types::Identity;

/// Caller → bus request
///
/// Uses tagged enum with snake_case naming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Create a mailbox and announce the join
    Register { identity: Identity },
    /// Broadcast a chat line to everybody but the sender
    SendMessage { sender: Identity, content: String },
    /// Wait for the next payload addressed to `identity`
    Receive { identity: Identity },
    /// Drop the mailbox and announce the departure
    Logout { identity: Identity },
}

/// Bus → caller reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Register or Logout done
    Ok,
    /// SendMessage accepted
    Sent,
    /// Receive result; empty when the identity is not registered
    Payload { payload: String },
}

impl Response {
    /// The plain string reply of the classic string protocol
    pub fn as_wire(&self) -> &str {
        match self {
            Response::Ok => "ok",
            Response::Sent => "sent",
            Response::Payload { payload } => payload,
        }
    }
}

/// Transport frame carrying one request
///
/// `id` is chosen by the caller and echoed in the reply, so several calls
/// (a blocked Receive among them) can be in flight on one connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestFrame {
    pub id: u64,
    pub request: Request,
}

/// Transport frame carrying one reply or a protocol error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseFrame {
    /// None when the offending request could not be parsed
    pub id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Response>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResponseFrame {
    pub fn reply(id: u64, response: Response) -> Self {
        Self {
            id: Some(id),
            response: Some(response),
            error: None,
        }
    }

    pub fn error(id: Option<u64>, message: impl Into<String>) -> Self {
        Self {
            id,
            response: None,
            error: Some(message.into()),
        }
    }
}

/// A delivered payload as a consumer interprets it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// `** ... **` notice; holds the whole trimmed line
    System(String),
    /// `[sender]: content`
    Chat { sender: String, content: String },
    /// Anything else; holds the whole trimmed line
    Other(String),
}

impl Payload {
    /// Classify one payload; `None` for blank ones (an unregistered Receive)
    pub fn classify(raw: &str) -> Option<Self> {
        let line = raw.trim();
        if line.is_empty() {
            return None;
        }

        if line.starts_with("**") {
            return Some(Payload::System(line.to_string()));
        }

        let chat = line.split_once(':').and_then(|(head, rest)| {
            let sender = head.strip_prefix('[')?.strip_suffix(']')?;
            Some(Payload::Chat {
                sender: sender.to_string(),
                content: rest.strip_prefix(' ').unwrap_or(rest).to_string(),
            })
        });

        Some(chat.unwrap_or_else(|| Payload::Other(line.to_string())))
    }

    pub fn is_system(&self) -> bool {
        matches!(self, Payload::System(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_frame_deserialize() {
        let json = r#"{"id": 7, "request": {"type": "send_message", "sender": "bob", "content": "hi"}}"#;
        let frame: RequestFrame = serde_json::from_str(json).unwrap();
        assert_eq!(frame.id, 7);
        match frame.request {
            Request::SendMessage { sender, content } => {
                assert_eq!(sender, Identity::from("bob"));
                assert_eq!(content, "hi");
            }
            _ => panic!("Wrong variant"),
        }
    }

    #[test]
    fn test_response_frame_serialize() {
        let frame = ResponseFrame::reply(
            3,
            Response::Payload {
                payload: "[bob]: hi".to_string(),
            },
        );
        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains("\"id\":3"));
        assert!(json.contains("\"type\":\"payload\""));
        assert!(json.contains("\"payload\":\"[bob]: hi\""));
        assert!(!json.contains("error"));

        let json = serde_json::to_string(&ResponseFrame::error(None, "bad frame")).unwrap();
        assert!(json.contains("\"id\":null"));
        assert!(json.contains("\"error\":\"bad frame\""));
    }

    #[test]
    fn test_wire_replies() {
        assert_eq!(Response::Ok.as_wire(), "ok");
        assert_eq!(Response::Sent.as_wire(), "sent");
        let payload = Response::Payload {
            payload: String::new(),
        };
        assert_eq!(payload.as_wire(), "");
    }

    #[test]
    fn test_classify_system() {
        let payload = Payload::classify("** User [bob] joined the chat **\n").unwrap();
        assert_eq!(
            payload,
            Payload::System("** User [bob] joined the chat **".to_string())
        );
        assert!(payload.is_system());
    }

    #[test]
    fn test_classify_chat() {
        assert_eq!(
            Payload::classify("[bob]: hi: there"),
            Some(Payload::Chat {
                sender: "bob".to_string(),
                content: "hi: there".to_string(),
            })
        );
    }

    #[test]
    fn test_classify_other_and_blank() {
        assert_eq!(
            Payload::classify("bob: hi"),
            Some(Payload::Other("bob: hi".to_string()))
        );
        assert_eq!(Payload::classify("   "), None);
        assert_eq!(Payload::classify(""), None);
    }
}
