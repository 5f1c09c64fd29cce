use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One event published into a session.
///
/// `data` is opaque to the relay; peers put an encrypted envelope there.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionEvent {
    pub event_id: Uuid,
    pub event: String,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl SessionEvent {
    pub fn new(event: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event: event.into(),
            data,
            created_at: Utc::now(),
        }
    }
}

/// Messages sent by peers to the relay.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Subscribe this connection to a session.
    JoinSession { id: u64, session_id: String },

    /// Drop this connection's subscription to a session.
    LeaveSession { id: u64, session_id: String },

    /// Persist and fan out an event to every subscriber of the session.
    PublishEvent {
        id: u64,
        session_id: String,
        event: String,
        data: serde_json::Value,
    },

    /// Replay every stored event of the session.
    FetchBacklog { id: u64, session_id: String },
}

impl ClientMessage {
    pub fn id(&self) -> u64 {
        match self {
            ClientMessage::JoinSession { id, .. }
            | ClientMessage::LeaveSession { id, .. }
            | ClientMessage::PublishEvent { id, .. }
            | ClientMessage::FetchBacklog { id, .. } => *id,
        }
    }

    pub fn session_id(&self) -> &str {
        match self {
            ClientMessage::JoinSession { session_id, .. }
            | ClientMessage::LeaveSession { session_id, .. }
            | ClientMessage::PublishEvent { session_id, .. }
            | ClientMessage::FetchBacklog { session_id, .. } => session_id,
        }
    }
}

/// Messages sent by the relay to peers.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Request with the given id succeeded.
    #[serde(rename = "OK")]
    Ok {
        id: u64,
        session_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event_id: Option<Uuid>,
    },

    /// Request with the given id was rejected.
    Fail {
        id: u64,
        session_id: String,
        error: String,
    },

    /// Event fanned out to a subscriber.
    Event {
        session_id: String,
        event: SessionEvent,
    },

    /// The session's subscription ended and events may have been missed.
    /// Join again and fetch the backlog to resynchronise.
    SubscriptionLost { session_id: String },

    /// Stored events, oldest first.
    Backlog {
        id: u64,
        session_id: String,
        events: Vec<SessionEvent>,
    },
}

impl ServerMessage {
    pub fn ok(id: u64, session_id: impl Into<String>) -> Self {
        ServerMessage::Ok {
            id,
            session_id: session_id.into(),
            event_id: None,
        }
    }

    pub fn fail(id: u64, session_id: impl Into<String>, error: impl Into<String>) -> Self {
        ServerMessage::Fail {
            id,
            session_id: session_id.into(),
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_message_wire_format() {
        let msg: ClientMessage = serde_json::from_value(json!({
            "type": "PublishEvent",
            "id": 7,
            "sessionId": "abc",
            "event": "Web3Request",
            "data": { "iv": [1, 2], "cipherText": [3] }
        }))
        .unwrap();

        assert_eq!(msg.id(), 7);
        assert_eq!(msg.session_id(), "abc");
        match msg {
            ClientMessage::PublishEvent { event, data, .. } => {
                assert_eq!(event, "Web3Request");
                assert_eq!(data["cipherText"], json!([3]));
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_server_message_wire_format() {
        let value = serde_json::to_value(ServerMessage::ok(3, "abc")).unwrap();
        assert_eq!(value, json!({ "type": "OK", "id": 3, "sessionId": "abc" }));

        let value = serde_json::to_value(ServerMessage::fail(4, "abc", "not joined")).unwrap();
        assert_eq!(value["type"], "Fail");
        assert_eq!(value["error"], "not joined");
    }

    #[test]
    fn test_event_roundtrip() {
        let msg = ServerMessage::Event {
            session_id: "abc".into(),
            event: SessionEvent::new("Web3Response", json!({ "iv": [0], "cipherText": [] })),
        };
        let text = serde_json::to_string(&msg).unwrap();
        assert!(text.contains("\"eventId\""));
        assert!(text.contains("\"createdAt\""));

        let parsed: ServerMessage = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn test_subscription_lost_wire_format() {
        let value = serde_json::to_value(ServerMessage::SubscriptionLost {
            session_id: "abc".into(),
        })
        .unwrap();
        assert_eq!(value, json!({ "type": "SubscriptionLost", "sessionId": "abc" }));
    }

    #[test]
    fn test_unknown_type_rejected() {
        let result = serde_json::from_str::<ClientMessage>(r#"{"type":"HostSession","id":1}"#);
        assert!(result.is_err());
    }
}
