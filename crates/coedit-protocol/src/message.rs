//! Message envelopes and topics

use coedit_core::Revision;
use serde::{Deserialize, Serialize};

use crate::error::ProtocolResult;

/// Every topic the server speaks, inbound or outbound. This enumeration is
/// the `getTopics` query surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Topic {
    CursorTracking,
    PostRevision,
    PublishRevision,
}

impl Topic {
    pub const ALL: [Topic; 3] = [
        Topic::CursorTracking,
        Topic::PostRevision,
        Topic::PublishRevision,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::CursorTracking => "CursorTracking",
            Topic::PostRevision => "PostRevision",
            Topic::PublishRevision => "PublishRevision",
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cursor coordinates as sent by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorPosition {
    pub x: f64,
    pub y: f64,
}

/// Cursor coordinates fanned out to peers, stamped with the originating
/// session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorBroadcast {
    pub session_id: String,
    pub x: f64,
    pub y: f64,
}

/// Inbound envelope: `{topic, sessionId, data}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inbound {
    pub session_id: String,
    #[serde(flatten)]
    pub payload: InboundPayload,
}

/// Topic-discriminated inbound payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "topic", content = "data")]
pub enum InboundPayload {
    CursorTracking(CursorPosition),
    PostRevision(Revision),
}

/// Outbound envelope: `{topic, data}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "topic", content = "data")]
pub enum Outbound {
    CursorTracking(CursorBroadcast),
    PublishRevision(Revision),
}

impl Outbound {
    pub fn encode(&self) -> ProtocolResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Decode one inbound text frame.
pub fn decode_inbound(text: &str) -> ProtocolResult<Inbound> {
    Ok(serde_json::from_str(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use coedit_core::{Element, ElementId, Operation};

    #[test]
    fn test_decode_cursor_tracking() {
        let inbound = decode_inbound(
            r#"{"topic":"CursorTracking","sessionId":"s-1","data":{"x":10.5,"y":-3.0}}"#,
        )
        .unwrap();

        assert_eq!(inbound.session_id, "s-1");
        assert_eq!(
            inbound.payload,
            InboundPayload::CursorTracking(CursorPosition { x: 10.5, y: -3.0 })
        );
    }

    #[test]
    fn test_decode_post_revision() {
        let inbound = decode_inbound(
            r#"{
                "topic": "PostRevision",
                "sessionId": "s-2",
                "data": {
                    "number": 0,
                    "operations": [
                        {"type": "insert", "positionIdx": 0,
                         "element": {"type": "Shape", "id": "el-1", "top": 1.0, "left": 2.0}}
                    ]
                }
            }"#,
        )
        .unwrap();

        let InboundPayload::PostRevision(revision) = inbound.payload else {
            panic!("expected PostRevision");
        };
        assert_eq!(revision.number, 0);
        assert_eq!(
            revision.operations,
            vec![Operation::Insert {
                position_idx: 0,
                element: Element::Shape {
                    id: ElementId::new("el-1"),
                    top: 1.0,
                    left: 2.0,
                },
            }]
        );
    }

    #[test]
    fn test_unknown_topic_rejected() {
        assert!(decode_inbound(r#"{"topic":"Nonsense","sessionId":"s","data":{}}"#).is_err());
    }

    #[test]
    fn test_missing_session_id_rejected() {
        assert!(decode_inbound(r#"{"topic":"CursorTracking","data":{"x":0,"y":0}}"#).is_err());
    }

    #[test]
    fn test_encode_cursor_broadcast() {
        let outbound = Outbound::CursorTracking(CursorBroadcast {
            session_id: "s-1".into(),
            x: 1.0,
            y: 2.0,
        });

        let json: serde_json::Value = serde_json::from_str(&outbound.encode().unwrap()).unwrap();
        assert_eq!(json["topic"], "CursorTracking");
        assert_eq!(json["data"]["sessionId"], "s-1");
        assert_eq!(json["data"]["x"], 1.0);
    }

    #[test]
    fn test_encode_publish_revision() {
        let outbound = Outbound::PublishRevision(Revision::new(
            3,
            vec![Operation::Delete { position_idx: 1 }],
        ));

        let json: serde_json::Value = serde_json::from_str(&outbound.encode().unwrap()).unwrap();
        assert_eq!(json["topic"], "PublishRevision");
        assert_eq!(json["data"]["number"], 3);
        assert_eq!(json["data"]["operations"][0]["positionIdx"], 1);
    }

    #[test]
    fn test_topic_names() {
        let names: Vec<&str> = Topic::ALL.iter().map(|t| t.as_str()).collect();
        assert_eq!(
            names,
            vec!["CursorTracking", "PostRevision", "PublishRevision"]
        );
    }
}
