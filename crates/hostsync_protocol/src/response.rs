//! Response messages.

use crate::delivery::Delivery;
use crate::error::ProtocolResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outcome classification of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// The operation succeeded.
    Ok,
    /// The request was rejected (bad arguments, credentials, authorization).
    Failed,
    /// The server could not complete the operation.
    Error,
}

/// Machine-readable failure description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable tag, e.g. `not_host`.
    pub tag: String,
    /// Human-readable message.
    pub message: String,
}

/// Public description of a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    /// Group id.
    pub group: String,
    /// Application namespace.
    pub app: String,
    /// Host identity.
    pub host: String,
}

/// Body of a successful response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResponseBody {
    /// A freshly issued session token.
    Session {
        /// Session token.
        session: String,
    },
    /// Groups of an application.
    Groups {
        /// Groups ordered by id.
        groups: Vec<GroupInfo>,
    },
    /// Members of a group.
    Members {
        /// Member identities.
        members: Vec<String>,
    },
    /// Explicitly read fields.
    Fields {
        /// Field data by name.
        data: BTreeMap<String, String>,
    },
    /// Account-private data.
    Private {
        /// Stored data, if the key is set.
        data: Option<String>,
    },
    /// Outcome of a delete.
    Deleted {
        /// False if there was nothing to delete.
        deleted: bool,
    },
    /// Completion of a listen request.
    Delivery {
        /// The delivered payload.
        delivery: Delivery,
    },
}

/// A response to one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// Correlation id copied from the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// Outcome classification.
    pub status: Status,
    /// Server time in milliseconds.
    pub time: u64,
    /// Failure description when status is not `Ok`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
    /// Optional success body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<ResponseBody>,
}

impl Response {
    /// Creates a successful response.
    pub fn ok(time: u64, body: Option<ResponseBody>) -> Self {
        Self {
            id: None,
            status: Status::Ok,
            time,
            error: None,
            body,
        }
    }

    /// Creates a failed response.
    pub fn failure(
        time: u64,
        status: Status,
        tag: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            status,
            time,
            error: Some(ErrorBody {
                tag: tag.into(),
                message: message.into(),
            }),
            body: None,
        }
    }

    /// Sets the correlation id.
    pub fn with_id(mut self, id: Option<u64>) -> Self {
        self.id = id;
        self
    }

    /// Returns true if the status is `Ok`.
    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    /// Returns the error tag of a failed response.
    pub fn error_tag(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.tag.as_str())
    }

    /// Encodes to a single JSON line (without the trailing newline).
    pub fn encode(&self) -> ProtocolResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decodes from JSON.
    pub fn decode(text: &str) -> ProtocolResult<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::{InputDelivery, InputItem};

    #[test]
    fn failure_carries_tag_and_message() {
        let resp = Response::failure(5, Status::Failed, "not_host", "alice is not the host")
            .with_id(Some(3));
        assert!(!resp.is_ok());
        assert_eq!(resp.error_tag(), Some("not_host"));

        let decoded = Response::decode(&resp.encode().unwrap()).unwrap();
        assert_eq!(decoded, resp);
    }

    #[test]
    fn success_omits_empty_parts() {
        let json = Response::ok(42, None).encode().unwrap();
        assert_eq!(json, r#"{"status":"ok","time":42}"#);
    }

    #[test]
    fn delivery_body_nests_inputs() {
        let body = ResponseBody::Delivery {
            delivery: Delivery::Inputs(InputDelivery {
                inputs: vec![InputItem {
                    user: "bob".into(),
                    input: r#"{"move":3}"#.into(),
                    time: 9,
                }],
                ack: vec!["id2".into()],
            }),
        };
        let resp = Response::ok(10, Some(body));
        let decoded = Response::decode(&resp.encode().unwrap()).unwrap();
        assert_eq!(decoded, resp);
    }
}
