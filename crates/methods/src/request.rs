//! Pending requests exchanged between an engine and the client.
//!
//! A request carries the content the client sees and, once answered, the
//! preference the client attached to it. Contents are plain JSON objects so
//! they can be echoed back verbatim (navigation step-back relies on this).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::preference::Preference;

/// What a request asks the client for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    ReferencePoint,
    Classification,
    Save,
    Intermediate,
    MostPreferred,
    Navigation,
    PreferredSolutions,
    NonPreferredSolutions,
    Bounds,
    /// The method has produced its final answer.
    Stop,
}

impl RequestKind {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stop)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub kind: RequestKind,
    pub content: Map<String, Value>,
    #[serde(default)]
    pub response: Option<Preference>,
}

impl Request {
    /// Build a request from any serializable content struct.
    pub fn new<T: Serialize>(kind: RequestKind, content: &T) -> Self {
        let content = match serde_json::to_value(content) {
            Ok(Value::Object(map)) => map,
            // Content types are all structs; anything else is a programming
            // error that should still not take the server down.
            Ok(other) => {
                let mut map = Map::new();
                map.insert("value".into(), other);
                map
            }
            Err(e) => {
                let mut map = Map::new();
                map.insert("error".into(), Value::String(e.to_string()));
                map
            }
        };
        Self {
            kind,
            content,
            response: None,
        }
    }

    pub fn with_response(mut self, response: Preference) -> Self {
        self.response = Some(response);
        self
    }

    /// Read the content back as a typed struct.
    pub fn content_as<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_value(Value::Object(self.content.clone()))
    }
}

/// The last request(s) issued by an engine. Multi-preference families
/// issue a tuple of parallel variants, one per preference type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", content = "requests", rename_all = "snake_case")]
pub enum PendingRequests {
    Single(Request),
    Tuple(Vec<Request>),
}

impl PendingRequests {
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Single(r) => r.kind.is_terminal(),
            Self::Tuple(rs) => rs.iter().any(|r| r.kind.is_terminal()),
        }
    }

    /// The client-facing projection: one content object, or an array of
    /// them for a tuple.
    pub fn contents(&self) -> Value {
        match self {
            Self::Single(r) => Value::Object(r.content.clone()),
            Self::Tuple(rs) => Value::Array(
                rs.iter()
                    .map(|r| Value::Object(r.content.clone()))
                    .collect(),
            ),
        }
    }
}

/// What the engine is asked to do on `iterate`.
#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    /// A pending request with the client's preference attached.
    Respond(Request),
    /// Keep going without steering.
    Advance,
    /// No preference was given: wrap up and return the final result.
    Finalize,
}
