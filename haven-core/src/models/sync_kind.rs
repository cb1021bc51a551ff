use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The kind of deferred action, which decides where it is delivered.
///
/// Serialized as the bare discriminator string used in the persisted queue.
/// Discriminators this build does not know about are kept verbatim in
/// [`SyncKind::Other`] so they survive a load/save cycle untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SyncKind {
    Message,
    EmotionSample,
    ProfileUpdate,
    Other(String),
}

/// HTTP verb used by a submission endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointMethod {
    Post,
    Put,
}

/// Where a kind of item is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub method: EndpointMethod,
    pub path: &'static str,
}

impl SyncKind {
    /// Returns the wire discriminator for this kind.
    pub fn as_str(&self) -> &str {
        match self {
            SyncKind::Message => "message",
            SyncKind::EmotionSample => "emotion",
            SyncKind::ProfileUpdate => "profile_update",
            SyncKind::Other(raw) => raw,
        }
    }

    /// Returns the endpoint this kind is submitted to, or `None` for
    /// unrecognized kinds.
    pub fn endpoint(&self) -> Option<Endpoint> {
        let (method, path) = match self {
            SyncKind::Message => (EndpointMethod::Post, "/api/conversation/chat"),
            SyncKind::EmotionSample => (EndpointMethod::Post, "/api/emotion/track"),
            SyncKind::ProfileUpdate => (EndpointMethod::Put, "/api/user/profile"),
            SyncKind::Other(_) => return None,
        };
        Some(Endpoint { method, path })
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, SyncKind::Other(_))
    }
}

impl From<String> for SyncKind {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "message" => SyncKind::Message,
            "emotion" => SyncKind::EmotionSample,
            "profile_update" => SyncKind::ProfileUpdate,
            _ => SyncKind::Other(raw),
        }
    }
}

impl From<SyncKind> for String {
    fn from(kind: SyncKind) -> Self {
        match kind {
            SyncKind::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for SyncKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Strict parsing for user input: only known kinds (and a few aliases).
impl FromStr for SyncKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "message" => Ok(SyncKind::Message),
            "emotion" | "emotion_sample" => Ok(SyncKind::EmotionSample),
            "profile_update" | "profile" => Ok(SyncKind::ProfileUpdate),
            _ => Err(format!(
                "Invalid kind: '{}'. Valid options: message, emotion, profile_update",
                s
            )),
        }
    }
}
