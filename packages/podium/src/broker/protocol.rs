//! Broker Protocol Types
//!
//! Every WebSocket text frame carries one JSON envelope:
//! `{"event": "<name>", "data": <payload>}`.
//!
//! Relayed payloads (`state_changed`, `notes_changed`, `multiplex`) are opaque
//! to the server and forwarded unchanged.

use podium_auth::ResumptionHash;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::session::{MultiplexId, RemoteId};

/// Raw inbound envelope. `data` defaults to `null` when absent.
#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: Value,
}

/// Messages sent FROM a client TO the server
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Role declaration; only the first one on a connection counts
    Start(Value),
    StateChanged(Value),
    NotesChanged(Value),
    Multiplex(Value),
    Command(Value),
}

impl ClientEvent {
    /// Parse a text frame. Returns `None` for anything that is not a known
    /// event envelope.
    pub fn parse(text: &str) -> Option<Self> {
        let envelope: Envelope = serde_json::from_str(text).ok()?;
        let data = envelope.data;
        match envelope.event.as_str() {
            "start" => Some(Self::Start(data)),
            "state_changed" => Some(Self::StateChanged(data)),
            "notes_changed" => Some(Self::NotesChanged(data)),
            "multiplex" => Some(Self::Multiplex(data)),
            "command" => Some(Self::Command(data)),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Start(_) => "start",
            Self::StateChanged(_) => "state_changed",
            Self::NotesChanged(_) => "notes_changed",
            Self::Multiplex(_) => "multiplex",
            Self::Command(_) => "command",
        }
    }
}

/// Messages sent FROM the server TO a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Presenter handshake result: identifiers, join links and their QR codes
    Init(InitPayload),
    StateChanged(Value),
    NotesChanged(Value),
    Multiplex(Value),
    /// Remote controller request, forwarded to the presenter
    Command { command: String },
    /// A remote controller joined the presenter's session
    ClientConnected {},
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitPayload {
    pub remote_url: String,
    pub multiplex_url: String,
    pub hash: ResumptionHash,
    pub remote_id: RemoteId,
    pub multiplex_id: MultiplexId,
    /// `data:` URL of the remote-control QR code
    pub remote_image: String,
    /// `data:` URL of the multiplex QR code
    pub multiplex_image: String,
}

/// Previously issued identifiers a presenter offers back on reconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeClaim {
    pub remote_id: String,
    pub multiplex_id: String,
    pub hash: String,
}

/// A well-formed `start` payload.
#[derive(Debug, Clone, PartialEq)]
pub enum StartRequest {
    Presenter {
        share_url: String,
        resume: Option<ResumeClaim>,
    },
    Remote {
        id: RemoteId,
    },
    Follower {
        id: MultiplexId,
    },
}

fn str_field<'a>(data: &'a Value, key: &str) -> Option<&'a str> {
    data.get(key).and_then(Value::as_str)
}

impl StartRequest {
    /// Interpret a `start` payload. `None` means malformed: unknown `type`,
    /// missing `id` for remotes/followers, or missing `shareUrl` for
    /// presenters. `master` and `slave` are accepted as older spellings of
    /// `presenter` and `follower`.
    pub fn from_value(data: &Value) -> Option<Self> {
        match str_field(data, "type")? {
            "presenter" | "master" => {
                let share_url = str_field(data, "shareUrl")?.to_string();
                let resume = match (
                    str_field(data, "remoteId"),
                    str_field(data, "multiplexId"),
                    str_field(data, "hash"),
                ) {
                    (Some(remote_id), Some(multiplex_id), Some(hash)) => Some(ResumeClaim {
                        remote_id: remote_id.to_string(),
                        multiplex_id: multiplex_id.to_string(),
                        hash: hash.to_string(),
                    }),
                    _ => None,
                };
                Some(Self::Presenter { share_url, resume })
            }
            "remote" => Some(Self::Remote {
                id: RemoteId::new(str_field(data, "id")?)?,
            }),
            "follower" | "slave" => Some(Self::Follower {
                id: MultiplexId::new(str_field(data, "id")?)?,
            }),
            _ => None,
        }
    }
}
