//! Connection roles and pure event routing.
//!
//! A connection starts `Unidentified` and commits to exactly one role on its
//! first `start`, provided it is well formed; a malformed one leaves it
//! unidentified for good. After that, every inbound event is turned into a
//! list of [`Action`]s by [`route`], which touches no shared state; the
//! connection actor executes them.

use serde_json::Value;

use super::protocol::{ClientEvent, ServerEvent};
use crate::registry::Session;
use crate::rooms::RoomKey;
use crate::session::{MultiplexId, RemoteId, SessionIds};

#[derive(Debug, Clone, PartialEq)]
pub enum Role {
    Unidentified,
    Presenter(SessionIds),
    RemoteController(RemoteId),
    Follower(MultiplexId),
}

impl Role {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unidentified => "unidentified",
            Self::Presenter(_) => "presenter",
            Self::RemoteController(_) => "remote",
            Self::Follower(_) => "follower",
        }
    }

    /// Rooms a connection in this role belongs to.
    pub fn rooms(&self) -> Vec<RoomKey> {
        match self {
            Self::Unidentified => Vec::new(),
            Self::Presenter(ids) => vec![RoomKey::Presenter(ids.remote_id.clone())],
            Self::RemoteController(id) => vec![RoomKey::Remote(id.clone())],
            Self::Follower(id) => vec![RoomKey::Multiplex(id.clone())],
        }
    }
}

/// Side effect requested by the routing functions.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    RecordState(RemoteId, Value),
    RecordNotes(RemoteId, Value),
    RecordMultiplex(MultiplexId, Value),
    /// Deliver to every member of `room` except this connection
    Publish { room: RoomKey, event: ServerEvent },
    /// Deliver to this connection only
    Reply(ServerEvent),
}

/// Route an event received after initiation. Events outside the role's
/// vocabulary (including a second `start`) yield no actions.
pub fn route(role: &Role, event: ClientEvent) -> Vec<Action> {
    match (role, event) {
        (Role::Presenter(ids), ClientEvent::StateChanged(data)) => vec![
            Action::RecordState(ids.remote_id.clone(), data.clone()),
            Action::Publish {
                room: RoomKey::Remote(ids.remote_id.clone()),
                event: ServerEvent::StateChanged(data),
            },
        ],
        (Role::Presenter(ids), ClientEvent::NotesChanged(data)) => vec![
            Action::RecordNotes(ids.remote_id.clone(), data.clone()),
            Action::Publish {
                room: RoomKey::Remote(ids.remote_id.clone()),
                event: ServerEvent::NotesChanged(data),
            },
        ],
        (Role::Presenter(ids), ClientEvent::Multiplex(data)) => vec![
            Action::RecordMultiplex(ids.multiplex_id.clone(), data.clone()),
            Action::Publish {
                room: RoomKey::Multiplex(ids.multiplex_id.clone()),
                event: ServerEvent::Multiplex(data),
            },
        ],
        (Role::RemoteController(id), ClientEvent::Command(data)) => {
            match data.get("command").and_then(Value::as_str) {
                Some(command) => vec![Action::Publish {
                    room: RoomKey::Presenter(id.clone()),
                    event: ServerEvent::Command {
                        command: command.to_string(),
                    },
                }],
                None => Vec::new(),
            }
        }
        _ => Vec::new(),
    }
}

/// What a remote controller gets right after joining: the presenter is told
/// about it, and cached notes then state are replayed to the newcomer.
pub fn remote_greeting(id: &RemoteId, cached: Option<Session>) -> Vec<Action> {
    let mut actions = vec![Action::Publish {
        room: RoomKey::Presenter(id.clone()),
        event: ServerEvent::ClientConnected {},
    }];
    if let Some(session) = cached {
        if let Some(notes) = session.notes {
            actions.push(Action::Reply(ServerEvent::NotesChanged(notes)));
        }
        if let Some(state) = session.state {
            actions.push(Action::Reply(ServerEvent::StateChanged(state)));
        }
    }
    actions
}

/// Replay of the last multiplex snapshot for a joining follower.
pub fn follower_greeting(cached: Option<Value>) -> Vec<Action> {
    cached
        .map(|snapshot| vec![Action::Reply(ServerEvent::Multiplex(snapshot))])
        .unwrap_or_default()
}
