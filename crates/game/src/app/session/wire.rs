//! JSON request and response shapes for the newline-delimited session
//! protocol. Requests carry an `action` tag; responses echo the action name
//! and put their payload fields at the top level of the same object. A
//! response without a `result` field means the request succeeded.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub(crate) type Dictionary = HashMap<char, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub(crate) struct ActorId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Direction {
    North,
    South,
    West,
    East,
}

impl Direction {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Direction::North => "north",
            Direction::South => "south",
            Direction::West => "west",
            Direction::East => "east",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub(crate) enum Request {
    Look {
        sid: String,
    },
    Move {
        sid: String,
        direction: Direction,
        tick: u64,
    },
    Examine {
        sid: String,
        id: ActorId,
    },
    GetDictionary,
}

impl Request {
    pub(crate) fn action(&self) -> ActionKind {
        match self {
            Request::Look { .. } => ActionKind::Look,
            Request::Move { .. } => ActionKind::Move,
            Request::Examine { .. } => ActionKind::Examine,
            Request::GetDictionary => ActionKind::GetDictionary,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ActionKind {
    Look,
    Move,
    Examine,
    GetDictionary,
}

impl ActionKind {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            ActionKind::Look => "look",
            ActionKind::Move => "move",
            ActionKind::Examine => "examine",
            ActionKind::GetDictionary => "getDictionary",
        }
    }

    pub(crate) fn from_wire(action: &str) -> Option<Self> {
        match action {
            "look" => Some(ActionKind::Look),
            "move" => Some(ActionKind::Move),
            "examine" => Some(ActionKind::Examine),
            "getDictionary" => Some(ActionKind::GetDictionary),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ResponseEnvelope {
    #[serde(default)]
    pub(crate) action: Option<String>,
    #[serde(default)]
    pub(crate) result: Option<String>,
    /// Interleaved server broadcasts carry only a tick counter.
    #[serde(default)]
    pub(crate) tick: Option<u64>,
}

pub(crate) fn result_is_ok(result: Option<&str>) -> bool {
    matches!(result, None | Some("ok"))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct ActorSnapshot {
    pub(crate) id: ActorId,
    #[serde(rename = "type")]
    pub(crate) kind: String,
    pub(crate) x: f32,
    pub(crate) y: f32,
}

/// One `look` response: the player position, the visible map window as rows
/// of cell codes, and every actor inside that window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct LookSnapshot {
    #[serde(default)]
    pub(crate) x: f32,
    #[serde(default)]
    pub(crate) y: f32,
    #[serde(default)]
    pub(crate) map: Vec<Vec<char>>,
    #[serde(default)]
    pub(crate) actors: Vec<ActorSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct ActorDetail {
    pub(crate) id: ActorId,
    #[serde(rename = "type")]
    pub(crate) kind: String,
    #[serde(default)]
    pub(crate) login: Option<String>,
    #[serde(default)]
    pub(crate) x: f32,
    #[serde(default)]
    pub(crate) y: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct DictionaryPayload {
    #[serde(default)]
    pub(crate) dictionary: Dictionary,
}
