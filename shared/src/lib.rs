//! Wire protocol shared between the game server and its clients.
//!
//! Inbound frames are loosely-shaped JSON from browser clients; two field
//! schemas are in circulation (`orientation`/`row`/`col` and the short
//! `t`/`r`/`c` form), so decoding goes through a raw alias-tolerant struct
//! and is then classified into a strict [`ClientMessage`]. Anything that
//! does not classify cleanly becomes [`ClientMessage::Ignored`] rather than
//! an error: a malformed frame must never cost a peer its connection.
//!
//! Outbound traffic is a single frame shape, [`StateSnapshot`], sent both
//! as the initial sync for a newly attached peer and as the broadcast after
//! every accepted state change.

use serde::{Deserialize, Serialize};

/// Default board grid dimension; boxes form the (N-1)x(N-1) inner grid.
pub const DEFAULT_BOARD_SIZE: usize = 8;

/// One of the two players in a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Player {
    One,
    Two,
}

impl Player {
    /// The opposing player.
    pub fn other(self) -> Player {
        match self {
            Player::One => Player::Two,
            Player::Two => Player::One,
        }
    }

    /// Zero-based index, for score arrays.
    pub fn index(self) -> usize {
        match self {
            Player::One => 0,
            Player::Two => 1,
        }
    }

    /// Wire representation (`1` or `2`).
    pub fn as_wire(self) -> u8 {
        match self {
            Player::One => 1,
            Player::Two => 2,
        }
    }

    /// Parses the wire representation; anything but `1` or `2` is invalid.
    pub fn from_wire(value: i64) -> Option<Player> {
        match value {
            1 => Some(Player::One),
            2 => Some(Player::Two),
            _ => None,
        }
    }
}

/// Orientation of a claimable edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// A fully validated move request.
///
/// `player` stays optional here; the session fills in the current player
/// when the client omitted the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveRequest {
    pub orientation: Orientation,
    pub row: usize,
    pub col: usize,
    pub player: Option<Player>,
}

/// Classified inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientMessage {
    /// Keep-alive, no state effect.
    Ping,
    /// Return the game to its initial configuration.
    Reset,
    /// Client announces itself; rebroadcast so peer counts propagate.
    Join,
    /// Claim an edge.
    Move(MoveRequest),
    /// Undecodable or rule-breaking frame shape; dropped silently.
    Ignored,
}

/// Raw inbound shape before validation. Unknown fields are ignored and the
/// two client schemas are merged via aliases.
#[derive(Debug, Default, Deserialize)]
struct RawMessage {
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(alias = "t")]
    orientation: Option<String>,
    #[serde(alias = "r")]
    row: Option<i64>,
    #[serde(alias = "c")]
    col: Option<i64>,
    player: Option<i64>,
}

/// Decodes one inbound text frame into a [`ClientMessage`].
///
/// Frames with a recognized `type` map directly; any other frame is treated
/// as a move attempt and must carry a valid orientation and non-negative
/// coordinates to classify, otherwise it is [`ClientMessage::Ignored`].
pub fn decode_message(payload: &str) -> ClientMessage {
    let raw: RawMessage = match serde_json::from_str(payload) {
        Ok(raw) => raw,
        Err(_) => return ClientMessage::Ignored,
    };

    match raw.kind.as_deref() {
        Some("ping") => return ClientMessage::Ping,
        Some("reset") => return ClientMessage::Reset,
        Some("join") => return ClientMessage::Join,
        _ => {}
    }

    let orientation = match raw.orientation.as_deref() {
        Some("h") => Orientation::Horizontal,
        Some("v") => Orientation::Vertical,
        _ => return ClientMessage::Ignored,
    };

    let (Some(row), Some(col)) = (raw.row, raw.col) else {
        return ClientMessage::Ignored;
    };
    let (Ok(row), Ok(col)) = (usize::try_from(row), usize::try_from(col)) else {
        return ClientMessage::Ignored;
    };

    let player = match raw.player {
        None => None,
        Some(value) => match Player::from_wire(value) {
            Some(player) => Some(player),
            None => return ClientMessage::Ignored,
        },
    };

    ClientMessage::Move(MoveRequest {
        orientation,
        row,
        col,
        player,
    })
}

/// Per-player box counts, keyed `"1"`/`"2"` on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scores {
    #[serde(rename = "1")]
    pub player_one: u32,
    #[serde(rename = "2")]
    pub player_two: u32,
}

/// Complete serialized game state, sent on init delivery and broadcast.
///
/// `board[r][c]` is `[horizontal_owner, vertical_owner]` and `boxes[r][c]`
/// is the box owner, all as `0|1|2`. `count` is the number of active peers
/// minus the conventionally reserved dashboard slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    #[serde(rename = "type")]
    pub kind: String,
    pub board: Vec<Vec<[u8; 2]>>,
    pub boxes: Vec<Vec<u8>>,
    pub scores: Scores,
    #[serde(rename = "currentPlayer")]
    pub current_player: u8,
    pub winner: u8,
    pub count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_long_schema_move() {
        let msg = decode_message(r#"{"player":1,"orientation":"h","row":2,"col":3}"#);
        assert_eq!(
            msg,
            ClientMessage::Move(MoveRequest {
                orientation: Orientation::Horizontal,
                row: 2,
                col: 3,
                player: Some(Player::One),
            })
        );
    }

    #[test]
    fn decode_short_schema_move() {
        let msg = decode_message(r#"{"type":"move","t":"v","r":4,"c":0}"#);
        assert_eq!(
            msg,
            ClientMessage::Move(MoveRequest {
                orientation: Orientation::Vertical,
                row: 4,
                col: 0,
                player: None,
            })
        );
    }

    #[test]
    fn decode_control_messages() {
        assert_eq!(decode_message(r#"{"type":"ping"}"#), ClientMessage::Ping);
        assert_eq!(decode_message(r#"{"type":"reset"}"#), ClientMessage::Reset);
        assert_eq!(decode_message(r#"{"type":"join"}"#), ClientMessage::Join);
    }

    #[test]
    fn unknown_type_with_move_fields_is_a_move() {
        let msg = decode_message(r#"{"type":"whatever","t":"h","r":0,"c":0}"#);
        assert!(matches!(msg, ClientMessage::Move(_)));
    }

    #[test]
    fn unknown_type_without_move_fields_is_ignored() {
        assert_eq!(decode_message(r#"{"type":"whatever"}"#), ClientMessage::Ignored);
        assert_eq!(decode_message(r#"{}"#), ClientMessage::Ignored);
    }

    #[test]
    fn malformed_payloads_are_ignored() {
        assert_eq!(decode_message(""), ClientMessage::Ignored);
        assert_eq!(decode_message("not json"), ClientMessage::Ignored);
        assert_eq!(decode_message("[1,2,3]"), ClientMessage::Ignored);
        assert_eq!(
            decode_message(r#"{"orientation":"h","row":"x","col":0}"#),
            ClientMessage::Ignored
        );
    }

    #[test]
    fn bad_move_fields_are_ignored() {
        // Bad orientation letter.
        assert_eq!(
            decode_message(r#"{"orientation":"d","row":0,"col":0}"#),
            ClientMessage::Ignored
        );
        // Negative coordinate.
        assert_eq!(
            decode_message(r#"{"orientation":"h","row":-1,"col":0}"#),
            ClientMessage::Ignored
        );
        // Player outside the permitted set.
        assert_eq!(
            decode_message(r#"{"orientation":"h","row":0,"col":0,"player":3}"#),
            ClientMessage::Ignored
        );
    }

    #[test]
    fn unknown_fields_are_tolerated() {
        let msg = decode_message(r#"{"orientation":"v","row":1,"col":1,"debug":true,"extra":"x"}"#);
        assert!(matches!(msg, ClientMessage::Move(_)));
    }

    #[test]
    fn snapshot_serializes_with_wire_field_names() {
        let snapshot = StateSnapshot {
            kind: "state".to_string(),
            board: vec![vec![[0, 0]; 2]; 2],
            boxes: vec![vec![0; 1]; 1],
            scores: Scores {
                player_one: 1,
                player_two: 0,
            },
            current_player: 2,
            winner: 0,
            count: 1,
        };

        let json = serde_json::to_string(&snapshot).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["type"], "state");
        assert_eq!(value["currentPlayer"], 2);
        assert_eq!(value["scores"]["1"], 1);
        assert_eq!(value["scores"]["2"], 0);
        assert_eq!(value["board"][0][0], serde_json::json!([0, 0]));
        assert_eq!(value["count"], 1);
    }

    #[test]
    fn player_helpers() {
        assert_eq!(Player::One.other(), Player::Two);
        assert_eq!(Player::Two.other(), Player::One);
        assert_eq!(Player::One.as_wire(), 1);
        assert_eq!(Player::from_wire(2), Some(Player::Two));
        assert_eq!(Player::from_wire(0), None);
    }
}
