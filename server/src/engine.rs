//! Authoritative rules engine for the line-claiming games.
//!
//! One generic engine serves every game variant; the variants differ only
//! in route path and leaderboard key, never in rules. The engine is a pure
//! state machine: no I/O, and invalid input is an ordinary rejected-move
//! outcome rather than an error.

use shared::{Orientation, Player, Scores, StateSnapshot};

/// Edge slots for one grid cell. Ownership is write-once.
#[derive(Debug, Clone, Copy, Default)]
struct Cell {
    horizontal: Option<Player>,
    vertical: Option<Player>,
}

/// Result of one [`GameEngine::apply_move`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveOutcome {
    /// Whether the move changed state. Rejections leave state untouched.
    pub accepted: bool,
    /// Boxes the move completed (0, 1 or 2).
    pub boxes_completed: u8,
}

impl MoveOutcome {
    fn rejected() -> Self {
        MoveOutcome {
            accepted: false,
            boxes_completed: 0,
        }
    }
}

/// Board, boxes, scores, turn and winner for one game instance.
///
/// The board is an N x N grid of cells, each holding an independent
/// horizontal and vertical edge slot; boxes form the (N-1) x (N-1) inner
/// grid. A box belongs to whichever player placed its fourth bounding edge,
/// and completing any box grants another turn.
#[derive(Debug, Clone)]
pub struct GameEngine {
    size: usize,
    board: Vec<Vec<Cell>>,
    boxes: Vec<Vec<Option<Player>>>,
    scores: [u32; 2],
    current_player: Player,
    winner: Option<Player>,
}

impl GameEngine {
    /// Creates an engine for an N x N board in the initial configuration.
    pub fn new(size: usize) -> Self {
        GameEngine {
            size,
            board: vec![vec![Cell::default(); size]; size],
            boxes: vec![vec![None; size.saturating_sub(1)]; size.saturating_sub(1)],
            scores: [0, 0],
            current_player: Player::One,
            winner: None,
        }
    }

    /// Returns the game to the initial configuration in place. Idempotent.
    pub fn reset(&mut self) {
        let fresh = GameEngine::new(self.size);
        *self = fresh;
    }

    pub fn board_size(&self) -> usize {
        self.size
    }

    pub fn current_player(&self) -> Player {
        self.current_player
    }

    /// Decided winner; `None` while undecided and on a tie.
    pub fn winner(&self) -> Option<Player> {
        self.winner
    }

    pub fn score(&self, player: Player) -> u32 {
        self.scores[player.index()]
    }

    /// True once every box is claimed. The winner is evaluated exactly at
    /// this transition and never recomputed afterwards; a tie leaves it
    /// unset even though the game is over.
    pub fn finished(&self) -> bool {
        let boxes = self.size.saturating_sub(1);
        self.scores[0] + self.scores[1] == (boxes * boxes) as u32
    }

    /// Validates and applies one move.
    ///
    /// Rejected without state change when the mover is not the current
    /// player, the coordinates fall outside the range valid for the
    /// orientation, or the edge is already owned. On acceptance the edge is
    /// claimed, the 1-2 adjacent boxes are evaluated, the winner is
    /// recomputed if the board filled, and the turn passes to the other
    /// player only if no box was completed.
    pub fn apply_move(
        &mut self,
        player: Player,
        orientation: Orientation,
        row: usize,
        col: usize,
    ) -> MoveOutcome {
        if player != self.current_player {
            return MoveOutcome::rejected();
        }

        let boxes_size = self.size.saturating_sub(1);
        let mut completed = 0u8;

        match orientation {
            Orientation::Horizontal => {
                // Horizontal edges: row in [0, N), col in [0, N-1).
                if row >= self.size || col >= boxes_size {
                    return MoveOutcome::rejected();
                }
                if self.board[row][col].horizontal.is_some() {
                    return MoveOutcome::rejected();
                }
                self.board[row][col].horizontal = Some(player);

                // The edge is the bottom of the box above and the top of
                // the box below; boundary rows simply have fewer neighbors.
                if row > 0 && self.box_complete(row - 1, col) {
                    self.claim_box(row - 1, col, player);
                    completed += 1;
                }
                if row < boxes_size && self.box_complete(row, col) {
                    self.claim_box(row, col, player);
                    completed += 1;
                }
            }
            Orientation::Vertical => {
                // Vertical edges: row in [0, N-1), col in [0, N).
                if row >= boxes_size || col >= self.size {
                    return MoveOutcome::rejected();
                }
                if self.board[row][col].vertical.is_some() {
                    return MoveOutcome::rejected();
                }
                self.board[row][col].vertical = Some(player);

                if col > 0 && self.box_complete(row, col - 1) {
                    self.claim_box(row, col - 1, player);
                    completed += 1;
                }
                if col < boxes_size && self.box_complete(row, col) {
                    self.claim_box(row, col, player);
                    completed += 1;
                }
            }
        }

        if self.finished() {
            self.winner = match self.scores[0].cmp(&self.scores[1]) {
                std::cmp::Ordering::Greater => Some(Player::One),
                std::cmp::Ordering::Less => Some(Player::Two),
                std::cmp::Ordering::Equal => None,
            };
        }

        if completed == 0 {
            self.current_player = player.other();
        }

        MoveOutcome {
            accepted: true,
            boxes_completed: completed,
        }
    }

    /// All four bounding edges of box (row, col) are owned.
    fn box_complete(&self, row: usize, col: usize) -> bool {
        self.board[row][col].horizontal.is_some()
            && self.board[row + 1][col].horizontal.is_some()
            && self.board[row][col].vertical.is_some()
            && self.board[row][col + 1].vertical.is_some()
    }

    fn claim_box(&mut self, row: usize, col: usize, player: Player) {
        self.boxes[row][col] = Some(player);
        self.scores[player.index()] += 1;
    }

    /// Builds the wire snapshot, with the peer `count` supplied by the
    /// registry that knows its audience.
    pub fn snapshot(&self, count: usize) -> StateSnapshot {
        StateSnapshot {
            kind: "state".to_string(),
            board: self
                .board
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|cell| [owner_wire(cell.horizontal), owner_wire(cell.vertical)])
                        .collect()
                })
                .collect(),
            boxes: self
                .boxes
                .iter()
                .map(|row| row.iter().map(|owner| owner_wire(*owner)).collect())
                .collect(),
            scores: Scores {
                player_one: self.scores[0],
                player_two: self.scores[1],
            },
            current_player: self.current_player.as_wire(),
            winner: owner_wire(self.winner),
            count,
        }
    }
}

fn owner_wire(owner: Option<Player>) -> u8 {
    owner.map(Player::as_wire).unwrap_or(0)
}
