//! Flat-file leaderboard, top three scores per game.
//!
//! External collaborator of the game sessions: the server submits a
//! finished game's winning score and the dashboard reads the file back.
//! The file is re-read on every submission so multiple handles on the same
//! path stay consistent; the poll loop is single-threaded, so there is no
//! concurrent writer to guard against.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;

use log::warn;
use serde::{Deserialize, Serialize};

/// Number of ranked entries kept per game.
pub const LEADER_SLOTS: usize = 3;

/// One ranked leaderboard entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderEntry {
    #[serde(rename = "INITIALS")]
    pub initials: String,
    #[serde(rename = "SCORE")]
    pub score: u32,
}

/// Ranked entries for one game, keyed `"1"` through `"3"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameLeaders {
    #[serde(rename = "LEADERS")]
    pub leaders: BTreeMap<String, LeaderEntry>,
}

/// Handle on the leaderboard file.
pub struct Leaderboard {
    path: PathBuf,
}

impl Leaderboard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Leaderboard { path: path.into() }
    }

    /// Loads the full leaderboard mapping. A missing or unreadable file is
    /// an empty board, not an error.
    pub fn load(&self) -> BTreeMap<String, GameLeaders> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return BTreeMap::new(),
            Err(e) => {
                warn!("Error loading leaderboard {}: {}", self.path.display(), e);
                return BTreeMap::new();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(data) => data,
            Err(e) => {
                warn!("Corrupt leaderboard {}: {}", self.path.display(), e);
                BTreeMap::new()
            }
        }
    }

    /// Records `score` under `game_key` if it ranks in the top three.
    ///
    /// Returns true when the score was accepted and persisted. Ties lose to
    /// the entries already on the board, so a score equal to the current
    /// minimum of a full board is rejected.
    pub fn try_submit_score(&self, game_key: &str, initials: &str, score: u32) -> bool {
        let mut data = self.load();
        let game = data.entry(game_key.to_string()).or_default();

        // Existing entries in rank order; the rank keys are "1".."3" so the
        // BTreeMap iteration order is already the ranking.
        let mut entries: Vec<LeaderEntry> = game.leaders.values().cloned().collect();

        if entries.len() >= LEADER_SLOTS {
            let lowest = entries.iter().map(|e| e.score).min().unwrap_or(0);
            if score <= lowest {
                return false;
            }
        }

        entries.push(LeaderEntry {
            initials: initials.to_string(),
            score,
        });
        // Stable sort: on ties, the earlier-ranked entry keeps its place and
        // the newcomer (appended last) sorts after it.
        entries.sort_by(|a, b| b.score.cmp(&a.score));
        entries.truncate(LEADER_SLOTS);

        game.leaders = entries
            .into_iter()
            .enumerate()
            .map(|(i, entry)| ((i + 1).to_string(), entry))
            .collect();

        match self.save(&data) {
            Ok(()) => true,
            Err(e) => {
                warn!("Error saving leaderboard {}: {}", self.path.display(), e);
                false
            }
        }
    }

    fn save(&self, data: &BTreeMap<String, GameLeaders>) -> io::Result<()> {
        let raw = serde_json::to_string(data).map_err(io::Error::from)?;
        fs::write(&self.path, raw)
    }
}
