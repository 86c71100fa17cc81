//! Client-side views derived from the raw store rows
//!
//! The store returns every row it has, in whatever order, possibly missing
//! rows that are still being written. Everything here is a pure function of
//! that row list, so a view converges as soon as a poll sees the missing rows.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::score::ElapsedTime;
use crate::types::{PlayerScoreRecord, RoleTag};

/// Who is in a party and whether the host has started it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LobbyView {
    /// Distinct names in order of first appearance
    pub players: Vec<String>,
    pub started: bool,
}

impl LobbyView {
    pub fn contains(&self, name: &str) -> bool {
        self.players.iter().any(|p| p == name)
    }
}

/// One reconciled player in a party leaderboard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub name: String,
    pub points: i64,
    pub elapsed: ElapsedTime,
    /// `Host`, `Player` or `None`; legacy ranks from the store are dropped
    pub role: RoleTag,
}

impl LeaderboardEntry {
    fn from_record(record: &PlayerScoreRecord) -> Self {
        Self {
            name: record.player_name.clone(),
            points: record.points,
            elapsed: record.elapsed,
            role: role_only(&record.role),
        }
    }

    pub fn is_host(&self) -> bool {
        self.role.is_host()
    }
}

/// A row of the full-history view
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub game_code: String,
    pub player_name: String,
    pub elapsed: ElapsedTime,
    /// Whatever the `place` column held, `-` when empty
    pub place: String,
}

pub fn lobby_membership(rows: &[PlayerScoreRecord], game_code: &str) -> LobbyView {
    let mut view = LobbyView::default();

    for row in rows.iter().filter(|r| r.belongs_to(game_code)) {
        if row.is_start_marker() {
            view.started = true;
        } else if !view.contains(&row.player_name) {
            view.players.push(row.player_name.clone());
        }
    }

    view
}

/// Fold one more row for an already-seen name into its entry.
///
/// A finished row replaces an unfinished one and the first finished row wins.
/// Between two unfinished rows the one with more points wins (a timed-out
/// result beats the bare registration). The host role survives either way.
pub fn merge_entry(existing: LeaderboardEntry, incoming: &PlayerScoreRecord) -> LeaderboardEntry {
    let role = merged_role(&existing.role, &incoming.role);

    let take_incoming = match (existing.elapsed.is_finished(), incoming.elapsed.is_finished()) {
        (false, true) => true,
        (false, false) => incoming.points > existing.points,
        (true, _) => false,
    };

    let mut merged = if take_incoming {
        LeaderboardEntry::from_record(incoming)
    } else {
        existing
    };
    merged.role = role;
    merged
}

/// One entry per distinct name, in order of first appearance
pub fn fold_entries(rows: &[PlayerScoreRecord], game_code: &str) -> Vec<LeaderboardEntry> {
    let mut entries: Vec<LeaderboardEntry> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for row in rows
        .iter()
        .filter(|r| r.belongs_to(game_code) && !r.is_start_marker())
    {
        match index.get(&row.player_name) {
            Some(&i) => {
                let existing = entries[i].clone();
                entries[i] = merge_entry(existing, row);
            }
            None => {
                index.insert(row.player_name.clone(), entries.len());
                entries.push(LeaderboardEntry::from_record(row));
            }
        }
    }

    entries
}

/// Finished before unfinished, then points descending, then time ascending.
/// Unfinished entries keep their input order.
pub fn compare_entries(a: &LeaderboardEntry, b: &LeaderboardEntry) -> Ordering {
    match (a.elapsed.is_finished(), b.elapsed.is_finished()) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => Ordering::Equal,
        (true, true) => b
            .points
            .cmp(&a.points)
            .then_with(|| a.elapsed.cmp(&b.elapsed)),
    }
}

pub fn ranked_scores(rows: &[PlayerScoreRecord], game_code: &str) -> Vec<LeaderboardEntry> {
    let mut entries = fold_entries(rows, game_code);
    entries.sort_by(compare_entries);
    entries
}

/// Pair each entry with its 1-based rank. Ranks come from list position only.
pub fn with_ranks(
    entries: &[LeaderboardEntry],
) -> impl Iterator<Item = (usize, &LeaderboardEntry)> {
    entries.iter().enumerate().map(|(i, entry)| (i + 1, entry))
}

/// Every stored attempt across all parties, as stored
pub fn history(rows: &[PlayerScoreRecord]) -> Vec<HistoryEntry> {
    rows.iter()
        .filter(|r| !r.is_start_marker())
        .map(|r| {
            let place = r.role.as_cell();
            HistoryEntry {
                game_code: if r.game_code.is_empty() {
                    "-".to_string()
                } else {
                    r.game_code.clone()
                },
                player_name: r.player_name.clone(),
                elapsed: r.elapsed,
                place: if place.is_empty() { "-".to_string() } else { place },
            }
        })
        .collect()
}

fn role_only(tag: &RoleTag) -> RoleTag {
    if tag.is_role() {
        tag.clone()
    } else {
        RoleTag::None
    }
}

fn merged_role(existing: &RoleTag, incoming: &RoleTag) -> RoleTag {
    if existing.is_host() || incoming.is_host() {
        RoleTag::Host
    } else if existing.is_role() {
        existing.clone()
    } else {
        role_only(incoming)
    }
}
