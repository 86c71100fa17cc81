use serde::{Deserialize, Serialize};

use crate::score::ElapsedTime;

/// Opaque identifier grouping one party's rows
pub type GameCode = String;

/// Reserved player name of the row that marks a party's game as started
pub const GAME_START_SIGNAL: &str = "__GAME_START__";

/// Points carried by the game-start marker row (never a valid player score)
pub const GAME_START_POINTS: i64 = -1;

/// Role or rank annotation carried in the overloaded `place` column
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RoleTag {
    Host,
    Player,
    /// Legacy rank written by older clients; cosmetic only
    Place(u32),
    #[default]
    None,
}

impl RoleTag {
    /// Interpret the free-text `place` column. Unknown text degrades to `None`.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("host") {
            RoleTag::Host
        } else if trimmed.eq_ignore_ascii_case("player") {
            RoleTag::Player
        } else if let Ok(place) = trimmed.parse::<u32>() {
            RoleTag::Place(place)
        } else {
            RoleTag::None
        }
    }

    /// The text written to the `place` column
    pub fn as_cell(&self) -> String {
        match self {
            RoleTag::Host => "Host".to_string(),
            RoleTag::Player => "Player".to_string(),
            RoleTag::Place(place) => place.to_string(),
            RoleTag::None => String::new(),
        }
    }

    pub fn is_host(&self) -> bool {
        matches!(self, RoleTag::Host)
    }

    /// Whether this tag names a role rather than a rank or nothing
    pub fn is_role(&self) -> bool {
        matches!(self, RoleTag::Host | RoleTag::Player)
    }
}

/// One row as retrieved from the remote store, after lenient decoding
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerScoreRecord {
    pub game_code: GameCode,
    pub player_name: String,
    pub elapsed: ElapsedTime,
    pub points: i64,
    pub role: RoleTag,
}

impl PlayerScoreRecord {
    pub fn is_start_marker(&self) -> bool {
        self.player_name == GAME_START_SIGNAL
    }

    pub fn belongs_to(&self, game_code: &str) -> bool {
        self.game_code == game_code.trim()
    }
}

/// Backend action name carried by every write
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum WriteAction {
    RegisterPlayer,
    UpdateScore,
}

/// One row appended to the remote store, in the backend's column names
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RowWrite {
    pub action: WriteAction,
    #[serde(rename = "gaming")]
    pub game_code: GameCode,
    pub player_name: String,
    /// `MM:SS` for a finished run, empty for "not finished"
    pub score: String,
    pub points: i64,
    /// Role annotation (`Host`, `Player`) or empty
    pub place: String,
}

impl RowWrite {
    pub fn registration(game_code: &str, player_name: &str, role: &RoleTag) -> Self {
        Self {
            action: WriteAction::RegisterPlayer,
            game_code: game_code.trim().to_string(),
            player_name: player_name.to_string(),
            score: String::new(),
            points: 0,
            place: role.as_cell(),
        }
    }

    pub fn game_start(game_code: &str) -> Self {
        Self {
            action: WriteAction::RegisterPlayer,
            game_code: game_code.trim().to_string(),
            player_name: GAME_START_SIGNAL.to_string(),
            score: String::new(),
            points: GAME_START_POINTS,
            place: String::new(),
        }
    }

    pub fn final_score(
        game_code: &str,
        player_name: &str,
        points: i64,
        elapsed: ElapsedTime,
    ) -> Self {
        Self {
            action: WriteAction::UpdateScore,
            game_code: game_code.trim().to_string(),
            player_name: player_name.to_string(),
            score: elapsed.to_cell(),
            points,
            place: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_tag_parse() {
        assert_eq!(RoleTag::parse("Host"), RoleTag::Host);
        assert_eq!(RoleTag::parse(" player "), RoleTag::Player);
        assert_eq!(RoleTag::parse("2"), RoleTag::Place(2));
        assert_eq!(RoleTag::parse("-"), RoleTag::None);
        assert_eq!(RoleTag::parse(""), RoleTag::None);
    }

    #[test]
    fn test_row_write_uses_backend_column_names() {
        let row = RowWrite::registration("4821", "Sara", &RoleTag::Player);
        let json = serde_json::to_value(&row).unwrap();

        assert_eq!(json["action"], "registerPlayer");
        assert_eq!(json["gaming"], "4821");
        assert_eq!(json["player_name"], "Sara");
        assert_eq!(json["score"], "");
        assert_eq!(json["points"], 0);
        assert_eq!(json["place"], "Player");
    }

    #[test]
    fn test_game_start_row_is_never_a_score() {
        let row = RowWrite::game_start("4821");
        assert_eq!(row.player_name, GAME_START_SIGNAL);
        assert!(row.points < 0);
        assert!(row.score.is_empty());
    }

    #[test]
    fn test_final_score_row_formats_elapsed() {
        let row = RowWrite::final_score("4821", "Sara", 150, ElapsedTime::Finished(83_400));
        assert_eq!(row.action, WriteAction::UpdateScore);
        assert_eq!(row.score, "01:23");
        assert_eq!(row.points, 150);
    }
}
