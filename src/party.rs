//! Party flows: create, join, start, play, finish and the result views

use rand::Rng;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::{AppConfig, DuplicateNames};
use crate::events::EventSink;
use crate::leaderboard::{FileKeyValueStore, SoloLeaderboard};
use crate::llm::{LlmConfig, LlmPuzzleSource};
use crate::poll::{self, PollHandle};
use crate::puzzle::{
    interleave_by_kind, shuffle_for_client, BuiltinPuzzles, Puzzle, PuzzleError, PuzzleSource,
    WithFallback,
};
use crate::reconcile::{history, lobby_membership, HistoryEntry, LeaderboardEntry, LobbyView};
use crate::session::{GameSession, SessionOutcome};
use crate::signal::Signaler;
use crate::store::{HttpScoreStore, MemoryStore, RemoteStore, StoreError};
use crate::types::{GameCode, RoleTag};

pub type PartyResult<T> = Result<T, PartyError>;

/// Failures the player is shown; background work never produces these
#[derive(Debug, thiserror::Error)]
pub enum PartyError {
    #[error("Please enter your name")]
    EmptyName,

    #[error("Please enter a game code")]
    EmptyCode,

    #[error("The name {0} is already taken in this party")]
    NameTaken(String),

    #[error("Only the host can start the game")]
    NotHost,

    #[error("Could not reach the score store: {0}")]
    Store(#[from] StoreError),

    #[error("Could not load puzzles: {0}")]
    Puzzles(#[from] PuzzleError),
}

/// A client's membership in one party
#[derive(Debug, Clone)]
pub struct Party {
    pub game_code: GameCode,
    pub player_name: String,
    pub role: RoleTag,
    /// This client's puzzles; shared selection, private shuffle
    pub puzzles: Vec<Puzzle>,
}

impl Party {
    pub fn is_host(&self) -> bool {
        self.role.is_host()
    }
}

/// A fresh 4-digit game code
pub fn generate_game_code() -> GameCode {
    rand::rng().random_range(1000..=9999).to_string()
}

/// Seed shared by every client holding the same game code
pub fn seed_for_code(game_code: &str) -> u64 {
    let code = game_code.trim();
    code.parse::<u64>().unwrap_or_else(|_| {
        // FNV-1a
        code.bytes().fold(0xcbf2_9ce4_8422_2325u64, |hash, byte| {
            (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
        })
    })
}

fn required(value: &str, missing: PartyError) -> PartyResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(missing)
    } else {
        Ok(trimmed.to_string())
    }
}

pub struct PartyClient {
    store: Arc<dyn RemoteStore>,
    events: Arc<dyn EventSink>,
    puzzles: Arc<dyn PuzzleSource>,
    signaler: Signaler,
    config: AppConfig,
}

impl PartyClient {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        events: Arc<dyn EventSink>,
        puzzles: Arc<dyn PuzzleSource>,
        config: AppConfig,
    ) -> Self {
        let signaler = Signaler::new(store.clone(), events.clone());
        Self {
            store,
            events,
            puzzles,
            signaler,
            config,
        }
    }

    /// Assemble a client from loaded configuration.
    ///
    /// Scores go to the HTTP store when `store_url` is set and stay in memory
    /// otherwise. Puzzles come from the configured LLM providers backed by
    /// the built-in set, or from the built-in set alone when none is configured.
    pub fn from_config(
        config: AppConfig,
        llm: &LlmConfig,
        events: Arc<dyn EventSink>,
    ) -> PartyResult<Self> {
        let store: Arc<dyn RemoteStore> = match &config.store_url {
            Some(url) => Arc::new(HttpScoreStore::new(
                url.clone(),
                config.write_encoding,
                config.store_timeout,
            )?),
            None => {
                tracing::warn!("No SCORE_STORE_URL set, scores stay in memory");
                Arc::new(MemoryStore::new())
            }
        };

        let puzzles: Arc<dyn PuzzleSource> = match llm.build_manager() {
            Ok(manager) => Arc::new(WithFallback::new(
                LlmPuzzleSource::new(manager, llm),
                events.clone(),
            )),
            Err(e) => {
                tracing::warn!("Using built-in puzzles only: {}", e);
                Arc::new(BuiltinPuzzles)
            }
        };

        Ok(Self::new(store, events, puzzles, config))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Host a new party under a generated code
    pub async fn create_party(&self, host_name: &str) -> PartyResult<Party> {
        self.create_party_with_code(host_name, &generate_game_code())
            .await
    }

    pub async fn create_party_with_code(
        &self,
        host_name: &str,
        game_code: &str,
    ) -> PartyResult<Party> {
        let host_name = required(host_name, PartyError::EmptyName)?;
        let game_code = required(game_code, PartyError::EmptyCode)?;

        let puzzles = self.party_puzzles(&game_code).await?;
        self.signaler.register_host(&game_code, &host_name).await?;

        tracing::info!("{} created party {}", host_name, game_code);
        Ok(Party {
            game_code,
            player_name: host_name,
            role: RoleTag::Host,
            puzzles,
        })
    }

    /// Join an existing party as a player
    pub async fn join_party(&self, player_name: &str, game_code: &str) -> PartyResult<Party> {
        let player_name = required(player_name, PartyError::EmptyName)?;
        let game_code = required(game_code, PartyError::EmptyCode)?;

        if self.config.duplicate_names == DuplicateNames::Reject {
            let rows = self.store.fetch_rows(Some(&game_code)).await?;
            if lobby_membership(&rows, &game_code).contains(&player_name) {
                return Err(PartyError::NameTaken(player_name));
            }
        }

        let puzzles = self.party_puzzles(&game_code).await?;
        self.signaler
            .register_player(&game_code, &player_name, RoleTag::Player)
            .await?;

        tracing::info!("{} joined party {}", player_name, game_code);
        Ok(Party {
            game_code,
            player_name,
            role: RoleTag::Player,
            puzzles,
        })
    }

    /// Host only: tell every polling lobby that the game has begun
    pub async fn start_game(&self, party: &Party) -> PartyResult<()> {
        if !party.is_host() {
            return Err(PartyError::NotHost);
        }
        self.signaler.signal_game_start(&party.game_code).await?;
        Ok(())
    }

    pub fn watch_lobby(&self, party: &Party) -> PollHandle<LobbyView> {
        poll::watch_lobby(
            self.store.clone(),
            self.events.clone(),
            party.game_code.clone(),
            self.config.poll_interval,
        )
    }

    pub fn watch_results(&self, party: &Party) -> PollHandle<Vec<LeaderboardEntry>> {
        poll::watch_results(
            self.store.clone(),
            self.events.clone(),
            party.game_code.clone(),
            self.config.poll_interval,
        )
    }

    /// Start the countdown over this client's puzzles
    pub fn begin_session(&self, puzzles: Vec<Puzzle>, now: Instant) -> PartyResult<GameSession> {
        Ok(GameSession::new(puzzles, self.config.session_config(), now)?)
    }

    /// Post this player's final row. Completion and time-out both post.
    pub fn finish(&self, party: &Party, outcome: &SessionOutcome) -> JoinHandle<()> {
        self.signaler.post_final_score(
            &party.game_code,
            &party.player_name,
            outcome.points(),
            outcome.elapsed(),
        )
    }

    /// Every stored result across all parties, fetched once
    pub async fn fetch_history(&self) -> PartyResult<Vec<HistoryEntry>> {
        let rows = self.store.fetch_rows(None).await?;
        Ok(history(&rows))
    }

    /// Puzzles for a solo game; unseeded so every run differs
    pub async fn solo_puzzles(&self) -> PartyResult<Vec<Puzzle>> {
        let puzzles = self
            .puzzles
            .fetch_puzzles(self.config.puzzle_count, None)
            .await?;
        Ok(self.prepare(puzzles))
    }

    /// The solo board persisted under the configured data directory
    pub fn solo_leaderboard(&self) -> SoloLeaderboard {
        let store = FileKeyValueStore::new(self.config.data_dir.clone());
        SoloLeaderboard::load(Arc::new(store), self.events.as_ref())
    }

    /// Record a solo game on the local board. Returns the rank if it placed.
    ///
    /// Time-outs are not recorded. A failed write is logged and treated as
    /// not placing.
    pub fn finish_solo(
        &self,
        leaderboard: &mut SoloLeaderboard,
        player_name: &str,
        outcome: &SessionOutcome,
    ) -> Option<usize> {
        let SessionOutcome::Complete { elapsed, points } = *outcome else {
            return None;
        };

        let name = match player_name.trim() {
            "" => "Anonymous",
            name => name,
        };
        match leaderboard.record(name, points, elapsed) {
            Ok(rank) => rank,
            Err(e) => {
                tracing::warn!("Failed to save solo leaderboard: {}", e);
                None
            }
        }
    }

    async fn party_puzzles(&self, game_code: &str) -> PartyResult<Vec<Puzzle>> {
        let puzzles = self
            .puzzles
            .fetch_puzzles(self.config.puzzle_count, Some(seed_for_code(game_code)))
            .await?;
        if puzzles.is_empty() {
            return Err(PuzzleError::Empty.into());
        }
        Ok(self.prepare(puzzles))
    }

    /// Alternate the variants, then shuffle steps and options for this client
    fn prepare(&self, puzzles: Vec<Puzzle>) -> Vec<Puzzle> {
        let mut puzzles = interleave_by_kind(puzzles);
        shuffle_for_client(&mut puzzles, &mut rand::rng());
        puzzles
    }
}
