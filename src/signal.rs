//! Registration and signaling writes
//!
//! Every write is an append. Joining, hosting and starting a game each add one
//! row; a finished run adds another row for the same name, which readers fold
//! together at read time.

use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::events::{ClientEvent, EventSink};
use crate::score::ElapsedTime;
use crate::store::{RemoteStore, StoreResult};
use crate::types::{RoleTag, RowWrite};

#[derive(Clone)]
pub struct Signaler {
    store: Arc<dyn RemoteStore>,
    events: Arc<dyn EventSink>,
}

impl Signaler {
    pub fn new(store: Arc<dyn RemoteStore>, events: Arc<dyn EventSink>) -> Self {
        Self { store, events }
    }

    /// Append a registration row (unfinished score, zero points).
    ///
    /// Names are not checked against existing rows here; duplicates are left
    /// for the readers to fold.
    pub async fn register_player(
        &self,
        game_code: &str,
        player_name: &str,
        role: RoleTag,
    ) -> StoreResult<()> {
        let row = RowWrite::registration(game_code, player_name, &role);
        self.store.append(&row).await?;
        tracing::info!(
            "Registered {} as {:?} in game {}",
            player_name,
            role,
            game_code
        );
        Ok(())
    }

    pub async fn register_host(&self, game_code: &str, host_name: &str) -> StoreResult<()> {
        self.register_player(game_code, host_name, RoleTag::Host).await
    }

    /// Append the game-start marker row for this party
    pub async fn signal_game_start(&self, game_code: &str) -> StoreResult<()> {
        self.store.append(&RowWrite::game_start(game_code)).await?;
        tracing::info!("Signaled game start for {}", game_code);
        Ok(())
    }

    /// Post a final result without waiting for it.
    ///
    /// A failed post is reported to the event sink and not retried. The handle
    /// is only for callers that want to know when the attempt is over.
    pub fn post_final_score(
        &self,
        game_code: &str,
        player_name: &str,
        points: i64,
        elapsed: ElapsedTime,
    ) -> JoinHandle<()> {
        let row = RowWrite::final_score(game_code, player_name, points, elapsed);
        let store = self.store.clone();
        let events = self.events.clone();

        tokio::spawn(async move {
            match store.append(&row).await {
                Ok(()) => tracing::info!(
                    "Posted final score for {} in game {}: {} pts, {}",
                    row.player_name,
                    row.game_code,
                    row.points,
                    elapsed
                ),
                Err(e) => events.record(ClientEvent::WriteFailed {
                    operation: "final score",
                    game_code: row.game_code.clone(),
                    error: e.to_string(),
                }),
            }
        })
    }
}
