//! Interval polling tied to the lifetime of the view that consumes it
//!
//! A [`PollHandle`] owns its background task. Dropping the handle aborts the
//! task; [`PollHandle::stop`] additionally waits until it is gone, after which
//! no further store reads are issued.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::events::{ClientEvent, EventSink};
use crate::reconcile::{lobby_membership, ranked_scores, LeaderboardEntry, LobbyView};
use crate::store::RemoteStore;

/// Observed cadence of the lobby and results screens
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Latest view produced by a running poller
pub struct PollHandle<T> {
    rx: watch::Receiver<Option<T>>,
    task: JoinHandle<()>,
}

impl<T: Clone> PollHandle<T> {
    /// Most recent successful view, `None` until the first poll lands
    pub fn latest(&self) -> Option<T> {
        self.rx.borrow().clone()
    }

    /// Wait for the next published view
    pub async fn changed(&mut self) -> Option<T> {
        self.rx.changed().await.ok()?;
        self.rx.borrow_and_update().clone()
    }

    /// Wait until a published view satisfies `pred`
    pub async fn wait_for(&mut self, pred: impl Fn(&T) -> bool) -> Option<T> {
        let view = self
            .rx
            .wait_for(|view| view.as_ref().is_some_and(&pred))
            .await
            .ok()?;
        view.clone()
    }

    /// Stop polling and wait for the task to finish
    pub async fn stop(mut self) {
        self.task.abort();
        let _ = (&mut self.task).await;
    }
}

impl<T> Drop for PollHandle<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Run `poll_once` immediately and then every `period`.
///
/// `None` results (failed ticks) are not published; the previous view stays.
pub fn spawn_poller<T, F, Fut>(period: Duration, mut poll_once: F) -> PollHandle<T>
where
    T: Send + Sync + 'static,
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Option<T>> + Send + 'static,
{
    let (tx, rx) = watch::channel(None);

    let task = tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            if let Some(view) = poll_once().await {
                if tx.send(Some(view)).is_err() {
                    break;
                }
            }
        }
    });

    PollHandle { rx, task }
}

/// Poll lobby membership for a party
pub fn watch_lobby(
    store: Arc<dyn RemoteStore>,
    events: Arc<dyn EventSink>,
    game_code: String,
    period: Duration,
) -> PollHandle<LobbyView> {
    spawn_poller(period, move || {
        let store = store.clone();
        let events = events.clone();
        let game_code = game_code.clone();
        async move {
            match store.fetch_rows(Some(&game_code)).await {
                Ok(rows) => Some(lobby_membership(&rows, &game_code)),
                Err(e) => {
                    events.record(ClientEvent::PollFailed {
                        view: "lobby",
                        game_code,
                        error: e.to_string(),
                    });
                    None
                }
            }
        }
    })
}

/// Poll the ranked party leaderboard
pub fn watch_results(
    store: Arc<dyn RemoteStore>,
    events: Arc<dyn EventSink>,
    game_code: String,
    period: Duration,
) -> PollHandle<Vec<LeaderboardEntry>> {
    spawn_poller(period, move || {
        let store = store.clone();
        let events = events.clone();
        let game_code = game_code.clone();
        async move {
            match store.fetch_rows(Some(&game_code)).await {
                Ok(rows) => Some(ranked_scores(&rows, &game_code)),
                Err(e) => {
                    events.record(ClientEvent::PollFailed {
                        view: "results",
                        game_code,
                        error: e.to_string(),
                    });
                    None
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingEvents;
    use crate::store::MemoryStore;
    use crate::score::ElapsedTime;
    use crate::types::{RoleTag, RowWrite};
    use serde_json::json;

    fn setup() -> (Arc<MemoryStore>, Arc<RecordingEvents>) {
        (Arc::new(MemoryStore::new()), Arc::new(RecordingEvents::new()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_immediately_then_on_interval() {
        let (store, events) = setup();
        let handle = watch_lobby(store.clone(), events, "1".to_string(), DEFAULT_POLL_INTERVAL);

        tokio::time::sleep(Duration::from_millis(7_000)).await;
        assert_eq!(store.read_count(), 3);
        assert_eq!(handle.latest(), Some(LobbyView::default()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_reads_after_stop() {
        let (store, events) = setup();
        let handle = watch_results(store.clone(), events, "1".to_string(), DEFAULT_POLL_INTERVAL);

        tokio::time::sleep(Duration::from_millis(4_000)).await;
        handle.stop().await;
        let reads = store.read_count();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(store.read_count(), reads);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_polling() {
        let (store, events) = setup();
        let handle = watch_lobby(store.clone(), events, "1".to_string(), DEFAULT_POLL_INTERVAL);

        tokio::time::sleep(Duration::from_millis(100)).await;
        drop(handle);
        tokio::time::sleep(Duration::from_millis(1)).await;
        let reads = store.read_count();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(store.read_count(), reads);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_tick_keeps_previous_view() {
        let (store, events) = setup();
        store
            .append(&RowWrite::registration("1", "Hana", &RoleTag::Host))
            .await
            .unwrap();

        let mut handle =
            watch_lobby(store.clone(), events.clone(), "1".to_string(), DEFAULT_POLL_INTERVAL);
        let first = handle.changed().await.unwrap();
        assert_eq!(first.players, vec!["Hana"]);

        store.set_unavailable(true);
        tokio::time::sleep(Duration::from_millis(3_500)).await;

        assert_eq!(handle.latest().unwrap().players, vec!["Hana"]);
        assert!(events
            .events()
            .iter()
            .any(|e| matches!(e, ClientEvent::PollFailed { view: "lobby", .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_game_start() {
        let (store, events) = setup();
        let mut handle =
            watch_lobby(store.clone(), events, "1".to_string(), DEFAULT_POLL_INTERVAL);

        store.append(&RowWrite::game_start("1")).await.unwrap();
        let view = handle.wait_for(|v| v.started).await.unwrap();
        assert!(view.started);
        assert!(view.players.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_score_in_other_game_keeps_polling() {
        let (store, events) = setup();
        store
            .append_raw(json!({
                "gaming": "9",
                "player_name": "Mallory",
                "score": "100000000000000000:00",
                "points": 10
            }))
            .await;
        store
            .append_raw(json!({
                "gaming": "1",
                "player_name": "Hana",
                "score": "01:10",
                "points": 30
            }))
            .await;

        let mut handle =
            watch_results(store.clone(), events, "1".to_string(), DEFAULT_POLL_INTERVAL);
        let first = handle.changed().await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].name, "Hana");
        assert_eq!(first[0].elapsed, ElapsedTime::Finished(70_000));

        store
            .append(&RowWrite::registration("1", "Sara", &RoleTag::Player))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10_000)).await;

        assert_eq!(store.read_count(), 4);
        assert_eq!(handle.latest().unwrap().len(), 2);
    }
}
