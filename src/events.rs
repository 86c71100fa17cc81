//! Observation port for failures that never reach the user
//!
//! Fire-and-forget writes and background poll ticks swallow their errors.
//! They still report them here so the failures stay observable.

use std::sync::Mutex;

/// Something worth knowing about that did not interrupt the game
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// A non-blocking write to the store failed and will not be retried
    WriteFailed {
        operation: &'static str,
        game_code: String,
        error: String,
    },
    /// A background poll tick failed; the previous view is kept
    PollFailed {
        view: &'static str,
        game_code: String,
        error: String,
    },
    /// The puzzle source failed and the built-in set was used
    PuzzleFallback { reason: String },
    /// Persisted solo leaderboard was unreadable and was reset
    LeaderboardReset { reason: String },
}

pub trait EventSink: Send + Sync {
    fn record(&self, event: ClientEvent);
}

/// Default sink: forwards every event to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEvents;

impl EventSink for TracingEvents {
    fn record(&self, event: ClientEvent) {
        match event {
            ClientEvent::WriteFailed {
                operation,
                game_code,
                error,
            } => tracing::error!(
                "Store write {} for game {} failed: {}",
                operation,
                game_code,
                error
            ),
            ClientEvent::PollFailed {
                view,
                game_code,
                error,
            } => tracing::warn!("Poll of {} for game {} failed: {}", view, game_code, error),
            ClientEvent::PuzzleFallback { reason } => {
                tracing::warn!("Using built-in puzzles: {}", reason)
            }
            ClientEvent::LeaderboardReset { reason } => {
                tracing::warn!("Solo leaderboard reset: {}", reason)
            }
        }
    }
}

/// Keeps every event in memory; handy for assertions
#[derive(Debug, Default)]
pub struct RecordingEvents {
    events: Mutex<Vec<ClientEvent>>,
}

impl RecordingEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ClientEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn write_failures(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, ClientEvent::WriteFailed { .. }))
            .count()
    }
}

impl EventSink for RecordingEvents {
    fn record(&self, event: ClientEvent) {
        TracingEvents.record(event.clone());
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
