//! Per-client game session: the global countdown and the puzzle attempts
//!
//! The session is a plain state machine driven by explicit instants, so every
//! transition can be tested without real timers. [`spawn_countdown`] drives it
//! on a short interval for display and fires the terminal outcome once.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tokio::time::Instant;

use crate::poll::{spawn_poller, PollHandle};
use crate::puzzle::{Puzzle, PuzzleError, PuzzleResult};
use crate::score::ElapsedTime;

pub const DEFAULT_SESSION_BUDGET: Duration = Duration::from_secs(120);
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);
pub const WRONG_ORDER_FLASH: Duration = Duration::from_millis(500);
pub const CHOICE_FEEDBACK_DELAY: Duration = Duration::from_millis(1000);
pub const DEFAULT_POINTS_PER_PUZZLE: i64 = 10;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub budget: Duration,
    pub points_per_puzzle: i64,
    pub wrong_order_flash: Duration,
    pub choice_feedback_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            budget: DEFAULT_SESSION_BUDGET,
            points_per_puzzle: DEFAULT_POINTS_PER_PUZZLE,
            wrong_order_flash: WRONG_ORDER_FLASH,
            choice_feedback_delay: CHOICE_FEEDBACK_DELAY,
        }
    }
}

/// State of the attempt at the current puzzle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    Unanswered,
    /// Correct choice on display; the session advances at `until`
    LockedCorrect { until: Instant },
    /// Wrong choice on display; the selection clears at `until`
    LockedIncorrect { until: Instant },
    /// Wrong order flagged; clears at `until`, input stays open
    WrongOrder { until: Instant },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    Complete { elapsed: Duration, points: i64 },
    TimedOut { points: i64 },
}

impl SessionOutcome {
    pub fn points(&self) -> i64 {
        match self {
            SessionOutcome::Complete { points, .. } | SessionOutcome::TimedOut { points } => {
                *points
            }
        }
    }

    /// What gets written to the store for this outcome
    pub fn elapsed(&self) -> ElapsedTime {
        match self {
            SessionOutcome::Complete { elapsed, .. } => {
                ElapsedTime::Finished(elapsed.as_millis() as u64)
            }
            SessionOutcome::TimedOut { .. } => ElapsedTime::Unfinished,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Playing,
    Finished(SessionOutcome),
}

/// Result of one piece of player input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feedback {
    Correct,
    Incorrect,
    /// Input arrived when it cannot be accepted (locked, wrong variant, session over)
    Ignored,
}

/// What a display needs each tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub index: usize,
    pub total: usize,
    pub remaining: Duration,
    pub points: i64,
    pub attempt: AttemptState,
    pub status: SessionStatus,
}

pub struct GameSession {
    puzzles: Vec<Puzzle>,
    index: usize,
    /// Current arrangement of the ordering puzzle on screen
    order: Vec<String>,
    started_at: Instant,
    config: SessionConfig,
    attempt: AttemptState,
    points: i64,
    status: SessionStatus,
    outcome_taken: bool,
}

impl GameSession {
    pub fn new(puzzles: Vec<Puzzle>, config: SessionConfig, now: Instant) -> PuzzleResult<Self> {
        if puzzles.is_empty() {
            return Err(PuzzleError::Empty);
        }

        let mut session = Self {
            puzzles,
            index: 0,
            order: Vec::new(),
            started_at: now,
            config,
            attempt: AttemptState::Unanswered,
            points: 0,
            status: SessionStatus::Playing,
            outcome_taken: false,
        };
        session.load_order();
        Ok(session)
    }

    pub fn current(&self) -> Option<&Puzzle> {
        match self.status {
            SessionStatus::Playing => self.puzzles.get(self.index),
            SessionStatus::Finished(_) => None,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn total(&self) -> usize {
        self.puzzles.len()
    }

    pub fn points(&self) -> i64 {
        self.points
    }

    pub fn attempt(&self) -> AttemptState {
        self.attempt
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_over(&self) -> bool {
        matches!(self.status, SessionStatus::Finished(_))
    }

    /// Current arrangement of the ordering puzzle, if one is showing
    pub fn current_order(&self) -> Option<&[String]> {
        match self.current() {
            Some(Puzzle::Ordering(_)) => Some(self.order.as_slice()),
            _ => None,
        }
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        self.deadline().saturating_duration_since(now)
    }

    pub fn snapshot(&self, now: Instant) -> SessionSnapshot {
        SessionSnapshot {
            index: self.index,
            total: self.puzzles.len(),
            remaining: self.remaining(now),
            points: self.points,
            attempt: self.attempt,
            status: self.status,
        }
    }

    /// Apply every transition due by `now` and hand out the outcome once
    pub fn tick(&mut self, now: Instant) -> Option<SessionOutcome> {
        self.advance_to(now);
        self.take_outcome()
    }

    /// The terminal outcome, the first time it is asked for after it happened
    pub fn take_outcome(&mut self) -> Option<SessionOutcome> {
        match self.status {
            SessionStatus::Finished(outcome) if !self.outcome_taken => {
                self.outcome_taken = true;
                Some(outcome)
            }
            _ => None,
        }
    }

    /// Move one step of the current ordering puzzle. False if the move was not applied.
    pub fn move_step(&mut self, from: usize, to: usize, now: Instant) -> bool {
        self.advance_to(now);
        if self.is_over() || !matches!(self.current(), Some(Puzzle::Ordering(_))) {
            return false;
        }
        if from >= self.order.len() || to >= self.order.len() {
            return false;
        }

        let step = self.order.remove(from);
        self.order.insert(to, step);
        true
    }

    /// Compare the current arrangement against the canonical order
    pub fn submit_order(&mut self, now: Instant) -> Feedback {
        self.advance_to(now);
        let correct = match self.current() {
            Some(Puzzle::Ordering(p)) if !self.is_over() => p.steps == self.order,
            _ => return Feedback::Ignored,
        };

        if correct {
            self.solve_current(now);
            Feedback::Correct
        } else {
            self.attempt = AttemptState::WrongOrder {
                until: now + self.config.wrong_order_flash,
            };
            Feedback::Incorrect
        }
    }

    /// Pick an option of the current choice puzzle
    pub fn choose(&mut self, option: &str, now: Instant) -> Feedback {
        self.advance_to(now);
        if self.is_over() {
            return Feedback::Ignored;
        }
        let correct = match (self.current(), self.attempt) {
            (Some(Puzzle::Choice(p)), AttemptState::Unanswered) => p.answer == option,
            _ => return Feedback::Ignored,
        };

        let until = now + self.config.choice_feedback_delay;
        if correct {
            self.attempt = AttemptState::LockedCorrect { until };
            Feedback::Correct
        } else {
            self.attempt = AttemptState::LockedIncorrect { until };
            Feedback::Incorrect
        }
    }

    fn deadline(&self) -> Instant {
        self.started_at + self.config.budget
    }

    /// Resolve a pending attempt that fell due before the deadline, then check
    /// the deadline itself. Whichever happened first wins.
    fn advance_to(&mut self, now: Instant) {
        if self.is_over() {
            return;
        }

        let deadline = self.deadline();
        match self.attempt {
            AttemptState::LockedCorrect { until } if until <= now && until < deadline => {
                self.solve_current(until);
            }
            AttemptState::LockedIncorrect { until } | AttemptState::WrongOrder { until }
                if until <= now =>
            {
                self.attempt = AttemptState::Unanswered;
            }
            _ => {}
        }

        if !self.is_over() && now >= deadline {
            self.attempt = AttemptState::Unanswered;
            self.status = SessionStatus::Finished(SessionOutcome::TimedOut {
                points: self.points,
            });
            tracing::info!(
                "Session timed out at puzzle {}/{} with {} points",
                self.index + 1,
                self.puzzles.len(),
                self.points
            );
        }
    }

    fn solve_current(&mut self, at: Instant) {
        self.points += self.config.points_per_puzzle;
        self.attempt = AttemptState::Unanswered;

        if self.index + 1 < self.puzzles.len() {
            self.index += 1;
            self.load_order();
        } else {
            let elapsed = at.duration_since(self.started_at);
            self.status = SessionStatus::Finished(SessionOutcome::Complete {
                elapsed,
                points: self.points,
            });
            tracing::info!(
                "Session complete in {:?} with {} points",
                elapsed,
                self.points
            );
        }
    }

    fn load_order(&mut self) {
        self.order = match self.puzzles.get(self.index) {
            Some(Puzzle::Ordering(p)) => p.shuffled.clone(),
            _ => Vec::new(),
        };
    }
}

/// Drive a shared session on `period`, publishing snapshots.
///
/// The receiver resolves exactly once with the terminal outcome. Dropping or
/// stopping the handle stops the ticking.
pub fn spawn_countdown(
    session: Arc<Mutex<GameSession>>,
    period: Duration,
) -> (PollHandle<SessionSnapshot>, oneshot::Receiver<SessionOutcome>) {
    let (outcome_tx, outcome_rx) = oneshot::channel();
    let outcome_tx = Arc::new(StdMutex::new(Some(outcome_tx)));

    let handle = spawn_poller(period, move || {
        let session = session.clone();
        let outcome_tx = outcome_tx.clone();
        async move {
            let mut session = session.lock().await;
            let now = Instant::now();
            if let Some(outcome) = session.tick(now) {
                let sender = outcome_tx.lock().ok().and_then(|mut tx| tx.take());
                if let Some(sender) = sender {
                    let _ = sender.send(outcome);
                }
            }
            Some(session.snapshot(now))
        }
    });

    (handle, outcome_rx)
}
