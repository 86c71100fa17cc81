//! Puzzle variants and the sources that produce them

mod builtin;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

pub use builtin::{builtin_puzzles, BuiltinPuzzles};

use crate::events::{ClientEvent, EventSink};

/// Result type for puzzle decoding and fetching
pub type PuzzleResult<T> = Result<T, PuzzleError>;

#[derive(Debug, thiserror::Error)]
pub enum PuzzleError {
    #[error("unknown puzzle type: {0}")]
    UnknownKind(String),

    #[error("malformed puzzle: {0}")]
    Malformed(String),

    #[error("invalid puzzle: {0}")]
    Invalid(String),

    #[error("no usable puzzles")]
    Empty,

    #[error("puzzle source failed: {0}")]
    Source(String),
}

/// Put the steps back in their original order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderingPuzzle {
    pub title: String,
    /// Canonical order
    pub steps: Vec<String>,
    /// Order presented to the player
    #[serde(default)]
    pub shuffled: Vec<String>,
}

/// Pick the one right option
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoicePuzzle {
    #[serde(alias = "clue")]
    pub question: String,
    pub options: Vec<String>,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Puzzle {
    Ordering(OrderingPuzzle),
    #[serde(rename = "visual", alias = "choice")]
    Choice(ChoicePuzzle),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PuzzleKind {
    Ordering,
    Choice,
}

impl Puzzle {
    pub fn kind(&self) -> PuzzleKind {
        match self {
            Puzzle::Ordering(_) => PuzzleKind::Ordering,
            Puzzle::Choice(_) => PuzzleKind::Choice,
        }
    }

    /// The text shown above the puzzle
    pub fn prompt(&self) -> &str {
        match self {
            Puzzle::Ordering(p) => &p.title,
            Puzzle::Choice(p) => &p.question,
        }
    }

    /// Check structure and fill in a missing presentation order
    pub fn validate(mut self) -> PuzzleResult<Self> {
        match &mut self {
            Puzzle::Ordering(p) => {
                if p.title.trim().is_empty() {
                    return Err(PuzzleError::Invalid("ordering puzzle without title".to_string()));
                }
                if p.steps.len() < 2 {
                    return Err(PuzzleError::Invalid(format!(
                        "ordering puzzle '{}' needs at least two steps",
                        p.title
                    )));
                }
                if p.shuffled.is_empty() {
                    p.shuffled = p.steps.clone();
                }
                let mut expected = p.steps.clone();
                let mut actual = p.shuffled.clone();
                expected.sort();
                actual.sort();
                if expected != actual {
                    return Err(PuzzleError::Invalid(format!(
                        "shuffled steps of '{}' are not a permutation of its steps",
                        p.title
                    )));
                }
            }
            Puzzle::Choice(p) => {
                if p.question.trim().is_empty() {
                    return Err(PuzzleError::Invalid("choice puzzle without question".to_string()));
                }
                if p.options.len() < 2 {
                    return Err(PuzzleError::Invalid(format!(
                        "choice puzzle '{}' needs at least two options",
                        p.question
                    )));
                }
                if !p.options.contains(&p.answer) {
                    return Err(PuzzleError::Invalid(format!(
                        "answer of '{}' is not among its options",
                        p.question
                    )));
                }
            }
        }
        Ok(self)
    }
}

/// Decode one puzzle object, rejecting unknown `type` tags
pub fn decode_puzzle(value: &Value) -> PuzzleResult<Puzzle> {
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| PuzzleError::Malformed("missing type tag".to_string()))?;
    if !matches!(kind, "ordering" | "visual" | "choice") {
        return Err(PuzzleError::UnknownKind(kind.to_string()));
    }

    let puzzle: Puzzle =
        serde_json::from_value(value.clone()).map_err(|e| PuzzleError::Malformed(e.to_string()))?;
    puzzle.validate()
}

/// Decode a generated puzzle list.
///
/// Accepts `{"puzzles": [...]}` or a bare array, optionally inside a markdown
/// code fence. Invalid entries are skipped; an all-invalid list is an error.
pub fn decode_puzzle_list(text: &str) -> PuzzleResult<Vec<Puzzle>> {
    let body = strip_code_fence(text);
    let parsed: Value =
        serde_json::from_str(body).map_err(|e| PuzzleError::Malformed(e.to_string()))?;

    let items = match parsed {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("puzzles") {
            Some(Value::Array(items)) => items,
            _ => return Err(PuzzleError::Malformed("missing puzzles array".to_string())),
        },
        _ => return Err(PuzzleError::Malformed("expected an object or array".to_string())),
    };

    let puzzles: Vec<Puzzle> = items
        .iter()
        .filter_map(|item| match decode_puzzle(item) {
            Ok(puzzle) => Some(puzzle),
            Err(e) => {
                tracing::warn!("Dropping generated puzzle: {}", e);
                None
            }
        })
        .collect();

    if puzzles.is_empty() {
        return Err(PuzzleError::Empty);
    }
    Ok(puzzles)
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Alternate ordering and choice puzzles, keeping each kind's relative order
pub fn interleave_by_kind(puzzles: Vec<Puzzle>) -> Vec<Puzzle> {
    let (ordering, choice): (Vec<Puzzle>, Vec<Puzzle>) = puzzles
        .into_iter()
        .partition(|p| p.kind() == PuzzleKind::Ordering);

    let mut result = Vec::with_capacity(ordering.len() + choice.len());
    let mut ordering = ordering.into_iter();
    let mut choice = choice.into_iter();
    loop {
        let a = ordering.next();
        let b = choice.next();
        if a.is_none() && b.is_none() {
            break;
        }
        result.extend(a);
        result.extend(b);
    }
    result
}

/// Randomise presentation per client. Puzzle selection is untouched.
///
/// A multi-step ordering puzzle is never presented already solved unless all
/// of its steps are identical.
pub fn shuffle_for_client<R: Rng + ?Sized>(puzzles: &mut [Puzzle], rng: &mut R) {
    for puzzle in puzzles.iter_mut() {
        match puzzle {
            Puzzle::Ordering(p) => {
                p.shuffled = p.steps.clone();
                p.shuffled.shuffle(rng);
                if p.shuffled == p.steps {
                    p.shuffled.rotate_left(1);
                }
            }
            Puzzle::Choice(p) => p.options.shuffle(rng),
        }
    }
}

/// Anything that can hand out a session's puzzles
#[async_trait]
pub trait PuzzleSource: Send + Sync {
    /// Up to `count` puzzles. The same seed selects the same puzzles.
    async fn fetch_puzzles(&self, count: usize, seed: Option<u64>) -> PuzzleResult<Vec<Puzzle>>;
}

/// Falls back to the built-in set whenever the inner source fails or comes back empty
pub struct WithFallback<S> {
    inner: S,
    builtin: BuiltinPuzzles,
    events: Arc<dyn EventSink>,
}

impl<S: PuzzleSource> WithFallback<S> {
    pub fn new(inner: S, events: Arc<dyn EventSink>) -> Self {
        Self {
            inner,
            builtin: BuiltinPuzzles,
            events,
        }
    }
}

#[async_trait]
impl<S: PuzzleSource> PuzzleSource for WithFallback<S> {
    async fn fetch_puzzles(&self, count: usize, seed: Option<u64>) -> PuzzleResult<Vec<Puzzle>> {
        let reason = match self.inner.fetch_puzzles(count, seed).await {
            Ok(puzzles) if !puzzles.is_empty() => {
                return Ok(puzzles.into_iter().take(count).collect())
            }
            Ok(_) => "source returned no puzzles".to_string(),
            Err(e) => e.to_string(),
        };

        self.events.record(ClientEvent::PuzzleFallback { reason });
        self.builtin.fetch_puzzles(count, seed).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingEvents;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;

    fn ordering(title: &str, steps: &[&str]) -> Puzzle {
        Puzzle::Ordering(OrderingPuzzle {
            title: title.to_string(),
            steps: steps.iter().map(|s| s.to_string()).collect(),
            shuffled: Vec::new(),
        })
    }

    fn choice(question: &str) -> Puzzle {
        Puzzle::Choice(ChoicePuzzle {
            question: question.to_string(),
            options: vec!["a".to_string(), "b".to_string()],
            answer: "a".to_string(),
        })
    }

    #[test]
    fn test_decode_both_variants() {
        let o = decode_puzzle(&json!({
            "type": "ordering",
            "title": "Make tea",
            "steps": ["boil", "steep", "pour"]
        }))
        .unwrap();
        assert_eq!(o.kind(), PuzzleKind::Ordering);
        if let Puzzle::Ordering(p) = o {
            assert_eq!(p.shuffled, p.steps);
        }

        let c = decode_puzzle(&json!({
            "type": "visual",
            "clue": "Which is hot?",
            "options": ["sun", "snow"],
            "answer": "sun"
        }))
        .unwrap();
        assert_eq!(c.prompt(), "Which is hot?");
    }

    #[test]
    fn test_unknown_tag_is_rejected() {
        let err = decode_puzzle(&json!({"type": "riddle", "clue": "?"})).unwrap_err();
        assert!(matches!(err, PuzzleError::UnknownKind(ref k) if k == "riddle"));

        let err = decode_puzzle(&json!({"clue": "?"})).unwrap_err();
        assert!(matches!(err, PuzzleError::Malformed(_)));
    }

    #[test]
    fn test_structural_validation() {
        let err = decode_puzzle(&json!({
            "type": "choice", "question": "q", "options": ["a", "b"], "answer": "c"
        }))
        .unwrap_err();
        assert!(matches!(err, PuzzleError::Invalid(_)));

        let err = decode_puzzle(&json!({
            "type": "ordering", "title": "t", "steps": ["a", "b"], "shuffled": ["a", "c"]
        }))
        .unwrap_err();
        assert!(matches!(err, PuzzleError::Invalid(_)));
    }

    #[test]
    fn test_decode_list_skips_bad_entries_and_fences() {
        let text = r#"```json
{"puzzles": [
  {"type": "ordering", "title": "Count", "steps": ["1", "2", "3"]},
  {"type": "mystery"},
  {"type": "visual", "question": "q", "options": ["x", "y"], "answer": "y"}
]}
```"#;
        let puzzles = decode_puzzle_list(text).unwrap();
        assert_eq!(puzzles.len(), 2);

        assert!(matches!(decode_puzzle_list("[]"), Err(PuzzleError::Empty)));
        assert!(matches!(decode_puzzle_list("not json"), Err(PuzzleError::Malformed(_))));
    }

    #[test]
    fn test_interleave() {
        let puzzles = vec![
            choice("c1"),
            choice("c2"),
            choice("c3"),
            ordering("o1", &["a", "b"]),
        ];
        let prompts: Vec<String> = interleave_by_kind(puzzles)
            .iter()
            .map(|p| p.prompt().to_string())
            .collect();
        assert_eq!(prompts, vec!["o1", "c1", "c2", "c3"]);
    }

    #[test]
    fn test_shuffle_never_presents_solved_ordering() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let mut puzzles = vec![ordering("o", &["a", "b"]), choice("c")];
            shuffle_for_client(&mut puzzles, &mut rng);
            if let Puzzle::Ordering(p) = &puzzles[0] {
                assert_ne!(p.shuffled, p.steps);
            }
            if let Puzzle::Choice(p) = &puzzles[1] {
                assert!(p.options.contains(&p.answer));
            }
        }
    }

    struct Broken;

    #[async_trait]
    impl PuzzleSource for Broken {
        async fn fetch_puzzles(
            &self,
            _count: usize,
            _seed: Option<u64>,
        ) -> PuzzleResult<Vec<Puzzle>> {
            Err(PuzzleError::Source("offline".to_string()))
        }
    }

    #[tokio::test]
    async fn test_fallback_on_failure_keeps_variant_shapes() {
        let events = Arc::new(RecordingEvents::new());
        let source = WithFallback::new(Broken, events.clone());

        let puzzles = source.fetch_puzzles(6, Some(4821)).await.unwrap();
        assert_eq!(puzzles.len(), 6);
        assert!(puzzles.iter().all(|p| p.clone().validate().is_ok()));
        assert!(matches!(
            events.events()[0],
            ClientEvent::PuzzleFallback { .. }
        ));
    }
}
