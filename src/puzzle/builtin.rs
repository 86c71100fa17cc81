use super::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Source that always succeeds with puzzles compiled into the binary
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinPuzzles;

#[async_trait]
impl PuzzleSource for BuiltinPuzzles {
    async fn fetch_puzzles(&self, count: usize, seed: Option<u64>) -> PuzzleResult<Vec<Puzzle>> {
        let mut puzzles = builtin_puzzles();
        match seed {
            Some(seed) => puzzles.shuffle(&mut StdRng::seed_from_u64(seed)),
            None => puzzles.shuffle(&mut rand::rng()),
        }
        puzzles.truncate(count);
        Ok(puzzles)
    }
}

fn ordering(title: &str, steps: &[&str]) -> Puzzle {
    let steps: Vec<String> = steps.iter().map(|s| s.to_string()).collect();
    Puzzle::Ordering(OrderingPuzzle {
        title: title.to_string(),
        shuffled: steps.clone(),
        steps,
    })
}

fn choice(question: &str, options: &[&str], answer: &str) -> Puzzle {
    Puzzle::Choice(ChoicePuzzle {
        question: question.to_string(),
        options: options.iter().map(|s| s.to_string()).collect(),
        answer: answer.to_string(),
    })
}

/// The full built-in set, in canonical order
pub fn builtin_puzzles() -> Vec<Puzzle> {
    vec![
        ordering(
            "Plant a tree",
            &["Dig a hole", "Place the sapling", "Fill with soil", "Water it"],
        ),
        choice(
            "Which one gives light during the day?",
            &["sun", "moon", "star", "cloud"],
            "sun",
        ),
        ordering(
            "Send a letter",
            &["Write the letter", "Seal the envelope", "Add a stamp", "Post it"],
        ),
        choice(
            "What do you use to unlock a door?",
            &["key", "pen", "cup", "book"],
            "key",
        ),
        ordering(
            "Make tea",
            &["Boil water", "Put the tea in a cup", "Pour the water", "Let it steep"],
        ),
        choice(
            "Which one keeps you dry in the rain?",
            &["umbrella", "fan", "lamp", "clock"],
            "umbrella",
        ),
        ordering(
            "A day's journey of the sun",
            &["Sunrise", "Noon", "Sunset", "Night"],
        ),
        choice(
            "I have hands but cannot clap. What am I?",
            &["clock", "chair", "glove", "tree"],
            "clock",
        ),
        ordering(
            "Growing up",
            &["Baby", "Child", "Teenager", "Adult"],
        ),
        choice(
            "What has keys but opens no locks?",
            &["piano", "door", "safe", "car"],
            "piano",
        ),
        ordering(
            "Bake bread",
            &["Mix the dough", "Let it rise", "Shape the loaf", "Bake it"],
        ),
        choice(
            "Which one do you read?",
            &["book", "spoon", "shoe", "ball"],
            "book",
        ),
        ordering(
            "Solve a problem",
            &["Understand it", "Make a plan", "Carry it out", "Check the result"],
        ),
        choice(
            "What gets wetter the more it dries?",
            &["towel", "sponge", "river", "cloud"],
            "towel",
        ),
        ordering(
            "Catch a train",
            &["Buy a ticket", "Go to the platform", "Board the train", "Find a seat"],
        ),
        choice(
            "Which one points north?",
            &["compass", "map", "ruler", "watch"],
            "compass",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_set_is_valid() {
        let puzzles = builtin_puzzles();
        assert!(puzzles.len() >= 15);
        for puzzle in puzzles {
            assert!(puzzle.validate().is_ok());
        }
    }

    #[tokio::test]
    async fn test_same_seed_same_selection() {
        let a = BuiltinPuzzles.fetch_puzzles(5, Some(4821)).await.unwrap();
        let b = BuiltinPuzzles.fetch_puzzles(5, Some(4821)).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 5);
    }

    #[tokio::test]
    async fn test_count_larger_than_set() {
        let all = BuiltinPuzzles.fetch_puzzles(100, None).await.unwrap();
        assert_eq!(all.len(), builtin_puzzles().len());
    }
}
