use rand::Rng;

use super::hints::{Difficulty, Hints};

/// A prompt with its answer and precomputed hints.
///
/// Everything but the completion flag is fixed at construction. The flag
/// moves from open to completed exactly once.
#[derive(Debug, Clone)]
pub struct Question {
    prompt: String,
    answer: String,
    hints: Hints,
    completed: bool,
}

impl Question {
    pub fn new(prompt: impl Into<String>, answer: impl Into<String>) -> Self {
        Self::new_with(prompt, answer, &mut rand::thread_rng())
    }

    pub fn new_with<R: Rng + ?Sized>(
        prompt: impl Into<String>,
        answer: impl Into<String>,
        rng: &mut R,
    ) -> Self {
        let answer = answer.into();
        let hints = Hints::generate_with(&answer, rng);

        Self {
            prompt: prompt.into(),
            answer,
            hints,
            completed: false,
        }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn answer(&self) -> &str {
        &self.answer
    }

    pub fn hint(&self, difficulty: Difficulty) -> &str {
        self.hints.get(difficulty)
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Mark the question completed. Returns `true` only for the call that
    /// actually completed it.
    pub fn complete(&mut self) -> bool {
        !std::mem::replace(&mut self.completed, true)
    }

    /// Case-insensitive exact comparison against the answer
    pub fn is_correct(&self, guess: &str) -> bool {
        fold_case(guess) == fold_case(&self.answer)
    }
}

/// Full case folding on top of lowercasing: `ß` folds to `ss` and final sigma to `σ`
fn fold_case(text: &str) -> String {
    text.to_lowercase().replace('ß', "ss").replace('ς', "σ")
}
