use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, warn};

use super::question::Question;
use crate::error::StoreError;
use crate::store::TriviaStore;

/// Split a session of `total` questions into (direct, scrambled) counts.
///
/// Direct questions take 70% and scrambled words 30%, each rounded half up.
/// The scrambled share is capped so the two never exceed `total`, which
/// leaves rounding ties with the direct bucket.
pub fn split_counts(total: usize) -> (usize, usize) {
    let direct = (total * 7 + 5) / 10;
    let scrambled = ((total * 3 + 5) / 10).min(total - direct);
    (direct, scrambled)
}

/// Draws the questions for one session from the durable question bank
pub struct QuestionSource<'a> {
    store: &'a TriviaStore,
}

impl<'a> QuestionSource<'a> {
    pub fn new(store: &'a TriviaStore) -> Self {
        Self { store }
    }

    /// Draw up to `total` questions in random order. Fewer are returned only
    /// when the bank runs short.
    pub async fn draw(&self, total: usize) -> Result<Vec<Question>, StoreError> {
        let (direct, scrambled) = split_counts(total);

        let rows = self.store.random_questions(direct).await?;
        let words = self.store.random_words(scrambled).await?;

        if rows.len() + words.len() < total {
            warn!(
                "Question bank is short: wanted {} questions, found {} direct and {} scrambled",
                total,
                rows.len(),
                words.len()
            );
        }

        let questions = assemble(rows, words, &mut rand::thread_rng());
        debug!("Drew {} questions", questions.len());
        Ok(questions)
    }
}

fn assemble<R: Rng + ?Sized>(
    rows: Vec<(String, String)>,
    words: Vec<String>,
    rng: &mut R,
) -> Vec<Question> {
    let mut questions: Vec<Question> = rows
        .into_iter()
        .map(|(prompt, answer)| Question::new_with(prompt, answer, rng))
        .collect();

    for word in words {
        let word = word.to_lowercase();
        let prompt = format!("Unscramble this word: {}", scramble(&word, rng));
        questions.push(Question::new_with(prompt, word, rng));
    }

    questions.shuffle(rng);
    questions
}

/// Shuffle the letters of `word` and separate them with single spaces
fn scramble<R: Rng + ?Sized>(word: &str, rng: &mut R) -> String {
    let mut letters: Vec<char> = word.chars().collect();
    letters.shuffle(rng);

    letters
        .iter()
        .map(char::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}
