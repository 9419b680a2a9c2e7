use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;

/// Character shown in place of a hidden answer character
pub const MASK_CHAR: char = '-';

/// Each hint level hides this share (in tenths) of the previous level's hidden positions
const MASK_TENTHS: usize = 7;

/// Hint levels, ordered from least to most revealing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Difficulty {
    Hard,
    Medium,
    Easy,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Hard, Difficulty::Medium, Difficulty::Easy];

    /// The next easier level, if any
    pub fn easier(self) -> Option<Difficulty> {
        match self {
            Difficulty::Hard => Some(Difficulty::Medium),
            Difficulty::Medium => Some(Difficulty::Easy),
            Difficulty::Easy => None,
        }
    }
}

/// The three masked variants of an answer, computed once per question
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hints {
    hard: String,
    medium: String,
    easy: String,
}

impl Hints {
    /// Generate hints for `answer` using the thread-local RNG
    pub fn generate(answer: &str) -> Self {
        Self::generate_with(answer, &mut rand::thread_rng())
    }

    pub fn generate_with<R: Rng + ?Sized>(answer: &str, rng: &mut R) -> Self {
        let [hard, medium, easy] = masked_positions(answer, rng);

        Self {
            hard: render(answer, &hard),
            medium: render(answer, &medium),
            easy: render(answer, &easy),
        }
    }

    pub fn get(&self, difficulty: Difficulty) -> &str {
        match difficulty {
            Difficulty::Hard => &self.hard,
            Difficulty::Medium => &self.medium,
            Difficulty::Easy => &self.easy,
        }
    }
}

/// Pick the hidden character positions for each level.
///
/// Positions are character indices, not byte offsets. Each level samples
/// without replacement from the level before it, so Easy ⊆ Medium ⊆ Hard.
fn masked_positions<R: Rng + ?Sized>(answer: &str, rng: &mut R) -> [HashSet<usize>; 3] {
    let visible: Vec<usize> = answer
        .chars()
        .enumerate()
        .filter(|(_, c)| !c.is_whitespace())
        .map(|(i, _)| i)
        .collect();

    let hard = sample_share(&visible, rng);
    let medium = sample_share(&hard, rng);
    let easy = sample_share(&medium, rng);

    [
        hard.into_iter().collect(),
        medium.into_iter().collect(),
        easy.into_iter().collect(),
    ]
}

fn sample_share<R: Rng + ?Sized>(positions: &[usize], rng: &mut R) -> Vec<usize> {
    let amount = positions.len() * MASK_TENTHS / 10;
    positions.choose_multiple(rng, amount).copied().collect()
}

fn render(answer: &str, masked: &HashSet<usize>) -> String {
    answer
        .chars()
        .enumerate()
        .map(|(i, c)| if masked.contains(&i) { MASK_CHAR } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const ANSWERS: &[&str] = &[
        "Helsinki",
        "The Great Gatsby",
        "  spaced   out  ",
        "Ääkkönen ja öljy",
        "4",
        "ab",
        "",
    ];

    #[test]
    fn test_levels_are_nested() {
        let mut rng = StdRng::seed_from_u64(7);

        for answer in ANSWERS {
            for _ in 0..20 {
                let [hard, medium, easy] = masked_positions(answer, &mut rng);

                assert!(hard.len() >= medium.len());
                assert!(medium.len() >= easy.len());
                assert!(easy.is_subset(&medium), "easy not within medium for {answer:?}");
                assert!(medium.is_subset(&hard), "medium not within hard for {answer:?}");
            }
        }
    }

    #[test]
    fn test_mask_sizes_use_floor() {
        let mut rng = StdRng::seed_from_u64(1);

        // 10 visible characters: 7, then 4 (floor 4.9), then 2 (floor 2.8)
        let [hard, medium, easy] = masked_positions("abcde fghij", &mut rng);
        assert_eq!(hard.len(), 7);
        assert_eq!(medium.len(), 4);
        assert_eq!(easy.len(), 2);

        // A single character is never masked, so all levels show the answer
        let hints = Hints::generate_with("4", &mut rng);
        for difficulty in Difficulty::ALL {
            assert_eq!(hints.get(difficulty), "4");
        }
    }

    #[test]
    fn test_hint_preserves_whitespace_and_visible_characters() {
        let mut rng = StdRng::seed_from_u64(42);

        for answer in ANSWERS {
            let hints = Hints::generate_with(answer, &mut rng);

            for difficulty in Difficulty::ALL {
                let hint = hints.get(difficulty);
                assert_eq!(hint.chars().count(), answer.chars().count());

                for (original, shown) in answer.chars().zip(hint.chars()) {
                    if original.is_whitespace() {
                        assert_eq!(shown, original, "whitespace moved in {hint:?}");
                    } else {
                        assert!(
                            shown == original || shown == MASK_CHAR,
                            "unexpected character {shown:?} in {hint:?}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_hints_get_easier() {
        let mut rng = StdRng::seed_from_u64(3);
        let hints = Hints::generate_with("Mount Everest", &mut rng);

        let masked = |d: Difficulty| hints.get(d).chars().filter(|c| *c == MASK_CHAR).count();
        assert_eq!(masked(Difficulty::Hard), 8);
        assert_eq!(masked(Difficulty::Medium), 5);
        assert_eq!(masked(Difficulty::Easy), 3);
    }

    #[test]
    fn test_difficulty_order() {
        assert!(Difficulty::Hard < Difficulty::Medium);
        assert!(Difficulty::Medium < Difficulty::Easy);
        assert_eq!(Difficulty::Hard.easier(), Some(Difficulty::Medium));
        assert_eq!(Difficulty::Easy.easier(), None);
    }
}
