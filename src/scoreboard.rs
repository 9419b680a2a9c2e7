use std::collections::HashMap;
use std::fmt;

use crate::error::StoreError;
use crate::room::RoomId;
use crate::store::TriviaStore;

/// Points earned during one session, keyed by user name
#[derive(Debug, Clone)]
pub struct ScoreBoard {
    room: RoomId,
    tally: HashMap<String, u32>,
}

impl ScoreBoard {
    pub fn new(room: RoomId) -> Self {
        Self {
            room,
            tally: HashMap::new(),
        }
    }

    pub fn add_point(&mut self, user_name: &str) {
        *self.tally.entry(user_name.to_string()).or_insert(0) += 1;
    }

    pub fn points(&self, user_name: &str) -> u32 {
        self.tally.get(user_name).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.tally.is_empty()
    }

    /// Scores in descending order, ties broken by name
    pub fn ranked(&self) -> Vec<(&str, u32)> {
        let mut ranked: Vec<(&str, u32)> = self
            .tally
            .iter()
            .map(|(name, points)| (name.as_str(), *points))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked
    }

    /// End-of-game announcement
    pub fn summary(&self) -> String {
        if self.is_empty() {
            "Game finished!".to_string()
        } else {
            format!("Game finished! Stats: {self}")
        }
    }

    /// Merge the tally into the room's durable statistics. Consumes the board
    /// so a session cannot save twice.
    pub async fn save(self, store: &TriviaStore) -> Result<(), StoreError> {
        store.save_scores(&self.room, &self.tally).await
    }
}

impl fmt::Display for ScoreBoard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listing = self
            .ranked()
            .iter()
            .map(|(name, points)| format!("{name}: {points} point(s)"))
            .collect::<Vec<_>>()
            .join(", ");
        f.write_str(&listing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_point() {
        let mut board = ScoreBoard::new(RoomId::from("quiz"));
        assert!(board.is_empty());

        board.add_point("alice");
        board.add_point("bob");
        board.add_point("alice");

        assert_eq!(board.points("alice"), 2);
        assert_eq!(board.points("bob"), 1);
        assert_eq!(board.points("carol"), 0);
    }

    #[test]
    fn test_summary() {
        let mut board = ScoreBoard::new(RoomId::from("quiz"));
        assert_eq!(board.summary(), "Game finished!");

        board.add_point("carol");
        board.add_point("bob");
        board.add_point("alice");
        board.add_point("alice");

        assert_eq!(
            board.summary(),
            "Game finished! Stats: alice: 2 point(s), bob: 1 point(s), carol: 1 point(s)"
        );
    }

    #[actix_rt::test]
    async fn test_save_matches_tally() {
        let store = TriviaStore::in_memory().await.unwrap();
        let room = RoomId::from("quiz");

        let mut board = ScoreBoard::new(room.clone());
        board.add_point("alice");
        board.add_point("alice");
        board.add_point("bob");
        board.save(&store).await.unwrap();

        assert_eq!(store.points_for(&room, "alice").await.unwrap(), 2);
        assert_eq!(store.points_for(&room, "bob").await.unwrap(), 1);
    }
}
