use std::collections::HashMap;
use std::fmt;
use tracing::info;

use super::{get_or_create_game_id, get_or_create_user_id, TriviaStore};
use crate::error::StoreError;
use crate::room::RoomId;

/// Number of places listed in a hall of fame
const HALL_OF_FAME_SIZE: i64 = 10;

/// Adds a session's points to the running per-room total
const UPSERT_POINTS: &str = "
    INSERT INTO GameStatistics ( GameId, UserId, Points ) VALUES ( ?1, ?2, ?3 )
    ON CONFLICT ( GameId, UserId ) DO UPDATE SET Points = Points + excluded.Points
";

// Points of an alias roll up to the identity it is registered under. Only one
// hop is followed; when several originals claim the same alias the lowest id wins.
const HALL_OF_FAME: &str = "
    SELECT u.Name, SUM(s.Points) AS Total
    FROM (
        SELECT
            COALESCE(
                ( SELECT MIN(ua.OriginalId) FROM UserAliases AS ua WHERE ua.AliasId = gs.UserId ),
                gs.UserId
            ) AS ResolvedId,
            gs.Points AS Points
        FROM GameStatistics AS gs
        WHERE gs.GameId = ?1
    ) AS s
    INNER JOIN Users AS u ON u.Id = s.ResolvedId
    GROUP BY s.ResolvedId, u.Name
    ORDER BY Total DESC, u.Name ASC
    LIMIT ?2
";

const POINTS_FOR_USER: &str = "
    SELECT COALESCE(SUM(gs.Points), 0)
    FROM GameStatistics AS gs
    WHERE gs.GameId = ?1
      AND COALESCE(
            ( SELECT MIN(ua.OriginalId) FROM UserAliases AS ua WHERE ua.AliasId = gs.UserId ),
            gs.UserId
          ) = ?2
";

/// One ranked line of a hall of fame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HallOfFameEntry {
    /// 1-based position
    pub rank: usize,
    pub name: String,
    pub points: i64,
}

impl fmt::Display for HallOfFameEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}. {} : {} point(s)", self.rank, self.name, self.points)
    }
}

impl TriviaStore {
    /// Merge a finished session's tally into the room's durable statistics.
    ///
    /// Points are added to whatever the users already have. Calling this twice
    /// with the same tally counts it twice.
    pub async fn save_scores(
        &self,
        room: &RoomId,
        tally: &HashMap<String, u32>,
    ) -> Result<(), StoreError> {
        if tally.is_empty() {
            return Ok(());
        }

        self.retrying("save scores", || self.save_scores_once(room, tally))
            .await?;

        info!("Saved {} score(s) for {}", tally.len(), room);
        Ok(())
    }

    async fn save_scores_once(
        &self,
        room: &RoomId,
        tally: &HashMap<String, u32>,
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let game_id = get_or_create_game_id(&mut tx, room.as_str()).await?;

        for (user_name, points) in tally {
            let user_id = get_or_create_user_id(&mut tx, user_name).await?;

            sqlx::query(UPSERT_POINTS)
                .bind(game_id)
                .bind(user_id)
                .bind(i64::from(*points))
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await
    }

    /// Top scorers of a room, aggregated over alias-resolved identities
    pub async fn hall_of_fame(&self, room: &RoomId) -> Result<Vec<HallOfFameEntry>, StoreError> {
        let rows = self
            .retrying("hall of fame", || async move {
                let mut conn = self.pool.acquire().await?;
                let game_id = get_or_create_game_id(&mut conn, room.as_str()).await?;

                sqlx::query_as::<_, (String, i64)>(HALL_OF_FAME)
                    .bind(game_id)
                    .bind(HALL_OF_FAME_SIZE)
                    .fetch_all(&mut *conn)
                    .await
            })
            .await?;

        Ok(rows
            .into_iter()
            .enumerate()
            .map(|(index, (name, points))| HallOfFameEntry {
                rank: index + 1,
                name,
                points,
            })
            .collect())
    }

    /// Alias-resolved total for one user in a room; zero if they never scored
    pub async fn points_for(&self, room: &RoomId, user_name: &str) -> Result<i64, StoreError> {
        self.retrying("points for user", || async move {
            let mut conn = self.pool.acquire().await?;
            let game_id = get_or_create_game_id(&mut conn, room.as_str()).await?;
            let user_id = get_or_create_user_id(&mut conn, user_name).await?;

            sqlx::query_scalar::<_, i64>(POINTS_FOR_USER)
                .bind(game_id)
                .bind(user_id)
                .fetch_one(&mut *conn)
                .await
        })
        .await
    }
}

/// Text for a hall of fame listing
pub fn describe_hall_of_fame(room: &RoomId, entries: &[HallOfFameEntry]) -> String {
    let listing = entries
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    format!("Hall of Fame for {room}: {listing}")
}
