use tracing::{info, warn};

use super::{find_user_id, get_or_create_user_id, TriviaStore};
use crate::error::StoreError;

// Other edges touching the new one: the original is itself an alias, the alias
// has aliases of its own, or another original already claims the alias.
const NEIGHBOURING_EDGES: &str = "
    SELECT COUNT(*)
    FROM UserAliases
    WHERE ( AliasId = ?1 OR OriginalId = ?2 OR AliasId = ?2 )
      AND NOT ( OriginalId = ?1 AND AliasId = ?2 )
";

impl TriviaStore {
    /// Register `alias` as an alias of `user_name`, creating either user if needed.
    ///
    /// Adding an existing edge is a no-op. Returns whether a new edge was stored.
    pub async fn add_alias(&self, user_name: &str, alias: &str) -> Result<bool, StoreError> {
        let (inserted, neighbours) = self
            .retrying("add alias", || async move {
                let mut tx = self.pool.begin().await?;
                let user_id = get_or_create_user_id(&mut tx, user_name).await?;
                let alias_id = get_or_create_user_id(&mut tx, alias).await?;

                let inserted = sqlx::query(
                    "INSERT INTO UserAliases ( OriginalId, AliasId ) VALUES ( ?, ? )
                     ON CONFLICT ( OriginalId, AliasId ) DO NOTHING",
                )
                .bind(user_id)
                .bind(alias_id)
                .execute(&mut *tx)
                .await?
                .rows_affected()
                    > 0;

                let neighbours = sqlx::query_scalar::<_, i64>(NEIGHBOURING_EDGES)
                    .bind(user_id)
                    .bind(alias_id)
                    .fetch_one(&mut *tx)
                    .await?;

                tx.commit().await?;
                Ok::<_, sqlx::Error>((inserted, neighbours))
            })
            .await?;

        if inserted {
            info!("Registered '{}' as an alias of '{}'", alias, user_name);
        }
        if user_name == alias || neighbours > 0 {
            warn!(
                "Alias '{}' -> '{}' is part of a chain or cycle; only one hop is resolved",
                alias, user_name
            );
        }

        Ok(inserted)
    }

    /// Remove the alias edge if both users and the edge exist. Returns whether
    /// an edge was deleted.
    pub async fn remove_alias(&self, user_name: &str, alias: &str) -> Result<bool, StoreError> {
        let removed = self
            .retrying("remove alias", || async move {
                let mut conn = self.pool.acquire().await?;

                let (Some(user_id), Some(alias_id)) = (
                    find_user_id(&mut conn, user_name).await?,
                    find_user_id(&mut conn, alias).await?,
                ) else {
                    return Ok(false);
                };

                let result =
                    sqlx::query("DELETE FROM UserAliases WHERE OriginalId = ? AND AliasId = ?")
                        .bind(user_id)
                        .bind(alias_id)
                        .execute(&mut *conn)
                        .await?;

                Ok::<_, sqlx::Error>(result.rows_affected() > 0)
            })
            .await?;

        if removed {
            info!("Removed alias '{}' of '{}'", alias, user_name);
        }
        Ok(removed)
    }

    /// Names registered as aliases of `user_name`, i.e. whose points count for them
    pub async fn list_aliases(&self, user_name: &str) -> Result<Vec<String>, StoreError> {
        self.retrying("list aliases", || {
            sqlx::query_scalar::<_, String>(
                "SELECT u.Name
                 FROM UserAliases AS ua
                 INNER JOIN Users AS u ON u.Id = ua.AliasId
                 INNER JOIN Users AS o ON o.Id = ua.OriginalId
                 WHERE o.Name = ?
                 ORDER BY u.Name",
            )
            .bind(user_name)
            .fetch_all(&self.pool)
        })
        .await
    }
}

/// Text for an alias listing
pub fn describe_aliases(user_name: &str, aliases: &[String]) -> String {
    format!("Aliases for '{}': {}", user_name, aliases.join(", "))
}
