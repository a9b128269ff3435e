use forumdb_core::NewCommunity;
use sqlx::PgPool;

use crate::communities::upsert_community_in;
use crate::DbError;

/// Upsert tracked communities from config into the database.
///
/// Returns the number of communities processed (created or refreshed).
/// All upserts run inside a single transaction; if any one fails the whole
/// batch is rolled back.
///
/// # Errors
///
/// Returns [`DbError::Validation`] if a community fails validation, or
/// [`DbError::Sqlx`] if any database operation fails.
pub async fn seed_communities(pool: &PgPool, communities: &[NewCommunity]) -> Result<usize, DbError> {
    let mut tx = pool.begin().await?;
    let mut created = 0usize;

    for community in communities {
        let (row, inserted) = upsert_community_in(&mut tx, community).await?;
        if inserted {
            created += 1;
        }
        tracing::debug!(community = %row.name, inserted, "seeded community");
    }

    tx.commit().await?;
    tracing::info!(
        total = communities.len(),
        created,
        "community seed complete"
    );
    Ok(communities.len())
}
