//! Per-user rating/favorite overlay on mirrored entities (§3
//! `UserEntityOverlay`). Left-joined by the query builders (C6), never
//! written by sync -- it's purely a user-facing annotation.

use sqlx::SqlitePool;

use crate::DbResult;

#[derive(Debug, Clone, Default, sqlx::FromRow)]
pub struct EntityOverlay {
    pub rating: Option<i64>,
    pub favorite: bool,
}

pub async fn get_overlay(
    pool: &SqlitePool,
    user_id: &str,
    entity_type: &str,
    entity_id: &str,
    instance: &str,
) -> DbResult<Option<EntityOverlay>> {
    let row = sqlx::query_as::<_, (Option<i64>, Option<i64>)>(
        "SELECT rating, favorite FROM user_entity_overlay \
         WHERE user_id = ? AND entity_type = ? AND entity_id = ? AND instance = ?",
    )
    .bind(user_id)
    .bind(entity_type)
    .bind(entity_id)
    .bind(instance)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|(rating, favorite)| EntityOverlay {
        rating,
        favorite: favorite.unwrap_or(0) != 0,
    }))
}

pub async fn set_rating(
    pool: &SqlitePool,
    user_id: &str,
    entity_type: &str,
    entity_id: &str,
    instance: &str,
    rating: Option<i64>,
) -> DbResult<()> {
    sqlx::query(
        "INSERT INTO user_entity_overlay (user_id, entity_type, entity_id, instance, rating, favorite) \
         VALUES (?, ?, ?, ?, ?, 0) \
         ON CONFLICT(user_id, entity_type, entity_id, instance) DO UPDATE SET rating = excluded.rating",
    )
    .bind(user_id)
    .bind(entity_type)
    .bind(entity_id)
    .bind(instance)
    .bind(rating)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn set_favorite(
    pool: &SqlitePool,
    user_id: &str,
    entity_type: &str,
    entity_id: &str,
    instance: &str,
    favorite: bool,
) -> DbResult<()> {
    sqlx::query(
        "INSERT INTO user_entity_overlay (user_id, entity_type, entity_id, instance, rating, favorite) \
         VALUES (?, ?, ?, ?, NULL, ?) \
         ON CONFLICT(user_id, entity_type, entity_id, instance) DO UPDATE SET favorite = excluded.favorite",
    )
    .bind(user_id)
    .bind(entity_type)
    .bind(entity_id)
    .bind(instance)
    .bind(favorite as i64)
    .execute(pool)
    .await?;
    Ok(())
}
