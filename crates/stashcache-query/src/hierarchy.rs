//! Hierarchy id expansion for the tag DAG and the studio parent tree
//! (§4.5 "Hierarchy filter ... generated by an external `expand{Kind}Ids`
//! helper"). `depth` 0 returns the input ids unchanged; n>0 walks down
//! to descendants, `n` levels, guarding against cycles with a visited
//! set since tags are a multi-parent DAG and cycles aren't otherwise
//! ruled out by the schema.

use std::collections::HashSet;

use sqlx::SqlitePool;

use crate::error::QueryResult;

pub async fn expand_tag_ids(pool: &SqlitePool, instance: &str, ids: &[String], depth: u32) -> QueryResult<Vec<String>> {
    expand(pool, instance, ids, depth, "SELECT tag_id FROM tag_parents WHERE parent_tag_id = ? AND parent_instance = ?").await
}

pub async fn expand_studio_ids(pool: &SqlitePool, instance: &str, ids: &[String], depth: u32) -> QueryResult<Vec<String>> {
    expand(
        pool,
        instance,
        ids,
        depth,
        "SELECT id FROM studios WHERE parent_id = ? AND parent_instance = ? AND deleted_at IS NULL",
    )
    .await
}

async fn expand(pool: &SqlitePool, instance: &str, ids: &[String], depth: u32, children_sql: &str) -> QueryResult<Vec<String>> {
    let mut visited: HashSet<String> = ids.iter().cloned().collect();
    let mut frontier: Vec<String> = ids.to_vec();
    for _ in 0..depth {
        if frontier.is_empty() {
            break;
        }
        let mut next = Vec::new();
        for id in &frontier {
            let rows: Vec<(String,)> = sqlx::query_as(children_sql).bind(id).bind(instance).fetch_all(pool).await?;
            for (child,) in rows {
                if visited.insert(child.clone()) {
                    next.push(child);
                }
            }
        }
        frontier = next;
    }
    Ok(visited.into_iter().collect())
}
