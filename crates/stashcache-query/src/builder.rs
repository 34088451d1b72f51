//! Per-kind SQL synthesis (§4.5): `(Filters, Sort, Page) -> (String,
//! Params)`, built with `sqlx::QueryBuilder` the same way
//! `stashcache-db`'s upsert/derivation helpers compose dynamic SQL.

use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use stashcache_core::EntityKind;

use crate::error::{QueryError, QueryResult};
use crate::filter::{DateModifier, FilterClause, IdModifier, JunctionModifier, NumericModifier, TextModifier};
use crate::hierarchy::{expand_studio_ids, expand_tag_ids};
use crate::meta::{meta, JunctionDef, KindMeta};
use crate::options::{PageResult, QueryOptions};

/// Runs a kind's list query plus its count query and returns both
/// (§4.5: "Post-execution, the builder calls C7 ... and C9 ..., then
/// returns `{items, total}`" -- hydration/rewriting happen one layer up,
/// against the raw rows this returns).
pub async fn list(pool: &SqlitePool, kind: EntityKind, opts: &QueryOptions) -> QueryResult<PageResult<SqliteRow>> {
    let m = meta(kind);
    let total = count(pool, kind, opts).await?;

    if opts.sort_key == "random" {
        return list_random(pool, &m, opts, total).await;
    }

    let mut qb = select_builder(&m, opts, &select_clause(&m, opts))?;
    qb.push(" ORDER BY ");
    push_order_by(&mut qb, &m, opts);
    qb.push(" LIMIT ").push_bind(opts.per_page as i64);
    qb.push(" OFFSET ").push_bind(((opts.page.max(1) - 1) * opts.per_page) as i64);

    let items = qb.build().fetch_all(pool).await?;
    Ok(PageResult { items, total })
}

/// Deterministic random sort (§4.5): SQLite has no stable hash
/// function, so this fetches every matching id in a stable order,
/// ranks them by a hash of `(id, seed)` kept within signed-32-bit
/// arithmetic, and re-queries the page by the winning ids.
async fn list_random(pool: &SqlitePool, m: &KindMeta, opts: &QueryOptions, total: u64) -> QueryResult<PageResult<SqliteRow>> {
    let seed = opts.random_seed.unwrap_or(0);
    let mut id_qb = select_builder(m, opts, &format!("{}.id", m.table))?;
    let rows: Vec<(String,)> = id_qb.build_query_as::<(String,)>().fetch_all(pool).await.map_err(QueryError::from)?;

    let mut ranked: Vec<(i32, String)> = rows.into_iter().map(|(id,)| (random_hash(&id, seed), id)).collect();
    ranked.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

    let start = ((opts.page.max(1) - 1) * opts.per_page) as usize;
    let page_ids: Vec<String> = ranked.into_iter().skip(start).take(opts.per_page as usize).map(|(_, id)| id).collect();
    if page_ids.is_empty() {
        return Ok(PageResult { items: Vec::new(), total });
    }

    // Re-run the same FROM/JOIN/WHERE as the main query (so instance
    // scoping and exclusions still apply) restricted to the page's ids.
    let mut qb = select_builder(m, opts, &select_clause(m, opts))?;
    qb.push(format!(" AND {}.id IN (", m.table));
    let mut separated = qb.separated(", ");
    for id in &page_ids {
        separated.push_bind(id.clone());
    }
    qb.push(")");
    let items = qb.build().fetch_all(pool).await?;
    Ok(PageResult { items, total })
}

/// `(id + seed)` folded into a signed-32-bit range via a Horner-style
/// FNV-like accumulation, wrapping on overflow rather than panicking.
fn random_hash(id: &str, seed: i64) -> i32 {
    let mut h: i64 = seed;
    for b in id.bytes() {
        h = h.wrapping_mul(31).wrapping_add(b as i64);
    }
    (h & 0x7fff_ffff) as i32
}

pub async fn count(pool: &SqlitePool, kind: EntityKind, opts: &QueryOptions) -> QueryResult<u64> {
    let m = meta(kind);
    // Fast path (§4.5): a plain `COUNT(*)` over the same FROM/JOIN/WHERE
    // as the list query -- LEFT JOINs on a full composite primary key
    // match at most one row, so this never double-counts.
    let mut qb = select_builder(&m, opts, "COUNT(*)")?;
    let row: (i64,) = qb.build_query_as::<(i64,)>().fetch_one(pool).await.map_err(QueryError::from)?;
    Ok(row.0 as u64)
}

/// Fetches one row by its composite key (§6 "by id" contract). Not run
/// through the overlay/exclusion joins -- a direct lookup by id is never
/// filtered out by a user's own hides, only by the soft-delete flag.
pub async fn get_by_id(pool: &SqlitePool, kind: EntityKind, id: &str, instance: &str) -> QueryResult<Option<SqliteRow>> {
    let m = meta(kind);
    let sql = format!("SELECT {0}.* FROM {0} WHERE {0}.id = ? AND {0}.instance = ? AND {0}.deleted_at IS NULL", m.table);
    let row = sqlx::query(&sql).bind(id).bind(instance).fetch_optional(pool).await?;
    Ok(row)
}

/// Fetches every clip belonging to one scene, ordered by position (§6
/// "clips for scene" contract, scenes only).
pub async fn clips_for_scene(pool: &SqlitePool, scene_id: &str, scene_instance: &str) -> QueryResult<Vec<SqliteRow>> {
    let rows = sqlx::query(
        "SELECT clips.* FROM clips WHERE scene_id = ? AND scene_instance = ? AND deleted_at IS NULL ORDER BY seconds ASC, id ASC",
    )
    .bind(scene_id)
    .bind(scene_instance)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// `{table}.*` plus the per-user overlay columns when a viewer is set
/// (§4.5 overlay) -- omitted for an anonymous request since `overlay` is
/// never joined in that case.
fn select_clause(m: &KindMeta, opts: &QueryOptions) -> String {
    if opts.user_id.is_some() {
        format!("{0}.*, overlay.rating AS overlay_rating, overlay.favorite AS overlay_favorite", m.table)
    } else {
        format!("{}.*", m.table)
    }
}

fn select_builder<'a>(m: &KindMeta, opts: &'a QueryOptions, select_clause: &str) -> QueryResult<QueryBuilder<'a, Sqlite>> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!("SELECT {select_clause} FROM {} ", m.table));
    if let Some(user_id) = &opts.user_id {
        qb.push(format!(" LEFT JOIN user_entity_overlay overlay ON overlay.entity_type = '{}' AND overlay.entity_id = {}.id AND overlay.instance = {}.instance AND overlay.user_id = ", m.kind.singular(), m.table, m.table));
        qb.push_bind(user_id.clone());
        if opts.apply_exclusions {
            qb.push(format!(" LEFT JOIN user_excluded_entity excl ON excl.entity_type = '{}' AND excl.entity_id = {}.id AND excl.instance = {}.instance AND excl.user_id = ", m.kind.singular(), m.table, m.table));
            qb.push_bind(user_id.clone());
        }
    }
    push_where_sync(&mut qb, m, opts)?;
    Ok(qb)
}

fn push_where_sync(qb: &mut QueryBuilder<'_, Sqlite>, m: &KindMeta, opts: &QueryOptions) -> QueryResult<()> {
    qb.push(format!(" WHERE {}.deleted_at IS NULL", m.table));
    if opts.user_id.is_some() && opts.apply_exclusions {
        qb.push(" AND excl.entity_id IS NULL");
    }

    if let Some(allowed) = &opts.allowed_instance_ids {
        if !allowed.is_empty() {
            qb.push(format!(" AND ({}.instance IN (", m.table));
            let mut separated = qb.separated(", ");
            for id in allowed {
                separated.push_bind(id.clone());
            }
            separated.push_unseparated(format!(") OR {}.instance = '')", m.table));
        }
    } else if let Some(specific) = &opts.specific_instance_id {
        qb.push(format!(" AND {}.instance = ", m.table)).push_bind(specific.clone());
    }

    if let Some(search) = &opts.search {
        if !search.trim().is_empty() && !m.search_fields.is_empty() {
            qb.push(" AND (");
            let pattern = format!("%{}%", search.to_lowercase());
            for (i, field) in m.search_fields.iter().enumerate() {
                if i > 0 {
                    qb.push(" OR ");
                }
                qb.push(format!("LOWER({}.{}) LIKE ", m.table, field)).push_bind(pattern.clone());
            }
            qb.push(")");
        }
    }

    for filter in &opts.filters {
        push_filter(qb, m, filter)?;
    }
    Ok(())
}

fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, m: &KindMeta, filter: &FilterClause) -> QueryResult<()> {
    match filter {
        FilterClause::Id { field, modifier, ids } => {
            if ids.is_empty() {
                return Ok(());
            }
            let op = match modifier {
                IdModifier::Includes => "IN",
                IdModifier::Excludes => "NOT IN",
            };
            qb.push(format!(" AND {}.{} {} (", m.table, field, op));
            let mut separated = qb.separated(", ");
            for id in ids {
                separated.push_bind(id.clone());
            }
            qb.push(")");
        }
        FilterClause::Text { field, modifier, value } => {
            let col = m.text_column(field).ok_or_else(|| unknown(m, field))?;
            let col = format!("{}.{}", m.table, col);
            match modifier {
                TextModifier::IsNull => {
                    qb.push(format!(" AND {col} IS NULL"));
                }
                TextModifier::NotNull => {
                    qb.push(format!(" AND {col} IS NOT NULL"));
                }
                _ => {
                    let Some(value) = value else { return Ok(()) };
                    match modifier {
                        TextModifier::Includes => {
                            qb.push(format!(" AND LOWER({col}) LIKE ")).push_bind(format!("%{}%", value.to_lowercase()));
                        }
                        TextModifier::Excludes => {
                            qb.push(format!(" AND ({col} IS NULL OR LOWER({col}) NOT LIKE "))
                                .push_bind(format!("%{}%", value.to_lowercase()));
                            qb.push(")");
                        }
                        TextModifier::Equals => {
                            qb.push(format!(" AND LOWER({col}) = LOWER(")).push_bind(value.clone());
                            qb.push(")");
                        }
                        TextModifier::NotEquals => {
                            qb.push(format!(" AND ({col} IS NULL OR LOWER({col}) != LOWER("))
                                .push_bind(value.clone());
                            qb.push("))");
                        }
                        TextModifier::IsNull | TextModifier::NotNull => unreachable!(),
                    }
                }
            }
        }
        FilterClause::Numeric { field, modifier, value, value2 } => {
            let col = m.numeric_column(field).ok_or_else(|| unknown(m, field))?;
            let col = format!("{}.{}", m.table, col);
            match modifier {
                NumericModifier::Equals => {
                    qb.push(format!(" AND {col} = ")).push_bind(*value);
                }
                NumericModifier::NotEquals => {
                    qb.push(format!(" AND {col} != ")).push_bind(*value);
                }
                NumericModifier::GreaterThan => {
                    qb.push(format!(" AND {col} > ")).push_bind(*value);
                }
                NumericModifier::LessThan => {
                    qb.push(format!(" AND {col} < ")).push_bind(*value);
                }
                NumericModifier::Between | NumericModifier::NotBetween => {
                    let Some(hi) = value2 else { return Ok(()) };
                    let not = if *modifier == NumericModifier::NotBetween { " NOT" } else { "" };
                    qb.push(format!(" AND {col}{not} BETWEEN ")).push_bind(*value);
                    qb.push(" AND ").push_bind(*hi);
                }
            }
        }
        FilterClause::Date { field, modifier, value, value2 } => {
            let col = m.date_column(field).ok_or_else(|| unknown(m, field))?;
            let col = format!("{}.{}", m.table, col);
            match modifier {
                DateModifier::IsNull => {
                    qb.push(format!(" AND {col} IS NULL"));
                }
                DateModifier::NotNull => {
                    qb.push(format!(" AND {col} IS NOT NULL"));
                }
                DateModifier::Equals => {
                    let Some(v) = value else { return Ok(()) };
                    qb.push(format!(" AND {col} = ")).push_bind(v.clone());
                }
                DateModifier::NotEquals => {
                    let Some(v) = value else { return Ok(()) };
                    qb.push(format!(" AND ({col} IS NULL OR {col} != ")).push_bind(v.clone());
                    qb.push(")");
                }
                DateModifier::GreaterThan => {
                    let Some(v) = value else { return Ok(()) };
                    qb.push(format!(" AND {col} > ")).push_bind(v.clone());
                }
                DateModifier::LessThan => {
                    let Some(v) = value else { return Ok(()) };
                    qb.push(format!(" AND {col} < ")).push_bind(v.clone());
                }
                DateModifier::Between | DateModifier::NotBetween => {
                    let (Some(lo), Some(hi)) = (value, value2) else { return Ok(()) };
                    let not = if *modifier == DateModifier::NotBetween { " NOT" } else { "" };
                    qb.push(format!(" AND {col}{not} BETWEEN ")).push_bind(lo.clone());
                    qb.push(" AND ").push_bind(hi.clone());
                }
            }
        }
        FilterClause::Favorite { value } => {
            if *value {
                qb.push(" AND overlay.favorite = 1");
            } else {
                qb.push(" AND (overlay.favorite = 0 OR overlay.favorite IS NULL)");
            }
        }
        FilterClause::Junction { other_kind, modifier, ids } => {
            let jd = m.junction(*other_kind).ok_or_else(|| unknown(m, &other_kind.to_string()))?;
            push_junction_clause(qb, m, jd, *modifier, ids);
        }
        FilterClause::Hierarchy { .. } => {
            // Expansion requires an async pool lookup; callers resolve a
            // Hierarchy clause into an expanded Id/Junction clause via
            // [`crate::resolve_hierarchy_filters`] before handing filters
            // to the builder.
            return Err(QueryError::UnknownField { kind: m.kind, field: "hierarchy (unresolved)".into() });
        }
    }
    Ok(())
}

fn push_junction_clause(qb: &mut QueryBuilder<'_, Sqlite>, m: &KindMeta, jd: &JunctionDef, modifier: JunctionModifier, ids: &[String]) {
    if ids.is_empty() {
        return;
    }
    let union_sql = jd
        .tables
        .iter()
        .map(|(table, self_col, _, other_col, _)| format!("SELECT {self_col} AS sid, {other_col} AS oid FROM {table}"))
        .collect::<Vec<_>>()
        .join(" UNION ALL ");

    match modifier {
        JunctionModifier::Includes => {
            qb.push(format!(" AND EXISTS (SELECT 1 FROM ({union_sql}) j WHERE j.sid = {}.id AND j.oid IN (", m.table));
            let mut separated = qb.separated(", ");
            for id in ids {
                separated.push_bind(id.clone());
            }
            qb.push("))");
        }
        JunctionModifier::Excludes => {
            qb.push(format!(" AND NOT EXISTS (SELECT 1 FROM ({union_sql}) j WHERE j.sid = {}.id AND j.oid IN (", m.table));
            let mut separated = qb.separated(", ");
            for id in ids {
                separated.push_bind(id.clone());
            }
            qb.push("))");
        }
        JunctionModifier::IncludesAll => {
            qb.push(format!(
                " AND (SELECT COUNT(DISTINCT j.oid) FROM ({union_sql}) j WHERE j.sid = {}.id AND j.oid IN (",
                m.table
            ));
            let mut separated = qb.separated(", ");
            for id in ids {
                separated.push_bind(id.clone());
            }
            qb.push(format!(")) = {}", ids.len()));
        }
    }
}

fn unknown(m: &KindMeta, field: &str) -> QueryError {
    QueryError::UnknownField { kind: m.kind, field: field.to_string() }
}

fn push_order_by(qb: &mut QueryBuilder<'_, Sqlite>, m: &KindMeta, opts: &QueryOptions) {
    let dir = opts.sort_direction.as_sql();
    let mut sort_key = opts.sort_key.as_str();
    if sort_key == "rating" && opts.user_id.is_none() {
        sort_key = "";
    }
    let col = if sort_key.is_empty() { m.default_sort } else { m.sort_column(sort_key) };
    qb.push(col).push(" ").push(dir);
    if let Some(name_col) = m.name_column {
        if name_col != col {
            qb.push(", ").push(name_col).push(" ").push(dir);
        }
    }
    qb.push(format!(", {}.id {}", m.table, dir));
}

/// Resolves any [`FilterClause::Hierarchy`] entries into their
/// non-hierarchy equivalents by expanding ids through C6's hierarchy
/// helpers (§4.5). Call before [`list`]/[`count`].
pub async fn resolve_hierarchy_filters(pool: &SqlitePool, instance: &str, m: &KindMeta, filters: Vec<FilterClause>) -> QueryResult<Vec<FilterClause>> {
    let mut resolved = Vec::with_capacity(filters.len());
    for filter in filters {
        match filter {
            FilterClause::Hierarchy { kind: EntityKind::Tag, ids, depth, modifier } => {
                let expanded = expand_tag_ids(pool, instance, &ids, depth).await?;
                if m.kind == EntityKind::Tag {
                    resolved.push(FilterClause::Id { field: "id", modifier, ids: expanded });
                } else {
                    resolved.push(FilterClause::Junction {
                        other_kind: EntityKind::Tag,
                        modifier: match modifier {
                            IdModifier::Includes => JunctionModifier::Includes,
                            IdModifier::Excludes => JunctionModifier::Excludes,
                        },
                        ids: expanded,
                    });
                }
            }
            FilterClause::Hierarchy { kind: EntityKind::Studio, ids, depth, modifier } => {
                let expanded = expand_studio_ids(pool, instance, &ids, depth).await?;
                if m.kind == EntityKind::Studio {
                    resolved.push(FilterClause::Id { field: "id", modifier, ids: expanded });
                } else if m.has_studio {
                    resolved.push(FilterClause::Id { field: "studio_id", modifier, ids: expanded });
                } else {
                    return Err(unknown(m, "studio"));
                }
            }
            FilterClause::Hierarchy { kind, .. } => return Err(unknown(m, &kind.to_string())),
            other => resolved.push(other),
        }
    }
    Ok(resolved)
}
