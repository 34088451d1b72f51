//! The cascade/dedup algorithm for C5 (§4.4). Pure computation over the
//! mirror-graph read primitives in `stashcache_db::exclusion`; no
//! persistence here, that's `commit_exclusions`.

use std::collections::{BTreeMap, VecDeque};

use sqlx::SqlitePool;
use stashcache_core::{EntityKind, ExclusionReason, RestrictionMode};
use stashcache_db as db;
use stashcache_db::ExcludedEntity;

use stashcache_db::DbResult;

/// Kinds that can themselves be cascade sources: hiding or restricting one
/// of these can mark further entities excluded, which can in turn cascade
/// again (e.g. a performer newly excluded via a tag cascade still carries
/// its own performer-hidden edge to scenes).
const CASCADE_SOURCE_KINDS: [EntityKind; 5] = [
    EntityKind::Performer,
    EntityKind::Studio,
    EntityKind::Tag,
    EntityKind::Group,
    EntityKind::Gallery,
];

type Key = (EntityKind, String, String);

/// Recomputes the full exclusion set for one user, in priority order:
/// restricted, hidden, cascade (transitive closure), empty.
pub async fn compute_user_exclusions(pool: &SqlitePool, user_id: &str) -> DbResult<Vec<ExcludedEntity>> {
    let mut map: BTreeMap<Key, ExclusionReason> = BTreeMap::new();

    apply_restrictions(pool, user_id, &mut map).await?;
    apply_hidden(pool, user_id, &mut map).await?;
    apply_cascade(pool, &mut map).await?;
    apply_empty(pool, &mut map).await?;

    Ok(map
        .into_iter()
        .map(|((kind, entity_id, instance), reason)| ExcludedEntity {
            entity_type: kind.singular().to_string(),
            entity_id,
            instance,
            reason,
        })
        .collect())
}

/// The single-entity short-circuit for `addHiddenEntity` (§4.4): seeds the
/// cascade walk from just the one newly-hidden entity instead of the whole
/// restricted+hidden set, and skips the empty-entity pass entirely -- that
/// pass only changes when the mirror's content or the restriction set
/// changes, never when a single entity is hidden.
pub async fn compute_single_entity_cascade(
    pool: &SqlitePool,
    kind: EntityKind,
    entity_id: &str,
    instance: &str,
) -> DbResult<Vec<ExcludedEntity>> {
    let mut map: BTreeMap<Key, ExclusionReason> = BTreeMap::new();
    map.insert((kind, entity_id.to_string(), instance.to_string()), ExclusionReason::Hidden);
    apply_cascade(pool, &mut map).await?;

    Ok(map
        .into_iter()
        .map(|((kind, entity_id, instance), reason)| ExcludedEntity {
            entity_type: kind.singular().to_string(),
            entity_id,
            instance,
            reason,
        })
        .collect())
}

async fn apply_restrictions(pool: &SqlitePool, user_id: &str, map: &mut BTreeMap<Key, ExclusionReason>) -> DbResult<()> {
    for restriction in db::list_restrictions(pool, user_id).await? {
        let Some(kind) = EntityKind::from_plural(&restriction.entity_type_plural) else {
            continue;
        };
        let live = db::all_live_ids(pool, kind).await?;
        match restriction.mode {
            RestrictionMode::Exclude => {
                for (id, instance) in live {
                    if restriction.entity_ids.contains(&id) {
                        map.entry((kind, id, instance)).or_insert(ExclusionReason::Restricted);
                    }
                }
            }
            RestrictionMode::Include => {
                for (id, instance) in live {
                    if !restriction.entity_ids.contains(&id) {
                        map.entry((kind, id, instance)).or_insert(ExclusionReason::Restricted);
                    }
                }
            }
        }
    }
    Ok(())
}

async fn apply_hidden(pool: &SqlitePool, user_id: &str, map: &mut BTreeMap<Key, ExclusionReason>) -> DbResult<()> {
    for hidden in db::list_hidden(pool, user_id).await? {
        let Some(kind) = EntityKind::from_singular(&hidden.entity_type) else {
            continue;
        };
        map.entry((kind, hidden.entity_id, hidden.instance))
            .or_insert(ExclusionReason::Hidden);
    }
    Ok(())
}

/// Walks the cascade edges to a fixpoint. Every restricted or hidden
/// performer/studio/tag/group/gallery seeds the walk; any newly-excluded
/// entity that is itself a cascade source is pushed back onto the queue so
/// its own edges are walked too (transitive closure, §4.4).
async fn apply_cascade(pool: &SqlitePool, map: &mut BTreeMap<Key, ExclusionReason>) -> DbResult<()> {
    let mut queue: VecDeque<Key> = map
        .keys()
        .filter(|(kind, _, _)| CASCADE_SOURCE_KINDS.contains(kind))
        .cloned()
        .collect();

    while let Some((kind, id, instance)) = queue.pop_front() {
        let targets = cascade_targets(pool, kind, &id, &instance).await?;
        for target in targets {
            if let std::collections::btree_map::Entry::Vacant(entry) = map.entry(target.clone()) {
                entry.insert(ExclusionReason::Cascade);
                if CASCADE_SOURCE_KINDS.contains(&target.0) {
                    queue.push_back(target);
                }
            }
        }
    }
    Ok(())
}

async fn cascade_targets(pool: &SqlitePool, kind: EntityKind, id: &str, instance: &str) -> DbResult<Vec<Key>> {
    let targets = match kind {
        EntityKind::Performer => db::scenes_by_performer(pool, id, instance)
            .await?
            .into_iter()
            .map(|(i, inst)| (EntityKind::Scene, i, inst))
            .collect(),
        EntityKind::Studio => db::scenes_by_studio(pool, id, instance)
            .await?
            .into_iter()
            .map(|(i, inst)| (EntityKind::Scene, i, inst))
            .collect(),
        EntityKind::Group => db::scenes_by_group(pool, id, instance)
            .await?
            .into_iter()
            .map(|(i, inst)| (EntityKind::Scene, i, inst))
            .collect(),
        EntityKind::Gallery => {
            let mut targets: Vec<Key> = db::scenes_by_gallery(pool, id, instance)
                .await?
                .into_iter()
                .map(|(i, inst)| (EntityKind::Scene, i, inst))
                .collect();
            targets.extend(
                db::images_by_gallery(pool, id, instance)
                    .await?
                    .into_iter()
                    .map(|(i, inst)| (EntityKind::Image, i, inst)),
            );
            targets
        }
        EntityKind::Tag => {
            let mut targets: Vec<Key> = db::scenes_by_tag(pool, id, instance)
                .await?
                .into_iter()
                .map(|(i, inst)| (EntityKind::Scene, i, inst))
                .collect();
            targets.extend(
                db::performers_by_tag(pool, id, instance)
                    .await?
                    .into_iter()
                    .map(|(i, inst)| (EntityKind::Performer, i, inst)),
            );
            targets.extend(
                db::studios_by_tag(pool, id, instance)
                    .await?
                    .into_iter()
                    .map(|(i, inst)| (EntityKind::Studio, i, inst)),
            );
            targets.extend(
                db::groups_by_tag(pool, id, instance)
                    .await?
                    .into_iter()
                    .map(|(i, inst)| (EntityKind::Group, i, inst)),
            );
            targets
        }
        _ => Vec::new(),
    };
    Ok(targets)
}

/// Marks galleries/performers/studios/groups/tags with no surviving content
/// as excluded for the "empty" reason (lowest priority, never overrides an
/// entry already present). "Surviving" means present in the mirror and not
/// already excluded for this user by an earlier reason.
async fn apply_empty(pool: &SqlitePool, map: &mut BTreeMap<Key, ExclusionReason>) -> DbResult<()> {
    apply_empty_galleries(pool, map).await?;
    apply_empty_performers(pool, map).await?;
    apply_empty_studios(pool, map).await?;
    apply_empty_groups(pool, map).await?;
    apply_empty_tags(pool, map).await?;
    Ok(())
}

fn all_excluded(map: &BTreeMap<Key, ExclusionReason>, rows: &[(String, String)], kind: EntityKind) -> bool {
    rows.iter().all(|(id, instance)| map.contains_key(&(kind, id.clone(), instance.clone())))
}

async fn apply_empty_galleries(pool: &SqlitePool, map: &mut BTreeMap<Key, ExclusionReason>) -> DbResult<()> {
    for (id, instance) in db::all_live_ids(pool, EntityKind::Gallery).await? {
        let key = (EntityKind::Gallery, id.clone(), instance.clone());
        if map.contains_key(&key) {
            continue;
        }
        let images = db::images_by_gallery(pool, &id, &instance).await?;
        if all_excluded(map, &images, EntityKind::Image) {
            map.insert(key, ExclusionReason::Empty);
        }
    }
    Ok(())
}

async fn apply_empty_performers(pool: &SqlitePool, map: &mut BTreeMap<Key, ExclusionReason>) -> DbResult<()> {
    for (id, instance) in db::all_live_ids(pool, EntityKind::Performer).await? {
        let key = (EntityKind::Performer, id.clone(), instance.clone());
        if map.contains_key(&key) {
            continue;
        }
        let scenes = db::scenes_by_performer(pool, &id, &instance).await?;
        let images = db::images_by_performer(pool, &id, &instance).await?;
        if all_excluded(map, &scenes, EntityKind::Scene) && all_excluded(map, &images, EntityKind::Image) {
            map.insert(key, ExclusionReason::Empty);
        }
    }
    Ok(())
}

async fn apply_empty_studios(pool: &SqlitePool, map: &mut BTreeMap<Key, ExclusionReason>) -> DbResult<()> {
    for (id, instance) in db::all_live_ids(pool, EntityKind::Studio).await? {
        let key = (EntityKind::Studio, id.clone(), instance.clone());
        if map.contains_key(&key) {
            continue;
        }
        let scenes = db::scenes_by_studio(pool, &id, &instance).await?;
        let images = db::images_by_studio(pool, &id, &instance).await?;
        if all_excluded(map, &scenes, EntityKind::Scene) && all_excluded(map, &images, EntityKind::Image) {
            map.insert(key, ExclusionReason::Empty);
        }
    }
    Ok(())
}

async fn apply_empty_groups(pool: &SqlitePool, map: &mut BTreeMap<Key, ExclusionReason>) -> DbResult<()> {
    for (id, instance) in db::all_live_ids(pool, EntityKind::Group).await? {
        let key = (EntityKind::Group, id.clone(), instance.clone());
        if map.contains_key(&key) {
            continue;
        }
        let scenes = db::scenes_by_group(pool, &id, &instance).await?;
        if all_excluded(map, &scenes, EntityKind::Scene) {
            map.insert(key, ExclusionReason::Empty);
        }
    }
    Ok(())
}

async fn apply_empty_tags(pool: &SqlitePool, map: &mut BTreeMap<Key, ExclusionReason>) -> DbResult<()> {
    let tags_with_children = db::tag_ids_with_children(pool).await?;
    for (id, instance) in db::all_live_ids(pool, EntityKind::Tag).await? {
        let key = (EntityKind::Tag, id.clone(), instance.clone());
        if map.contains_key(&key) {
            continue;
        }
        if tags_with_children.contains(&(id.clone(), instance.clone())) {
            continue;
        }
        let scenes = db::scenes_by_tag(pool, &id, &instance).await?;
        let performers = db::performers_by_tag(pool, &id, &instance).await?;
        let studios = db::studios_by_tag(pool, &id, &instance).await?;
        let groups = db::groups_by_tag(pool, &id, &instance).await?;
        let surviving = !all_excluded(map, &scenes, EntityKind::Scene)
            || !all_excluded(map, &performers, EntityKind::Performer)
            || !all_excluded(map, &studios, EntityKind::Studio)
            || !all_excluded(map, &groups, EntityKind::Group);
        if !surviving {
            map.insert(key, ExclusionReason::Empty);
        }
    }
    Ok(())
}
