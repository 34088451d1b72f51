use std::fmt;

/// The eight browsable/mirrored entity kinds of §3.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Scene,
    Image,
    Gallery,
    Performer,
    Studio,
    Tag,
    Group,
    Clip,
}

impl EntityKind {
    /// Dependency order full sync processes kinds in (§4.3):
    /// tag -> studio -> performer -> group -> gallery -> scene -> clip -> image.
    pub const SYNC_ORDER: [EntityKind; 8] = [
        EntityKind::Tag,
        EntityKind::Studio,
        EntityKind::Performer,
        EntityKind::Group,
        EntityKind::Gallery,
        EntityKind::Scene,
        EntityKind::Clip,
        EntityKind::Image,
    ];

    pub fn singular(self) -> &'static str {
        match self {
            EntityKind::Scene => "scene",
            EntityKind::Image => "image",
            EntityKind::Gallery => "gallery",
            EntityKind::Performer => "performer",
            EntityKind::Studio => "studio",
            EntityKind::Tag => "tag",
            EntityKind::Group => "group",
            EntityKind::Clip => "clip",
        }
    }

    pub fn plural(self) -> &'static str {
        match self {
            EntityKind::Scene => "scenes",
            EntityKind::Image => "images",
            EntityKind::Gallery => "galleries",
            EntityKind::Performer => "performers",
            EntityKind::Studio => "studios",
            EntityKind::Tag => "tags",
            EntityKind::Group => "groups",
            EntityKind::Clip => "clips",
        }
    }

    /// Mirror table name backing this kind (§4.2).
    pub fn table_name(self) -> &'static str {
        match self {
            EntityKind::Scene => "scenes",
            EntityKind::Image => "images",
            EntityKind::Gallery => "galleries",
            EntityKind::Performer => "performers",
            EntityKind::Studio => "studios",
            EntityKind::Tag => "tags",
            EntityKind::Group => "groups",
            EntityKind::Clip => "clips",
        }
    }

    /// Parses the plural form used by `UserContentRestriction.entityType`.
    pub fn from_plural(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.plural() == s)
    }

    /// Parses the singular form used by `UserHiddenEntity`/`UserExcludedEntity`.
    pub fn from_singular(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.singular() == s)
    }

    pub const ALL: [EntityKind; 8] = [
        EntityKind::Scene,
        EntityKind::Image,
        EntityKind::Gallery,
        EntityKind::Performer,
        EntityKind::Studio,
        EntityKind::Tag,
        EntityKind::Group,
        EntityKind::Clip,
    ];
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.singular())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plural_singular_roundtrip() {
        for kind in EntityKind::ALL {
            assert_eq!(EntityKind::from_plural(kind.plural()), Some(kind));
            assert_eq!(EntityKind::from_singular(kind.singular()), Some(kind));
        }
    }

    #[test]
    fn sync_order_covers_all_kinds() {
        let mut order = EntityKind::SYNC_ORDER.to_vec();
        order.sort();
        let mut all = EntityKind::ALL.to_vec();
        all.sort();
        assert_eq!(order, all);
    }
}
