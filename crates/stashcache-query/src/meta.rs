//! Per-kind column/junction/sort metadata (§4.5): the "closed set per
//! kind" the builder validates filter fields and sort keys against. One
//! [`KindMeta`] per browsable kind, looked up by [`meta`].

use stashcache_core::EntityKind;

/// A junction table joining this kind to `other_kind`. Some joins are a
/// union of two tables (e.g. a scene's tags are `scene_tags` plus the
/// denormalized `scene_inherited_tags` rollup, §4.3/§4.4.1) -- `tables`
/// carries every `(table, self_id_col, self_instance_col, other_id_col,
/// other_instance_col)` to union.
pub struct JunctionDef {
    pub other_kind: EntityKind,
    pub tables: &'static [(&'static str, &'static str, &'static str, &'static str, &'static str)],
}

pub struct KindMeta {
    pub kind: EntityKind,
    pub table: &'static str,
    pub text_fields: &'static [&'static str],
    pub numeric_fields: &'static [&'static str],
    pub date_fields: &'static [&'static str],
    pub search_fields: &'static [&'static str],
    pub sort_map: &'static [(&'static str, &'static str)],
    pub default_sort: &'static str,
    pub junctions: &'static [JunctionDef],
    pub has_studio: bool,
    /// Name/title column used as the secondary sort tie-break (§4.5:
    /// "secondary tie-break by name then id"); `None` for kinds with no
    /// name-like column (clips).
    pub name_column: Option<&'static str>,
    /// Columns holding an upstream media URL (§4.8) -- these, and only
    /// these, get rewritten through C9 before a row leaves the process.
    pub media_fields: &'static [&'static str],
}

impl KindMeta {
    pub fn text_column(&self, field: &str) -> Option<&'static str> {
        self.text_fields.iter().copied().find(|f| *f == field)
    }

    pub fn numeric_column(&self, field: &str) -> Option<&'static str> {
        self.numeric_fields.iter().copied().find(|f| *f == field)
    }

    pub fn date_column(&self, field: &str) -> Option<&'static str> {
        self.date_fields.iter().copied().find(|f| *f == field)
    }

    pub fn sort_column(&self, key: &str) -> &'static str {
        self.sort_map
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, col)| *col)
            .unwrap_or(self.default_sort)
    }

    pub fn junction(&self, other_kind: EntityKind) -> Option<&'static JunctionDef> {
        self.junctions.iter().find(|j| j.other_kind == other_kind)
    }
}

const SCENE_JUNCTIONS: &[JunctionDef] = &[
    JunctionDef {
        other_kind: EntityKind::Performer,
        tables: &[("scene_performers", "scene_id", "scene_instance", "performer_id", "performer_instance")],
    },
    JunctionDef {
        other_kind: EntityKind::Tag,
        tables: &[
            ("scene_tags", "scene_id", "scene_instance", "tag_id", "tag_instance"),
            ("scene_inherited_tags", "scene_id", "scene_instance", "tag_id", "tag_instance"),
        ],
    },
    JunctionDef {
        other_kind: EntityKind::Group,
        tables: &[("scene_groups", "scene_id", "scene_instance", "group_id", "group_instance")],
    },
    JunctionDef {
        other_kind: EntityKind::Gallery,
        tables: &[("scene_galleries", "scene_id", "scene_instance", "gallery_id", "gallery_instance")],
    },
];

const GALLERY_JUNCTIONS: &[JunctionDef] = &[
    JunctionDef {
        other_kind: EntityKind::Performer,
        tables: &[("gallery_performers", "gallery_id", "gallery_instance", "performer_id", "performer_instance")],
    },
    JunctionDef {
        other_kind: EntityKind::Tag,
        tables: &[("gallery_tags", "gallery_id", "gallery_instance", "tag_id", "tag_instance")],
    },
    JunctionDef {
        other_kind: EntityKind::Image,
        tables: &[("gallery_images", "gallery_id", "gallery_instance", "image_id", "image_instance")],
    },
];

const PERFORMER_JUNCTIONS: &[JunctionDef] = &[JunctionDef {
    other_kind: EntityKind::Tag,
    tables: &[("performer_tags", "performer_id", "performer_instance", "tag_id", "tag_instance")],
}];

const STUDIO_JUNCTIONS: &[JunctionDef] = &[JunctionDef {
    other_kind: EntityKind::Tag,
    tables: &[("studio_tags", "studio_id", "studio_instance", "tag_id", "tag_instance")],
}];

const GROUP_JUNCTIONS: &[JunctionDef] = &[JunctionDef {
    other_kind: EntityKind::Tag,
    tables: &[("group_tags", "group_id", "group_instance", "tag_id", "tag_instance")],
}];

const IMAGE_JUNCTIONS: &[JunctionDef] = &[
    JunctionDef {
        other_kind: EntityKind::Performer,
        tables: &[("image_performers", "image_id", "image_instance", "performer_id", "performer_instance")],
    },
    JunctionDef {
        other_kind: EntityKind::Tag,
        tables: &[("image_tags", "image_id", "image_instance", "tag_id", "tag_instance")],
    },
];

const CLIP_JUNCTIONS: &[JunctionDef] = &[JunctionDef {
    other_kind: EntityKind::Tag,
    tables: &[("clip_tags", "clip_id", "clip_instance", "tag_id", "tag_instance")],
}];

pub fn meta(kind: EntityKind) -> KindMeta {
    match kind {
        EntityKind::Scene => KindMeta {
            kind,
            table: "scenes",
            text_fields: &["title", "code", "details", "director", "file_path"],
            numeric_fields: &["duration", "play_count", "file_size", "file_width", "file_height", "file_bitrate"],
            date_fields: &["date"],
            search_fields: &["title", "code", "details", "director"],
            sort_map: &[
                ("title", "scenes.title COLLATE NOCASE"),
                ("date", "scenes.date"),
                ("duration", "scenes.duration"),
                ("play_count", "scenes.play_count"),
                ("rating", "overlay.rating"),
                ("updated_at", "scenes.updated_at"),
            ],
            default_sort: "scenes.date",
            junctions: SCENE_JUNCTIONS,
            has_studio: true,
            name_column: Some("scenes.title"),
            media_fields: &["screenshot_path", "preview_path", "sprite_path", "vtt_path", "stream_path", "captions_path"],
        },
        EntityKind::Image => KindMeta {
            kind,
            table: "images",
            text_fields: &["title", "photographer", "details", "file_path"],
            numeric_fields: &["file_size", "file_width", "file_height", "play_count"],
            date_fields: &["date"],
            search_fields: &["title", "photographer", "details"],
            sort_map: &[
                ("title", "images.title COLLATE NOCASE"),
                ("date", "images.date"),
                ("rating", "overlay.rating"),
                ("updated_at", "images.updated_at"),
            ],
            default_sort: "images.title COLLATE NOCASE",
            junctions: IMAGE_JUNCTIONS,
            has_studio: true,
            name_column: Some("images.title"),
            media_fields: &["file_path"],
        },
        EntityKind::Gallery => KindMeta {
            kind,
            table: "galleries",
            text_fields: &["title", "folder_path", "photographer", "details"],
            numeric_fields: &[],
            date_fields: &["date"],
            search_fields: &["title", "folder_path", "photographer", "details"],
            sort_map: &[
                ("title", "galleries.title COLLATE NOCASE"),
                ("date", "galleries.date"),
                ("rating", "overlay.rating"),
                ("updated_at", "galleries.updated_at"),
            ],
            default_sort: "galleries.title COLLATE NOCASE",
            junctions: GALLERY_JUNCTIONS,
            has_studio: true,
            name_column: Some("galleries.title"),
            media_fields: &[],
        },
        EntityKind::Performer => KindMeta {
            kind,
            table: "performers",
            text_fields: &["name"],
            numeric_fields: &["scene_count", "image_count", "image_count_via_gallery"],
            date_fields: &[],
            search_fields: &["name"],
            sort_map: &[
                ("name", "performers.name COLLATE NOCASE"),
                ("scene_count", "performers.scene_count"),
                ("rating", "overlay.rating"),
                ("updated_at", "performers.updated_at"),
            ],
            default_sort: "performers.name COLLATE NOCASE",
            junctions: PERFORMER_JUNCTIONS,
            has_studio: false,
            name_column: Some("performers.name"),
            media_fields: &["image_path"],
        },
        EntityKind::Studio => KindMeta {
            kind,
            table: "studios",
            text_fields: &["name"],
            numeric_fields: &["scene_count", "image_count"],
            date_fields: &[],
            search_fields: &["name"],
            sort_map: &[
                ("name", "studios.name COLLATE NOCASE"),
                ("scene_count", "studios.scene_count"),
                ("rating", "overlay.rating"),
                ("updated_at", "studios.updated_at"),
            ],
            default_sort: "studios.name COLLATE NOCASE",
            junctions: STUDIO_JUNCTIONS,
            has_studio: false,
            name_column: Some("studios.name"),
            media_fields: &["image_path"],
        },
        EntityKind::Tag => KindMeta {
            kind,
            table: "tags",
            text_fields: &["name"],
            numeric_fields: &["scene_count", "scene_count_via_performer"],
            date_fields: &[],
            search_fields: &["name"],
            sort_map: &[
                ("name", "tags.name COLLATE NOCASE"),
                ("scene_count", "tags.scene_count"),
                ("rating", "overlay.rating"),
                ("updated_at", "tags.updated_at"),
            ],
            default_sort: "tags.name COLLATE NOCASE",
            junctions: &[],
            has_studio: false,
            name_column: Some("tags.name"),
            media_fields: &["image_path"],
        },
        EntityKind::Group => KindMeta {
            kind,
            table: "groups",
            text_fields: &["name"],
            numeric_fields: &["scene_count"],
            date_fields: &[],
            search_fields: &["name"],
            sort_map: &[
                ("name", "groups.name COLLATE NOCASE"),
                ("scene_count", "groups.scene_count"),
                ("rating", "overlay.rating"),
                ("updated_at", "groups.updated_at"),
            ],
            default_sort: "groups.name COLLATE NOCASE",
            junctions: GROUP_JUNCTIONS,
            has_studio: false,
            name_column: Some("groups.name"),
            media_fields: &["image_path"],
        },
        EntityKind::Clip => KindMeta {
            kind,
            table: "clips",
            text_fields: &["title"],
            numeric_fields: &["seconds", "end_seconds"],
            date_fields: &[],
            search_fields: &["title"],
            sort_map: &[("title", "clips.title COLLATE NOCASE"), ("seconds", "clips.seconds"), ("updated_at", "clips.updated_at")],
            default_sort: "clips.seconds",
            junctions: CLIP_JUNCTIONS,
            has_studio: false,
            name_column: None,
            media_fields: &["preview_path", "screenshot_path", "stream_path"],
        },
    }
}
