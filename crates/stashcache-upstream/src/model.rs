//! DTOs for items returned by an upstream (§3, §4.1). Fields are verbatim
//! copies of what the upstream reports -- no timezone normalization, no id
//! validation; that's C3's job once these cross into the mirror.

#[derive(Debug, Clone, Default)]
pub struct UpstreamScene {
    pub id: String,
    pub updated_at: String,
    pub title: Option<String>,
    pub code: Option<String>,
    pub date: Option<String>,
    pub details: Option<String>,
    pub director: Option<String>,
    pub studio_id: Option<String>,
    pub duration: Option<f64>,
    pub file_path: Option<String>,
    pub file_codec: Option<String>,
    pub file_width: Option<i64>,
    pub file_height: Option<i64>,
    pub file_bitrate: Option<i64>,
    pub file_size: Option<i64>,
    pub screenshot_path: Option<String>,
    pub preview_path: Option<String>,
    pub sprite_path: Option<String>,
    pub vtt_path: Option<String>,
    pub stream_path: Option<String>,
    pub captions_path: Option<String>,
    pub play_count: i64,
    pub phash: Option<String>,
    pub oshash: Option<String>,
    pub performer_ids: Vec<String>,
    pub tag_ids: Vec<String>,
    pub group_ids: Vec<String>,
    pub gallery_ids: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpstreamImage {
    pub id: String,
    pub updated_at: String,
    pub title: Option<String>,
    pub date: Option<String>,
    pub studio_id: Option<String>,
    pub photographer: Option<String>,
    pub details: Option<String>,
    pub file_path: Option<String>,
    pub file_size: Option<i64>,
    pub file_width: Option<i64>,
    pub file_height: Option<i64>,
    pub play_count: i64,
    pub performer_ids: Vec<String>,
    pub tag_ids: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpstreamGallery {
    pub id: String,
    pub updated_at: String,
    pub title: Option<String>,
    pub folder_path: Option<String>,
    pub cover_image_id: Option<String>,
    pub studio_id: Option<String>,
    pub date: Option<String>,
    pub photographer: Option<String>,
    pub details: Option<String>,
    pub performer_ids: Vec<String>,
    pub tag_ids: Vec<String>,
    /// The gallery owns the `gallery_images` junction on sync (§4.3 batch
    /// processor: the side whose upstream response names the membership).
    pub image_ids: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpstreamPerformer {
    pub id: String,
    pub updated_at: String,
    pub name: String,
    pub image_path: Option<String>,
    pub tag_ids: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpstreamStudio {
    pub id: String,
    pub updated_at: String,
    pub name: String,
    pub parent_id: Option<String>,
    pub image_path: Option<String>,
    pub tag_ids: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpstreamTag {
    pub id: String,
    pub updated_at: String,
    pub name: String,
    pub image_path: Option<String>,
    pub parent_ids: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpstreamGroup {
    pub id: String,
    pub updated_at: String,
    pub name: String,
    pub parent_id: Option<String>,
    pub image_path: Option<String>,
    pub tag_ids: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpstreamClip {
    pub id: String,
    pub updated_at: String,
    pub scene_id: String,
    pub title: Option<String>,
    pub seconds: f64,
    pub end_seconds: Option<f64>,
    pub primary_tag_id: Option<String>,
    pub preview_path: Option<String>,
    pub screenshot_path: Option<String>,
    pub stream_path: Option<String>,
    pub tag_ids: Vec<String>,
}

/// A kind-tagged item as returned by [`crate::UpstreamClient::find`].
#[derive(Debug, Clone)]
pub enum UpstreamItem {
    Scene(UpstreamScene),
    Image(UpstreamImage),
    Gallery(UpstreamGallery),
    Performer(UpstreamPerformer),
    Studio(UpstreamStudio),
    Tag(UpstreamTag),
    Group(UpstreamGroup),
    Clip(UpstreamClip),
}

impl UpstreamItem {
    pub fn id(&self) -> &str {
        match self {
            UpstreamItem::Scene(v) => &v.id,
            UpstreamItem::Image(v) => &v.id,
            UpstreamItem::Gallery(v) => &v.id,
            UpstreamItem::Performer(v) => &v.id,
            UpstreamItem::Studio(v) => &v.id,
            UpstreamItem::Tag(v) => &v.id,
            UpstreamItem::Group(v) => &v.id,
            UpstreamItem::Clip(v) => &v.id,
        }
    }

    pub fn updated_at(&self) -> &str {
        match self {
            UpstreamItem::Scene(v) => &v.updated_at,
            UpstreamItem::Image(v) => &v.updated_at,
            UpstreamItem::Gallery(v) => &v.updated_at,
            UpstreamItem::Performer(v) => &v.updated_at,
            UpstreamItem::Studio(v) => &v.updated_at,
            UpstreamItem::Tag(v) => &v.updated_at,
            UpstreamItem::Group(v) => &v.updated_at,
            UpstreamItem::Clip(v) => &v.updated_at,
        }
    }
}

/// A page of results plus the upstream's own total count (§4.1: "missing
/// count is a fatal error").
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: u64,
}

/// The minimal filter every upstream must support (§4.1).
#[derive(Debug, Clone, Default)]
pub struct Filter {
    pub updated_after: Option<String>,
}
