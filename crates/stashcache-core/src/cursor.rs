//! The upstream `updated_at` cursor policy (§4.3).
//!
//! The upstream returns `updated_at` as `YYYY-MM-DDTHH:MM:SS±HH:MM` with
//! sub-second precision truncated on output. Before it is used as a
//! `> cursor` filter value we strip the trailing timezone and pad the
//! seconds field to `.999`, so the next fetch never re-reads a row that
//! shares the same whole second as the stored cursor. The cursor persisted
//! in `SyncState`, by contrast, is the *raw* value as returned by the
//! upstream (never the padded filter form) -- it is parsed as an absolute
//! instant only when two raw cursors need to be compared or ordered.

use chrono::{DateTime, FixedOffset};
use snafu::{OptionExt as _, ResultExt as _, Snafu};

#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum CursorError {
    #[snafu(display("cursor {raw:?} has no timezone-bearing time component"))]
    NoTimeComponent { raw: String },
    #[snafu(display("cursor {raw:?} is not a valid RFC3339-ish instant: {source}"))]
    InvalidInstant {
        raw: String,
        source: chrono::ParseError,
    },
}

/// A raw `updated_at` string as returned verbatim by the upstream (§4.1).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Cursor(pub String);

impl Cursor {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Strips the trailing `Z`/`±HH:MM` and sets (or replaces) the
    /// fractional-seconds field to `.999`, producing the value to send as
    /// `updated_at > <filter_value>` to the upstream.
    pub fn to_filter_value(&self) -> Result<String, CursorError> {
        let raw = &self.0;
        let t_idx = raw.find('T').unwrap_or(0);
        let tail = &raw[t_idx..];
        let tz_rel_pos = tail
            .find(['+', '-', 'Z'])
            .context(NoTimeComponentSnafu { raw: raw.clone() })?;
        let without_tz = &raw[..t_idx + tz_rel_pos];

        let without_fraction = match without_tz.find('.') {
            Some(dot) => &without_tz[..dot],
            None => without_tz,
        };

        Ok(format!("{without_fraction}.999"))
    }

    /// Parses the raw value as an absolute instant, for comparing two
    /// stored cursors (§4.3: "stored cursors are parsed as absolute
    /// instants").
    pub fn parse_instant(&self) -> Result<DateTime<FixedOffset>, CursorError> {
        DateTime::parse_from_rfc3339(&self.0).context(InvalidInstantSnafu {
            raw: self.0.clone(),
        })
    }

    /// Returns whichever of `self`/`other` represents the later instant,
    /// by raw-string comparison (§4.3: "the maximum raw `updated_at`
    /// observed"). Falls back to string ordering if either side fails to
    /// parse, rather than panicking on a malformed upstream value.
    pub fn max<'a>(&'a self, other: &'a Cursor) -> &'a Cursor {
        match (self.parse_instant(), other.parse_instant()) {
            (Ok(a), Ok(b)) => {
                if a >= b {
                    self
                } else {
                    other
                }
            }
            _ => {
                if self.0 >= other.0 {
                    self
                } else {
                    other
                }
            }
        }
    }
}

impl AsRef<str> for Cursor {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_to_millis_999_and_strips_offset() {
        let c = Cursor::new("2025-01-10T12:00:00.5-08:00");
        assert_eq!(c.to_filter_value().unwrap(), "2025-01-10T12:00:00.999");
    }

    #[test]
    fn pads_when_no_fraction_present() {
        let c = Cursor::new("2025-01-10T12:00:00-08:00");
        assert_eq!(c.to_filter_value().unwrap(), "2025-01-10T12:00:00.999");
    }

    #[test]
    fn handles_z_suffix() {
        let c = Cursor::new("2025-01-10T12:00:00Z");
        assert_eq!(c.to_filter_value().unwrap(), "2025-01-10T12:00:00.999");
    }

    #[test]
    fn scenario_2_does_not_pick_up_same_second_update() {
        // SyncState cursor stored as "2025-01-10T12:00:00" (already stripped,
        // as if round-tripped). New scene's updated_at shares the same
        // whole second.
        let stored = Cursor::new("2025-01-10T12:00:00Z");
        let filter_value = stored.to_filter_value().unwrap();
        let new_scene_updated_at = "2025-01-10T12:00:00.5-08:00";
        assert!(new_scene_updated_at < filter_value.as_str());
    }

    #[test]
    fn max_picks_later_instant() {
        let a = Cursor::new("2025-01-10T12:00:00Z");
        let b = Cursor::new("2025-01-10T13:00:00Z");
        assert_eq!(a.max(&b).0, b.0);
        assert_eq!(b.max(&a).0, b.0);
    }
}
