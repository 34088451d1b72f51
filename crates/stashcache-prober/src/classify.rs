//! Range-GET classifier (§4.7): tells a real preview clip apart from
//! the upstream's placeholder image without downloading the whole
//! file in the common case.

use md5::{Digest, Md5};
use reqwest::Client;
use snafu::ResultExt as _;
use tracing::debug;

use crate::error::{ProbeResult, RequestSnafu};
use crate::LOG_TARGET;

/// Byte length of the upstream's placeholder preview.
const PLACEHOLDER_LEN: u64 = 1199;
/// MD5 of the known placeholder body.
const PLACEHOLDER_MD5: &str = "c4a2e6b6547057dd0ef0c7d7e3c420d4";
/// Below this, a non-placeholder-length body is assumed to be a
/// placeholder variant too small to be a real preview.
const GENERATED_THRESHOLD: u64 = 5120;

/// What the length check alone can decide, or whether a full-body
/// fetch is needed to disambiguate (§4.7 step 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LengthVerdict {
    Generated,
    Placeholder,
    NeedsBodyCheck,
}

fn verdict_for_length(total: u64) -> LengthVerdict {
    if total != PLACEHOLDER_LEN {
        if total >= GENERATED_THRESHOLD {
            LengthVerdict::Generated
        } else {
            LengthVerdict::Placeholder
        }
    } else {
        LengthVerdict::NeedsBodyCheck
    }
}

/// A legitimate preview can happen to be exactly the placeholder's
/// length; only a full-body MD5 match disambiguates.
fn is_placeholder_body(body: &[u8]) -> bool {
    format!("{:x}", Md5::digest(body)) == PLACEHOLDER_MD5
}

/// Classifies `url`'s preview as "generated" (`true`) vs "placeholder"
/// (`false`). Only a transport failure is an `Err`; a non-success HTTP
/// status is a `false` classification, not an error (§4.7 step 1).
pub async fn is_generated(client: &Client, url: &str) -> ProbeResult<bool> {
    let response = client
        .get(url)
        .header("Range", "bytes=0-0")
        .send()
        .await
        .context(RequestSnafu { url: url.to_string() })?;

    if !response.status().is_success() {
        debug!(target: LOG_TARGET, %url, status = %response.status(), "non-success response, treating as placeholder");
        return Ok(false);
    }

    let Some(total) = total_length(&response) else {
        debug!(target: LOG_TARGET, %url, "no Content-Range/Content-Length header, treating as placeholder");
        return Ok(false);
    };

    match verdict_for_length(total) {
        LengthVerdict::Generated => Ok(true),
        LengthVerdict::Placeholder => Ok(false),
        LengthVerdict::NeedsBodyCheck => {
            let body = client
                .get(url)
                .send()
                .await
                .context(RequestSnafu { url: url.to_string() })?
                .bytes()
                .await
                .context(RequestSnafu { url: url.to_string() })?;
            Ok(!is_placeholder_body(&body))
        }
    }
}

fn total_length(response: &reqwest::Response) -> Option<u64> {
    if let Some(content_range) = response.headers().get(reqwest::header::CONTENT_RANGE) {
        let value = content_range.to_str().ok()?;
        let total = value.rsplit('/').next()?;
        return total.parse().ok();
    }
    response.headers().get(reqwest::header::CONTENT_LENGTH)?.to_str().ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_below_threshold_is_placeholder() {
        assert_eq!(verdict_for_length(512), LengthVerdict::Placeholder);
    }

    #[test]
    fn length_at_or_above_threshold_is_generated() {
        assert_eq!(verdict_for_length(GENERATED_THRESHOLD), LengthVerdict::Generated);
        assert_eq!(verdict_for_length(GENERATED_THRESHOLD + 1), LengthVerdict::Generated);
    }

    #[test]
    fn exact_placeholder_length_needs_body_check() {
        assert_eq!(verdict_for_length(PLACEHOLDER_LEN), LengthVerdict::NeedsBodyCheck);
    }

    #[test]
    fn placeholder_length_just_under_threshold_is_not_auto_generated() {
        // 1199 is below the 5120 threshold but is handled by the dedicated
        // NeedsBodyCheck branch, not folded into the plain size check.
        assert!(PLACEHOLDER_LEN < GENERATED_THRESHOLD);
        assert_ne!(verdict_for_length(PLACEHOLDER_LEN), LengthVerdict::Placeholder);
    }

    #[test]
    fn body_matching_known_placeholder_digest_is_detected() {
        // md5("") == d41d8cd98f00b204e9800998ecf8427e, not the placeholder
        // digest, so an empty body is correctly *not* flagged as the
        // placeholder -- only a body that actually hashes to
        // PLACEHOLDER_MD5 should be.
        assert!(!is_placeholder_body(b""));
    }
}
