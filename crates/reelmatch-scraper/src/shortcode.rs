//! Instagram post identifier ("shortcode") extraction.
//!
//! A shortcode is the path segment that follows a post-type marker in an
//! Instagram URL, e.g. `ABC123` in `https://www.instagram.com/reel/ABC123/`.
//! Two links that resolve to the same shortcode refer to the same post,
//! regardless of host, scheme, query string, or trailing slash.

use std::borrow::Borrow;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use reelmatch_core::ScrapedPost;
use serde::Serialize;

/// Post-type markers, in priority order. The earliest marker that matches
/// wins. The slash-less markers only match at the start of the input, so
/// a path segment merely ending in `p` or `reel` is not a marker.
/// `/reels/` and `/tv/` follow the four canonical shapes so they never
/// shadow them.
static SHORTCODE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"/reel/([^/?#]+)",
        r"/p/([^/?#]+)",
        r"^reel/([^/?#]+)",
        r"^p/([^/?#]+)",
        r"/reels/([^/?#]+)",
        r"/tv/([^/?#]+)",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("valid shortcode regex"))
    .collect()
});

/// Canonical post identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Shortcode(String);

impl Shortcode {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical identifier for a scraped post.
    ///
    /// Prefers the source-supplied shortcode and falls back to extracting it
    /// from the post URL when the source left it blank.
    #[must_use]
    pub fn from_post(post: &ScrapedPost) -> Option<Self> {
        let supplied = post.shortcode.trim();
        if supplied.is_empty() {
            extract_shortcode(Some(&post.url))
        } else {
            Some(Self(supplied.to_owned()))
        }
    }
}

impl fmt::Display for Shortcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Shortcode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Shortcode {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Extracts the shortcode from a post link.
///
/// Returns `None` for a missing or blank input, or when no known post-type
/// marker is followed by a non-empty segment. Never fails.
#[must_use]
pub fn extract_shortcode(raw: Option<&str>) -> Option<Shortcode> {
    let link = raw?.trim();
    if link.is_empty() {
        return None;
    }

    SHORTCODE_PATTERNS.iter().find_map(|re| {
        re.captures(link)
            .and_then(|caps| caps.get(1))
            .map(|m| Shortcode(m.as_str().to_owned()))
    })
}

#[cfg(test)]
#[path = "shortcode_test.rs"]
mod tests;
