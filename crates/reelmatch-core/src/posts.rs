use serde::{Deserialize, Serialize};

/// Pixel dimensions of a post's media. Either side may be unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl Dimensions {
    /// Returns `true` when neither side is known; serializes as `{}`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width.is_none() && self.height.is_none()
    }
}

/// Engagement metadata attached to a post.
///
/// Sources frequently omit fields (a photo post has no view count, a private
/// profile hides likes), so every field defaults to zero or empty rather than
/// being optional. Field names are part of the public JSON output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostMetadata {
    pub likes: u64,
    pub comments: u64,
    pub views: u64,
    /// Unix timestamp (seconds) of publication, `0` when unknown.
    pub posted_time: i64,
    /// Video length in seconds, `0.0` for non-video posts.
    pub video_duration: f64,
    pub dimensions: Dimensions,
    /// Number of encoded renditions the platform serves for the media.
    #[serde(rename = "numbers_of_qualities")]
    pub quality_count: u32,
}

/// A post returned by a post source for one account.
///
/// `shortcode` is the source's own identifier for the post; it may be blank
/// when the source only supplied a URL, in which case matching derives the
/// identifier from `url`. A blank `account` is filled in with the requested
/// account by the fetch task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedPost {
    #[serde(rename = "username", default)]
    pub account: String,
    #[serde(default)]
    pub shortcode: String,
    #[serde(default)]
    pub url: String,
    #[serde(flatten)]
    pub metadata: PostMetadata,
}

/// A requested target link confirmed present among an account's posts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedPost {
    #[serde(rename = "username")]
    pub account: String,
    /// The caller's original link, exactly as submitted (after trimming).
    pub target_link: String,
    pub matched_post_data: MatchedPostData,
}

/// Post data carried by a [`MatchedPost`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedPostData {
    pub url: String,
    pub shortcode: String,
    #[serde(flatten)]
    pub metadata: PostMetadata,
}

impl MatchedPost {
    /// Builds a match record for `post` under the canonical `shortcode`.
    #[must_use]
    pub fn new(post: &ScrapedPost, shortcode: &str, target_link: &str) -> Self {
        Self {
            account: post.account.clone(),
            target_link: target_link.to_owned(),
            matched_post_data: MatchedPostData {
                url: post.url.clone(),
                shortcode: shortcode.to_owned(),
                metadata: post.metadata.clone(),
            },
        }
    }
}
