use chrono::{DateTime, Utc};
use reelmatch_core::{Dimensions, PostMetadata, ScrapedPost};
use serde::{Deserialize, Serialize};

/// Input for the Instagram post-scraper actor.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct InstagramScraperInput {
    pub username: Vec<String>,
    #[serde(rename = "resultsLimit")]
    pub results_limit: usize,
}

/// Wrapper for Apify API responses.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiResponse<T> {
    pub data: T,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RunData {
    pub id: String,
    pub status: String,
    #[serde(rename = "defaultDatasetId")]
    pub default_dataset_id: String,
}

/// One row of the actor's output dataset.
///
/// Profiles the actor could not read produce an error row instead of posts.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum DatasetItem {
    Error(ErrorItem),
    Post(Box<InstagramPost>),
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorItem {
    pub error: String,
    #[serde(rename = "errorDescription", default)]
    pub error_description: Option<String>,
}

impl ErrorItem {
    pub fn is_not_found(&self) -> bool {
        self.error.eq_ignore_ascii_case("not_found")
    }

    pub fn describe(&self) -> String {
        match &self.error_description {
            Some(description) => format!("{}: {description}", self.error),
            None => self.error.clone(),
        }
    }
}

/// A single Instagram post from the Apify dataset.
///
/// Counts are signed: the actor reports `-1` when the profile hides them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct InstagramPost {
    #[serde(rename = "ownerUsername")]
    pub owner_username: Option<String>,
    pub url: Option<String>,
    #[serde(rename = "shortCode")]
    pub short_code: Option<String>,
    #[serde(rename = "likesCount")]
    pub likes_count: Option<i64>,
    #[serde(rename = "commentsCount")]
    pub comments_count: Option<i64>,
    #[serde(rename = "videoViewCount")]
    pub video_view_count: Option<i64>,
    #[serde(rename = "videoPlayCount")]
    pub video_play_count: Option<i64>,
    #[serde(rename = "videoDuration")]
    pub video_duration: Option<f64>,
    #[serde(rename = "dimensionsWidth")]
    pub dimensions_width: Option<u32>,
    #[serde(rename = "dimensionsHeight")]
    pub dimensions_height: Option<u32>,
    pub timestamp: Option<DateTime<Utc>>,
}

fn count(value: Option<i64>) -> u64 {
    value.and_then(|v| u64::try_from(v).ok()).unwrap_or(0)
}

impl InstagramPost {
    /// Converts the actor's row into a [`ScrapedPost`], attributing it to
    /// `account` when the row lacks an owner.
    pub fn into_scraped(self, account: &str) -> ScrapedPost {
        ScrapedPost {
            account: self
                .owner_username
                .filter(|owner| !owner.trim().is_empty())
                .unwrap_or_else(|| account.to_owned()),
            shortcode: self.short_code.unwrap_or_default(),
            url: self.url.unwrap_or_default(),
            metadata: PostMetadata {
                likes: count(self.likes_count),
                comments: count(self.comments_count),
                views: count(self.video_view_count.or(self.video_play_count)),
                posted_time: self.timestamp.map_or(0, |ts| ts.timestamp()),
                video_duration: self.video_duration.unwrap_or(0.0),
                dimensions: Dimensions {
                    width: self.dimensions_width,
                    height: self.dimensions_height,
                },
                quality_count: 0,
            },
        }
    }
}
