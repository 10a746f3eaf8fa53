//! services/api/src/adapters/video_search.rs
//!
//! Implements the `VideoSearchService` port with the YouTube Data API search
//! endpoint. Every failure is logged and answered with an empty list.

use async_trait::async_trait;
use learnpath_core::domain::Video;
use learnpath_core::ports::VideoSearchService;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

const SEARCH_URL: &str = "https://www.googleapis.com/youtube/v3/search";
const MAX_RESULTS: u32 = 5;

#[derive(Clone)]
pub struct YoutubeSearchAdapter {
    http_client: reqwest::Client,
    api_key: Option<String>,
}

impl YoutubeSearchAdapter {
    pub fn new(api_key: Option<String>) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self { http_client, api_key }
    }

    async fn search(&self, api_key: &str, topic: &str) -> Result<Vec<Video>, String> {
        let max_results = MAX_RESULTS.to_string();
        let response = self
            .http_client
            .get(SEARCH_URL)
            .query(&[
                ("key", api_key),
                ("part", "snippet"),
                ("maxResults", max_results.as_str()),
                ("q", topic),
                ("type", "video"),
                ("videoDuration", "long"),
            ])
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("HTTP {} from video search", response.status()));
        }

        let body: SearchResponse = response.json().await.map_err(|e| e.to_string())?;
        Ok(videos_from_response(body))
    }
}

//=========================================================================================
// Response Shape
//=========================================================================================

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Deserialize)]
struct SearchItem {
    id: ItemId,
    snippet: Snippet,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemId {
    video_id: Option<String>,
}

#[derive(Deserialize)]
struct Snippet {
    title: String,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Deserialize, Default)]
struct Thumbnails {
    high: Option<Thumbnail>,
    default: Option<Thumbnail>,
}

#[derive(Deserialize)]
struct Thumbnail {
    url: String,
}

/// Items without a video id (channels, playlists) are dropped.
fn videos_from_response(body: SearchResponse) -> Vec<Video> {
    body.items
        .into_iter()
        .filter_map(|item| {
            let video_id = item.id.video_id?;
            let thumbnail = item
                .snippet
                .thumbnails
                .high
                .or(item.snippet.thumbnails.default)
                .map(|t| t.url);
            Some(Video {
                url: format!("https://www.youtube.com/watch?v={video_id}"),
                title: item.snippet.title,
                thumbnail,
            })
        })
        .collect()
}

#[async_trait]
impl VideoSearchService for YoutubeSearchAdapter {
    async fn search_videos(&self, topic: &str) -> Vec<Video> {
        let Some(api_key) = self.api_key.as_deref() else {
            debug!("No video search key configured, skipping lookup for '{}'", topic);
            return Vec::new();
        };

        match self.search(api_key, topic).await {
            Ok(videos) => videos,
            Err(e) => {
                warn!("Video search for '{}' failed: {}", topic, e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_search_items_to_videos() {
        let body: SearchResponse = serde_json::from_value(serde_json::json!({
            "items": [
                {
                    "id": {"kind": "youtube#video", "videoId": "abc123"},
                    "snippet": {
                        "title": "Rust in an hour",
                        "thumbnails": {"high": {"url": "https://i.ytimg.com/vi/abc123/hq.jpg"}}
                    }
                },
                {
                    "id": {"kind": "youtube#channel", "channelId": "chan"},
                    "snippet": {"title": "A channel"}
                },
                {
                    "id": {"videoId": "def456"},
                    "snippet": {"title": "No thumbnail"}
                }
            ]
        }))
        .unwrap();

        let videos = videos_from_response(body);
        assert_eq!(videos.len(), 2);
        assert_eq!(videos[0].url, "https://www.youtube.com/watch?v=abc123");
        assert_eq!(videos[0].thumbnail.as_deref(), Some("https://i.ytimg.com/vi/abc123/hq.jpg"));
        assert_eq!(videos[1].thumbnail, None);
    }

    #[tokio::test]
    async fn missing_key_yields_no_videos() {
        let adapter = YoutubeSearchAdapter::new(None);
        assert!(adapter.search_videos("rust").await.is_empty());
    }
}
