// tests/feed_sources.rs
// Both pollers against canned payloads, driven through the VideoSource
// trait the way the engine consumes them.

use skytube::source::{ApiSource, RssSource};
use skytube::video::{SourceKind, VideoSource};

const FEED: &str = include_str!("fixtures/youtube_feed.xml");
const PAGE: &str = include_str!("fixtures/playlist_items.json");

#[tokio::test]
async fn rss_fixture_yields_candidates_in_feed_order() {
    let source = RssSource::from_fixture(FEED);
    let videos = source.fetch_latest().await.unwrap();

    assert_eq!(source.kind(), SourceKind::Rss);
    let ids: Vec<&str> = videos.iter().map(|v| v.video_id.as_str()).collect();
    assert_eq!(ids, vec!["dQw4w9WgXcQ", "jNQXAC9IVRw"]);
    assert!(videos.iter().all(|v| v.source == SourceKind::Rss));
    assert!(videos.iter().all(|v| v.published_at.is_some()));
}

#[test]
fn api_page_parses_the_same_videos_with_richer_thumbnails() {
    let (videos, next) = ApiSource::parse_page(PAGE).unwrap();

    assert_eq!(next.as_deref(), Some("NEXT_PAGE_TOKEN"));
    let ids: Vec<&str> = videos.iter().map(|v| v.video_id.as_str()).collect();
    assert_eq!(ids, vec!["dQw4w9WgXcQ", "jNQXAC9IVRw"]);
    assert!(videos.iter().all(|v| v.source == SourceKind::Api));
    assert_eq!(
        videos[0].thumbnail_url.as_deref(),
        Some("https://i.ytimg.com/vi/dQw4w9WgXcQ/maxresdefault.jpg")
    );
}

#[test]
fn both_sources_agree_on_video_identity() {
    // The same physical uploads surfaced by both pollers carry the same
    // natural key, which is what reconciliation collapses on.
    let rss = RssSource::parse_feed(FEED).unwrap();
    let (api, _) = ApiSource::parse_page(PAGE).unwrap();

    let rss_ids: Vec<&str> = rss.iter().map(|v| v.video_id.as_str()).collect();
    let api_ids: Vec<&str> = api.iter().map(|v| v.video_id.as_str()).collect();
    assert_eq!(rss_ids, api_ids);
}
