//! Normalization: raw feed entries become canonical items.
//!
//! Pure functions only — the ingestion timestamp used as the published-date
//! fallback is injected by the caller, so every branch here is testable
//! against literal fixtures.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use super::parser::{ArticleEntry, RawEntry, VideoEntry};
use super::thumbnail;
use crate::storage::{NormalizedItem, SourceKind};

/// Title used when the feed entry has none.
const UNTITLED: &str = "Untitled";

static TAG_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("tag pattern"));

/// Convert one raw entry into a canonical item.
///
/// Returns `None` when the entry has no non-empty link: such entries cannot
/// be deduplicated or stored and are skipped entirely. `now` is the
/// published-date fallback for entries whose timestamps are absent or
/// unparseable.
pub fn normalize(entry: RawEntry, now: DateTime<Utc>) -> Option<NormalizedItem> {
    match entry {
        RawEntry::Article(article) => normalize_article(article, now),
        RawEntry::Video(video) => normalize_video(video, now),
    }
}

fn normalize_article(entry: ArticleEntry, now: DateTime<Utc>) -> Option<NormalizedItem> {
    let link = non_empty(entry.link)?;

    // Word count comes from the richest text field available. A feed that
    // exposes no text at all yields an absent count, not zero — "no text"
    // and "empty text" are different upstream states.
    let text = entry.content.as_deref().or(entry.summary.as_deref());
    let word_count = text.map(count_words);

    let thumbnail = thumbnail::resolve(None, &link, text, SourceKind::Article);

    Some(NormalizedItem {
        title: non_empty(entry.title).unwrap_or_else(|| UNTITLED.to_string()),
        published: entry.published.or(entry.updated).unwrap_or(now),
        description: entry.summary.or(entry.content),
        thumbnail,
        view_count: None,
        like_count: None,
        word_count,
        link,
    })
}

fn normalize_video(entry: VideoEntry, now: DateTime<Utc>) -> Option<NormalizedItem> {
    let link = non_empty(entry.link)?;

    let explicit = entry
        .video_id
        .as_deref()
        .map(thumbnail::video_thumbnail_url);
    let thumbnail = thumbnail::resolve(explicit, &link, entry.description.as_deref(), SourceKind::Video);

    Some(NormalizedItem {
        title: non_empty(entry.title).unwrap_or_else(|| UNTITLED.to_string()),
        published: entry.published.or(entry.updated).unwrap_or(now),
        view_count: parse_stat(entry.views.as_deref()),
        like_count: parse_stat(entry.rating_count.as_deref()),
        word_count: None,
        description: entry.description,
        thumbnail,
        link,
    })
}

/// Strip markup, collapse whitespace, count the remaining tokens.
fn count_words(text: &str) -> u64 {
    let stripped = TAG_PATTERN.replace_all(text, " ");
    stripped.split_whitespace().count() as u64
}

/// Parse-or-absent: a statistic that is missing or malformed is unknown,
/// never zero. `parse::<u64>` also rejects negative values outright.
fn parse_stat(raw: Option<&str>) -> Option<u64> {
    raw.and_then(|s| s.trim().parse::<u64>().ok())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn video_entry() -> VideoEntry {
        VideoEntry {
            title: Some("A Video".to_string()),
            link: Some("https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string()),
            published: Some(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()),
            updated: None,
            video_id: Some("dQw4w9WgXcQ".to_string()),
            description: Some("About the video".to_string()),
            views: Some("1234".to_string()),
            rating_count: Some("56".to_string()),
        }
    }

    #[test]
    fn test_video_entry_extracts_statistics() {
        let item = normalize(RawEntry::Video(video_entry()), now()).unwrap();

        assert_eq!(item.view_count, Some(1234));
        assert_eq!(item.like_count, Some(56));
        assert_eq!(item.word_count, None, "videos never get a word count");
        assert_eq!(
            item.thumbnail.as_deref(),
            Some("https://img.youtube.com/vi/dQw4w9WgXcQ/mqdefault.jpg")
        );
    }

    #[test]
    fn test_article_entry_counts_words() {
        let entry = ArticleEntry {
            title: Some("Post".to_string()),
            link: Some("https://example.com/post".to_string()),
            content: Some("<p>Hello world</p>".to_string()),
            ..Default::default()
        };
        let item = normalize(RawEntry::Article(entry), now()).unwrap();

        assert_eq!(item.word_count, Some(2));
        assert_eq!(item.view_count, None);
        assert_eq!(item.like_count, None);
    }

    #[test]
    fn test_missing_link_discards_entry() {
        let entry = ArticleEntry {
            title: Some("Orphan".to_string()),
            link: None,
            ..Default::default()
        };
        assert!(normalize(RawEntry::Article(entry), now()).is_none());

        let entry = ArticleEntry {
            title: Some("Blank".to_string()),
            link: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(normalize(RawEntry::Article(entry), now()).is_none());
    }

    #[test]
    fn test_missing_title_gets_placeholder() {
        let entry = ArticleEntry {
            title: Some(String::new()),
            link: Some("https://example.com/post".to_string()),
            ..Default::default()
        };
        let item = normalize(RawEntry::Article(entry), now()).unwrap();
        assert_eq!(item.title, "Untitled");
    }

    #[test]
    fn test_published_falls_back_to_updated_then_now() {
        let strict = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let loose = Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap();

        let entry = ArticleEntry {
            link: Some("https://example.com/a".to_string()),
            published: Some(strict),
            updated: Some(loose),
            ..Default::default()
        };
        assert_eq!(normalize(RawEntry::Article(entry), now()).unwrap().published, strict);

        let entry = ArticleEntry {
            link: Some("https://example.com/b".to_string()),
            updated: Some(loose),
            ..Default::default()
        };
        assert_eq!(normalize(RawEntry::Article(entry), now()).unwrap().published, loose);

        let entry = ArticleEntry {
            link: Some("https://example.com/c".to_string()),
            ..Default::default()
        };
        assert_eq!(normalize(RawEntry::Article(entry), now()).unwrap().published, now());
    }

    #[test]
    fn test_malformed_statistics_are_absent_not_zero() {
        let mut entry = video_entry();
        entry.views = Some("not-a-number".to_string());
        entry.rating_count = Some("-5".to_string());

        let item = normalize(RawEntry::Video(entry), now()).unwrap();
        assert_eq!(item.view_count, None);
        assert_eq!(item.like_count, None);
    }

    #[test]
    fn test_empty_text_is_zero_words_but_absent_text_is_unknown() {
        // Present-but-empty markup strips down to zero words
        let entry = ArticleEntry {
            link: Some("https://example.com/empty".to_string()),
            content: Some("<p></p>".to_string()),
            ..Default::default()
        };
        let item = normalize(RawEntry::Article(entry), now()).unwrap();
        assert_eq!(item.word_count, Some(0));

        // No text field at all: the count is unknown
        let entry = ArticleEntry {
            link: Some("https://example.com/bare".to_string()),
            ..Default::default()
        };
        let item = normalize(RawEntry::Article(entry), now()).unwrap();
        assert_eq!(item.word_count, None);
    }

    #[test]
    fn test_description_prefers_summary_over_content() {
        let entry = ArticleEntry {
            link: Some("https://example.com/post".to_string()),
            summary: Some("short".to_string()),
            content: Some("long body".to_string()),
            ..Default::default()
        };
        let item = normalize(RawEntry::Article(entry), now()).unwrap();
        assert_eq!(item.description.as_deref(), Some("short"));
    }

    #[test]
    fn test_video_without_id_falls_back_to_link_extraction() {
        let mut entry = video_entry();
        entry.video_id = None;
        entry.link = Some("https://youtu.be/dQw4w9WgXcQ".to_string());

        let item = normalize(RawEntry::Video(entry), now()).unwrap();
        assert_eq!(
            item.thumbnail.as_deref(),
            Some("https://img.youtube.com/vi/dQw4w9WgXcQ/mqdefault.jpg")
        );
    }

    #[test]
    fn test_count_words_collapses_whitespace() {
        assert_eq!(count_words("one   two\n\nthree"), 3);
        assert_eq!(count_words("<div><span>one</span> two</div> three"), 3);
        assert_eq!(count_words(""), 0);
        assert_eq!(count_words("<br/>"), 0);
    }
}
