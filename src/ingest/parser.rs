//! Parsing adapter: turns a fetched feed document into tagged raw entries.
//!
//! Article-style feeds (RSS/Atom newsletters) go through `feed-rs`, which
//! already copes with both syndication formats and their date quirks.
//! Video-style feeds (YouTube channel Atom) carry `yt:` and `media:`
//! extension elements that a generic parser does not preserve, so those are
//! deserialized with a dedicated `quick-xml` mapping.
//!
//! The output is a tagged union: downstream normalization matches
//! exhaustively on the variant instead of probing optional nested fields at
//! runtime. Numeric statistics stay raw strings here — deciding what a
//! malformed `views="soon"` means is the normalizer's job.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// A raw feed entry, tagged by the kind of source that produced it.
#[derive(Debug, Clone)]
pub enum RawEntry {
    Article(ArticleEntry),
    Video(VideoEntry),
}

/// One entry from an article-style feed, fields as the document exposed them.
#[derive(Debug, Clone, Default)]
pub struct ArticleEntry {
    pub title: Option<String>,
    pub link: Option<String>,
    /// Strict timestamp (`<published>` / `<pubDate>`), already parsed.
    pub published: Option<DateTime<Utc>>,
    /// Fallback timestamp (`<updated>`).
    pub updated: Option<DateTime<Utc>>,
    pub summary: Option<String>,
    pub content: Option<String>,
}

/// One entry from a video-style feed, extension fields preserved.
#[derive(Debug, Clone, Default)]
pub struct VideoEntry {
    pub title: Option<String>,
    pub link: Option<String>,
    pub published: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
    /// `yt:videoId`, when the feed carries one.
    pub video_id: Option<String>,
    /// `media:group > media:description`.
    pub description: Option<String>,
    /// `media:statistics@views`, kept as the raw attribute string.
    pub views: Option<String>,
    /// `media:starRating@count` (the platform's like counter), raw string.
    pub rating_count: Option<String>,
}

// ============================================================================
// Article feeds (feed-rs)
// ============================================================================

/// Parse an RSS/Atom article feed into raw entries.
///
/// An empty-but-valid feed yields an empty `Vec`, not an error.
pub fn parse_article_feed(bytes: &[u8]) -> Result<Vec<RawEntry>> {
    let feed = feed_rs::parser::parse(bytes).context("parsing article feed")?;

    let entries = feed
        .entries
        .into_iter()
        .map(|entry| {
            let link = entry.links.first().map(|l| l.href.clone());
            RawEntry::Article(ArticleEntry {
                title: entry.title.map(|t| t.content),
                link,
                published: entry.published,
                updated: entry.updated,
                summary: entry.summary.map(|s| s.content),
                content: entry.content.and_then(|c| c.body),
            })
        })
        .collect();

    Ok(entries)
}

// ============================================================================
// Video feeds (quick-xml)
// ============================================================================

#[derive(Debug, Deserialize)]
struct VideoFeedDoc {
    #[serde(rename = "entry", default)]
    entries: Vec<VideoEntryXml>,
}

#[derive(Debug, Deserialize)]
struct VideoEntryXml {
    title: Option<String>,
    #[serde(rename = "link", default)]
    links: Vec<LinkXml>,
    published: Option<String>,
    updated: Option<String>,
    #[serde(rename = "videoId")]
    video_id: Option<String>,
    #[serde(rename = "group")]
    media_group: Option<MediaGroupXml>,
}

#[derive(Debug, Deserialize)]
struct LinkXml {
    #[serde(rename = "@rel")]
    rel: Option<String>,
    #[serde(rename = "@href")]
    href: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MediaGroupXml {
    #[serde(rename = "description")]
    description: Option<String>,
    #[serde(rename = "community")]
    community: Option<MediaCommunityXml>,
}

#[derive(Debug, Deserialize)]
struct MediaCommunityXml {
    #[serde(rename = "starRating")]
    star_rating: Option<StarRatingXml>,
    #[serde(rename = "statistics")]
    statistics: Option<StatisticsXml>,
}

#[derive(Debug, Deserialize)]
struct StarRatingXml {
    #[serde(rename = "@count")]
    count: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatisticsXml {
    #[serde(rename = "@views")]
    views: Option<String>,
}

/// Parse a video channel Atom feed, preserving `yt:`/`media:` extensions.
pub fn parse_video_feed(bytes: &[u8]) -> Result<Vec<RawEntry>> {
    let text = std::str::from_utf8(bytes).context("video feed is not valid UTF-8")?;
    let doc: VideoFeedDoc = quick_xml::de::from_str(text).context("parsing video feed")?;

    let entries = doc
        .entries
        .into_iter()
        .map(|entry| {
            // Prefer the rel="alternate" link (the watch page); feeds also
            // carry self/related links we do not want as the item key.
            let link = entry
                .links
                .iter()
                .find(|l| l.rel.as_deref() == Some("alternate"))
                .or_else(|| entry.links.first())
                .and_then(|l| l.href.clone());

            let (description, views, rating_count) = match entry.media_group {
                Some(group) => {
                    let (views, rating_count) = match group.community {
                        Some(community) => (
                            community.statistics.and_then(|s| s.views),
                            community.star_rating.and_then(|r| r.count),
                        ),
                        None => (None, None),
                    };
                    (group.description, views, rating_count)
                }
                None => (None, None, None),
            };

            RawEntry::Video(VideoEntry {
                title: entry.title,
                link,
                published: entry.published.as_deref().and_then(parse_date),
                updated: entry.updated.as_deref().and_then(parse_date),
                video_id: entry.video_id,
                description,
                views,
                rating_count,
            })
        })
        .collect();

    Ok(entries)
}

/// Parse a feed timestamp: RFC 3339 first, RFC 2822 as the loose fallback.
/// Anything else is absent — the normalizer substitutes ingestion time.
fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .or_else(|_| DateTime::parse_from_rfc2822(raw.trim()))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
