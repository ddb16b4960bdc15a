//! Best-effort thumbnail derivation.
//!
//! All matching here runs against untrusted feed text: a failed or
//! nonsensical match yields `None`, never an error.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::storage::SourceKind;

/// Recognized watch-page URL shapes carrying an 11-character video id.
static LINK_ID_PATTERNS: Lazy<[Regex; 2]> = Lazy::new(|| {
    [
        Regex::new(r"(?:youtube\.com/watch\?v=|youtu\.be/|youtube\.com/embed/)([A-Za-z0-9_-]{11})")
            .expect("link id pattern"),
        Regex::new(r"youtube\.com/v/([A-Za-z0-9_-]{11})").expect("legacy link id pattern"),
    ]
});

/// The subset of shapes worth scanning for inside embedded markup.
static CONTENT_ID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:youtube\.com/watch\?v=|youtu\.be/)([A-Za-z0-9_-]{11})")
        .expect("content id pattern")
});

static IMG_SRC_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<img[^>]+src="([^"]+)""#).expect("img src pattern"));

/// Preview image URL for a video id, using the platform's fixed convention.
pub(crate) fn video_thumbnail_url(video_id: &str) -> String {
    format!("https://img.youtube.com/vi/{video_id}/mqdefault.jpg")
}

/// Resolve a thumbnail for an item, stopping at the first hit:
///
/// 1. an explicit thumbnail the normalizer already extracted
/// 2. (video sources) a video id recognized in the item link
/// 3. a video id recognized anywhere in the embedded content
/// 4. the first `<img src="...">` in the embedded content, verbatim
/// 5. nothing
pub fn resolve(
    explicit: Option<String>,
    link: &str,
    content: Option<&str>,
    kind: SourceKind,
) -> Option<String> {
    if explicit.is_some() {
        return explicit;
    }

    if kind == SourceKind::Video {
        if let Some(id) = video_id_from_link(link) {
            return Some(video_thumbnail_url(id));
        }
    }

    let content = content?;
    if let Some(id) = video_id_from_content(content) {
        return Some(video_thumbnail_url(id));
    }

    IMG_SRC_PATTERN
        .captures(content)
        .map(|caps| caps[1].to_string())
}

fn video_id_from_link(link: &str) -> Option<&str> {
    LINK_ID_PATTERNS
        .iter()
        .find_map(|re| re.captures(link).and_then(|caps| caps.get(1)))
        .map(|m| m.as_str())
}

fn video_id_from_content(content: &str) -> Option<&str> {
    CONTENT_ID_PATTERN
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_explicit_thumbnail_wins() {
        let resolved = resolve(
            Some("https://cdn.example.com/cover.png".to_string()),
            "https://youtu.be/dQw4w9WgXcQ",
            Some(r#"<img src="https://elsewhere.example/pic.jpg">"#),
            SourceKind::Video,
        );
        assert_eq!(resolved.as_deref(), Some("https://cdn.example.com/cover.png"));
    }

    #[test]
    fn test_short_link_form_resolves_for_video_kind() {
        let resolved = resolve(None, "https://youtu.be/dQw4w9WgXcQ", None, SourceKind::Video);
        assert_eq!(
            resolved.as_deref(),
            Some("https://img.youtube.com/vi/dQw4w9WgXcQ/mqdefault.jpg")
        );
    }

    #[test]
    fn test_all_link_forms_recognized() {
        for link in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
            "https://www.youtube.com/v/dQw4w9WgXcQ",
        ] {
            assert_eq!(video_id_from_link(link), Some("dQw4w9WgXcQ"), "link: {link}");
        }
    }

    #[test]
    fn test_link_extraction_only_for_video_kind() {
        let resolved = resolve(None, "https://youtu.be/dQw4w9WgXcQ", None, SourceKind::Article);
        assert_eq!(resolved, None);
    }

    #[test]
    fn test_content_video_id_beats_img_tag() {
        let content = r#"<img src="https://cdn.example.com/header.png">
            <a href="https://www.youtube.com/watch?v=dQw4w9WgXcQ">watch</a>"#;
        let resolved = resolve(None, "https://example.com/post", Some(content), SourceKind::Article);
        assert_eq!(
            resolved.as_deref(),
            Some("https://img.youtube.com/vi/dQw4w9WgXcQ/mqdefault.jpg")
        );
    }

    #[test]
    fn test_img_tag_fallback() {
        let content = r#"<p>intro</p><img class="hero" src="https://cdn.example.com/hero.jpg" alt="">"#;
        let resolved = resolve(None, "https://example.com/post", Some(content), SourceKind::Article);
        assert_eq!(resolved.as_deref(), Some("https://cdn.example.com/hero.jpg"));
    }

    #[test]
    fn test_no_match_is_absent() {
        assert_eq!(
            resolve(None, "https://example.com/post", Some("plain text"), SourceKind::Article),
            None
        );
        assert_eq!(resolve(None, "", None, SourceKind::Video), None);
    }

    #[test]
    fn test_short_id_is_not_matched() {
        // Ten characters, one short of a valid id
        assert_eq!(video_id_from_link("https://youtu.be/abcdefghij"), None);
    }

    proptest! {
        #[test]
        fn resolve_never_panics_on_arbitrary_text(link in ".*", content in ".*") {
            let _ = resolve(None, &link, Some(&content), SourceKind::Video);
            let _ = resolve(None, &link, Some(&content), SourceKind::Article);
        }
    }
}
