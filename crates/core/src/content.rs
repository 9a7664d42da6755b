//! Rendering content items into platform-neutral text, and the per-platform
//! transforms applied when a job is fanned out.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::settings::AutoPublishSettings;
use crate::types::ContentItem;

pub const ELLIPSIS: &str = "...";

static SCRIPT_OR_STYLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)\s*>").expect("valid regex")
});
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));
static BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// Platform-neutral text rendered from a content item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedContent {
    pub title: String,
    pub body: String,
    pub excerpt: String,
}

/// Remove markup and decode the handful of entities editors commonly emit.
pub fn strip_markup(html: &str) -> String {
    let without_blocks = SCRIPT_OR_STYLE.replace_all(html, "");
    let without_tags = TAG.replace_all(&without_blocks, "");
    let decoded = decode_entities(&without_tags);

    let lines: Vec<&str> = decoded.lines().map(str::trim).collect();
    let joined = lines.join("\n");
    BLANK_LINES.replace_all(joined.trim(), "\n\n").into_owned()
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#039;", "'")
        .replace("&amp;", "&")
}

/// Render the text that every platform job starts from.
///
/// The body is the stripped post body followed by the permalink; a
/// configured custom message is placed in front.
pub fn render(content: &ContentItem, settings: &AutoPublishSettings) -> RenderedContent {
    let mut sections = Vec::with_capacity(3);

    let custom = settings.custom_message.trim();
    if !custom.is_empty() {
        sections.push(custom.to_string());
    }
    let body = strip_markup(&content.body);
    if !body.is_empty() {
        sections.push(body);
    }
    sections.push(content.permalink.trim().to_string());

    RenderedContent {
        title: strip_markup(&content.title),
        body: sections.join("\n\n"),
        excerpt: strip_markup(&content.excerpt),
    }
}

/// Character limit enforced for a platform, if it has one.
pub fn platform_char_limit(platform: &str) -> Option<usize> {
    match platform.to_ascii_lowercase().as_str() {
        "twitter" | "x" => Some(280),
        "linkedin" => Some(3000),
        _ => None,
    }
}

/// Apply the platform's transform to already-stripped text.
///
/// Instagram captions and unknown platforms are passed through unchanged.
pub fn optimize_for_platform(content: &str, platform: &str) -> String {
    match platform_char_limit(platform) {
        Some(limit) => truncate_with_ellipsis(content, limit),
        None => content.to_string(),
    }
}

/// Truncate to at most `limit` characters, ending in [`ELLIPSIS`] when cut.
pub fn truncate_with_ellipsis(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let marker = ELLIPSIS.chars().count();
    if limit <= marker {
        return text.chars().take(limit).collect();
    }

    let mut truncated: String = text.chars().take(limit - marker).collect();
    truncated.push_str(ELLIPSIS);
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContentStatus;

    fn content(body: &str) -> ContentItem {
        ContentItem {
            id: 7,
            author_id: 1,
            site_id: 1,
            post_type: "post".to_string(),
            status: ContentStatus::Published,
            title: "<b>Hello</b> World".to_string(),
            body: body.to_string(),
            excerpt: "<p>Short &amp; sweet</p>".to_string(),
            permalink: "https://example.com/hello-world".to_string(),
            featured_media_id: None,
            category_ids: vec![],
            tags: vec![],
        }
    }

    #[test]
    fn test_strip_markup_removes_tags_and_scripts() {
        let html = "<p>Hi <em>there</em></p><script>alert('x')</script><style>p{}</style>";
        assert_eq!(strip_markup(html), "Hi there");
    }

    #[test]
    fn test_strip_markup_decodes_entities() {
        assert_eq!(strip_markup("Fish &amp; chips&nbsp;&lt;3"), "Fish & chips <3");
    }

    #[test]
    fn test_strip_markup_collapses_blank_lines() {
        assert_eq!(strip_markup("<p>one</p>\n\n\n\n<p>two</p>"), "one\n\ntwo");
    }

    #[test]
    fn test_render_appends_permalink() {
        let rendered = render(&content("<p>Body text</p>"), &AutoPublishSettings::default());
        assert_eq!(rendered.title, "Hello World");
        assert_eq!(rendered.body, "Body text\n\nhttps://example.com/hello-world");
        assert_eq!(rendered.excerpt, "Short & sweet");
    }

    #[test]
    fn test_render_prepends_custom_message() {
        let settings = AutoPublishSettings {
            custom_message: "New on the blog:".to_string(),
            ..Default::default()
        };
        let rendered = render(&content("Body"), &settings);
        assert_eq!(
            rendered.body,
            "New on the blog:\n\nBody\n\nhttps://example.com/hello-world"
        );
    }

    #[test]
    fn test_render_empty_body_is_just_permalink() {
        let rendered = render(&content(""), &AutoPublishSettings::default());
        assert_eq!(rendered.body, "https://example.com/hello-world");
    }

    #[test]
    fn test_twitter_truncates_to_exact_limit() {
        let long = "a".repeat(400);
        let out = optimize_for_platform(&long, "twitter");
        assert_eq!(out.chars().count(), 280);
        assert!(out.ends_with(ELLIPSIS));
    }

    #[test]
    fn test_twitter_leaves_short_text_alone() {
        let text = "b".repeat(280);
        assert_eq!(optimize_for_platform(&text, "twitter"), text);
    }

    #[test]
    fn test_linkedin_limit() {
        let long = "c".repeat(3500);
        let out = optimize_for_platform(&long, "linkedin");
        assert_eq!(out.chars().count(), 3000);
        assert!(out.ends_with(ELLIPSIS));

        let short = "c".repeat(2999);
        assert_eq!(optimize_for_platform(&short, "linkedin"), short);
    }

    #[test]
    fn test_instagram_and_unknown_pass_through() {
        let long = "d".repeat(5000);
        assert_eq!(optimize_for_platform(&long, "instagram"), long);
        assert_eq!(optimize_for_platform(&long, "mastodon"), long);
    }

    #[test]
    fn test_truncation_counts_characters_not_bytes() {
        let text = "é".repeat(300);
        let out = truncate_with_ellipsis(&text, 280);
        assert_eq!(out.chars().count(), 280);
        assert!(out.starts_with("éé"));
    }

    #[test]
    fn test_truncation_never_exceeds_tiny_limits() {
        assert_eq!(truncate_with_ellipsis("abcdef", 2), "ab");
        assert_eq!(truncate_with_ellipsis("abcdef", 4), "a...");
    }
}
