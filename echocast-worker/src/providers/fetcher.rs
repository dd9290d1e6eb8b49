//! HTML content fetcher
//!
//! Fetches a page over HTTP and extracts the readable article text:
//! scripts, styles and boilerplate regions are stripped, `<article>` and
//! `<main>` are preferred over the raw body, and paragraphs shorter than a
//! threshold are dropped as navigation noise.

use std::time::Duration;

use async_trait::async_trait;
use echocast_core::error::StageError;
use regex::Regex;

use super::{ContentFetcher, FetchedContent, truncate_chars};

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Paragraphs shorter than this are treated as navigation noise.
const MIN_PARAGRAPH_CHARS: usize = 20;

/// Extracted text is capped at this many characters.
const MAX_CONTENT_CHARS: usize = 50_000;

pub struct HtmlContentFetcher {
    client: reqwest::Client,
    title_re: Regex,
    h1_re: Regex,
    strip_re: Regex,
    article_re: Regex,
    main_re: Regex,
    body_re: Regex,
    paragraph_re: Regex,
    tag_re: Regex,
    whitespace_re: Regex,
}

impl HtmlContentFetcher {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            title_re: Regex::new(r"(?is)<title[^>]*>([^<]+)</title>")?,
            h1_re: Regex::new(r"(?is)<h1[^>]*>([^<]+)</h1>")?,
            strip_re: Regex::new(
                r"(?is)<script[^>]*>.*?</script>|<style[^>]*>.*?</style>|<nav[^>]*>.*?</nav>|<footer[^>]*>.*?</footer>|<aside[^>]*>.*?</aside>|<header[^>]*>.*?</header>",
            )?,
            article_re: Regex::new(r"(?is)<article[^>]*>(.*?)</article>")?,
            main_re: Regex::new(r"(?is)<main[^>]*>(.*?)</main>")?,
            body_re: Regex::new(r"(?is)<body[^>]*>(.*?)</body>")?,
            paragraph_re: Regex::new(r"(?is)<p[^>]*>(.*?)</p>")?,
            tag_re: Regex::new(r"<[^>]+>")?,
            whitespace_re: Regex::new(r"\s+")?,
        })
    }

    fn extract_title(&self, html: &str) -> String {
        for re in [&self.title_re, &self.h1_re] {
            if let Some(cap) = re.captures(html) {
                let title = self.clean_text(&cap[1]);
                if !title.is_empty() {
                    return title;
                }
            }
        }
        "Untitled".to_string()
    }

    fn extract_content(&self, html: &str) -> String {
        let stripped = self.strip_re.replace_all(html, "").into_owned();

        // Prefer semantic containers over the whole body.
        let region = match self
            .article_re
            .captures(&stripped)
            .or_else(|| self.main_re.captures(&stripped))
            .or_else(|| self.body_re.captures(&stripped))
        {
            Some(cap) => cap[1].to_string(),
            None => stripped.clone(),
        };

        let mut parts: Vec<String> = self
            .paragraph_re
            .captures_iter(&region)
            .map(|cap| self.clean_text(&cap[1]))
            .filter(|text| text.chars().count() > MIN_PARAGRAPH_CHARS)
            .collect();

        // Too few real paragraphs: fall back to sentence splitting over
        // the whole region.
        if parts.len() < 3 {
            let text = self.clean_text(&region);
            parts = text
                .split(['.', '!', '?', '。', '！', '？'])
                .map(|s| s.trim().to_string())
                .filter(|s| s.chars().count() > MIN_PARAGRAPH_CHARS)
                .collect();
        }

        let joined = parts.join("\n\n");
        let capped = truncate_chars(&joined, MAX_CONTENT_CHARS);
        if capped.len() < joined.len() {
            format!("{capped}...")
        } else {
            joined
        }
    }

    fn clean_text(&self, html: &str) -> String {
        let text = self.tag_re.replace_all(html, "");
        let text = decode_entities(&text);
        self.whitespace_re.replace_all(&text, " ").trim().to_string()
    }
}

#[async_trait]
impl ContentFetcher for HtmlContentFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedContent, StageError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| StageError::Fetch(format!("network error: {e}")))?;

        if !response.status().is_success() {
            return Err(StageError::Fetch(format!(
                "unexpected status {} from {url}",
                response.status()
            )));
        }

        let html = response
            .text()
            .await
            .map_err(|e| StageError::Fetch(format!("failed to read body: {e}")))?;

        let title = self.extract_title(&html);
        let text = self.extract_content(&html);

        if text.is_empty() {
            return Err(StageError::Fetch(
                "could not extract content from page".to_string(),
            ));
        }

        Ok(FetchedContent { title, text })
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetcher() -> HtmlContentFetcher {
        HtmlContentFetcher::new(Duration::from_secs(5)).unwrap()
    }

    const PAGE: &str = r#"
        <html><head><title>A Fine Article</title>
        <style>body { color: red }</style></head>
        <body>
        <nav><p>Home — About — Contact and other navigation links</p></nav>
        <article>
        <p>This is the first real paragraph of the article body text.</p>
        <p>And here comes a second paragraph with enough words in it.</p>
        <p>Finally a third paragraph so the extractor trusts the page.</p>
        <p>ok</p>
        </article>
        <footer><p>Copyright notice that should never appear in output</p></footer>
        </body></html>
    "#;

    #[test]
    fn test_extracts_title_from_title_tag() {
        assert_eq!(fetcher().extract_title(PAGE), "A Fine Article");
    }

    #[test]
    fn test_extracts_title_from_h1_fallback() {
        let html = "<html><body><h1> Fallback Heading </h1></body></html>";
        assert_eq!(fetcher().extract_title(html), "Fallback Heading");
    }

    #[test]
    fn test_untitled_when_no_heading() {
        assert_eq!(fetcher().extract_title("<p>nothing here</p>"), "Untitled");
    }

    #[test]
    fn test_extracts_article_paragraphs_only() {
        let content = fetcher().extract_content(PAGE);
        assert!(content.contains("first real paragraph"));
        assert!(content.contains("second paragraph"));
        // Navigation, footer, and too-short paragraphs are dropped.
        assert!(!content.contains("navigation links"));
        assert!(!content.contains("Copyright"));
        assert!(!content.contains("\n\nok"));
    }

    #[test]
    fn test_sentence_fallback_when_few_paragraphs() {
        let html = "<body>A page without paragraph markup. It still has a \
                    couple of reasonably long sentences to salvage. Short. \
                    This final sentence should also make it through fine.</body>";
        let content = fetcher().extract_content(html);
        assert!(content.contains("reasonably long sentences"));
        assert!(!content.contains("\n\nShort"));
    }

    #[test]
    fn test_entities_are_decoded() {
        let html = "<body><article><p>Fish &amp; chips &quot;again&quot; tonight, really &#39;nice&#39;.</p>\
                    <p>Second filler paragraph to satisfy the extractor here.</p>\
                    <p>Third filler paragraph to satisfy the extractor here.</p></article></body>";
        let content = fetcher().extract_content(html);
        assert!(content.contains(r#"Fish & chips "again""#));
    }

    #[test]
    fn test_long_content_is_capped_with_ellipsis() {
        let body: String = (0..4000)
            .map(|i| format!("<p>Paragraph {i} padded out to a usable length.</p>"))
            .collect();
        let html = format!("<body><article>{body}</article></body>");
        let content = fetcher().extract_content(&html);
        assert!(content.chars().count() <= MAX_CONTENT_CHARS + 3);
        assert!(content.ends_with("..."));
    }
}
