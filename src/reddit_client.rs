use anyhow::{anyhow, Context, Result};
use reqwest::blocking::Client;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::models::{PageConfig, RedditComment, ThreadPage};
use crate::settings::Settings;

#[derive(Clone)]
pub struct RedditClient {
    client: Client,
}

impl RedditClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .user_agent(settings.user_agent.as_str())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// Fetches a thread page. New reddit doesn't render comments server
    /// side, so `www.` links are rewritten to `old.`.
    pub fn fetch_thread(&self, url: &str) -> Result<ThreadPage> {
        let url = old_reddit_url(url.trim());
        let response = self.client.get(&url).send()?.error_for_status()?;
        let html = response.text()?;

        let page = parse_thread(&url, &html)?;
        info!(comments = page.comments.len(), "Loaded thread {}", url);
        Ok(page)
    }
}

/// Reads a thread page saved from the browser. `url` stands in for the
/// page's address when identity has to come from URL patterns.
pub fn load_saved_thread(path: &Path, url: &str) -> Result<ThreadPage> {
    let html = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    parse_thread(url, &html)
}

pub fn is_local_path(input: &str) -> bool {
    let input = input.trim();
    !input.starts_with("http://") && !input.starts_with("https://") && Path::new(input).exists()
}

pub fn old_reddit_url(url: &str) -> String {
    for host in ["://www.reddit.com/", "://reddit.com/", "://new.reddit.com/"] {
        if let Some(pos) = url.find(host) {
            return format!("{}://old.reddit.com/{}", &url[..pos], &url[pos + host.len()..]);
        }
    }
    url.to_string()
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("Selector error: {:?}", e))
}

pub fn parse_thread(url: &str, html: &str) -> Result<ThreadPage> {
    let document = Html::parse_document(html);

    let title = document
        .select(&selector("a.title")?)
        .next()
        .or_else(|| document.select(&selector("title").ok()?).next())
        .map(|e| html_escape::decode_html_entities(&e.text().collect::<String>()).trim().to_string())
        .unwrap_or_default();

    let config = document
        .select(&selector("script#config")?)
        .next()
        .and_then(|script| parse_page_config(&script.text().collect::<String>()));

    Ok(ThreadPage {
        url: url.to_string(),
        title,
        config,
        comments: parse_comments(&document)?,
    })
}

/// Extracts the fields the highlighter needs from `r.setup({...})`.
pub fn parse_page_config(script: &str) -> Option<PageConfig> {
    let start = script.find("r.setup(")? + "r.setup(".len();
    let end = script.rfind(')')?;
    if end <= start {
        return None;
    }

    let json: Value = match serde_json::from_str(script[start..end].trim()) {
        Ok(json) => json,
        Err(e) => {
            debug!("Page config is not valid JSON: {}", e);
            return None;
        }
    };

    // Scalars only; `logged` is `false` for anonymous viewers
    let field = |name: &str| match json.get(name)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    };

    Some(PageConfig {
        logged: field("logged"),
        user_id: field("user_id"),
        cur_listing: field("cur_listing"),
        cur_link: field("cur_link"),
    })
}

fn parse_comments(document: &Html) -> Result<Vec<RedditComment>> {
    let entry_selector = selector(".comment > .entry")?;
    let time_selector = selector("time")?;
    let author_selector = selector(".author")?;
    let body_selector = selector(".usertext-body .md")?;
    let permalink_selector = selector("a.bylink")?;

    let mut comments = Vec::new();
    for entry in document.select(&entry_selector) {
        let timestamp = entry
            .select(&time_selector)
            .next()
            .and_then(|time| time.value().attr("datetime"))
            .unwrap_or_default()
            .to_string();

        let author = entry
            .select(&author_selector)
            .next()
            .map(|e| e.text().collect::<String>())
            .unwrap_or_else(|| "[deleted]".to_string());

        let text = entry
            .select(&body_selector)
            .next()
            .map(|e| clean_text(&e.text().collect::<Vec<_>>().join(" ")))
            .unwrap_or_default();

        let permalink = entry
            .select(&permalink_selector)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(|href| {
                if href.starts_with('/') {
                    format!("https://old.reddit.com{}", href)
                } else {
                    href.to_string()
                }
            });

        comments.push(RedditComment {
            author,
            text,
            timestamp,
            permalink,
            depth: comment_depth(&entry),
        });
    }

    Ok(comments)
}

// Number of enclosing `.comment` elements minus the entry's own
fn comment_depth(entry: &ElementRef) -> usize {
    entry
        .ancestors()
        .filter_map(ElementRef::wrap)
        .filter(|e| e.value().has_class("comment", scraper::CaseSensitivity::AsciiCaseInsensitive))
        .count()
        .saturating_sub(1)
}

fn clean_text(text: &str) -> String {
    let decoded = html_escape::decode_html_entities(text);
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PAGE: &str = r#"<html><head><title>fallback title</title>
<script type="text/javascript" id="config">r.setup({"logged": "ferris", "user_id": 42, "cur_listing": "rust", "cur_link": "t3_abc123", "extra": {"a": "b)"}});</script>
</head><body>
<a class="title" href="/x">Why &amp; how</a>
<div class="commentarea"><div class="sitetable">
  <div class="comment">
    <div class="entry">
      <p class="tagline"><a class="author">alice</a> <time datetime="2020-05-01T12:00:00+00:00">1 hr</time></p>
      <div class="usertext-body"><div class="md"><p>top  level</p></div></div>
      <ul><li><a class="bylink" href="/r/rust/comments/abc123/x/c1/">permalink</a></li></ul>
    </div>
    <div class="child"><div class="sitetable">
      <div class="comment">
        <div class="entry">
          <p class="tagline"><a class="author">bob</a> <time datetime="2020-05-01T13:00:00+00:00">now</time></p>
          <div class="usertext-body"><div class="md"><p>reply</p></div></div>
        </div>
      </div>
    </div></div>
  </div>
  <div class="comment deleted">
    <div class="entry"><p class="tagline">[deleted]</p></div>
  </div>
</div></div>
</body></html>"#;

    #[test]
    fn parses_comments_in_document_order() {
        let page = parse_thread("https://old.reddit.com/r/rust/comments/abc123/x/", PAGE).unwrap();
        assert_eq!(page.title, "Why & how");
        assert_eq!(page.comments.len(), 3);

        let alice = &page.comments[0];
        assert_eq!(alice.author, "alice");
        assert_eq!(alice.text, "top level");
        assert_eq!(alice.depth, 0);
        assert_eq!(alice.timestamp, "2020-05-01T12:00:00+00:00");
        assert_eq!(
            alice.permalink.as_deref(),
            Some("https://old.reddit.com/r/rust/comments/abc123/x/c1/")
        );

        assert_eq!(page.comments[1].author, "bob");
        assert_eq!(page.comments[1].depth, 1);

        assert_eq!(page.comments[2].author, "[deleted]");
        assert_eq!(page.comments[2].timestamp, "");
    }

    #[test]
    fn parses_page_config() {
        let page = parse_thread("https://old.reddit.com/", PAGE).unwrap();
        assert_eq!(
            page.config,
            Some(PageConfig {
                logged: Some("ferris".to_string()),
                user_id: Some("42".to_string()),
                cur_listing: Some("rust".to_string()),
                cur_link: Some("t3_abc123".to_string()),
            })
        );
    }

    #[test]
    fn anonymous_config_has_no_viewer() {
        let config = parse_page_config(r#"r.setup({"logged": false, "cur_listing": "rust"})"#).unwrap();
        assert_eq!(config.logged, None);
        assert_eq!(config.cur_listing.as_deref(), Some("rust"));
    }

    #[test]
    fn broken_config_is_none() {
        assert_eq!(parse_page_config("r.setup({not json})"), None);
        assert_eq!(parse_page_config("var x = 1;"), None);
    }

    #[test]
    fn rewrites_to_old_reddit() {
        assert_eq!(
            old_reddit_url("https://www.reddit.com/r/rust/comments/abc/x/"),
            "https://old.reddit.com/r/rust/comments/abc/x/"
        );
        assert_eq!(
            old_reddit_url("https://old.reddit.com/r/rust/comments/abc/x/"),
            "https://old.reddit.com/r/rust/comments/abc/x/"
        );
    }
}
