use regex::Regex;
use std::sync::OnceLock;

use crate::models::{Identity, PageConfig};

fn url_subreddit_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/r+/([^/]+)/comments/[^/]+/[^/]+/?").expect("valid regex"))
}

fn url_thread_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/r+/[^/]+/comments/([^/]+)/[^/]+/?").expect("valid regex"))
}

fn cur_link_thread_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\S+_+(\S*)").expect("valid regex"))
}

/// A place identity can be read from. Each lookup may come up empty.
#[derive(Debug, Clone, Copy)]
pub enum IdentitySource<'a> {
    /// The `r.setup({...})` config object embedded in the page.
    PageConfig(&'a PageConfig),
    /// Positional patterns over the page URL.
    Url(&'a str),
}

impl IdentitySource<'_> {
    fn viewer_name(&self) -> Option<String> {
        match self {
            Self::PageConfig(config) => config.logged.clone(),
            Self::Url(_) => None,
        }
    }

    fn viewer_id(&self) -> Option<String> {
        match self {
            Self::PageConfig(config) => config.user_id.clone(),
            Self::Url(_) => None,
        }
    }

    fn subreddit(&self) -> Option<String> {
        match self {
            Self::PageConfig(config) => config.cur_listing.clone(),
            Self::Url(url) => first_capture(url_subreddit_re(), url),
        }
    }

    fn thread_id(&self) -> Option<String> {
        match self {
            Self::PageConfig(config) => config
                .cur_link
                .as_deref()
                .and_then(|link| first_capture(cur_link_thread_id_re(), link)),
            Self::Url(url) => first_capture(url_thread_id_re(), url),
        }
    }
}

fn first_capture(re: &Regex, haystack: &str) -> Option<String> {
    re.captures(haystack)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|s| !s.is_empty())
}

/// Resolves viewer and thread identity by trying each source in order.
pub struct IdentityResolver<'a> {
    sources: Vec<IdentitySource<'a>>,
}

impl<'a> IdentityResolver<'a> {
    pub fn new(sources: Vec<IdentitySource<'a>>) -> Self {
        Self { sources }
    }

    /// The usual order: page config first, URL patterns second.
    pub fn for_page(config: Option<&'a PageConfig>, url: &'a str) -> Self {
        let mut sources = Vec::with_capacity(2);
        if let Some(config) = config {
            sources.push(IdentitySource::PageConfig(config));
        }
        sources.push(IdentitySource::Url(url));
        Self::new(sources)
    }

    pub fn resolve(&self) -> Identity {
        let first = |f: fn(&IdentitySource<'a>) -> Option<String>| self.sources.iter().find_map(f);

        Identity {
            viewer_name: first(IdentitySource::viewer_name)
                .unwrap_or_else(|| Identity::ANONYMOUS_NAME.to_string()),
            viewer_id: first(IdentitySource::viewer_id)
                .unwrap_or_else(|| Identity::ANONYMOUS_ID.to_string()),
            subreddit: first(IdentitySource::subreddit),
            thread_id: first(IdentitySource::thread_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const THREAD_URL: &str = "https://old.reddit.com/r/rust/comments/abc123/some_title/";

    #[test]
    fn url_only_falls_back_to_anonymous_viewer() {
        let identity = IdentityResolver::for_page(None, THREAD_URL).resolve();
        assert_eq!(
            identity,
            Identity {
                viewer_name: "anonymous".to_string(),
                viewer_id: "0".to_string(),
                subreddit: Some("rust".to_string()),
                thread_id: Some("abc123".to_string()),
            }
        );
        assert!(identity.is_active());
    }

    #[test]
    fn page_config_wins_over_url() {
        let config = PageConfig {
            logged: Some("ferris".to_string()),
            user_id: Some("42".to_string()),
            cur_listing: Some("learnrust".to_string()),
            cur_link: Some("t3_zzz999".to_string()),
        };
        let identity = IdentityResolver::for_page(Some(&config), THREAD_URL).resolve();
        assert_eq!(identity.viewer_name, "ferris");
        assert_eq!(identity.viewer_id, "42");
        assert_eq!(identity.subreddit.as_deref(), Some("learnrust"));
        assert_eq!(identity.thread_id.as_deref(), Some("zzz999"));
    }

    #[test]
    fn partial_page_config_falls_through_per_field() {
        let config = PageConfig {
            logged: Some("ferris".to_string()),
            ..PageConfig::default()
        };
        let identity = IdentityResolver::for_page(Some(&config), THREAD_URL).resolve();
        assert_eq!(identity.viewer_name, "ferris");
        assert_eq!(identity.viewer_id, "0");
        assert_eq!(identity.subreddit.as_deref(), Some("rust"));
        assert_eq!(identity.thread_id.as_deref(), Some("abc123"));
    }

    #[test]
    fn non_thread_url_is_inactive() {
        let identity = IdentityResolver::for_page(None, "https://old.reddit.com/r/rust/").resolve();
        assert_eq!(identity.thread_id, None);
        assert!(!identity.is_active());
    }
}
