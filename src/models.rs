/// Who is looking at which thread. Resolved from the page every time it is
/// needed and never persisted as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub viewer_name: String,
    pub viewer_id: String,
    pub subreddit: Option<String>,
    pub thread_id: Option<String>,
}

impl Identity {
    pub const ANONYMOUS_NAME: &'static str = "anonymous";
    pub const ANONYMOUS_ID: &'static str = "0";

    /// The core only runs when the thread can be identified.
    pub fn is_active(&self) -> bool {
        self.thread_id.as_deref().is_some_and(|id| !id.is_empty())
    }
}

/// One persisted last-visit marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: String,
    pub last_visit_unix: i64, // ms since epoch
}

#[derive(Debug, Clone)]
pub struct RedditComment {
    pub author: String,
    pub text: String,
    /// Raw `datetime` attribute of the comment's `<time>` element.
    pub timestamp: String,
    pub permalink: Option<String>,
    pub depth: usize,
}

/// A dated element the highlight engine can reconcile against.
pub trait DatedItem {
    fn timestamp(&self) -> &str;
}

impl DatedItem for RedditComment {
    fn timestamp(&self) -> &str {
        &self.timestamp
    }
}

impl DatedItem for &str {
    fn timestamp(&self) -> &str {
        self
    }
}

impl DatedItem for String {
    fn timestamp(&self) -> &str {
        self.as_str()
    }
}

/// Raw `r.setup({...})` values the page exposes about itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageConfig {
    pub logged: Option<String>,
    pub user_id: Option<String>,
    pub cur_listing: Option<String>,
    pub cur_link: Option<String>,
}

/// Everything the reader extracted from one thread page.
#[derive(Debug, Clone)]
pub struct ThreadPage {
    pub url: String,
    pub title: String,
    pub config: Option<PageConfig>,
    pub comments: Vec<RedditComment>,
}
