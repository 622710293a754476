use paceline_model::VideoId;
use serde::{Deserialize, Serialize};
use url::Url;

/// Recognises the target site's single-video pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchPageMatcher {
    /// Registrable domain; subdomains (`www.`, `m.`) match as well.
    pub host: String,
    /// Path of the single-video view.
    pub watch_path: String,
    /// Query parameter carrying the video id.
    pub video_param: String,
}

impl Default for WatchPageMatcher {
    fn default() -> Self {
        Self {
            host: "youtube.com".to_string(),
            watch_path: "/watch".to_string(),
            video_param: "v".to_string(),
        }
    }
}

impl WatchPageMatcher {
    /// True iff `raw` is an http(s) URL on the target host whose path is the
    /// watch view.
    pub fn is_watch_page(&self, raw: &str) -> bool {
        self.parse_on_site(raw).is_some_and(|url| url.path() == self.watch_path)
    }

    /// True for any page on the target host.
    pub fn is_on_site(&self, raw: &str) -> bool {
        self.parse_on_site(raw).is_some()
    }

    /// Video id from the query string of an on-site URL.
    pub fn video_id(&self, raw: &str) -> Option<VideoId> {
        let url = self.parse_on_site(raw)?;
        url.query_pairs()
            .find(|(key, _)| key == self.video_param.as_str())
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty())
            .map(VideoId::new)
    }

    fn parse_on_site(&self, raw: &str) -> Option<Url> {
        let url = Url::parse(raw).ok()?;
        if !matches!(url.scheme(), "http" | "https") {
            return None;
        }
        // Parsed hosts are already lowercase; configured ones may not be.
        let host = url.host_str()?;
        let site = self.host.to_ascii_lowercase();
        let on_site = host == site
            || host
                .strip_suffix(site.as_str())
                .is_some_and(|prefix| prefix.ends_with('.'));
        on_site.then_some(url)
    }
}

/// [`WatchPageMatcher::is_watch_page`] with the default site settings.
pub fn is_watch_page(url: &str) -> bool {
    WatchPageMatcher::default().is_watch_page(url)
}
