//! Channel display-name extraction.

use paceline_contracts::page::PageDom;
use paceline_model::ChannelName;

/// Layout variants the site has used for the owner name, most specific first.
pub const CHANNEL_SELECTORS: [&str; 4] = [
    "ytd-video-owner-renderer #channel-name a",
    "#owner-name a",
    "ytd-channel-name a",
    "[itemprop=\"author\"] [itemprop=\"name\"]",
];

/// Finds the channel of the current video by trying each selector in turn.
#[derive(Debug, Clone)]
pub struct ChannelResolver {
    selectors: Vec<String>,
}

impl Default for ChannelResolver {
    fn default() -> Self {
        Self::with_selectors(CHANNEL_SELECTORS)
    }
}

impl ChannelResolver {
    pub fn with_selectors<I, T>(selectors: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            selectors: selectors.into_iter().map(Into::into).collect(),
        }
    }

    /// First non-empty trimmed match. `None` is the normal answer while the
    /// page is still rendering.
    pub fn resolve<D: PageDom + ?Sized>(&self, dom: &D) -> Option<ChannelName> {
        self.selectors.iter().find_map(|selector| {
            let text = dom.text_content(selector)?;
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| ChannelName::new(trimmed))
        })
    }
}
