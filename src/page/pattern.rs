//! Playback-page URL matching

use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

pub const DEFAULT_HOST: &str = "www.youtube.com";
pub const DEFAULT_WATCH_PATH: &str = "/watch";

/// Which URLs count as a playback (watch) page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackPagePattern {
    /// Exact hostname of the video site
    pub host: String,
    /// Fragment the path must contain
    pub watch_path: String,
}

impl Default for PlaybackPagePattern {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            watch_path: DEFAULT_WATCH_PATH.to_string(),
        }
    }
}

impl PlaybackPagePattern {
    pub fn new(host: impl Into<String>, watch_path: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            watch_path: watch_path.into(),
        }
    }

    /// Check a full URL against the pattern
    ///
    /// Unparseable URLs never match.
    pub fn matches(&self, url: &str) -> bool {
        match Url::parse(url) {
            Ok(url) => {
                url.host_str() == Some(self.host.as_str()) && self.matches_path(url.path())
            }
            Err(e) => {
                warn!("Invalid URL {:?}: {}", url, e);
                false
            }
        }
    }

    /// Check only the path component
    pub fn matches_path(&self, path: &str) -> bool {
        path.contains(&self.watch_path)
    }
}
