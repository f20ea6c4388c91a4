use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    YouTube,
    Instagram,
    TikTok,
    Facebook,
    Spotify,
    X,
    Pinterest,
    SoundCloud,
}

impl Platform {
    pub const ALL: [Platform; 8] = [
        Platform::YouTube,
        Platform::Instagram,
        Platform::TikTok,
        Platform::Facebook,
        Platform::Spotify,
        Platform::X,
        Platform::Pinterest,
        Platform::SoundCloud,
    ];

    pub fn from_url(url: &str) -> Option<Self> {
        let parsed = url::Url::parse(url).ok()?;
        let host = parsed.host_str()?.to_lowercase();
        let host = host.trim_start_matches("www.").trim_start_matches("m.");

        let matches = |domains: &[&str]| {
            domains
                .iter()
                .any(|d| host == *d || host.ends_with(&format!(".{}", d)))
        };

        if matches(&["instagram.com", "instagr.am"]) {
            Some(Platform::Instagram)
        } else if matches(&["facebook.com", "fb.watch", "fb.com"]) {
            Some(Platform::Facebook)
        } else if matches(&["youtube.com", "youtu.be", "youtube-nocookie.com"]) {
            Some(Platform::YouTube)
        } else if matches(&["tiktok.com"]) {
            Some(Platform::TikTok)
        } else if matches(&["spotify.com"]) {
            Some(Platform::Spotify)
        } else if matches(&["pinterest.com", "pin.it"]) {
            Some(Platform::Pinterest)
        } else if matches(&["soundcloud.com"]) {
            Some(Platform::SoundCloud)
        } else if matches(&["twitter.com", "x.com"]) {
            Some(Platform::X)
        } else {
            None
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.key().eq_ignore_ascii_case(name.trim()))
    }

    /// Lowercase identifier used in cookie file names and settings.
    pub fn key(&self) -> &'static str {
        match self {
            Platform::YouTube => "youtube",
            Platform::Instagram => "instagram",
            Platform::TikTok => "tiktok",
            Platform::Facebook => "facebook",
            Platform::Spotify => "spotify",
            Platform::X => "x",
            Platform::Pinterest => "pinterest",
            Platform::SoundCloud => "soundcloud",
        }
    }

    pub fn folder_name(&self) -> &'static str {
        match self {
            Platform::YouTube => "YouTube",
            Platform::Instagram => "Instagram",
            Platform::TikTok => "TikTok",
            Platform::Facebook => "Facebook",
            Platform::Spotify => "Spotify",
            Platform::X => "X (Twitter)",
            Platform::Pinterest => "Pinterest",
            Platform::SoundCloud => "SoundCloud",
        }
    }

    /// Platforms whose sessions live in their own cookie file. Requests for
    /// these never fall back to the legacy global cookie file.
    pub fn has_dedicated_cookies(&self) -> bool {
        matches!(
            self,
            Platform::Instagram | Platform::Facebook | Platform::YouTube | Platform::TikTok
        )
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
