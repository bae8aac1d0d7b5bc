use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A social network the pipeline ingests from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Instagram,
    Tiktok,
    X,
}

#[derive(Debug, Error)]
#[error("unknown platform '{0}'; expected one of: instagram, tiktok, x")]
pub struct UnknownPlatform(pub String);

/// Substrings identifying provider-served placeholder avatars.
const INSTAGRAM_DEFAULT_AVATAR_MARKERS: &[&str] = &[
    "44884218_345707102882519_2446069589734326272_n",
    "/static/images/anonymoususer",
];
const TIKTOK_DEFAULT_AVATAR_MARKERS: &[&str] = &["tiktok.com/favicon.ico"];
const X_DEFAULT_AVATAR_MARKERS: &[&str] = &["abs.twimg.com/sticky/default_profile_images/"];

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Instagram, Platform::Tiktok, Platform::X];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Instagram => "instagram",
            Platform::Tiktok => "tiktok",
            Platform::X => "x",
        }
    }

    /// Canonical public profile URL for a handle (leading `@` is ignored).
    #[must_use]
    pub fn profile_url(self, handle: &str) -> String {
        let handle = handle.trim().trim_start_matches('@');
        match self {
            Platform::Instagram => format!("https://www.instagram.com/{handle}/"),
            Platform::Tiktok => format!("https://www.tiktok.com/@{handle}"),
            Platform::X => format!("https://x.com/{handle}"),
        }
    }

    /// Whether `url` points at the platform's generic "no photo" avatar.
    ///
    /// A blank URL counts as a default: there is nothing worth copying.
    #[must_use]
    pub fn is_default_avatar(self, url: &str) -> bool {
        let url = url.trim().to_lowercase();
        if url.is_empty() {
            return true;
        }
        let markers = match self {
            Platform::Instagram => INSTAGRAM_DEFAULT_AVATAR_MARKERS,
            Platform::Tiktok => TIKTOK_DEFAULT_AVATAR_MARKERS,
            Platform::X => X_DEFAULT_AVATAR_MARKERS,
        };
        markers.iter().any(|m| url.contains(m))
    }

    /// Rewrites thumbnail avatar URLs to the largest variant the CDN serves.
    #[must_use]
    pub fn upgrade_avatar_url(self, url: &str) -> String {
        match self {
            Platform::X => url.replace("_normal", "_400x400"),
            Platform::Instagram | Platform::Tiktok => url.to_string(),
        }
    }

    /// `Referer` sent when downloading avatars; some CDNs reject hotlinks without one.
    #[must_use]
    pub fn image_referer(self) -> &'static str {
        match self {
            Platform::Instagram => "https://www.instagram.com/",
            Platform::Tiktok => "https://www.tiktok.com/",
            Platform::X => "https://x.com/",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = UnknownPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "instagram" | "ig" => Ok(Platform::Instagram),
            "tiktok" => Ok(Platform::Tiktok),
            "x" | "twitter" => Ok(Platform::X),
            other => Err(UnknownPlatform(other.to_string())),
        }
    }
}
