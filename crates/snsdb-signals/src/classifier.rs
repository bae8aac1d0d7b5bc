//! Heuristics deciding whether a scraped account is an independent creator.
//!
//! Every check is a pure predicate over [`ProfileText`], with the keyword
//! sets kept as named constants so they can be reviewed and tested alone.

use std::fmt;

use snsdb_core::{ClassifierSettings, NormalizedProfile};

/// Whole-word tokens in a handle or display name that mark a business.
pub const COMPANY_NAME_TOKENS: &[&str] = &[
    "inc", "ltd", "llc", "corp", "co", "company", "group", "official", "shop", "store", "studio",
    "agency", "brand", "boutique", "restaurant", "hotel", "clinic", "news", "show",
];

/// Biography vocabulary typical of company accounts.
pub const COMPANY_BIO_PHRASES: &[&str] = &[
    "official",
    "brand",
    "shop",
    "store",
    "customer service",
    "support",
    "press",
    "pr",
    "sales",
    "shipping",
    "worldwide shipping",
    "order",
    "orders",
    "buy",
    "discount",
    "promo",
    "promotion",
    "wholesale",
    "stockist",
    "headquarters",
    "hq",
    "contact us",
    "email us",
    "business inquiries",
    "corp",
    "corporation",
    "company",
    "inc",
    "ltd",
    "llc",
    "co.",
    "gmbh",
    "plc",
    "news",
];

/// Biography vocabulary suggesting a person talking about themselves.
pub const PERSON_HINT_KEYWORDS: &[&str] = &[
    "creator",
    "influencer",
    "model",
    "blogger",
    "youtuber",
    "streamer",
    "photographer",
    "artist",
    "stylist",
    "fashion",
    "fitness",
    "dad",
    "mom",
    "student",
    "she/her",
    "he/him",
    "they/them",
    "personal",
    "my life",
    "vlog",
];

const LINK_IN_BIO: &str = "link in bio";
const LINK_IN_BIO_COMMERCE: &[&str] = &["shop", "order", "discount"];

/// Lower-cased, trimmed text fields the heuristics read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileText {
    pub handle: String,
    pub display_name: String,
    pub bio: String,
}

impl ProfileText {
    #[must_use]
    pub fn new(handle: &str, display_name: &str, bio: &str) -> Self {
        Self {
            handle: handle.trim().to_lowercase(),
            display_name: display_name.trim().to_lowercase(),
            bio: bio.trim().to_lowercase(),
        }
    }

    #[must_use]
    pub fn from_profile(profile: &NormalizedProfile) -> Self {
        Self::new(
            &profile.handle,
            profile.display_name.as_deref().unwrap_or_default(),
            profile.biography.as_deref().unwrap_or_default(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    BelowFollowerFloor { followers: i64, min: i64 },
    BusinessAccount,
    NotLocal,
    CompanySignal(&'static str),
    NoPersonSignal,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::BelowFollowerFloor { followers, min } => {
                write!(f, "{followers} followers is below the floor of {min}")
            }
            Rejection::BusinessAccount => f.write_str("flagged as a business account"),
            Rejection::NotLocal => f.write_str("no Japanese script in name or bio"),
            Rejection::CompanySignal(marker) => write!(f, "company signal '{marker}'"),
            Rejection::NoPersonSignal => f.write_str("no person signal"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected(Rejection),
}

impl Verdict {
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }
}

/// Run every check in order and report the first failure.
#[must_use]
pub fn classify(profile: &NormalizedProfile, settings: &ClassifierSettings) -> Verdict {
    let followers = profile.follower_count();
    if followers < settings.min_followers {
        return Verdict::Rejected(Rejection::BelowFollowerFloor {
            followers,
            min: settings.min_followers,
        });
    }

    if settings.influencer_strict && profile.is_business {
        return Verdict::Rejected(Rejection::BusinessAccount);
    }

    let text = ProfileText::from_profile(profile);

    if settings.locale_strict && !locale_check(&text) {
        return Verdict::Rejected(Rejection::NotLocal);
    }

    if let Some(marker) = company_signal(&text) {
        return Verdict::Rejected(Rejection::CompanySignal(marker));
    }

    if !person_check(&text, settings.influencer_strict) {
        return Verdict::Rejected(Rejection::NoPersonSignal);
    }

    Verdict::Accepted
}

#[must_use]
pub fn is_target_creator(profile: &NormalizedProfile, settings: &ClassifierSettings) -> bool {
    classify(profile, settings).is_accepted()
}

/// Hiragana, Katakana or CJK ideographs in the display name or biography.
#[must_use]
pub fn locale_check(text: &ProfileText) -> bool {
    has_japanese_script(&text.display_name) || has_japanese_script(&text.bio)
}

#[must_use]
pub fn has_japanese_script(s: &str) -> bool {
    s.chars().any(|c| {
        matches!(c,
            '\u{3040}'..='\u{309F}' | '\u{30A0}'..='\u{30FF}' | '\u{4E00}'..='\u{9FFF}')
    })
}

/// The first company marker found, if any.
#[must_use]
pub fn company_signal(text: &ProfileText) -> Option<&'static str> {
    let name_tokens: Vec<&str> = words(&text.handle).chain(words(&text.display_name)).collect();
    if let Some(token) = COMPANY_NAME_TOKENS
        .iter()
        .find(|t| name_tokens.contains(*t))
    {
        return Some(*token);
    }

    // Substring match: Japanese bios glue Latin markers to kana ("PR依頼はDMへ").
    if let Some(phrase) = COMPANY_BIO_PHRASES.iter().find(|p| text.bio.contains(*p)) {
        return Some(*phrase);
    }

    if text.bio.contains(LINK_IN_BIO) && LINK_IN_BIO_COMMERCE.iter().any(|w| text.bio.contains(w)) {
        return Some(LINK_IN_BIO);
    }

    None
}

/// Creator vocabulary in the bio, or a display name shaped like a full name.
#[must_use]
pub fn person_signal(text: &ProfileText) -> bool {
    if PERSON_HINT_KEYWORDS.iter().any(|k| text.bio.contains(k)) {
        return true;
    }
    let mut parts = text.display_name.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(first), Some(second)) => first.chars().count() >= 2 && second.chars().count() >= 2,
        _ => false,
    }
}

/// Strict mode requires a person signal; otherwise it is permissive.
#[must_use]
pub fn person_check(text: &ProfileText, strict: bool) -> bool {
    !strict || person_signal(text)
}

fn words(s: &str) -> impl Iterator<Item = &str> {
    s.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty())
}

#[cfg(test)]
#[path = "classifier_test.rs"]
mod tests;
