//! Provider records → [`NormalizedProfile`] / [`NormalizedPost`].
//!
//! Field names drift between actor versions, so every logical field is an
//! ordered key list ([`ProfileFields`], [`PostFields`]) read by the generic
//! resolvers in [`crate::fields`].

mod instagram;
mod tiktok;
mod x;

use std::collections::{HashMap, HashSet};

use serde_json::Value;
use snsdb_core::{NormalizedPost, NormalizedProfile, Platform, PostCounters};

use crate::fields::{self, Record};

/// Candidate keys for each profile field, highest priority first.
pub(crate) struct ProfileFields {
    pub handle: &'static [&'static str],
    pub user_id: &'static [&'static str],
    pub display_name: &'static [&'static str],
    pub bio: &'static [&'static str],
    pub avatar: &'static [&'static str],
    pub external_url: &'static [&'static str],
    pub verified: &'static [&'static str],
    pub business: &'static [&'static str],
    pub followers: &'static [&'static str],
    pub following: &'static [&'static str],
    pub posts: &'static [&'static str],
}

/// Candidate keys for each post field, highest priority first.
pub(crate) struct PostFields {
    pub id: &'static [&'static str],
    pub text: &'static [&'static str],
    pub link: &'static [&'static str],
    pub timestamp: &'static [&'static str],
    pub media_type: &'static [&'static str],
    pub likes: &'static [&'static str],
    pub comments: &'static [&'static str],
    pub views: &'static [&'static str],
    pub shares: &'static [&'static str],
    pub retweets: &'static [&'static str],
    pub quotes: &'static [&'static str],
}

/// One author seen in a content search, with the posts attributed to them.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorActivity {
    pub profile: NormalizedProfile,
    pub posts: Vec<NormalizedPost>,
}

pub(crate) fn resolve_profile(
    platform: Platform,
    record: &Record,
    keys: &ProfileFields,
) -> Option<NormalizedProfile> {
    let handle = fields::text(record, keys.handle)?
        .trim_start_matches('@')
        .to_string();
    if handle.is_empty() {
        return None;
    }
    let platform_user_id = fields::text(record, keys.user_id).unwrap_or_else(|| handle.clone());

    Some(NormalizedProfile {
        platform,
        platform_user_id,
        display_name: fields::text(record, keys.display_name),
        biography: fields::text(record, keys.bio),
        avatar_url: fields::url(record, keys.avatar).map(|u| platform.upgrade_avatar_url(&u)),
        external_url: fields::url(record, keys.external_url),
        is_verified: fields::flag(record, keys.verified),
        is_business: fields::flag(record, keys.business),
        followers: fields::count(record, keys.followers),
        following: fields::count(record, keys.following),
        posts: fields::count(record, keys.posts),
        profile_url: platform.profile_url(&handle),
        handle,
    })
}

pub(crate) fn resolve_post(record: &Record, keys: &PostFields) -> Option<NormalizedPost> {
    let external_id = fields::text(record, keys.id)?;
    Some(NormalizedPost {
        external_id,
        caption: fields::text(record, keys.text),
        permalink: fields::text(record, keys.link),
        media_type: fields::text(record, keys.media_type),
        posted_at: fields::timestamp(record, keys.timestamp),
        counters: PostCounters {
            likes: fields::count(record, keys.likes),
            comments: fields::count(record, keys.comments),
            views: fields::count(record, keys.views),
            shares: fields::count(record, keys.shares),
            retweets: fields::count(record, keys.retweets),
            quotes: fields::count(record, keys.quotes),
        },
    })
}

/// Profiles from a discovery dataset. Records without a handle are skipped.
#[must_use]
pub fn normalize_profiles(platform: Platform, records: &[Value]) -> Vec<NormalizedProfile> {
    records
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|r| match platform {
            Platform::Instagram => instagram::profile(r),
            Platform::Tiktok => tiktok::author(r).map(|(profile, _)| profile),
            Platform::X => x::author(r).map(|(profile, _)| profile),
        })
        .collect()
}

/// Posts from a posts dataset, de-duplicated by external id (first wins).
#[must_use]
pub fn normalize_posts(platform: Platform, records: &[Value]) -> Vec<NormalizedPost> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|r| match platform {
            Platform::Instagram => instagram::post(r),
            Platform::Tiktok => tiktok::post(r, None),
            Platform::X => x::post(r, None),
        })
        .filter(|p| seen.insert(p.external_id.clone()))
        .collect()
}

/// Group content-search items by author, in first-seen order.
///
/// The most recently listed profile snapshot wins; posts are de-duplicated
/// by external id and capped at `max_posts_per_author`.
#[must_use]
pub fn group_by_author(
    platform: Platform,
    records: &[Value],
    max_posts_per_author: usize,
) -> Vec<AuthorActivity> {
    let mut order: Vec<AuthorActivity> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut seen_posts: HashSet<String> = HashSet::new();

    for record in records.iter().filter_map(Value::as_object) {
        let item = match platform {
            Platform::Instagram => instagram::profile(record).map(|p| (p, None)),
            Platform::Tiktok => tiktok::author(record),
            Platform::X => x::author(record),
        };
        let Some((profile, post)) = item else {
            continue;
        };

        let key = profile.handle.to_lowercase();
        let slot = if let Some(&i) = index.get(&key) {
            order[i].profile = profile;
            i
        } else {
            index.insert(key, order.len());
            order.push(AuthorActivity {
                profile,
                posts: Vec::new(),
            });
            order.len() - 1
        };

        if let Some(post) = post {
            let author = &mut order[slot];
            if author.posts.len() < max_posts_per_author && seen_posts.insert(post.external_id.clone())
            {
                author.posts.push(post);
            }
        }
    }

    order
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
