use snsdb_core::{NormalizedPost, NormalizedProfile, Platform};

use super::{resolve_post, resolve_profile, PostFields, ProfileFields};
use crate::fields::{self, Record};

const PROFILE: ProfileFields = ProfileFields {
    handle: &["username", "userName", "handle"],
    user_id: &["id", "userId", "platformUserId"],
    display_name: &["fullName", "name"],
    bio: &["biography", "bio", "description"],
    avatar: &["profilePicUrlHD", "profilePicUrlHd", "profilePicUrl", "profilePicture"],
    external_url: &["externalUrl", "website"],
    verified: &["isVerified", "verified"],
    business: &["isBusinessAccount", "businessAccount", "isBusiness"],
    followers: &["followersCount", "followers"],
    following: &["followsCount", "following"],
    posts: &["postsCount", "posts"],
};

const POST: PostFields = PostFields {
    id: &["id", "postId", "shortCode", "code"],
    text: &["caption", "text"],
    link: &["url", "postUrl", "link"],
    timestamp: &["timestamp", "takenAt", "createdAt"],
    media_type: &["type", "mediaType"],
    likes: &["likesCount", "likes"],
    comments: &["commentsCount", "comments"],
    views: &["videoViewCount", "videoPlayCount", "views", "playCount"],
    shares: &[],
    retweets: &[],
    quotes: &[],
};

pub(super) fn profile(record: &Record) -> Option<NormalizedProfile> {
    resolve_profile(Platform::Instagram, record, &PROFILE)
}

pub(super) fn post(record: &Record) -> Option<NormalizedPost> {
    let mut post = resolve_post(record, &POST)?;
    if post.permalink.is_none() {
        post.permalink =
            fields::text(record, &["shortCode", "code"]).map(|c| format!("https://www.instagram.com/p/{c}/"));
    }
    Some(post)
}
