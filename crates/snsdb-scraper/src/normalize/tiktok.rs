use snsdb_core::{NormalizedPost, NormalizedProfile, Platform};

use super::{resolve_post, resolve_profile, PostFields, ProfileFields};
use crate::fields::{self, Record};

const AUTHOR_CONTAINERS: &[&str] = &["authorMeta", "author", "authorInfo"];

const PROFILE: ProfileFields = ProfileFields {
    handle: &["name", "uniqueId", "username"],
    user_id: &["id", "userId"],
    display_name: &["nickName", "nickname", "displayName"],
    bio: &["signature", "bio", "description"],
    avatar: &["avatar", "avatarLarger", "avatarMedium", "avatarThumb", "profileImageUrl"],
    external_url: &["bioLink", "website"],
    verified: &["verified", "isVerified"],
    business: &["commerceUser", "isBusiness"],
    followers: &["fans", "followers", "followerCount", "fansCount"],
    following: &["following", "followingCount"],
    posts: &["video", "videoCount"],
};

const POST: PostFields = PostFields {
    id: &["id", "itemId", "videoId", "awemeId"],
    text: &["text", "desc", "caption"],
    link: &["webVideoUrl", "videoUrl", "url", "shareUrl"],
    timestamp: &["createTimeISO", "createTime", "createdAt", "create_time"],
    media_type: &[],
    likes: &["diggCount", "likes", "likeCount"],
    comments: &["commentCount", "comments"],
    views: &["playCount", "views", "viewCount"],
    shares: &["shareCount", "shares"],
    retweets: &[],
    quotes: &[],
};

/// The video's author plus the video itself.
pub(super) fn author(record: &Record) -> Option<(NormalizedProfile, Option<NormalizedPost>)> {
    let author = fields::object(record, AUTHOR_CONTAINERS)?;
    let profile = resolve_profile(Platform::Tiktok, author, &PROFILE)?;
    let post = post(record, Some(&profile.handle));
    Some((profile, post))
}

pub(super) fn post(record: &Record, handle: Option<&str>) -> Option<NormalizedPost> {
    let mut post = resolve_post(record, &POST)?;
    post.media_type = Some("video".to_string());
    if post.permalink.is_none() {
        post.permalink =
            handle.map(|h| format!("https://www.tiktok.com/@{h}/video/{}", post.external_id));
    }
    Some(post)
}
