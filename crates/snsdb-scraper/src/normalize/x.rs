use snsdb_core::{NormalizedPost, NormalizedProfile, Platform};

use super::{resolve_post, resolve_profile, PostFields, ProfileFields};
use crate::fields::{self, Record};

const AUTHOR_CONTAINERS: &[&str] = &["author", "user"];

const PROFILE: ProfileFields = ProfileFields {
    handle: &["userName", "username", "screenName", "screen_name", "handle"],
    user_id: &["id", "userId", "restId", "rest_id"],
    display_name: &["name", "displayName", "display_name", "fullName", "full_name"],
    bio: &["description", "bio"],
    avatar: &[
        "profilePicture",
        "profileImageUrl",
        "profile_image_url_https",
        "profile_image_url",
        "avatar",
    ],
    external_url: &["url", "website"],
    verified: &["isVerified", "verified", "isBlueVerified"],
    business: &["isBusiness", "professional"],
    followers: &["followersCount", "followers", "followers_count"],
    following: &["friendsCount", "following", "followingCount", "friends_count"],
    posts: &["mediaCount", "statusesCount", "statuses_count", "posts"],
};

const POST: PostFields = PostFields {
    id: &["id", "tweetId", "restId", "id_str"],
    text: &["text", "fullText", "full_text", "content"],
    link: &["url", "twitterUrl", "tweetUrl"],
    timestamp: &["createdAt", "created_at", "time"],
    media_type: &["type"],
    likes: &["likeCount", "favoriteCount", "likes", "favorite_count"],
    comments: &["replyCount", "replies", "reply_count"],
    views: &["viewCount", "views"],
    shares: &[],
    retweets: &["retweetCount", "retweets", "retweet_count"],
    quotes: &["quoteCount", "quotes", "quote_count"],
};

/// The tweet's author plus the tweet itself.
pub(super) fn author(record: &Record) -> Option<(NormalizedProfile, Option<NormalizedPost>)> {
    let author = fields::object(record, AUTHOR_CONTAINERS)?;
    let profile = resolve_profile(Platform::X, author, &PROFILE)?;
    let post = post(record, Some(&profile.handle));
    Some((profile, post))
}

pub(super) fn post(record: &Record, handle: Option<&str>) -> Option<NormalizedPost> {
    let mut post = resolve_post(record, &POST)?;
    if post.permalink.is_none() {
        post.permalink = handle.map(|h| format!("https://x.com/{h}/status/{}", post.external_id));
    }
    Some(post)
}
