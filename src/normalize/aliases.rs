use chrono::{DateTime, Utc};

use crate::record::{EngagementCounts, RawRecord};

use super::FieldExtractor;
use super::coerce::{first_count, first_string, first_timestamp};

/// Ordered alias lists per canonical attribute; the first present, non-null
/// field wins.
#[derive(Debug)]
pub(crate) struct AliasTable {
    pub(crate) text: &'static [&'static str],
    pub(crate) description: &'static [&'static str],
    pub(crate) post_id: &'static [&'static str],
    pub(crate) url: &'static [&'static str],
    pub(crate) author: &'static [&'static str],
    pub(crate) timestamp: &'static [&'static str],
    pub(crate) likes: &'static [&'static str],
    pub(crate) comments: &'static [&'static str],
    pub(crate) shares: &'static [&'static str],
    pub(crate) views: &'static [&'static str],
}

pub(super) static TIKTOK: AliasTable = AliasTable {
    text: &["title", "text", "description"],
    description: &["description", "text"],
    post_id: &["id"],
    url: &["webVideoUrl", "postPage", "url"],
    author: &["authorMeta.name", "authorMeta.nickName", "author"],
    timestamp: &["createTimeISO", "createTime"],
    likes: &["diggCount", "likesCount"],
    comments: &["commentCount", "commentsCount"],
    shares: &["shareCount", "sharesCount"],
    views: &["playCount"],
};

pub(super) static INSTAGRAM: AliasTable = AliasTable {
    text: &["caption", "text", "title", "description"],
    description: &["description", "alt"],
    post_id: &["id", "shortCode"],
    url: &["url", "postPage"],
    author: &["ownerUsername", "ownerFullName"],
    timestamp: &["timestamp", "takenAt"],
    likes: &["likesCount"],
    comments: &["commentsCount"],
    shares: &["sharesCount"],
    views: &["videoViewCount", "videoPlayCount"],
};

pub(super) static TWITTER: AliasTable = AliasTable {
    text: &["text", "fullText", "full_text"],
    description: &[],
    post_id: &["id", "id_str"],
    url: &["url", "twitterUrl"],
    author: &["author.userName", "user.screen_name", "author"],
    timestamp: &["createdAt", "created_at"],
    likes: &["likeCount", "favorite_count"],
    comments: &["replyCount", "reply_count"],
    shares: &["retweetCount", "retweet_count"],
    views: &["viewCount"],
};

pub(super) static YOUTUBE: AliasTable = AliasTable {
    text: &["title", "text", "description"],
    description: &["description", "text"],
    post_id: &["id"],
    url: &["url"],
    author: &["channelName", "author"],
    timestamp: &["date", "publishedAt", "uploadDate"],
    likes: &["likes", "likeCount"],
    comments: &["commentsCount", "commentCount"],
    shares: &[],
    views: &["viewCount"],
};

impl FieldExtractor for AliasTable {
    fn extract_text(&self, raw: &RawRecord) -> String {
        first_string(raw, self.text).unwrap_or_default()
    }

    fn extract_counts(&self, raw: &RawRecord) -> EngagementCounts {
        EngagementCounts {
            like_count: first_count(raw, self.likes),
            comment_count: first_count(raw, self.comments),
            share_count: first_count(raw, self.shares),
            view_count: first_count(raw, self.views),
        }
    }

    fn extract_timestamp(&self, raw: &RawRecord) -> Option<DateTime<Utc>> {
        first_timestamp(raw, self.timestamp)
    }

    fn extract_author(&self, raw: &RawRecord) -> Option<String> {
        first_string(raw, self.author).filter(|author| !author.is_empty())
    }

    fn extract_post_id(&self, raw: &RawRecord) -> Option<String> {
        first_string(raw, self.post_id).filter(|id| !id.is_empty())
    }

    fn extract_url(&self, raw: &RawRecord) -> Option<String> {
        first_string(raw, self.url).filter(|url| !url.is_empty())
    }

    fn extract_description(&self, raw: &RawRecord) -> String {
        first_string(raw, self.description).unwrap_or_default()
    }
}
