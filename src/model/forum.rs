//! Votes and thread subscriptions.

use chrono::{DateTime, Utc};

use super::post::PostId;

/// Kind of vote a user can cast on a post.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum VoteKind {
    Upvote,
    Bookmark,
    Accept,
}

impl std::str::FromStr for VoteKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upvote" => Ok(VoteKind::Upvote),
            "bookmark" => Ok(VoteKind::Bookmark),
            "accept" => Ok(VoteKind::Accept),
            other => Err(format!("unknown vote type '{other}'")),
        }
    }
}

/// A vote cast by `author` on `post`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Vote {
    pub post: PostId,
    /// Email of the voter.
    pub author: String,
    pub kind: VoteKind,
    pub date: DateTime<Utc>,
}

/// How a user follows a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionKind {
    /// On-site messages.
    Messages,
    /// Email notifications.
    Email,
    /// Not following.
    #[default]
    None,
}

impl std::str::FromStr for SubscriptionKind {
    type Err = String;

    /// Unknown values fall back to `None`, like an unfollow.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "messages" => SubscriptionKind::Messages,
            "email" => SubscriptionKind::Email,
            _ => SubscriptionKind::None,
        })
    }
}

/// A user's subscription to a thread root.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Subscription {
    pub root: PostId,
    pub user: String,
    pub kind: SubscriptionKind,
    pub date: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vote_kind_from_str() {
        assert_eq!("upvote".parse::<VoteKind>().unwrap(), VoteKind::Upvote);
        assert_eq!("accept".parse::<VoteKind>().unwrap(), VoteKind::Accept);
        assert!("downvote".parse::<VoteKind>().is_err());
    }

    #[test]
    fn test_subscription_kind_defaults_to_none() {
        assert_eq!(
            "email".parse::<SubscriptionKind>().unwrap(),
            SubscriptionKind::Email
        );
        assert_eq!(
            "unfollow".parse::<SubscriptionKind>().unwrap(),
            SubscriptionKind::None
        );
        assert_eq!(
            "bogus".parse::<SubscriptionKind>().unwrap(),
            SubscriptionKind::None
        );
    }
}
