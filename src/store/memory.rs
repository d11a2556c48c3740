//! In-memory repository.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Repository;
use crate::error::{ImportError, Result};
use crate::model::forum::{Subscription, Vote, VoteKind};
use crate::model::post::{PostId, PostRecord};
use crate::model::user::UserIdentity;

/// Repository backed by ordered maps. Also the payload of a store snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryRepository {
    users: BTreeMap<String, UserIdentity>,
    posts: BTreeMap<PostId, PostRecord>,
    votes: Vec<Vote>,
    subscriptions: Vec<Subscription>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn post_count(&self) -> usize {
        self.posts.len()
    }
}

impl Repository for MemoryRepository {
    fn find_user(&self, email: &str) -> Result<Option<UserIdentity>> {
        Ok(self.users.get(email).cloned())
    }

    fn insert_user(&mut self, user: UserIdentity) -> Result<()> {
        if self.users.contains_key(&user.email) {
            return Err(ImportError::InvalidArgument(format!(
                "user {} already exists",
                user.email
            )));
        }
        self.users.insert(user.email.clone(), user);
        Ok(())
    }

    fn update_user(&mut self, user: &UserIdentity) -> Result<()> {
        match self.users.get_mut(&user.email) {
            Some(slot) => {
                *slot = user.clone();
                Ok(())
            }
            None => Err(ImportError::NotFound(format!("user {}", user.email))),
        }
    }

    fn users(&self) -> Result<Vec<UserIdentity>> {
        Ok(self.users.values().cloned().collect())
    }

    fn find_post(&self, id: PostId) -> Result<Option<PostRecord>> {
        Ok(self.posts.get(&id).cloned())
    }

    fn insert_post(&mut self, post: PostRecord) -> Result<()> {
        if self.posts.contains_key(&post.id) {
            return Err(ImportError::InvalidArgument(format!(
                "post {} already exists",
                post.id
            )));
        }
        self.posts.insert(post.id, post);
        Ok(())
    }

    fn update_post(&mut self, post: &PostRecord) -> Result<()> {
        match self.posts.get_mut(&post.id) {
            Some(slot) => {
                *slot = post.clone();
                Ok(())
            }
            None => Err(ImportError::NotFound(format!("post {}", post.id))),
        }
    }

    fn posts(&self) -> Result<Vec<PostRecord>> {
        Ok(self.posts.values().cloned().collect())
    }

    fn posts_by_author(&self, email: &str) -> Result<Vec<PostRecord>> {
        Ok(self
            .posts
            .values()
            .filter(|p| p.author == email)
            .cloned()
            .collect())
    }

    fn next_post_id(&self) -> Result<PostId> {
        let last = self.posts.keys().next_back().map(|id| id.0).unwrap_or(0);
        Ok(PostId(last + 1))
    }

    fn find_vote(&self, post: PostId, user: &str, kind: VoteKind) -> Result<Option<Vote>> {
        Ok(self
            .votes
            .iter()
            .find(|v| v.post == post && v.author == user && v.kind == kind)
            .cloned())
    }

    fn insert_vote(&mut self, vote: Vote) -> Result<()> {
        self.votes.push(vote);
        Ok(())
    }

    fn delete_vote(&mut self, post: PostId, user: &str, kind: VoteKind) -> Result<bool> {
        let before = self.votes.len();
        self.votes
            .retain(|v| !(v.post == post && v.author == user && v.kind == kind));
        Ok(self.votes.len() != before)
    }

    fn subscription(&self, root: PostId, user: &str) -> Result<Option<Subscription>> {
        Ok(self
            .subscriptions
            .iter()
            .find(|s| s.root == root && s.user == user)
            .cloned())
    }

    fn set_subscription(&mut self, sub: Subscription) -> Result<()> {
        match self
            .subscriptions
            .iter_mut()
            .find(|s| s.root == sub.root && s.user == sub.user)
        {
            Some(slot) => *slot = sub,
            None => self.subscriptions.push(sub),
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::post::PostType;
    use chrono::{TimeZone, Utc};

    fn post(id: u64, author: &str) -> PostRecord {
        let date = Utc.with_ymd_and_hms(2009, 1, 5, 10, 0, 0).unwrap();
        PostRecord {
            id: PostId(id),
            message_id: format!("<m{id}@example.org>"),
            parent: None,
            root: PostId(id),
            post_type: PostType::Question,
            title: "T".into(),
            body: String::new(),
            author: author.into(),
            creation_date: date,
            lastedit_date: date,
            rank: date,
            tags: Vec::new(),
            vote_count: 0,
            book_count: 0,
            accept_count: 0,
            reply_count: 0,
            has_accepted: false,
        }
    }

    #[test]
    fn test_next_post_id() {
        let mut repo = MemoryRepository::new();
        assert_eq!(repo.next_post_id().unwrap(), PostId(1));
        repo.insert_post(post(7, "a@b")).unwrap();
        assert_eq!(repo.next_post_id().unwrap(), PostId(8));
    }

    #[test]
    fn test_duplicate_inserts_rejected() {
        let mut repo = MemoryRepository::new();
        let now = Utc::now();
        repo.insert_user(UserIdentity::new("a@b", "A", now)).unwrap();
        assert!(repo
            .insert_user(UserIdentity::new("a@b", "Other", now))
            .is_err());
        repo.insert_post(post(1, "a@b")).unwrap();
        assert!(repo.insert_post(post(1, "a@b")).is_err());
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let mut repo = MemoryRepository::new();
        let err = repo.update_post(&post(3, "a@b")).unwrap_err();
        assert!(matches!(err, ImportError::NotFound(_)));
    }

    #[test]
    fn test_posts_by_author() {
        let mut repo = MemoryRepository::new();
        repo.insert_post(post(1, "a@b")).unwrap();
        repo.insert_post(post(2, "c@d")).unwrap();
        repo.insert_post(post(3, "a@b")).unwrap();
        let ids: Vec<u64> = repo
            .posts_by_author("a@b")
            .unwrap()
            .iter()
            .map(|p| p.id.0)
            .collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_votes_and_subscriptions() {
        let mut repo = MemoryRepository::new();
        let now = Utc::now();
        repo.insert_vote(Vote {
            post: PostId(1),
            author: "a@b".into(),
            kind: VoteKind::Upvote,
            date: now,
        })
        .unwrap();
        assert!(repo
            .find_vote(PostId(1), "a@b", VoteKind::Upvote)
            .unwrap()
            .is_some());
        assert!(repo
            .find_vote(PostId(1), "a@b", VoteKind::Bookmark)
            .unwrap()
            .is_none());
        assert!(repo.delete_vote(PostId(1), "a@b", VoteKind::Upvote).unwrap());
        assert!(!repo.delete_vote(PostId(1), "a@b", VoteKind::Upvote).unwrap());

        use crate::model::forum::SubscriptionKind;
        for kind in [SubscriptionKind::Email, SubscriptionKind::None] {
            repo.set_subscription(Subscription {
                root: PostId(1),
                user: "a@b".into(),
                kind,
                date: now,
            })
            .unwrap();
        }
        let sub = repo.subscription(PostId(1), "a@b").unwrap().unwrap();
        assert_eq!(sub.kind, SubscriptionKind::None);
    }
}
