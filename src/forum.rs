//! Actions on stored posts: votes, subscriptions, rank bumps, and store
//! statistics.
//!
//! None of these flush the repository; callers decide when a batch of
//! changes becomes durable.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{ImportError, Result};
use crate::model::forum::{Subscription, SubscriptionKind, Vote, VoteKind};
use crate::model::post::{PostId, PostRecord, PostType};
use crate::store::Repository;

/// Result of a vote toggle.
#[derive(Debug, Clone, PartialEq)]
pub struct VoteOutcome {
    /// `+1` when the vote was added, `-1` when it was withdrawn.
    pub change: i64,
    pub message: String,
    /// The post after its counters were updated.
    pub post: PostRecord,
}

/// Cast or withdraw a vote of `kind` by `user` on `post_id`.
///
/// Voting twice with the same kind removes the vote. Nobody may upvote or
/// accept their own post, and only the author of the thread root may accept
/// an answer. Upvotes move the post author's score with the vote.
pub fn toggle_vote(
    repo: &mut dyn Repository,
    post_id: PostId,
    user: &str,
    kind: VoteKind,
    now: DateTime<Utc>,
) -> Result<VoteOutcome> {
    let mut post = find_post(repo, post_id)?;
    if repo.find_user(user)?.is_none() {
        return Err(ImportError::NotFound(format!("user {user}")));
    }

    if post.author == user && kind == VoteKind::Upvote {
        return Err(ImportError::Forbidden(
            "You can not upvote your own post.".into(),
        ));
    }
    if post.author == user && kind == VoteKind::Accept {
        return Err(ImportError::Forbidden(
            "You can not accept your own post.".into(),
        ));
    }
    if kind == VoteKind::Accept {
        let root = find_post(repo, post.root)?;
        if root.author != user {
            return Err(ImportError::Forbidden(
                "Only the person asking the question may accept this answer.".into(),
            ));
        }
    }

    let change = if repo.delete_vote(post_id, user, kind)? {
        -1
    } else {
        repo.insert_vote(Vote {
            post: post_id,
            author: user.to_string(),
            kind,
            date: now,
        })?;
        1
    };

    match kind {
        VoteKind::Upvote => {
            post.vote_count += change;
            if let Some(mut author) = repo.find_user(&post.author)? {
                author.score += change;
                repo.update_user(&author)?;
            }
        }
        VoteKind::Bookmark => post.book_count += change,
        VoteKind::Accept => post.accept_count += change,
    }
    repo.update_post(&post)?;

    if kind == VoteKind::Accept {
        refresh_accepted(repo, post.root)?;
        // The refreshed root may be this very post.
        post = find_post(repo, post_id)?;
    }

    let verb = if change > 0 { "added" } else { "removed" };
    let message = format!("{} {verb}", kind_label(kind));
    info!(post = %post_id, user, change, "{message}");
    Ok(VoteOutcome {
        change,
        message,
        post,
    })
}

/// Set the root's `has_accepted` flag from its thread's accept counts.
fn refresh_accepted(repo: &mut dyn Repository, root_id: PostId) -> Result<()> {
    let accepted = repo
        .posts()?
        .iter()
        .any(|p| p.root == root_id && p.accept_count > 0);
    let mut root = find_post(repo, root_id)?;
    if root.has_accepted != accepted {
        root.has_accepted = accepted;
        repo.update_post(&root)?;
    }
    Ok(())
}

fn kind_label(kind: VoteKind) -> &'static str {
    match kind {
        VoteKind::Upvote => "Upvote",
        VoteKind::Bookmark => "Bookmark",
        VoteKind::Accept => "Accept",
    }
}

/// Change how `user` follows the thread rooted at `root_id`.
pub fn subscribe(
    repo: &mut dyn Repository,
    root_id: PostId,
    user: &str,
    kind: SubscriptionKind,
    now: DateTime<Utc>,
) -> Result<Subscription> {
    let root = find_post(repo, root_id)?;
    if !root.is_toplevel() {
        return Err(ImportError::InvalidArgument(format!(
            "post {root_id} is not a thread root"
        )));
    }
    if repo.find_user(user)?.is_none() {
        return Err(ImportError::NotFound(format!("user {user}")));
    }

    let sub = Subscription {
        root: root_id,
        user: user.to_string(),
        kind,
        date: now,
    };
    repo.set_subscription(sub.clone())?;
    info!(root = %root_id, user, kind = ?kind, "Changed subscription");
    Ok(sub)
}

/// Move posts to the top of the listing by setting their rank to `now`.
/// Unknown ids are ignored. Returns the number of posts changed.
pub fn bump(repo: &mut dyn Repository, ids: &[PostId], now: DateTime<Utc>) -> Result<usize> {
    set_rank(repo, ids, |_| now)
}

/// Reset posts' rank to their creation date.
pub fn unbump(repo: &mut dyn Repository, ids: &[PostId]) -> Result<usize> {
    set_rank(repo, ids, |post| post.creation_date)
}

fn set_rank(
    repo: &mut dyn Repository,
    ids: &[PostId],
    rank: impl Fn(&PostRecord) -> DateTime<Utc>,
) -> Result<usize> {
    let mut changed = 0;
    for &id in ids {
        match repo.find_post(id)? {
            Some(mut post) => {
                post.rank = rank(&post);
                repo.update_post(&post)?;
                changed += 1;
            }
            None => debug!(id = %id, "No such post, skipping"),
        }
    }
    Ok(changed)
}

/// Parse a comma-separated id list (`"1,2, 3"`).
pub fn parse_uids(raw: &str) -> Result<Vec<PostId>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<PostId>()
                .map_err(|_| ImportError::InvalidArgument(format!("invalid post id '{s}'")))
        })
        .collect()
}

fn find_post(repo: &dyn Repository, id: PostId) -> Result<PostRecord> {
    repo.find_post(id)?
        .ok_or_else(|| ImportError::NotFound(format!("post {id}")))
}

/// Aggregate view of the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ForumStats {
    pub users: usize,
    pub posts: usize,
    pub questions: usize,
    pub answers: usize,
    pub comments: usize,
    pub first_post: Option<DateTime<Utc>>,
    pub last_post: Option<DateTime<Utc>>,
    /// `(email, post count)`, most active first.
    pub top_authors: Vec<(String, usize)>,
}

pub fn forum_stats(repo: &dyn Repository, top_n: usize) -> Result<ForumStats> {
    let posts = repo.posts()?;
    let mut stats = ForumStats {
        users: repo.users()?.len(),
        posts: posts.len(),
        ..ForumStats::default()
    };

    let mut per_author: HashMap<&str, usize> = HashMap::new();
    for post in &posts {
        match post.post_type {
            PostType::Question => stats.questions += 1,
            PostType::Answer => stats.answers += 1,
            PostType::Comment => stats.comments += 1,
        }
        *per_author.entry(post.author.as_str()).or_insert(0) += 1;
    }
    stats.first_post = posts.iter().map(|p| p.creation_date).min();
    stats.last_post = posts.iter().map(|p| p.creation_date).max();

    let mut authors: Vec<(String, usize)> = per_author
        .into_iter()
        .map(|(email, n)| (email.to_string(), n))
        .collect();
    authors.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    authors.truncate(top_n);
    stats.top_authors = authors;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::user::UserIdentity;
    use crate::store::MemoryRepository;
    use chrono::TimeZone;

    fn date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2009, 1, 5, 10, 0, 0).unwrap()
    }

    fn post(id: u64, parent: Option<u64>, root: u64, author: &str) -> PostRecord {
        let post_type = match parent {
            None => PostType::Question,
            Some(p) if p == root => PostType::Answer,
            Some(_) => PostType::Comment,
        };
        PostRecord {
            id: PostId(id),
            message_id: format!("<{id}@x>"),
            parent: parent.map(PostId),
            root: PostId(root),
            post_type,
            title: "Thread".into(),
            body: String::new(),
            author: author.into(),
            creation_date: date(),
            lastedit_date: date(),
            rank: date(),
            tags: Vec::new(),
            vote_count: 0,
            book_count: 0,
            accept_count: 0,
            reply_count: 0,
            has_accepted: false,
        }
    }

    /// Question 1 by asker, answer 2 by helper.
    fn thread() -> MemoryRepository {
        let mut repo = MemoryRepository::new();
        for email in ["asker@x", "helper@x", "other@x"] {
            repo.insert_user(UserIdentity::new(email, email, date()))
                .unwrap();
        }
        repo.insert_post(post(1, None, 1, "asker@x")).unwrap();
        repo.insert_post(post(2, Some(1), 1, "helper@x")).unwrap();
        repo
    }

    #[test]
    fn test_upvote_toggles_and_moves_score() {
        let mut repo = thread();
        let out = toggle_vote(&mut repo, PostId(2), "other@x", VoteKind::Upvote, date()).unwrap();
        assert_eq!(out.change, 1);
        assert_eq!(out.post.vote_count, 1);
        assert_eq!(repo.find_user("helper@x").unwrap().unwrap().score, 1);

        let out = toggle_vote(&mut repo, PostId(2), "other@x", VoteKind::Upvote, date()).unwrap();
        assert_eq!(out.change, -1);
        assert_eq!(out.post.vote_count, 0);
        assert_eq!(repo.find_user("helper@x").unwrap().unwrap().score, 0);
    }

    #[test]
    fn test_self_votes_forbidden() {
        let mut repo = thread();
        let err = toggle_vote(&mut repo, PostId(2), "helper@x", VoteKind::Upvote, date())
            .unwrap_err();
        assert!(matches!(err, ImportError::Forbidden(_)));
        let err = toggle_vote(&mut repo, PostId(1), "asker@x", VoteKind::Accept, date())
            .unwrap_err();
        assert!(matches!(err, ImportError::Forbidden(_)));
        // Bookmarking your own post is fine.
        toggle_vote(&mut repo, PostId(2), "helper@x", VoteKind::Bookmark, date()).unwrap();
    }

    #[test]
    fn test_only_asker_accepts() {
        let mut repo = thread();
        let err = toggle_vote(&mut repo, PostId(2), "other@x", VoteKind::Accept, date())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Only the person asking the question may accept this answer."
        );

        let out = toggle_vote(&mut repo, PostId(2), "asker@x", VoteKind::Accept, date()).unwrap();
        assert_eq!(out.post.accept_count, 1);
        assert!(repo.find_post(PostId(1)).unwrap().unwrap().has_accepted);

        toggle_vote(&mut repo, PostId(2), "asker@x", VoteKind::Accept, date()).unwrap();
        assert!(!repo.find_post(PostId(1)).unwrap().unwrap().has_accepted);
    }

    #[test]
    fn test_unknown_post_or_user() {
        let mut repo = thread();
        assert!(matches!(
            toggle_vote(&mut repo, PostId(9), "other@x", VoteKind::Upvote, date()),
            Err(ImportError::NotFound(_))
        ));
        assert!(matches!(
            toggle_vote(&mut repo, PostId(1), "ghost@x", VoteKind::Upvote, date()),
            Err(ImportError::NotFound(_))
        ));
    }

    #[test]
    fn test_subscribe_roots_only() {
        let mut repo = thread();
        let sub = subscribe(&mut repo, PostId(1), "other@x", SubscriptionKind::Email, date())
            .unwrap();
        assert_eq!(sub.kind, SubscriptionKind::Email);

        let unfollow: SubscriptionKind = "unfollow".parse().unwrap();
        subscribe(&mut repo, PostId(1), "other@x", unfollow, date()).unwrap();
        assert_eq!(
            repo.subscription(PostId(1), "other@x").unwrap().unwrap().kind,
            SubscriptionKind::None
        );

        assert!(matches!(
            subscribe(&mut repo, PostId(2), "other@x", SubscriptionKind::Email, date()),
            Err(ImportError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_bump_and_unbump() {
        let mut repo = thread();
        let later = Utc.with_ymd_and_hms(2020, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(bump(&mut repo, &[PostId(1), PostId(42)], later).unwrap(), 1);
        assert_eq!(repo.find_post(PostId(1)).unwrap().unwrap().rank, later);

        assert_eq!(unbump(&mut repo, &[PostId(1)]).unwrap(), 1);
        assert_eq!(repo.find_post(PostId(1)).unwrap().unwrap().rank, date());
    }

    #[test]
    fn test_parse_uids() {
        assert_eq!(
            parse_uids("1, 2,,3").unwrap(),
            vec![PostId(1), PostId(2), PostId(3)]
        );
        assert!(parse_uids("1,x").is_err());
        assert!(parse_uids("").unwrap().is_empty());
    }

    #[test]
    fn test_forum_stats() {
        let mut repo = thread();
        repo.insert_post(post(3, Some(2), 1, "asker@x")).unwrap();
        let stats = forum_stats(&repo, 1).unwrap();
        assert_eq!(stats.users, 3);
        assert_eq!(stats.posts, 3);
        assert_eq!((stats.questions, stats.answers, stats.comments), (1, 1, 1));
        assert_eq!(stats.top_authors, vec![("asker@x".to_string(), 2)]);
        assert_eq!(stats.first_post, Some(date()));
    }
}
