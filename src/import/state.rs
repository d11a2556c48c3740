//! Per-run bookkeeping: known users, known posts, counters.
//!
//! Nothing here is persisted; it lives exactly as long as one import run.

use std::collections::BTreeMap;

use serde::Serialize;

use super::linker::ThreadLinker;
use super::users::UserResolver;
use crate::error::Result;
use crate::model::message::{ParsedMessage, SkipReason};
use crate::model::post::{PostId, PostType};
use crate::store::Repository;

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportStats {
    /// Raw records pulled from the mailbox.
    pub records_read: u64,
    /// Records that passed every filter and counted toward the limit.
    pub accepted: u64,
    /// Users in the store before the run started.
    pub users_found: usize,
    /// Users known at the end of the run (found + created).
    pub users: usize,
    pub users_created: usize,
    pub posts_created: u64,
    pub questions: u64,
    pub answers: u64,
    pub comments: u64,
    /// Replies whose parent was unknown and that became roots.
    pub orphans_promoted: u64,
    /// Deferred replies whose parent arrived later in the stream.
    pub orphans_relinked: u64,
    pub skipped: BTreeMap<SkipReason, u64>,
    pub limit: Option<usize>,
    pub dry_run: bool,
}

impl ImportStats {
    pub fn skip(&mut self, reason: SkipReason) {
        *self.skipped.entry(reason).or_insert(0) += 1;
    }

    pub fn skipped(&self, reason: SkipReason) -> u64 {
        self.skipped.get(&reason).copied().unwrap_or(0)
    }

    pub fn total_skipped(&self) -> u64 {
        self.skipped.values().sum()
    }

    pub fn record_post(&mut self, post_type: PostType) {
        self.posts_created += 1;
        match post_type {
            PostType::Question => self.questions += 1,
            PostType::Answer => self.answers += 1,
            PostType::Comment => self.comments += 1,
        }
    }
}

/// A reply held back under the `defer` orphan policy.
#[derive(Debug, Clone)]
pub struct PendingReply {
    pub message: ParsedMessage,
    pub reply_to: String,
}

/// Mutable state of one import run.
#[derive(Debug)]
pub struct ImportState {
    pub users: UserResolver,
    pub threads: ThreadLinker,
    pub pending: Vec<PendingReply>,
    pub stats: ImportStats,
    next_id: PostId,
}

impl ImportState {
    /// Fresh state seeded from the store's users and next free post id.
    pub fn new(repo: &dyn Repository) -> Result<Self> {
        let users = UserResolver::preload(repo)?;
        let stats = ImportStats {
            users_found: users.len(),
            ..ImportStats::default()
        };
        Ok(Self {
            users,
            threads: ThreadLinker::new(),
            pending: Vec::new(),
            stats,
            next_id: repo.next_post_id()?,
        })
    }

    /// Hand out the next post id. Ids are allocated even in dry runs so
    /// replies can be linked without touching the store.
    pub fn allocate_id(&mut self) -> PostId {
        let id = self.next_id;
        self.next_id = PostId(id.0 + 1);
        id
    }
}
