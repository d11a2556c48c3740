//! The import driver: one pass over a mailbox, producing users and posts.
//!
//! ```text
//! INIT ──► STREAMING ──► (per record: SKIP | ACCEPT) ──► FINALIZING ──► DONE
//!                                                   └─► dry run: DONE, nothing written
//! ```
//!
//! Per record, in order: unpack, drop records without a sender email,
//! drop records whose subject is empty once list tags are removed, resolve
//! the remote body, format, apply the size limit, then the record-count
//! limit. Only records that survive all filters count toward the limit;
//! replies dropped for a missing parent do not.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::deobfuscate::{deobfuscate_record, deobfuscated_path, write_deobfuscated};
use super::finalize;
use super::linker::{Link, OrphanPolicy, ThreadNode};
use super::state::{ImportState, ImportStats, PendingReply};
use crate::config::ImportConfig;
use crate::error::{ImportError, Result};
use crate::model::message::{ParsedMessage, SkipReason};
use crate::model::post::{normalize_title, parse_tags, PostRecord, PostType};
use crate::parser::format::BodyFormatter;
use crate::parser::mbox::MboxReader;
use crate::parser::unpack::Unpacker;
use crate::remote::RemoteBodyFetcher;
use crate::store::Repository;

/// Everything that shapes one import run. Built once, then only borrowed.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportOptions {
    /// Stop after this many accepted records. Replies dropped under
    /// [`OrphanPolicy::Drop`] are skips and do not count.
    pub limit: Option<usize>,
    /// Tags attached to every new thread root.
    pub tags: Vec<String>,
    /// Parse and link everything, persist nothing.
    pub dry_run: bool,
    pub orphan_policy: OrphanPolicy,
    pub line_width: usize,
    /// Formatted bodies longer than this many bytes are skipped.
    pub max_body_size: Option<usize>,
    pub strip_prefixes: Vec<String>,
    /// Directory receiving the de-obfuscated copy of the input. Without one,
    /// records are de-obfuscated in memory.
    pub work_dir: Option<PathBuf>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self::from_config(&ImportConfig::default())
    }
}

impl ImportOptions {
    pub fn from_config(config: &ImportConfig) -> Self {
        Self {
            limit: None,
            tags: Vec::new(),
            dry_run: false,
            orphan_policy: config.orphan_policy,
            line_width: config.line_width,
            max_body_size: config.max_body_size,
            strip_prefixes: config.strip_prefixes.clone(),
            work_dir: None,
        }
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Parse a free-text tag value (`"rna-seq, galaxy"`).
    pub fn with_tags(mut self, raw: &str) -> Self {
        self.tags = parse_tags(raw);
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_orphan_policy(mut self, policy: OrphanPolicy) -> Self {
        self.orphan_policy = policy;
        self
    }

    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    fn limit_reached(&self, accepted: u64) -> bool {
        self.limit.is_some_and(|limit| accepted >= limit as u64)
    }
}

/// Runs mailbox imports against a [`Repository`].
pub struct Importer<'a> {
    options: &'a ImportOptions,
    unpacker: Unpacker,
    formatter: BodyFormatter,
    fetcher: Option<&'a RemoteBodyFetcher>,
}

impl<'a> Importer<'a> {
    pub fn new(options: &'a ImportOptions) -> Self {
        Self {
            options,
            unpacker: Unpacker::new(&options.strip_prefixes),
            formatter: BodyFormatter::new(options.line_width),
            fetcher: None,
        }
    }

    /// Resolve truncated archive bodies through `fetcher`.
    pub fn with_fetcher(mut self, fetcher: &'a RemoteBodyFetcher) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Import the mailbox at `path`.
    ///
    /// Malformed records are skipped and counted. Only store failures abort
    /// the run. Under dry run the store is read but never written.
    pub fn run(
        &self,
        path: &Path,
        repo: &mut dyn Repository,
        progress: Option<&dyn Fn(u64, u64)>,
    ) -> Result<ImportStats> {
        let source = MboxReader::new(path)?;
        let mut state = ImportState::new(repo)?;
        state.stats.limit = self.options.limit;
        state.stats.dry_run = self.options.dry_run;
        info!("*** found {} users", state.stats.users_found);
        info!("*** parsing mbox {}", path.display());

        let (reader, rewrite_records) = match &self.options.work_dir {
            Some(dir) => {
                let copy = deobfuscated_path(dir, path);
                write_deobfuscated(path, &copy)?;
                (MboxReader::new(&copy)?, false)
            }
            None => (source, true),
        };

        if self.options.limit != Some(0) {
            let mut failure: Option<ImportError> = None;
            reader.for_each_record(
                &mut |raw| {
                    state.stats.records_read += 1;
                    let raw = if rewrite_records {
                        deobfuscate_record(raw)
                    } else {
                        Cow::Borrowed(raw)
                    };
                    let Some(msg) = self.prepare(&raw, &mut state.stats) else {
                        return true;
                    };
                    if let Err(e) = self.accept(msg, &mut state, &mut *repo) {
                        failure = Some(e);
                        return false;
                    }
                    !self.options.limit_reached(state.stats.accepted)
                },
                progress,
            )?;
            if let Some(e) = failure {
                return Err(e);
            }
        }

        if !state.pending.is_empty() {
            self.resolve_deferred(&mut state, repo)?;
        }

        state.stats.users = state.users.len();
        state.stats.users_created = state.users.created();
        let stats = state.stats;

        info!("*** users {}", stats.users);
        info!("*** posts {}", stats.posts_created);
        match stats.limit {
            Some(limit) => info!("*** post limit: {limit}"),
            None => info!("*** post limit: none"),
        }
        info!(
            "*** skipped posts due to size: {}",
            stats.skipped(SkipReason::TooLarge)
        );
        info!(
            "*** skipped posts due to missing parent: {}",
            stats.skipped(SkipReason::MissingParent)
        );

        if self.options.dry_run {
            info!("*** dry run, no data saved");
            return Ok(stats);
        }

        finalize::recount(repo)?;
        repo.flush()?;
        Ok(stats)
    }

    /// Turn a raw record into a candidate post body, or count why not.
    fn prepare(&self, raw: &[u8], stats: &mut ImportStats) -> Option<ParsedMessage> {
        let mut msg = match self.unpacker.unpack(raw) {
            Ok(msg) => msg,
            Err(reason) => {
                debug!(reason = %reason, "Skipping record");
                stats.skip(reason);
                return None;
            }
        };

        if msg.sender.email.is_empty() {
            debug!(id = %msg.id, "Skipping record without sender email");
            stats.skip(SkipReason::MissingEmail);
            return None;
        }
        if msg.subject.trim().is_empty() {
            debug!(id = %msg.id, "Skipping record with empty subject");
            stats.skip(SkipReason::EmptySubject);
            return None;
        }

        let text = match self.fetcher {
            Some(fetcher) => fetcher.resolve(&msg.body),
            None => std::mem::take(&mut msg.body),
        };
        msg.body = self.formatter.format(&text);

        if let Some(max) = self.options.max_body_size {
            if msg.body.len() > max {
                debug!(id = %msg.id, size = msg.body.len(), max, "Skipping oversized body");
                stats.skip(SkipReason::TooLarge);
                return None;
            }
        }
        Some(msg)
    }

    fn accept(
        &self,
        msg: ParsedMessage,
        state: &mut ImportState,
        repo: &mut dyn Repository,
    ) -> Result<()> {
        info!("*** {} parsing {}", msg.date.format("%Y-%m-%d"), msg.subject);

        let link = state.threads.link(msg.reply_to.as_deref());
        if let Link::Orphan(reply_to) = &link {
            if self.options.orphan_policy == OrphanPolicy::Drop {
                info!(id = %msg.id, reply_to = %reply_to, "Parent not found, dropping reply");
                state.stats.skip(SkipReason::MissingParent);
                return Ok(());
            }
        }
        state.stats.accepted += 1;

        state
            .users
            .resolve(&msg.sender, msg.date, &mut *repo, self.options.dry_run)?;

        match link {
            Link::Root => self.create_post(&msg, None, state, repo),
            Link::Reply(parent) => self.create_post(&msg, Some(&parent), state, repo),
            Link::Orphan(reply_to) => match self.options.orphan_policy {
                OrphanPolicy::Defer => {
                    debug!(id = %msg.id, reply_to = %reply_to, "Parent not seen yet, deferring reply");
                    state.pending.push(PendingReply {
                        message: msg,
                        reply_to,
                    });
                    Ok(())
                }
                _ => {
                    warn!(id = %msg.id, reply_to = %reply_to, "Parent not found, promoting reply to a new thread");
                    state.stats.orphans_promoted += 1;
                    self.create_post(&msg, None, state, repo)
                }
            },
        }
    }

    /// Build and (unless dry run) store one post, then remember it for
    /// linking later replies.
    fn create_post(
        &self,
        msg: &ParsedMessage,
        parent: Option<&ThreadNode>,
        state: &mut ImportState,
        repo: &mut dyn Repository,
    ) -> Result<()> {
        let id = state.allocate_id();
        let post_type = PostType::for_parent(parent.map(|p| p.post_type));
        let (root, title, tags) = match parent {
            Some(p) => (p.root, p.title.clone(), Vec::new()),
            None => (id, normalize_title(&msg.subject), self.options.tags.clone()),
        };

        let node = ThreadNode {
            id,
            root,
            post_type,
            title: title.clone(),
        };

        if !self.options.dry_run {
            repo.insert_post(PostRecord {
                id,
                message_id: msg.id.clone(),
                parent: parent.map(|p| p.id),
                root,
                post_type,
                title,
                body: msg.body.clone(),
                author: msg.sender.email.clone(),
                creation_date: msg.date,
                lastedit_date: msg.date,
                rank: msg.date,
                tags,
                vote_count: 0,
                book_count: 0,
                accept_count: 0,
                reply_count: 0,
                has_accepted: false,
            })?;
            if let Some(p) = parent {
                if let Some(mut parent_post) = repo.find_post(p.id)? {
                    parent_post.reply_count += 1;
                    repo.update_post(&parent_post)?;
                }
            }
        }

        info!("--- creating {}: {}", post_type.display(), node.title);
        state.stats.record_post(post_type);
        state.threads.register(&msg.id, node);
        Ok(())
    }

    /// Link deferred replies whose parent arrived later. When a pass makes
    /// no progress the oldest remaining reply becomes a root, which may in
    /// turn resolve others.
    fn resolve_deferred(&self, state: &mut ImportState, repo: &mut dyn Repository) -> Result<()> {
        let mut pending = std::mem::take(&mut state.pending);
        info!("*** resolving {} deferred replies", pending.len());

        while !pending.is_empty() {
            let before = pending.len();
            let mut unresolved = Vec::with_capacity(before);
            for reply in pending {
                match state.threads.link(Some(&reply.reply_to)) {
                    Link::Reply(parent) => {
                        state.stats.orphans_relinked += 1;
                        self.create_post(&reply.message, Some(&parent), state, &mut *repo)?;
                    }
                    _ => unresolved.push(reply),
                }
            }
            pending = unresolved;

            if pending.len() == before {
                let first = pending.remove(0);
                warn!(
                    id = %first.message.id,
                    reply_to = %first.reply_to,
                    "Parent never arrived, promoting reply to a new thread"
                );
                state.stats.orphans_promoted += 1;
                self.create_post(&first.message, None, state, &mut *repo)?;
            }
        }
        Ok(())
    }
}
