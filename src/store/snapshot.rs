//! File-backed repository.
//!
//! The whole store is held in a [`MemoryRepository`] and written back as one
//! snapshot on [`Repository::flush`]. Writes go to a temporary sibling file
//! that is renamed over the old snapshot, so a crash never leaves a
//! half-written store behind.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::format::{SnapshotHeader, HEADER_SIZE};
use super::{MemoryRepository, Repository};
use crate::error::{ImportError, Result};
use crate::model::forum::{Subscription, Vote, VoteKind};
use crate::model::post::{PostId, PostRecord};
use crate::model::user::UserIdentity;

/// Repository persisted to a single snapshot file.
#[derive(Debug)]
pub struct SnapshotRepository {
    path: PathBuf,
    inner: MemoryRepository,
    dirty: bool,
}

impl SnapshotRepository {
    /// Open the snapshot at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let inner = if path.exists() {
            load(&path)?
        } else {
            debug!(path = %path.display(), "No snapshot yet, starting empty");
            MemoryRepository::new()
        };
        Ok(Self {
            path,
            inner,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read-only view of the loaded data.
    pub fn data(&self) -> &MemoryRepository {
        &self.inner
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn touch(&mut self) {
        self.dirty = true;
    }
}

fn load(path: &Path) -> Result<MemoryRepository> {
    let data = std::fs::read(path).map_err(|e| ImportError::io(path, e))?;
    let invalid = |reason: String| ImportError::InvalidSnapshot {
        path: path.to_path_buf(),
        reason,
    };

    if data.len() < HEADER_SIZE {
        return Err(invalid("File too small".into()));
    }
    let header: SnapshotHeader = bincode::deserialize(&data[..HEADER_SIZE])
        .map_err(|e| invalid(format!("Bad header: {e}")))?;
    header.validate().map_err(invalid)?;

    let payload = &data[HEADER_SIZE..];
    header.verify_payload(payload).map_err(invalid)?;

    let repo: MemoryRepository =
        bincode::deserialize(payload).map_err(|e| invalid(format!("Bad payload: {e}")))?;
    if repo.user_count() as u64 != header.user_count
        || repo.post_count() as u64 != header.post_count
    {
        return Err(invalid("Record counts do not match header".into()));
    }

    info!(
        path = %path.display(),
        users = repo.user_count(),
        posts = repo.post_count(),
        "Loaded store snapshot"
    );
    Ok(repo)
}

fn save(path: &Path, repo: &MemoryRepository) -> Result<()> {
    let payload = bincode::serialize(repo)?;
    let header = SnapshotHeader::for_payload(
        &payload,
        repo.user_count() as u64,
        repo.post_count() as u64,
    );
    let header_bytes = bincode::serialize(&header)?;

    let mut padded_header = vec![0u8; HEADER_SIZE];
    let copy_len = header_bytes.len().min(HEADER_SIZE);
    padded_header[..copy_len].copy_from_slice(&header_bytes[..copy_len]);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| ImportError::io(parent, e))?;
        }
    }

    let tmp = path.with_extension("tmp");
    {
        let mut file = std::fs::File::create(&tmp).map_err(|e| ImportError::io(&tmp, e))?;
        file.write_all(&padded_header)
            .map_err(|e| ImportError::io(&tmp, e))?;
        file.write_all(&payload)
            .map_err(|e| ImportError::io(&tmp, e))?;
        file.sync_all().map_err(|e| ImportError::io(&tmp, e))?;
    }
    std::fs::rename(&tmp, path).map_err(|e| ImportError::io(path, e))?;

    debug!(path = %path.display(), bytes = HEADER_SIZE + payload.len(), "Store snapshot written");
    Ok(())
}

impl Repository for SnapshotRepository {
    fn find_user(&self, email: &str) -> Result<Option<UserIdentity>> {
        self.inner.find_user(email)
    }

    fn insert_user(&mut self, user: UserIdentity) -> Result<()> {
        self.inner.insert_user(user)?;
        self.touch();
        Ok(())
    }

    fn update_user(&mut self, user: &UserIdentity) -> Result<()> {
        self.inner.update_user(user)?;
        self.touch();
        Ok(())
    }

    fn users(&self) -> Result<Vec<UserIdentity>> {
        self.inner.users()
    }

    fn find_post(&self, id: PostId) -> Result<Option<PostRecord>> {
        self.inner.find_post(id)
    }

    fn insert_post(&mut self, post: PostRecord) -> Result<()> {
        self.inner.insert_post(post)?;
        self.touch();
        Ok(())
    }

    fn update_post(&mut self, post: &PostRecord) -> Result<()> {
        self.inner.update_post(post)?;
        self.touch();
        Ok(())
    }

    fn posts(&self) -> Result<Vec<PostRecord>> {
        self.inner.posts()
    }

    fn posts_by_author(&self, email: &str) -> Result<Vec<PostRecord>> {
        self.inner.posts_by_author(email)
    }

    fn next_post_id(&self) -> Result<PostId> {
        self.inner.next_post_id()
    }

    fn find_vote(&self, post: PostId, user: &str, kind: VoteKind) -> Result<Option<Vote>> {
        self.inner.find_vote(post, user, kind)
    }

    fn insert_vote(&mut self, vote: Vote) -> Result<()> {
        self.inner.insert_vote(vote)?;
        self.touch();
        Ok(())
    }

    fn delete_vote(&mut self, post: PostId, user: &str, kind: VoteKind) -> Result<bool> {
        let removed = self.inner.delete_vote(post, user, kind)?;
        if removed {
            self.touch();
        }
        Ok(removed)
    }

    fn subscription(&self, root: PostId, user: &str) -> Result<Option<Subscription>> {
        self.inner.subscription(root, user)
    }

    fn set_subscription(&mut self, sub: Subscription) -> Result<()> {
        self.inner.set_subscription(sub)?;
        self.touch();
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        save(&self.path, &self.inner)?;
        self.dirty = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_missing_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let repo = SnapshotRepository::open(dir.path().join("forum.db")).unwrap();
        assert!(repo.users().unwrap().is_empty());
        assert!(!repo.is_dirty());
    }

    #[test]
    fn test_flush_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("forum.db");
        let now = Utc::now();

        let mut repo = SnapshotRepository::open(&path).unwrap();
        repo.insert_user(UserIdentity::new("a@b.org", "A", now))
            .unwrap();
        assert!(repo.is_dirty());
        repo.flush().unwrap();
        assert!(!repo.is_dirty());
        assert!(path.is_file());
        assert!(!path.with_extension("tmp").exists());

        let reopened = SnapshotRepository::open(&path).unwrap();
        let user = reopened.find_user("a@b.org").unwrap().unwrap();
        assert_eq!(user.name, "A");
        assert_eq!(user.date_joined, now);
    }

    #[test]
    fn test_corrupt_payload_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forum.db");
        let mut repo = SnapshotRepository::open(&path).unwrap();
        repo.insert_user(UserIdentity::new("a@b.org", "A", Utc::now()))
            .unwrap();
        repo.flush().unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        std::fs::write(&path, bytes).unwrap();

        let err = SnapshotRepository::open(&path).unwrap_err();
        assert!(matches!(err, ImportError::InvalidSnapshot { .. }));
    }

    #[test]
    fn test_foreign_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forum.db");
        std::fs::write(&path, vec![7u8; 300]).unwrap();
        let err = SnapshotRepository::open(&path).unwrap_err();
        assert!(matches!(err, ImportError::InvalidSnapshot { .. }));
    }
}
