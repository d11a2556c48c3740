//! Forum storage: the [`Repository`] capability the importer and forum
//! actions are written against, plus two implementations.
//!
//! - [`MemoryRepository`]: maps in memory; tests and dry runs.
//! - [`SnapshotRepository`]: the same maps persisted to a single checksummed file.

pub mod format;
pub mod memory;
pub mod snapshot;

use crate::error::Result;
use crate::model::forum::{Subscription, Vote, VoteKind};
use crate::model::post::{PostId, PostRecord};
use crate::model::user::UserIdentity;

pub use memory::MemoryRepository;
pub use snapshot::SnapshotRepository;

/// Create / find / update operations over users, posts, votes and subscriptions.
///
/// Every mutation is a single atomic step: a record is either fully stored
/// or not stored at all.
pub trait Repository {
    /// Look up a user by lower-cased email.
    fn find_user(&self, email: &str) -> Result<Option<UserIdentity>>;
    /// Store a new user. Fails if the email is already taken.
    fn insert_user(&mut self, user: UserIdentity) -> Result<()>;
    /// Replace an existing user.
    fn update_user(&mut self, user: &UserIdentity) -> Result<()>;
    /// All users, ordered by email.
    fn users(&self) -> Result<Vec<UserIdentity>>;

    fn find_post(&self, id: PostId) -> Result<Option<PostRecord>>;
    /// Store a new post. Fails if the id is already taken.
    fn insert_post(&mut self, post: PostRecord) -> Result<()>;
    /// Replace an existing post.
    fn update_post(&mut self, post: &PostRecord) -> Result<()>;
    /// All posts, ordered by id.
    fn posts(&self) -> Result<Vec<PostRecord>>;
    fn posts_by_author(&self, email: &str) -> Result<Vec<PostRecord>>;
    /// The id the next inserted post should use.
    fn next_post_id(&self) -> Result<PostId>;

    fn find_vote(&self, post: PostId, user: &str, kind: VoteKind) -> Result<Option<Vote>>;
    fn insert_vote(&mut self, vote: Vote) -> Result<()>;
    /// Remove a vote; returns whether one existed.
    fn delete_vote(&mut self, post: PostId, user: &str, kind: VoteKind) -> Result<bool>;

    fn subscription(&self, root: PostId, user: &str) -> Result<Option<Subscription>>;
    /// Create or replace the subscription for `(root, user)`.
    fn set_subscription(&mut self, sub: Subscription) -> Result<()>;

    /// Make all previous mutations durable.
    fn flush(&mut self) -> Result<()>;
}
