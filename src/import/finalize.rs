//! End-of-run recomputation of user scores and last-seen dates.

use tracing::{debug, info};

use crate::error::Result;
use crate::store::Repository;

/// What a recount changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct RecountSummary {
    pub users: usize,
    pub updated: usize,
}

/// Set every stored user's score to the number of posts they authored and
/// their `last_login` to their newest post's creation date.
///
/// This walks all users in the store, not only those touched by the run
/// that triggered it. Users without posts get a score of zero and keep
/// their `last_login`.
pub fn recount(repo: &mut dyn Repository) -> Result<RecountSummary> {
    info!("*** updating user scores");
    let users = repo.users()?;
    let mut summary = RecountSummary {
        users: users.len(),
        updated: 0,
    };

    for mut user in users {
        let posts = repo.posts_by_author(&user.email)?;
        let score = posts.len() as i64;
        let latest = posts.iter().map(|p| p.creation_date).max();

        let mut changed = user.score != score;
        user.score = score;
        if let Some(latest) = latest {
            changed |= user.last_login != latest;
            user.last_login = latest;
        }

        if changed {
            debug!(email = %user.email, score, "User recounted");
            repo.update_user(&user)?;
            summary.updated += 1;
        }
    }
    Ok(summary)
}
