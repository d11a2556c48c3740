//! User resolution: sender email → identity, creating identities lazily.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::Result;
use crate::model::address::Sender;
use crate::model::user::UserIdentity;
use crate::store::Repository;

/// Every identity known to this run, keyed by lower-cased email.
#[derive(Debug, Default)]
pub struct UserResolver {
    known: HashMap<String, UserIdentity>,
    created: usize,
}

impl UserResolver {
    /// Start from every user already in the store.
    pub fn preload(repo: &dyn Repository) -> Result<Self> {
        let known = repo
            .users()?
            .into_iter()
            .map(|u| (u.email.clone(), u))
            .collect();
        Ok(Self { known, created: 0 })
    }

    /// Identity for `sender`, created on first sight.
    ///
    /// A new identity is stamped with the message date, not the wall clock,
    /// and keeps the first display name seen. It is written to `repo` unless
    /// `dry_run`; either way later calls with the same email return it.
    pub fn resolve(
        &mut self,
        sender: &Sender,
        seen: DateTime<Utc>,
        repo: &mut dyn Repository,
        dry_run: bool,
    ) -> Result<&UserIdentity> {
        if !self.known.contains_key(&sender.email) {
            let name = sender.display_name().to_string();
            info!("--- creating user name:{}, email:{}", name, sender.email);
            let user = UserIdentity::new(sender.email.clone(), name, seen);
            if !dry_run {
                repo.insert_user(user.clone())?;
            }
            self.created += 1;
            self.known.insert(sender.email.clone(), user);
        }
        // Just inserted or already present.
        Ok(&self.known[&sender.email])
    }

    pub fn get(&self, email: &str) -> Option<&UserIdentity> {
        self.known.get(email)
    }

    /// Number of identities known, preloaded ones included.
    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    /// Identities created during this run.
    pub fn created(&self) -> usize {
        self.created
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryRepository;
    use chrono::TimeZone;

    fn sender(name: &str, email: &str) -> Sender {
        Sender {
            name: name.into(),
            email: email.into(),
        }
    }

    #[test]
    fn test_first_name_wins() {
        let mut repo = MemoryRepository::new();
        let mut resolver = UserResolver::preload(&repo).unwrap();
        let d1 = Utc.with_ymd_and_hms(2009, 1, 5, 10, 0, 0).unwrap();
        let d2 = Utc.with_ymd_and_hms(2009, 2, 1, 10, 0, 0).unwrap();

        resolver
            .resolve(&sender("Jane Doe", "jane@x.org"), d1, &mut repo, false)
            .unwrap();
        let user = resolver
            .resolve(&sender("J. Doe", "jane@x.org"), d2, &mut repo, false)
            .unwrap();
        assert_eq!(user.name, "Jane Doe");
        assert_eq!(user.date_joined, d1);
        assert_eq!(user.last_login, d1);
        assert_eq!(resolver.created(), 1);
        assert_eq!(repo.users().unwrap().len(), 1);
    }

    #[test]
    fn test_preloaded_users_are_reused() {
        let mut repo = MemoryRepository::new();
        let joined = Utc.with_ymd_and_hms(2008, 1, 1, 0, 0, 0).unwrap();
        repo.insert_user(UserIdentity::new("old@x.org", "Old", joined))
            .unwrap();

        let mut resolver = UserResolver::preload(&repo).unwrap();
        assert_eq!(resolver.len(), 1);
        let user = resolver
            .resolve(&sender("New Name", "old@x.org"), Utc::now(), &mut repo, false)
            .unwrap();
        assert_eq!(user.name, "Old");
        assert_eq!(resolver.created(), 0);
    }

    #[test]
    fn test_dry_run_does_not_persist() {
        let mut repo = MemoryRepository::new();
        let mut resolver = UserResolver::preload(&repo).unwrap();
        resolver
            .resolve(&sender("", "anon@x.org"), Utc::now(), &mut repo, true)
            .unwrap();
        assert!(repo.users().unwrap().is_empty());
        assert_eq!(resolver.get("anon@x.org").unwrap().name, "anon");
    }
}
