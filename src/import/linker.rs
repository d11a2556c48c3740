//! Thread linking: resolving each message's parent through its
//! `In-Reply-To` id.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::post::{PostId, PostType};

/// What to do with a reply whose parent id was never seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrphanPolicy {
    /// Turn the reply into a new thread root.
    #[default]
    Promote,
    /// Skip the reply and count it as missing its parent.
    Drop,
    /// Hold the reply until the end of the stream and link it if the
    /// parent showed up later; promote what is still unresolved.
    Defer,
}

impl std::str::FromStr for OrphanPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "promote" => Ok(OrphanPolicy::Promote),
            "drop" => Ok(OrphanPolicy::Drop),
            "defer" => Ok(OrphanPolicy::Defer),
            other => Err(format!("unknown orphan policy '{other}'")),
        }
    }
}

impl std::fmt::Display for OrphanPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            OrphanPolicy::Promote => "promote",
            OrphanPolicy::Drop => "drop",
            OrphanPolicy::Defer => "defer",
        })
    }
}

/// What the linker remembers about a post created earlier in the run.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadNode {
    pub id: PostId,
    pub root: PostId,
    pub post_type: PostType,
    /// Title of the thread root.
    pub title: String,
}

/// Result of resolving one message.
#[derive(Debug, Clone, PartialEq)]
pub enum Link {
    /// No `In-Reply-To`: a new thread.
    Root,
    /// Parent found.
    Reply(ThreadNode),
    /// `In-Reply-To` names a message that has not been seen.
    Orphan(String),
}

impl Link {
    /// Post type for a message linked this way. Orphans are typed as roots.
    pub fn post_type(&self) -> PostType {
        match self {
            Link::Reply(parent) => PostType::for_parent(Some(parent.post_type)),
            Link::Root | Link::Orphan(_) => PostType::Question,
        }
    }
}

/// Message-id → post map for one import run.
#[derive(Debug, Default)]
pub struct ThreadLinker {
    nodes: HashMap<String, ThreadNode>,
}

impl ThreadLinker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the parent named by `reply_to`.
    pub fn link(&self, reply_to: Option<&str>) -> Link {
        match reply_to {
            None => Link::Root,
            Some(id) if id.is_empty() => Link::Root,
            Some(id) => match self.nodes.get(id) {
                Some(node) => Link::Reply(node.clone()),
                None => Link::Orphan(id.to_string()),
            },
        }
    }

    /// Remember a created post under its message id.
    ///
    /// Empty ids are never registered. A repeated id replaces the earlier
    /// entry, so later replies attach to the most recent message with it.
    pub fn register(&mut self, message_id: &str, node: ThreadNode) {
        if message_id.is_empty() {
            return;
        }
        self.nodes.insert(message_id.to_string(), node);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
