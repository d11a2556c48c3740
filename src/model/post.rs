//! Forum posts: questions, answers and comments.

use chrono::{DateTime, Utc};

/// Store-assigned post identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct PostId(pub u64);

impl std::fmt::Display for PostId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for PostId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(PostId)
    }
}

/// Position of a post in its thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostType {
    /// A thread root.
    Question,
    /// A direct reply to a question.
    Answer,
    /// A reply to an answer or to another comment.
    Comment,
}

impl PostType {
    /// Type of a post replying to a parent of type `parent`, or a root when `None`.
    pub fn for_parent(parent: Option<PostType>) -> Self {
        match parent {
            None => PostType::Question,
            Some(p) if p.is_toplevel() => PostType::Answer,
            Some(_) => PostType::Comment,
        }
    }

    pub fn is_toplevel(self) -> bool {
        self == PostType::Question
    }

    pub fn display(self) -> &'static str {
        match self {
            PostType::Question => "Question",
            PostType::Answer => "Answer",
            PostType::Comment => "Comment",
        }
    }
}

impl std::fmt::Display for PostType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display())
    }
}

/// A persisted forum post.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PostRecord {
    pub id: PostId,
    /// `Message-ID` of the mail this post was imported from (may be empty).
    pub message_id: String,
    pub parent: Option<PostId>,
    /// Thread root; equals `id` for questions.
    pub root: PostId,
    pub post_type: PostType,
    pub title: String,
    /// Formatted body markup.
    pub body: String,
    /// Author email.
    pub author: String,
    pub creation_date: DateTime<Utc>,
    pub lastedit_date: DateTime<Utc>,
    /// Ordering key for listings; starts at the creation date.
    pub rank: DateTime<Utc>,
    pub tags: Vec<String>,
    pub vote_count: i64,
    pub book_count: i64,
    pub accept_count: i64,
    /// Number of direct replies.
    pub reply_count: i64,
    /// Set on questions once any answer is accepted.
    pub has_accepted: bool,
}

impl PostRecord {
    pub fn is_toplevel(&self) -> bool {
        self.post_type.is_toplevel()
    }
}

/// Normalize a mail subject into a question title.
///
/// Joins lines, collapses whitespace runs, and title-cases each word
/// (first letter upper, rest lower; apostrophes do not start a new word).
pub fn normalize_title(subject: &str) -> String {
    let collapsed = subject.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut out = String::with_capacity(collapsed.len());
    let mut in_word = false;
    for ch in collapsed.chars() {
        if ch.is_alphabetic() {
            if in_word {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(ch);
            in_word = in_word && ch == '\'';
        }
    }
    out
}

/// Split a free-text tag value on commas and whitespace.
pub fn parse_tags(raw: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in raw.split(|c: char| c == ',' || c.is_whitespace()) {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}
