//! Input records for posts, comments, and author profiles, with the column
//! bounds the schema enforces checked up front.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::CoreError;

/// `posts.reddit_id`, `comments.reddit_id`, and `comments.parent_reddit_id` are `VARCHAR(20)`.
pub const MAX_EXTERNAL_ID_LEN: usize = 20;
/// `authors.username` and the `author_name` columns are `VARCHAR(50)`.
pub const MAX_USERNAME_LEN: usize = 50;
/// `communities.name` is `VARCHAR(50)`.
pub const MAX_COMMUNITY_NAME_LEN: usize = 50;

const MAX_FLAIR_LEN: usize = 100;
const MAX_PERMALINK_LEN: usize = 500;

/// A submission as handed over by the collector, before it has a row id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPost {
    pub reddit_id: String,
    pub title: String,
    #[serde(default)]
    pub selftext: Option<String>,
    #[serde(default)]
    pub author_name: Option<String>,
    #[serde(default)]
    pub score: Option<i32>,
    /// Fraction of votes that are upvotes, `0.0..=1.0`.
    #[serde(default)]
    pub upvote_ratio: Option<f64>,
    #[serde(default)]
    pub num_comments: Option<i32>,
    #[serde(default)]
    pub flair_text: Option<String>,
    #[serde(default = "default_true")]
    pub is_self: bool,
    #[serde(default)]
    pub is_video: bool,
    #[serde(default)]
    pub permalink: Option<String>,
    #[serde(default)]
    pub created_utc: Option<DateTime<Utc>>,
}

impl NewPost {
    /// Minimal post with only the required fields set.
    #[must_use]
    pub fn new(reddit_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            reddit_id: reddit_id.into(),
            title: title.into(),
            selftext: None,
            author_name: None,
            score: None,
            upvote_ratio: None,
            num_comments: None,
            flair_text: None,
            is_self: true,
            is_video: false,
            permalink: None,
            created_utc: None,
        }
    }

    /// # Errors
    ///
    /// Returns [`CoreError`] if an identifier is empty, a bounded column
    /// would overflow, or a numeric field is out of range.
    pub fn validate(&self) -> Result<(), CoreError> {
        require_bounded("post reddit_id", &self.reddit_id, MAX_EXTERNAL_ID_LEN)?;
        if self.title.trim().is_empty() {
            return Err(CoreError::Empty {
                field: "post title",
            });
        }
        check_optional_len("post author_name", self.author_name.as_deref(), MAX_USERNAME_LEN)?;
        check_optional_len("post flair_text", self.flair_text.as_deref(), MAX_FLAIR_LEN)?;
        check_optional_len("post permalink", self.permalink.as_deref(), MAX_PERMALINK_LEN)?;

        if let Some(ratio) = self.upvote_ratio {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(CoreError::OutOfRange {
                    field: "post upvote_ratio",
                    reason: format!("{ratio} is outside 0.0..=1.0"),
                });
            }
        }
        if let Some(n) = self.num_comments {
            if n < 0 {
                return Err(CoreError::OutOfRange {
                    field: "post num_comments",
                    reason: format!("{n} is negative"),
                });
            }
        }
        Ok(())
    }
}

/// A reply as handed over by the collector.
///
/// `parent_reddit_id` is the external id of the parent *comment*; top-level
/// replies to the post carry `None`. See [`parent_from_fullname`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewComment {
    pub reddit_id: String,
    #[serde(default)]
    pub parent_reddit_id: Option<String>,
    #[serde(default)]
    pub author_name: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub score: Option<i32>,
    #[serde(default)]
    pub depth: i32,
    #[serde(default)]
    pub is_submitter: bool,
    #[serde(default)]
    pub created_utc: Option<DateTime<Utc>>,
}

impl NewComment {
    #[must_use]
    pub fn new(reddit_id: impl Into<String>) -> Self {
        Self {
            reddit_id: reddit_id.into(),
            parent_reddit_id: None,
            author_name: None,
            body: None,
            score: None,
            depth: 0,
            is_submitter: false,
            created_utc: None,
        }
    }

    /// Rewrite a fullname-style parent pointer (`t1_...`, `t3_...`) to the
    /// bare parent comment id. Bare ids are kept as they are; an empty one
    /// is dropped.
    pub fn normalize_parent(&mut self) {
        self.parent_reddit_id = match self.parent_reddit_id.take() {
            Some(parent) if parent.starts_with("t1_") || parent.starts_with("t3_") => {
                parent_from_fullname(&parent)
            }
            Some(parent) if parent.trim().is_empty() => None,
            other => other,
        };
    }

    /// # Errors
    ///
    /// Returns [`CoreError`] if an identifier is empty or too long, or the
    /// depth is negative.
    pub fn validate(&self) -> Result<(), CoreError> {
        require_bounded("comment reddit_id", &self.reddit_id, MAX_EXTERNAL_ID_LEN)?;
        check_optional_len(
            "comment parent_reddit_id",
            self.parent_reddit_id.as_deref(),
            MAX_EXTERNAL_ID_LEN,
        )?;
        check_optional_len("comment author_name", self.author_name.as_deref(), MAX_USERNAME_LEN)?;
        if self.depth < 0 {
            return Err(CoreError::OutOfRange {
                field: "comment depth",
                reason: format!("{} is negative", self.depth),
            });
        }
        Ok(())
    }
}

/// A reputation snapshot for one forum user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorProfile {
    pub username: String,
    #[serde(default)]
    pub link_karma: Option<i32>,
    #[serde(default)]
    pub comment_karma: Option<i32>,
    #[serde(default)]
    pub total_karma: Option<i32>,
    #[serde(default)]
    pub account_created_utc: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_gold: bool,
}

impl AuthorProfile {
    #[must_use]
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            link_karma: None,
            comment_karma: None,
            total_karma: None,
            account_created_utc: None,
            is_gold: false,
        }
    }

    /// The reported total, or the sum of link and comment karma when the
    /// forum omitted it.
    #[must_use]
    pub fn effective_total_karma(&self) -> Option<i32> {
        self.total_karma.or(match (self.link_karma, self.comment_karma) {
            (Some(link), Some(comment)) => Some(link.saturating_add(comment)),
            _ => None,
        })
    }

    /// # Errors
    ///
    /// Returns [`CoreError`] if the username is empty or longer than
    /// [`MAX_USERNAME_LEN`].
    pub fn validate(&self) -> Result<(), CoreError> {
        require_bounded("author username", &self.username, MAX_USERNAME_LEN)
    }
}

/// Where a stored comment's parent lives.
///
/// Comments can arrive out of order, and a parent may belong to a different
/// run, so the parent is only linked by row id when it was already present
/// in the same run at insert time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParentRef {
    Resolved { comment_id: i64, external_id: String },
    Unresolved(String),
}

impl ParentRef {
    /// Rebuild the reference from the two stored columns.
    #[must_use]
    pub fn from_columns(
        parent_comment_id: Option<i64>,
        parent_reddit_id: Option<&str>,
    ) -> Option<Self> {
        match (parent_comment_id, parent_reddit_id) {
            (Some(comment_id), Some(external)) => Some(Self::Resolved {
                comment_id,
                external_id: external.to_string(),
            }),
            (None, Some(external)) => Some(Self::Unresolved(external.to_string())),
            // A resolved id without the by-value string cannot be written by
            // this crate; treat it as no parent.
            (_, None) => None,
        }
    }

    #[must_use]
    pub fn external_id(&self) -> &str {
        match self {
            Self::Resolved { external_id, .. } | Self::Unresolved(external_id) => external_id,
        }
    }

    #[must_use]
    pub fn comment_id(&self) -> Option<i64> {
        match self {
            Self::Resolved { comment_id, .. } => Some(*comment_id),
            Self::Unresolved(_) => None,
        }
    }
}

/// Map a forum "fullname" parent pointer to a parent comment id.
///
/// `t1_abc` names comment `abc`. `t3_...` names the submission itself, which
/// means the reply is top-level and has no parent comment.
#[must_use]
pub fn parent_from_fullname(fullname: &str) -> Option<String> {
    fullname
        .strip_prefix("t1_")
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// Collapse repeated comments by `reddit_id` before they are inserted.
///
/// `comments` has no uniqueness guard per run, so callers that need
/// idempotent writes de-duplicate here. The first occurrence keeps its
/// position; the last occurrence supplies the field values.
#[must_use]
pub fn dedupe_comments(comments: Vec<NewComment>) -> Vec<NewComment> {
    let mut index: HashMap<String, usize> = HashMap::with_capacity(comments.len());
    let mut out: Vec<NewComment> = Vec::with_capacity(comments.len());

    for comment in comments {
        if let Some(&pos) = index.get(&comment.reddit_id) {
            out[pos] = comment;
        } else {
            index.insert(comment.reddit_id.clone(), out.len());
            out.push(comment);
        }
    }

    out
}

fn default_true() -> bool {
    true
}

fn require_bounded(field: &'static str, value: &str, max: usize) -> Result<(), CoreError> {
    if value.trim().is_empty() {
        return Err(CoreError::Empty { field });
    }
    check_len(field, value, max)
}

fn check_optional_len(
    field: &'static str,
    value: Option<&str>,
    max: usize,
) -> Result<(), CoreError> {
    value.map_or(Ok(()), |v| check_len(field, v, max))
}

// Postgres VARCHAR(n) counts characters, not bytes.
fn check_len(field: &'static str, value: &str, max: usize) -> Result<(), CoreError> {
    let actual = value.chars().count();
    if actual > max {
        return Err(CoreError::TooLong { field, max, actual });
    }
    Ok(())
}
