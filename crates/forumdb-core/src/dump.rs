//! On-disk format written by an external collector and read by
//! `forumdb-cli ingest`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::communities::NewCommunity;
use crate::content::{NewComment, NewPost};
use crate::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionDump {
    /// Community metadata as seen at collection time; refreshes the stored row.
    #[serde(default)]
    pub community: Option<NewCommunity>,
    #[serde(default)]
    pub posts: Vec<DumpPost>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DumpPost {
    #[serde(flatten)]
    pub post: NewPost,
    #[serde(default)]
    pub comments: Vec<NewComment>,
}

impl CollectionDump {
    #[must_use]
    pub fn comment_count(&self) -> usize {
        self.posts.iter().map(|p| p.comments.len()).sum()
    }
}

/// Read a collection dump from a JSON file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read or is not a valid dump.
pub fn load_dump(path: &Path) -> Result<CollectionDump, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::DumpFileIo {
        path: path.display().to_string(),
        source: e,
    })?;
    serde_json::from_str(&content).map_err(ConfigError::DumpFileParse)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dump_parses_nested_comments() {
        let raw = r#"{
            "community": {"name": "golang", "subscribers": 250000},
            "posts": [
                {
                    "reddit_id": "abc123",
                    "title": "Generics in practice",
                    "score": 42,
                    "upvote_ratio": 0.93,
                    "created_utc": "2026-10-01T12:00:00Z",
                    "comments": [
                        {"reddit_id": "c1", "body": "nice", "score": 3},
                        {"reddit_id": "c2", "parent_reddit_id": "c1", "depth": 1}
                    ]
                },
                {"reddit_id": "def456", "title": "No comments here"}
            ]
        }"#;

        let dump: CollectionDump = serde_json::from_str(raw).unwrap();
        assert_eq!(dump.posts.len(), 2);
        assert_eq!(dump.comment_count(), 2);
        assert_eq!(dump.posts[0].post.score, Some(42));
        assert_eq!(dump.posts[0].comments[1].parent_reddit_id.as_deref(), Some("c1"));
        assert!(dump.posts[1].comments.is_empty());
        assert_eq!(
            dump.community.as_ref().map(|c| c.name.as_str()),
            Some("golang")
        );
    }

    #[test]
    fn missing_dump_file_is_io_error() {
        let err = load_dump(Path::new("/nonexistent/dump.json")).unwrap_err();
        assert!(matches!(err, ConfigError::DumpFileIo { .. }));
    }
}
