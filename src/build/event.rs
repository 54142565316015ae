//! CI event metadata and the tag prefix derived from it

use crate::error::{DockhandError, DockhandResult};
use serde::Deserialize;
use std::fmt;
use std::path::Path;

/// Prefix of the second image tag, derived from what triggered the job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagPrefix {
    /// Push to the default branch, or a scheduled run
    DefaultBranch(String),
    /// Push of a git tag
    Tag,
    /// Pull request, by number
    PullRequest(u64),
}

impl TagPrefix {
    /// Tag portion after the repository: `{prefix}-{sha}`
    pub fn render(&self, sha: &str) -> String {
        format!("{}-{}", self, sha)
    }
}

impl fmt::Display for TagPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Branch names may hold characters a docker tag cannot
            Self::DefaultBranch(branch) => {
                let sanitized: String = branch
                    .chars()
                    .map(|c| {
                        if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                            c
                        } else {
                            '-'
                        }
                    })
                    .collect();
                write!(f, "{}", sanitized)
            }
            Self::Tag => write!(f, "tag"),
            Self::PullRequest(number) => write!(f, "pr-{}", number),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct EventPayload {
    repository: Option<RepositoryInfo>,
    pull_request: Option<NumberedItem>,
    number: Option<u64>,
    issue: Option<IssueInfo>,
}

#[derive(Debug, Deserialize)]
struct RepositoryInfo {
    default_branch: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NumberedItem {
    number: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct IssueInfo {
    number: Option<u64>,
    /// Present only when the issue is a pull request
    pull_request: Option<serde_json::Value>,
}

/// The event that triggered the job
#[derive(Debug)]
pub struct CiEvent {
    name: String,
    git_ref: String,
    payload: EventPayload,
}

impl CiEvent {
    /// Read `GITHUB_EVENT_NAME`, `GITHUB_REF` and the payload at
    /// `GITHUB_EVENT_PATH`
    pub fn from_env() -> DockhandResult<Self> {
        let name = std::env::var("GITHUB_EVENT_NAME").unwrap_or_default();
        let git_ref = std::env::var("GITHUB_REF").unwrap_or_default();

        let payload = match std::env::var("GITHUB_EVENT_PATH") {
            Ok(path) if !path.is_empty() => Self::read_payload(Path::new(&path))?,
            _ => String::new(),
        };

        Self::parse(name, git_ref, &payload)
    }

    fn read_payload(path: &Path) -> DockhandResult<String> {
        std::fs::read_to_string(path)
            .map_err(|e| DockhandError::io(format!("reading event payload {}", path.display()), e))
    }

    /// Build from raw values; an empty payload is treated as `{}`
    pub fn parse(
        name: impl Into<String>,
        git_ref: impl Into<String>,
        payload: &str,
    ) -> DockhandResult<Self> {
        let payload = if payload.trim().is_empty() {
            EventPayload::default()
        } else {
            serde_json::from_str(payload).map_err(|e| {
                DockhandError::TagPrefix(format!("unreadable event payload: {}", e))
            })?
        };

        Ok(Self {
            name: name.into(),
            git_ref: git_ref.into(),
            payload,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Default branch from the payload, else `fallback`
    pub fn default_branch(&self, fallback: Option<&str>) -> Option<String> {
        self.payload
            .repository
            .as_ref()
            .and_then(|r| r.default_branch.clone())
            .filter(|b| !b.is_empty())
            .or_else(|| fallback.map(str::to_string))
    }

    fn pull_request_number(&self) -> Option<u64> {
        self.payload
            .pull_request
            .as_ref()
            .and_then(|pr| pr.number)
            .or(self.payload.number)
            .or_else(|| self.payload.issue.as_ref().and_then(|i| i.number))
    }

    fn is_pull_request_comment(&self) -> bool {
        self.payload
            .issue
            .as_ref()
            .is_some_and(|i| i.pull_request.is_some())
    }

    /// Derive the tag prefix for this event.
    ///
    /// Anything but a default-branch push, a tag push, a schedule or a pull
    /// request is an error.
    pub fn tag_prefix(&self, default_branch: Option<&str>) -> DockhandResult<TagPrefix> {
        let default_branch = self.default_branch(default_branch);

        match self.name.as_str() {
            "push" if self.git_ref.starts_with("refs/tags/") => Ok(TagPrefix::Tag),
            "push" => {
                let branch = self.git_ref.strip_prefix("refs/heads/").unwrap_or_default();
                match default_branch {
                    Some(default) if !branch.is_empty() && branch == default => {
                        Ok(TagPrefix::DefaultBranch(default))
                    }
                    Some(default) => Err(DockhandError::TagPrefix(format!(
                        "push to {} is not the default branch {}",
                        self.git_ref, default
                    ))),
                    None => Err(DockhandError::TagPrefix(
                        "default branch unknown for push event".to_string(),
                    )),
                }
            }
            "schedule" => default_branch.map(TagPrefix::DefaultBranch).ok_or_else(|| {
                DockhandError::TagPrefix("default branch unknown for schedule event".to_string())
            }),
            "pull_request" | "pull_request_target" => self
                .pull_request_number()
                .map(TagPrefix::PullRequest)
                .ok_or_else(|| {
                    DockhandError::TagPrefix(format!("{} event has no number", self.name))
                }),
            "issue_comment" if self.is_pull_request_comment() => self
                .pull_request_number()
                .map(TagPrefix::PullRequest)
                .ok_or_else(|| {
                    DockhandError::TagPrefix("issue_comment event has no number".to_string())
                }),
            "" => Err(DockhandError::TagPrefix(
                "no CI event (GITHUB_EVENT_NAME is unset)".to_string(),
            )),
            other => Err(DockhandError::TagPrefix(format!(
                "unsupported event {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const REPO: &str = r#"{"repository": {"default_branch": "main"}}"#;

    fn prefix(name: &str, git_ref: &str, payload: &str) -> DockhandResult<TagPrefix> {
        CiEvent::parse(name, git_ref, payload)?.tag_prefix(None)
    }

    #[test]
    fn push_to_default_branch() {
        assert_eq!(
            prefix("push", "refs/heads/main", REPO).unwrap(),
            TagPrefix::DefaultBranch("main".to_string())
        );
    }

    #[test]
    fn push_to_feature_branch_is_error() {
        let err = prefix("push", "refs/heads/feature", REPO).unwrap_err();
        assert!(matches!(err, DockhandError::TagPrefix(_)));
    }

    #[test]
    fn push_of_tag() {
        let prefix = prefix("push", "refs/tags/v1.2.3", REPO).unwrap();
        assert_eq!(prefix, TagPrefix::Tag);
        assert_eq!(prefix.render("abc"), "tag-abc");
    }

    #[test]
    fn schedule_uses_default_branch() {
        assert_eq!(
            prefix("schedule", "", REPO).unwrap(),
            TagPrefix::DefaultBranch("main".to_string())
        );
    }

    #[test]
    fn default_branch_fallback_when_payload_lacks_it() {
        let event = CiEvent::parse("schedule", "", "{}").unwrap();
        assert_eq!(
            event.tag_prefix(Some("trunk")).unwrap(),
            TagPrefix::DefaultBranch("trunk".to_string())
        );
        assert!(event.tag_prefix(None).is_err());
    }

    #[test]
    fn pull_request_number_sources() {
        assert_eq!(
            prefix("pull_request", "", r#"{"pull_request": {"number": 42}}"#).unwrap(),
            TagPrefix::PullRequest(42)
        );
        assert_eq!(
            prefix("pull_request_target", "", r#"{"number": 7}"#).unwrap(),
            TagPrefix::PullRequest(7)
        );
        assert_eq!(
            prefix(
                "issue_comment",
                "",
                r#"{"issue": {"number": 9, "pull_request": {"url": "x"}}}"#
            )
            .unwrap(),
            TagPrefix::PullRequest(9)
        );
    }

    #[test]
    fn issue_comment_on_plain_issue_is_error() {
        assert!(prefix("issue_comment", "", r#"{"issue": {"number": 9}}"#).is_err());
    }

    #[test]
    fn unknown_event_is_fatal() {
        let err = prefix("workflow_dispatch", "refs/heads/main", REPO).unwrap_err();
        assert!(matches!(err, DockhandError::TagPrefix(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn pull_request_renders_with_sha() {
        assert_eq!(TagPrefix::PullRequest(12).render("abc"), "pr-12-abc");
    }

    #[test]
    fn branch_names_are_tag_safe() {
        assert_eq!(
            TagPrefix::DefaultBranch("release/2.x".to_string()).render("abc"),
            "release-2.x-abc"
        );
    }

    #[test]
    #[serial]
    fn from_env_reads_payload_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("event.json");
        std::fs::write(&path, r#"{"pull_request": {"number": 5}}"#).unwrap();

        std::env::set_var("GITHUB_EVENT_NAME", "pull_request");
        std::env::set_var("GITHUB_REF", "refs/pull/5/merge");
        std::env::set_var("GITHUB_EVENT_PATH", &path);

        let event = CiEvent::from_env().unwrap();

        std::env::remove_var("GITHUB_EVENT_NAME");
        std::env::remove_var("GITHUB_REF");
        std::env::remove_var("GITHUB_EVENT_PATH");

        assert_eq!(event.name(), "pull_request");
        assert_eq!(event.tag_prefix(None).unwrap(), TagPrefix::PullRequest(5));
    }
}
