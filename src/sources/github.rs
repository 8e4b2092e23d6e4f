use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::text::{humanize_date, truncate};
use crate::{GITHUB_API_BASE, USER_AGENT};

/// How many commits the changelog panel shows.
const COMMITS_LIMIT: u32 = 20;

/// Commit body display cap.
const BODY_MAX_CHARS: usize = 150;

/// A commit as returned by the GitHub REST API (only the fields we read).
#[derive(Debug, Clone, Deserialize)]
pub struct RawCommit {
    #[serde(default)]
    pub sha: String,
    #[serde(default)]
    pub html_url: String,
    pub commit: CommitDetail,
    #[serde(default)]
    pub author: Option<UserRef>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CommitDetail {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub author: Option<GitSignature>,
    #[serde(default)]
    pub committer: Option<GitSignature>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct GitSignature {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct UserRef {
    #[serde(default)]
    pub login: Option<String>,
}

/// A changelog entry in dashboard form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitEntry {
    /// Short (7-char) commit hash.
    pub sha: String,
    pub title: String,
    pub body: String,
    /// Humanized date, e.g. "3h ago".
    pub date: String,
    pub date_raw: Option<DateTime<Utc>>,
    pub author: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangelogPayload {
    pub updated_at: DateTime<Utc>,
    pub commits: Vec<CommitEntry>,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChangelogPayload {
    pub fn fallback(error: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            updated_at: now,
            commits: Vec::new(),
            count: 0,
            error: Some(error.into()),
        }
    }
}

/// Fetch the most recent commits for `repo` (`owner/name`).
pub async fn fetch_commits(client: &Client, repo: &str) -> Result<Vec<RawCommit>> {
    let url = format!("{GITHUB_API_BASE}/repos/{repo}/commits?per_page={COMMITS_LIMIT}");
    let response = client
        .get(&url)
        .header("Accept", "application/vnd.github.v3+json")
        .header("User-Agent", USER_AGENT)
        .send()
        .await
        .context("GitHub request failed")?;

    let status = response.status();
    if !status.is_success() {
        bail!("GitHub API error: {status} - repo may be private");
    }

    let commits: Vec<RawCommit> = response
        .json()
        .await
        .context("invalid response from GitHub")?;
    debug!("Fetched {} commits for {repo}", commits.len());
    Ok(commits)
}

/// Reshape raw commits into the changelog payload: merge commits dropped,
/// titles cleaned, bodies trimmed of trailer lines and truncated.
pub fn normalize_commits(commits: &[RawCommit], now: DateTime<Utc>) -> ChangelogPayload {
    let entries: Vec<CommitEntry> = commits
        .iter()
        .map(|raw| {
            let message = raw.commit.message.as_str();
            let mut lines = message.lines();
            let title = lines.next().unwrap_or("No message");
            let body: String = lines
                .filter(|l| !l.trim().is_empty() && !l.contains("Co-Authored-By"))
                .collect::<Vec<_>>()
                .join(" ")
                .trim()
                .to_string();

            let date_raw = raw
                .commit
                .author
                .as_ref()
                .and_then(|a| a.date)
                .or_else(|| raw.commit.committer.as_ref().and_then(|c| c.date));
            let author = raw
                .commit
                .author
                .as_ref()
                .and_then(|a| a.name.clone())
                .or_else(|| raw.author.as_ref().and_then(|u| u.login.clone()))
                .unwrap_or_else(|| "Unknown".to_string());

            CommitEntry {
                sha: raw.sha.chars().take(7).collect(),
                title: clean_title(title),
                body: if body.is_empty() {
                    String::new()
                } else {
                    truncate(&body, BODY_MAX_CHARS)
                },
                date: date_raw.map(|d| humanize_date(d, now)).unwrap_or_default(),
                date_raw,
                author,
                url: raw.html_url.clone(),
            }
        })
        .filter(|entry| !is_merge_commit(&entry.title))
        .collect();

    ChangelogPayload {
        updated_at: now,
        count: entries.len(),
        commits: entries,
        error: None,
    }
}

/// Strip decoration prefixes and tool-attribution lines from a commit title.
fn clean_title(title: &str) -> String {
    let title = title.trim_start_matches("🤖").trim();
    if title.starts_with("Generated with [") {
        return String::new();
    }
    title.to_string()
}

/// Merge commits are noise in a changelog.
fn is_merge_commit(title: &str) -> bool {
    let lower = title.to_lowercase();
    lower.starts_with("merge pull request") || lower.starts_with("merge branch")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn raw(sha: &str, message: &str, date: &str) -> RawCommit {
        serde_json::from_value(json!({
            "sha": sha,
            "html_url": format!("https://github.com/org/repo/commit/{sha}"),
            "commit": {
                "message": message,
                "author": { "name": "dev", "date": date }
            },
            "author": { "login": "devlogin" }
        }))
        .expect("valid test commit JSON")
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 30, 12, 0, 0).unwrap()
    }

    #[test]
    fn strips_merge_commits() {
        let commits = vec![
            raw("aaaaaaaaaa", "Add budget panel", "2026-08-30T09:00:00Z"),
            raw("bbbbbbbbbb", "Merge pull request #12 from fork", "2026-08-30T09:00:00Z"),
            raw("cccccccccc", "Merge branch 'main' into dev", "2026-08-30T09:00:00Z"),
        ];
        let payload = normalize_commits(&commits, now());
        assert_eq!(payload.count, 1);
        assert_eq!(payload.commits[0].title, "Add budget panel");
    }

    #[test]
    fn truncates_body_and_drops_trailers() {
        let body_line = "x".repeat(300);
        let message = format!("Title line\n\n{body_line}\nCo-Authored-By: Someone <s@e.com>");
        let commits = vec![raw("abcdef0123", &message, "2026-08-30T09:00:00Z")];
        let payload = normalize_commits(&commits, now());
        let entry = &payload.commits[0];
        assert_eq!(entry.title, "Title line");
        assert_eq!(entry.body.chars().count(), 150);
        assert!(entry.body.ends_with("..."));
        assert!(!entry.body.contains("Co-Authored-By"));
    }

    #[test]
    fn short_sha_and_relative_date() {
        let commits = vec![raw("0123456789abcdef", "Fix poller", "2026-08-30T09:00:00Z")];
        let payload = normalize_commits(&commits, now());
        let entry = &payload.commits[0];
        assert_eq!(entry.sha, "0123456");
        assert_eq!(entry.date, "3h ago");
        assert_eq!(entry.author, "dev");
    }

    #[test]
    fn cleans_decorated_titles() {
        assert_eq!(clean_title("🤖 Update feed"), "Update feed");
        assert_eq!(clean_title("Generated with [SomeTool](https://x)"), "");
        assert_eq!(clean_title("Plain title"), "Plain title");
    }

    #[test]
    fn empty_message_falls_back() {
        let commits = vec![raw("ffffffffff", "", "2026-08-30T09:00:00Z")];
        let payload = normalize_commits(&commits, now());
        assert_eq!(payload.count, 1);
        assert_eq!(payload.commits[0].title, "No message");
        assert_eq!(payload.commits[0].body, "");
    }
}
