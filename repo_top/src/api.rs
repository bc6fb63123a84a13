use std::fmt::Display;

use async_trait::async_trait;
use derive_more::Constructor;
use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("API rate limit exceeded")]
    QuotaExceeded,
    #[error("Request to {url} failed with status {status}: {body}")]
    RequestFailed {
        url: String,
        status: StatusCode,
        body: String,
    },
    #[error("Request error: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, Constructor)]
pub struct Repository {
    pub full_name: String,
    pub size: u64,
}

impl Repository {
    /// Repositories without content have no commits worth listing.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Constructor)]
pub struct Commit {
    /// Author email, or display name when the email is blank.
    pub author: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Constructor)]
pub struct Contribution {
    pub author: String,
    pub commits: u32,
}

impl Display for Contribution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} commits count", self.author, self.commits)
    }
}

#[async_trait]
pub trait Client: Send + Sync {
    /// All repositories of `organization`, every page.
    async fn org_repos(&self, organization: &str) -> Result<Vec<Repository>>;

    /// Full commit history of `repo`, every page.
    async fn repo_commits(&self, repo: &Repository) -> Result<Vec<Commit>>;
}
