//! In-memory `Client` for tests.

use crate::api::{Client, Commit, Error, Repository, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub fn commit(author: &str, message: &str) -> Commit {
    Commit::new(Some(author.to_string()), message.to_string())
}

pub fn repo(full_name: &str, size: u64) -> Repository {
    Repository::new(full_name.to_string(), size)
}

#[derive(Default)]
pub struct FakeClient {
    repos: Vec<Repository>,
    commits: HashMap<String, (Vec<Commit>, u64)>,
    failing: HashSet<String>,
    requested: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeClient {
    pub fn with_repos(mut self, repos: Vec<Repository>) -> Self {
        self.repos = repos;
        self
    }

    /// Commits of `full_name`, answered after `delay_ms`.
    pub fn with_commits(mut self, full_name: &str, commits: Vec<Commit>, delay_ms: u64) -> Self {
        self.commits.insert(full_name.to_string(), (commits, delay_ms));
        self
    }

    /// Requests for `name` (organization or repository) answer with HTTP 500.
    pub fn with_failure(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, name: &str) -> Result<()> {
        self.requested.lock().unwrap().push(name.to_string());
        if self.failing.contains(name) {
            return Err(Error::RequestFailed {
                url: format!("https://api.test/{}", name),
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: "boom".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Client for FakeClient {
    async fn org_repos(&self, organization: &str) -> Result<Vec<Repository>> {
        self.record(organization)?;
        Ok(self.repos.clone())
    }

    async fn repo_commits(&self, repo: &Repository) -> Result<Vec<Commit>> {
        self.record(&repo.full_name)?;
        let (commits, delay_ms) = self
            .commits
            .get(&repo.full_name)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("unexpected repository {}", repo.full_name))?;

        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        Ok(commits)
    }
}
