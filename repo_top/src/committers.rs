use crate::aggregator::{aggregate, is_merge_pull_request};
use crate::api::{Client, Contribution, Result};
use crate::fetcher::fetch_commits;
use log::info;
use std::sync::Arc;

pub struct TopCommitters<CLIENT>
where
    CLIENT: Client,
{
    client: Arc<CLIENT>,
    max_concurrent: Option<usize>,
}

impl<CLIENT> TopCommitters<CLIENT>
where
    CLIENT: 'static + Client,
{
    pub fn new(client: Arc<CLIENT>) -> Self {
        TopCommitters {
            client,
            max_concurrent: None,
        }
    }

    /// Caps the number of repositories fetched at once.
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = Some(max_concurrent);
        self
    }

    pub fn client(&self) -> &CLIENT {
        &self.client
    }

    /// Ranks authors of all non-merge commits across every non-empty repository of `organization`.
    pub async fn fetch_top_committers(&self, organization: &str, top_count: usize) -> Result<Vec<Contribution>> {
        let repos = self.client.org_repos(organization).await?;
        let total = repos.len();
        let repos: Vec<_> = repos.into_iter().filter(|repo| !repo.is_empty()).collect();
        info!(
            "Found {} repositories of {}, {} of them not empty",
            total,
            organization,
            repos.len()
        );

        let commits = fetch_commits(self.client.clone(), repos, self.max_concurrent).await?;

        Ok(aggregate(commits, is_merge_pull_request).top(top_count))
    }
}

/// Tests

#[cfg(test)]
use crate::testing::{commit, repo, FakeClient};

#[tokio::test]
async fn top_committers_of_organization_test() {
    let client = FakeClient::default()
        .with_repos(vec![repo("acme/a", 10), repo("acme/b", 3)])
        .with_commits(
            "acme/a",
            vec![
                commit("alice@x", "Fix"),
                commit("alice@x", "Add"),
                commit("bob@x", "Merge pull request #7 from alice/add"),
                commit("alice@x", "Remove"),
            ],
            0,
        )
        .with_commits("acme/b", vec![commit("alice@x", "Init"), commit("alice@x", "Docs")], 0);

    let top = TopCommitters::new(Arc::new(client))
        .fetch_top_committers("acme", 100)
        .await
        .unwrap();

    assert_eq!(top, vec![Contribution::new("alice@x".to_string(), 5)]);
}

#[tokio::test]
async fn empty_repositories_are_not_fetched_test() {
    let client = FakeClient::default()
        .with_repos(vec![repo("acme/empty", 0), repo("acme/full", 1)])
        .with_commits("acme/full", vec![commit("carol@x", "One")], 0);
    let client = Arc::new(client);

    let top = TopCommitters::new(client.clone())
        .fetch_top_committers("acme", 10)
        .await
        .unwrap();

    assert_eq!(top, vec![Contribution::new("carol@x".to_string(), 1)]);
    assert_eq!(client.requested(), vec!["acme".to_string(), "acme/full".to_string()]);
}

#[tokio::test]
async fn failed_repository_fails_the_report_test() {
    let client = FakeClient::default()
        .with_repos(vec![repo("acme/a", 1), repo("acme/b", 1), repo("acme/c", 1)])
        .with_commits("acme/a", vec![commit("a", "1")], 0)
        .with_failure("acme/b")
        .with_commits("acme/c", vec![commit("c", "1")], 0);

    let result = TopCommitters::new(Arc::new(client))
        .with_max_concurrent(2)
        .fetch_top_committers("acme", 10)
        .await;

    assert!(matches!(result, Err(crate::api::Error::RequestFailed { .. })));
}

#[tokio::test]
async fn failed_repository_listing_fetches_no_commits_test() {
    let client = Arc::new(FakeClient::default().with_failure("acme"));

    let result = TopCommitters::new(client.clone()).fetch_top_committers("acme", 10).await;

    assert!(result.is_err());
    assert_eq!(client.requested(), vec!["acme".to_string()]);
}

#[tokio::test]
async fn organization_without_repositories_has_no_committers_test() {
    let client = Arc::new(FakeClient::default());

    let top = TopCommitters::new(client).fetch_top_committers("acme", 10).await.unwrap();

    assert!(top.is_empty());
}
