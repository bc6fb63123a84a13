use crate::api::{Client, Commit, Repository, Result};
use futures::{stream, StreamExt};
use log::{debug, error, info};
use std::sync::Arc;

/// Fetches commit histories of `repos` concurrently, one task per repository.
///
/// Results keep the order of `repos`. At most `max_concurrent` fetches run at once, `None` spawns
/// them all. The first failure observed ends the whole fetch and completed results are dropped.
pub async fn fetch_commits<CLIENT>(
    client: Arc<CLIENT>,
    repos: Vec<Repository>,
    max_concurrent: Option<usize>,
) -> Result<Vec<Vec<Commit>>>
where
    CLIENT: 'static + Client,
{
    let total = repos.len();
    let max_concurrent = max_concurrent.unwrap_or(total).max(1);
    let mut slots: Vec<Option<Vec<Commit>>> = (0..total).map(|_| None).collect();

    let mut fetches = stream::iter(repos.into_iter().enumerate())
        .map(|(index, repo)| {
            let client = client.clone();
            tokio::spawn(async move {
                let commits = client.repo_commits(&repo).await;
                (index, repo, commits)
            })
        })
        .buffer_unordered(max_concurrent);

    let mut completed = 0;
    while let Some(fetched) = fetches.next().await {
        let (index, repo, commits) = fetched.map_err(anyhow::Error::from)?;
        match commits {
            Ok(commits) => {
                debug!("Fetched {} commits of {}", commits.len(), repo.full_name);
                slots[index] = Some(commits);
                completed += 1;
            }
            Err(err) => {
                error!("Failed to fetch commits of {}: {}", repo.full_name, err);
                info!("{} of {} repositories fetched before failure", completed, total);
                return Err(err);
            }
        }
    }

    info!("Fetched commits of {} repositories", total);
    Ok(slots.into_iter().flatten().collect())
}

/// Tests

#[cfg(test)]
use crate::testing::{commit, repo, FakeClient};

#[tokio::test]
async fn results_keep_input_order_test() {
    // Earlier repositories answer later.
    let client = FakeClient::default()
        .with_commits("org/a", vec![commit("a", "1")], 60)
        .with_commits("org/b", vec![commit("b", "1"), commit("b", "2")], 30)
        .with_commits("org/c", vec![], 0);
    let repos = vec![repo("org/a", 1), repo("org/b", 1), repo("org/c", 1)];

    let commits = fetch_commits(Arc::new(client), repos, None).await.unwrap();

    assert_eq!(
        commits,
        vec![vec![commit("a", "1")], vec![commit("b", "1"), commit("b", "2")], vec![]]
    );
}

#[tokio::test]
async fn unbounded_fetch_runs_every_repository_at_once_test() {
    let mut client = FakeClient::default();
    let mut repos = Vec::new();
    for i in 0..8 {
        let name = format!("org/{}", i);
        client = client.with_commits(&name, vec![commit("a", "1")], 20);
        repos.push(repo(&name, 1));
    }
    let client = Arc::new(client);

    fetch_commits(client.clone(), repos, None).await.unwrap();

    assert_eq!(client.max_in_flight(), 8);
}

#[tokio::test]
async fn fetch_respects_concurrency_cap_test() {
    let mut client = FakeClient::default();
    let mut repos = Vec::new();
    for i in 0..8 {
        let name = format!("org/{}", i);
        client = client.with_commits(&name, vec![commit("a", "1")], 10);
        repos.push(repo(&name, 1));
    }
    let client = Arc::new(client);

    let commits = fetch_commits(client.clone(), repos, Some(3)).await.unwrap();

    assert_eq!(commits.len(), 8);
    assert!(client.max_in_flight() <= 3, "in flight: {}", client.max_in_flight());
}

#[tokio::test]
async fn first_failure_fails_the_fetch_test() {
    let client = FakeClient::default()
        .with_commits("org/a", vec![commit("a", "1")], 0)
        .with_failure("org/b")
        .with_commits("org/c", vec![commit("c", "1")], 50);
    let repos = vec![repo("org/a", 1), repo("org/b", 1), repo("org/c", 1)];

    let result = fetch_commits(Arc::new(client), repos, None).await;

    assert!(matches!(result, Err(crate::api::Error::RequestFailed { .. })));
}

#[tokio::test]
async fn no_repositories_no_commits_test() {
    let client = Arc::new(FakeClient::default());

    let commits = fetch_commits(client.clone(), vec![], None).await.unwrap();

    assert!(commits.is_empty());
    assert!(client.requested().is_empty());
}
