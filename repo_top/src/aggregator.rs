use crate::api::{Commit, Contribution};
use indexmap::IndexMap;
use log::debug;

const MERGE_PULL_REQUEST_PREFIX: &str = "Merge pull request #";

/// Commit counts per author, kept in the order authors were first seen.
#[derive(Debug, Default, PartialEq)]
pub struct ContributionCount {
    counts: IndexMap<String, u32>,
}

impl ContributionCount {
    pub fn add(&mut self, author: &str) {
        *self.counts.entry(author.to_string()).or_insert(0) += 1;
    }

    pub fn get(&self, author: &str) -> Option<u32> {
        self.counts.get(author).copied()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Returns at most `count` authors ordered by commits descending.
    ///
    /// Sorting is stable, so authors with equal counts keep first-seen order.
    pub fn top(self, count: usize) -> Vec<Contribution> {
        let mut ranked: Vec<Contribution> = self
            .counts
            .into_iter()
            .map(|(author, commits)| Contribution::new(author, commits))
            .collect();
        ranked.sort_by(|a, b| b.commits.cmp(&a.commits));
        ranked.truncate(count);
        ranked
    }
}

/// Matches the commits GitHub generates when a pull request is merged.
pub fn is_merge_pull_request(commit: &Commit) -> bool {
    commit.message.starts_with(MERGE_PULL_REQUEST_PREFIX)
}

pub fn aggregate<I, F>(commit_lists: I, exclude: F) -> ContributionCount
where
    I: IntoIterator<Item = Vec<Commit>>,
    F: Fn(&Commit) -> bool,
{
    let mut counts = ContributionCount::default();
    let mut skipped = 0;
    for commit in commit_lists.into_iter().flatten() {
        if exclude(&commit) {
            skipped += 1;
            continue;
        }
        match commit.author {
            Some(author) => counts.add(&author),
            None => skipped += 1,
        }
    }
    debug!("Counted {} authors, skipped {} commits", counts.len(), skipped);
    counts
}

/// Tests

#[cfg(test)]
fn commit(author: &str, message: &str) -> Commit {
    Commit::new(Some(author.to_string()), message.to_string())
}

#[test]
fn merge_commits_are_not_counted_test() {
    let repo_a = vec![
        commit("alice@x", "Fix parser"),
        commit("alice@x", "Add lexer"),
        commit("bob@x", "Merge pull request #12 from alice/lexer"),
        commit("alice@x", "Bump version"),
    ];
    let repo_b = vec![commit("alice@x", "Initial commit"), commit("alice@x", "Readme")];

    let top = aggregate(vec![repo_a, repo_b], is_merge_pull_request).top(100);

    assert_eq!(top, vec![Contribution::new("alice@x".to_string(), 5)]);
}

#[test]
fn merge_prefix_must_lead_the_message_test() {
    assert!(is_merge_pull_request(&commit("a", "Merge pull request #1 from a/b")));
    assert!(!is_merge_pull_request(&commit("a", "Revert \"Merge pull request #1 from a/b\"")));
    assert!(!is_merge_pull_request(&commit("a", "Merge branch 'main' into feature")));
    assert!(!is_merge_pull_request(&commit("a", "merge pull request #1")));
}

#[test]
fn ranking_keeps_first_seen_order_for_ties_test() {
    let commits = vec![
        commit("carol", "1"),
        commit("dave", "2"),
        commit("erin", "3"),
        commit("erin", "4"),
        commit("dave", "5"),
        commit("frank", "6"),
    ];

    let top = aggregate(vec![commits], |_| false).top(10);

    let order: Vec<(&str, u32)> = top.iter().map(|c| (c.author.as_str(), c.commits)).collect();
    assert_eq!(order, vec![("dave", 2), ("erin", 2), ("carol", 1), ("frank", 1)]);
}

#[test]
fn top_truncates_to_requested_count_test() {
    let commits = vec![commit("a", "1"), commit("a", "2"), commit("b", "3"), commit("c", "4")];

    let counts = aggregate(vec![commits], |_| false);
    assert_eq!(counts.len(), 3);

    let top = counts.top(1);
    assert_eq!(top, vec![Contribution::new("a".to_string(), 2)]);
}

#[test]
fn top_zero_is_empty_test() {
    let counts = aggregate(vec![vec![commit("a", "1")]], |_| false);
    assert!(counts.top(0).is_empty());
}

#[test]
fn commits_without_author_are_skipped_test() {
    let commits = vec![Commit::new(None, "orphan".to_string()), commit("a", "1")];

    let counts = aggregate(vec![commits], |_| false);

    assert_eq!(counts.len(), 1);
    assert_eq!(counts.get("a"), Some(1));
}

#[test]
fn counts_accumulate_across_repositories_test() {
    let counts = aggregate(
        vec![vec![commit("a", "1")], vec![], vec![commit("b", "2"), commit("a", "3")]],
        is_merge_pull_request,
    );

    assert_eq!(counts.get("a"), Some(2));
    assert_eq!(counts.get("b"), Some(1));
    assert_eq!(counts.get("c"), None);
}
