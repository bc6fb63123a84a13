use crate::limiter::RateLimit;
use chrono::{TimeZone, Utc};
use serde::Deserialize;

#[derive(Deserialize, Debug)]
pub struct Repo {
    pub full_name: String,
    pub size: u64,
}

impl From<Repo> for repo_top::api::Repository {
    fn from(repo: Repo) -> Self {
        repo_top::api::Repository::new(repo.full_name, repo.size)
    }
}

#[derive(Deserialize, Debug)]
pub struct CommitItem {
    pub commit: CommitDetail,
}

#[derive(Deserialize, Debug)]
pub struct CommitDetail {
    pub author: Option<GitAuthor>,
    pub message: String,
}

#[derive(Deserialize, Debug)]
pub struct GitAuthor {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl GitAuthor {
    fn identity(self) -> Option<String> {
        let non_blank = |value: &String| !value.trim().is_empty();
        self.email.filter(non_blank).or(self.name.filter(non_blank))
    }
}

impl From<CommitItem> for repo_top::api::Commit {
    fn from(item: CommitItem) -> Self {
        repo_top::api::Commit::new(
            item.commit.author.and_then(GitAuthor::identity),
            item.commit.message,
        )
    }
}

#[derive(Deserialize, Debug)]
pub struct RateLimitBody {
    pub resources: RateLimitResources,
}

#[derive(Deserialize, Debug)]
pub struct RateLimitResources {
    pub core: RateLimitResource,
}

#[derive(Deserialize, Debug)]
pub struct RateLimitResource {
    pub limit: u32,
    pub remaining: u32,
    pub used: u32,
    pub reset: Option<i64>,
}

impl From<RateLimitResource> for RateLimit {
    fn from(resource: RateLimitResource) -> Self {
        let reset = resource.reset.and_then(|reset| Utc.timestamp_opt(reset, 0).single());
        RateLimit::new(resource.limit, resource.remaining, resource.used, reset)
    }
}

#[test]
fn commit_author_is_email_test() -> anyhow::Result<()> {
    let item: CommitItem = serde_json::from_str(
        r#"{
            "sha": "6dcb09b5b57875f334f61aebed695e2e4193db5e",
            "commit": {
                "author": { "name": "Monalisa Octocat", "email": "mona@github.com", "date": "2011-04-14T16:00:49Z" },
                "message": "Fix all the bugs"
            },
            "author": { "login": "octocat" }
        }"#,
    )?;

    let commit = repo_top::api::Commit::from(item);

    assert_eq!(commit.author.as_deref(), Some("mona@github.com"));
    assert_eq!(commit.message, "Fix all the bugs");
    Ok(())
}

#[test]
fn commit_author_falls_back_to_name_test() -> anyhow::Result<()> {
    let item: CommitItem =
        serde_json::from_str(r#"{ "commit": { "author": { "name": "Mona", "email": "" }, "message": "m" } }"#)?;
    assert_eq!(repo_top::api::Commit::from(item).author.as_deref(), Some("Mona"));

    let item: CommitItem = serde_json::from_str(r#"{ "commit": { "author": null, "message": "m" } }"#)?;
    assert_eq!(repo_top::api::Commit::from(item).author, None);
    Ok(())
}

#[test]
fn rate_limit_probe_body_test() -> anyhow::Result<()> {
    let body: RateLimitBody = serde_json::from_str(
        r#"{
            "resources": {
                "core": { "limit": 5000, "used": 1, "remaining": 4999, "reset": 1691591363 },
                "search": { "limit": 30, "used": 12, "remaining": 18, "reset": 1691591091 }
            },
            "rate": { "limit": 5000, "used": 1, "remaining": 4999, "reset": 1372700873 }
        }"#,
    )?;

    let rate_limit = RateLimit::from(body.resources.core);

    assert_eq!((rate_limit.limit, rate_limit.remaining, rate_limit.used), (5000, 4999, 1));
    assert_eq!(rate_limit.reset, Utc.timestamp_opt(1_691_591_363, 0).single());
    Ok(())
}
