mod builder;
mod limiter;
mod pagination;
mod payload;

use async_trait::async_trait;
use log::info;
use repo_top::api::{Commit, Error, Repository, Result};
use reqwest::Client;
use reqwest::RequestBuilder;
use reqwest::Response;
use url::Url;

pub use builder::GithubClientBuilder;
pub use limiter::RateLimit;

/// GitHub REST API client sharing one connection pool and one rate limit between all requests.
pub struct GithubClient {
    client: Client,
    github_url: Url,
    limiter: limiter::RateLimiter,
}

impl GithubClient {
    /// Rate limit as reported by the last successful response.
    pub async fn rate_limit(&self) -> RateLimit {
        self.limiter.snapshot().await
    }

    /// Sends `request` unless the quota is exhausted, then records the quota the response reports.
    async fn get(&self, request: RequestBuilder) -> Result<Response> {
        self.limiter.check().await?;
        let response = ensure_success(request.send().await?).await?;
        self.limiter.update(response.headers()).await?;
        Ok(response)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.github_url.join(path).map_err(anyhow::Error::from)?)
    }
}

pub(crate) async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    Err(Error::RequestFailed { url, status, body })
}

#[async_trait]
impl repo_top::api::Client for GithubClient {
    async fn org_repos(&self, organization: &str) -> Result<Vec<Repository>> {
        let url = self.endpoint(&format!("orgs/{}/repos", organization))?;
        let repos = self.fetch_all_pages::<payload::Repo>(url).await?;
        info!("Found {} repositories of {}", repos.len(), organization);
        Ok(repos.into_iter().map(Repository::from).collect())
    }

    async fn repo_commits(&self, repo: &Repository) -> Result<Vec<Commit>> {
        let url = self.endpoint(&format!("repos/{}/commits", repo.full_name))?;
        let commits = self.fetch_all_pages::<payload::CommitItem>(url).await?;
        Ok(commits.into_iter().map(Commit::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use crate::{GithubClient, GithubClientBuilder, RateLimit};
    use repo_top::api::{Client, Commit, Error, Repository};
    use serde_json::{json, Value};
    use std::time::Duration;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

    const LIMIT: u32 = 5000;

    /// Matches GET requests by path and exact query string.
    struct PageMatcher {
        path: String,
        query: &'static str,
    }

    impl Match for PageMatcher {
        fn matches(&self, request: &Request) -> bool {
            request.method.as_str() == "GET" && request.url.path() == self.path && request.url.query() == Some(self.query)
        }
    }

    fn page(path: &str, query: &'static str) -> PageMatcher {
        PageMatcher {
            path: path.to_string(),
            query,
        }
    }

    fn quota_response(status: u16, remaining: u32) -> ResponseTemplate {
        ResponseTemplate::new(status)
            .insert_header("x-ratelimit-limit", LIMIT.to_string())
            .insert_header("x-ratelimit-remaining", remaining.to_string())
            .insert_header("x-ratelimit-used", (LIMIT - remaining).to_string())
    }

    fn page_response(body: Value, next: Option<String>, remaining: u32) -> ResponseTemplate {
        let response = quota_response(200, remaining).set_body_json(body);
        match next {
            Some(next) => response.insert_header("link", format!(r#"<{}>; rel="next""#, next)),
            None => response,
        }
    }

    async fn mock_rate_limit(server: &MockServer, remaining: u32) {
        let body = json!({
            "resources": {
                "core": { "limit": LIMIT, "remaining": remaining, "used": LIMIT - remaining, "reset": 1_700_000_000 }
            }
        });
        Mock::given(method("GET"))
            .and(path("/rate_limit"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(server)
            .await;
    }

    async fn client(server: &MockServer) -> GithubClient {
        GithubClientBuilder::default()
            .with_github_url(server.uri())
            .try_with_token(secrecy::SecretString::new("t0ken".to_string()))
            .unwrap()
            .with_timeout(Duration::from_secs(5))
            .build()
            .await
            .unwrap()
    }

    fn repo_json(name: &str, size: u64) -> Value {
        json!({ "id": 1, "name": name, "full_name": format!("acme/{}", name), "size": size })
    }

    fn commit_json(email: &str, message: &str) -> Value {
        json!({ "sha": "0", "commit": { "author": { "name": "N", "email": email }, "message": message } })
    }

    #[tokio::test]
    async fn build_seeds_rate_limit_test() {
        let server = MockServer::start().await;
        mock_rate_limit(&server, 4321).await;

        let client = client(&server).await;

        let rate_limit = client.rate_limit().await;
        assert_eq!(
            (rate_limit.limit, rate_limit.remaining, rate_limit.used),
            (LIMIT, 4321, LIMIT - 4321)
        );
    }

    #[tokio::test]
    async fn failed_probe_fails_build_test() {
        let server = MockServer::start().await;
        Mock::given(path("/rate_limit"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Bad credentials"))
            .mount(&server)
            .await;

        let result = GithubClientBuilder::default().with_github_url(server.uri()).build().await;

        match result {
            Err(Error::RequestFailed { status, body, .. }) => {
                assert_eq!(status.as_u16(), 401);
                assert_eq!(body, "Bad credentials");
            }
            _ => panic!("Probe failure should fail the build"),
        }
    }

    #[tokio::test]
    async fn requests_carry_api_headers_test() {
        let server = MockServer::start().await;
        mock_rate_limit(&server, 100).await;
        Mock::given(method("GET"))
            .and(path("/orgs/acme/repos"))
            .and(query_param("per_page", "100"))
            .and(header("accept", "application/vnd.github.v3+json"))
            .and(header("authorization", "Bearer t0ken"))
            .and(header("x-github-api-version", "2022-11-28"))
            .respond_with(page_response(json!([repo_json("a", 1)]), None, 99))
            .expect(1)
            .mount(&server)
            .await;

        let repos = client(&server).await.org_repos("acme").await.unwrap();

        assert_eq!(repos, vec![Repository::new("acme/a".to_string(), 1)]);
    }

    #[tokio::test]
    async fn all_pages_are_fetched_in_order_test() {
        let server = MockServer::start().await;
        mock_rate_limit(&server, 100).await;
        let uri = server.uri();
        Mock::given(page("/orgs/acme/repos", "per_page=100"))
            .respond_with(page_response(
                json!([repo_json("a", 1), repo_json("b", 0)]),
                Some(format!("{}/orgs/acme/repos?cursor=c2", uri)),
                99,
            ))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(page("/orgs/acme/repos", "cursor=c2"))
            .respond_with(page_response(
                json!([repo_json("c", 5)]),
                Some(format!("{}/orgs/acme/repos?cursor=c3", uri)),
                98,
            ))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(page("/orgs/acme/repos", "cursor=c3"))
            .respond_with(page_response(json!([repo_json("d", 7)]), None, 97))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server).await;
        let repos = client.org_repos("acme").await.unwrap();

        let names: Vec<&str> = repos.iter().map(|repo| repo.full_name.as_str()).collect();
        assert_eq!(names, vec!["acme/a", "acme/b", "acme/c", "acme/d"]);
        assert_eq!(client.rate_limit().await.remaining, 97);
    }

    #[tokio::test]
    async fn commits_are_fetched_for_repository_test() {
        let server = MockServer::start().await;
        mock_rate_limit(&server, 100).await;
        Mock::given(page("/repos/acme/a/commits", "per_page=100"))
            .respond_with(page_response(
                json!([commit_json("alice@x", "Fix"), commit_json("bob@x", "Merge pull request #1 from x/y")]),
                None,
                99,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let commits = client(&server)
            .await
            .repo_commits(&Repository::new("acme/a".to_string(), 3))
            .await
            .unwrap();

        assert_eq!(
            commits,
            vec![
                Commit::new(Some("alice@x".to_string()), "Fix".to_string()),
                Commit::new(Some("bob@x".to_string()), "Merge pull request #1 from x/y".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn failed_page_fails_the_walk_test() {
        let server = MockServer::start().await;
        mock_rate_limit(&server, 100).await;
        Mock::given(page("/orgs/acme/repos", "per_page=100"))
            .respond_with(page_response(
                json!([repo_json("a", 1)]),
                Some(format!("{}/orgs/acme/repos?cursor=c2", server.uri())),
                99,
            ))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(page("/orgs/acme/repos", "cursor=c2"))
            .respond_with(ResponseTemplate::new(502).set_body_string("Bad gateway"))
            .expect(1)
            .mount(&server)
            .await;

        let result = client(&server).await.org_repos("acme").await;

        match result {
            Err(Error::RequestFailed { status, url, .. }) => {
                assert_eq!(status.as_u16(), 502);
                assert!(url.ends_with("/orgs/acme/repos?cursor=c2"), "{}", url);
            }
            other => panic!("Expected request failure, got {:?}", other.map(|repos| repos.len())),
        }
    }

    #[tokio::test]
    async fn exhausted_probe_blocks_every_request_test() {
        let server = MockServer::start().await;
        mock_rate_limit(&server, 0).await;
        Mock::given(path("/orgs/acme/repos"))
            .respond_with(page_response(json!([]), None, 0))
            .expect(0)
            .mount(&server)
            .await;

        let client = client(&server).await;
        let result = client.org_repos("acme").await;

        assert!(matches!(result, Err(Error::QuotaExceeded)));
        assert_eq!(client.rate_limit().await.remaining, 0);
    }

    #[tokio::test]
    async fn quota_exhausted_mid_walk_stops_the_walk_test() {
        let server = MockServer::start().await;
        mock_rate_limit(&server, 1).await;
        Mock::given(page("/orgs/acme/repos", "per_page=100"))
            .respond_with(page_response(
                json!([repo_json("a", 1)]),
                Some(format!("{}/orgs/acme/repos?cursor=c2", server.uri())),
                0,
            ))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(page("/orgs/acme/repos", "cursor=c2"))
            .respond_with(page_response(json!([repo_json("b", 1)]), None, 0))
            .expect(0)
            .mount(&server)
            .await;

        let result = client(&server).await.org_repos("acme").await;

        assert!(matches!(result, Err(Error::QuotaExceeded)));
    }

    #[tokio::test]
    async fn response_without_quota_headers_is_rejected_test() {
        let server = MockServer::start().await;
        mock_rate_limit(&server, 100).await;
        Mock::given(path("/orgs/acme/repos"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let result = client(&server).await.org_repos("acme").await;

        assert!(matches!(result, Err(Error::InvalidHeader { .. })));
    }

    #[test]
    fn rate_limit_is_exhausted_test() {
        assert!(RateLimit::new(60, 0, 60, None).is_exhausted());
        assert!(!RateLimit::new(60, 1, 59, None).is_exhausted());
    }
}
