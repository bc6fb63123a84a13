use crate::limiter::RateLimit;
use crate::limiter::RateLimiter;
use crate::payload::RateLimitBody;
use crate::GithubClient;
use log::{info, warn};
use repo_top::api::{Error, Result};
use reqwest::header;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderName;
use reqwest::header::HeaderValue;
use reqwest::Client;
use reqwest::ClientBuilder;
use secrecy::ExposeSecret;
use std::time::Duration;
use url::Url;

const API_VERSION_HEADER: &str = "x-github-api-version";
const API_VERSION: &str = "2022-11-28";

pub struct GithubClientBuilder {
    client_builder: ClientBuilder,
    github_url: String,
    headers: HeaderMap,
}

impl Default for GithubClientBuilder {
    fn default() -> Self {
        let mut headers = HeaderMap::default();
        headers.insert(header::USER_AGENT, HeaderValue::from_static("repo_top"));
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/vnd.github.v3+json"));
        headers.insert(
            HeaderName::from_static(API_VERSION_HEADER),
            HeaderValue::from_static(API_VERSION),
        );
        Self {
            client_builder: ClientBuilder::default(),
            github_url: "https://api.github.com".to_string(),
            headers,
        }
    }
}

impl GithubClientBuilder {
    pub fn try_with_token(self, token: secrecy::SecretString) -> Result<GithubClientBuilder> {
        let bearer = format!("Bearer {}", token.expose_secret());
        let mut val = header_value(header::AUTHORIZATION, &bearer)?;
        val.set_sensitive(true);
        Ok(self.with_header(header::AUTHORIZATION, val))
    }

    pub fn try_with_user_agent<STR: AsRef<str>>(self, user_agent: STR) -> Result<GithubClientBuilder> {
        let val = header_value(header::USER_AGENT, user_agent.as_ref())?;
        Ok(self.with_header(header::USER_AGENT, val))
    }

    pub fn with_github_url<STR: AsRef<str>>(mut self, url: STR) -> GithubClientBuilder {
        self.github_url = url.as_ref().to_string();
        self
    }

    /// Timeout of every single request, the rate limit probe included.
    pub fn with_timeout(mut self, timeout: Duration) -> GithubClientBuilder {
        self.client_builder = self.client_builder.timeout(timeout);
        self
    }

    fn with_header(mut self, key: HeaderName, val: HeaderValue) -> GithubClientBuilder {
        self.headers.insert(key, val);
        self
    }

    /// Builds the client and seeds its rate limiter from `GET /rate_limit`.
    ///
    /// The probe itself is not rate limited. An exhausted quota does not fail the build, every
    /// following request fails instead.
    pub async fn build(self) -> Result<GithubClient> {
        let client = self.client_builder.default_headers(self.headers).build()?;
        let github_url = base_url(&self.github_url)?;
        let rate_limit = rate_limit(&client, &github_url).await?;
        if rate_limit.is_exhausted() {
            warn!("API rate limit of {} already exhausted", rate_limit.limit);
        } else {
            info!("API rate limit: {} of {} remaining", rate_limit.remaining, rate_limit.limit);
        }
        Ok(GithubClient {
            client,
            github_url,
            limiter: RateLimiter::new(rate_limit),
        })
    }
}

fn header_value(key: HeaderName, val: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(val).map_err(|err| Error::InvalidHeader {
        name: key.as_str().to_string(),
        reason: err.to_string(),
    })
}

/// Endpoint paths are joined to the base, so it has to end with a slash.
fn base_url(github_url: &str) -> Result<Url> {
    let mut url = Url::parse(github_url).map_err(anyhow::Error::from)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

async fn rate_limit(client: &Client, github_url: &Url) -> Result<RateLimit> {
    let request_url = github_url.join("rate_limit").map_err(anyhow::Error::from)?;
    let response = client.get(request_url).send().await?;
    let body = crate::ensure_success(response).await?.json::<RateLimitBody>().await?;
    Ok(body.resources.core.into())
}

#[test]
fn base_url_test() -> anyhow::Result<()> {
    assert_eq!(base_url("https://api.github.com")?.as_str(), "https://api.github.com/");
    assert_eq!(
        base_url("https://github.example.com/api/v3")?.join("orgs/acme/repos")?.as_str(),
        "https://github.example.com/api/v3/orgs/acme/repos"
    );
    assert!(base_url("not a url").is_err());
    Ok(())
}

#[test]
fn invalid_token_is_rejected_test() {
    let token = secrecy::SecretString::new("line\nbreak".to_string());
    let result = GithubClientBuilder::default().try_with_token(token);
    assert!(matches!(result, Err(Error::InvalidHeader { .. })));
}
