use crate::GithubClient;
use log::debug;
use repo_top::api::{Error, Result};
use reqwest::header::{HeaderMap, LINK};
use serde::de::DeserializeOwned;
use url::Url;

pub(crate) const PER_PAGE: u32 = 100;

impl GithubClient {
    /// Collects every page of the collection at `url`.
    ///
    /// Only the first request sets `per_page`, later pages are requested with the exact URL of the
    /// `next` relation. Any failed page fails the whole walk.
    pub(crate) async fn fetch_all_pages<T>(&self, url: Url) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let request = self.client.get(url.clone()).query(&[("per_page", PER_PAGE)]);
        let response = self.get(request).await?;
        let mut next = next_link(response.headers())?;
        let mut items: Vec<T> = response.json().await?;
        let mut pages = 1;

        while let Some(next_url) = next {
            debug!("Following next page {}", next_url);
            let response = self.get(self.client.get(next_url)).await?;
            next = next_link(response.headers())?;
            items.extend(response.json::<Vec<T>>().await?);
            pages += 1;
        }

        debug!("Fetched {} items in {} pages from {}", items.len(), pages, url);
        Ok(items)
    }
}

/// Target of the `rel="next"` entry of the `Link` headers, if any.
pub(crate) fn next_link(headers: &HeaderMap) -> Result<Option<Url>> {
    for value in headers.get_all(LINK) {
        let value = value.to_str().map_err(|err| invalid_link(err.to_string()))?;
        for link in value.split(',') {
            let mut parts = link.split(';');
            let target = parts.next().unwrap_or_default().trim();
            let is_next = parts.any(|param| {
                param
                    .trim()
                    .strip_prefix("rel=")
                    .map(|rel| rel.trim_matches('"').split_whitespace().any(|rel| rel == "next"))
                    .unwrap_or(false)
            });
            if !is_next {
                continue;
            }
            let target = target
                .strip_prefix('<')
                .and_then(|target| target.strip_suffix('>'))
                .ok_or_else(|| invalid_link(format!("malformed link target {}", target)))?;
            let url = Url::parse(target).map_err(|err| invalid_link(err.to_string()))?;
            return Ok(Some(url));
        }
    }
    Ok(None)
}

fn invalid_link(reason: String) -> Error {
    Error::InvalidHeader {
        name: LINK.as_str().to_string(),
        reason,
    }
}

#[cfg(test)]
fn link_headers(values: &[&'static str]) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for value in values {
        headers.append(LINK, reqwest::header::HeaderValue::from_static(*value));
    }
    headers
}

#[test]
fn next_link_test() -> anyhow::Result<()> {
    let headers = link_headers(&[
        r#"<https://api.github.com/repositories/1300192/commits?page=2>; rel="prev", <https://api.github.com/repositories/1300192/commits?page=4>; rel="next", <https://api.github.com/repositories/1300192/commits?page=515>; rel="last""#,
    ]);

    let next = next_link(&headers)?;

    assert_eq!(
        next.as_ref().map(Url::as_str),
        Some("https://api.github.com/repositories/1300192/commits?page=4")
    );
    Ok(())
}

#[test]
fn last_page_has_no_next_link_test() -> anyhow::Result<()> {
    let headers = link_headers(&[
        r#"<https://api.github.com/orgs/acme/repos?page=1>; rel="first", <https://api.github.com/orgs/acme/repos?page=2>; rel="prev""#,
    ]);
    assert_eq!(next_link(&headers)?, None);
    assert_eq!(next_link(&HeaderMap::new())?, None);
    Ok(())
}

#[test]
fn next_link_is_taken_verbatim_test() -> anyhow::Result<()> {
    let headers = link_headers(&[
        r#"<https://api.github.com/orgs/acme/repos?per_page=100&after=Y3Vyc29yOnYyOpHOAAB>; rel="next""#,
    ]);

    let next = next_link(&headers)?;

    assert_eq!(
        next.as_ref().map(Url::as_str),
        Some("https://api.github.com/orgs/acme/repos?per_page=100&after=Y3Vyc29yOnYyOpHOAAB")
    );
    Ok(())
}

#[test]
fn next_link_across_multiple_headers_test() -> anyhow::Result<()> {
    let headers = link_headers(&[
        r#"<https://api.github.com/orgs/acme/repos?page=1>; rel="first""#,
        r#"<https://api.github.com/orgs/acme/repos?page=3>; rel=next"#,
    ]);
    assert_eq!(
        next_link(&headers)?.as_ref().map(Url::as_str),
        Some("https://api.github.com/orgs/acme/repos?page=3")
    );
    Ok(())
}

#[test]
fn malformed_next_link_is_rejected_test() {
    let headers = link_headers(&[r#"https://api.github.com/orgs/acme/repos?page=2; rel="next""#]);
    assert!(matches!(next_link(&headers), Err(Error::InvalidHeader { .. })));
}
