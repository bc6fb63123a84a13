mod args;

use github_client::{GithubClientBuilder, RateLimit};
use log::info;
use repo_top::api::{Contribution, Result};
use repo_top::TopCommitters;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

pub use args::Args;

#[derive(Debug)]
pub struct Report {
    pub committers: Vec<Contribution>,
    pub rate_limit: RateLimit,
}

impl Display for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.rate_limit)?;
        for committer in &self.committers {
            write!(f, "\n{}", committer)?;
        }
        Ok(())
    }
}

pub async fn top_committers(args: Args) -> Result<Report> {
    info!("Listing top {} committers of {}", args.count, args.organization);
    let client = GithubClientBuilder::default()
        .with_github_url(args.api_url)
        .with_timeout(Duration::try_from_secs_f64(args.timeout).map_err(anyhow::Error::from)?)
        .try_with_token(args.token)?
        .build()
        .await?;

    let mut top_committers = TopCommitters::new(Arc::new(client));
    if let Some(max_concurrent) = args.max_concurrent {
        top_committers = top_committers.with_max_concurrent(max_concurrent);
    }
    let committers = top_committers
        .fetch_top_committers(&args.organization, args.count)
        .await?;
    let rate_limit = top_committers.client().rate_limit().await;

    Ok(Report { committers, rate_limit })
}

#[test]
fn report_display_test() {
    let report = Report {
        committers: vec![
            Contribution::new("alice@x".to_string(), 5),
            Contribution::new("bob@x".to_string(), 2),
        ],
        rate_limit: RateLimit::new(5000, 4990, 10, None),
    };

    assert_eq!(
        report.to_string(),
        "You have used 10 queries of 5000. Remaining: 4990\n\nalice@x: 5 commits count\nbob@x: 2 commits count"
    );
}
