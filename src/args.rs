use clap::Parser;
use secrecy::SecretString;
use std::{
    fmt::{Debug, Display},
    str::FromStr,
};

#[derive(Parser, Debug)]
#[clap(
    name = "repo_top",
    author,
    version,
    about = "Lists the top contributors of a GitHub organization, ranked by commit count.",
    long_about = None
)]
pub struct Args {
    /// GitHub access token
    #[clap(env = "GITHUB_TOKEN")]
    pub token: SecretString,

    /// GitHub organization, as named on the GitHub website
    #[clap(env = "GITHUB_ORGANIZATION")]
    pub organization: String,

    /// Number of top contributors to list. If greater than the number of contributors, all of them are listed
    #[clap(short = 'c', long = "count", env = "TOP_COUNT", default_value_t = 100)]
    pub count: usize,

    /// Timeout of a single request in seconds
    #[clap(short = 't', long = "timeout", env = "REQUEST_TIMEOUT", default_value_t = 15.0, parse(try_from_str=timeout_in_range))]
    pub timeout: f64,

    /// Repository API URL
    #[clap(long, env, default_value = "https://api.github.com")]
    pub api_url: String,

    /// Maximal parallel repository commits requests, unlimited when not set
    #[clap(long, env, parse(try_from_str=max_concurrent_in_range))]
    pub max_concurrent: Option<usize>,
}

fn timeout_in_range(value: &str) -> clap::Result<f64, String> {
    number_in_range(value, 0.001, 86_400.0, "timeout".to_string())
}

fn max_concurrent_in_range(value: &str) -> clap::Result<usize, String> {
    number_in_range(value, 1, usize::MAX, "max_concurrent".to_string())
}

fn number_in_range<T>(value: &str, min: T, max: T, name: String) -> clap::Result<T, String>
where
    T: FromStr + PartialOrd + Display,
    <T as FromStr>::Err: Display,
{
    value.parse::<T>().map_err(|err| format!("{}", err)).and_then(|value| {
        // Written so that NaN is rejected too.
        if !(value >= min && value <= max) {
            return Err(format!("{} is not in range {} .. {}.", name, min, max));
        }
        Ok(value)
    })
}

#[test]
fn number_in_range_test() {
    assert_eq!(timeout_in_range("2.5"), Ok(2.5));
    assert!(timeout_in_range("0").is_err());
    assert!(timeout_in_range("-1").is_err());
    assert!(timeout_in_range("NaN").is_err());
    assert!(timeout_in_range("soon").is_err());
    assert_eq!(max_concurrent_in_range("8"), Ok(8));
    assert!(max_concurrent_in_range("0").is_err());
}

#[test]
fn parse_args_test() {
    use secrecy::ExposeSecret;

    let args = Args::try_parse_from(["repo_top", "t0ken", "acme", "-c", "5", "-t", "2", "--max-concurrent", "4"]).unwrap();

    assert_eq!(args.token.expose_secret(), "t0ken");
    assert_eq!(args.organization, "acme");
    assert_eq!(args.count, 5);
    assert_eq!(args.timeout, 2.0);
    assert_eq!(args.max_concurrent, Some(4));
}

#[test]
fn negative_count_is_rejected_test() {
    assert!(Args::try_parse_from(["repo_top", "t0ken", "acme", "-c", "-3"]).is_err());
}
