use clap::Parser;
use repo_top_app::Args;

/// Lists the top committers of a GitHub organization

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    env_logger::init();
    let args = Args::parse();

    match repo_top_app::top_committers(args).await {
        Ok(report) => println!("{}", report),
        Err(err) => {
            println!("Failed to list top committers: {}", err);
            std::process::exit(1);
        }
    }
}
