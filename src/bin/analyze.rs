//! Command-line driver: analyze one fixture using whatever vendor keys are
//! configured in the environment.

use anyhow::{bail, Result};
use pitchintel::{logging, MatchIntelEngine};

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 2 {
        bail!("usage: analyze <home team> <away team> [league]");
    }
    let league = args.get(2).map(String::as_str).unwrap_or("Unknown");

    let engine = MatchIntelEngine::from_env();
    let analysis = engine.analyze_match(&args[0], &args[1], league).await;
    println!("{}", serde_json::to_string_pretty(&analysis)?);
    Ok(())
}
