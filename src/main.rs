// src/main.rs

use catin::cli::{self, Command};
use catin::{logging, run};

#[tokio::main]
async fn main() {
    match run_main().await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            eprintln!("meow error: {err:?}");
            std::process::exit(1);
        }
    }
}

async fn run_main() -> anyhow::Result<bool> {
    let args = cli::parse();
    // A detached daemon logs into its cache directory instead.
    if !matches!(args.command, Command::Run { detach: true }) {
        logging::init_logging(args.log_level)?;
    }
    run(args).await
}
