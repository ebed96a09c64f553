mod cli;
mod collector;
mod error;
mod filter;
mod model;
mod output;
mod resolver;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use cli::CliArgs;
use collector::Collector;
use filter::{FilterConfig, SortKey};
use output::OutputFormatter;
use resolver::Resolver;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    env_logger::init();

    let args = CliArgs::parse();

    let filter = match FilterConfig::from_cli(&args) {
        Ok(filter) => filter,
        Err(err) => {
            eprintln!("netpeek: {}", err);
            return ExitCode::FAILURE;
        }
    };
    let sort_key = match args.sort.as_deref().map(str::parse::<SortKey>).transpose() {
        Ok(key) => key,
        Err(err) => {
            eprintln!("netpeek: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let collector = Collector::new();
    let resolver = Arc::new(Resolver::new(Duration::from_millis(args.resolve_timeout_ms)));
    resolver.set_no_cache(args.no_resolve_cache);
    let formatter = OutputFormatter::from_cli(&args);

    loop {
        match collector.collect() {
            Ok(connections) => {
                let mut connections = filter.apply(connections);
                if let Some(key) = sort_key {
                    filter::sort_connections(&mut connections, key);
                }
                if let Err(err) = formatter.print(&connections, &resolver).await {
                    eprintln!("netpeek: {}", err);
                    return ExitCode::FAILURE;
                }
            }
            // In watch mode a failed poll keeps the previous output on
            // screen and retries on the next tick.
            Err(err) => {
                eprintln!("netpeek: {}", err);
                if args.watch.is_none() {
                    return ExitCode::FAILURE;
                }
            }
        }

        match args.watch {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => break,
        }
    }

    ExitCode::SUCCESS
}
