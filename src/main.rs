use std::env;
use std::process::ExitCode;

use tracing::Level;
use tracing_subscriber::EnvFilter;

use routenoded::cli;
use routenoded::node::Node;

fn main() -> ExitCode {
    if let Err(err) = init_logging() {
        eprintln!("failed to initialize logging: {err}");
        return ExitCode::FAILURE;
    }

    let args: Vec<String> = env::args().skip(1).collect();
    let config = match cli::parse(&args) {
        Ok(config) => config,
        Err(usage) => {
            println!("{usage}");
            return ExitCode::FAILURE;
        }
    };

    let node = match Node::bind(config) {
        Ok(node) => node,
        Err(err) => {
            tracing::error!("failed to start node: {err:#}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = node.run() {
        tracing::error!("node exited: {err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .compact()
        .init();
    Ok(())
}
