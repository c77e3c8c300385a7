//! Kiln - dependency resolver for native packages
//!
//! Kiln reads a project's `kiln.toml`, expands every requirement against the
//! package registry and settles on exactly one version per package, using a
//! SAT solver when several versions compete. The result is written to
//! `kiln.lock`.

mod cli;
mod core;
mod resolver;
mod cache;
mod registry;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cli::{output, Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };

    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    output::set_quiet(cli.quiet);
    let json_output = cli.json;

    // Execute command
    let result = match cli.command {
        Commands::Resolve(args) => cli::commands::resolve::execute(args, json_output).await,
        Commands::Tree(args) => cli::commands::tree::execute(args, json_output).await,
        Commands::Cache(args) => cli::commands::cache::execute(args, json_output).await,
    };

    if let Err(ref e) = result {
        if json_output {
            let error_json = serde_json::json!({
                "error": true,
                "code": e.exit_code(),
                "message": e.to_string()
            });
            eprintln!("{}", error_json);
        } else {
            eprintln!("{} {}", console::style("error:").red().bold(), e);
        }
        std::process::exit(e.exit_code());
    }
}
