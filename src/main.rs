use anyhow::Result;
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use themis_scan::app::App;
use themis_scan::cli::{Cli, Commands};

fn init_tracing(verbose: bool, serving: bool) {
    let default_directive = if verbose {
        "themis_scan=debug"
    } else if serving {
        "themis_scan=info"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_env("THEMIS_LOG").unwrap_or_else(|_| EnvFilter::new(default_directive));

    // Report output goes to stdout; keep logs on stderr.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, matches!(cli.command, Some(Commands::Serve { .. })));

    match cli.command {
        Some(cmd) => {
            let mut app = App::new().await?;
            app.run_command(cmd).await?;
        }
        None => {
            Cli::command().print_help()?;
        }
    }

    Ok(())
}
