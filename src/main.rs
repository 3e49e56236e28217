use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use clickable_code::{commands, diagnostics};

/// Command-line arguments.
#[derive(Parser)]
#[command(
    name = "clickable-code",
    about = "Link code identifiers in rendered documentation HTML to their reference pages"
)]
struct Cli {
    /// Command to run.
    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Rewrite every HTML page of a built site in place
    Build {
        /// Directory holding the rendered site
        site_dir: PathBuf,
    },
    /// Output a reference document with the current build state
    Info {
        /// Emit JSON instead of markdown
        #[arg(long)]
        json: bool,
    },
    /// Rewrite one HTML page and print it to stdout
    Page {
        /// The rendered page
        file: PathBuf,
        /// Site-absolute URL the page is served from
        #[arg(long, default_value = "/index.html")]
        url: String,
        /// Built site used to look up documentation URLs
        #[arg(long)]
        site: Option<PathBuf>,
    },
    /// List the Python definitions found under the configured sources
    Symbols {
        /// Emit JSON instead of aligned text
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Warn)
        .parse_default_env()
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Build { site_dir } => commands::build(&site_dir),
        Commands::Info { json } => commands::info(json),
        Commands::Page { file, url, site } => commands::page(&file, &url, site.as_deref()),
        Commands::Symbols { json } => commands::symbols(json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            diagnostics::print_error(&e);
            ExitCode::FAILURE
        },
    }
}
