mod commands;
mod config;
mod context;
mod diagnostics;
mod error;
mod gate;
mod host;
mod info;
mod layout;
mod platform;
mod sections;
mod toc;
mod tracker;
mod watch;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use crate::commands::SpyOptions;

/// Command-line arguments.
#[derive(Parser)]
#[command(name = "docnav", about = "Language-gated sections and scroll-spy headings for markdown docs")]
struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    command: Commands,
}

/// Every docnav subcommand.
#[derive(Subcommand)]
enum Commands {
    /// Validate every LanguageSection in the scanned markdown files
    Check,
    /// Output a reference sheet of syntax, platforms, and current state
    Info {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the valid platform values
    Platforms,
    /// Print the markdown with language sections gated for a platform
    Render {
        /// Markdown file to render
        file: String,
        /// Platform to render for (overrides .docnav.toml)
        #[arg(long)]
        platform: Option<String>,
    },
    /// Simulate scrolling and print each change of the active heading
    Spy {
        /// Markdown file to scroll through
        file: String,
        /// Platform to render for (overrides .docnav.toml)
        #[arg(long)]
        platform: Option<String>,
        /// Viewport height in pixels
        #[arg(long, default_value_t = 800)]
        viewport: u32,
        /// Height of one source line in pixels
        #[arg(long, default_value_t = 24)]
        line_height: u32,
        /// Pixels scrolled between samples
        #[arg(long, default_value_t = 24)]
        step: u32,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the table of contents of the rendered document
    Toc {
        /// Markdown file to read
        file: String,
        /// Platform to render for (overrides .docnav.toml)
        #[arg(long)]
        platform: Option<String>,
        /// Include headings that are not tracked while scrolling
        #[arg(long)]
        all: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Re-render on file changes; type a platform name to switch
    Watch {
        /// Markdown file to watch
        file: String,
        /// Initial platform (overrides .docnav.toml)
        #[arg(long)]
        platform: Option<String>,
    },
}

/// Initialize logging, run the subcommand, and map errors to exit code 3.
fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check => commands::check(),
        Commands::Info { json } => {
            commands::info(json);
            Ok(ExitCode::SUCCESS)
        },
        Commands::Platforms => {
            commands::platforms();
            Ok(ExitCode::SUCCESS)
        },
        Commands::Render { file, platform } => {
            commands::render(&file, platform.as_deref()).map(|()| return ExitCode::SUCCESS)
        },
        Commands::Spy { file, platform, viewport, line_height, step, json } => {
            let options = SpyOptions { line_height, step, viewport };
            commands::spy(&file, platform.as_deref(), options, json).map(|()| return ExitCode::SUCCESS)
        },
        Commands::Toc { file, platform, all, json } => {
            commands::toc(&file, platform.as_deref(), all, json).map(|()| return ExitCode::SUCCESS)
        },
        Commands::Watch { file, platform } => watch::run(&file, platform.as_deref()),
    };

    return match result {
        Ok(code) => code,
        Err(e) => {
            diagnostics::print_error(&e);
            ExitCode::from(3)
        },
    };
}
