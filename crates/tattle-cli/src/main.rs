#![forbid(unsafe_code)]

mod cmd;
mod output;
mod tui;

use clap::{CommandFactory, Parser, Subcommand};
use output::OutputMode;
use std::env;
use std::io;
use output::{CliError, render_error};
use tattle_core::config::{find_project_root, resolve_config};
use tattle_core::error::ErrorCode;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "tattle: send feedback about an issue to the developers",
    long_about = None
)]
struct Cli {
    /// Enable debug logging for tattle itself.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    const fn is_interactive(&self) -> bool {
        matches!(self.command, Commands::Panel)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Feedback",
        about = "Submit feedback from the command line",
        long_about = "Fill in the feedback form from flags and submit it to the configured store. \
                      All three fields are required and validated before anything is sent.",
        after_help = "EXAMPLES:\n    # Submit feedback\n    tt submit --url https://example.com/issues/42 \\\n        --description \"Save button does nothing\" \\\n        --steps \"Open editor, click Save\"\n\n    # Emit machine-readable output\n    tt submit -u https://example.com/issues/42 -d \"...\" -s \"...\" --json"
    )]
    Submit(cmd::submit::SubmitArgs),

    #[command(
        next_help_heading = "Feedback",
        about = "Open the interactive feedback panel",
        long_about = "Open a terminal panel with the feedback form. Fields are validated as you \
                      type; Enter or clicking the button submits.",
        after_help = "EXAMPLES:\n    # Open the panel\n    tt panel"
    )]
    Panel,

    #[command(
        next_help_heading = "Read",
        about = "List stored feedback",
        long_about = "List feedback recorded in the local feedback log.",
        after_help = "EXAMPLES:\n    # List everything\n    tt list\n\n    # Only the last five entries\n    tt list -n 5\n\n    # Emit machine-readable output\n    tt list --json"
    )]
    List(cmd::list::ListArgs),

    #[command(
        next_help_heading = "Project Maintenance",
        about = "Generate shell completion scripts",
        long_about = "Generate shell completion scripts for supported shells.",
        after_help = "EXAMPLES:\n    # Generate bash completions\n    tt completions bash\n\n    # Generate zsh completions\n    tt completions zsh"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

/// Filter used when `TATTLE_LOG` is unset.
const fn default_filter(interactive: bool, verbose: bool, quiet: bool) -> &'static str {
    if interactive {
        // The panel owns the terminal.
        "off"
    } else if verbose {
        "tattle=debug,info"
    } else if quiet {
        "error"
    } else {
        "tattle=info,warn"
    }
}

fn init_tracing(cli: &Cli) {
    let verbose = cli.verbose || env::var("DEBUG").is_ok();
    let filter = EnvFilter::try_from_env("TATTLE_LOG").unwrap_or_else(|_| {
        EnvFilter::new(default_filter(cli.is_interactive(), verbose, cli.quiet))
    });

    let format = env::var("TATTLE_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let project_root = find_project_root(&env::current_dir()?);
    let config = match resolve_config(&project_root, cli.json) {
        Ok(config) => config,
        Err(err) => {
            // Config decides the output mode, so only the flag applies here.
            let mode = if cli.json {
                OutputMode::Json
            } else {
                OutputMode::Text
            };
            render_error(
                mode,
                &CliError::from_code(ErrorCode::ConfigParseError, format!("{err:#}")),
            )?;
            return Err(err);
        }
    };
    let output = OutputMode::from_resolved(&config.resolved_output);
    debug!(root = %project_root.display(), ?output, "resolved configuration");

    match cli.command {
        Commands::Submit(ref args) => {
            let session = cmd::mount_session(&config.project, &project_root)?;
            cmd::submit::run_submit(args, session, output)
        }
        Commands::Panel => {
            let session = cmd::mount_session(&config.project, &project_root)?;
            cmd::panel::run_panel(session)
        }
        Commands::List(ref args) => cmd::list::run_list(args, output, &project_root),
        Commands::Completions(ref args) => {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command)
        }
    }
}
