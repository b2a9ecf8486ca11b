use clap::{Parser, Subcommand, ValueEnum};
use dialoguer::Confirm;
use fencepack::{
    Confirmation, ContentType, DEFAULT_DOCUMENT, ExclusionRules, ExportConfig, ExtractConfig,
    FencepackError, GitCli, ImportOptions, RepositoryState, Result, export_to_file, run_import,
};
use serde::Serialize;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

const LONG_HELP: &str = r#"
Document format:
  ### `app/Models/User.php`

  ```php
  <?php ...
  ```

Examples:
  # Pack a Laravel project (skips vendor, config, bootstrap, routes, public)
  fencepack export ~/code/my-app
  # Pack everything, including vendor
  fencepack export ~/code/my-app --include-all --output everything.md
  # Unpack into the current directory
  fencepack import
  # Unpack elsewhere, leaving two paths untouched
  fencepack import ~/code/my-app -i php_files.md -x app/Http -x tests
  # Unpack over uncommitted changes without being asked
  fencepack import --force
  # Pack TypeScript instead of PHP
  fencepack --ext ts export ./web
"#;

/// Pack a source tree into one fenced Markdown document and back.
#[derive(Parser, Debug)]
#[command(
    name = "fencepack",
    version,
    about = "Pack a source tree into one fenced Markdown document and back.",
    after_long_help = LONG_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Extension of the embedded files, also used as the fence language tag
    #[arg(long, global = true, value_name = "EXT", env = "FENCEPACK_EXT", default_value = "php")]
    ext: String,

    /// Format of the run summary printed to stdout
    #[arg(long, global = true, value_enum, default_value = "plain")]
    format: SummaryFormat,

    /// Increase verbosity (can be used multiple times)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all log output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Concatenate all matching files under PATH into a Markdown document
    Export {
        /// Base directory of the project
        #[arg(value_name = "PATH")]
        path: PathBuf,

        /// Output Markdown file path
        #[arg(long, value_name = "FILE", default_value = DEFAULT_DOCUMENT)]
        output: PathBuf,

        /// Include the top-level vendor directory
        #[arg(long)]
        include_vendor: bool,

        /// Include the top-level config directory
        #[arg(long)]
        include_config: bool,

        /// Include the top-level bootstrap directory
        #[arg(long)]
        include_bootstrap: bool,

        /// Include the top-level routes directory
        #[arg(long)]
        include_routes: bool,

        /// Include the top-level public directory
        #[arg(long)]
        include_public: bool,

        /// Include all default-excluded top-level directories
        #[arg(long)]
        include_all: bool,
    },

    /// Extract files from a Markdown document into PATH
    Import {
        /// Base directory to extract files into
        #[arg(value_name = "PATH", default_value = ".")]
        path: PathBuf,

        /// Input Markdown file path
        #[arg(short, long, value_name = "FILE", default_value = DEFAULT_DOCUMENT)]
        input: PathBuf,

        /// File or directory to leave untouched (repeatable)
        #[arg(short = 'x', long = "exclude", value_name = "PATH", action = clap::ArgAction::Append)]
        exclude: Vec<String>,

        /// Do not ask before overwriting a git working tree with unstaged changes
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SummaryFormat {
    /// One human-readable line
    Plain,
    /// Full report as JSON for scripting
    Json,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);

    if let Err(e) = run(cli) {
        match e {
            FencepackError::UserDeclined => info!("Aborted by user."),
            e => eprintln!("Error: {e}"),
        }
        std::process::exit(1);
    }
}

fn init_logging(quiet: bool, verbose: u8) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let content_type = ContentType::new(&cli.ext);

    match cli.command {
        Commands::Export {
            path,
            output,
            include_vendor,
            include_config,
            include_bootstrap,
            include_routes,
            include_public,
            include_all,
        } => {
            let mut config = ExportConfig::new(path);
            config.content_type = content_type;
            if include_all {
                config.include_all();
            } else {
                for (flag, name) in [
                    (include_vendor, "vendor"),
                    (include_config, "config"),
                    (include_bootstrap, "bootstrap"),
                    (include_routes, "routes"),
                    (include_public, "public"),
                ] {
                    if flag {
                        config.include(name);
                    }
                }
            }

            let report = export_to_file(&config, &output)?;
            let summary = format!(
                "{} {} file(s) exported to: {}",
                report.exported.len(),
                config.content_type.extension,
                report.output.display()
            );
            print_summary(cli.format, &report, &summary)
        }
        Commands::Import {
            path,
            input,
            exclude,
            force,
        } => {
            let mut config = ExtractConfig::new(path);
            config.content_type = content_type;
            config.exclusions = ExclusionRules::new(&exclude);

            let report = run_import(
                &input,
                &config,
                ImportOptions { force },
                &GitCli,
                &TerminalPrompt,
            )?;
            let mut summary = format!(
                "Extraction complete. {} file(s) written.",
                report.files_written()
            );
            if !report.failed.is_empty() {
                summary.push_str(&format!(" {} failed.", report.failed.len()));
            }
            print_summary(cli.format, &report, &summary)
        }
    }
}

fn print_summary<T: Serialize>(format: SummaryFormat, report: &T, plain: &str) -> Result<()> {
    match format {
        SummaryFormat::Plain => println!("{plain}"),
        SummaryFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
    }
    io::stdout().flush()?;
    Ok(())
}

/// Asks on the terminal, or reads one answer line when stdin is piped.
struct TerminalPrompt;

impl Confirmation for TerminalPrompt {
    fn confirm(&self, _state: &RepositoryState) -> Result<bool> {
        let prompt = "You have unstaged changes in your git repository. Continue anyway?";

        if io::stdin().is_terminal() {
            return Confirm::new()
                .with_prompt(prompt)
                .default(false)
                .interact()
                .map_err(|e| FencepackError::Prompt {
                    message: e.to_string(),
                });
        }

        eprint!("{prompt} [y/N] ");
        io::stderr().flush()?;
        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        Ok(matches!(
            answer.trim().to_ascii_lowercase().as_str(),
            "y" | "yes"
        ))
    }
}
