//! CLI entry point for `mailshelf`.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{CommandFactory, Parser, Subcommand};

use mailshelf::config::{self, Config, LoadedConfig};
use mailshelf::error::MailshelfError;
use mailshelf::ingest::Ingestor;
use mailshelf::library::Library;
use mailshelf::process::Toolchain;

/// Exit code for failures that carry no `MailshelfError`.
const EXIT_FAILURE: u8 = 1;

#[derive(Parser)]
#[command(
    name = "mailshelf",
    version,
    about = "Deliver e-books sent by email into a calibre library",
    long_about = "Reads one mail message, adds its first e-book attachment to a calibre \
                  library and attaches every other configured format to the same entry. \
                  Without a subcommand the message is ingested from standard input."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file (default: $MAILSHELF_CONFIG or the user config dir)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Calibre library directory (overrides library.path)
    #[arg(short, long, global = true, value_name = "DIR")]
    library: Option<PathBuf>,

    /// Accepted book format, repeat for several (overrides library.formats)
    #[arg(short, long = "format", global = true, value_name = "SUFFIX")]
    formats: Vec<String>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a message into the library (default)
    Ingest {
        /// Read the message from a file instead of standard input
        #[arg(long, value_name = "FILE")]
        message: Option<PathBuf>,
        /// Print a JSON report of the delivered book
        #[arg(long)]
        json: bool,
    },
    /// Save the book attachment of a message to a directory
    Extract {
        /// Read the message from a file instead of standard input
        #[arg(long, value_name = "FILE")]
        message: Option<PathBuf>,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Report whether the library holds any books
    Status,
    /// Print the effective configuration
    Config {
        /// Also write it to the standard config location
        #[arg(long)]
        save: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let loaded = match load_config(&cli) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("mailshelf: {e}");
            return ExitCode::from(e.exit_code());
        }
    };

    let config = &loaded.config;

    // Configure logging: stderr + log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, config);
    loaded.log();

    let (result, lenient) = match cli.command {
        None => (cmd_ingest(config, None, false), config.general.exit_zero_on_failure),
        Some(Commands::Ingest { message, json }) => (
            cmd_ingest(config, message.as_deref(), json),
            config.general.exit_zero_on_failure,
        ),
        Some(Commands::Extract { message, output }) => {
            (cmd_extract(config, message.as_deref(), &output), false)
        }
        Some(Commands::Status) => (cmd_status(config), false),
        Some(Commands::Config { save }) => (cmd_config(config, save), false),
        Some(Commands::Completions { shell }) => (cmd_completions(shell), false),
        Some(Commands::Manpage) => (cmd_manpage(), false),
    };

    match result {
        Ok(()) => {
            tracing::info!("Exiting");
            ExitCode::SUCCESS
        }
        Err(e) => {
            let mailshelf_err = e.downcast_ref::<MailshelfError>();
            tracing::error!(error = %format!("{e:#}"), "Exception occurred, exiting");
            if let Some(output) = mailshelf_err.and_then(MailshelfError::tool_output) {
                tracing::error!("Tool output:\n{output}");
            }
            if lenient {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(mailshelf_err.map_or(EXIT_FAILURE, MailshelfError::exit_code))
            }
        }
    }
}

/// Load the config file and apply command-line overrides.
fn load_config(cli: &Cli) -> Result<LoadedConfig, MailshelfError> {
    let mut loaded = match &cli.config {
        Some(path) => LoadedConfig {
            config: config::load_config_from(path)?,
            source: Some(path.clone()),
            ignored: None,
        },
        None => config::load_config(),
    };
    let config = &mut loaded.config;
    if let Some(library) = &cli.library {
        config.library.path = library.clone();
    }
    if !cli.formats.is_empty() {
        config.library.formats = cli.formats.clone();
    }
    config.validate()?;
    Ok(loaded)
}

/// Set up tracing with stderr output and file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_file = config::log_file_path(config);
    let log_dir = log_file
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let file_name = log_file
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "mailshelf.log".into());

    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, file_name);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Read the whole message from `path`, or from stdin if none is given.
fn read_message(path: Option<&Path>) -> anyhow::Result<Vec<u8>> {
    let raw = match path {
        Some(path) => std::fs::read(path).map_err(|e| MailshelfError::io(path, e))?,
        None => {
            let mut raw = Vec::new();
            std::io::stdin()
                .lock()
                .read_to_end(&mut raw)
                .map_err(|e| MailshelfError::io("<stdin>", e))?;
            raw
        }
    };
    Ok(raw)
}

/// Ingest one message into the configured library.
fn cmd_ingest(config: &Config, message: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let ingestor = Ingestor::from_config(config, Toolchain::system(config.tools.clone()))?;
    let raw = read_message(message)?;
    let report = ingestor.ingest(&raw)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}

/// Save the book attachment without touching the library.
fn cmd_extract(config: &Config, message: Option<&Path>, output: &Path) -> anyhow::Result<()> {
    let formats = config.format_set()?;
    let raw = read_message(message)?;
    let path = mailshelf::export::save_attachment(&raw, &formats, output)?;
    println!("  Saved {}", path.display());
    Ok(())
}

/// Report whether the library holds any books.
fn cmd_status(config: &Config) -> anyhow::Result<()> {
    let library = Library::from_config(config, Toolchain::system(config.tools.clone()));
    let state = if library.is_empty()? {
        "empty"
    } else {
        "holds books"
    };
    println!("  {:<12} {}", "Library", library.root().display());
    println!("  {:<12} {}", "State", state);
    println!("  {:<12} {}", "Formats", config.library.formats.join(", "));
    Ok(())
}

/// Print the effective configuration as TOML.
fn cmd_config(config: &Config, save: bool) -> anyhow::Result<()> {
    print!("{}", toml::to_string_pretty(config)?);
    if save {
        config::save_config(config)?;
    }
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mailshelf", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}
