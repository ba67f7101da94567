use std::fs::File;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cachefs::{DiskCache, Session, SessionConfig, DEFAULT_SCHEME, DEFAULT_TIME_LIMIT_SECS};
use cachefs_cli::{commands, CliError};

/// cachefs - a filesystem kept in a key-value cache directory
#[derive(Parser, Debug)]
#[command(name = "cachefs")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Cache directory [default: <user cache dir>/cachefs]
    #[arg(long, env = "CACHEFS_CACHE_DIR", global = true)]
    cache_dir: Option<PathBuf>,

    /// Path scheme for index keys
    #[arg(long, env = "CACHEFS_SCHEME", default_value = DEFAULT_SCHEME, global = true)]
    scheme: String,

    /// Seconds before a held lock is considered abandoned
    #[arg(long, env = "CACHEFS_TIME_LIMIT", default_value_t = DEFAULT_TIME_LIMIT_SECS, global = true)]
    time_limit: u64,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List directory contents
    Ls {
        #[arg(default_value = "/")]
        path: String,

        /// Show kind, size and modification time
        #[arg(short, long)]
        long: bool,
    },

    /// Print a file
    Cat { path: String },

    /// Write stdin (or a local file) to a path
    Put {
        path: String,

        /// Read content from this local file instead of stdin
        #[arg(long, value_name = "FILE")]
        from: Option<PathBuf>,

        /// Append instead of replacing
        #[arg(short, long)]
        append: bool,

        /// Create missing parent directories
        #[arg(short, long)]
        parents: bool,
    },

    /// Create a directory and any missing parents
    Mkdir { path: String },

    /// Remove an empty directory
    Rmdir { path: String },

    /// Remove a file
    Rm {
        path: String,

        /// Ignore missing files
        #[arg(short, long)]
        force: bool,
    },

    /// Move or rename a file or directory
    Mv { from: String, to: String },

    /// Show metadata as JSON
    Stat { path: String },

    /// Read JSON calls from stdin, one per line, and answer each
    Exec,

    /// Delete expired entries from the cache directory
    Gc,
}

fn main() {
    let args = Args::parse();
    setup_tracing(args.verbose);

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn setup_tracing(verbose: u8) {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with_writer(io::stderr)
        .init();
}

fn cache_dir(args: &Args) -> Result<PathBuf, CliError> {
    match &args.cache_dir {
        Some(dir) => Ok(dir.clone()),
        None => dirs::cache_dir()
            .map(|dir| dir.join("cachefs"))
            .ok_or(CliError::NoCacheDir),
    }
}

fn run(args: Args) -> Result<(), CliError> {
    let root = cache_dir(&args)?;
    let store = DiskCache::create(root)?;
    tracing::debug!(root = %store.root().display(), "using cache directory");

    let stdout = io::stdout();
    let mut out = stdout.lock();

    if let Command::Gc = args.command {
        commands::gc(&store, &mut out)?;
        return Ok(());
    }

    let config = SessionConfig::new()
        .with_scheme(args.scheme)
        .with_time_limit(args.time_limit);
    let mut session = Session::open(store, config)?;

    let result = match args.command {
        Command::Ls { path, long } => commands::ls(&mut session, &path, long, &mut out),
        Command::Cat { path } => commands::cat(&mut session, &path, &mut out),
        Command::Put {
            path,
            from,
            append,
            parents,
        } => {
            let mut input: Box<dyn Read> = match from {
                Some(file) => Box::new(File::open(file)?),
                None => Box::new(io::stdin()),
            };
            commands::put(&mut session, &path, &mut input, append, parents).map(|_| ())
        }
        Command::Mkdir { path } => session.mkdir(&path).map_err(CliError::from),
        Command::Rmdir { path } => session.rmdir(&path).map_err(CliError::from),
        Command::Rm { path, force } => commands::rm(&mut session, &path, force),
        Command::Mv { from, to } => session.rename(&from, &to).map_err(CliError::from),
        Command::Stat { path } => commands::stat(&mut session, &path, &mut out),
        Command::Exec => commands::exec(&mut session, io::stdin().lock(), &mut out).map(|_| ()),
        Command::Gc => Ok(()),
    };

    // Close even after a failed command so the lock is released.
    let closed = session.close();
    out.flush()?;
    result?;
    closed?;
    Ok(())
}
