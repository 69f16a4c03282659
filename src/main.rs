//! dircache - Periodically refreshed snapshots of a directory tree.
//!
//! Usage:
//!   dircache snapshot [PATH]   Walk once and print the tree
//!   dircache watch [PATH]      Keep a cache running and report changes
//!   dircache --help            Show help

use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Local};
use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Context, Result, bail};
use tracing_subscriber::EnvFilter;

use dircache_core::{Directory, FilterMode, NameFilter, NamedNode, TreeNode};
use dircache_engine::DirCache;
use dircache_walk::walk;

#[derive(Parser)]
#[command(
    name = "dircache",
    version,
    about = "Periodically refreshed in-memory snapshots of a directory tree",
    long_about = "dircache walks a directory, keeps the resulting tree in memory and \
                  re-walks it on an interval, reporting when files are added, \
                  removed or change size.\n\n\
                  Set RUST_LOG=debug to see every walk."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Walk once and print the tree
    Snapshot {
        /// Directory to walk
        #[arg(default_value = ".")]
        path: PathBuf,

        #[command(flatten)]
        filter: FilterArgs,

        /// Print the tree as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a cache and print a summary whenever the tree changes
    Watch {
        /// Directory to watch
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Time between walks (e.g., "500ms", "2s", "1m")
        #[arg(short, long, default_value = "1s")]
        interval: String,

        #[command(flatten)]
        filter: FilterArgs,

        /// Stop after this many seconds (runs until interrupted otherwise)
        #[arg(long = "for", value_name = "SECS")]
        run_for: Option<u64>,
    },
}

#[derive(Args)]
struct FilterArgs {
    /// Glob pattern matched against entry names (repeatable)
    #[arg(short, long = "pattern", value_name = "GLOB")]
    patterns: Vec<String>,

    /// Drop entries matching the patterns instead of keeping them
    #[arg(short = 'x', long, conflicts_with = "files_only")]
    exclude: bool,

    /// Apply the patterns to files only; directories are always kept
    #[arg(short, long)]
    files_only: bool,
}

impl FilterArgs {
    fn build(&self) -> Result<NameFilter> {
        if self.patterns.is_empty() {
            return Ok(NameFilter::all());
        }
        let mode = if self.exclude {
            FilterMode::Exclude
        } else if self.files_only {
            FilterMode::IncludeFiles
        } else {
            FilterMode::Include
        };
        NameFilter::new(&self.patterns, mode).context("Invalid pattern")
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;
    setup_tracing();

    let cli = Cli::parse();

    match cli.command {
        Command::Snapshot { path, filter, json } => {
            run_snapshot(&path, filter.build()?, json)?;
        }
        Command::Watch {
            path,
            interval,
            filter,
            run_for,
        } => {
            let interval = parse_interval(&interval)?;
            run_watch(&path, interval, filter.build()?, run_for.map(Duration::from_secs))?;
        }
    }

    Ok(())
}

fn setup_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

/// Walk once and print the result.
fn run_snapshot(path: &Path, filter: NameFilter, json: bool) -> Result<()> {
    let path = path.canonicalize().context("Invalid path")?;
    let snapshot = walk(&path, filter).context("Walk failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    print_header(&path, &snapshot.root, snapshot.walked_at);
    println!(" Walked in {:.2}s", snapshot.walk_duration.as_secs_f64());
    println!("{}", "─".repeat(60));
    println!();

    if let Some(tree) = size_tree(&snapshot.root) {
        print_tree(&tree, 0);
    }

    if snapshot.has_warnings() {
        println!();
        println!("{} warning(s) during walk", snapshot.warnings.len());
        for warning in &snapshot.warnings {
            println!("  {}: {}", warning.path.display(), warning.message);
        }
    }

    Ok(())
}

/// Run a cache until the deadline, printing each new tree.
fn run_watch(
    path: &Path,
    interval: Duration,
    filter: NameFilter,
    run_for: Option<Duration>,
) -> Result<()> {
    let path = path.canonicalize().context("Invalid path")?;
    let cache = Arc::new(DirCache::cache(&path, interval, filter)?);

    let weak: Weak<DirCache> = Arc::downgrade(&cache);
    cache.set_callback(move || {
        let Some(cache) = weak.upgrade() else {
            return;
        };
        if let (Some(root), Some(walked_at)) = (cache.root(), cache.last_walk_time()) {
            print_header(cache.root_path(), &root, walked_at);
            println!();
        }
    });

    eprintln!(
        "Watching {} every {}ms...",
        path.display(),
        interval.as_millis()
    );
    cache.start()?;

    if cache.root().is_none() {
        eprintln!("Initial walk failed, retrying every interval");
    }

    match run_for {
        Some(duration) => thread::sleep(duration),
        None => loop {
            thread::park();
        },
    }

    cache.close();
    Ok(())
}

fn print_header(path: &Path, root: &Directory, walked_at: SystemTime) {
    let walked_at: DateTime<Local> = walked_at.into();
    println!("{}", "─".repeat(60));
    println!(" {} - {}", path.display(), format_size(root.total_size()));
    println!(
        " {} files, {} directories",
        root.file_count(),
        root.dir_count()
    );
    println!(" Walked at {}", walked_at.format("%Y-%m-%d %H:%M:%S"));
}

/// Fold the snapshot into a tree of names labelled with their size.
fn size_tree(root: &Directory) -> Option<NamedNode<u64>> {
    root.fold(
        |dir, children: Vec<NamedNode<u64>>| {
            let size = children.iter().map(|c| *c.value()).sum();
            Some(NamedNode::branch(format!("{}/", dir.name()), size, children))
        },
        |file| Some(NamedNode::leaf(file.name(), file.size())),
    )
}

fn print_tree(node: &NamedNode<u64>, depth: usize) {
    let indent = "  ".repeat(depth);
    println!(
        "{}{}{:<40} {:>10}",
        indent,
        if node.is_leaf() { "  " } else { "▼ " },
        truncate(node.name(), 40),
        format_size(*node.value())
    );
    for child in node.children() {
        print_tree(child, depth + 1);
    }
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

/// Truncate a string to max length.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 1).collect();
        format!("{}…", kept)
    }
}

/// Parse an interval string (e.g., "250ms", "2s", "1m"). Bare numbers are seconds.
fn parse_interval(s: &str) -> Result<Duration> {
    let s = s.trim().to_lowercase();

    let (num, unit_secs) = if let Some(num) = s.strip_suffix("ms") {
        (num, None)
    } else if let Some(num) = s.strip_suffix('s') {
        (num, Some(1.0))
    } else if let Some(num) = s.strip_suffix('m') {
        (num, Some(60.0))
    } else {
        (s.as_str(), Some(1.0))
    };
    let num: f64 = num.trim().parse()?;
    let secs = match unit_secs {
        Some(unit) => num * unit,
        None => num / 1000.0,
    };
    let duration = Duration::try_from_secs_f64(secs)?;

    if duration.is_zero() {
        bail!("Interval must be greater than zero");
    }
    Ok(duration)
}
