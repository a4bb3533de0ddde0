use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use unitsplit_engine::{Decomposer, RecomposeConfig, Recomposer, RunReport};

/// Default destination directory name next to the source
const DEFAULT_TREE_DIR: &str = "modules";

fn print_stdout(text: &str) -> Result<()> {
    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

#[derive(Parser)]
#[command(name = "unitsplit")]
#[command(about = "Split a Python module into a bucket tree and join it back", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Print the run report as JSON on stdout (implies --quiet)
    #[arg(long, global = true)]
    json: bool,

    /// TOML file with recomposition settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Split one source file into a bucket tree
    Decompose(DecomposeArgs),

    /// Join a bucket tree back into one source file
    Recompose(RecomposeArgs),
}

#[derive(Args)]
struct DecomposeArgs {
    /// Source file to split
    source: PathBuf,

    /// Destination directory (defaults to `modules` next to the source)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Project root that a relative source path is resolved against
    #[arg(long)]
    project: Option<PathBuf>,
}

#[derive(Args)]
struct RecomposeArgs {
    /// Bucket tree directory
    tree: PathBuf,

    /// Output file (defaults to `<tree>_built.py`)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Ignore the metadata record and use category priority order
    #[arg(long)]
    no_metadata: bool,

    /// Collapse runs of blank lines
    #[arg(long)]
    remove_empty_lines: bool,

    /// Longest blank run kept when collapsing
    #[arg(long)]
    max_empty_lines: Option<usize>,

    /// Strip trailing whitespace
    #[arg(long)]
    trim_trailing_whitespace: bool,

    /// Expand tabs in leading indentation
    #[arg(long)]
    normalize_indentation: bool,
}

pub fn main_entry() -> Result<()> {
    let mut cli = Cli::parse();
    if cli.json {
        cli.quiet = true;
    }

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let config = load_config(cli.config.as_deref())?;
    let report = match cli.command {
        Commands::Decompose(args) => run_decompose(args)?,
        Commands::Recompose(args) => run_recompose(args, config)?,
    };

    if cli.json {
        print_stdout(&serde_json::to_string_pretty(&report)?)?;
    } else if let Some(error) = &report.error {
        eprintln!("Error: {error}");
    } else {
        eprintln!("{}", report.summary());
    }
    if !report.success {
        std::process::exit(1);
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<RecomposeConfig> {
    match path {
        Some(path) => RecomposeConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(RecomposeConfig::default()),
    }
}

fn run_decompose(args: DecomposeArgs) -> Result<RunReport> {
    let source = match &args.project {
        Some(project) if args.source.is_relative() => project.join(&args.source),
        _ => args.source.clone(),
    };
    let destination = args
        .output
        .clone()
        .unwrap_or_else(|| default_tree_dir(&source));
    log::debug!(
        "Decomposing {} into {}",
        source.display(),
        destination.display()
    );

    let mut decomposer = Decomposer::new().context("Failed to initialize parser")?;
    Ok(decomposer.run(&source, &destination))
}

fn run_recompose(args: RecomposeArgs, mut config: RecomposeConfig) -> Result<RunReport> {
    if args.no_metadata {
        config.use_metadata = false;
    }
    if args.remove_empty_lines {
        config.cleanup.remove_empty_lines = true;
    }
    if let Some(max) = args.max_empty_lines {
        config.cleanup.max_empty_lines = max;
    }
    if args.trim_trailing_whitespace {
        config.cleanup.remove_trailing_whitespace = true;
    }
    if args.normalize_indentation {
        config.cleanup.normalize_indentation = true;
    }

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_file(&args.tree));
    log::debug!("Recomposing {} into {}", args.tree.display(), output.display());

    let mut recomposer = Recomposer::new(config).context("Invalid recomposition settings")?;
    Ok(recomposer.run(&args.tree, &output))
}

fn default_tree_dir(source: &Path) -> PathBuf {
    match source.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(DEFAULT_TREE_DIR),
        _ => PathBuf::from(DEFAULT_TREE_DIR),
    }
}

fn default_output_file(tree: &Path) -> PathBuf {
    let name = tree
        .file_name()
        .map_or_else(|| "tree".to_string(), |n| n.to_string_lossy().into_owned());
    tree.with_file_name(format!("{name}_built.py"))
}
