use clap::{Parser, Subcommand};
use quire::engine::{self, BuildEvent};
use quire::{config, output};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread::JoinHandle;

const DEFAULT_CONFIG: &str = "config.toml";

#[derive(Parser)]
#[command(name = "quire")]
#[command(about = "Incremental static site builder for markdown blogs")]
#[command(long_about = "\
Incremental static site builder for markdown blogs

Every markdown file becomes a page. Files with a Date: field are posts and
are listed on the index page, newest first. A manifest records what was
built from which bytes, so later runs only rebuild what changed.

Content structure:

  content/
  ├── site.md                      # Site title and description (optional)
  ├── hello-world.md               # Post (has Date:) → docs/hello-world/index.html
  └── about.md                     # Page (no Date:)  → docs/about/index.html

  docs/
  ├── index.html                   # Table of contents (posts only)
  ├── hello-world/index.html
  └── about/index.html

Document metadata goes at the top of the file, ended by a blank line:

  Title: Hello, world
  Date: 2024-03-01
  Description: First post

Run 'quire gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Config file [default: config.toml, if present]
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Manifest file (overrides config)
    #[arg(long, global = true)]
    manifest_path: Option<PathBuf>,

    /// Content directory (overrides config)
    #[arg(long, global = true)]
    source: Option<PathBuf>,

    /// Output directory (overrides config)
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// Rebuild every page even if its source is unchanged
    #[arg(long, global = true)]
    rebuild: bool,

    /// Also list unchanged pages and scan counts
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Clone, Copy)]
enum Command {
    /// Bring the output directory up to date (default)
    Build,
    /// Show what a build would do without writing anything
    Check,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Build) {
        Command::Build => {
            let config = resolve_config(&cli)?;
            let (tx, printer) = spawn_printer(cli.verbose);
            let result = engine::build(&config, cli.rebuild, Some(tx));
            join_printer(printer)?;
            println!("{}", result?);
        }
        Command::Check => {
            let config = resolve_config(&cli)?;
            let (tx, printer) = spawn_printer(cli.verbose);
            let result = engine::check(&config, Some(tx));
            join_printer(printer)?;
            output::print_plan(&result?);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Print build events on a separate thread as they arrive.
fn spawn_printer(verbose: bool) -> (mpsc::Sender<BuildEvent>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            output::print_event(&event, verbose);
        }
    });
    (tx, printer)
}

/// Load the config file (if any) and apply command-line overrides.
fn resolve_config(cli: &Cli) -> Result<config::BuildConfig, Box<dyn std::error::Error>> {
    let path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    if cli.config.is_some() && !path.exists() {
        return Err(format!("config file not found: {}", path.display()).into());
    }

    let mut config = config::load_config(&path)?;
    override_path(&mut config.content_root, cli.source.as_deref());
    override_path(&mut config.output_root, cli.output.as_deref());
    override_path(&mut config.manifest_path, cli.manifest_path.as_deref());
    config.validate()?;
    Ok(config)
}

fn override_path(slot: &mut PathBuf, value: Option<&Path>) {
    if let Some(value) = value {
        *slot = value.to_path_buf();
    }
}

fn join_printer(printer: JoinHandle<()>) -> Result<(), Box<dyn std::error::Error>> {
    printer
        .join()
        .map_err(|_| "output thread panicked".into())
}
