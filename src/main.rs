use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use multiref::commands::{call_hierarchy_at, find_references_at};
use multiref::config::load_config;
use multiref::error::PanelError;
use multiref::logging::init_logging;
use multiref::model::Position;
use multiref::presenter::Panel;
use multiref::render::{render_call_tree, render_references};
use multiref::session::run_panel;
use multiref::workspace_host::{WorkspaceHost, WorkspaceItem};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;
use url::Url;

#[derive(Debug, Parser)]
#[command(name = "multiref")]
#[command(version)]
#[command(about = "Find references and incoming calls, served as interactive panels over stdio")]
struct Cli {
    /// Workspace root (defaults to the current directory)
    #[arg(long, global = true, value_name = "DIR")]
    root: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG is set
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Open a reference panel for the symbol at FILE:LINE:COLUMN
    Refs {
        #[command(flatten)]
        at: CursorArgs,

        /// Print the grouped references as text instead of serving a panel
        #[arg(long)]
        print: bool,
    },
    /// Open an incoming call hierarchy for the function at FILE:LINE:COLUMN
    Calls {
        #[command(flatten)]
        at: CursorArgs,

        /// Print the call tree as text instead of serving a panel
        #[arg(long)]
        print: bool,

        /// Levels of callers to expand with --print
        #[arg(long, default_value_t = 1, requires = "print")]
        depth: usize,
    },
}

#[derive(Debug, Args)]
struct CursorArgs {
    /// Source file, absolute or relative to the workspace root
    file: PathBuf,
    /// 1-based line
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    line: u32,
    /// 1-based column, in bytes
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    column: u32,
}

impl CursorArgs {
    fn resolve(&self, host: &WorkspaceHost) -> Result<(Url, Position)> {
        let uri = host.uri_for_path(&self.file)?;
        Ok((uri, Position::new(self.line - 1, self.column - 1)))
    }
}

async fn serve<P>(host: Arc<WorkspaceHost>, panel: P) -> Result<()>
where
    P: Panel<Item = WorkspaceItem>,
{
    let reader = BufReader::new(tokio::io::stdin());
    let writer = tokio::io::stdout();
    run_panel(host, panel, reader, writer).await
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start tokio runtime")?;
    let result = rt.block_on(run(cli));
    // A pending stdin read would otherwise keep shutdown waiting on the surface.
    rt.shutdown_background();
    result
}

async fn run(cli: Cli) -> Result<()> {
    let root = match cli.root {
        Some(r) => r,
        None => std::env::current_dir().context("Failed to get current dir")?,
    };
    let config = load_config(&root);
    let host = Arc::new(WorkspaceHost::new(&root, config)?);

    match cli.cmd {
        Command::Refs { at, print } => {
            let (uri, position) = at.resolve(&host)?;
            let panel = match find_references_at(host.as_ref(), &uri, position) {
                Ok(panel) => panel,
                Err(PanelError::NoResult(msg)) => {
                    eprintln!("{msg}");
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            };
            if print {
                print!("{}", render_references(panel.title(), panel.groups()));
                return Ok(());
            }
            serve(host, panel).await
        }
        Command::Calls { at, print, depth } => {
            let (uri, position) = at.resolve(&host)?;
            let panel = match call_hierarchy_at(Arc::clone(&host), &uri, position) {
                Ok(panel) => panel,
                Err(PanelError::NoResult(msg)) => {
                    eprintln!("{msg}");
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            };
            if print {
                let (mut controller, root) = panel.into_parts();
                print!("{}", render_call_tree(&mut controller, &root, depth));
                return Ok(());
            }
            serve(host, panel).await
        }
    }
}
