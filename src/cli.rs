use std::path::{Path, PathBuf};

mod add;
mod create;
mod headers;
mod init;
mod list;
mod publish;
mod terminal;
mod validate;

use clap::ArgAction;
use req_catalog::{Config, Doorstop, Provisioner, Workspace};

#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// The path to the root of the catalog workspace
    #[arg(short, long, default_value = ".", global = true)]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        Self::setup_logging(self.verbose);

        self.command.run(&self.root)
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[derive(Debug, clap::Parser)]
enum Command {
    /// Initialize a new catalog workspace
    Init(init::Command),

    /// Create a document and seed its header items
    Create(create::Command),

    /// Provision an item in a document
    ///
    /// Use `--type header` to add a header item, or the name of one of the
    /// document's headers to add a normal item beneath it.
    Add(add::Command),

    /// Show or edit the header names configured per document type
    Headers(headers::Command),

    /// List the items catalogued for a document
    List(list::Command),

    /// Validate documents with the document engine
    Validate(validate::Command),

    /// Publish documents with the document engine
    Publish(publish::Command),
}

impl Command {
    fn run(self, root: &Path) -> anyhow::Result<()> {
        match self {
            Self::Init(command) => command.run(root),
            Self::Create(command) => command.run(root),
            Self::Add(command) => command.run(root),
            Self::Headers(command) => command.run(root),
            Self::List(command) => command.run(root),
            Self::Validate(command) => command.run(root),
            Self::Publish(command) => command.run(root),
        }
    }
}

/// Loads the workspace at `root`, failing if it has not been initialized.
fn load_workspace(root: &Path) -> anyhow::Result<(Workspace, Config)> {
    let workspace = Workspace::new(root.to_path_buf());
    if !workspace.is_initialized() {
        anyhow::bail!(
            "Catalog not initialized. Run 'reqcat init' first or pass --root to point at a \
             catalog workspace"
        );
    }
    let config = workspace.load_config()?;
    Ok((workspace, config))
}

/// Opens a provisioner backed by the configured document engine.
fn open_provisioner(root: &Path) -> anyhow::Result<Provisioner<Doorstop>> {
    let (workspace, config) = load_workspace(root)?;
    let engine = Doorstop::from_config(workspace.root(), &config);
    Ok(Provisioner::open(&workspace, config, engine)?)
}
