use std::path::{Path, PathBuf};

use req_catalog::{DocumentEngine, Doorstop, engine::PublishTarget};
use tracing::instrument;

use super::terminal::Colorize;

#[derive(Debug, clap::Parser)]
pub struct Command {
    /// The document to publish, or `all`
    target: PublishTarget,

    /// Output directory
    destination: PathBuf,
}

impl Command {
    #[instrument]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let (workspace, config) = super::load_workspace(root)?;
        let engine = Doorstop::from_config(workspace.root(), &config);

        engine.publish(&self.target, &self.destination)?;

        println!(
            "{}",
            format!(
                "Published {} to {}",
                self.target,
                self.destination.display()
            )
            .success()
        );
        Ok(())
    }
}
