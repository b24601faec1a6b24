use std::path::Path;

use req_catalog::{DocumentEngine, Doorstop};
use tracing::instrument;

use super::terminal::Colorize;

#[derive(Debug, clap::Parser)]
pub struct Command {
    /// The document to validate (default: all documents)
    document: Option<String>,
}

impl Command {
    #[instrument]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let (workspace, config) = super::load_workspace(root)?;
        let engine = Doorstop::from_config(workspace.root(), &config);

        let report = engine.validate(self.document.as_deref())?;
        if !report.output.trim().is_empty() {
            println!("{}", report.output.trim_end());
        }

        if !report.passed {
            anyhow::bail!("Validation failed");
        }
        println!("{}", "Validation passed".success());
        Ok(())
    }
}
