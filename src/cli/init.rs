use std::{fs, path::Path};

use anyhow::Context;
use req_catalog::{Config, Workspace};
use tracing::instrument;

use super::terminal::Colorize;

#[derive(Debug, clap::Parser)]
pub struct Command {
    /// Prefix of every catalog id
    #[arg(long, default_value = "RQ")]
    prefix: String,

    /// Zero-padded width of the catalog id counter
    #[arg(long, default_value_t = 5)]
    digits: usize,

    /// Separator between prefix and counter
    #[arg(long, default_value = "-")]
    separator: String,
}

impl Command {
    #[instrument]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let workspace = Workspace::new(root.to_path_buf());
        if workspace.dir().exists() {
            anyhow::bail!(
                "Catalog already initialized (found existing {} directory)",
                Workspace::DIR
            );
        }

        let config = Config::new(self.prefix, self.digits, self.separator)?;

        fs::create_dir_all(workspace.dir())
            .with_context(|| format!("Failed to create {} directory", Workspace::DIR))?;
        config.save(&workspace.config_path())?;

        let documents = root.join(&config.documents.root);
        fs::create_dir_all(&documents)
            .with_context(|| format!("Failed to create {}", documents.display()))?;

        println!(
            "{}",
            format!("Initialized catalog in {}", root.display()).success()
        );
        println!("  Created: {}/config.toml", Workspace::DIR);
        println!("  Created: {}/", config.documents.root);
        println!();
        println!("Next steps:");
        println!("  reqcat headers set application \"Form Fields\" \"UI Behavior\"");
        println!("  reqcat create APP --name app --type application --title \"Application\"");

        Ok(())
    }
}
