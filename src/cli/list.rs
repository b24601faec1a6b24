use std::path::Path;

use req_catalog::CatalogIndex;
use tracing::instrument;

use super::terminal::Colorize;

#[derive(Debug, clap::Parser)]
pub struct Command {
    /// The document to list
    document: String,

    /// Print the ledger as JSON
    #[arg(long)]
    json: bool,
}

impl Command {
    #[instrument]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let (workspace, _) = super::load_workspace(root)?;
        let index = CatalogIndex::load(workspace.index_path())?;
        let ledger = index
            .ledger(&self.document)
            .ok_or_else(|| anyhow::anyhow!("Document '{}' is not in the catalog", self.document))?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(ledger.entries())?);
            return Ok(());
        }

        let document = ledger.document();
        println!(
            "{} {}",
            document.uid.info(),
            format!("{} ({})", document.title, document.document_type).dim()
        );
        if ledger.entries().is_empty() {
            println!("{}", "  No items".dim());
        }

        let mut entries: Vec<_> = ledger.entries().iter().collect();
        entries.sort_by_key(|entry| (entry.level.header(), entry.level.sequence()));
        for entry in entries {
            let indent = if entry.is_header { "  " } else { "    " };
            println!(
                "{indent}{:<6} {} {}",
                entry.level.to_string(),
                entry.title,
                format!("[{} {}]", entry.uid, entry.catalog_id).dim()
            );
        }

        Ok(())
    }
}
