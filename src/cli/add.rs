use std::path::{Path, PathBuf};

use req_catalog::{ItemDefaults, ItemRequest};
use tracing::instrument;

use super::terminal::Colorize;

#[derive(Debug, clap::Parser)]
pub struct Command {
    /// The document to add the item to
    document: String,

    /// YAML file of item attribute defaults
    #[arg(long, value_name = "PATH")]
    item_defaults: PathBuf,

    /// Item title (the header name, for header items)
    #[arg(long)]
    title: String,

    /// `header`, or the name of the header to file the item under
    #[arg(long = "type", value_name = "TYPE")]
    type_label: String,

    /// Uid of an item to link to (can be specified multiple times)
    #[arg(long = "link", value_name = "UID")]
    links: Vec<String>,

    /// Show the level and catalog id that would be assigned, without
    /// creating anything
    #[arg(long)]
    dry_run: bool,
}

impl Command {
    #[instrument]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let defaults = ItemDefaults::load(&self.item_defaults)?;
        let request = ItemRequest::new(self.document, self.title, self.type_label)
            .with_defaults(defaults)
            .with_links(self.links);

        let mut provisioner = super::open_provisioner(root)?;

        if self.dry_run {
            let preview = provisioner.preview(&request)?;
            println!(
                "{}",
                format!(
                    "Would add '{}' to {} at level {} as {}",
                    request.title, request.document_uid, preview.level, preview.catalog_id
                )
                .info()
            );
            return Ok(());
        }

        let item = provisioner.provision(request)?;
        println!(
            "{}",
            format!(
                "Added {} ({}) at level {}",
                item.uid,
                item.catalog_id(),
                item.level()
            )
            .success()
        );
        if !item.attributes.links.is_empty() {
            println!(
                "{}",
                format!("  Links: {}", item.attributes.links.join(", ")).dim()
            );
        }

        Ok(())
    }
}
