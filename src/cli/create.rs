use std::path::{Path, PathBuf};

use req_catalog::{DocumentRequest, ItemDefaults};
use tracing::instrument;

use super::terminal::Colorize;

#[derive(Debug, clap::Parser)]
pub struct Command {
    /// The document uid (e.g. APP-QL-CNI)
    uid: String,

    /// Directory name for the document
    #[arg(long)]
    name: String,

    /// Document type; selects the headers to seed
    #[arg(long = "type", value_name = "TYPE")]
    document_type: String,

    /// Document title
    #[arg(long)]
    title: String,

    /// YAML file of defaults applied to each header item
    #[arg(long, value_name = "PATH")]
    header_defaults: Option<PathBuf>,
}

impl Command {
    #[instrument]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let header_defaults = self
            .header_defaults
            .as_deref()
            .map(ItemDefaults::load)
            .transpose()?
            .unwrap_or_default();

        let mut provisioner = super::open_provisioner(root)?;
        let created = provisioner.create_document(
            DocumentRequest::new(self.uid, self.name, self.document_type, self.title)
                .with_header_defaults(header_defaults),
        )?;

        println!(
            "{}",
            format!(
                "Created document {} ({})",
                created.document.uid, created.document.title
            )
            .success()
        );
        for item in &created.headers {
            println!(
                "  {:<6} {} {}",
                item.level().to_string(),
                item.attributes.title,
                format!("[{} {}]", item.uid, item.catalog_id()).dim()
            );
        }

        Ok(())
    }
}
