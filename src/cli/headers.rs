use std::path::Path;

use nonempty::NonEmpty;
use req_catalog::RegistryStore;
use tracing::instrument;

use super::terminal::Colorize;

#[derive(Debug, clap::Parser)]
pub struct Command {
    #[command(subcommand)]
    command: HeadersCommand,
}

#[derive(Debug, clap::Parser)]
enum HeadersCommand {
    /// List header names, for one document type or all of them
    List {
        /// The document type
        document_type: Option<String>,
    },

    /// Replace the header names of a document type
    ///
    /// Existing documents keep the headers they were created with.
    Set {
        /// The document type
        document_type: String,

        /// Header names, in level order
        #[arg(num_args = 1.., required = true)]
        names: Vec<String>,
    },
}

impl Command {
    #[instrument]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let (workspace, config) = super::load_workspace(root)?;
        let registry = RegistryStore::new(workspace.registry_path(), &config);

        match self.command {
            HeadersCommand::List {
                document_type: Some(document_type),
            } => {
                let names = registry.header_names(&document_type)?;
                print_headers(&document_type.to_lowercase(), names.iter());
            }
            HeadersCommand::List {
                document_type: None,
            } => {
                let headers = registry.load()?.headers;
                if headers.is_empty() {
                    println!("{}", "No document types have headers configured".dim());
                }
                for (document_type, names) in &headers {
                    print_headers(document_type, names.iter());
                }
            }
            HeadersCommand::Set {
                document_type,
                names,
            } => {
                let names = NonEmpty::from_vec(names)
                    .ok_or_else(|| anyhow::anyhow!("At least one header name is required"))?;
                let count = names.len();
                registry.set_header_names(&document_type, names)?;
                println!(
                    "{}",
                    format!(
                        "Set {count} header(s) for '{}'",
                        document_type.to_lowercase()
                    )
                    .success()
                );
            }
        }

        Ok(())
    }
}

fn print_headers<'a>(document_type: &str, names: impl Iterator<Item = &'a String>) {
    println!("{}", document_type.info());
    for (position, name) in names.enumerate() {
        println!("  {}. {name}", position + 1);
    }
}
