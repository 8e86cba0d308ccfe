/*!
docsql Command Line Interface

Pre-renders the runnable examples of a documentation page, or runs a single
query and prints its result table.
*/

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::rc::Rc;

use docsql::page::surface::CannedSpacing;
use docsql::reader::{DuckDBReader, Reader};
use docsql::{render_result_set, Controller, MemorySurface, Page, VERSION};

#[derive(Parser)]
#[command(name = "docsql")]
#[command(about = "Runnable SQL examples for documentation pages")]
#[command(version = VERSION)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load a page manifest, run every example and print the results
    Page {
        /// Path to the page manifest (JSON)
        manifest: PathBuf,

        /// Page URL, overriding the manifest (append ?fake-pg for canned mode)
        #[arg(long)]
        url: Option<String>,

        /// Data source connection string
        #[arg(long, default_value = "duckdb://memory")]
        reader: String,

        /// Reveal canned results without the two blank lines before them
        #[arg(long)]
        no_spacing: bool,
    },

    /// Execute a query and print its result table
    Exec {
        /// The SQL to execute
        query: String,

        /// Data source connection string
        #[arg(long, default_value = "duckdb://memory")]
        reader: String,
    },

    /// Execute a query from a file and print its result table
    Run {
        /// Path to .sql file
        file: PathBuf,

        /// Data source connection string
        #[arg(long, default_value = "duckdb://memory")]
        reader: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Page {
            manifest,
            url,
            reader,
            no_spacing,
        } => cmd_page(manifest, url, reader, no_spacing).await,

        Commands::Exec { query, reader } => cmd_exec(&query, &reader).await,

        Commands::Run { file, reader } => {
            let query = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read file {}", file.display()))?;
            cmd_exec(&query, &reader).await
        }
    }
}

async fn cmd_page(
    manifest: PathBuf,
    url: Option<String>,
    reader: String,
    no_spacing: bool,
) -> Result<()> {
    let mut page = Page::from_file(&manifest)?;
    if let Some(url) = url {
        page.url = url;
    }

    // The engine only exists when live blocks will run
    let engine: Option<Rc<dyn Reader>> = if page.mode().needs_engine() {
        Some(Rc::new(DuckDBReader::from_connection_string(&reader)?))
    } else {
        tracing::info!("Canned-only page, not opening {}", reader);
        None
    };

    let mut config = page.config;
    if no_spacing {
        config.canned_spacing = CannedSpacing::None;
    }

    let controller = Controller::new(engine, MemorySurface::from_page(&page), config);
    controller.load(&page);

    let mut failures = 0;
    for (id, outcome) in controller.run_all().await {
        if let Err(e) = outcome {
            tracing::error!("Block {} failed: {}", id, e);
            failures += 1;
        }
    }

    let ids: Vec<_> = controller.blocks().iter().map(|b| b.id).collect();
    let surface = controller.into_surface();
    for block in ids {
        if let Some(text) = surface.text(block) {
            println!("-- block {}", block);
            println!("{}", text);
        }
    }

    if failures > 0 {
        anyhow::bail!("{} example(s) failed", failures);
    }
    Ok(())
}

async fn cmd_exec(query: &str, reader: &str) -> Result<()> {
    let engine = DuckDBReader::from_connection_string(reader)?;
    let groups = engine
        .execute(query)
        .await
        .context("Failed to execute SQL query")?;

    for line in render_result_set(&groups) {
        println!("{}", line);
    }
    Ok(())
}
