use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use anyhow::Result;
use rmcp::{ServiceExt, transport::stdio};
use clap::{Parser, Subcommand};
use context7_kb::config::{Config, DEFAULT_API_BASE_URL, DEFAULT_KNOWLEDGE_BASE_DIR, ProxyConfig};
use context7_kb::server::KnowledgeTools;
use context7_kb::service::{DEFAULT_MAX_CHARS, DocsService, FetchRequest};
use context7_kb::sync::RepositoryReport;

#[cfg(feature = "trace")]
use tracing_subscriber::{EnvFilter};

/// Search Context7 documentation and keep a local knowledge base.
/// Without a command, runs as an MCP server over stdio.
#[derive(Parser)]
#[clap(name = "context7-kb", version)]
struct Cli {
    /// Context7 API base URL
    #[clap(long, env = "CONTEXT7_API_URL", default_value = DEFAULT_API_BASE_URL)]
    api_url: String,
    /// Knowledge base directory holding documentation, repositories and INDEX.md
    #[clap(long, env = "CONTEXT7_KB_DIR", default_value = DEFAULT_KNOWLEDGE_BASE_DIR)]
    kb_dir: PathBuf,
    /// Proxy for plain HTTP traffic (API and git)
    #[clap(long, env = "HTTP_PROXY")]
    http_proxy: Option<String>,
    /// Proxy for HTTPS traffic (API and git)
    #[clap(long, env = "HTTPS_PROXY")]
    https_proxy: Option<String>,
    /// Time limit for each git clone or pull, in seconds
    #[clap(long, default_value_t = 300)]
    git_timeout_secs: u64,
    /// Client IP forwarded to the API in request headers
    #[clap(long, global = true)]
    client_ip: Option<String>,
    /// Write logs to this file instead of stderr
    #[clap(long)]
    log_file: Option<PathBuf>,
    #[clap(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Search for libraries
    Search {
        /// The search query
        query: String,
    },
    /// Fetch and save library documentation
    Fetch {
        /// The ID of the library (e.g. /gradio-app/gradio)
        library_id: String,
        /// Topic to focus on
        #[clap(long)]
        topic: Option<String>,
        /// Maximum number of tokens
        #[clap(long)]
        tokens: Option<u32>,
        /// Clone or update the GitHub repository referenced by the documentation
        #[clap(long)]
        sync_repo: bool,
        /// Search query that led to this library, recorded in INDEX.md
        #[clap(long)]
        search_query: Option<String>,
    },
    /// List downloaded libraries
    List,
    /// Print a downloaded documentation file
    Show {
        /// File name as printed by `list`
        filename: String,
        /// Maximum number of characters to print
        #[clap(long, default_value_t = DEFAULT_MAX_CHARS)]
        max_chars: usize,
    },
    /// Run the MCP server over stdio
    Serve,
}

impl Cli {
    fn config(&self) -> Config {
        Config {
            api_base_url: self.api_url.clone(),
            knowledge_base_dir: self.kb_dir.clone(),
            proxy: ProxyConfig {
                http: self.http_proxy.clone(),
                https: self.https_proxy.clone(),
            },
            git_timeout: Duration::from_secs(self.git_timeout_secs),
        }
    }
}

/// You can inspect the server using the Model Context Protocol Inspector.
/// npx @modelcontextprotocol/inspector cargo run -p context7-kb

#[tokio::main]
async fn main() -> Result<()> {
    // Get command line arguments
    let args = Cli::parse();

    // stdout carries the MCP transport, so logs go to stderr or a file
    #[cfg(feature = "trace")]
    {
        let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());
        match &args.log_file {
            Some(path) => tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::fs::File::create(path)?)
                .with_ansi(false)
                .init(),
            None => tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init(),
        }
    }

    let config = args.config();
    config.trace_loaded();
    let service = Arc::new(DocsService::from_config(&config)?);
    let client_ip = args.client_ip.clone();

    match args.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            tracing::info!("Starting MCP server");
            let server = KnowledgeTools::new(service)
                .serve(stdio()).await.inspect_err(|e| {
                    tracing::error!("serving error: {:?}", e);
                })?;
            server.waiting().await?;
        }
        Commands::Search { query } => {
            match service.search(&query, client_ip.as_deref()).await {
                Ok(report) => println!("{}", report.formatted_text),
                Err(e) => fail(&e),
            }
        }
        Commands::Fetch { library_id, topic, tokens, sync_repo, search_query } => {
            let request = FetchRequest {
                topic,
                tokens,
                client_ip,
                sync_repo,
                search_query,
                ..FetchRequest::new(library_id)
            };
            match service.fetch(&request).await {
                Ok(report) => {
                    println!("Documentation saved successfully:");
                    if let Some(path) = &report.saved_to {
                        println!("  - File: {}", path.display());
                    }
                    match &report.repository {
                        None | Some(RepositoryReport::NotRequested) => {}
                        Some(repository) => println!("  - {}", repository.describe()),
                    }
                }
                Err(e) => fail(&e),
            }
        }
        Commands::List => {
            match service.list_libraries().await {
                Ok(libraries) if libraries.is_empty() => println!("No downloaded libraries found"),
                Ok(libraries) => {
                    for library in libraries {
                        let repo = if library.document.has_repository { " [repository]" } else { "" };
                        println!(
                            "{}  {}  {} bytes  {}{}",
                            library.library_id,
                            library.document.filename,
                            library.document.size,
                            library.document.modified,
                            repo
                        );
                    }
                }
                Err(e) => fail(&e),
            }
        }
        Commands::Show { filename, max_chars } => {
            match service.read_library(&filename, max_chars).await {
                Ok(content) => println!("{}", content.content),
                Err(e) => fail(&e),
            }
        }
    }

    Ok(())
}

fn fail(error: &anyhow::Error) -> ! {
    tracing::error!("{:#}", error);
    eprintln!("Error: {:#}", error);
    std::process::exit(1);
}
