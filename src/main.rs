use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use library_mcp::application::cache::{BookCache, CacheConfig};
use library_mcp::domain::store::BookStore;
use library_mcp::infra::http_store::HttpBookStore;
use library_mcp::infra::mock_store::{Latency, MockBookStore};

#[derive(Parser, Debug)]
#[command(name = "library-mcp")]
#[command(about = "Book library catalogue served over MCP (stdio)")]
struct Args {
    /// REST API base URL. Without it an in-memory store with sample books is used.
    #[arg(long)]
    api_url: Option<String>,

    /// Uniform latency for the in-memory store, in milliseconds
    #[arg(long)]
    latency_ms: Option<u64>,

    /// Window in which repeated fetches collapse into one store call
    #[arg(long, default_value = "60")]
    dedup_secs: u64,

    /// Revalidate when the client regains focus
    #[arg(long)]
    revalidate_on_focus: bool,

    /// Do not revalidate when connectivity is regained
    #[arg(long)]
    no_revalidate_on_reconnect: bool,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    // stdoutはMCPのトランスポート
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let store: Box<dyn BookStore> = match &args.api_url {
        Some(url) => {
            info!("using REST store at {}", url);
            Box::new(HttpBookStore::new(url.as_str()))
        }
        None => {
            let latency = args
                .latency_ms
                .map(|ms| Latency::uniform(Duration::from_millis(ms)))
                .unwrap_or_else(Latency::reference);
            info!("using in-memory store ({:?})", latency);
            Box::new(MockBookStore::seeded().with_latency(latency))
        }
    };

    let config = CacheConfig {
        dedup_interval: Duration::from_secs(args.dedup_secs),
        revalidate_on_focus: args.revalidate_on_focus,
        revalidate_on_reconnect: !args.no_revalidate_on_reconnect,
    };

    library_mcp::interface::mcp::run(Arc::new(BookCache::new(store, config))).await
}
