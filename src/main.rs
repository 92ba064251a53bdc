//! Jixer CLI - host search across Shodan, Netlas, ZoomEye and FOFA.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use jixer::{
    engines::{Fofa, Netlas, Shodan, Zoomeye},
    Engine, EngineKind, Fetcher, IdentityRecord, RetryPolicy, Search, TransportConfig,
    DEFAULT_MAX_PAGES,
};

/// Jixer - collect hosts from internet search engines
#[derive(Parser)]
#[command(name = "jixer")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print how many hosts each engine reports for a query
    Count(CountArgs),

    /// Fetch every page of a query and print the hosts
    Search(SearchArgs),

    /// List available engines
    Engines,
}

#[derive(Args)]
struct Credentials {
    /// Shodan API key
    #[arg(long, env = "SHODAN_API_KEY", hide_env_values = true)]
    shodan_key: Option<String>,

    /// Netlas API key
    #[arg(long, env = "NETLAS_API_KEY", hide_env_values = true)]
    netlas_key: Option<String>,

    /// ZoomEye API key
    #[arg(long, env = "ZOOMEYE_API_KEY", hide_env_values = true)]
    zoomeye_key: Option<String>,

    /// FOFA API key
    #[arg(long, env = "FOFA_API_KEY", hide_env_values = true)]
    fofa_key: Option<String>,

    /// FOFA account email
    #[arg(long, env = "FOFA_EMAIL")]
    fofa_email: Option<String>,
}

#[derive(Args)]
struct EngineArgs {
    /// Engines to query (comma-separated): shodan, netlas, zoomeye, fofa
    #[arg(short, long, value_delimiter = ',', default_value = "shodan")]
    engines: Vec<EngineKind>,

    /// Request timeout in seconds
    #[arg(short, long, default_value = "30")]
    timeout: u64,

    /// Retries for 500/502/503/504 responses
    #[arg(long, default_value = "5")]
    retries: u32,

    #[command(flatten)]
    credentials: Credentials,
}

#[derive(Parser)]
struct CountArgs {
    /// Search query, in the engine's own syntax
    query: String,

    #[command(flatten)]
    engine: EngineArgs,
}

#[derive(Parser)]
struct SearchArgs {
    /// Search query, in the engine's own syntax
    query: String,

    #[command(flatten)]
    engine: EngineArgs,

    /// Maximum pages fetched per engine
    #[arg(short, long, default_value_t = DEFAULT_MAX_PAGES)]
    max_pages: u64,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Hosts grouped by engine
    Text,
    /// JSON object keyed by engine
    Json,
    /// Unique IPs across all engines, one per line
    Compact,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over -v
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Count(args) => run_count(args).await,
        Commands::Search(args) => run_search(args).await,
        Commands::Engines => list_engines(),
    }
}

fn list_engines() -> Result<()> {
    println!("Available engines:\n");
    println!("  shodan   - Shodan (SHODAN_API_KEY)");
    println!("  netlas   - Netlas (NETLAS_API_KEY)");
    println!("  zoomeye  - ZoomEye (ZOOMEYE_API_KEY)");
    println!("  fofa     - FOFA (FOFA_API_KEY, FOFA_EMAIL)");
    println!();
    println!("Usage: jixer search \"port:22\" -e shodan,netlas");
    Ok(())
}

async fn run_count(args: CountArgs) -> Result<()> {
    let search = build_search(&args.engine, DEFAULT_MAX_PAGES)?;
    for (engine, total) in search.count(&args.query).await? {
        println!("{}\t{}", engine, total);
    }
    Ok(())
}

async fn run_search(args: SearchArgs) -> Result<()> {
    let search = build_search(&args.engine, args.max_pages)?;
    let results = search.search(&args.query).await?;

    match args.format {
        OutputFormat::Text => {
            for (engine, hosts) in results.iter() {
                println!("{} ({} hosts):", engine, hosts.len());
                for host in sorted(hosts) {
                    println!("  {}", host);
                }
                println!();
            }
            eprintln!(
                "{} unique hosts in {}ms",
                results.union().len(),
                results.duration_ms
            );
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        OutputFormat::Compact => {
            let ips: BTreeSet<String> = results.union().into_iter().filter_map(|r| r.ip).collect();
            for ip in ips {
                println!("{}", ip);
            }
        }
    }

    Ok(())
}

fn sorted<'a>(hosts: impl IntoIterator<Item = &'a IdentityRecord>) -> Vec<&'a IdentityRecord> {
    let mut hosts: Vec<_> = hosts.into_iter().collect();
    hosts.sort();
    hosts
}

fn build_search(args: &EngineArgs, max_pages: u64) -> Result<Search> {
    let transport = TransportConfig {
        timeout_secs: args.timeout,
        retry: RetryPolicy::default().with_max_retries(args.retries),
        ..Default::default()
    };

    let mut search = Search::new();
    let mut seen = BTreeSet::new();
    for &kind in &args.engines {
        if !seen.insert(kind.as_str()) {
            continue;
        }
        let engine = build_engine(kind, &args.credentials, max_pages)?;
        let fetcher = Fetcher::from_arc(engine)?.with_transport(transport.clone());
        search.add_fetcher(fetcher);
    }
    Ok(search)
}

fn build_engine(kind: EngineKind, creds: &Credentials, max_pages: u64) -> Result<Arc<dyn Engine>> {
    let missing = |var: &str| format!("{} requires {} (or the matching flag)", kind, var);
    let engine: Arc<dyn Engine> = match kind {
        EngineKind::Shodan => {
            let key = creds.shodan_key.clone().with_context(|| missing("SHODAN_API_KEY"))?;
            Arc::new(Shodan::new(key).with_max_pages(max_pages))
        }
        EngineKind::Netlas => {
            let key = creds.netlas_key.clone().with_context(|| missing("NETLAS_API_KEY"))?;
            Arc::new(Netlas::new(key).with_max_pages(max_pages))
        }
        EngineKind::Zoomeye => {
            let key = creds.zoomeye_key.clone().with_context(|| missing("ZOOMEYE_API_KEY"))?;
            Arc::new(Zoomeye::new(key).with_max_pages(max_pages))
        }
        EngineKind::Fofa => {
            let key = creds.fofa_key.clone().with_context(|| missing("FOFA_API_KEY"))?;
            let email = creds.fofa_email.clone().with_context(|| missing("FOFA_EMAIL"))?;
            Arc::new(Fofa::new(key, email).with_max_pages(max_pages))
        }
    };
    Ok(engine)
}
