use anyhow::Context;
use clap::{Parser, ValueEnum};
use graphwave::config::{CliConfig, EngineConfig};
use graphwave::graph_store::GraphRegistry;
use graphwave::session::Session;

#[cfg(feature = "jemalloc")]
#[global_allocator]
static ALLOC: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Copy, Clone, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// graphwave - a property-graph query engine
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Name of the graph to open (created empty if it doesn't exist yet)
    #[arg(long, default_value = "default")]
    graph: String,

    /// Print the plan's shape instead of running it
    #[arg(long)]
    explain: bool,

    /// Rows pulled from the root operator per batch
    #[arg(long, default_value_t = EngineConfig::default().batch_size)]
    batch_size: u32,

    /// Hard cap on rows a single query may return
    #[arg(long, default_value_t = EngineConfig::default().result_set_cap)]
    result_set_cap: u64,

    /// Default query timeout in milliseconds
    #[arg(long, default_value_t = EngineConfig::default().default_query_timeout_ms)]
    query_timeout_ms: u64,

    /// Worker-pool size for the matrix library
    #[arg(long, default_value_t = EngineConfig::default().worker_pool_size)]
    worker_pool_size: u32,

    /// Output format for query results
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Cypher query text. Reads from stdin if omitted.
    query: Option<String>,
}

impl From<Cli> for CliConfig {
    fn from(cli: Cli) -> Self {
        CliConfig {
            batch_size: cli.batch_size,
            result_set_cap: cli.result_set_cap,
            query_timeout_ms: cli.query_timeout_ms,
            worker_pool_size: cli.worker_pool_size,
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let graph_name = cli.graph.clone();
    let explain = cli.explain;
    let format = cli.format;
    let query = match &cli.query {
        Some(q) => q.clone(),
        None => {
            let mut buf = String::new();
            std::io::Read::read_to_string(&mut std::io::stdin(), &mut buf)
                .context("failed to read query from stdin")?;
            buf
        }
    };

    let mut config = EngineConfig::from_env().context("invalid engine configuration")?;
    config.merge(EngineConfig::from_cli(cli.into()));
    log::debug!("engine config: {config:?}");

    let registry = GraphRegistry::new();
    let graph = registry.get_or_create(&graph_name);
    let session = Session::new(graph);

    if explain {
        let plan = session.build_plan(&query).context("failed to build query plan")?;
        println!("{}", session.explain(&plan));
        return Ok(());
    }

    let result = session.run(&query).context("query execution failed")?;
    log::debug!("stats: {:?}", result.stats);
    match format {
        OutputFormat::Text => {
            println!("{}", result.columns.join("\t"));
            for row in &result.rows {
                let line: Vec<String> = row.iter().map(|v| v.to_string()).collect();
                println!("{}", line.join("\t"));
            }
        }
        OutputFormat::Json => {
            let rows: Vec<serde_json::Value> = result
                .rows
                .iter()
                .map(|row| {
                    serde_json::Value::Object(
                        result.columns.iter().cloned().zip(row.iter().map(|v| v.to_json())).collect(),
                    )
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
    }
    Ok(())
}
