use anyhow::Result;
use clap::Parser;

use olap_etl::cli;
use olap_etl::config::Config;
use olap_etl::logging;

#[derive(Parser)]
#[command(name = "olap-etl")]
#[command(about = "Extract OLTP tables, reshape them into a star schema, load the warehouse")]
struct Cli {
    /// Config file path
    #[arg(short, long, env = "OLAP_ETL_CONFIG", default_value = "olap-etl.yaml")]
    config: String,

    /// Log level used when RUST_LOG is not set
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Write rejected rows to this JSON file
    #[arg(long, env = "ETL_REJECTS_PATH")]
    rejects: Option<String>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    logging::init(&args.log_level);

    // Load config, then let the environment override it
    let mut config = Config::load_with_env(&args.config)?;
    if let Some(path) = args.rejects {
        config.report.rejects_path = Some(path);
    }

    cli::run::run(&config)
}
