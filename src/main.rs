/*!
 * campus-media CLI
 *
 * Inspect the media databases behind the school website and ask the router
 * where an upload of a given size would be placed.
 */

use std::path::PathBuf;

use campus_media::{
    cli_style::{self, format_bytes, parse_size},
    config::{CatalogConfig, LogLevel, RouterConfig},
    error::{Result, RouterError, EXIT_SUCCESS},
    logging,
};
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "campus-media")]
#[command(version, about = "Capacity-aware router for school website media databases", long_about = None)]
struct Cli {
    /// Config file (default: $CAMPUS_MEDIA_CONFIG, ./campus-media.toml, user config dir)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, value_enum, global = true)]
    log_level: Option<LogLevelArg>,

    /// Write JSON logs to this file instead of stderr
    #[arg(long = "log", value_name = "FILE", global = true)]
    log: Option<PathBuf>,

    /// Verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured media databases and whether they can be reached
    Stores,

    /// Probe every media database and show its capacity
    Status,

    /// Show which media database would receive a file of SIZE
    Select {
        /// File size: bytes or with a unit (50MB, 1.5GiB)
        #[arg(value_parser = parse_size_arg)]
        size: u64,
    },

    /// Parse and validate the config file without connecting
    CheckConfig,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevelArg> for LogLevel {
    fn from(arg: LogLevelArg) -> Self {
        match arg {
            LogLevelArg::Error => LogLevel::Error,
            LogLevelArg::Warn => LogLevel::Warn,
            LogLevelArg::Info => LogLevel::Info,
            LogLevelArg::Debug => LogLevel::Debug,
            LogLevelArg::Trace => LogLevel::Trace,
        }
    }
}

fn parse_size_arg(value: &str) -> std::result::Result<u64, String> {
    parse_size(value)
}

fn main() {
    let code = match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            cli_style::print_error(&e.to_string(), e.hint());
            e.exit_code()
        }
    };
    std::process::exit(code);
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let (mut config, config_path) = load_config(cli.config.as_ref())?;
    if let Some(level) = cli.log_level {
        config.log_level = level.into();
    }
    if cli.log.is_some() {
        config.log_file = cli.log.clone();
    }
    config.verbose |= cli.verbose;

    if let Err(e) = logging::init_logging(&config) {
        cli_style::print_warning(&format!("Failed to initialize logging: {}", e));
    }

    match cli.command {
        Commands::CheckConfig => check_config(&config, config_path.as_ref(), cli.json),
        command => run_with_router(command, &config, cli.json),
    }
}

fn load_config(explicit: Option<&PathBuf>) -> Result<(RouterConfig, Option<PathBuf>)> {
    let path = explicit.cloned().or_else(RouterConfig::default_path);
    match path {
        Some(path) => Ok((RouterConfig::from_file(&path)?, Some(path))),
        None => Ok((RouterConfig::default(), None)),
    }
}

fn check_config(config: &RouterConfig, path: Option<&PathBuf>, json: bool) -> Result<()> {
    config.validate()?;

    let catalog = match &config.catalog {
        CatalogConfig::Static => format!("static ({} store(s))", config.stores.len()),
        CatalogConfig::Mongo { collection, .. } => format!("mongo collection '{}'", collection),
    };

    if json {
        let summary = serde_json::json!({
            "valid": true,
            "path": path.map(|p| p.display().to_string()),
            "catalog": catalog,
            "stores": config.stores.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            "capacity_limit_bytes": config.capacity_limit_bytes,
            "overhead_margin": config.overhead_margin,
        });
        println!("{}", summary);
        return Ok(());
    }

    match path {
        Some(path) => cli_style::print_success(&format!("{} is valid", path.display())),
        None => cli_style::print_info("No config file found, using defaults"),
    }
    cli_style::section_header("Placement");
    println!("  Catalog:         {}", catalog);
    println!(
        "  Capacity limit:  {}",
        format_bytes(config.capacity_limit_bytes)
    );
    println!("  Overhead margin: {}", config.overhead_margin);
    println!("  Fallback probe:  {}", config.fallback_collection);
    Ok(())
}

#[cfg(not(feature = "mongodb-native"))]
fn run_with_router(_command: Commands, _config: &RouterConfig, _json: bool) -> Result<()> {
    Err(RouterError::Other(
        "campus-media was built without the mongodb-native feature".to_string(),
    ))
}

#[cfg(feature = "mongodb-native")]
fn run_with_router(command: Commands, config: &RouterConfig, json: bool) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| RouterError::Other(format!("Failed to start async runtime: {}", e)))?;

    runtime.block_on(async {
        let router = campus_media::bootstrap::build_router(config).await?;
        let report = router.load().await?;
        for (name, reason) in &report.failed {
            if !json {
                cli_style::print_warning(&format!("{} unreachable: {}", name, reason));
            }
        }

        let result = match command {
            Commands::Stores => show_stores(&router, &report, json).await,
            Commands::Status => show_status(&router, json).await,
            Commands::Select { size } => show_selection(&router, size, json).await,
            Commands::CheckConfig => Ok(()),
        };

        router.registry().shutdown().await;
        result
    })
}

#[cfg(feature = "mongodb-native")]
async fn show_stores(
    router: &campus_media::bootstrap::MongoRouter,
    report: &campus_media::LoadReport,
    json: bool,
) -> Result<()> {
    let configured = router.registry().configured().await?;
    let mut rows = Vec::with_capacity(configured.len());
    for store in &configured {
        let connected = router.registry().get(&store.name).await.is_some();
        rows.push((store.name.clone(), store.redacted_uri(), connected));
    }

    if json {
        let stores: Vec<_> = rows
            .iter()
            .map(|(name, endpoint, connected)| {
                serde_json::json!({ "name": name, "endpoint": endpoint, "connected": connected })
            })
            .collect();
        println!(
            "{}",
            serde_json::json!({ "stores": stores, "load": report })
        );
        return Ok(());
    }

    if rows.is_empty() {
        cli_style::print_info(&format!(
            "No media databases configured in {}",
            router.registry().catalog_description()
        ));
        return Ok(());
    }

    println!("{}", cli_style::stores_table(&rows));
    Ok(())
}

#[cfg(feature = "mongodb-native")]
async fn show_status(router: &campus_media::bootstrap::MongoRouter, json: bool) -> Result<()> {
    let statuses = router.capacity_report().await;

    if json {
        let out = serde_json::to_string(&statuses)
            .map_err(|e| RouterError::Other(format!("Failed to encode status: {}", e)))?;
        println!("{}", out);
        return Ok(());
    }

    if statuses.is_empty() {
        cli_style::print_info("No media databases registered");
        return Ok(());
    }

    let limit = router.policy().capacity_limit_bytes;
    println!("{}", cli_style::capacity_table(&statuses, limit));

    let total_free: u64 = statuses.iter().filter_map(|s| s.free_bytes).sum();
    let available = statuses.iter().filter(|s| s.is_available()).count();
    println!(
        "  {} of {} store(s) answered, {} free in total",
        available,
        statuses.len(),
        format_bytes(total_free)
    );
    Ok(())
}

#[cfg(feature = "mongodb-native")]
async fn show_selection(
    router: &campus_media::bootstrap::MongoRouter,
    size: u64,
    json: bool,
) -> Result<()> {
    let placement = router.select(size).await?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "store": placement.name(),
                "file_size": size,
                "free_bytes": placement.free_bytes(),
                "snapshot": placement.snapshot(),
            })
        );
        return Ok(());
    }

    cli_style::print_success(&format!(
        "{} {} {} ({} free)",
        format_bytes(size),
        cli_style::Icons::ARROW_RIGHT,
        placement.name(),
        format_bytes(placement.free_bytes())
    ));
    Ok(())
}
