use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use argh::FromArgs;
use tracing::{debug, info};

use weather_agent::cache::{self, PersistentCache};
use weather_agent::report::{self, WeatherService};
use weather_agent::{AppConfig, VERSION, telemetry, web};

/// Weather advice for Dutch cities, backed by live Buienradar data
#[derive(FromArgs)]
struct Args {
    /// path to a TOML config file (default: <config dir>/weather-agent/config.toml)
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,

    /// enable debug logging
    #[argh(switch, short = 'v')]
    verbose: bool,

    /// print the version and exit
    #[argh(switch)]
    version: bool,

    #[argh(subcommand)]
    command: Option<Command>,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Command {
    Weather(WeatherArgs),
    Compare(CompareArgs),
    Summary(SummaryArgs),
    Serve(ServeArgs),
    Cache(CacheArgs),
    Config(ConfigArgs),
}

/// Current weather and advice for one city (default: configured city)
#[derive(FromArgs)]
#[argh(subcommand, name = "weather")]
struct WeatherArgs {
    /// city name, Dutch postcode or "lat,lon"
    #[argh(positional)]
    city: Option<String>,

    /// print the report as JSON
    #[argh(switch)]
    json: bool,
}

/// Compare the weather in up to 10 cities
#[derive(FromArgs)]
#[argh(subcommand, name = "compare")]
struct CompareArgs {
    /// city names
    #[argh(positional)]
    cities: Vec<String>,

    /// print the comparison as JSON
    #[argh(switch)]
    json: bool,
}

/// One-sentence weather summary, optionally saved to a text file
#[derive(FromArgs)]
#[argh(subcommand, name = "summary")]
struct SummaryArgs {
    /// city name, Dutch postcode or "lat,lon"
    #[argh(positional)]
    city: Option<String>,

    /// write the summary to this file instead of stdout
    #[argh(option, short = 'o')]
    output: Option<PathBuf>,
}

/// Serve the JSON API
#[derive(FromArgs)]
#[argh(subcommand, name = "serve")]
struct ServeArgs {
    /// port to listen on (default: configured port)
    #[argh(option, short = 'p')]
    port: Option<u16>,
}

/// Manage the response cache
#[derive(FromArgs)]
#[argh(subcommand, name = "cache")]
struct CacheArgs {
    #[argh(subcommand)]
    action: CacheAction,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum CacheAction {
    Clear(CacheClearArgs),
}

/// Delete all cached responses
#[derive(FromArgs)]
#[argh(subcommand, name = "clear")]
struct CacheClearArgs {}

/// Print the effective configuration
#[derive(FromArgs)]
#[argh(subcommand, name = "config")]
struct ConfigArgs {}

fn main() -> ExitCode {
    let args: Args = argh::from_env();

    if args.version {
        println!("weather-agent {VERSION}");
        return ExitCode::SUCCESS;
    }

    let verbose = args.verbose;
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", report::describe_error(&e));
            if verbose {
                eprintln!("{e:?}");
            }
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let config = AppConfig::load_from_path(args.config)?;
    // Dropped last: flushes spans after the runtime has shut down
    let _telemetry = telemetry::init(&config.logging, args.verbose)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .with_context(|| "Failed to start async runtime")?;

    runtime.block_on(execute(args.command, config))
}

async fn execute(command: Option<Command>, config: AppConfig) -> Result<()> {
    let command = command.unwrap_or(Command::Weather(WeatherArgs {
        city: None,
        json: false,
    }));

    match command {
        Command::Cache(CacheArgs {
            action: CacheAction::Clear(_),
        }) => {
            let directory = config.cache.directory();
            if cache::clear_directory(&directory)? {
                println!("🧹 Cleared cache at {}", directory.display());
            } else {
                println!("Cache at {} is already empty", directory.display());
            }
            Ok(())
        }
        Command::Config(_) => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        command => {
            let directory = config.cache.directory();
            debug!("Opening cache at {}", directory.display());
            let cache = Arc::new(PersistentCache::open(&directory)?);
            let service = WeatherService::new(config, cache)?;
            run_service_command(command, service).await
        }
    }
}

async fn run_service_command(command: Command, service: WeatherService) -> Result<()> {
    match command {
        Command::Weather(args) => {
            let city = args.city.unwrap_or_else(|| service.default_city().to_string());
            let report = service.report(&city).await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{report}");
            }
        }
        Command::Compare(args) => {
            let comparison = service.compare(&args.cities).await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&comparison)?);
            } else {
                print!("{comparison}");
            }
        }
        Command::Summary(args) => {
            let city = args.city.unwrap_or_else(|| service.default_city().to_string());
            let report = service.report(&city).await?;
            match args.output {
                Some(path) => {
                    report::write_summary(&report, &path)?;
                    println!("💾 Summary saved to {}", path.display());
                }
                None => println!("{}", report.summary),
            }
        }
        Command::Serve(args) => {
            let port = args.port.unwrap_or(service.config().defaults.server_port);
            info!("Starting weather-agent {} API", VERSION);
            web::run(Arc::new(service), port).await?;
        }
        Command::Cache(_) | Command::Config(_) => {}
    }
    Ok(())
}
