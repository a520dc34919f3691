use clap::{Arg, Command};
use suspense_stream::error::StreamError;
use suspense_stream::server::{
    Server,
    config::{Config, parse_mode},
};

use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();

    let matches = Command::new("suspense-stream")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Out-of-order Suspense streaming demo server")
        .arg(
            Arg::new("mode")
                .short('m')
                .long("mode")
                .value_name("MODE")
                .help("Server mode: development or production")
                .value_parser(["development", "dev", "production", "prod"]),
        )
        .arg(
            Arg::new("host")
                .short('H')
                .long("host")
                .value_name("HOST")
                .help("Server host address"),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .help("Server port")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Reduce log output")
                .action(clap::ArgAction::SetTrue)
                .conflicts_with("verbose"),
        )
        .get_matches();

    init_logging(&matches)?;

    let config = load_configuration(&matches)?;

    let server = Server::new(config).await.map_err(|e| {
        error!("Failed to create server: {}", e);
        e
    })?;

    tokio::select! {
        result = server.start() => {
            if let Err(e) = result {
                error!("Server error: {}", e);
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
        }
    }

    Ok(())
}

fn init_logging(matches: &clap::ArgMatches) -> Result<(), StreamError> {
    let verbose = matches.get_flag("verbose");
    let quiet = matches.get_flag("quiet");

    let default_level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("suspense_stream={default_level}")))
        .map_err(|e| StreamError::internal(format!("Failed to create log filter: {e}")))?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_thread_names(false)
                .with_file(verbose)
                .with_line_number(verbose)
                .compact(),
        )
        .init();

    Ok(())
}

fn load_configuration(matches: &clap::ArgMatches) -> Result<Config, StreamError> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => Config::from_file(path)
            .map_err(|e| StreamError::internal(format!("Failed to load {path}: {e}")))?,
        None => Config::default(),
    };

    config
        .apply_env()
        .map_err(|e| StreamError::internal(format!("Invalid environment configuration: {e}")))?;

    if let Some(mode) = matches.get_one::<String>("mode") {
        config.mode = parse_mode(mode).map_err(|e| StreamError::internal(e.to_string()))?;
    }

    if let Some(host) = matches.get_one::<String>("host") {
        config.server.host = host.to_string();
    }

    if let Some(&port) = matches.get_one::<u16>("port") {
        config.server.port = port;
    }

    validate_configuration(&config)?;

    Ok(config)
}

fn validate_configuration(config: &Config) -> Result<(), StreamError> {
    if config.server.host.is_empty() {
        return Err(StreamError::internal("Server host cannot be empty"));
    }

    if config.server.port == 0 {
        return Err(StreamError::internal("Server port cannot be 0"));
    }

    Ok(())
}
