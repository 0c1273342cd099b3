use axum::http::Method;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use sasgate::http::{build_router, AppState, LoggingSink};
use sasgate::{initialize_gateway, GatewayConfig, GatewayState, KeyMaterial, RootError};

/// sasgate: signed callback URLs for inbound webhooks
///
/// Issues URLs that external services can call back on, and rejects any
/// callback that does not carry a valid signature for its exact URL.
#[derive(Parser, Debug)]
#[command(name = "sasgate", version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Public origin external services will call back on
        #[arg(long)]
        base_url: Option<String>,
    },

    /// Run the webhook gateway
    Serve {
        /// Bind address (overrides config)
        #[arg(long)]
        bind: Option<String>,

        /// Port (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Print a signed callback URL
    IssueUrl {
        /// Internal routing id to seal into the URL
        #[arg(long)]
        routing_id: String,

        /// Extra signed query parameter, as key=value (repeatable). The key
        /// must be listed in callback.signed_params.
        #[arg(long = "param", value_parser = parse_key_val)]
        params: Vec<(String, String)>,

        /// Lifetime in seconds (overrides the configured grant)
        #[arg(long)]
        ttl_secs: Option<u64>,
    },

    /// Check a signed URL offline
    CheckUrl {
        /// Absolute URL to check
        url: String,

        /// HTTP method the caller would use
        #[arg(long, default_value = "POST")]
        method: String,
    },
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", s))?;
    if key.is_empty() {
        return Err(format!("empty key in '{}'", s));
    }
    Ok((key.to_string(), value.to_string()))
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("sasgate=debug,sasgate_access=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sasgate=info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<GatewayConfig, RootError> {
    match path {
        Some(p) => GatewayConfig::load(p),
        None => {
            let default_path = GatewayConfig::default_config_path();
            GatewayConfig::load(&default_path)
        }
    }
}

fn load_gateway(config: GatewayConfig) -> Result<GatewayState, RootError> {
    let keys = KeyMaterial::from_env(&config.keys)?;
    initialize_gateway(config, keys)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = run(cli).await;
    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), RootError> {
    match cli.command {
        Commands::Init { base_url } => cmd_init(cli.config.as_ref(), base_url),
        Commands::Serve { bind, port } => cmd_serve(cli.config.as_ref(), bind, port).await,
        Commands::IssueUrl {
            routing_id,
            params,
            ttl_secs,
        } => cmd_issue_url(cli.config.as_ref(), &routing_id, &params, ttl_secs),
        Commands::CheckUrl { url, method } => cmd_check_url(cli.config.as_ref(), &url, &method),
    }
}

fn cmd_init(config_path: Option<&PathBuf>, base_url: Option<String>) -> Result<(), RootError> {
    let mut config = load_config(config_path)?;
    if let Some(url) = base_url {
        config.callback.base_url = url;
    }
    config.validate()?;

    let save_path = config_path
        .cloned()
        .unwrap_or_else(GatewayConfig::default_config_path);
    config.save(&save_path)?;

    println!("sasgate configuration written.");
    println!("  Config:     {}", save_path.display());
    println!("  Base URL:   {}", config.callback.base_url);
    println!("  Secret env: {}", config.keys.secret_key_env);
    Ok(())
}

async fn cmd_serve(
    config_path: Option<&PathBuf>,
    bind: Option<String>,
    port: Option<u16>,
) -> Result<(), RootError> {
    let mut config = load_config(config_path)?;
    if let Some(bind) = bind {
        config.server.bind = bind;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    let addr = format!("{}:{}", config.server.bind, config.server.port);

    let state = Arc::new(AppState {
        gateway: load_gateway(config)?,
        sink: Arc::new(LoggingSink),
    });
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "sasgate listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("sasgate stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
    }
}

fn cmd_issue_url(
    config_path: Option<&PathBuf>,
    routing_id: &str,
    params: &[(String, String)],
    ttl_secs: Option<u64>,
) -> Result<(), RootError> {
    let gateway = load_gateway(load_config(config_path)?)?;
    let url = gateway.issue_url(routing_id, params, ttl_secs)?;
    println!("{}", url);
    Ok(())
}

fn cmd_check_url(config_path: Option<&PathBuf>, url: &str, method: &str) -> Result<(), RootError> {
    let method: Method = method
        .to_ascii_uppercase()
        .parse()
        .map_err(|_| RootError::InvalidInput(format!("unknown HTTP method '{}'", method)))?;
    let gateway = load_gateway(load_config(config_path)?)?;
    let authorized = gateway.check_url(&method, url)?;

    println!("Authorized.");
    println!("  Routing id: {}", authorized.routing_id);
    println!("  Action:     {}", authorized.action);
    match authorized.expire_time {
        Some(t) => println!("  Expires:    {}", t),
        None => println!("  Expires:    never"),
    }
    for (k, v) in &authorized.params {
        println!("  {} = {}", k, v);
    }
    Ok(())
}
