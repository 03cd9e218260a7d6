use std::{net::SocketAddr, path::Path, sync::Arc};

use clap::Parser;
use color_eyre::{
    Result,
    eyre::{Context, eyre},
};
use keel::{
    adapters::{HttpHandler, OriginClientAdapter},
    ports::http_client::OriginClient,
    tracing_setup,
    utils::graceful_shutdown::GracefulShutdown,
};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[clap(subcommand)]
    command: Option<Commands>,

    #[clap(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Parser, Debug)]
enum Commands {
    /// Validate configuration file
    Validate {
        /// Configuration file to validate
        #[clap(short, long, default_value = "config.toml")]
        config: String,
    },
    /// Initialize a new configuration file
    Init {
        /// Output path for the new config file
        #[clap(short, long, default_value = "config.toml")]
        config: String,
    },
    /// Start the load balancer (default)
    Serve {
        /// Configuration file to use
        #[clap(short, long, default_value = "config.toml")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    // Determine the command to run
    let (command, config_path) = match args.command {
        Some(Commands::Validate { config }) => ("validate", config),
        Some(Commands::Init { config }) => ("init", config),
        Some(Commands::Serve { config }) => ("serve", config),
        None => ("serve", args.config), // Default to serve with config from args
    };

    match command {
        "validate" => {
            return validate_config_command(&config_path).await;
        }
        "init" => {
            return init_config_command(&config_path).await;
        }
        "serve" => {
            // Continue with normal server startup
        }
        _ => unreachable!(),
    }

    tracing_setup::init_tracing().map_err(|e| eyre!("Failed to initialize tracing: {}", e))?;

    tracing::info!("Loading configuration from {config_path}");

    let config = keel::config::load_config(&config_path)
        .await
        .with_context(|| format!("Failed to load config from {config_path}"))?;

    keel::config::ProxyConfigValidator::validate(&config)
        .map_err(|e| eyre!("Invalid configuration:\n{e}"))?;

    let config = Arc::new(config);

    let http_client: Arc<dyn OriginClient> =
        Arc::new(OriginClientAdapter::new().context("Failed to create origin HTTP client")?);
    let http_handler = Arc::new(HttpHandler::new(config.clone(), http_client));

    // Create graceful shutdown manager
    let graceful_shutdown = Arc::new(GracefulShutdown::new());

    // Start signal handler for graceful shutdown
    let signal_handler_shutdown = graceful_shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = signal_handler_shutdown.run_signal_handler().await {
            tracing::error!("Signal handler error: {}", e);
        }
    });

    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .context("Failed to parse listen address")?;

    // Show configuration info
    {
        let enabled = config.origins.iter().filter(|o| o.enabled).count();
        let primary = config
            .origins
            .iter()
            .filter(|o| o.enabled && !o.backup)
            .count();
        let backup = config
            .origins
            .iter()
            .filter(|o| o.enabled && o.backup)
            .count();

        tracing::info!(
            "Starting Keel load balancer on {} ({} origins: {} primary, {} backup, {} enabled)",
            config.listen_addr,
            config.origins.len(),
            primary,
            backup,
            enabled
        );

        println!(
            "Keel load balancer listening on {} ({} primary / {} backup origins)",
            config.listen_addr, primary, backup
        );

        for origin in &config.origins {
            tracing::info!(
                "Configured origin: {} (weight {}, backup: {}, enabled: {}, timeout {}ms)",
                origin.url,
                origin.weight,
                origin.backup,
                origin.enabled,
                origin.timeout_millis
            );
        }
    }

    // Create Axum router with real request handling
    use std::convert::Infallible;

    use axum::{Router, body::Body, extract::Request, response::Response, routing::any};
    use tower_http::trace::TraceLayer;

    let make_request_route = |handler: Arc<HttpHandler>| {
        any(move |req: Request| {
            let handler = handler.clone();
            async move {
                match handler.handle_request(req).await {
                    Ok(response) => Ok::<Response<Body>, Infallible>(response),
                    Err(e) => {
                        tracing::error!("Request handling error: {:?}", e);
                        let payload = serde_json::json!({
                            "error": "Internal Error",
                            "message": e.to_string(),
                        });
                        let error_response = Response::builder()
                            .status(500)
                            .header(http::header::CONTENT_TYPE, "application/json")
                            .body(Body::from(payload.to_string()))
                            .unwrap_or_else(|_| {
                                Response::new(Body::from("Internal Server Error"))
                            });
                        Ok(error_response)
                    }
                }
            }
        })
    };

    let app = Router::new()
        .route("/{*path}", make_request_route(http_handler.clone()))
        .route("/", make_request_route(http_handler.clone()))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    tracing::info!("Keel server starting on {}", addr);

    // Run the server and wait for shutdown
    let server_result = tokio::select! {
        result = axum::serve(listener, app) => {
            result.context("Server error")
        },
        shutdown_reason = graceful_shutdown.wait_for_shutdown_signal() => {
            tracing::info!("Shutdown signal received: {:?}", shutdown_reason);
            tracing::info!("Graceful shutdown completed");
            Ok(())
        }
    };

    server_result?;

    // Shutdown tracing on exit
    tracing_setup::shutdown_tracing();

    Ok(())
}

/// Validate configuration file and exit
async fn validate_config_command(config_path: &str) -> Result<()> {
    use keel::config::{ProxyConfigValidator, load_config};

    println!("🔍 Validating configuration file: {config_path}");

    // First check if file exists and is readable
    if !Path::new(config_path).exists() {
        eprintln!("❌ Error: Configuration file '{config_path}' not found");
        std::process::exit(1);
    }

    // Try to parse the configuration
    let config = match load_config(config_path).await {
        Ok(config) => {
            println!("✅ Configuration parsing: OK");
            config
        }
        Err(e) => {
            eprintln!("❌ Configuration parsing failed:");
            eprintln!("   {e}");
            std::process::exit(1);
        }
    };

    // Validate the configuration
    match ProxyConfigValidator::validate(&config) {
        Ok(()) => {
            println!("✅ Configuration validation: OK");
            println!();
            println!("📋 Configuration Summary:");
            println!("   • Listen Address: {}", config.listen_addr);
            println!("   • Origins: {}", config.origins.len());
            println!(
                "   • Enabled: {}",
                config.origins.iter().filter(|o| o.enabled).count()
            );
            println!(
                "   • Primary / Backup: {} / {}",
                config
                    .origins
                    .iter()
                    .filter(|o| o.enabled && !o.backup)
                    .count(),
                config
                    .origins
                    .iter()
                    .filter(|o| o.enabled && o.backup)
                    .count()
            );
            println!();
            println!("🎉 Configuration is valid and ready to use!");
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ Configuration validation failed:");
            eprintln!("{e}");
            println!();
            println!("💡 Common fixes:");
            println!("   • Ensure all origin URLs start with http:// or https://");
            println!("   • Keep every origin weight a positive number");
            println!("   • Keep timeout_millis at 1000 or above");
            println!("   • Verify listen address format (e.g., '127.0.0.1:8080')");
            std::process::exit(1);
        }
    }
}

/// Initialize a new configuration file
async fn init_config_command(config_path: &str) -> Result<()> {
    let path = Path::new(config_path);
    if path.exists() {
        eprintln!("❌ Error: Configuration file '{config_path}' already exists");
        std::process::exit(1);
    }

    let default_config = r#"# Keel Load Balancer Configuration

# The address to listen on
listen_addr = "127.0.0.1:8080"

# Paths served by the read-only introspection endpoints
health_path = "/health"
stats_path = "/_lb/stats"

# Headers injected into every forwarded request (per-origin headers override these)
[inject_headers]
# x-proxied-by = "keel"

# Primary origins: weighted random selection across the enabled ones
[[origins]]
url = "https://server1.example.com"
weight = 3.0

[[origins]]
url = "https://server2.example.com"
weight = 1.0
timeout_millis = 10000

# Backup origins: only tried once every primary origin has failed
[[origins]]
url = "https://backup.example.com"
backup = true
"#;

    tokio::fs::write(path, default_config)
        .await
        .context("Failed to write config file")?;
    println!("✅ Created default configuration at: {config_path}");
    println!("   Run 'keel serve --config {config_path}' to start the load balancer");
    Ok(())
}
