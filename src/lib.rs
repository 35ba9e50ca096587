pub mod api;
pub mod cli;
pub mod config;
pub mod db;
pub mod entities;
pub mod models;
pub mod protocol;
pub mod security;
pub mod services;
pub mod state;

use tokio::signal;

use anyhow::Context;
use cli::{Cli, Commands, ProjectCommands};
pub use config::Config;
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

pub async fn run(cli: Cli, config: Config) -> anyhow::Result<()> {
    let command = cli.command.unwrap_or(Commands::Serve);

    // Commands that need neither a valid config nor logging.
    match &command {
        Commands::Init => {
            if Config::create_default_if_missing()? {
                println!("✓ Config file created. Set security.master_encryption_key and run again.");
            } else {
                println!("config.toml already exists, leaving it untouched.");
            }
            return Ok(());
        }
        Commands::ProtocolHash { username, password } => {
            cli::cmd_protocol_hash(username, password);
            return Ok(());
        }
        _ => {}
    }

    config.validate()?;
    init_tracing(&config)?;

    match command {
        Commands::Serve => run_server(config).await,

        Commands::CreateUser {
            username,
            email,
            password,
            admin,
        } => cli::cmd_create_user(&config, &username, &email, password.as_deref(), admin).await,

        Commands::SetActive { username, active } => {
            cli::cmd_set_active(&config, &username, active).await
        }

        Commands::Project { command } => match command {
            ProjectCommands::Add {
                name,
                url,
                signed_url,
                description,
            } => cli::cmd_project_add(&config, &name, &url, &signed_url, &description).await,
            ProjectCommands::List => cli::cmd_project_list(&config).await,
            ProjectCommands::Enable { id } => cli::cmd_project_set_enabled(&config, id, true).await,
            ProjectCommands::Disable { id } => {
                cli::cmd_project_set_enabled(&config, id, false).await
            }
        },

        Commands::SetKey {
            username,
            project_id,
            account_key,
        } => cli::cmd_set_key(&config, &username, project_id, &account_key).await,

        Commands::Computers { username } => cli::cmd_computers(&config, &username).await,

        Commands::Attach {
            computer_id,
            project_id,
            resource_share,
            detach_when_done,
        } => {
            cli::cmd_attach(
                &config,
                computer_id,
                project_id,
                resource_share,
                detach_when_done,
            )
            .await
        }

        Commands::Detach {
            computer_id,
            project_id,
        } => cli::cmd_detach(&config, computer_id, project_id).await,

        Commands::Init | Commands::ProtocolHash { .. } => Ok(()),
    }
}

fn init_tracing(config: &Config) -> anyhow::Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    let json = config.general.log_format == "json";
    let pretty_layer = (!json).then(tracing_subscriber::fmt::layer);
    let json_layer = json.then(|| tracing_subscriber::fmt::layer().json());

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(pretty_layer)
        .with(json_layer);

    if config.observability.loki_enabled {
        let url = url::Url::parse(&config.observability.loki_url).context("Invalid Loki URL")?;

        let mut builder = tracing_loki::builder();
        for (key, value) in &config.observability.loki_labels {
            builder = builder.label(key.clone(), value.clone())?;
        }
        let (layer, task) = builder.build_url(url)?;

        tokio::spawn(task);

        registry.with(layer).init();
        info!(
            "Loki logging initialized at {}",
            config.observability.loki_url
        );
    } else {
        registry.init();
    }

    Ok(())
}

fn init_metrics(config: &Config) -> anyhow::Result<Option<PrometheusHandle>> {
    if !config.observability.metrics_enabled {
        return Ok(None);
    }

    use metrics_exporter_prometheus::PrometheusBuilder;
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;
    info!("Prometheus metrics recorder initialized");

    Ok(Some(handle))
}

async fn run_server(config: Config) -> anyhow::Result<()> {
    info!(
        "acctmgr v{} starting as '{}'",
        env!("CARGO_PKG_VERSION"),
        config.account_manager.name
    );

    if !config.server.enabled {
        anyhow::bail!("server.enabled is false; nothing to serve");
    }

    let prometheus_handle = init_metrics(&config)?;
    let addr = format!("{}:{}", config.server.bind_address, config.server.port);

    let app = api::router(api::create_app_state_from_config(config, prometheus_handle).await?);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("🌐 Account manager listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Web server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => error!("Error listening for shutdown: {}", e),
    }
}
