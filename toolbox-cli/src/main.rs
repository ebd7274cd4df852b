mod cli;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, LogLevel, LoggingFormat};
use toolbox_core::ResourceManager;

fn init_tracing(level: LogLevel, format: LoggingFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    match format {
        LoggingFormat::Standard => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
        LoggingFormat::Json => {
            tracing_subscriber::fmt().with_env_filter(filter).json().init();
        }
    }
}

fn load_preset(name: &str) -> Result<toolbox_config::RawConfig> {
    let text = match name {
        "minimal" => include_str!("../presets/minimal.yaml"),
        "postgres-demo" => include_str!("../presets/postgres-demo.yaml"),
        "http-demo" => include_str!("../presets/http-demo.yaml"),
        other => anyhow::bail!("unknown --prebuilt {other:?}; valid names: minimal, postgres-demo, http-demo"),
    };
    Ok(toolbox_config::decode_pass1(text)?)
}

fn load_initial_config(cli: &Cli) -> Result<(toolbox_config::RawConfig, Option<toolbox_web::ConfigSource>)> {
    if let Some(path) = &cli.tools_file {
        let raw = toolbox_config::ConfigLoader::load_files(std::slice::from_ref(path))
            .context("failed to load --tools-file")?;
        return Ok((raw, Some(toolbox_web::source_for_path(path))));
    }
    if !cli.tools_files.is_empty() {
        let raw =
            toolbox_config::ConfigLoader::load_files(&cli.tools_files).context("failed to load --tools-files")?;
        // Watch every parent directory named; the coordinator dedupes them.
        let source = toolbox_web::ConfigSource::Files(cli.tools_files.clone());
        return Ok((raw, Some(source)));
    }
    if let Some(dir) = &cli.tools_folder {
        let raw = toolbox_config::ConfigLoader::load_folder(dir).context("failed to load --tools-folder")?;
        return Ok((raw, Some(toolbox_web::source_for_path(dir))));
    }
    if let Some(name) = &cli.prebuilt {
        let raw = load_preset(name)?;
        return Ok((raw, None));
    }

    Ok((toolbox_config::RawConfig::default(), None))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level, cli.logging_format);

    if cli.telemetry_otlp || cli.telemetry_gcp {
        tracing::info!(
            otlp = cli.telemetry_otlp,
            gcp = cli.telemetry_gcp,
            service_name = cli.telemetry_service_name.as_deref().unwrap_or("toolbox"),
            "telemetry configuration acknowledged (no exporter wired)"
        );
    }

    let registry = toolbox_core::registry();
    toolbox_sources::register(registry);
    toolbox_auth::register(registry);

    let (raw_config, reload_source) = load_initial_config(&cli)?;
    let tuple = toolbox_config::materialize(&raw_config, registry)
        .await
        .context("failed to materialize configuration")?;

    tracing::info!(
        sources = tuple.sources.len(),
        auth_services = tuple.auth_services.len(),
        tools = tuple.tools.len(),
        toolsets = tuple.toolsets.len(),
        "startup: resources materialized"
    );

    let resources = Arc::new(ResourceManager::new(tuple));

    if cli.stdio {
        tracing::info!("running MCP stdio transport");
        let engine = Arc::new(toolbox_mcp::Engine::new(resources.clone()));
        toolbox_mcp::transport::stdio::serve(engine, toolbox_core::DEFAULT_TOOLSET)
            .await
            .context("stdio transport failed")?;
        return Ok(());
    }

    let _reload_handle = if cli.disable_reload {
        tracing::info!("hot-reload disabled via --disable-reload");
        None
    } else if let Some(source) = reload_source {
        Some(toolbox_web::spawn_reload(source, registry, resources.clone()).context("failed to start hot-reload coordinator")?)
    } else {
        tracing::info!("no reloadable config source given (--prebuilt or no flags); hot-reload disabled");
        None
    };

    let engine = Arc::new(toolbox_mcp::Engine::new(resources.clone()));
    let sessions = Arc::new(toolbox_mcp::SessionManager::new());

    let app = toolbox_web::router::router(resources.clone())
        .merge(toolbox_mcp::transport::streamable_http::router(engine.clone(), sessions.clone()))
        .merge(toolbox_mcp::transport::sse::router(engine, sessions));

    let addr = SocketAddr::new(cli.address, cli.port);
    toolbox_web::lifecycle::serve(app, addr).await
}
