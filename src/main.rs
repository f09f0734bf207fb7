use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tonic::transport::Server;
use tracing_subscriber::EnvFilter;

use zoondo_game_engine::engine::config::{load_default_settings, load_settings};
use zoondo_game_engine::engine::plugin::PowerRegistry;
use zoondo_game_engine::games::zoondo::catalog::{OffsetGeometry, TribeCatalog};
use zoondo_game_engine::games::zoondo::game::GameContext;
use zoondo_game_engine::server::proto::game_engine_service_server::GameEngineServiceServer;
use zoondo_game_engine::server::GameEngineServer;

#[derive(Parser)]
#[command(name = "zoondo-engine", about = "Zoondo rules engine gRPC server")]
struct Cli {
    /// Port to listen on
    #[arg(short, long, default_value = "50051", env = "ZOONDO_ENGINE_PORT")]
    port: u16,

    /// Path to zoondo.toml (default: auto-discover)
    #[arg(long, env = "ZOONDO_ENGINE_CONFIG")]
    config: Option<PathBuf>,

    /// Tribe catalog, overriding the one named in the settings
    #[arg(long)]
    catalog: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();

    let settings = match cli.config {
        Some(ref path) => load_settings(path)?,
        None => load_default_settings(),
    };
    let catalog_path = cli.catalog.unwrap_or_else(|| settings.catalog.clone());
    let catalog = Arc::new(TribeCatalog::load(&catalog_path)?);
    let powers = PowerRegistry::from_catalog(&catalog);
    tracing::info!(
        tribes = ?catalog.tribe_ids(),
        powers = powers.len(),
        board_size = settings.board_size,
        "loaded rules"
    );

    let context = GameContext {
        geometry: Arc::new(OffsetGeometry::new(settings.board_size)),
        settings,
        catalog: catalog.clone(),
        powers: Arc::new(powers),
    };
    let server = GameEngineServer::new(context, catalog);

    let addr: SocketAddr = ([0, 0, 0, 0], cli.port).into();
    tracing::info!(%addr, "starting gRPC server");

    Server::builder()
        .add_service(GameEngineServiceServer::new(server))
        .serve(addr)
        .await?;

    Ok(())
}
