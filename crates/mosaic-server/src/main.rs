use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use mosaic_server::app;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mosaic=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("MOSAIC_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("MOSAIC_DB_PATH").unwrap_or_else(|_| "mosaic.db".into());
    let upload_dir = std::env::var("MOSAIC_UPLOAD_DIR").unwrap_or_else(|_| "./uploads".into());
    let host = std::env::var("MOSAIC_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("MOSAIC_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    // Init database
    let db = Arc::new(mosaic_db::Database::open(&PathBuf::from(&db_path))?);

    let router = app::build_router(db, jwt_secret, PathBuf::from(upload_dir));

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Mosaic server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
