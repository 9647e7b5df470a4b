use std::{error::Error, net::SocketAddr};

use axum_server::tls_rustls::RustlsConfig;
use chrono::Utc;
use natursur::{
    application::{
        catalog::{seed_offerings, STUDIO_OFFERINGS},
        Services,
    },
    infrastructure, Backend, NatursurConfig,
};
use natursur_web::{router, state::AppState};
use tracing::{error, info, Level};

#[tokio::main]
async fn main() {
    match NatursurConfig::load() {
        Ok(config) => {
            tracing_subscriber::fmt()
                .with_max_level(Level::from(&config.logger.level))
                .init();
            if let Err(error) = serve(config).await {
                error!("アプリケーションエラー: {}", error);
            }
        }
        Err(error) => {
            tracing_subscriber::fmt::init();
            error!("アプリケーションエラー: {}", error)
        }
    }
}

async fn serve(config: NatursurConfig) -> Result<(), Box<dyn Error>> {
    let addr = config.server.address.parse::<SocketAddr>()?;
    let repositories = infrastructure::repositories(&config.storage)?;
    let services = Services::new(
        &config,
        repositories,
        infrastructure::mailer(&config),
        infrastructure::video_feed(&config.studio),
    );
    if config.storage.backend == Backend::Memory {
        // メモリ上では起動のたびに空なので初期データを入れる
        seed_offerings(services.offerings.as_ref(), &STUDIO_OFFERINGS).await?;
        services
            .accounts
            .ensure_admin(
                &config.admin.username,
                &config.admin.email,
                &config.admin.password,
                Utc::now(),
            )
            .await?;
    }

    let tls = config.server.tls.clone();
    let app = router(AppState::new(config, services));
    match tls {
        Some(tls) => {
            let rustls = RustlsConfig::from_pem_file(&tls.cert, &tls.key).await?;
            info!("https://{} で待ち受けます", addr);
            axum_server::bind_rustls(addr, rustls)
                .serve(app.into_make_service())
                .await?;
        }
        None => {
            info!("http://{} で待ち受けます", addr);
            axum::Server::bind(&addr)
                .serve(app.into_make_service())
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("シグナルを待てませんでした: {}", e);
    }
    info!("シャットダウンします");
}
