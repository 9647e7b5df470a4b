use std::error::Error;

use chrono::Utc;
use natursur::{
    application::{
        account::AccountService,
        catalog::{seed_offerings, STUDIO_OFFERINGS},
    },
    infrastructure, NatursurConfig,
};
use tracing::{error, info, Level};

#[tokio::main]
async fn main() {
    match NatursurConfig::load() {
        Ok(config) => {
            tracing_subscriber::fmt()
                .with_max_level(Level::from(&config.logger.level))
                .init();
            if let Err(error) = seed(&config).await {
                error!("アプリケーションエラー: {}", error);
                std::process::exit(1);
            }
        }
        Err(error) => {
            tracing_subscriber::fmt::init();
            error!("アプリケーションエラー: {}", error);
            std::process::exit(1);
        }
    }
}

/// メニューと管理者アカウントを登録する
async fn seed(config: &NatursurConfig) -> Result<(), Box<dyn Error>> {
    let repositories = infrastructure::repositories(&config.storage)?;

    let report = seed_offerings(repositories.offerings.as_ref(), &STUDIO_OFFERINGS).await?;
    info!(
        "メニュー: 作成 {} / 更新 {} / 変更なし {}",
        report.created, report.updated, report.unchanged
    );

    let accounts = AccountService::new(repositories.users);
    let admin = &config.admin;
    if accounts
        .ensure_admin(&admin.username, &admin.email, &admin.password, Utc::now())
        .await?
    {
        info!("管理者 {} を作成しました", admin.username);
    } else {
        info!("管理者 {} は既に存在します", admin.username);
    }
    Ok(())
}
