//! メニューの初期データ

use tracing::info;

use crate::domain::core::{Money, Offering, OfferingError, OfferingRepository};
use crate::domain::{DataAccessError, ID_GENERATOR};

/// スタジオのメニュー (slug, 名前, 分, セント)
pub const STUDIO_OFFERINGS: [(&str, &str, u32, u64); 6] = [
    ("sesion-40", "Sesión 40'", 40, 2800),
    ("sesion-60", "Sesión 60'", 60, 4500),
    ("sesion-90", "Sesión 90'", 90, 7000),
    ("paquete-3x40", "3 sesiones de 40'", 40, 7000),
    ("premium-60", "Sesión Premium 60'", 60, 5000),
    ("domicilio-60", "Domicilio 60'", 60, 10000),
];

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error(transparent)]
    Offering(#[from] OfferingError),
    #[error(transparent)]
    DataAccess(#[from] DataAccessError),
}

/// 反映結果
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
}

/// slug をキーにメニューを登録・更新する
///
/// 既存のメニューは料金と所要時間だけを合わせる。
pub async fn seed_offerings(
    repository: &dyn OfferingRepository,
    catalog: &[(&str, &str, u32, u64)],
) -> Result<SeedReport, CatalogError> {
    let mut report = SeedReport::default();
    for &(slug, name, duration_minutes, cents) in catalog {
        let price = Money::eur(cents);
        match repository.find_by_slug(slug).await? {
            None => {
                let mut offering = Offering::create(
                    ID_GENERATOR.generate(),
                    slug.to_owned(),
                    name.to_owned(),
                    duration_minutes,
                    price,
                )?;
                repository.save(&mut offering).await?;
                info!("作成: {} ({})", offering.name(), offering.price());
                report.created += 1;
            }
            Some(mut offering) => {
                if offering.price() != &price {
                    offering.change_price(price);
                }
                if offering.duration_minutes() != duration_minutes {
                    offering.change_duration(duration_minutes)?;
                }
                if repository.save(&mut offering).await? {
                    info!("更新: {} ({})", offering.name(), offering.price());
                    report.updated += 1;
                } else {
                    info!("変更なし: {}", offering.name());
                    report.unchanged += 1;
                }
            }
        }
    }
    Ok(report)
}
