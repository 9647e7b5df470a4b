pub mod account;
pub mod booking;
pub mod catalog;
pub mod feed;
pub mod form;
pub mod notify;

use std::sync::Arc;

use crate::domain::booking::BusinessHours;
use crate::domain::core::{OfferingRepository, ReservationRepository, UserRepository};
use crate::NatursurConfig;

use self::{account::AccountService, booking::BookingService, feed::VideoFeed, notify::Mailer, notify::Notifier};

/// 保存先
#[derive(Clone)]
pub struct Repositories {
    pub offerings: Arc<dyn OfferingRepository>,
    pub reservations: Arc<dyn ReservationRepository>,
    pub users: Arc<dyn UserRepository>,
}

/// アプリケーションのサービス一式
pub struct Services {
    pub booking: BookingService,
    pub accounts: AccountService,
    pub notifier: Notifier,
    pub feed: Arc<dyn VideoFeed>,
    pub offerings: Arc<dyn OfferingRepository>,
}

impl Services {
    pub fn new(
        config: &NatursurConfig,
        repositories: Repositories,
        mailer: Arc<dyn Mailer>,
        feed: Arc<dyn VideoFeed>,
    ) -> Self {
        Self {
            booking: BookingService::new(
                repositories.offerings.clone(),
                repositories.reservations,
                BusinessHours::default(),
                config.studio.timezone,
            ),
            accounts: AccountService::new(repositories.users),
            notifier: Notifier::new(
                mailer,
                repositories.offerings.clone(),
                config.studio.name.clone(),
                config.studio.contact_email.clone(),
            ),
            feed,
            offerings: repositories.offerings,
        }
    }
}
