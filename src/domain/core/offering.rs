use async_trait::async_trait;
use chrono::Duration;
use derive_more::{Deref, Display, Error, From, IntoIterator};
use serde::{Deserialize, Serialize};

use crate::domain::{Aggregation, DataAccessError, Entity, Event, EventQueue, Id};

use super::Money;

/// メニューリポジトリ
#[async_trait]
pub trait OfferingRepository: Send + Sync {
    /// メニューをIDで検索する
    async fn find_by_id(&self, id: OfferingId) -> Result<Option<Offering>, DataAccessError>;
    /// メニューをスラッグで検索する
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Offering>, DataAccessError>;
    /// 全メニューを取得する
    async fn find_all(&self) -> Result<Vec<Offering>, DataAccessError>;
    /// メニューを保存する
    async fn save(&self, entity: &mut Offering) -> Result<bool, DataAccessError>;
    /// メニューを削除する
    async fn delete(&self, entity: &mut Offering) -> Result<bool, DataAccessError>;
}

/// メニューID
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Deref, Default,
)]
pub struct OfferingId(u64);

impl Id for OfferingId {
    type Inner = u64;
}

/// メニューイベント
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OfferingEvent {
    /// メニューが作成された
    OfferingCreated {
        id: OfferingId,
        slug: String,
        name: String,
        duration_minutes: u32,
        price: Money,
    },
    /// メニュー名が変更された
    OfferingRenamed { id: OfferingId, name: String },
    /// 所要時間が変更された
    OfferingDurationChanged {
        id: OfferingId,
        duration_minutes: u32,
    },
    /// 料金が変更された
    OfferingPriceChanged { id: OfferingId, price: Money },
    /// メニューが削除された
    OfferingDeleted { id: OfferingId },
}

impl Event for OfferingEvent {
    type Id = OfferingId;

    fn is_terminal(&self) -> bool {
        matches!(self, OfferingEvent::OfferingDeleted { .. })
    }
}

/// メニューエンティティ
#[derive(Debug, Default, Clone, IntoIterator, Serialize, Deserialize)]
pub struct Offering {
    id: OfferingId,
    slug: String,
    name: String,
    duration_minutes: u32,
    price: Money,
    #[serde(skip)]
    #[into_iterator]
    events: EventQueue<OfferingEvent>,
}

impl Offering {
    pub fn create(
        id: OfferingId,
        slug: String,
        name: String,
        duration_minutes: u32,
        price: Money,
    ) -> Result<Self, OfferingError> {
        Self::validate_created(&slug, &name, duration_minutes)?;
        let mut entity = Offering {
            id,
            slug: slug.clone(),
            name: name.clone(),
            duration_minutes,
            price,
            ..Default::default()
        };
        entity.events.push(OfferingEvent::OfferingCreated {
            id,
            slug,
            name,
            duration_minutes,
            price,
        });
        Ok(entity)
    }

    pub fn rename(&mut self, name: String) -> Result<(), OfferingError> {
        Self::validate_name(&name)?;
        self.name = name.clone();
        self.events
            .push(OfferingEvent::OfferingRenamed { id: self.id, name });
        Ok(())
    }

    pub fn change_duration(&mut self, duration_minutes: u32) -> Result<(), OfferingError> {
        Self::validate_duration(duration_minutes)?;
        self.duration_minutes = duration_minutes;
        self.events.push(OfferingEvent::OfferingDurationChanged {
            id: self.id,
            duration_minutes,
        });
        Ok(())
    }

    pub fn change_price(&mut self, price: Money) {
        self.price = price;
        self.events
            .push(OfferingEvent::OfferingPriceChanged { id: self.id, price });
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }

    pub fn duration(&self) -> Duration {
        Duration::minutes(self.duration_minutes as i64)
    }

    pub fn price(&self) -> &Money {
        &self.price
    }

    fn validate_id(&self, id: &OfferingId) -> Result<(), OfferingError> {
        match self.id == *id {
            true => Ok(()),
            false => Err(OfferingError::MismatchedId),
        }
    }

    fn validate_created(slug: &str, name: &str, duration_minutes: u32) -> Result<(), OfferingError> {
        if slug.trim().is_empty() {
            return Err(OfferingError::SlugIsBlank);
        }
        Self::validate_name(name)?;
        Self::validate_duration(duration_minutes)
    }

    fn validate_name(name: &str) -> Result<(), OfferingError> {
        match name.trim().is_empty() {
            true => Err(OfferingError::NameIsBlank),
            false => Ok(()),
        }
    }

    fn validate_duration(duration_minutes: u32) -> Result<(), OfferingError> {
        match duration_minutes {
            0 => Err(OfferingError::InvalidDuration),
            _ => Ok(()),
        }
    }
}

impl Entity for Offering {
    type Id = OfferingId;

    const ENTITY_NAME: &'static str = "offering";

    fn id(&self) -> Self::Id {
        self.id
    }
}

impl Aggregation for Offering {
    type Event = OfferingEvent;
    type Error = OfferingError;

    fn validate(&self, event: &Self::Event) -> Result<(), Self::Error> {
        match event {
            OfferingEvent::OfferingCreated {
                slug,
                name,
                duration_minutes,
                ..
            } => Self::validate_created(slug, name, *duration_minutes),
            OfferingEvent::OfferingRenamed { id, name } => {
                self.validate_id(id)?;
                Self::validate_name(name)
            }
            OfferingEvent::OfferingDurationChanged {
                id,
                duration_minutes,
            } => {
                self.validate_id(id)?;
                Self::validate_duration(*duration_minutes)
            }
            OfferingEvent::OfferingPriceChanged { id, .. }
            | OfferingEvent::OfferingDeleted { id } => self.validate_id(id),
        }
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            OfferingEvent::OfferingCreated {
                id,
                slug,
                name,
                duration_minutes,
                price,
            } => {
                if self.id != id {
                    if let Ok(entity) = Self::create(id, slug, name, duration_minutes, price) {
                        *self = entity;
                    }
                }
            }
            OfferingEvent::OfferingRenamed { id, name } => {
                if self.id == id {
                    if let Err(_e) = self.rename(name) {}
                }
            }
            OfferingEvent::OfferingDurationChanged {
                id,
                duration_minutes,
            } => {
                if self.id == id {
                    if let Err(_e) = self.change_duration(duration_minutes) {}
                }
            }
            OfferingEvent::OfferingPriceChanged { id, price } => {
                if self.id == id {
                    self.change_price(price);
                }
            }
            OfferingEvent::OfferingDeleted { .. } => {}
        }
    }

    fn events(&self) -> &EventQueue<Self::Event> {
        &self.events
    }

    fn events_mut(&mut self) -> &mut EventQueue<Self::Event> {
        &mut self.events
    }
}

impl PartialEq for Offering {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.slug == other.slug
            && self.name == other.name
            && self.duration_minutes == other.duration_minutes
            && self.price == other.price
    }
}

impl Eq for Offering {}

/// メニューエラー
#[derive(Error, Display, Debug)]
pub enum OfferingError {
    /// IDが一致しません
    #[display(fmt = "ID does not match")]
    MismatchedId,
    /// スラッグが空欄です
    #[display(fmt = "Slug cannot be blank")]
    SlugIsBlank,
    /// 名前が空欄です
    #[display(fmt = "Name cannot be blank")]
    NameIsBlank,
    /// 所要時間が不正です
    #[display(fmt = "Duration must be a positive number of minutes")]
    InvalidDuration,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sesion_60() -> Offering {
        Offering::create(
            OfferingId(60),
            "sesion-60".to_owned(),
            "Sesión 60'".to_owned(),
            60,
            Money::eur(4500),
        )
        .unwrap()
    }

    #[test]
    fn test_offering_create() {
        let offering = sesion_60();
        assert_eq!(offering.id(), OfferingId(60));
        assert_eq!(offering.slug(), "sesion-60");
        assert_eq!(offering.name(), "Sesión 60'");
        assert_eq!(offering.duration(), Duration::minutes(60));
        assert_eq!(offering.price(), &Money::eur(4500));
        assert!(matches!(
            offering.peek(),
            Some(OfferingEvent::OfferingCreated { .. })
        ));
    }

    #[test]
    fn test_offering_create_invalid() {
        let blank = Offering::create(OfferingId(1), " ".to_owned(), "x".to_owned(), 40, Money::eur(0));
        assert!(matches!(blank, Err(OfferingError::SlugIsBlank)));
        let zero = Offering::create(OfferingId(1), "x".to_owned(), "x".to_owned(), 0, Money::eur(0));
        assert!(matches!(zero, Err(OfferingError::InvalidDuration)));
    }

    #[test]
    fn test_offering_replay() {
        let mut offering = sesion_60();
        offering.change_price(Money::eur(5000));
        offering.change_duration(90).unwrap();
        let events = offering.pop_all();
        assert_eq!(events.len(), 3);

        let mut replayed = Offering::default();
        for event in events {
            replayed.validate(&event).ok();
            replayed.apply(event);
        }
        assert_eq!(replayed, offering);
        assert_eq!(replayed.duration_minutes(), 90);
    }

    #[test]
    fn test_offering_rename_mismatched_id() {
        let offering = sesion_60();
        let event = OfferingEvent::OfferingRenamed {
            id: OfferingId(1),
            name: "otro".to_owned(),
        };
        assert!(matches!(
            offering.validate(&event),
            Err(OfferingError::MismatchedId)
        ));
    }
}
