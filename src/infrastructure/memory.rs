//! プロセス内メモリに保持するリポジトリ
//!
//! 開発とテスト用。再起動すると内容は消える。

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::domain::core::{
    Offering, OfferingEvent, OfferingId, OfferingRepository, Reservation, ReservationEvent,
    ReservationId, ReservationRepository, User, UserEvent, UserId, UserRepository,
};
use crate::domain::{Aggregation, DataAccessError, Entity};

#[derive(Debug, Error)]
enum MemoryStoreError {
    #[error("{0} already exists")]
    AlreadyExists(String),
    #[error("{0} does not exist")]
    NotFound(String),
}

struct MemoryStore<A> {
    entities: RwLock<Vec<A>>,
}

impl<A: Aggregation> MemoryStore<A> {
    fn new() -> Self {
        Self {
            entities: RwLock::new(Vec::new()),
        }
    }

    async fn get(&self, id: A::Id) -> Option<A> {
        self.entities
            .read()
            .await
            .iter()
            .find(|e| e.id() == id)
            .cloned()
    }

    async fn find(&self, predicate: impl Fn(&A) -> bool) -> Vec<A> {
        self.entities
            .read()
            .await
            .iter()
            .filter(|e| predicate(e))
            .cloned()
            .collect()
    }

    async fn save(&self, entity: &mut A, created: fn(&A::Event) -> bool) -> Result<bool, DataAccessError> {
        let is_created = match entity.peek() {
            Some(event) => created(event),
            None => return Ok(false),
        };
        let name = format!("{}-{}", A::ENTITY_NAME, entity.id());
        let mut entities = self.entities.write().await;
        let position = entities.iter().position(|e| e.id() == entity.id());
        match (is_created, position) {
            (true, None) => {
                entity.clear();
                entities.push(entity.clone());
            }
            (false, Some(index)) => {
                entity.clear();
                entities[index] = entity.clone();
            }
            (true, Some(_)) => {
                return Err(DataAccessError::WriteError(Box::new(
                    MemoryStoreError::AlreadyExists(name),
                )))
            }
            (false, None) => {
                return Err(DataAccessError::WriteError(Box::new(
                    MemoryStoreError::NotFound(name),
                )))
            }
        }
        Ok(true)
    }

    async fn delete(&self, id: A::Id) -> bool {
        let mut entities = self.entities.write().await;
        let before = entities.len();
        entities.retain(|e| e.id() != id);
        entities.len() != before
    }
}

pub struct MemoryOfferingRepository(MemoryStore<Offering>);

impl MemoryOfferingRepository {
    pub fn new() -> Self {
        Self(MemoryStore::new())
    }
}

impl Default for MemoryOfferingRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OfferingRepository for MemoryOfferingRepository {
    async fn find_by_id(&self, id: OfferingId) -> Result<Option<Offering>, DataAccessError> {
        Ok(self.0.get(id).await)
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Offering>, DataAccessError> {
        Ok(self.0.find(|o| o.slug() == slug).await.into_iter().next())
    }

    async fn find_all(&self) -> Result<Vec<Offering>, DataAccessError> {
        let mut offerings = self.0.find(|_| true).await;
        offerings.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(offerings)
    }

    async fn save(&self, entity: &mut Offering) -> Result<bool, DataAccessError> {
        self.0
            .save(entity, |e| matches!(e, OfferingEvent::OfferingCreated { .. }))
            .await
    }

    async fn delete(&self, entity: &mut Offering) -> Result<bool, DataAccessError> {
        Ok(self.0.delete(entity.id()).await)
    }
}

pub struct MemoryReservationRepository(MemoryStore<Reservation>);

impl MemoryReservationRepository {
    pub fn new() -> Self {
        Self(MemoryStore::new())
    }
}

impl Default for MemoryReservationRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReservationRepository for MemoryReservationRepository {
    async fn find_by_id(&self, id: ReservationId) -> Result<Option<Reservation>, DataAccessError> {
        Ok(self.0.get(id).await)
    }

    async fn find_by_date(&self, date: NaiveDate) -> Result<Vec<Reservation>, DataAccessError> {
        let mut reservations = self.0.find(|r| r.date() == date).await;
        Reservation::sort(&mut reservations);
        Ok(reservations)
    }

    async fn find_all(&self) -> Result<Vec<Reservation>, DataAccessError> {
        let mut reservations = self.0.find(|_| true).await;
        Reservation::sort(&mut reservations);
        Ok(reservations)
    }

    async fn save(&self, entity: &mut Reservation) -> Result<bool, DataAccessError> {
        self.0
            .save(entity, |e| {
                matches!(e, ReservationEvent::ReservationCreated { .. })
            })
            .await
    }

    async fn delete(&self, entity: &mut Reservation) -> Result<bool, DataAccessError> {
        Ok(self.0.delete(entity.id()).await)
    }
}

pub struct MemoryUserRepository(MemoryStore<User>);

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self(MemoryStore::new())
    }
}

impl Default for MemoryUserRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, DataAccessError> {
        Ok(self.0.get(id).await)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, DataAccessError> {
        Ok(self
            .0
            .find(|u| u.username() == username)
            .await
            .into_iter()
            .next())
    }

    async fn find_all(&self) -> Result<Vec<User>, DataAccessError> {
        let mut users = self.0.find(|_| true).await;
        users.sort_by(|a, b| a.username().cmp(b.username()));
        Ok(users)
    }

    async fn save(&self, entity: &mut User) -> Result<bool, DataAccessError> {
        self.0
            .save(entity, |e| matches!(e, UserEvent::UserJoined { .. }))
            .await
    }

    async fn delete(&self, entity: &mut User) -> Result<bool, DataAccessError> {
        Ok(self.0.delete(entity.id()).await)
    }
}
