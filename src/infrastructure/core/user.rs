use async_trait::async_trait;
use eventstore::Client;

use crate::domain::core::{User, UserEvent, UserId, UserRepository};
use crate::domain::{DataAccessError, Entity};
use crate::infrastructure::{append, load, load_all, remove};

#[derive(Clone)]
pub struct EventStoreUserRepository {
    client: Client,
}

impl EventStoreUserRepository {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl UserRepository for EventStoreUserRepository {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, DataAccessError> {
        load(&self.client, id).await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, DataAccessError> {
        Ok(load_all::<User>(&self.client)
            .await?
            .into_iter()
            .find(|u| u.username() == username))
    }

    async fn find_all(&self) -> Result<Vec<User>, DataAccessError> {
        let mut users = load_all::<User>(&self.client).await?;
        users.sort_by(|a, b| a.username().cmp(b.username()));
        Ok(users)
    }

    async fn save(&self, entity: &mut User) -> Result<bool, DataAccessError> {
        append(&self.client, entity, |e| matches!(e, UserEvent::UserJoined { .. })).await
    }

    async fn delete(&self, entity: &mut User) -> Result<bool, DataAccessError> {
        let deleted = UserEvent::UserDeleted { id: entity.id() };
        remove(&self.client, entity, deleted).await
    }
}
