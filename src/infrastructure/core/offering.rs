use async_trait::async_trait;
use eventstore::Client;

use crate::domain::core::{Offering, OfferingEvent, OfferingId, OfferingRepository};
use crate::domain::{DataAccessError, Entity};
use crate::infrastructure::{append, load, load_all, remove};

#[derive(Clone)]
pub struct EventStoreOfferingRepository {
    client: Client,
}

impl EventStoreOfferingRepository {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl OfferingRepository for EventStoreOfferingRepository {
    async fn find_by_id(&self, id: OfferingId) -> Result<Option<Offering>, DataAccessError> {
        load(&self.client, id).await
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Offering>, DataAccessError> {
        Ok(load_all::<Offering>(&self.client)
            .await?
            .into_iter()
            .find(|o| o.slug() == slug))
    }

    async fn find_all(&self) -> Result<Vec<Offering>, DataAccessError> {
        let mut offerings = load_all::<Offering>(&self.client).await?;
        offerings.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(offerings)
    }

    async fn save(&self, entity: &mut Offering) -> Result<bool, DataAccessError> {
        append(&self.client, entity, |e| {
            matches!(e, OfferingEvent::OfferingCreated { .. })
        })
        .await
    }

    async fn delete(&self, entity: &mut Offering) -> Result<bool, DataAccessError> {
        let deleted = OfferingEvent::OfferingDeleted { id: entity.id() };
        remove(&self.client, entity, deleted).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::core::Money;
    use crate::domain::ID_GENERATOR;

    fn client() -> Client {
        let settings = "esdb://localhost:2113?tls=false".parse().unwrap();
        Client::new(settings).unwrap()
    }

    #[tokio::test]
    #[ignore = "requires a running EventStoreDB"]
    async fn test_save_and_find() {
        let repository = EventStoreOfferingRepository::new(client());
        let id = ID_GENERATOR.generate();
        let slug = format!("test-{}", id);
        let mut offering =
            Offering::create(id, slug.clone(), "Prueba".to_owned(), 40, Money::eur(2800)).unwrap();
        let expected = offering.clone();
        assert!(repository.save(&mut offering).await.unwrap());
        assert!(!repository.save(&mut offering).await.unwrap());

        let found = repository.find_by_id(id).await.unwrap();
        assert_eq!(found, Some(expected));

        offering.change_price(Money::eur(3000));
        repository.save(&mut offering).await.unwrap();
        let found = repository.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(found.price(), &Money::eur(3000));

        assert!(repository.delete(&mut offering).await.unwrap());
        assert_eq!(repository.find_by_id(id).await.unwrap(), None);
    }
}
