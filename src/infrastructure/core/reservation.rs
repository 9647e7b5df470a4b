use async_trait::async_trait;
use chrono::NaiveDate;
use eventstore::Client;

use crate::domain::core::{Reservation, ReservationEvent, ReservationId, ReservationRepository};
use crate::domain::{DataAccessError, Entity};
use crate::infrastructure::{append, load, load_all, remove};

#[derive(Clone)]
pub struct EventStoreReservationRepository {
    client: Client,
}

impl EventStoreReservationRepository {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ReservationRepository for EventStoreReservationRepository {
    async fn find_by_id(&self, id: ReservationId) -> Result<Option<Reservation>, DataAccessError> {
        load(&self.client, id).await
    }

    async fn find_by_date(&self, date: NaiveDate) -> Result<Vec<Reservation>, DataAccessError> {
        let mut reservations = load_all::<Reservation>(&self.client).await?;
        reservations.retain(|r| r.date() == date);
        Reservation::sort(&mut reservations);
        Ok(reservations)
    }

    async fn find_all(&self) -> Result<Vec<Reservation>, DataAccessError> {
        let mut reservations = load_all::<Reservation>(&self.client).await?;
        Reservation::sort(&mut reservations);
        Ok(reservations)
    }

    async fn save(&self, entity: &mut Reservation) -> Result<bool, DataAccessError> {
        append(&self.client, entity, |e| {
            matches!(e, ReservationEvent::ReservationCreated { .. })
        })
        .await
    }

    async fn delete(&self, entity: &mut Reservation) -> Result<bool, DataAccessError> {
        let deleted = ReservationEvent::ReservationDeleted { id: entity.id() };
        remove(&self.client, entity, deleted).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveTime, Utc};

    use super::*;
    use crate::domain::core::{Customer, Therapy};
    use crate::domain::ID_GENERATOR;

    fn client() -> Client {
        let settings = "esdb://localhost:2113?tls=false".parse().unwrap();
        Client::new(settings).unwrap()
    }

    #[tokio::test]
    #[ignore = "requires a running EventStoreDB"]
    async fn test_save_find_delete() {
        let repository = EventStoreReservationRepository::new(client());
        let id = ID_GENERATOR.generate();
        let date = NaiveDate::from_ymd_opt(2031, 3, 3).unwrap();
        let mut reservation = Reservation::create(
            id,
            Customer {
                name: "Ana".to_owned(),
                email: "ana@example.com".to_owned(),
                phone: "600111222".to_owned(),
            },
            None,
            Some(Therapy::Masaje),
            date,
            NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
            String::new(),
            Utc::now(),
        )
        .unwrap();
        let expected = reservation.clone();
        assert!(repository.save(&mut reservation).await.unwrap());
        assert_eq!(repository.find_by_id(id).await.unwrap(), Some(expected));
        assert!(repository
            .find_by_date(date)
            .await
            .unwrap()
            .iter()
            .any(|r| r.id() == id));

        assert!(repository.delete(&mut reservation).await.unwrap());
        assert_eq!(repository.find_by_id(id).await.unwrap(), None);
    }
}
