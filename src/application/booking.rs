use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::domain::booking::{BusinessHours, DayBook, Durations};
use crate::domain::core::{
    Offering, OfferingId, OfferingRepository, Reservation, ReservationError, ReservationId,
    ReservationRepository,
};
use crate::domain::Entity;
use crate::domain::{DataAccessError, ID_GENERATOR};

use super::form::{parse_date, FormErrors, ReservationForm, ReservationInput};

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("Invalid reservation: {0}")]
    Invalid(FormErrors),
    #[error("Reservation not found")]
    NotFound,
    #[error(transparent)]
    Reservation(#[from] ReservationError),
    #[error(transparent)]
    DataAccess(#[from] DataAccessError),
}

/// 予約受付
pub struct BookingService {
    offerings: Arc<dyn OfferingRepository>,
    reservations: Arc<dyn ReservationRepository>,
    hours: BusinessHours,
    timezone: Tz,
    /// 重複チェックから保存までを直列にする
    lock: Mutex<()>,
}

impl BookingService {
    pub fn new(
        offerings: Arc<dyn OfferingRepository>,
        reservations: Arc<dyn ReservationRepository>,
        hours: BusinessHours,
        timezone: Tz,
    ) -> Self {
        Self {
            offerings,
            reservations,
            hours,
            timezone,
            lock: Mutex::new(()),
        }
    }

    pub fn hours(&self) -> &BusinessHours {
        &self.hours
    }

    /// スタジオの時間帯での現在時刻
    pub fn now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.timezone).naive_local()
    }

    pub async fn offerings(&self) -> Result<Vec<Offering>, DataAccessError> {
        self.offerings.find_all().await
    }

    pub async fn reservations(&self) -> Result<Vec<Reservation>, DataAccessError> {
        let mut reservations = self.reservations.find_all().await?;
        Reservation::sort(&mut reservations);
        Ok(reservations)
    }

    /// 空き枠 API 用
    ///
    /// 入力が不正でも保存先の障害でもエラーにせず空を返す。
    pub async fn available_times(&self, offering: &str, date: &str) -> Vec<String> {
        let Ok(offering) = offering.trim().parse::<u64>() else {
            return Vec::new();
        };
        let Some(date) = parse_date(date) else {
            return Vec::new();
        };
        match self
            .available_times_at(OfferingId::from(offering), date, self.now())
            .await
        {
            Ok(times) => times
                .into_iter()
                .map(|t| t.format("%H:%M").to_string())
                .collect(),
            Err(e) => {
                warn!("空き枠を計算できませんでした: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn available_times_at(
        &self,
        offering: OfferingId,
        date: NaiveDate,
        now: NaiveDateTime,
    ) -> Result<Vec<NaiveTime>, BookingError> {
        let offerings = self.offerings.find_all().await?;
        let offering = offerings
            .iter()
            .find(|o| o.id() == offering)
            .ok_or(BookingError::NotFound)?;
        let existing = self.reservations.find_by_date(date).await?;
        let book = DayBook::new(date, &existing, &Durations::new(&offerings));
        Ok(book.available_slots(&self.hours, offering.duration(), now))
    }

    pub async fn submit(&self, form: &ReservationForm) -> Result<Reservation, BookingError> {
        self.submit_at(form, self.now()).await
    }

    /// 予約を検査して保存する
    pub async fn submit_at(
        &self,
        form: &ReservationForm,
        now: NaiveDateTime,
    ) -> Result<Reservation, BookingError> {
        let input = form.clean().map_err(BookingError::Invalid)?;
        let offering = self.booked_offering(&input).await?;

        let _guard = self.lock.lock().await;
        let mut reservation = Reservation::create(
            ID_GENERATOR.generate(),
            input.customer,
            offering,
            input.therapy,
            input.date,
            input.time,
            input.notes,
            Utc::now(),
        )?;
        self.validate(&reservation, None, now)
            .await?
            .into_result()
            .map_err(BookingError::Invalid)?;
        self.reservations.save(&mut reservation).await?;
        info!("予約を受け付けました: {}", reservation);
        Ok(reservation)
    }

    /// 予約が入れられるかを検査する（`except` は編集中の予約）
    pub async fn validate(
        &self,
        reservation: &Reservation,
        except: Option<ReservationId>,
        now: NaiveDateTime,
    ) -> Result<FormErrors, DataAccessError> {
        let mut errors = FormErrors::new();
        let date = reservation.date();
        if date < now.date() {
            errors.add("date", "No se puede reservar en una fecha pasada.");
        } else if date == now.date() && reservation.start() < now {
            errors.add("time", "No se puede reservar en una hora pasada.");
        }
        if !self.hours.is_open_on(date) {
            errors.add("date", "Los fines de semana no hay servicio. Elige otro día.");
            return Ok(errors);
        }
        // 所要時間は現在のメニューから引く
        let durations = Durations::new(&self.offerings.find_all().await?);
        let Some(interval) = reservation.interval(durations.of(reservation)) else {
            errors.add("date", "Introduce una fecha válida.");
            return Ok(errors);
        };
        if !self.hours.contains(&interval) {
            errors.add_non_field(format!(
                "La reserva debe estar dentro del horario ({}-{}).",
                self.hours.open().format("%H:%M"),
                self.hours.close().format("%H:%M")
            ));
            return Ok(errors);
        }
        let existing = self.reservations.find_by_date(date).await?;
        let book = DayBook::new(date, &existing, &durations);
        if book.conflict(&interval, except).is_some() {
            errors.add_non_field("Ese horario ya está reservado. Por favor, elige otra hora.");
        }
        Ok(errors)
    }

    async fn booked_offering(
        &self,
        input: &ReservationInput,
    ) -> Result<Option<OfferingId>, BookingError> {
        let Some(id) = input.offering else {
            return Ok(None);
        };
        match self.offerings.find_by_id(id).await? {
            Some(offering) => Ok(Some(offering.id())),
            None => {
                let mut errors = FormErrors::new();
                errors.add("offering", "Selecciona un servicio válido.");
                Err(BookingError::Invalid(errors))
            }
        }
    }

    pub async fn delete(&self, id: ReservationId) -> Result<Reservation, BookingError> {
        let mut reservation = self
            .reservations
            .find_by_id(id)
            .await?
            .ok_or(BookingError::NotFound)?;
        if !self.reservations.delete(&mut reservation).await? {
            return Err(BookingError::NotFound);
        }
        info!("予約を削除しました: {}", reservation);
        Ok(reservation)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveTime;

    use super::*;
    use crate::domain::core::{Customer, Money};
    use crate::infrastructure::memory::{MemoryOfferingRepository, MemoryReservationRepository};

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_time(NaiveTime::from_hms_opt(h, min, 0).unwrap())
    }

    async fn service() -> (BookingService, OfferingId) {
        let offerings = Arc::new(MemoryOfferingRepository::new());
        let mut sixty = Offering::create(
            OfferingId::from(60),
            "sesion-60".to_owned(),
            "Sesión 60'".to_owned(),
            60,
            Money::eur(4500),
        )
        .unwrap();
        offerings.save(&mut sixty).await.unwrap();
        let mut forty = Offering::create(
            OfferingId::from(40),
            "sesion-40".to_owned(),
            "Sesión 40'".to_owned(),
            40,
            Money::eur(2800),
        )
        .unwrap();
        offerings.save(&mut forty).await.unwrap();
        let service = BookingService::new(
            offerings,
            Arc::new(MemoryReservationRepository::new()),
            BusinessHours::default(),
            Tz::Europe__Madrid,
        );
        (service, sixty.id())
    }

    fn form(offering: &str, date: &str, time: &str) -> ReservationForm {
        ReservationForm {
            name: "María".to_owned(),
            email: "maria@example.com".to_owned(),
            phone: "691355682".to_owned(),
            offering: offering.to_owned(),
            therapy: String::new(),
            date: date.to_owned(),
            time: time.to_owned(),
            notes: String::new(),
        }
    }

    fn non_field(result: Result<Reservation, BookingError>) -> Vec<String> {
        match result {
            Err(BookingError::Invalid(errors)) => errors.non_field().to_vec(),
            other => panic!("unexpected result: {:?}", other.map(|r| r.to_string())),
        }
    }

    #[tokio::test]
    async fn test_submit_and_block_overlap() {
        let (service, _) = service().await;
        let now = at(2025, 12, 1, 9, 0);
        service
            .submit_at(&form("60", "2025-12-25", "10:00"), now)
            .await
            .unwrap();

        let errors = non_field(service.submit_at(&form("40", "2025-12-25", "10:30"), now).await);
        assert_eq!(errors.len(), 1);

        // 終了時刻ちょうどに始まる予約は重ならない
        service
            .submit_at(&form("40", "2025-12-25", "11:00"), now)
            .await
            .unwrap();
        assert_eq!(service.reservations().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_submit_without_offering_uses_default_duration() {
        let (service, _) = service().await;
        let now = at(2025, 12, 1, 9, 0);
        service
            .submit_at(&form("", "2025-12-25", "12:00"), now)
            .await
            .unwrap();
        let errors = non_field(service.submit_at(&form("40", "2025-12-25", "12:45"), now).await);
        assert!(!errors.is_empty());
    }

    #[tokio::test]
    async fn test_submit_rejects_weekend_and_past() {
        let (service, _) = service().await;
        let now = at(2025, 12, 20, 9, 0);
        match service.submit_at(&form("60", "2025-12-27", "10:00"), now).await {
            Err(BookingError::Invalid(errors)) => assert!(errors.has("date")),
            other => panic!("unexpected result: {:?}", other.is_ok()),
        }
        match service.submit_at(&form("60", "2025-12-19", "10:00"), now).await {
            Err(BookingError::Invalid(errors)) => assert!(errors.has("date")),
            other => panic!("unexpected result: {:?}", other.is_ok()),
        }
    }

    #[tokio::test]
    async fn test_submit_rejects_outside_hours() {
        let (service, _) = service().await;
        let now = at(2025, 12, 1, 9, 0);
        assert_eq!(
            non_field(service.submit_at(&form("60", "2025-12-25", "17:30"), now).await).len(),
            1
        );
        assert_eq!(
            non_field(service.submit_at(&form("60", "2025-12-25", "08:00"), now).await).len(),
            1
        );
    }

    #[tokio::test]
    async fn test_submit_unknown_offering() {
        let (service, _) = service().await;
        let now = at(2025, 12, 1, 9, 0);
        match service.submit_at(&form("999", "2025-12-25", "10:00"), now).await {
            Err(BookingError::Invalid(errors)) => assert!(errors.has("offering")),
            other => panic!("unexpected result: {:?}", other.is_ok()),
        }
    }

    #[tokio::test]
    async fn test_available_times_excludes_booked_slots() {
        let (service, sixty) = service().await;
        let now = at(2025, 12, 1, 9, 0);
        service
            .submit_at(&form("60", "2025-12-25", "10:00"), now)
            .await
            .unwrap();
        let day = NaiveDate::from_ymd_opt(2025, 12, 25).unwrap();
        let times = service
            .available_times_at(sixty, day, now)
            .await
            .unwrap()
            .iter()
            .map(|t| t.format("%H:%M").to_string())
            .collect::<Vec<_>>();
        assert_eq!(times.first().map(String::as_str), Some("09:00"));
        assert!(!times.contains(&"09:30".to_owned()));
        assert!(!times.contains(&"10:00".to_owned()));
        assert!(!times.contains(&"10:30".to_owned()));
        assert!(times.contains(&"11:00".to_owned()));
        assert_eq!(times.last().map(String::as_str), Some("17:00"));
    }

    #[tokio::test]
    async fn test_available_times_bad_input_is_empty() {
        let (service, _) = service().await;
        assert!(service.available_times("abc", "2099-01-05").await.is_empty());
        assert!(service.available_times("60", "mañana").await.is_empty());
        assert!(service.available_times("999", "2099-01-05").await.is_empty());
        // 2099-01-05 は月曜日
        assert_eq!(service.available_times("60", "2099-01-05").await.len(), 17);
        // 2099-01-03 は土曜日
        assert!(service.available_times("60", "2099-01-03").await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_only_that_reservation() {
        let (service, _) = service().await;
        let now = at(2025, 12, 1, 9, 0);
        let first = service
            .submit_at(&form("60", "2025-12-25", "10:00"), now)
            .await
            .unwrap();
        service
            .submit_at(&form("60", "2025-12-25", "12:00"), now)
            .await
            .unwrap();
        let removed = service.delete(first.id()).await.unwrap();
        assert_eq!(removed.id(), first.id());
        let remaining = service.reservations().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_ne!(remaining[0].id(), first.id());
        assert!(matches!(
            service.delete(first.id()).await,
            Err(BookingError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_validate_excludes_edited_record() {
        let (service, _) = service().await;
        let now = at(2025, 12, 1, 9, 0);
        let booked = service
            .submit_at(&form("60", "2025-12-25", "10:00"), now)
            .await
            .unwrap();
        assert!(!service.validate(&booked, None, now).await.unwrap().is_empty());
        assert!(service
            .validate(&booked, Some(booked.id()), now)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_duration_follows_current_offering() {
        let (service, sixty) = service().await;
        let now = at(2025, 12, 1, 9, 0);
        service
            .submit_at(&form("60", "2025-12-25", "10:00"), now)
            .await
            .unwrap();

        let mut offering = service.offerings.find_by_id(sixty).await.unwrap().unwrap();
        offering.change_duration(90).unwrap();
        service.offerings.save(&mut offering).await.unwrap();

        let day = NaiveDate::from_ymd_opt(2025, 12, 25).unwrap();
        let times = service
            .available_times_at(OfferingId::from(40), day, now)
            .await
            .unwrap()
            .iter()
            .map(|t| t.format("%H:%M").to_string())
            .collect::<Vec<_>>();
        assert!(!times.contains(&"11:00".to_owned()));
        assert!(times.contains(&"11:30".to_owned()));

        let errors = non_field(service.submit_at(&form("40", "2025-12-25", "11:00"), now).await);
        assert_eq!(errors.len(), 1);
        service
            .submit_at(&form("40", "2025-12-25", "11:30"), now)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_submit_rejects_date_beyond_calendar() {
        let (service, _) = service().await;
        let now = at(2025, 12, 1, 9, 0);
        match service
            .submit_at(&form("60", "+262143-12-31", "23:30"), now)
            .await
        {
            Err(BookingError::Invalid(errors)) => assert!(errors.has("date")),
            other => panic!("unexpected result: {:?}", other.is_ok()),
        }
        assert!(service.reservations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_validate_reservation_at_end_of_calendar() {
        let (service, _) = service().await;
        let now = at(2025, 12, 1, 9, 0);
        // NaiveDate::MAX は火曜日
        let reservation = Reservation::create(
            ID_GENERATOR.generate(),
            Customer {
                name: "María".to_owned(),
                email: "maria@example.com".to_owned(),
                phone: "691355682".to_owned(),
            },
            Some(OfferingId::from(60)),
            None,
            NaiveDate::MAX,
            NaiveTime::from_hms_opt(23, 30, 0).unwrap(),
            String::new(),
            Utc::now(),
        )
        .unwrap();
        let errors = service.validate(&reservation, None, now).await.unwrap();
        assert!(errors.has("date"));
    }
}
