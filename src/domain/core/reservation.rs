use std::{fmt, ops::Range, str::FromStr};

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use derive_more::{Deref, Display, Error, From, IntoIterator};
use serde::{Deserialize, Serialize};

use crate::domain::{Aggregation, DataAccessError, Entity, Event, EventQueue, Id};

use super::OfferingId;

/// メニュー未指定の予約の所要時間（分）
pub const DEFAULT_DURATION_MINUTES: u32 = 60;

/// 予約リポジトリ
#[async_trait]
pub trait ReservationRepository: Send + Sync {
    /// IDで予約を検索する
    async fn find_by_id(&self, id: ReservationId) -> Result<Option<Reservation>, DataAccessError>;
    /// 指定日の予約を検索する
    async fn find_by_date(&self, date: NaiveDate) -> Result<Vec<Reservation>, DataAccessError>;
    /// 全予約を取得する
    async fn find_all(&self) -> Result<Vec<Reservation>, DataAccessError>;
    /// 予約を保存する
    async fn save(&self, entity: &mut Reservation) -> Result<bool, DataAccessError>;
    /// 予約を削除する
    async fn delete(&self, entity: &mut Reservation) -> Result<bool, DataAccessError>;
}

/// 予約ID
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Deref, Default,
)]
pub struct ReservationId(u64);

impl Id for ReservationId {
    type Inner = u64;
}

/// 予約イベント
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationEvent {
    /// 予約が作成された
    ReservationCreated {
        id: ReservationId,
        customer: Customer,
        offering: Option<OfferingId>,
        therapy: Option<Therapy>,
        date: NaiveDate,
        time: NaiveTime,
        notes: String,
        created_at: DateTime<Utc>,
    },
    /// 予約が削除された
    ReservationDeleted { id: ReservationId },
}

impl Event for ReservationEvent {
    type Id = ReservationId;

    fn is_terminal(&self) -> bool {
        matches!(self, ReservationEvent::ReservationDeleted { .. })
    }
}

/// 予約エンティティ
#[derive(Debug, Default, Clone, IntoIterator, Serialize, Deserialize)]
pub struct Reservation {
    id: ReservationId,
    customer: Customer,
    offering: Option<OfferingId>,
    therapy: Option<Therapy>,
    date: NaiveDate,
    time: NaiveTime,
    notes: String,
    created_at: DateTime<Utc>,
    #[serde(skip)]
    #[into_iterator]
    events: EventQueue<ReservationEvent>,
}

impl Reservation {
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        id: ReservationId,
        customer: Customer,
        offering: Option<OfferingId>,
        therapy: Option<Therapy>,
        date: NaiveDate,
        time: NaiveTime,
        notes: String,
        created_at: DateTime<Utc>,
    ) -> Result<Self, ReservationError> {
        Self::validate_customer(&customer)?;
        let mut entity = Reservation {
            id,
            customer: customer.clone(),
            offering,
            therapy,
            date,
            time,
            notes: notes.clone(),
            created_at,
            ..Reservation::default()
        };
        entity.events.push(ReservationEvent::ReservationCreated {
            id,
            customer,
            offering,
            therapy,
            date,
            time,
            notes,
            created_at,
        });
        Ok(entity)
    }

    pub fn customer(&self) -> &Customer {
        &self.customer
    }

    pub fn offering(&self) -> Option<OfferingId> {
        self.offering
    }

    pub fn therapy(&self) -> Option<Therapy> {
        self.therapy
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn time(&self) -> NaiveTime {
        self.time
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn start(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }

    /// 終了時刻（日付の範囲を超える場合は `None`）
    pub fn end(&self, duration: Duration) -> Option<NaiveDateTime> {
        self.start().checked_add_signed(duration)
    }

    /// 予約が占有する時間帯 `[start, end)`
    ///
    /// 所要時間は現在のメニューから決まるので呼び出し側が渡す。
    pub fn interval(&self, duration: Duration) -> Option<Range<NaiveDateTime>> {
        Some(self.start()..self.end(duration)?)
    }

    /// 一覧の表示順（日付の降順、時刻の昇順）
    pub fn sort(reservations: &mut [Reservation]) {
        reservations.sort_by(|a, b| b.date.cmp(&a.date).then(a.time.cmp(&b.time)));
    }

    fn validate_id(&self, id: &ReservationId) -> Result<(), ReservationError> {
        if self.id != *id {
            return Err(ReservationError::MismatchedId);
        }
        Ok(())
    }

    fn validate_customer(customer: &Customer) -> Result<(), ReservationError> {
        if customer.name.trim().is_empty() {
            return Err(ReservationError::CustomerNameRequired);
        }
        if customer.email.trim().is_empty() {
            return Err(ReservationError::CustomerEmailRequired);
        }
        if customer.phone.trim().is_empty() {
            return Err(ReservationError::CustomerPhoneRequired);
        }
        Ok(())
    }
}

impl Entity for Reservation {
    type Id = ReservationId;

    const ENTITY_NAME: &'static str = "reservation";

    fn id(&self) -> Self::Id {
        self.id
    }
}

impl Aggregation for Reservation {
    type Event = ReservationEvent;
    type Error = ReservationError;

    fn validate(&self, event: &Self::Event) -> Result<(), Self::Error> {
        match event {
            ReservationEvent::ReservationCreated { customer, .. } => {
                Self::validate_customer(customer)
            }
            ReservationEvent::ReservationDeleted { id } => self.validate_id(id),
        }
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            ReservationEvent::ReservationCreated {
                id,
                customer,
                offering,
                therapy,
                date,
                time,
                notes,
                created_at,
            } => {
                if self.id != id {
                    if let Ok(entity) = Self::create(
                        id, customer, offering, therapy, date, time, notes, created_at,
                    ) {
                        *self = entity;
                    }
                }
            }
            ReservationEvent::ReservationDeleted { .. } => {}
        }
    }

    fn events(&self) -> &EventQueue<Self::Event> {
        &self.events
    }

    fn events_mut(&mut self) -> &mut EventQueue<Self::Event> {
        &mut self.events
    }
}

impl PartialEq for Reservation {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.customer == other.customer
            && self.offering == other.offering
            && self.therapy == other.therapy
            && self.date == other.date
            && self.time == other.time
            && self.notes == other.notes
            && self.created_at == other.created_at
    }
}

impl Eq for Reservation {}

impl fmt::Display for Reservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} {})",
            self.customer.name,
            self.date.format("%Y-%m-%d"),
            self.time.format("%H:%M")
        )
    }
}

/// 予約エラー
#[derive(Error, Display, Debug)]
pub enum ReservationError {
    /// IDが一致しません
    #[display(fmt = "ID does not match")]
    MismatchedId,
    /// お客様の名前が指定されていません
    #[display(fmt = "Customer name is not specified")]
    CustomerNameRequired,
    /// お客様のメールアドレスが指定されていません
    #[display(fmt = "Customer email is not specified")]
    CustomerEmailRequired,
    /// お客様の電話番号が指定されていません
    #[display(fmt = "Customer phone is not specified")]
    CustomerPhoneRequired,
}

/// 予約したお客様
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Customer {
    pub name: String,
    pub email: String,
    pub phone: String,
}

/// 施術の種類
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Therapy {
    /// マッサージ・整骨
    Masaje,
    /// バイオマグネティズム
    Biomagnetico,
    /// エモーショナルテクニック
    Emocionales,
    /// 栄養指導
    Nutricional,
}

impl Therapy {
    pub const ALL: [Therapy; 4] = [
        Therapy::Masaje,
        Therapy::Biomagnetico,
        Therapy::Emocionales,
        Therapy::Nutricional,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            Therapy::Masaje => "masaje",
            Therapy::Biomagnetico => "biomagnetico",
            Therapy::Emocionales => "emocionales",
            Therapy::Nutricional => "nutricional",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Therapy::Masaje => "Masaje y Osteopatía",
            Therapy::Biomagnetico => "Par Biomagnético",
            Therapy::Emocionales => "Técnicas Emocionales",
            Therapy::Nutricional => "Asesoramiento Nutricional y Estilo de Vida",
        }
    }
}

#[derive(Debug, Display, Error)]
#[display(fmt = "Unknown therapy")]
pub struct UnknownTherapy;

impl FromStr for Therapy {
    type Err = UnknownTherapy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Therapy::ALL
            .into_iter()
            .find(|t| t.slug() == s)
            .ok_or(UnknownTherapy)
    }
}
