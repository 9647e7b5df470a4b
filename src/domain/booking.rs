//! 予約枠の計算
//!
//! 空き枠の一覧と、予約送信時の重複チェックは同じ [`overlaps`] 判定を使う。

use std::{collections::HashMap, ops::Range};

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use intervaltree::{Element, IntervalTree};

use super::core::{Offering, OfferingId, Reservation, ReservationId, DEFAULT_DURATION_MINUTES};
use super::Entity;

/// 半開区間 `[start, end)` 同士が重なるか
pub fn overlaps<T: PartialOrd>(a: &Range<T>, b: &Range<T>) -> bool {
    a.start < b.end && b.start < a.end
}

/// 営業時間
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BusinessHours {
    open: NaiveTime,
    close: NaiveTime,
    step: Duration,
    closed_days: Vec<Weekday>,
}

impl BusinessHours {
    pub fn new(open: NaiveTime, close: NaiveTime, step: Duration, closed_days: Vec<Weekday>) -> Self {
        Self {
            open,
            close,
            step,
            closed_days,
        }
    }

    pub fn open(&self) -> NaiveTime {
        self.open
    }

    pub fn close(&self) -> NaiveTime {
        self.close
    }

    pub fn is_open_on(&self, date: NaiveDate) -> bool {
        !self.closed_days.contains(&date.weekday())
    }

    /// 時間帯が営業時間内に収まるか
    pub fn contains(&self, interval: &Range<NaiveDateTime>) -> bool {
        let date = interval.start.date();
        interval.start >= date.and_time(self.open) && interval.end <= date.and_time(self.close)
    }

    /// 開始候補時刻（終了が閉店時刻を超えないもの）
    pub fn candidates(&self, date: NaiveDate, duration: Duration) -> Vec<NaiveDateTime> {
        let mut slots = Vec::new();
        if self.step <= Duration::zero() {
            return slots;
        }
        let last_start = date.and_time(self.close) - duration;
        let mut current = date.and_time(self.open);
        while current <= last_start {
            slots.push(current);
            current += self.step;
        }
        slots
    }
}

impl Default for BusinessHours {
    /// 平日 09:00〜18:00、30分刻み
    fn default() -> Self {
        Self::new(
            NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
            NaiveTime::from_hms_opt(18, 0, 0).unwrap_or_default(),
            Duration::minutes(30),
            vec![Weekday::Sat, Weekday::Sun],
        )
    }
}

/// メニューごとの現在の所要時間
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Durations(HashMap<OfferingId, Duration>);

impl Durations {
    pub fn new<'a, I>(offerings: I) -> Self
    where
        I: IntoIterator<Item = &'a Offering>,
    {
        offerings
            .into_iter()
            .map(|o| (o.id(), o.duration()))
            .collect()
    }

    /// 予約の所要時間（メニューなし・削除済みは既定の60分）
    pub fn of(&self, reservation: &Reservation) -> Duration {
        reservation
            .offering()
            .and_then(|id| self.0.get(&id).copied())
            .unwrap_or_else(|| Duration::minutes(DEFAULT_DURATION_MINUTES as i64))
    }
}

impl FromIterator<(OfferingId, Duration)> for Durations {
    fn from_iter<T: IntoIterator<Item = (OfferingId, Duration)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// ある一日の予約台帳
pub struct DayBook {
    date: NaiveDate,
    tree: IntervalTree<NaiveDateTime, ReservationId>,
}

impl DayBook {
    /// 指定日以外の予約は無視する
    pub fn new<'a, I>(date: NaiveDate, reservations: I, durations: &Durations) -> Self
    where
        I: IntoIterator<Item = &'a Reservation>,
    {
        let tree = reservations
            .into_iter()
            .filter(|r| r.date() == date)
            .filter_map(|r| {
                Some(Element {
                    range: r.interval(durations.of(r))?,
                    value: r.id(),
                })
            })
            .collect::<IntervalTree<_, _>>();
        Self { date, tree }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// 時間帯と重なる既存予約を返す（`except` は編集中の予約）
    pub fn conflict(
        &self,
        interval: &Range<NaiveDateTime>,
        except: Option<ReservationId>,
    ) -> Option<ReservationId> {
        if interval.start >= interval.end {
            return None;
        }
        self.tree
            .query(interval.clone())
            .filter(|e| overlaps(&e.range, interval))
            .map(|e| e.value)
            .find(|id| Some(*id) != except)
    }

    /// 空き枠の開始時刻
    ///
    /// 当日の場合は `now` より前の枠を除く。定休日は空。
    pub fn available_slots(
        &self,
        hours: &BusinessHours,
        duration: Duration,
        now: NaiveDateTime,
    ) -> Vec<NaiveTime> {
        if !hours.is_open_on(self.date) || duration <= Duration::zero() {
            return Vec::new();
        }
        let same_day = now.date() == self.date;
        hours
            .candidates(self.date, duration)
            .into_iter()
            .filter(|start| !same_day || *start >= now)
            .filter(|start| self.conflict(&(*start..*start + duration), None).is_none())
            .map(|start| start.time())
            .collect()
    }
}
