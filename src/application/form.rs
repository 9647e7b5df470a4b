//! フォーム入力の検査
//!
//! 画面に出すメッセージはスペイン語。

use std::{collections::BTreeMap, fmt, ops::RangeInclusive};

use chrono::{Datelike, NaiveDate, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::domain::core::{Customer, OfferingId, Therapy};

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}$").unwrap()
});

pub const PHONE_MIN_DIGITS: usize = 7;
pub const PHONE_MAX_DIGITS: usize = 15;
pub const PASSWORD_MIN_LENGTH: usize = 8;

const REQUIRED: &str = "Este campo es obligatorio.";

/// 電話番号の形式チェック
///
/// 空白・ハイフン・括弧・`+` を除いた残りが 7〜15 桁の数字であること。
pub fn validate_phone(phone: &str) -> bool {
    let digits = phone
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '+'))
        .collect::<String>();
    (PHONE_MIN_DIGITS..=PHONE_MAX_DIGITS).contains(&digits.len())
        && digits.chars().all(|c| c.is_ascii_digit())
}

/// メールアドレスの形式チェック
pub fn validate_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

/// フォームのエラー
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FormErrors {
    fields: BTreeMap<String, Vec<String>>,
    non_field: Vec<String>,
}

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_owned())
            .or_default()
            .push(message.into());
    }

    pub fn add_non_field(&mut self, message: impl Into<String>) {
        self.non_field.push(message.into());
    }

    pub fn field(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn has(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn non_field(&self) -> &[String] {
        &self.non_field
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.non_field.is_empty()
    }

    /// エラーがなければ `Ok`
    pub fn into_result(self) -> Result<(), FormErrors> {
        match self.is_empty() {
            true => Ok(()),
            false => Err(self),
        }
    }

    fn require<'a>(&mut self, field: &str, value: &'a str) -> Option<&'a str> {
        let value = value.trim();
        if value.is_empty() {
            self.add(field, REQUIRED);
            None
        } else {
            Some(value)
        }
    }
}

impl fmt::Display for FormErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut messages = self
            .fields
            .iter()
            .flat_map(|(field, messages)| messages.iter().map(move |m| format!("{}: {}", field, m)))
            .chain(self.non_field.iter().cloned());
        if let Some(first) = messages.next() {
            write!(f, "{}", first)?;
        }
        for message in messages {
            write!(f, "; {}", message)?;
        }
        Ok(())
    }
}

/// 予約フォームの入力値
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReservationForm {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub offering: String,
    pub therapy: String,
    pub date: String,
    pub time: String,
    pub notes: String,
}

/// 検査済みの予約入力
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReservationInput {
    pub customer: Customer,
    pub offering: Option<OfferingId>,
    pub therapy: Option<Therapy>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub notes: String,
}

impl ReservationForm {
    /// 書式だけを検査する（営業日と重複は予約サービスで見る）
    pub fn clean(&self) -> Result<ReservationInput, FormErrors> {
        let mut errors = FormErrors::new();
        let name = errors.require("name", &self.name);
        let email = errors.require("email", &self.email);
        let phone = errors.require("phone", &self.phone);
        let date = errors.require("date", &self.date);
        let time = errors.require("time", &self.time);

        if let Some(email) = email {
            if !validate_email(email) {
                errors.add("email", "Introduce una dirección de correo electrónico válida.");
            }
        }
        if let Some(phone) = phone {
            if !validate_phone(phone) {
                errors.add(
                    "phone",
                    "Introduce un teléfono válido (solo dígitos, entre 7 y 15).",
                );
            }
        }
        let offering = match self.offering.trim() {
            "" => None,
            raw => match raw.parse::<u64>() {
                Ok(id) => Some(OfferingId::from(id)),
                Err(_) => {
                    errors.add("offering", "Selecciona un servicio válido.");
                    None
                }
            },
        };
        let therapy = match self.therapy.trim() {
            "" => None,
            raw => match raw.parse::<Therapy>() {
                Ok(therapy) => Some(therapy),
                Err(_) => {
                    errors.add("therapy", "Selecciona una opción válida.");
                    None
                }
            },
        };
        let date = date.and_then(|raw| match parse_date(raw) {
            Some(date) => Some(date),
            None => {
                errors.add("date", "Introduce una fecha válida.");
                None
            }
        });
        let time = time.and_then(|raw| match parse_time(raw) {
            Some(time) => Some(time),
            None => {
                errors.add("time", "Introduce una hora válida.");
                None
            }
        });

        match (name, email, phone, date, time) {
            (Some(name), Some(email), Some(phone), Some(date), Some(time)) if errors.is_empty() => {
                Ok(ReservationInput {
                    customer: Customer {
                        name: name.to_owned(),
                        email: email.to_owned(),
                        phone: phone.to_owned(),
                    },
                    offering,
                    therapy,
                    date,
                    time,
                    notes: self.notes.trim().to_owned(),
                })
            }
            _ => Err(errors),
        }
    }
}

/// 受け付ける年の範囲
pub const YEARS: RangeInclusive<i32> = 1900..=9999;

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .ok()
        .filter(|date| YEARS.contains(&date.year()))
}

pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
}

/// 新規登録フォーム
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct SignupForm {
    pub username: String,
    pub email: String,
    pub password1: String,
    pub password2: String,
}

impl SignupForm {
    /// ユーザー名の重複はアカウントサービスで見る
    pub fn clean(&self) -> Result<(), FormErrors> {
        let mut errors = FormErrors::new();
        errors.require("username", &self.username);
        if let Some(email) = errors.require("email", &self.email) {
            if !validate_email(email) {
                errors.add("email", "Introduce una dirección de correo electrónico válida.");
            }
        }
        if self.password1.is_empty() {
            errors.add("password1", REQUIRED);
        } else if self.password1.chars().count() < PASSWORD_MIN_LENGTH {
            errors.add(
                "password1",
                format!(
                    "La contraseña debe tener al menos {} caracteres.",
                    PASSWORD_MIN_LENGTH
                ),
            );
        }
        if self.password1 != self.password2 {
            errors.add("password2", "Las dos contraseñas no coinciden.");
        }
        errors.into_result()
    }
}

/// ログインフォーム
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

impl LoginForm {
    pub fn clean(&self) -> Result<(), FormErrors> {
        let mut errors = FormErrors::new();
        errors.require("username", &self.username);
        if self.password.is_empty() {
            errors.add("password", REQUIRED);
        }
        errors.into_result()
    }
}

/// 問い合わせフォーム
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub message: String,
}

impl ContactForm {
    pub fn clean(&self) -> Result<(), FormErrors> {
        let mut errors = FormErrors::new();
        errors.require("name", &self.name);
        if let Some(email) = errors.require("email", &self.email) {
            if !validate_email(email) {
                errors.add("email", "Introduce una dirección de correo electrónico válida.");
            }
        }
        if let Some(phone) = errors.require("phone", &self.phone) {
            if !validate_phone(phone) {
                errors.add(
                    "phone",
                    "Introduce un teléfono válido (solo dígitos, entre 7 y 15).",
                );
            }
        }
        errors.into_result()
    }
}
