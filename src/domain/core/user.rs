use async_trait::async_trait;
use chrono::{DateTime, Utc};
use derive_more::{Deref, Display, Error, From, IntoIterator};
use serde::{Deserialize, Serialize};

use crate::domain::{Aggregation, DataAccessError, Entity, Event, EventQueue, Id};

/// ユーザーリポジトリ
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// IDでユーザーを検索する
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, DataAccessError>;
    /// ユーザー名でユーザーを検索する
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, DataAccessError>;
    /// 全ユーザーを取得する
    async fn find_all(&self) -> Result<Vec<User>, DataAccessError>;
    /// ユーザーを保存する
    async fn save(&self, entity: &mut User) -> Result<bool, DataAccessError>;
    /// ユーザーを削除する
    async fn delete(&self, entity: &mut User) -> Result<bool, DataAccessError>;
}

/// ユーザーID
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Deref, Default,
)]
pub struct UserId(u64);

impl Id for UserId {
    type Inner = u64;
}

/// ユーザーイベント
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserEvent {
    /// ユーザーが登録された
    UserJoined {
        id: UserId,
        username: String,
        email: String,
        password_hash: String,
        is_staff: bool,
        joined_at: DateTime<Utc>,
    },
    /// スタッフ権限が付与された
    StaffGranted { id: UserId },
    /// パスワードが変更された
    PasswordChanged { id: UserId, password_hash: String },
    /// ユーザーが削除された
    UserDeleted { id: UserId },
}

impl Event for UserEvent {
    type Id = UserId;

    fn is_terminal(&self) -> bool {
        matches!(self, UserEvent::UserDeleted { .. })
    }
}

/// ユーザーエンティティ
#[derive(Debug, Default, Clone, IntoIterator, Serialize, Deserialize)]
pub struct User {
    id: UserId,
    username: String,
    email: String,
    #[serde(skip)]
    password_hash: String,
    is_staff: bool,
    joined_at: DateTime<Utc>,
    #[serde(skip)]
    #[into_iterator]
    events: EventQueue<UserEvent>,
}

impl User {
    pub fn join(
        id: UserId,
        username: String,
        email: String,
        password_hash: String,
        is_staff: bool,
        joined_at: DateTime<Utc>,
    ) -> Result<Self, UserError> {
        Self::validate_joined(&username, &password_hash)?;
        let mut entity = User {
            id,
            username: username.clone(),
            email: email.clone(),
            password_hash: password_hash.clone(),
            is_staff,
            joined_at,
            ..Default::default()
        };
        entity.events.push(UserEvent::UserJoined {
            id,
            username,
            email,
            password_hash,
            is_staff,
            joined_at,
        });
        Ok(entity)
    }

    pub fn grant_staff(&mut self) -> Result<(), UserError> {
        if self.is_staff {
            return Err(UserError::AlreadyStaff);
        }
        self.is_staff = true;
        self.events.push(UserEvent::StaffGranted { id: self.id });
        Ok(())
    }

    pub fn change_password(&mut self, password_hash: String) -> Result<(), UserError> {
        Self::validate_password_hash(&password_hash)?;
        self.password_hash = password_hash.clone();
        self.events.push(UserEvent::PasswordChanged {
            id: self.id,
            password_hash,
        });
        Ok(())
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    pub fn is_staff(&self) -> bool {
        self.is_staff
    }

    pub fn joined_at(&self) -> DateTime<Utc> {
        self.joined_at
    }

    fn validate_id(&self, id: &UserId) -> Result<(), UserError> {
        match self.id == *id {
            true => Ok(()),
            false => Err(UserError::MismatchedId),
        }
    }

    fn validate_joined(username: &str, password_hash: &str) -> Result<(), UserError> {
        if username.trim().is_empty() {
            return Err(UserError::UsernameIsBlank);
        }
        Self::validate_password_hash(password_hash)
    }

    fn validate_password_hash(password_hash: &str) -> Result<(), UserError> {
        match password_hash.is_empty() {
            true => Err(UserError::PasswordHashIsBlank),
            false => Ok(()),
        }
    }
}

impl Entity for User {
    type Id = UserId;

    const ENTITY_NAME: &'static str = "user";

    fn id(&self) -> Self::Id {
        self.id
    }
}

impl Aggregation for User {
    type Event = UserEvent;
    type Error = UserError;

    fn validate(&self, event: &Self::Event) -> Result<(), Self::Error> {
        match event {
            UserEvent::UserJoined {
                username,
                password_hash,
                ..
            } => Self::validate_joined(username, password_hash),
            UserEvent::StaffGranted { id } => {
                self.validate_id(id)?;
                match self.is_staff {
                    true => Err(UserError::AlreadyStaff),
                    false => Ok(()),
                }
            }
            UserEvent::PasswordChanged { id, password_hash } => {
                self.validate_id(id)?;
                Self::validate_password_hash(password_hash)
            }
            UserEvent::UserDeleted { id } => self.validate_id(id),
        }
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            UserEvent::UserJoined {
                id,
                username,
                email,
                password_hash,
                is_staff,
                joined_at,
            } => {
                if self.id != id {
                    if let Ok(entity) =
                        Self::join(id, username, email, password_hash, is_staff, joined_at)
                    {
                        *self = entity;
                    }
                }
            }
            UserEvent::StaffGranted { id } => {
                if self.id == id {
                    if let Err(_e) = self.grant_staff() {}
                }
            }
            UserEvent::PasswordChanged { id, password_hash } => {
                if self.id == id {
                    if let Err(_e) = self.change_password(password_hash) {}
                }
            }
            UserEvent::UserDeleted { .. } => {}
        }
    }

    fn events(&self) -> &EventQueue<Self::Event> {
        &self.events
    }

    fn events_mut(&mut self) -> &mut EventQueue<Self::Event> {
        &mut self.events
    }
}

impl PartialEq for User {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.username == other.username
            && self.email == other.email
            && self.password_hash == other.password_hash
            && self.is_staff == other.is_staff
            && self.joined_at == other.joined_at
    }
}

impl Eq for User {}

/// ユーザーエラー
#[derive(Error, Display, Debug)]
pub enum UserError {
    #[display(fmt = "ID does not match")]
    MismatchedId,
    #[display(fmt = "Username cannot be blank")]
    UsernameIsBlank,
    #[display(fmt = "Password hash cannot be blank")]
    PasswordHashIsBlank,
    #[display(fmt = "User is already staff")]
    AlreadyStaff,
}
