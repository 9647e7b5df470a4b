use std::{collections::HashMap, sync::Arc};

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::info;
use uuid::Uuid;

use crate::domain::core::{User, UserError, UserId, UserRepository};
use crate::domain::{DataAccessError, Entity, ID_GENERATOR};

use super::form::{FormErrors, LoginForm, SignupForm};

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Invalid account form: {0}")]
    Invalid(FormErrors),
    #[error("User not found")]
    NotFound,
    #[error("Staff accounts cannot be deleted")]
    Protected,
    #[error("Password hashing failed: {0}")]
    Hash(String),
    #[error(transparent)]
    User(#[from] UserError),
    #[error(transparent)]
    DataAccess(#[from] DataAccessError),
}

impl From<argon2::password_hash::Error> for AccountError {
    fn from(value: argon2::password_hash::Error) -> Self {
        AccountError::Hash(value.to_string())
    }
}

/// セッショントークン
pub type SessionToken = Uuid;

/// セッションの有効期間（日）
pub const SESSION_AGE_DAYS: i64 = 14;

pub fn session_age() -> Duration {
    Duration::days(SESSION_AGE_DAYS)
}

#[derive(Copy, Clone, Debug)]
struct Session {
    user: UserId,
    issued_at: DateTime<Utc>,
}

impl Session {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.issued_at >= session_age()
    }
}

/// 利用者アカウントとセッション
pub struct AccountService {
    users: Arc<dyn UserRepository>,
    sessions: RwLock<HashMap<SessionToken, Session>>,
    /// ユーザー名の確認から保存までを直列にする
    registration: Mutex<()>,
}

impl AccountService {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self {
            users,
            sessions: RwLock::new(HashMap::new()),
            registration: Mutex::new(()),
        }
    }

    /// 新規登録してそのままログインする
    pub async fn signup(
        &self,
        form: &SignupForm,
        now: DateTime<Utc>,
    ) -> Result<(SessionToken, User), AccountError> {
        form.clean().map_err(AccountError::Invalid)?;
        let username = form.username.trim();
        let password_hash = hash_password(&form.password1)?;
        let user = {
            let _guard = self.registration.lock().await;
            if self.users.find_by_username(username).await?.is_some() {
                let mut errors = FormErrors::new();
                errors.add("username", "Ya existe un usuario con ese nombre.");
                return Err(AccountError::Invalid(errors));
            }
            let mut user = User::join(
                ID_GENERATOR.generate(),
                username.to_owned(),
                form.email.trim().to_owned(),
                password_hash,
                false,
                now,
            )?;
            self.users.save(&mut user).await?;
            user
        };
        info!("ユーザー {} が登録しました", user.username());
        let token = self.open_session(user.id(), now).await;
        Ok((token, user))
    }

    pub async fn login(&self, form: &LoginForm) -> Result<(SessionToken, User), AccountError> {
        form.clean().map_err(AccountError::Invalid)?;
        let user = self.users.find_by_username(form.username.trim()).await?;
        match user {
            Some(user) if verify_password(&form.password, user.password_hash()) => {
                let token = self.open_session(user.id(), Utc::now()).await;
                info!("ユーザー {} がログインしました", user.username());
                Ok((token, user))
            }
            _ => {
                let mut errors = FormErrors::new();
                errors.add_non_field("Usuario o contraseña incorrectos.");
                Err(AccountError::Invalid(errors))
            }
        }
    }

    pub async fn logout(&self, token: SessionToken) -> bool {
        self.sessions.write().await.remove(&token).is_some()
    }

    pub async fn current_user(&self, token: SessionToken) -> Result<Option<User>, DataAccessError> {
        self.current_user_at(token, Utc::now()).await
    }

    /// セッションのユーザー（期限切れや削除済みならセッションも消す）
    pub async fn current_user_at(
        &self,
        token: SessionToken,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, DataAccessError> {
        let Some(session) = self.sessions.read().await.get(&token).copied() else {
            return Ok(None);
        };
        if session.is_expired(now) {
            self.sessions.write().await.remove(&token);
            return Ok(None);
        }
        let user = self.users.find_by_id(session.user).await?;
        if user.is_none() {
            self.sessions.write().await.remove(&token);
        }
        Ok(user)
    }

    /// スタッフ以外のユーザー（新しい順）
    pub async fn clients(&self) -> Result<Vec<User>, DataAccessError> {
        let mut clients = self
            .users
            .find_all()
            .await?
            .into_iter()
            .filter(|u| !u.is_staff())
            .collect::<Vec<_>>();
        clients.sort_by(|a, b| b.joined_at().cmp(&a.joined_at()));
        Ok(clients)
    }

    /// 顧客アカウントを削除する
    ///
    /// 自分自身とスタッフは削除できない。予約はそのまま残る。
    pub async fn delete_client(&self, actor: &User, id: UserId) -> Result<User, AccountError> {
        let mut user = self
            .users
            .find_by_id(id)
            .await?
            .ok_or(AccountError::NotFound)?;
        if user.id() == actor.id() || user.is_staff() {
            return Err(AccountError::Protected);
        }
        if !self.users.delete(&mut user).await? {
            return Err(AccountError::NotFound);
        }
        self.sessions.write().await.retain(|_, session| session.user != id);
        info!("{} がユーザー {} を削除しました", actor.username(), user.username());
        Ok(user)
    }

    /// 管理者アカウントがなければ作る
    ///
    /// 作成した場合は `true`。既存のアカウントはそのまま。
    pub async fn ensure_admin(
        &self,
        username: &str,
        email: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, AccountError> {
        let _guard = self.registration.lock().await;
        if self.users.find_by_username(username).await?.is_some() {
            return Ok(false);
        }
        let mut user = User::join(
            ID_GENERATOR.generate(),
            username.to_owned(),
            email.to_owned(),
            hash_password(password)?,
            true,
            now,
        )?;
        self.users.save(&mut user).await?;
        Ok(true)
    }

    /// 期限切れのセッションを掃除してから発行する
    async fn open_session(&self, user: UserId, now: DateTime<Utc>) -> SessionToken {
        let token = Uuid::new_v4();
        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, session| !session.is_expired(now));
        sessions.insert(
            token,
            Session {
                user,
                issued_at: now,
            },
        );
        token
    }
}

fn hash_password(password: &str) -> Result<String, AccountError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}
