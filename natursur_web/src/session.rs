//! セッション Cookie とログイン状態の取り出し

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
};
use natursur::{
    application::account::{session_age, SessionToken},
    domain::core::User,
};
use tracing::warn;

use crate::{error::AppError, pages, state::AppState};

pub const SESSION_COOKIE: &str = "sessionid";
pub const LOGIN_URL: &str = "/accounts/login/";

/// Cookie ヘッダーからセッショントークンを取り出す
pub fn session_token(headers: &HeaderMap) -> Option<SessionToken> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| value.parse().ok())
}

/// ログイン時の Set-Cookie（サーバー側のセッションと同じ期限）
pub fn session_cookie(token: SessionToken, secure: bool) -> HeaderValue {
    let mut cookie = format!(
        "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
        SESSION_COOKIE,
        token,
        session_age().num_seconds()
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).unwrap_or_else(|_| HeaderValue::from_static(""))
}

/// ログアウト時の Set-Cookie
pub fn clear_cookie() -> HeaderValue {
    HeaderValue::from_static("sessionid=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax")
}

/// ログイン中のユーザー（いなければ `None`）
pub struct CurrentUser(pub Option<User>);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(token) = session_token(&parts.headers) else {
            return Ok(CurrentUser(None));
        };
        let user = state.services.accounts.current_user(token).await?;
        Ok(CurrentUser(user))
    }
}

/// スタッフのみ
///
/// 未ログインはログイン画面へ、スタッフ以外は 403。
pub struct StaffUser(pub User);

pub enum StaffRejection {
    Login(String),
    Forbidden,
    Error(AppError),
}

impl IntoResponse for StaffRejection {
    fn into_response(self) -> Response {
        match self {
            StaffRejection::Login(next) => {
                Redirect::to(&format!("{}?next={}", LOGIN_URL, urlencoding::encode(&next)))
                    .into_response()
            }
            StaffRejection::Forbidden => (
                StatusCode::FORBIDDEN,
                Html(pages::error_page(StatusCode::FORBIDDEN)),
            )
                .into_response(),
            StaffRejection::Error(e) => e.into_response(),
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for StaffUser {
    type Rejection = StaffRejection;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state)
            .await
            .map_err(StaffRejection::Error)?;
        match user {
            Some(user) if user.is_staff() => Ok(StaffUser(user)),
            Some(user) => {
                warn!("{} が管理画面 {} にアクセスしようとしました", user.username(), parts.uri.path());
                Err(StaffRejection::Forbidden)
            }
            None => {
                let next = parts.uri.path_and_query().map_or("/", |p| p.as_str());
                Err(StaffRejection::Login(next.to_owned()))
            }
        }
    }
}

/// ログイン後の戻り先（サイト内のパスだけ許可）
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") => path,
        _ => "/",
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[test]
    fn test_session_token_from_cookie_header() {
        let token = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("csrftoken=abc; sessionid={}; theme=dark", token)).unwrap(),
        );
        assert_eq!(session_token(&headers), Some(token));

        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("sessionid=garbage"));
        assert_eq!(session_token(&headers), None);
        assert_eq!(session_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_session_cookie_flags() {
        let token = Uuid::new_v4();
        let cookie = session_cookie(token, false);
        let cookie = cookie.to_str().unwrap();
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(!cookie.contains("Secure"));
        assert!(cookie.contains("; Max-Age=1209600;"));
        assert!(session_cookie(token, true).to_str().unwrap().ends_with("; Secure"));
    }

    #[test]
    fn test_safe_next() {
        assert_eq!(safe_next(Some("/panel/")), "/panel/");
        assert_eq!(safe_next(Some("//evil.example.com")), "/");
        assert_eq!(safe_next(Some("https://evil.example.com")), "/");
        assert_eq!(safe_next(None), "/");
    }
}
