use axum::{
    extract::{Query, State},
    http::{header, HeaderMap},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use chrono::Utc;
use natursur::application::{
    account::AccountError,
    form::{FormErrors, LoginForm, SignupForm},
};
use serde::Deserialize;

use crate::{
    error::AppResult,
    pages,
    session::{clear_cookie, safe_next, session_cookie, session_token, CurrentUser},
    state::AppState,
};

use super::context;

pub fn build_account_routers() -> Router<AppState> {
    let routers = Router::new()
        .route("/signup/", get(signup_form).post(signup))
        .route("/login/", get(login_form).post(login))
        .route("/logout/", get(logout).post(logout));
    Router::new().nest("/accounts", routers)
}

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

fn secure(state: &AppState) -> bool {
    state.config.server.tls.is_some()
}

async fn signup_form(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> Html<String> {
    Html(pages::signup(
        &context(&state, &user),
        &SignupForm::default(),
        &FormErrors::new(),
    ))
}

async fn signup(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Form(form): Form<SignupForm>,
) -> AppResult<Response> {
    match state.services.accounts.signup(&form, Utc::now()).await {
        Ok((token, _)) => Ok((
            [(header::SET_COOKIE, session_cookie(token, secure(&state)))],
            Redirect::to("/"),
        )
            .into_response()),
        Err(AccountError::Invalid(errors)) => {
            Ok(Html(pages::signup(&context(&state, &user), &form, &errors)).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

async fn login_form(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<NextQuery>,
) -> Html<String> {
    Html(pages::login(
        &context(&state, &user),
        &LoginForm::default(),
        &FormErrors::new(),
        safe_next(query.next.as_deref()),
    ))
}

async fn login(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<NextQuery>,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    let next = safe_next(query.next.as_deref());
    match state.services.accounts.login(&form).await {
        Ok((token, _)) => Ok((
            [(header::SET_COOKIE, session_cookie(token, secure(&state)))],
            Redirect::to(next),
        )
            .into_response()),
        Err(AccountError::Invalid(errors)) => Ok(Html(pages::login(
            &context(&state, &user),
            &form,
            &errors,
            next,
        ))
        .into_response()),
        Err(e) => Err(e.into()),
    }
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = session_token(&headers) {
        state.services.accounts.logout(token).await;
    }
    ([(header::SET_COOKIE, clear_cookie())], Redirect::to("/")).into_response()
}
