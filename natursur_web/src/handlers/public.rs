use axum::{
    extract::State,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use natursur::application::{
    feed::HOME_VIDEO_LIMIT,
    form::{ContactForm, FormErrors, ReservationForm},
};
use tracing::{info, warn};

use crate::{error::AppResult, pages, session::CurrentUser, state::AppState};

use super::context;

pub fn build_public_routers() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/reserva-exito/", get(booking_success))
        .route("/tienda/", get(shop))
        .route("/faq/", get(faq))
        .route("/estudio-corporal/", get(estudio_corporal))
        .route("/unete-al-equipo/", get(unete))
        .route("/contacto/", get(contact_form).post(contact_submit))
        .route("/healthz", get(health_check))
}

/// トップページ（予約フォームが不正なときもここで再表示する）
pub async fn render_home(
    state: &AppState,
    user: &CurrentUser,
    form: &ReservationForm,
    errors: &FormErrors,
) -> AppResult<String> {
    let offerings = state.services.booking.offerings().await?;
    let videos = state.services.feed.latest(HOME_VIDEO_LIMIT).await;
    Ok(pages::home(
        &context(state, &user.0),
        &offerings,
        form,
        errors,
        &videos,
    ))
}

async fn home(State(state): State<AppState>, user: CurrentUser) -> AppResult<Html<String>> {
    let page = render_home(
        &state,
        &user,
        &ReservationForm::default(),
        &FormErrors::new(),
    )
    .await?;
    Ok(Html(page))
}

async fn booking_success(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> Html<String> {
    Html(pages::booking_success(&context(&state, &user)))
}

async fn shop(State(state): State<AppState>) -> Redirect {
    Redirect::to(&state.config.studio.shop_url)
}

async fn faq(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> Html<String> {
    Html(pages::faq(&context(&state, &user)))
}

async fn estudio_corporal(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> Html<String> {
    Html(pages::estudio_corporal(&context(&state, &user)))
}

async fn unete(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> Html<String> {
    Html(pages::unete(&context(&state, &user)))
}

async fn contact_form(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> Html<String> {
    Html(pages::contact(
        &context(&state, &user),
        &ContactForm::default(),
        &FormErrors::new(),
        false,
    ))
}

async fn contact_submit(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Form(form): Form<ContactForm>,
) -> AppResult<Response> {
    let ctx = context(&state, &user);
    if let Err(errors) = form.clean() {
        return Ok(Html(pages::contact(&ctx, &form, &errors, false)).into_response());
    }
    match state.services.notifier.forward_contact(&form).await {
        Ok(()) => info!("{} からの問い合わせを転送しました", form.email.trim()),
        Err(e) if state.debug() => warn!("問い合わせの転送に失敗しました: {}", e),
        Err(e) => return Err(e.into()),
    }
    Ok(Html(pages::contact(
        &ctx,
        &ContactForm::default(),
        &FormErrors::new(),
        true,
    ))
    .into_response())
}

async fn health_check() -> &'static str {
    "ok"
}
