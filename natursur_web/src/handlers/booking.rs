use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Form, Json, Router,
};
use natursur::application::{booking::BookingError, form::ReservationForm};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{error::AppResult, session::CurrentUser, state::AppState};

use super::public::render_home;

pub fn build_booking_routers() -> Router<AppState> {
    Router::new()
        .route("/reservar/", get(booking_redirect).post(submit_reservation))
        .route("/api/available-times/", get(available_times))
}

async fn booking_redirect() -> Redirect {
    Redirect::to("/")
}

async fn submit_reservation(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(form): Form<ReservationForm>,
) -> AppResult<Response> {
    let reservation = match state.services.booking.submit(&form).await {
        Ok(reservation) => reservation,
        Err(BookingError::Invalid(errors)) => {
            let page = render_home(&state, &user, &form, &errors).await?;
            return Ok(Html(page).into_response());
        }
        Err(e) => return Err(e.into()),
    };

    let notifier = &state.services.notifier;
    notifier.studio_notice(&reservation).await;
    if let Err(e) = notifier.booking_confirmation(&reservation).await {
        if !state.debug() {
            return Err(e.into());
        }
        warn!("予約確認メールを送信できませんでした: {}", e);
    }
    Ok(Redirect::to("/reserva-exito/").into_response())
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AvailableTimesQuery {
    pub offering: String,
    pub date: String,
}

#[derive(Debug, Serialize)]
pub struct AvailableTimes {
    pub times: Vec<String>,
}

/// 予約フォームから呼ばれる空き枠 API
async fn available_times(
    State(state): State<AppState>,
    Query(query): Query<AvailableTimesQuery>,
) -> Json<AvailableTimes> {
    let times = state
        .services
        .booking
        .available_times(&query.offering, &query.date)
        .await;
    Json(AvailableTimes { times })
}
