//! スタッフ用の管理画面

use axum::{
    extract::{Path, State},
    response::{Html, Redirect},
    routing::{get, post},
    Router,
};
use natursur::domain::core::{ReservationId, UserId};

use crate::{
    error::AppResult,
    pages::{self, Context, DashboardStats},
    session::StaffUser,
    state::AppState,
};

pub fn build_admin_routers() -> Router<AppState> {
    let routers = Router::new()
        .route("/", get(dashboard))
        .route("/reservas/", get(reservation_list))
        .route("/reservas/:id/delete", post(delete_reservation))
        .route("/clientes/", get(client_list))
        .route("/clientes/:id/delete", post(delete_client));
    Router::new().nest("/panel", routers)
}

fn context<'a>(state: &'a AppState, staff: &'a StaffUser) -> Context<'a> {
    Context {
        studio: &state.config.studio,
        user: Some(&staff.0),
    }
}

async fn dashboard(State(state): State<AppState>, staff: StaffUser) -> AppResult<Html<String>> {
    let now = state.services.booking.now();
    let reservations = state.services.booking.reservations().await?;
    let stats = DashboardStats {
        reservations: reservations.len(),
        today: reservations
            .iter()
            .filter(|r| r.date() == now.date())
            .count(),
        upcoming: reservations.iter().filter(|r| r.start() >= now).count(),
        clients: state.services.accounts.clients().await?.len(),
    };
    Ok(Html(pages::dashboard(&context(&state, &staff), &stats)))
}

async fn reservation_list(State(state): State<AppState>, staff: StaffUser) -> AppResult<Html<String>> {
    let reservations = state.services.booking.reservations().await?;
    let offerings = state.services.booking.offerings().await?;
    Ok(Html(pages::reservation_list(
        &context(&state, &staff),
        &reservations,
        &offerings,
    )))
}

async fn delete_reservation(
    State(state): State<AppState>,
    _staff: StaffUser,
    Path(id): Path<u64>,
) -> AppResult<Redirect> {
    state
        .services
        .booking
        .delete(ReservationId::from(id))
        .await?;
    Ok(Redirect::to("/panel/reservas/"))
}

async fn client_list(State(state): State<AppState>, staff: StaffUser) -> AppResult<Html<String>> {
    let clients = state.services.accounts.clients().await?;
    Ok(Html(pages::client_list(&context(&state, &staff), &clients)))
}

async fn delete_client(
    State(state): State<AppState>,
    staff: StaffUser,
    Path(id): Path<u64>,
) -> AppResult<Redirect> {
    state
        .services
        .accounts
        .delete_client(&staff.0, UserId::from(id))
        .await?;
    Ok(Redirect::to("/panel/clientes/"))
}
