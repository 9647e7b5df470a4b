pub mod error;
pub mod handlers;
pub mod pages;
pub mod session;
pub mod state;

use axum::{
    extract::State,
    http::{header, Request, StatusCode},
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    Router,
};
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tower_http::LatencyUnit;
use tracing::{warn, Level};

use self::{
    handlers::{
        account::build_account_routers, admin::build_admin_routers,
        booking::build_booking_routers, public::build_public_routers,
    },
    state::AppState,
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(build_public_routers())
        .merge(build_booking_routers())
        .merge(build_account_routers())
        .merge(build_admin_routers())
        .layer(middleware::from_fn_with_state(state.clone(), allowed_host))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::INFO)
                        .latency_unit(LatencyUnit::Millis),
                ),
        )
        .with_state(state)
}

/// Host ヘッダーからポートを除いた名前
fn host_name(host: &str) -> String {
    let name = match host.strip_prefix('[') {
        Some(rest) => rest.split(']').next().unwrap_or_default(),
        None => host.split(':').next().unwrap_or_default(),
    };
    name.trim().to_lowercase()
}

pub fn is_allowed_host(allowed: &[String], host: &str) -> bool {
    let host = host_name(host);
    allowed
        .iter()
        .any(|pattern| pattern == "*" || *pattern == host)
}

/// 許可されていない Host への要求は 400
async fn allowed_host<B>(
    State(state): State<AppState>,
    request: Request<B>,
    next: Next<B>,
) -> Response {
    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .or_else(|| request.uri().host())
        .unwrap_or_default()
        .to_owned();
    if is_allowed_host(&state.config.server.allowed_hosts(), &host) {
        return next.run(request).await;
    }
    warn!("許可されていないホストへのアクセス: {}", host);
    (
        StatusCode::BAD_REQUEST,
        Html(pages::error_page(StatusCode::BAD_REQUEST)),
    )
        .into_response()
}
