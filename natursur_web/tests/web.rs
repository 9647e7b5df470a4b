use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use chrono::{Datelike, Duration, NaiveDate, Utc, Weekday};
use natursur::{
    application::{
        catalog::{seed_offerings, STUDIO_OFFERINGS},
        feed::NoVideos,
        notify::{Email, MailError, Mailer},
        Services,
    },
    domain::{core::UserRepository, Entity},
    infrastructure, NatursurConfig,
};
use natursur_web::{router, state::AppState};
use serde_json::Value;
use tower::ServiceExt;

#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<Email>>,
    fail: bool,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        if self.fail {
            return Err(MailError("smtp down".into()));
        }
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

struct TestApp {
    app: Router,
    state: AppState,
    mailer: Arc<RecordingMailer>,
    users: Arc<dyn UserRepository>,
}

async fn setup_with(config: NatursurConfig, mailer: RecordingMailer) -> TestApp {
    let repositories = infrastructure::memory_repositories();
    let users = repositories.users.clone();
    let mailer = Arc::new(mailer);
    let services = Services::new(&config, repositories, mailer.clone(), Arc::new(NoVideos));
    seed_offerings(services.offerings.as_ref(), &STUDIO_OFFERINGS)
        .await
        .unwrap();
    services
        .accounts
        .ensure_admin("admin", "admin@example.com", "adminpass", Utc::now())
        .await
        .unwrap();
    let state = AppState::new(config, services);
    TestApp {
        app: router(state.clone()),
        state,
        mailer,
        users,
    }
}

fn test_config() -> NatursurConfig {
    let mut config = NatursurConfig::default();
    config.server.allowed_hosts = "*".to_owned();
    config.server.debug = false;
    config
}

async fn setup() -> TestApp {
    setup_with(test_config(), RecordingMailer::default()).await
}

impl TestApp {
    async fn get(&self, uri: &str, cookie: Option<&str>) -> Response {
        let mut request = Request::builder().uri(uri).header(header::HOST, "localhost");
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        self.app
            .clone()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn post(&self, uri: &str, form: &str, cookie: Option<&str>) -> Response {
        let mut request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::HOST, "localhost")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        self.app
            .clone()
            .oneshot(request.body(Body::from(form.to_owned())).unwrap())
            .await
            .unwrap()
    }

    async fn offering_id(&self, slug: &str) -> u64 {
        let offerings = self.state.services.booking.offerings().await.unwrap();
        let offering = offerings.iter().find(|o| o.slug() == slug).unwrap();
        *offering.id()
    }

    /// スタッフとしてログインした Cookie
    async fn login(&self, username: &str, password: &str) -> String {
        let response = self
            .post(
                "/accounts/login/",
                &format!("username={}&password={}", username, password),
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        session_cookie(&response)
    }
}

async fn body_text(response: Response) -> String {
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
}

fn session_cookie(response: &Response) -> String {
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    set_cookie.split(';').next().unwrap().to_owned()
}

/// 一週間以上先の平日
fn next_weekday(state: &AppState) -> NaiveDate {
    let mut date = state.services.booking.now().date() + Duration::days(7);
    while matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
        date += Duration::days(1);
    }
    date
}

fn next_saturday(state: &AppState) -> NaiveDate {
    let mut date = state.services.booking.now().date() + Duration::days(7);
    while date.weekday() != Weekday::Sat {
        date += Duration::days(1);
    }
    date
}

fn reservation_form(offering: u64, date: NaiveDate, time: &str) -> String {
    format!(
        "name=Ana&email=ana%40example.com&phone=691+355+682&offering={}&therapy=masaje&date={}&time={}&notes=",
        offering,
        date.format("%Y-%m-%d"),
        time.replace(':', "%3A")
    )
}

async fn times(app: &TestApp, offering: u64, date: NaiveDate) -> Vec<String> {
    let response = app
        .get(
            &format!(
                "/api/available-times/?offering={}&date={}",
                offering,
                date.format("%Y-%m-%d")
            ),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json: Value = serde_json::from_str(&body_text(response).await).unwrap();
    json["times"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t.as_str().unwrap().to_owned())
        .collect()
}

#[tokio::test]
async fn test_public_pages() {
    let app = setup().await;
    for uri in [
        "/",
        "/reserva-exito/",
        "/faq/",
        "/estudio-corporal/",
        "/unete-al-equipo/",
        "/contacto/",
        "/accounts/login/",
        "/accounts/signup/",
        "/healthz",
    ] {
        let response = app.get(uri, None).await;
        assert_eq!(response.status(), StatusCode::OK, "{}", uri);
    }
    let home = body_text(app.get("/", None).await).await;
    assert!(home.contains("Reserva tu cita"));
    assert!(home.contains("Domicilio 60&#x27;"));
}

#[tokio::test]
async fn test_redirects() {
    let app = setup().await;
    let response = app.get("/tienda/", None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), app.state.config.studio.shop_url);

    let response = app.get("/reservar/", None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
}

#[tokio::test]
async fn test_available_times_api() {
    let app = setup().await;
    let sixty = app.offering_id("sesion-60").await;
    let date = next_weekday(&app.state);

    let slots = times(&app, sixty, date).await;
    assert_eq!(slots.first().map(String::as_str), Some("09:00"));
    assert_eq!(slots.last().map(String::as_str), Some("17:00"));
    assert_eq!(slots.len(), 17);

    assert!(times(&app, sixty, next_saturday(&app.state)).await.is_empty());

    for uri in [
        "/api/available-times/",
        "/api/available-times/?offering=abc&date=2099-01-05",
        "/api/available-times/?offering=999999&date=2099-01-05",
        "/api/available-times/?offering=1&date=05/01/2099",
    ] {
        let response = app.get(uri, None).await;
        assert_eq!(response.status(), StatusCode::OK, "{}", uri);
        let json: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json, serde_json::json!({ "times": [] }), "{}", uri);
    }
}

#[tokio::test]
async fn test_booking_flow() {
    let app = setup().await;
    let sixty = app.offering_id("sesion-60").await;
    let date = next_weekday(&app.state);

    let response = app.post("/reservar/", &reservation_form(sixty, date, "10:00"), None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/reserva-exito/");

    {
        let sent = app.mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].to, "info@natursur.com");
        assert_eq!(sent[1].to, "ana@example.com");
        assert!(sent[1].text.contains("Servicio: Sesión 60'"));
        assert!(sent[1].text.contains("Hora: 10:00"));
    }

    let slots = times(&app, sixty, date).await;
    assert!(slots.contains(&"09:00".to_owned()));
    assert!(!slots.contains(&"09:30".to_owned()));
    assert!(!slots.contains(&"10:00".to_owned()));
    assert!(!slots.contains(&"10:30".to_owned()));
    assert!(slots.contains(&"11:00".to_owned()));

    let response = app.post("/reservar/", &reservation_form(sixty, date, "10:30"), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = body_text(response).await;
    assert!(page.contains("Ese horario ya está reservado"));
    assert_eq!(app.state.services.booking.reservations().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_booking_validation_errors() {
    let app = setup().await;
    let sixty = app.offering_id("sesion-60").await;

    let saturday = next_saturday(&app.state);
    let response = app.post("/reservar/", &reservation_form(sixty, saturday, "10:00"), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Los fines de semana no hay servicio"));

    let date = next_weekday(&app.state);
    let form = reservation_form(sixty, date, "10:00").replace("691+355+682", "12345");
    let response = app.post("/reservar/", &form, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Introduce un teléfono válido"));

    let form = format!(
        "name=Ana&email=ana%40example.com&phone=691355682&offering={}&date=%2B262143-12-31&time=23%3A30",
        sixty
    );
    let response = app.post("/reservar/", &form, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Introduce una fecha válida"));

    assert!(app.state.services.booking.reservations().await.unwrap().is_empty());
    assert!(app.mailer.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_confirmation_failure() {
    let failing = || RecordingMailer {
        fail: true,
        ..Default::default()
    };
    let app = setup_with(test_config(), failing()).await;
    let sixty = app.offering_id("sesion-60").await;
    let date = next_weekday(&app.state);
    let response = app.post("/reservar/", &reservation_form(sixty, date, "10:00"), None).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let mut config = test_config();
    config.server.debug = true;
    let app = setup_with(config, failing()).await;
    let sixty = app.offering_id("sesion-60").await;
    let response = app.post("/reservar/", &reservation_form(sixty, date, "10:00"), None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/reserva-exito/");
}

#[tokio::test]
async fn test_contact_form() {
    let app = setup().await;
    let response = app
        .post(
            "/contacto/",
            "name=Ana&email=ana%40example.com&phone=691355682&message=Hola",
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("hemos recibido tu mensaje"));
    let sent = app.mailer.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].reply_to.as_deref(), Some("ana@example.com"));
}

#[tokio::test]
async fn test_panel_requires_staff() {
    let app = setup().await;

    let response = app.get("/panel/", None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/accounts/login/?next=%2Fpanel%2F");

    let response = app
        .post(
            "/accounts/signup/",
            "username=cliente&email=cliente%40example.com&password1=contrasena1&password2=contrasena1",
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let client = session_cookie(&response);
    let response = app.get("/panel/reservas/", Some(&client)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .post("/accounts/login/?next=/panel/", "username=admin&password=adminpass", None)
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/panel/");
    let admin = session_cookie(&response);
    let response = app.get("/panel/", Some(&admin)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = body_text(response).await;
    assert!(page.contains(r#"<strong id="clients-count">1</strong>"#));

    let response = app.post("/accounts/logout/", "", Some(&admin)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .contains("Max-Age=0"));
    let response = app.get("/panel/", Some(&admin)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_login_rejects_wrong_password_and_external_next() {
    let app = setup().await;
    let response = app
        .post("/accounts/login/", "username=admin&password=incorrecta", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Usuario o contraseña incorrectos."));

    let response = app
        .post(
            "/accounts/login/?next=//evil.example.com/",
            "username=admin&password=adminpass",
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
}

#[tokio::test]
async fn test_login_returns_to_page_with_query() {
    let app = setup().await;
    let response = app.get("/panel/reservas/?page=2", None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let login = location(&response).to_owned();
    assert_eq!(login, "/accounts/login/?next=%2Fpanel%2Freservas%2F%3Fpage%3D2");

    let page = body_text(app.get(&login, None).await).await;
    assert!(page.contains(r#"action="/accounts/login/?next=%2Fpanel%2Freservas%2F%3Fpage%3D2""#));

    let response = app
        .post(&login, "username=admin&password=adminpass", None)
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/panel/reservas/?page=2");
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(set_cookie.contains("Max-Age=1209600"));
}

#[tokio::test]
async fn test_admin_deletes() {
    let app = setup().await;
    let admin = app.login("admin", "adminpass").await;

    let sixty = app.offering_id("sesion-60").await;
    let date = next_weekday(&app.state);
    app.post("/reservar/", &reservation_form(sixty, date, "10:00"), None).await;
    let reservations = app.state.services.booking.reservations().await.unwrap();
    let id = *reservations[0].id();

    let page = body_text(app.get("/panel/reservas/", Some(&admin)).await).await;
    assert!(page.contains(&format!("/panel/reservas/{}/delete", id)));

    let response = app
        .post(&format!("/panel/reservas/{}/delete", id), "", Some(&admin))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/panel/reservas/");
    assert!(app.state.services.booking.reservations().await.unwrap().is_empty());

    let response = app
        .post(&format!("/panel/reservas/{}/delete", id), "", Some(&admin))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let admin_user = app.users.find_by_username("admin").await.unwrap().unwrap();
    let response = app
        .post(&format!("/panel/clientes/{}/delete", *admin_user.id()), "", Some(&admin))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    app.post(
        "/accounts/signup/",
        "username=cliente&email=cliente%40example.com&password1=contrasena1&password2=contrasena1",
        None,
    )
    .await;
    let client = app.users.find_by_username("cliente").await.unwrap().unwrap();
    let response = app
        .post(&format!("/panel/clientes/{}/delete", *client.id()), "", Some(&admin))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/panel/clientes/");
    assert!(app.state.services.accounts.clients().await.unwrap().is_empty());

    let response = app
        .post(&format!("/panel/clientes/{}/delete", *client.id()), "", Some(&admin))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_disallowed_host() {
    let mut config = test_config();
    config.server.allowed_hosts = "natursur.com,localhost".to_owned();
    let app = setup_with(config, RecordingMailer::default()).await;

    let response = app.get("/healthz", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let request = Request::builder()
        .uri("/healthz")
        .header(header::HOST, "evil.example.com")
        .body(Body::empty())
        .unwrap();
    let response = app.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
