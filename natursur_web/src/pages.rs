//! サーバー側で組み立てる HTML

use std::fmt::Write;

use axum::http::StatusCode;
use natursur::{
    application::{
        feed::Video,
        form::{ContactForm, FormErrors, LoginForm, ReservationForm, SignupForm},
    },
    domain::{
        core::{Offering, Reservation, Therapy, User},
        Entity,
    },
    Studio,
};

/// 全ページ共通の情報
pub struct Context<'a> {
    pub studio: &'a Studio,
    pub user: Option<&'a User>,
}

pub fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn layout(ctx: &Context, title: &str, body: &str) -> String {
    let account = match ctx.user {
        Some(user) if user.is_staff() => format!(
            r#"<a href="/panel/">Panel</a> <a href="/accounts/logout/">Salir ({})</a>"#,
            escape(user.username())
        ),
        Some(user) => format!(
            r#"<a href="/accounts/logout/">Salir ({})</a>"#,
            escape(user.username())
        ),
        None => r#"<a href="/accounts/login/">Entrar</a> <a href="/accounts/signup/">Registrarse</a>"#
            .to_owned(),
    };
    format!(
        r#"<!DOCTYPE html>
<html lang="es">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title} | {studio}</title>
</head>
<body>
<header>
<a href="/">{studio}</a>
<nav>
<a href="/#reservar">Reservar</a>
<a href="/estudio-corporal/">Estudio corporal</a>
<a href="/tienda/">Tienda</a>
<a href="/faq/">Preguntas frecuentes</a>
<a href="/unete-al-equipo/">Únete al equipo</a>
<a href="/contacto/">Contacto</a>
{account}
</nav>
</header>
<main>
<h1>{title}</h1>
{body}
</main>
<footer>
<a href="https://www.instagram.com/{instagram}/">Instagram</a>
<a href="{facebook}">Facebook</a>
<a href="https://www.youtube.com/channel/{youtube}">YouTube</a>
<a href="mailto:{email}">{email}</a>
</footer>
</body>
</html>
"#,
        title = escape(title),
        studio = escape(&ctx.studio.name),
        account = account,
        body = body,
        instagram = escape(&ctx.studio.instagram_username),
        facebook = escape(&ctx.studio.facebook_url),
        youtube = escape(&ctx.studio.youtube_channel_id),
        email = escape(&ctx.studio.contact_email),
    )
}

fn field_errors(errors: &FormErrors, field: &str) -> String {
    errors
        .field(field)
        .iter()
        .map(|m| format!(r#"<p class="error">{}</p>"#, escape(m)))
        .collect()
}

fn non_field_errors(errors: &FormErrors) -> String {
    if errors.non_field().is_empty() {
        return String::new();
    }
    let items = errors
        .non_field()
        .iter()
        .map(|m| format!("<li>{}</li>", escape(m)))
        .collect::<String>();
    format!(r#"<ul class="errors">{}</ul>"#, items)
}

fn input(name: &str, label: &str, kind: &str, value: &str, errors: &FormErrors) -> String {
    format!(
        r#"<p><label for="id_{name}">{label}</label> <input type="{kind}" name="{name}" id="id_{name}" value="{value}">{errors}</p>"#,
        name = name,
        label = escape(label),
        kind = kind,
        value = escape(value),
        errors = field_errors(errors, name),
    )
}

fn textarea(name: &str, label: &str, value: &str, errors: &FormErrors) -> String {
    format!(
        r#"<p><label for="id_{name}">{label}</label> <textarea name="{name}" id="id_{name}" rows="3">{value}</textarea>{errors}</p>"#,
        name = name,
        label = escape(label),
        value = escape(value),
        errors = field_errors(errors, name),
    )
}

fn offering_label(offering: &Offering) -> String {
    format!(
        "{} - {} min - {}",
        offering.name(),
        offering.duration_minutes(),
        offering.price()
    )
}

pub fn home(
    ctx: &Context,
    offerings: &[Offering],
    form: &ReservationForm,
    errors: &FormErrors,
    videos: &[Video],
) -> String {
    let mut body = String::new();
    body.push_str(r#"<section id="servicios"><h2>Servicios</h2><ul>"#);
    for offering in offerings {
        let _ = write!(body, "<li>{}</li>", escape(&offering_label(offering)));
    }
    body.push_str("</ul></section>");

    body.push_str(r#"<section id="reservar"><h2>Reserva tu cita</h2>"#);
    body.push_str(&non_field_errors(errors));
    body.push_str(r#"<form method="post" action="/reservar/">"#);
    body.push_str(&input("name", "Nombre", "text", &form.name, errors));
    body.push_str(&input("email", "Correo electrónico", "email", &form.email, errors));
    body.push_str(&input("phone", "Teléfono", "tel", &form.phone, errors));

    body.push_str(r#"<p><label for="id_offering">Sesión</label> <select name="offering" id="id_offering"><option value="">---------</option>"#);
    for offering in offerings {
        let id = offering.id().to_string();
        let _ = write!(
            body,
            r#"<option value="{}" data-duration="{}"{}>{}</option>"#,
            id,
            offering.duration_minutes(),
            if form.offering == id { " selected" } else { "" },
            escape(&offering_label(offering))
        );
    }
    body.push_str("</select>");
    body.push_str(&field_errors(errors, "offering"));
    body.push_str("</p>");

    body.push_str(r#"<p><label for="id_therapy">Servicio</label> <select name="therapy" id="id_therapy"><option value="">---------</option>"#);
    for therapy in Therapy::ALL {
        let _ = write!(
            body,
            r#"<option value="{}"{}>{}</option>"#,
            therapy.slug(),
            if form.therapy == therapy.slug() { " selected" } else { "" },
            escape(therapy.label())
        );
    }
    body.push_str("</select>");
    body.push_str(&field_errors(errors, "therapy"));
    body.push_str("</p>");

    body.push_str(&input("date", "Fecha", "date", &form.date, errors));
    body.push_str(&input("time", "Hora", "time", &form.time, errors));
    body.push_str(r#"<p id="available-times" data-endpoint="/api/available-times/"></p>"#);
    body.push_str(&textarea("notes", "Notas", &form.notes, errors));
    body.push_str(r#"<button type="submit">Reservar</button></form></section>"#);

    if !videos.is_empty() {
        body.push_str(r#"<section id="videos"><h2>Vídeos</h2><ul>"#);
        for video in videos {
            let thumbnail = video
                .thumbnail
                .as_deref()
                .map(|url| format!(r#"<img src="{}" alt="">"#, escape(url)))
                .unwrap_or_default();
            let _ = write!(
                body,
                r#"<li><a href="{}">{}{}</a></li>"#,
                escape(&video.link),
                thumbnail,
                escape(&video.title)
            );
        }
        body.push_str("</ul></section>");
    }
    layout(ctx, &ctx.studio.name, &body)
}

pub fn booking_success(ctx: &Context) -> String {
    layout(
        ctx,
        "Reserva recibida",
        r#"<p>¡Gracias! Hemos recibido tu reserva. Te hemos enviado un correo de confirmación.</p><p><a href="/">Volver al inicio</a></p>"#,
    )
}

pub fn faq(ctx: &Context) -> String {
    let body = format!(
        "<dl>\
         <dt>¿Cuánto dura una sesión?</dt><dd>Ofrecemos sesiones de 40, 60 y 90 minutos.</dd>\
         <dt>¿Qué horario tenéis?</dt><dd>De lunes a viernes, de 09:00 a 18:00.</dd>\
         <dt>¿Cómo cancelo una cita?</dt><dd>Escríbenos a <a href=\"mailto:{email}\">{email}</a> con antelación.</dd>\
         </dl>",
        email = escape(&ctx.studio.contact_email)
    );
    layout(ctx, "Preguntas frecuentes", &body)
}

pub fn estudio_corporal(ctx: &Context) -> String {
    layout(
        ctx,
        "Estudio corporal",
        r##"<p>Analizamos tu composición corporal y te proponemos un plan de bienestar personalizado.</p><p><a href="/#reservar">Reserva tu estudio</a></p>"##,
    )
}

pub fn unete(ctx: &Context) -> String {
    let body = format!(
        r#"<p>¿Te apasiona el bienestar? Envíanos tu candidatura a <a href="mailto:{email}">{email}</a>.</p>"#,
        email = escape(&ctx.studio.contact_email)
    );
    layout(ctx, "Únete al equipo", &body)
}

pub fn contact(ctx: &Context, form: &ContactForm, errors: &FormErrors, sent: bool) -> String {
    let mut body = String::new();
    if sent {
        body.push_str(r#"<p class="success">Gracias, hemos recibido tu mensaje.</p>"#);
    }
    body.push_str(&non_field_errors(errors));
    body.push_str(r#"<form method="post" action="/contacto/">"#);
    body.push_str(&input("name", "Nombre", "text", &form.name, errors));
    body.push_str(&input("email", "Correo electrónico", "email", &form.email, errors));
    body.push_str(&input("phone", "Teléfono", "tel", &form.phone, errors));
    body.push_str(&textarea("message", "Mensaje", &form.message, errors));
    body.push_str(r#"<button type="submit">Enviar</button></form>"#);
    layout(ctx, "Contacto", &body)
}

pub fn signup(ctx: &Context, form: &SignupForm, errors: &FormErrors) -> String {
    let mut body = String::new();
    body.push_str(&non_field_errors(errors));
    body.push_str(r#"<form method="post" action="/accounts/signup/">"#);
    body.push_str(&input("username", "Usuario", "text", &form.username, errors));
    body.push_str(&input("email", "Correo electrónico", "email", &form.email, errors));
    body.push_str(&input("password1", "Contraseña", "password", "", errors));
    body.push_str(&input("password2", "Confirmar contraseña", "password", "", errors));
    body.push_str(r#"<button type="submit">Crear cuenta</button></form>"#);
    layout(ctx, "Crear cuenta", &body)
}

pub fn login(ctx: &Context, form: &LoginForm, errors: &FormErrors, next: &str) -> String {
    let mut body = String::new();
    body.push_str(&non_field_errors(errors));
    let _ = write!(
        body,
        r#"<form method="post" action="/accounts/login/?next={}">"#,
        escape(&urlencoding::encode(next))
    );
    body.push_str(&input("username", "Usuario", "text", &form.username, errors));
    body.push_str(&input("password", "Contraseña", "password", "", errors));
    body.push_str(r#"<button type="submit">Entrar</button></form>"#);
    body.push_str(r#"<p>¿No tienes cuenta? <a href="/accounts/signup/">Regístrate</a></p>"#);
    layout(ctx, "Entrar", &body)
}

/// 管理画面トップの集計
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DashboardStats {
    pub reservations: usize,
    pub today: usize,
    pub upcoming: usize,
    pub clients: usize,
}

pub fn dashboard(ctx: &Context, stats: &DashboardStats) -> String {
    let body = format!(
        r#"<ul class="stats">
<li>Reservas totales: <strong id="reservations-count">{}</strong></li>
<li>Reservas de hoy: <strong id="today-count">{}</strong></li>
<li>Próximas reservas: <strong id="upcoming-count">{}</strong></li>
<li>Clientes: <strong id="clients-count">{}</strong></li>
</ul>
<p><a href="/panel/reservas/">Ver reservas</a> <a href="/panel/clientes/">Ver clientes</a></p>"#,
        stats.reservations, stats.today, stats.upcoming, stats.clients
    );
    layout(ctx, "Panel", &body)
}

pub fn reservation_list(ctx: &Context, reservations: &[Reservation], offerings: &[Offering]) -> String {
    let mut body = String::from(
        "<table><thead><tr><th>Fecha</th><th>Hora</th><th>Nombre</th><th>Servicio</th><th>Email</th><th>Teléfono</th><th>Notas</th><th></th></tr></thead><tbody>",
    );
    for reservation in reservations {
        let service = reservation
            .offering()
            .and_then(|id| offerings.iter().find(|o| o.id() == id))
            .map(|o| o.name())
            .or_else(|| reservation.therapy().map(|t| t.label()))
            .unwrap_or("-");
        let _ = write!(
            body,
            r#"<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td><form method="post" action="/panel/reservas/{}/delete"><button type="submit">Eliminar</button></form></td></tr>"#,
            reservation.date().format("%d/%m/%Y"),
            reservation.time().format("%H:%M"),
            escape(&reservation.customer().name),
            escape(service),
            escape(&reservation.customer().email),
            escape(&reservation.customer().phone),
            escape(reservation.notes()),
            reservation.id()
        );
    }
    body.push_str("</tbody></table>");
    if reservations.is_empty() {
        body.push_str("<p>No hay reservas.</p>");
    }
    layout(ctx, "Reservas", &body)
}

pub fn client_list(ctx: &Context, clients: &[User]) -> String {
    let mut body = String::from(
        "<table><thead><tr><th>Usuario</th><th>Email</th><th>Alta</th><th></th></tr></thead><tbody>",
    );
    for client in clients {
        let _ = write!(
            body,
            r#"<tr><td>{}</td><td>{}</td><td>{}</td><td><form method="post" action="/panel/clientes/{}/delete"><button type="submit">Eliminar</button></form></td></tr>"#,
            escape(client.username()),
            escape(client.email()),
            client.joined_at().format("%d/%m/%Y"),
            client.id()
        );
    }
    body.push_str("</tbody></table>");
    if clients.is_empty() {
        body.push_str("<p>No hay clientes.</p>");
    }
    layout(ctx, "Clientes", &body)
}

pub fn error_page(status: StatusCode) -> String {
    let message = match status {
        StatusCode::BAD_REQUEST => "La solicitud no es válida.",
        StatusCode::FORBIDDEN => "No tienes permiso para ver esta página.",
        StatusCode::NOT_FOUND => "La página o el registro no existe.",
        _ => "Se ha producido un error. Inténtalo de nuevo más tarde.",
    };
    format!(
        "<!DOCTYPE html>\n<html lang=\"es\"><head><meta charset=\"utf-8\"><title>{code}</title></head><body><h1>{code}</h1><p>{message}</p><p><a href=\"/\">Volver al inicio</a></p></body></html>\n",
        code = status.as_u16(),
        message = message
    )
}
