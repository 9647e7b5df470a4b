use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::{
    core::{OfferingRepository, Reservation},
    BoxError, Entity,
};

use super::form::ContactForm;

/// 送信するメール
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub reply_to: Option<String>,
    pub subject: String,
    pub text: String,
}

#[derive(Debug, Error)]
#[error("Failed to send email: {0}")]
pub struct MailError(pub BoxError);

/// メール送信
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), MailError>;
}

/// 予約と問い合わせの通知
pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    offerings: Arc<dyn OfferingRepository>,
    studio_name: String,
    studio_email: String,
}

impl Notifier {
    pub fn new(
        mailer: Arc<dyn Mailer>,
        offerings: Arc<dyn OfferingRepository>,
        studio_name: String,
        studio_email: String,
    ) -> Self {
        Self {
            mailer,
            offerings,
            studio_name,
            studio_email,
        }
    }

    /// お客様への予約確認
    pub async fn booking_confirmation(&self, reservation: &Reservation) -> Result<(), MailError> {
        let email = Email {
            to: reservation.customer().email.clone(),
            reply_to: Some(self.studio_email.clone()),
            subject: "Confirmación de reserva".to_owned(),
            text: confirmation_text(
                &self.studio_name,
                reservation,
                &self.service_name(reservation).await,
            ),
        };
        self.mailer.send(&email).await?;
        info!("予約 {} の確認メールを送信しました", reservation.id());
        Ok(())
    }

    /// スタジオ宛ての新規予約のお知らせ（失敗しても続行）
    pub async fn studio_notice(&self, reservation: &Reservation) {
        let email = Email {
            to: self.studio_email.clone(),
            reply_to: Some(reservation.customer().email.clone()),
            subject: format!("Nueva reserva: {}", reservation),
            text: format!(
                "{}\nServicio: {}\nEmail: {}\nTeléfono: {}\nNotas: {}\n",
                reservation,
                self.service_name(reservation).await,
                reservation.customer().email,
                reservation.customer().phone,
                reservation.notes()
            ),
        };
        if let Err(e) = self.mailer.send(&email).await {
            warn!("スタジオへの予約通知に失敗しました: {}", e);
        }
    }

    /// 問い合わせをスタジオに転送する
    pub async fn forward_contact(&self, form: &ContactForm) -> Result<(), MailError> {
        let email = Email {
            to: self.studio_email.clone(),
            reply_to: Some(form.email.trim().to_owned()),
            subject: format!("Contacto web: {}", form.name.trim()),
            text: format!(
                "Nombre: {}\nEmail: {}\nTeléfono: {}\n\n{}\n",
                form.name.trim(),
                form.email.trim(),
                form.phone.trim(),
                form.message.trim()
            ),
        };
        self.mailer.send(&email).await
    }

    /// 予約したメニューの現在の名前
    async fn service_name(&self, reservation: &Reservation) -> String {
        if let Some(id) = reservation.offering() {
            match self.offerings.find_by_id(id).await {
                Ok(Some(offering)) => return offering.name().to_owned(),
                Ok(None) => {}
                Err(e) => warn!("メニュー {} を読めませんでした: {}", id, e),
            }
        }
        reservation
            .therapy()
            .map(|therapy| therapy.label())
            .unwrap_or("No especificado")
            .to_owned()
    }
}

fn confirmation_text(studio_name: &str, reservation: &Reservation, service: &str) -> String {
    format!(
        "Hola {},\n\n\
         Hemos recibido tu reserva:\n\
         Servicio: {}\n\
         Fecha: {}\n\
         Hora: {}\n\n\
         Si necesitas cambiarla, responde a este correo.\n\n\
         {}\n",
        reservation.customer().name,
        service,
        reservation.date().format("%d/%m/%Y"),
        reservation.time().format("%H:%M"),
        studio_name
    )
}
