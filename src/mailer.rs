use std::env;

use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tokio::sync::mpsc;

use crate::models::{
    ReservationRow, STATUS_CANCELLED, STATUS_COMPLETED, STATUS_CONFIRMED, STATUS_PENDING,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MailIntent {
    Confirmation,
    StatusUpdate,
}

#[derive(Clone, Debug)]
pub struct MailJob {
    pub intent: MailIntent,
    pub reservation: ReservationRow,
}

/// Handle held in `AppState`. Enqueueing never blocks and never fails the
/// caller; a closed queue is logged and dropped.
#[derive(Clone)]
pub struct MailQueue {
    tx: mpsc::UnboundedSender<MailJob>,
}

impl MailQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MailJob>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn enqueue(&self, job: MailJob) {
        if self.tx.send(job).is_err() {
            log::warn!("Mail queue closed, notification dropped");
        }
    }
}

#[derive(Clone, Debug)]
pub struct MailerConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_name: String,
    pub from_address: String,
    pub ops_address: String,
}

impl MailerConfig {
    pub fn from_env() -> Self {
        Self {
            host: env::var("SMTP_HOST").unwrap_or_default(),
            port: env::var("SMTP_PORT")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(587),
            username: env::var("SMTP_USER").unwrap_or_default(),
            password: env::var("SMTP_PASS").unwrap_or_default(),
            from_name: env::var("MAIL_FROM_NAME").unwrap_or_else(|_| "LunaBrew".to_string()),
            from_address: env::var("MAIL_FROM_ADDRESS")
                .unwrap_or_else(|_| "info@lunabrew.com".to_string()),
            ops_address: env::var("OPS_EMAIL")
                .unwrap_or_else(|_| "lunabrewankara@gmail.com".to_string()),
        }
    }

    pub fn enabled(&self) -> bool {
        !(self.host.trim().is_empty() || self.username.trim().is_empty())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("message build failed: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("smtp transport: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

/// Drains the queue until every `MailQueue` handle is dropped. Delivery
/// failures are logged and swallowed; they must never reach a request path.
pub async fn run_worker(config: MailerConfig, mut rx: mpsc::UnboundedReceiver<MailJob>) {
    while let Some(job) = rx.recv().await {
        if !config.enabled() {
            log::warn!(
                "SMTP not configured, dropping {:?} mail for reservation {}",
                job.intent,
                job.reservation.id
            );
            continue;
        }
        if let Err(err) = deliver(&config, &job).await {
            log::warn!("Mail send failed for reservation {}: {err}", job.reservation.id);
        }
    }
}

async fn deliver(config: &MailerConfig, job: &MailJob) -> Result<(), DispatchError> {
    let transport = build_transport(config)?;
    let from: Mailbox = format!("{} <{}>", config.from_name, config.from_address).parse()?;
    let customer: Mailbox = job.reservation.customer_email.parse()?;

    match job.intent {
        MailIntent::Confirmation => {
            let message = Message::builder()
                .from(from.clone())
                .to(customer)
                .subject("Rezervasyon Onayı - LunaBrew")
                .header(ContentType::TEXT_HTML)
                .body(confirmation_body(&job.reservation))?;
            transport.send(message).await?;

            let ops: Mailbox = config.ops_address.parse()?;
            let copy = Message::builder()
                .from(from)
                .to(ops)
                .subject("Yeni Rezervasyon Bildirimi")
                .header(ContentType::TEXT_HTML)
                .body(ops_body(&job.reservation))?;
            transport.send(copy).await?;
        }
        MailIntent::StatusUpdate => {
            let message = Message::builder()
                .from(from)
                .to(customer)
                .subject("Rezervasyon Durumu Güncellendi - LunaBrew")
                .header(ContentType::TEXT_HTML)
                .body(status_update_body(&job.reservation))?;
            transport.send(message).await?;
        }
    }

    Ok(())
}

fn build_transport(
    config: &MailerConfig,
) -> Result<AsyncSmtpTransport<Tokio1Executor>, DispatchError> {
    Ok(AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
        .port(config.port)
        .credentials(Credentials::new(
            config.username.clone(),
            config.password.clone(),
        ))
        .build())
}

pub fn status_label(status: &str) -> &str {
    match status {
        STATUS_PENDING => "Beklemede",
        STATUS_CONFIRMED => "Onaylandı",
        STATUS_CANCELLED => "İptal Edildi",
        STATUS_COMPLETED => "Tamamlandı",
        other => other,
    }
}

fn status_note(status: &str) -> &str {
    match status {
        STATUS_PENDING => "Rezervasyonunuz değerlendiriliyor. En kısa sürede size dönüş yapacağız.",
        STATUS_CONFIRMED => "Harika! Rezervasyonunuz onaylandı. Sizi aramızda görmek için sabırsızlanıyoruz!",
        STATUS_CANCELLED => "Üzgünüz, rezervasyonunuz iptal edilmiştir. Başka bir tarih için tekrar deneyebilirsiniz.",
        STATUS_COMPLETED => "Bizi tercih ettiğiniz için teşekkürler! Deneyiminiz hakkında görüşlerinizi paylaşırsanız çok memnun oluruz.",
        _ => "",
    }
}

fn confirmation_body(reservation: &ReservationRow) -> String {
    let message_line = reservation
        .message
        .as_deref()
        .map(|m| format!("<p><strong>Mesajınız:</strong> {m}</p>"))
        .unwrap_or_default();

    format!(
        r#"<h2>Rezervasyon Onayı</h2>
<p>Sayın {name},</p>
<p>Rezervasyonunuz başarıyla alınmıştır. Detaylar aşağıdaki gibidir:</p>
<p><strong>Onay Kodu:</strong> {code}</p>
<p><strong>Tarih:</strong> {date}</p>
<p><strong>Saat:</strong> {time}</p>
<p><strong>Kişi Sayısı:</strong> {guests}</p>
<p><strong>Durum:</strong> {status}</p>
{message_line}
<p>Rezervasyonunuzla ilgili herhangi bir değişiklik olması durumunda size bilgi vereceğiz.</p>
<p>Teşekkürler,<br>LunaBrew Ekibi</p>"#,
        name = reservation.customer_name,
        code = reservation.confirmation_code,
        date = reservation.date,
        time = reservation.time,
        guests = reservation.guests,
        status = status_label(&reservation.status),
    )
}

fn status_update_body(reservation: &ReservationRow) -> String {
    let table_line = reservation
        .table_number
        .as_deref()
        .filter(|t| !t.is_empty())
        .map(|t| format!("<p><strong>Masa No:</strong> {t}</p>"))
        .unwrap_or_default();
    let notes_line = reservation
        .admin_notes
        .as_deref()
        .filter(|n| !n.is_empty())
        .map(|n| format!("<p><strong>Not:</strong> {n}</p>"))
        .unwrap_or_default();

    format!(
        r#"<h2>Rezervasyon Durumu Güncellendi</h2>
<p>Sayın {name},</p>
<p>Rezervasyonunuzun durumu güncellendi:</p>
<p><strong>Durum:</strong> {status}</p>
<p><strong>Tarih:</strong> {date}</p>
<p><strong>Saat:</strong> {time}</p>
{table_line}
{notes_line}
<p>{note}</p>
<p>Teşekkürler,<br>LunaBrew Ekibi</p>"#,
        name = reservation.customer_name,
        status = status_label(&reservation.status),
        date = reservation.date,
        time = reservation.time,
        note = status_note(&reservation.status),
    )
}

fn ops_body(reservation: &ReservationRow) -> String {
    let message_line = reservation
        .message
        .as_deref()
        .map(|m| format!("<li>Mesaj: {m}</li>"))
        .unwrap_or_default();

    format!(
        r#"<h2>Yeni Rezervasyon</h2>
<p>Yeni bir rezervasyon talebi alındı:</p>
<ul>
  <li>Müşteri: {name}</li>
  <li>Email: {email}</li>
  <li>Telefon: {phone}</li>
  <li>Tarih: {date}</li>
  <li>Saat: {time}</li>
  <li>Kişi Sayısı: {guests}</li>
  <li>Onay Kodu: {code}</li>
  {message_line}
</ul>"#,
        name = reservation.customer_name,
        email = reservation.customer_email,
        phone = reservation.customer_phone,
        date = reservation.date,
        time = reservation.time,
        guests = reservation.guests,
        code = reservation.confirmation_code,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_reservation() -> ReservationRow {
        ReservationRow {
            id: "res-1".to_string(),
            customer_name: "Ayşe Yılmaz".to_string(),
            customer_email: "ayse@example.com".to_string(),
            customer_phone: "5551234567".to_string(),
            date: "2030-06-15".to_string(),
            time: "19:00".to_string(),
            guests: "2".to_string(),
            message: Some("Pencere kenarı lütfen".to_string()),
            status: STATUS_PENDING.to_string(),
            confirmation_code: "LB12345678ABCD".to_string(),
            admin_notes: None,
            table_number: None,
            created_by: "customer".to_string(),
            last_modified_by: None,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn status_labels_are_turkish() {
        assert_eq!(status_label("pending"), "Beklemede");
        assert_eq!(status_label("confirmed"), "Onaylandı");
        assert_eq!(status_label("cancelled"), "İptal Edildi");
        assert_eq!(status_label("completed"), "Tamamlandı");
        assert_eq!(status_label("unknown"), "unknown");
    }

    #[test]
    fn confirmation_body_carries_booking_facts() {
        let body = confirmation_body(&sample_reservation());
        assert!(body.contains("Ayşe Yılmaz"));
        assert!(body.contains("2030-06-15"));
        assert!(body.contains("19:00"));
        assert!(body.contains("LB12345678ABCD"));
        assert!(body.contains("Pencere kenarı lütfen"));
    }

    #[test]
    fn status_update_body_includes_table_when_assigned() {
        let mut reservation = sample_reservation();
        reservation.status = "confirmed".to_string();
        reservation.table_number = Some("7".to_string());
        let body = status_update_body(&reservation);
        assert!(body.contains("Masa No"));
        assert!(body.contains("Onaylandı"));
    }

    #[test]
    fn queue_delivers_jobs_in_order() {
        let (queue, mut rx) = MailQueue::new();
        queue.enqueue(MailJob {
            intent: MailIntent::Confirmation,
            reservation: sample_reservation(),
        });
        queue.enqueue(MailJob {
            intent: MailIntent::StatusUpdate,
            reservation: sample_reservation(),
        });
        assert_eq!(rx.try_recv().unwrap().intent, MailIntent::Confirmation);
        assert_eq!(rx.try_recv().unwrap().intent, MailIntent::StatusUpdate);
    }
}
