//! SMTP 郵件傳輸
//!
//! lettre 的 `AsyncSmtpTransport` 包一層，使用帳號密碼登入 SMTP 中繼。

use crate::domain::model::OutgoingMail;
use crate::domain::ports::MailTransport;
use crate::utils::error::{CertError, Result};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Attachment, Mailbox, Message, MultiPart, SinglePart},
    transport::smtp::{authentication::Credentials, AsyncSmtpTransportBuilder},
    Address, AsyncSmtpTransport, AsyncTransport, Tokio1Executor,
};

/// SMTPS（implicit TLS）的預設 port，其他 port 走 STARTTLS
pub const SMTPS_PORT: u16 = 465;

#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub sender_name: String,
}

pub struct SmtpMailTransport {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailTransport {
    pub fn new(settings: &SmtpSettings) -> Result<Self> {
        let from = sender_mailbox(&settings.sender_name, &settings.username)?;

        let transport = relay_builder(&settings.host, settings.port)?
            .credentials(Credentials::new(
                settings.username.clone(),
                settings.password.clone(),
            ))
            .build();

        Ok(Self { transport, from })
    }
}

/// 465 走 implicit TLS，其他 port 走 STARTTLS；只建立設定，不連線
pub fn relay_builder(host: &str, port: u16) -> Result<AsyncSmtpTransportBuilder> {
    let builder = if port == SMTPS_PORT {
        AsyncSmtpTransport::<Tokio1Executor>::relay(host.trim())
    } else {
        AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host.trim())
    }
    .map_err(|e| CertError::config(vec![format!("SMTP_HOST is not usable: {}", e)]))?;
    Ok(builder.port(port))
}

pub fn sender_mailbox(sender_name: &str, address: &str) -> Result<Mailbox> {
    let address: Address = address.trim().parse().map_err(|e| {
        CertError::config(vec![format!("EMAIL_ADDRESS is not a valid address: {}", e)])
    })?;
    Ok(Mailbox::new(Some(sender_name.to_string()), address))
}

pub fn build_message(from: &Mailbox, mail: &OutgoingMail) -> Result<Message> {
    let recipient = &mail.to_address;

    let address: Address = recipient
        .parse()
        .map_err(|e| CertError::delivery(recipient, format!("invalid address: {}", e)))?;
    let to_name = if mail.to_name.is_empty() {
        None
    } else {
        Some(mail.to_name.clone())
    };

    let content_type = ContentType::parse(&mail.attachment.content_type).map_err(|e| {
        CertError::delivery(recipient, format!("invalid attachment type: {}", e))
    })?;
    let attachment = Attachment::new(mail.attachment.filename.clone())
        .body(mail.attachment.data.clone(), content_type);

    Message::builder()
        .from(from.clone())
        .to(Mailbox::new(to_name, address))
        .subject(&mail.subject)
        .multipart(
            MultiPart::mixed()
                .singlepart(SinglePart::plain(mail.text_body.clone()))
                .singlepart(attachment),
        )
        .map_err(|e| CertError::delivery(recipient, format!("cannot build message: {}", e)))
}

#[async_trait]
impl MailTransport for SmtpMailTransport {
    async fn deliver(&self, mail: OutgoingMail) -> Result<()> {
        let message = build_message(&self.from, &mail)?;

        self.transport
            .send(message)
            .await
            .map_err(|e| CertError::delivery(&mail.to_address, format!("SMTP: {}", e)))?;

        Ok(())
    }
}
