use crate::core::renderer::certificate_file_name;
use crate::domain::model::{CertificateArtifact, MailAttachment, OutgoingMail};
use crate::domain::ports::MailTransport;
use crate::utils::error::{CertError, Result};
use std::time::Duration;
use tokio::time::Instant;

pub const SUBJECT: &str = "Your certificate of participation";

pub fn compose_body(participant_name: &str, sender_name: &str) -> String {
    format!(
        "Hello {},\n\n\
         Thank you for taking part in the event. \
         Your certificate of participation is attached to this message as a PDF.\n\n\
         Best regards,\n\
         {}\n",
        participant_name.trim(),
        sender_name
    )
}

/// 兩次寄送之間的最小間隔，不論上一次成功與否
#[derive(Debug)]
pub struct SendThrottle {
    min_interval: Duration,
    last_attempt: Option<Instant>,
}

impl SendThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_attempt: None,
        }
    }

    pub async fn wait(&mut self) {
        if let Some(last) = self.last_attempt {
            let ready_at = last + self.min_interval;
            if Instant::now() < ready_at {
                tracing::debug!("Throttling for {:?}", ready_at - Instant::now());
                tokio::time::sleep_until(ready_at).await;
            }
        }
        self.last_attempt = Some(Instant::now());
    }
}

/// 把一份證書寄給一位收件人。寫入帳本由呼叫端負責。
pub struct Dispatcher<T: MailTransport> {
    transport: T,
    sender_name: String,
    throttle: SendThrottle,
}

impl<T: MailTransport> Dispatcher<T> {
    pub fn new(transport: T, sender_name: impl Into<String>, min_interval: Duration) -> Self {
        Self {
            transport,
            sender_name: sender_name.into(),
            throttle: SendThrottle::new(min_interval),
        }
    }

    pub fn compose(&self, artifact: &CertificateArtifact, pdf: Vec<u8>) -> OutgoingMail {
        let participant = &artifact.participant;
        OutgoingMail {
            to_name: participant.name.trim().to_string(),
            to_address: participant.email.trim().to_string(),
            subject: SUBJECT.to_string(),
            text_body: compose_body(&participant.name, &self.sender_name),
            attachment: MailAttachment {
                filename: certificate_file_name(participant),
                content_type: "application/pdf".to_string(),
                data: pdf,
            },
        }
    }

    pub async fn send(&mut self, artifact: &CertificateArtifact) -> Result<()> {
        let recipient = artifact.participant.email.trim().to_string();

        let pdf = tokio::fs::read(&artifact.file_path).await.map_err(|e| {
            CertError::delivery(
                &recipient,
                format!(
                    "cannot read attachment {}: {}",
                    artifact.file_path.display(),
                    e
                ),
            )
        })?;
        let mail = self.compose(artifact, pdf);

        self.throttle.wait().await;

        tracing::debug!("Sending certificate to {}", recipient);
        self.transport.deliver(mail).await.map_err(|e| match e {
            CertError::DeliveryError { cause, .. } => CertError::delivery(&recipient, cause),
            other => CertError::delivery(&recipient, other.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Participant;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    #[derive(Clone, Default)]
    struct RecordingTransport {
        sent: Arc<Mutex<Vec<OutgoingMail>>>,
        reject: Vec<String>,
    }

    #[async_trait]
    impl MailTransport for RecordingTransport {
        async fn deliver(&self, mail: OutgoingMail) -> Result<()> {
            if self.reject.contains(&mail.to_address) {
                return Err(CertError::delivery(&mail.to_address, "550 mailbox unavailable"));
            }
            self.sent.lock().unwrap().push(mail);
            Ok(())
        }
    }

    fn artifact_in(dir: &Path, name: &str, email: &str) -> CertificateArtifact {
        let participant = Participant::new(name, email);
        let file_path = dir.join(certificate_file_name(&participant));
        std::fs::write(&file_path, b"%PDF").unwrap();
        CertificateArtifact {
            participant,
            file_path,
        }
    }

    #[tokio::test]
    async fn test_send_builds_personalized_mail() {
        let dir = TempDir::new().unwrap();
        let transport = RecordingTransport::default();
        let mut dispatcher = Dispatcher::new(transport.clone(), "Event Team", Duration::ZERO);

        dispatcher
            .send(&artifact_in(dir.path(), "Ana Silva", "ana@x.com"))
            .await
            .unwrap();

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to_address, "ana@x.com");
        assert_eq!(sent[0].subject, SUBJECT);
        assert!(sent[0].text_body.starts_with("Hello Ana Silva,"));
        assert!(sent[0].text_body.contains("Event Team"));
        assert_eq!(sent[0].attachment.filename, "Ana Silva - (ana@x.com).pdf");
        assert_eq!(sent[0].attachment.content_type, "application/pdf");
        assert_eq!(sent[0].attachment.data, b"%PDF");
    }

    #[tokio::test]
    async fn test_failure_carries_recipient_and_does_not_block_next() {
        let dir = TempDir::new().unwrap();
        let transport = RecordingTransport {
            reject: vec!["bad@x.com".to_string()],
            ..Default::default()
        };
        let mut dispatcher = Dispatcher::new(transport.clone(), "Event Team", Duration::ZERO);

        let err = dispatcher
            .send(&artifact_in(dir.path(), "Bad", "bad@x.com"))
            .await
            .unwrap_err();
        match err {
            CertError::DeliveryError { recipient, cause } => {
                assert_eq!(recipient, "bad@x.com");
                assert!(cause.contains("550"));
            }
            other => panic!("unexpected error: {:?}", other),
        }

        dispatcher
            .send(&artifact_in(dir.path(), "Good", "good@x.com"))
            .await
            .unwrap();
        assert_eq!(transport.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_attachment_is_delivery_error() {
        let mut dispatcher =
            Dispatcher::new(RecordingTransport::default(), "Event Team", Duration::ZERO);
        let artifact = CertificateArtifact {
            participant: Participant::new("Ana", "ana@x.com"),
            file_path: "/nonexistent/Ana - (ana@x.com).pdf".into(),
        };

        assert!(matches!(
            dispatcher.send(&artifact).await,
            Err(CertError::DeliveryError { .. })
        ));
    }

    #[tokio::test]
    async fn test_throttle_spaces_consecutive_sends() {
        let mut throttle = SendThrottle::new(Duration::from_millis(80));
        let started = Instant::now();

        throttle.wait().await;
        assert!(started.elapsed() < Duration::from_millis(80));

        throttle.wait().await;
        throttle.wait().await;
        assert!(started.elapsed() >= Duration::from_millis(160));
    }
}
