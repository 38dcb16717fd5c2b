use anyhow::Context;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::info;

use crate::config::MailConfig;

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send the password-reset message carrying the one-click reset link.
    async fn send_password_reset(
        &self,
        to: &str,
        username: &str,
        reset_url: &str,
    ) -> anyhow::Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(cfg: &MailConfig) -> anyhow::Result<Self> {
        let creds = Credentials::new(cfg.smtp_username.clone(), cfg.smtp_password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.smtp_host)
            .context("smtp relay")?
            .port(cfg.smtp_port)
            .credentials(creds)
            .build();
        let from = cfg.from_address.parse::<Mailbox>().context("MAIL_FROM")?;
        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_password_reset(
        &self,
        to: &str,
        username: &str,
        reset_url: &str,
    ) -> anyhow::Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to.parse::<Mailbox>().context("recipient address")?)
            .subject("Password Reset Request")
            .header(ContentType::TEXT_PLAIN)
            .body(reset_body(username, reset_url))
            .context("build reset message")?;

        // Fire-and-forget: a transport failure surfaces to the caller,
        // no retry or delivery confirmation.
        self.transport.send(message).await.context("smtp send")?;
        info!(%to, "password reset mail sent");
        Ok(())
    }
}

fn reset_body(username: &str, reset_url: &str) -> String {
    format!(
        "Hi {username},\n\n\
         To reset your password, visit the following link:\n\
         {reset_url}\n\n\
         If you did not make this request, simply ignore this message.\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_body_embeds_link_and_name() {
        let body = reset_body("ada", "http://localhost:8080/reset-password/abc.def.ghi");
        assert!(body.contains("http://localhost:8080/reset-password/abc.def.ghi"));
        assert!(body.contains("Hi ada"));
    }
}
