//! Outgoing email: SMTP transport, HTML templates and the two account emails.
//!
//! Sends run in detached tasks and failures are only logged; a lost email is
//! recovered by asking for a new one.

use anyhow::Context;
use async_trait::async_trait;
use axum::extract::FromRef;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{info, warn};

use crate::{
    auth::{claims::TokenKind, jwt::JwtKeys},
    config::MailConfig,
    state::AppState,
};

const VERIFICATION_TEMPLATE: &str = include_str!("templates/verification_email.html");
const PASSWORD_RESET_TEMPLATE: &str = include_str!("templates/password_reset_email.html");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> anyhow::Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(cfg: &MailConfig) -> anyhow::Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.server)
            .context("smtp relay")?
            .port(cfg.port)
            .credentials(Credentials::new(cfg.username.clone(), cfg.password.clone()))
            .build();
        let from = Mailbox::new(
            Some(cfg.from_name.clone()),
            cfg.from.parse().context("parse MAIL_FROM")?,
        );
        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> anyhow::Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(email.to.parse().context("parse recipient")?)
            .subject(email.subject)
            .header(ContentType::TEXT_HTML)
            .body(email.html)
            .context("build message")?;
        self.transport.send(message).await.context("smtp send")?;
        Ok(())
    }
}

/// Keeps sent messages in memory instead of delivering them.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryMailer {
    sent: std::sync::Mutex<Vec<OutgoingEmail>>,
}

#[cfg(test)]
impl MemoryMailer {
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, email: OutgoingEmail) -> anyhow::Result<()> {
        self.sent
            .lock()
            .map_err(|_| anyhow::anyhow!("mailbox poisoned"))?
            .push(email);
        Ok(())
    }
}

fn render(template: &str, host: &str, username: &str, token: &str) -> String {
    template
        .replace("{{ host }}", host.trim_end_matches('/'))
        .replace("{{ username }}", &html_escape::encode_text(username))
        .replace("{{ token }}", token)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountEmail {
    Verification,
    PasswordReset,
}

impl AccountEmail {
    fn token_kind(self) -> TokenKind {
        match self {
            AccountEmail::Verification => TokenKind::EmailVerification,
            AccountEmail::PasswordReset => TokenKind::PasswordReset,
        }
    }

    fn subject(self) -> &'static str {
        match self {
            AccountEmail::Verification => "Confirm your email",
            AccountEmail::PasswordReset => "Password reset",
        }
    }

    fn template(self) -> &'static str {
        match self {
            AccountEmail::Verification => VERIFICATION_TEMPLATE,
            AccountEmail::PasswordReset => PASSWORD_RESET_TEMPLATE,
        }
    }
}

/// Builds the tokenized email and hands it to the mailer.
pub async fn send_account_email(
    mailer: &dyn Mailer,
    keys: &JwtKeys,
    host: &str,
    kind: AccountEmail,
    email: &str,
    username: &str,
) -> anyhow::Result<()> {
    let token = keys.sign(email, kind.token_kind())?;
    mailer
        .send(OutgoingEmail {
            to: email.to_string(),
            subject: kind.subject().to_string(),
            html: render(kind.template(), host, username, &token),
        })
        .await
}

/// Sends in the background; errors are logged and dropped.
pub fn spawn_account_email(state: &AppState, kind: AccountEmail, email: String, username: String) {
    let mailer = state.mailer.clone();
    let keys = JwtKeys::from_ref(state);
    let host = state.config.public_url.clone();
    tokio::spawn(async move {
        match send_account_email(mailer.as_ref(), &keys, &host, kind, &email, &username).await {
            Ok(()) => info!(%email, ?kind, "account email sent"),
            Err(e) => warn!(error = %e, %email, ?kind, "account email not sent"),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_fills_placeholders_and_escapes_username() {
        let html = render(VERIFICATION_TEMPLATE, "http://api.test/", "<b>ann</b>", "tok123");
        assert!(html.contains("http://api.test/api/auth/confirm-email/tok123"));
        assert!(html.contains("&lt;b&gt;ann&lt;/b&gt;"));
        assert!(!html.contains("{{"));

        let html = render(PASSWORD_RESET_TEMPLATE, "http://api.test", "Tom & Jerry", "t");
        assert!(html.contains("Hi Tom &amp; Jerry,"));
    }

    #[tokio::test]
    async fn verification_email_carries_verification_token() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let mailer = MemoryMailer::default();

        send_account_email(
            &mailer,
            &keys,
            "http://api.test",
            AccountEmail::Verification,
            "ann@example.com",
            "ann",
        )
        .await
        .unwrap();

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "ann@example.com");
        assert_eq!(sent[0].subject, "Confirm your email");

        let marker = "/api/auth/confirm-email/";
        let start = sent[0].html.find(marker).unwrap() + marker.len();
        let token: String = sent[0].html[start..]
            .chars()
            .take_while(|c| *c != '"')
            .collect();
        let claims = keys.verify(&token, TokenKind::EmailVerification).unwrap();
        assert_eq!(claims.sub, "ann@example.com");
    }

    #[tokio::test]
    async fn password_reset_email_uses_reset_link() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let mailer = MemoryMailer::default();

        send_account_email(
            &mailer,
            &keys,
            "http://api.test",
            AccountEmail::PasswordReset,
            "bob@example.com",
            "bob",
        )
        .await
        .unwrap();

        let sent = mailer.sent();
        assert_eq!(sent[0].subject, "Password reset");
        assert!(sent[0].html.contains("/api/auth/reset-password/"));
    }
}
