use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use super::claims::{Claims, TokenKind};
use crate::{config::JwtConfig, state::AppState};

/// Holds JWT signing and verification keys with config data.
#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub email_ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        JwtKeys::from_config(&state.config.jwt)
    }
}

impl JwtKeys {
    pub fn from_config(cfg: &JwtConfig) -> Self {
        let minutes = |m: i64| Duration::from_secs((m.max(0) as u64) * 60);
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            access_ttl: minutes(cfg.ttl_minutes),
            refresh_ttl: minutes(cfg.refresh_ttl_minutes),
            email_ttl: minutes(cfg.email_ttl_minutes),
        }
    }

    fn ttl(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access | TokenKind::PasswordResetConfirmation => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
            TokenKind::EmailVerification | TokenKind::PasswordReset => self.email_ttl,
        }
    }

    pub fn sign(&self, email: &str, kind: TokenKind) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.ttl(kind).as_secs() as i64);
        let claims = Claims {
            sub: email.to_string(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            jti: Uuid::new_v4(),
            kind,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(%email, ?kind, "jwt signed");
        Ok(token)
    }

    pub fn sign_access(&self, email: &str) -> anyhow::Result<String> {
        self.sign(email, TokenKind::Access)
    }

    pub fn sign_refresh(&self, email: &str) -> anyhow::Result<String> {
        self.sign(email, TokenKind::Refresh)
    }

    /// Checks signature, expiry, issuer, audience and the token kind.
    pub fn verify(&self, token: &str, expected: TokenKind) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        if data.claims.kind != expected {
            anyhow::bail!("expected {:?} token, got {:?}", expected, data.claims.kind);
        }
        debug!(email = %data.claims.sub, kind = ?data.claims.kind, "jwt verified");
        Ok(data.claims)
    }
}
