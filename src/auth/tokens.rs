use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;

use crate::config::AuthConfig;
use crate::state::AppState;

use super::dto::{Claims, TokenKind};

/// Process-wide signing material, derived once per request from the
/// startup config. Sessions and reset tokens share the secret but carry
/// distinct kinds, so one can never stand in for the other.
#[derive(Clone)]
pub struct AuthTokens {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub session_ttl: Duration,
    pub remember_ttl: Duration,
    pub reset_ttl: Duration,
}

impl FromRef<AppState> for AuthTokens {
    fn from_ref(state: &AppState) -> Self {
        let AuthConfig {
            secret,
            issuer,
            audience,
            session_ttl_minutes,
            remember_ttl_minutes,
            reset_ttl_seconds,
        } = state.config.auth.clone();
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
            audience,
            session_ttl: Duration::from_secs((session_ttl_minutes as u64) * 60),
            remember_ttl: Duration::from_secs((remember_ttl_minutes as u64) * 60),
            reset_ttl: Duration::from_secs(reset_ttl_seconds as u64),
        }
    }
}

impl AuthTokens {
    fn sign_at(
        &self,
        user_id: i64,
        kind: TokenKind,
        ttl: Duration,
        now: OffsetDateTime,
    ) -> anyhow::Result<String> {
        let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
        let claims = Claims {
            sub: user_id,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user_id, kind = ?kind, "token signed");
        Ok(token)
    }

    /// Establish a session for a verified identity. `remember` switches to
    /// the long-lived TTL.
    pub fn sign_session(&self, user_id: i64, remember: bool) -> anyhow::Result<String> {
        let ttl = if remember {
            self.remember_ttl
        } else {
            self.session_ttl
        };
        self.sign_at(user_id, TokenKind::Session, ttl, OffsetDateTime::now_utc())
    }

    pub fn verify_session(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        if data.claims.kind != TokenKind::Session {
            anyhow::bail!("not a session token");
        }
        Ok(data.claims)
    }

    /// Issue a password-reset token for `subject_id`, valid for the
    /// configured reset TTL (1800 s by default).
    pub fn issue_reset(&self, subject_id: i64) -> anyhow::Result<String> {
        self.issue_reset_at(subject_id, OffsetDateTime::now_utc())
    }

    fn issue_reset_at(&self, subject_id: i64, now: OffsetDateTime) -> anyhow::Result<String> {
        self.sign_at(subject_id, TokenKind::Reset, self.reset_ttl, now)
    }

    /// Redeem a reset token. Every failure mode collapses to `None`: bad
    /// signature, malformed string, expiry, or a session token presented
    /// here. No detail is exposed, so the endpoint cannot be used as a
    /// validity oracle. Redemption is stateless; an unexpired token
    /// verifies any number of times.
    pub fn verify_reset(&self, token: &str) -> Option<i64> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        // Expiry is exact wall-clock on the verifying host, no skew leeway.
        validation.leeway = 0;
        match decode::<Claims>(token, &self.decoding, &validation) {
            Ok(data) if data.claims.kind == TokenKind::Reset => Some(data.claims.sub),
            Ok(_) => {
                debug!("reset verify rejected: wrong token kind");
                None
            }
            Err(e) => {
                debug!(error = %e, "reset verify rejected");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_tokens() -> AuthTokens {
        let state = AppState::fake();
        AuthTokens::from_ref(&state)
    }

    #[tokio::test]
    async fn sign_and_verify_session_token() {
        let tokens = make_tokens();
        let token = tokens.sign_session(7, false).expect("sign session");
        let claims = tokens.verify_session(&token).expect("verify session");
        assert_eq!(claims.sub, 7);
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
        assert_eq!(claims.kind, TokenKind::Session);
    }

    #[tokio::test]
    async fn remember_session_expires_later() {
        let tokens = make_tokens();
        let short = tokens.sign_session(7, false).expect("sign short");
        let long = tokens.sign_session(7, true).expect("sign long");
        let short_exp = tokens.verify_session(&short).expect("verify short").exp;
        let long_exp = tokens.verify_session(&long).expect("verify long").exp;
        assert!(long_exp > short_exp);
    }

    #[tokio::test]
    async fn reset_roundtrip_returns_subject() {
        let tokens = make_tokens();
        let token = tokens.issue_reset(42).expect("issue reset");
        assert_eq!(tokens.verify_reset(&token), Some(42));
    }

    #[tokio::test]
    async fn reset_valid_just_before_expiry_invalid_just_after() {
        let tokens = make_tokens();
        // ttl is 1800 s; shift issuance into the past to probe the boundary.
        let now = OffsetDateTime::now_utc();
        let almost = tokens
            .issue_reset_at(42, now - TimeDuration::seconds(1799))
            .expect("issue");
        assert_eq!(tokens.verify_reset(&almost), Some(42));

        let expired = tokens
            .issue_reset_at(42, now - TimeDuration::seconds(1801))
            .expect("issue");
        assert_eq!(tokens.verify_reset(&expired), None);
    }

    #[tokio::test]
    async fn reset_rejects_wrong_secret() {
        let tokens = make_tokens();
        let mut other = make_tokens();
        other.encoding = EncodingKey::from_secret(b"other-secret");
        let token = other.issue_reset(42).expect("issue");
        assert_eq!(tokens.verify_reset(&token), None);
    }

    #[tokio::test]
    async fn reset_rejects_malformed_and_truncated() {
        let tokens = make_tokens();
        assert_eq!(tokens.verify_reset(""), None);
        assert_eq!(tokens.verify_reset("not-a-token"), None);
        assert_eq!(tokens.verify_reset("a.b.c"), None);

        let token = tokens.issue_reset(42).expect("issue");
        let truncated = &token[..token.len() - 5];
        assert_eq!(tokens.verify_reset(truncated), None);
    }

    #[tokio::test]
    async fn reset_verifies_repeatedly_until_expiry() {
        // No single-use invalidation: redemption is pure computation.
        let tokens = make_tokens();
        let token = tokens.issue_reset(42).expect("issue");
        assert_eq!(tokens.verify_reset(&token), Some(42));
        assert_eq!(tokens.verify_reset(&token), Some(42));
    }

    #[tokio::test]
    async fn kinds_do_not_cross() {
        let tokens = make_tokens();
        let session = tokens.sign_session(7, false).expect("sign session");
        assert_eq!(tokens.verify_reset(&session), None);

        let reset = tokens.issue_reset(7).expect("issue reset");
        let err = tokens.verify_session(&reset).unwrap_err();
        assert!(err.to_string().contains("not a session token"));
    }
}
