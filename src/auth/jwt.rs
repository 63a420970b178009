use std::time::Duration;

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;

use super::claims::{Claims, Identity};
use crate::{accounts::model::Account, config::JwtConfig};

/// Signing and verification keys, built once from [`JwtConfig`].
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl JwtKeys {
    pub fn from_config(cfg: &JwtConfig) -> anyhow::Result<Self> {
        anyhow::ensure!(!cfg.secret.is_empty(), "JWT secret is empty");
        anyhow::ensure!(!cfg.expiry.is_zero(), "JWT expiry must be positive");
        Ok(Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            ttl: cfg.expiry,
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Mints a fresh session token from the account's current state.
    pub fn issue(&self, account: &Account) -> anyhow::Result<String> {
        self.issue_at(account, OffsetDateTime::now_utc())
    }

    pub(crate) fn issue_at(&self, account: &Account, now: OffsetDateTime) -> anyhow::Result<String> {
        let exp = now + TimeDuration::seconds(self.ttl.as_secs() as i64);
        let claims = Claims {
            sub: account.id,
            role: account.role,
            subscription: account.subscription.clone(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        debug!(account_id = %account.id, role = %account.role, "jwt signed");
        Ok(token)
    }

    /// Checks signature, expiry, issuer and audience.
    pub fn verify(&self, token: &str) -> anyhow::Result<Identity> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(account_id = %data.claims.sub, "jwt verified");
        Ok(data.claims.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::model::{Role, Subscription};
    use crate::config::AppConfig;

    fn keys_with(secret: &str, issuer: &str, audience: &str) -> JwtKeys {
        let mut cfg = AppConfig::test_default().jwt;
        cfg.secret = secret.into();
        cfg.issuer = issuer.into();
        cfg.audience = audience.into();
        JwtKeys::from_config(&cfg).expect("keys")
    }

    fn account() -> Account {
        let mut acc = Account::new_registration("grace hopper", "grace@example.com", "cobol-4-ever");
        acc.role = Role::Admin;
        acc.subscription = Some(Subscription {
            id: Some("sub_123".into()),
            status: Some("active".into()),
        });
        acc
    }

    #[test]
    fn issue_and_verify_round_trip() {
        let keys = keys_with("dev-secret", "iss", "aud");
        let acc = account();
        let token = keys.issue(&acc).expect("issue");
        let identity = keys.verify(&token).expect("verify");
        assert_eq!(identity.id, acc.id);
        assert_eq!(identity.role, Role::Admin);
        assert_eq!(identity.subscription, acc.subscription);
    }

    #[test]
    fn expired_token_is_rejected() {
        let keys = keys_with("dev-secret", "iss", "aud");
        let issued = OffsetDateTime::now_utc() - TimeDuration::seconds(keys.ttl().as_secs() as i64 + 5);
        let token = keys.issue_at(&account(), issued).expect("issue");
        assert!(keys.verify(&token).is_err());
    }

    #[test]
    fn other_secret_is_rejected() {
        let token = keys_with("secret-a", "iss", "aud").issue(&account()).unwrap();
        assert!(keys_with("secret-b", "iss", "aud").verify(&token).is_err());
    }

    #[test]
    fn wrong_issuer_or_audience_is_rejected() {
        let token = keys_with("same", "good-iss", "good-aud").issue(&account()).unwrap();
        assert!(keys_with("same", "bad-iss", "good-aud").verify(&token).is_err());
        assert!(keys_with("same", "good-iss", "bad-aud").verify(&token).is_err());
    }

    #[test]
    fn empty_secret_is_a_config_error() {
        let mut cfg = AppConfig::test_default().jwt;
        cfg.secret.clear();
        assert!(JwtKeys::from_config(&cfg).is_err());
    }

    #[test]
    fn garbage_token_is_rejected() {
        let keys = keys_with("dev-secret", "iss", "aud");
        assert!(keys.verify("not.a.jwt").is_err());
    }
}
