//! Bearer token issuance, verification, and revocation.
//!
//! Tokens are signed JWTs binding `{user_id, issued_at}`. The signing key
//! is derived from the process-wide secret combined with the user's current
//! token secret, so rotating that secret (revocation) invalidates every
//! previously issued token without a blocklist. The verifier cannot
//! distinguish a revoked token from a forged one; that information-hiding
//! is deliberate.

use base64::{Engine as _, engine::general_purpose};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::prelude::RngExt;
use rand::rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{
    config::Config,
    db::models::users::UserDBResponse,
    errors::Error,
    store::CredentialStore,
    types::UserId,
};

const CONFIRMATION_PURPOSE: &str = "account-confirmation";

/// Claims carried by an API auth token
#[derive(Debug, Serialize, Deserialize)]
struct AuthTokenClaims {
    sub: UserId,
    iat: i64,
    exp: i64,
}

/// Claims carried by an account-confirmation token
#[derive(Debug, Serialize, Deserialize)]
struct ConfirmationClaims {
    sub: UserId,
    purpose: String,
    iat: i64,
    exp: i64,
}

/// Generate a fresh per-user token secret: 256 bits of cryptographically
/// secure random data, base64url without padding.
pub fn generate_token_secret() -> String {
    let mut secret_bytes = [0u8; 32];
    rng().fill(&mut secret_bytes);

    general_purpose::URL_SAFE_NO_PAD.encode(secret_bytes)
}

/// Derive the per-user signing key from the process secret and the user's
/// current token secret.
fn signing_key(secret_key: &str, token_secret: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(secret_key.as_bytes());
    hasher.update(b".");
    hasher.update(token_secret.as_bytes());
    hasher.finalize().to_vec()
}

fn process_secret(config: &Config) -> Result<&str, Error> {
    config.secret_key.as_deref().ok_or_else(|| Error::Internal {
        operation: "sign token: secret_key is required".to_string(),
    })
}

/// Issue an auth token for a user. Issuance does not mutate persisted
/// state.
pub fn issue(user: &UserDBResponse, config: &Config) -> Result<String, Error> {
    let secret_key = process_secret(config)?;
    let now = Utc::now();
    let claims = AuthTokenClaims {
        sub: user.id,
        iat: now.timestamp(),
        exp: (now + config.auth.token_ttl).timestamp(),
    };

    let key = EncodingKey::from_secret(&signing_key(secret_key, &user.token_secret));
    encode(&Header::default(), &claims, &key).map_err(|e| Error::Internal {
        operation: format!("create auth token: {e}"),
    })
}

/// Verify an auth token.
///
/// Returns `(None, false)` when the token is malformed, forged, revoked,
/// or names an unknown user; `(Some(user), true)` when the signature is
/// authentic but the validity window has elapsed; `(Some(user), false)`
/// on full success. Errors are reserved for store failures.
pub async fn verify(token: &str, store: &dyn CredentialStore, config: &Config) -> Result<(Option<UserDBResponse>, bool), Error> {
    let secret_key = process_secret(config)?;

    // Read the subject claim before any signature check: the signing key
    // depends on the user's current token secret.
    let mut peek = Validation::new(Algorithm::HS256);
    peek.insecure_disable_signature_validation();
    peek.validate_exp = false;
    let Ok(unverified) = decode::<AuthTokenClaims>(token, &DecodingKey::from_secret(&[]), &peek) else {
        return Ok((None, false));
    };

    let Some(user) = store.find_by_id(unverified.claims.sub).await? else {
        return Ok((None, false));
    };

    let key = DecodingKey::from_secret(&signing_key(secret_key, &user.token_secret));
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    if decode::<AuthTokenClaims>(token, &key, &validation).is_err() {
        // Forged, or revoked: the rotated secret changes the signing key
        return Ok((None, false));
    }

    let expired = unverified.claims.exp <= Utc::now().timestamp();
    Ok((Some(user), expired))
}

/// Revoke all tokens previously issued for a user by rotating the per-user
/// token secret. The rotation is persisted before this returns.
pub async fn revoke(store: &dyn CredentialStore, user_id: UserId) -> Result<(), Error> {
    store.rotate_token_secret(user_id, &generate_token_secret()).await?;
    Ok(())
}

/// Issue an account-confirmation token, signed with the process secret and
/// tagged with a purpose so it cannot stand in for an auth token.
pub fn issue_confirmation(user_id: UserId, config: &Config) -> Result<String, Error> {
    let secret_key = process_secret(config)?;
    let now = Utc::now();
    let claims = ConfirmationClaims {
        sub: user_id,
        purpose: CONFIRMATION_PURPOSE.to_string(),
        iat: now.timestamp(),
        exp: (now + config.auth.confirmation_ttl).timestamp(),
    };

    let key = EncodingKey::from_secret(secret_key.as_bytes());
    encode(&Header::default(), &claims, &key).map_err(|e| Error::Internal {
        operation: format!("create confirmation token: {e}"),
    })
}

/// Redeem an account-confirmation token, returning the confirmed user id.
pub fn verify_confirmation(token: &str, config: &Config) -> Result<UserId, Error> {
    let secret_key = process_secret(config)?;
    let key = DecodingKey::from_secret(secret_key.as_bytes());
    let validation = Validation::new(Algorithm::HS256);

    let data = decode::<ConfirmationClaims>(token, &key, &validation).map_err(|_| Error::BadRequest {
        message: "Invalid or expired confirmation token".to_string(),
    })?;

    if data.claims.purpose != CONFIRMATION_PURPOSE {
        return Err(Error::BadRequest {
            message: "Invalid or expired confirmation token".to_string(),
        });
    }

    Ok(data.claims.sub)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{TestUser, seeded_store, test_config};

    #[tokio::test]
    async fn test_issue_and_verify_round_trip() {
        let config = test_config();
        let store = seeded_store();
        let user = TestUser::confirmed("ALICE@EXAMPLE.COM").create(&store).await;

        let token = issue(&user, &config).unwrap();
        let (matched, expired) = verify(&token, &store, &config).await.unwrap();

        let matched = matched.expect("token should match the issuing user");
        assert_eq!(matched.id, user.id);
        assert!(!expired);
    }

    #[tokio::test]
    async fn test_expired_token_still_names_its_user() {
        let config = test_config();
        let store = seeded_store();
        let user = TestUser::confirmed("BOB@EXAMPLE.COM").create(&store).await;

        // Craft a token whose validity window has already elapsed
        let now = Utc::now();
        let claims = AuthTokenClaims {
            sub: user.id,
            iat: (now - chrono::Duration::seconds(7200)).timestamp(),
            exp: (now - chrono::Duration::seconds(3600)).timestamp(),
        };
        let key = EncodingKey::from_secret(&signing_key(config.secret_key.as_deref().unwrap(), &user.token_secret));
        let token = encode(&Header::default(), &claims, &key).unwrap();

        let (matched, expired) = verify(&token, &store, &config).await.unwrap();

        // Expired is distinct from invalid: the user is still identified
        assert_eq!(matched.map(|u| u.id), Some(user.id));
        assert!(expired);
    }

    #[tokio::test]
    async fn test_revocation_invalidates_prior_tokens() {
        let config = test_config();
        let store = seeded_store();
        let user = TestUser::confirmed("CAROL@EXAMPLE.COM").create(&store).await;

        let before = issue(&user, &config).unwrap();
        revoke(&store, user.id).await.unwrap();

        let (matched, expired) = verify(&before, &store, &config).await.unwrap();
        assert!(matched.is_none());
        assert!(!expired);

        // Tokens issued after revocation verify normally
        let user = store.find_by_id(user.id).await.unwrap().unwrap();
        let after = issue(&user, &config).unwrap();
        let (matched, expired) = verify(&after, &store, &config).await.unwrap();
        assert_eq!(matched.map(|u| u.id), Some(user.id));
        assert!(!expired);
    }

    #[tokio::test]
    async fn test_malformed_tokens_are_invalid_not_expired() {
        let config = test_config();
        let store = seeded_store();

        for token in ["", "garbage", "not.a.token", "a.b.c.d.e"] {
            let (matched, expired) = verify(token, &store, &config).await.unwrap();
            assert!(matched.is_none(), "token {token:?} should not match");
            assert!(!expired);
        }
    }

    #[tokio::test]
    async fn test_unknown_subject_is_invalid() {
        let config = test_config();
        let store = seeded_store();

        let ghost = UserDBResponse {
            id: 4242,
            token_secret: generate_token_secret(),
            ..TestUser::confirmed("GHOST@EXAMPLE.COM").record()
        };
        let token = issue(&ghost, &config).unwrap();

        let (matched, expired) = verify(&token, &store, &config).await.unwrap();
        assert!(matched.is_none());
        assert!(!expired);
    }

    #[tokio::test]
    async fn test_wrong_process_secret_is_invalid() {
        let config = test_config();
        let store = seeded_store();
        let user = TestUser::confirmed("DAVE@EXAMPLE.COM").create(&store).await;

        let mut other = test_config();
        other.secret_key = Some("a-different-process-secret".to_string());
        let token = issue(&user, &other).unwrap();

        let (matched, _) = verify(&token, &store, &config).await.unwrap();
        assert!(matched.is_none());
    }

    #[test]
    fn test_token_secrets_are_unique() {
        let s1 = generate_token_secret();
        let s2 = generate_token_secret();
        assert_ne!(s1, s2);
        assert_eq!(s1.len(), 43);
        assert!(!s1.contains('='));
    }

    #[test]
    fn test_confirmation_round_trip() {
        let config = test_config();
        let token = issue_confirmation(17, &config).unwrap();
        assert_eq!(verify_confirmation(&token, &config).unwrap(), 17);
    }

    #[tokio::test]
    async fn test_auth_token_is_not_a_confirmation_token() {
        let config = test_config();
        let store = seeded_store();
        let user = TestUser::confirmed("EVE@EXAMPLE.COM").create(&store).await;

        let auth_token = issue(&user, &config).unwrap();
        assert!(verify_confirmation(&auth_token, &config).is_err());
    }

    #[tokio::test]
    async fn test_confirmation_token_is_not_an_auth_token() {
        let config = test_config();
        let store = seeded_store();
        let user = TestUser::unconfirmed("FRANK@EXAMPLE.COM").create(&store).await;

        let confirmation = issue_confirmation(user.id, &config).unwrap();
        let (matched, _) = verify(&confirmation, &store, &config).await.unwrap();
        assert!(matched.is_none());
    }
}
