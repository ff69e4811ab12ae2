use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::forge_client::ForgeError;

/// Claims for the short-lived app identity JWT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppTokenClaims {
    pub iat: u64,
    pub exp: u64,
    pub iss: String,
}

const ISSUED_AT_SKEW_SECONDS: u64 = 30;
const EXPIRY_WINDOW_SECONDS: u64 = 9 * 60;

impl AppTokenClaims {
    /// Backdates `iat` to absorb clock skew and keeps the token under the
    /// forge's ten-minute ceiling.
    pub fn for_app(app_id: &str, now_unix: u64) -> Self {
        Self {
            iat: now_unix.saturating_sub(ISSUED_AT_SKEW_SECONDS),
            exp: now_unix.saturating_add(EXPIRY_WINDOW_SECONDS),
            iss: app_id.to_string(),
        }
    }
}

/// Signs the app JWT with the configured RSA private key.
///
/// Accepts PKCS#8 or PKCS#1 PEM material.
pub fn mint_app_jwt(
    app_id: &str,
    private_key_pem: &str,
    now_unix: u64,
) -> Result<String, ForgeError> {
    let key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
        .map_err(|error| ForgeError::AppToken(format!("invalid RSA private key: {error}")))?;
    let claims = AppTokenClaims::for_app(app_id, now_unix);
    jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)
        .map_err(|error| ForgeError::AppToken(format!("failed to sign app jwt: {error}")))
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

    use super::{mint_app_jwt, AppTokenClaims};

    const TEST_KEY_PEM: &str = include_str!("../testdata/test_app_key.pem");
    const TEST_PUBLIC_KEY_PEM: &str = include_str!("../testdata/test_app_key.pub.pem");

    #[test]
    fn unit_claims_window_backdates_iat_and_caps_expiry() {
        let claims = AppTokenClaims::for_app("12345", 10_000);
        assert_eq!(claims.iat, 10_000 - 30);
        assert_eq!(claims.exp, 10_000 + 540);
        assert_eq!(claims.iss, "12345");
    }

    #[test]
    fn unit_claims_window_saturates_near_epoch() {
        let claims = AppTokenClaims::for_app("12345", 5);
        assert_eq!(claims.iat, 0);
    }

    #[test]
    fn functional_minted_jwt_round_trips_through_rs256_validation() {
        let now = 1_700_000_000_u64;
        let token = mint_app_jwt("12345", TEST_KEY_PEM, now).expect("mint jwt");

        let decoding_key = DecodingKey::from_rsa_pem(TEST_PUBLIC_KEY_PEM.as_bytes())
            .expect("parse public pem");
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = false;
        validation.set_required_spec_claims::<&str>(&[]);
        let decoded =
            decode::<AppTokenClaims>(&token, &decoding_key, &validation).expect("decode jwt");
        assert_eq!(decoded.claims, AppTokenClaims::for_app("12345", now));
    }

    #[test]
    fn unit_mint_rejects_garbage_key_material() {
        let error = mint_app_jwt("12345", "not a pem", 1_700_000_000).expect_err("bad key");
        assert!(error.to_string().contains("RSA private key"));
    }
}
