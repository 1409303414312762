use std::fmt;

use anyhow::Result;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::Secret;
use crate::error::TrendError;

pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// How the store authenticates against the Sheets API.
#[derive(Debug, Clone)]
pub enum GoogleCredentials {
  /// A ready-made OAuth2 access token.
  AccessToken(Secret),
  /// A service-account key exchanged for an access token at start-up.
  ServiceAccount(ServiceAccountKey),
}

/// The fields of a service-account key file needed to mint a token.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
  pub client_email: String,
  pub private_key: String,
  #[serde(default = "default_token_uri")]
  pub token_uri: String,
}

fn default_token_uri() -> String {
  DEFAULT_TOKEN_URI.to_string()
}

impl fmt::Debug for ServiceAccountKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ServiceAccountKey")
      .field("client_email", &self.client_email)
      .field("private_key", &"****")
      .field("token_uri", &self.token_uri)
      .finish()
  }
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
  iss: &'a str,
  scope: &'a str,
  aud: &'a str,
  iat: i64,
  exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
  access_token: String,
}

impl ServiceAccountKey {
  pub fn from_json(raw: &str) -> Result<Self> {
    serde_json::from_str(raw)
      .map_err(|e| TrendError::config(format!("invalid service-account key JSON: {e}")).into())
  }

  /// RS256 JWT asserting this account's identity for the spreadsheets scope.
  pub fn signed_assertion(&self, issued_at: i64) -> Result<String> {
    let key = EncodingKey::from_rsa_pem(self.private_key.as_bytes())
      .map_err(|e| TrendError::auth(format!("invalid service-account private key: {e}")))?;
    let claims = Claims {
      iss: &self.client_email,
      scope: SHEETS_SCOPE,
      aud: &self.token_uri,
      iat: issued_at,
      exp: issued_at + ASSERTION_LIFETIME_SECS,
    };

    encode(&Header::new(Algorithm::RS256), &claims, &key)
      .map_err(|e| TrendError::auth(format!("failed to sign token assertion: {e}")).into())
  }
}

/// Resolve the credentials to a bearer token for the Sheets API.
pub async fn access_token(http: &Client, credentials: &GoogleCredentials) -> Result<String> {
  match credentials {
    GoogleCredentials::AccessToken(token) => Ok(token.expose().to_string()),
    GoogleCredentials::ServiceAccount(key) => exchange_assertion(http, key).await,
  }
}

async fn exchange_assertion(http: &Client, key: &ServiceAccountKey) -> Result<String> {
  let assertion = key.signed_assertion(Utc::now().timestamp())?;

  bentley::debug(&format!("Requesting Sheets access token for {}", key.client_email));
  let response = http
    .post(&key.token_uri)
    .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
    .send()
    .await
    .map_err(|e| TrendError::auth(format!("token request to {} failed: {e}", key.token_uri)))?;

  let status = response.status();
  if !status.is_success() {
    let body = response.text().await.unwrap_or_default();
    return Err(TrendError::auth(format!("token endpoint returned HTTP {status}: {body}")).into());
  }

  let token: TokenResponse = response
    .json()
    .await
    .map_err(|e| TrendError::auth(format!("unreadable token response: {e}")))?;

  Ok(token.access_token)
}

#[cfg(test)]
mod tests {
  use super::*;
  use jsonwebtoken::{decode, DecodingKey, Validation};
  use mockito::{Matcher, Server};

  const TEST_KEY: &str = include_str!("../../tests/fixtures/test_service_account.pem");

  fn key_for(token_uri: &str) -> ServiceAccountKey {
    ServiceAccountKey {
      client_email: "digest@trends.iam.gserviceaccount.com".to_string(),
      private_key: TEST_KEY.to_string(),
      token_uri: token_uri.to_string(),
    }
  }

  fn auth_message(error: anyhow::Error) -> String {
    match error.downcast_ref::<TrendError>() {
      Some(TrendError::Auth { message }) => message.clone(),
      other => panic!("Expected Auth error, got: {other:?}"),
    }
  }

  #[test]
  fn test_signed_assertion_claims() {
    let key = key_for("https://oauth2.example.com/token");
    let jwt = key.signed_assertion(1_700_000_000).unwrap();

    let mut validation = Validation::new(Algorithm::RS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.set_audience(&["https://oauth2.example.com/token"]);

    let decoded =
      decode::<serde_json::Value>(&jwt, &DecodingKey::from_secret(&[]), &validation).unwrap();

    assert_eq!(decoded.header.alg, Algorithm::RS256);
    assert_eq!(decoded.claims["iss"], "digest@trends.iam.gserviceaccount.com");
    assert_eq!(decoded.claims["scope"], SHEETS_SCOPE);
    assert_eq!(decoded.claims["iat"], 1_700_000_000);
    assert_eq!(decoded.claims["exp"], 1_700_003_600);
  }

  #[test]
  fn test_invalid_private_key_is_auth_error() {
    let mut key = key_for(DEFAULT_TOKEN_URI);
    key.private_key = "not a pem".to_string();

    let message = auth_message(key.signed_assertion(0).unwrap_err());
    assert!(message.contains("invalid service-account private key"));
  }

  #[test]
  fn test_key_json_defaults_token_uri() {
    let key = ServiceAccountKey::from_json(r#"{"client_email":"a@b","private_key":"pem"}"#).unwrap();
    assert_eq!(key.token_uri, DEFAULT_TOKEN_URI);
    assert!(!format!("{key:?}").contains("pem"));
  }

  #[tokio::test]
  async fn test_access_token_passthrough() {
    let credentials = GoogleCredentials::AccessToken(Secret::new("ya29.direct"));
    let token = access_token(&Client::new(), &credentials).await.unwrap();
    assert_eq!(token, "ya29.direct");
  }

  #[tokio::test]
  async fn test_service_account_exchange() {
    let mut server = Server::new_async().await;
    let mock = server
      .mock("POST", "/token")
      .match_body(Matcher::AllOf(vec![
        Matcher::UrlEncoded("grant_type".into(), JWT_BEARER_GRANT.into()),
        Matcher::Regex("assertion=".into()),
      ]))
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body(r#"{"access_token":"ya29.minted","expires_in":3599,"token_type":"Bearer"}"#)
      .create_async()
      .await;

    let credentials = GoogleCredentials::ServiceAccount(key_for(&format!("{}/token", server.url())));
    let token = access_token(&Client::new(), &credentials).await.unwrap();

    assert_eq!(token, "ya29.minted");
    mock.assert_async().await;
  }

  #[tokio::test]
  async fn test_service_account_exchange_rejected() {
    let mut server = Server::new_async().await;
    let _mock = server
      .mock("POST", "/token")
      .with_status(400)
      .with_body(r#"{"error":"invalid_grant"}"#)
      .create_async()
      .await;

    let credentials = GoogleCredentials::ServiceAccount(key_for(&format!("{}/token", server.url())));
    let message = auth_message(access_token(&Client::new(), &credentials).await.unwrap_err());

    assert!(message.contains("HTTP 400"));
    assert!(message.contains("invalid_grant"));
  }
}
