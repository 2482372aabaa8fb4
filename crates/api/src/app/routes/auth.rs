use std::sync::Arc;

use axum::{
    Json, Router, extract::Extension, http::StatusCode, response::IntoResponse, routing::post,
};
use chrono::Utc;

use merchstore_auth::{
    Credential, CredentialError, InMemoryCredentialStore, JwtClaims, PrincipalId, Role,
    parse_service_validate, verify_login,
};

use crate::app::{dto, errors};
use crate::config::AppConfig;
use crate::jwt;

/// Everything the login flows need: the credential store, the CAS client
/// configuration, and the token signing secret.
pub struct AuthServices {
    jwt_secret: String,
    credentials: InMemoryCredentialStore,
    cas_base_url: String,
    cas_allowed_users: Vec<String>,
    pub(crate) cron_api_key: String,
    http: reqwest::Client,
}

impl AuthServices {
    pub fn from_config(config: &AppConfig) -> Self {
        let credentials = InMemoryCredentialStore::new();
        match &config.admin_password_hash {
            Some(hash) => {
                let seeded = credentials.insert(Credential {
                    principal_id: PrincipalId::new(),
                    username: config.admin_username.clone(),
                    password_hash: hash.clone(),
                    roles: vec![Role::ADMIN],
                });
                if seeded.is_err() {
                    tracing::error!("failed to seed the admin credential");
                }
            }
            None => {
                tracing::warn!("ADMIN_PASSWORD_HASH not set; credentials login is disabled");
            }
        }

        Self {
            jwt_secret: config.jwt_secret.clone(),
            credentials,
            cas_base_url: config.cas_base_url.trim_end_matches('/').to_string(),
            cas_allowed_users: config.cas_allowed_users.clone(),
            cron_api_key: config.cron_api_key.clone(),
            http: reqwest::Client::new(),
        }
    }

    fn token_response(&self, claims: &JwtClaims) -> axum::response::Response {
        match jwt::issue_token(self.jwt_secret.as_bytes(), claims) {
            Ok(token) => (
                StatusCode::OK,
                Json(serde_json::json!({
                    "token": token,
                    "expires_at": claims.expires_at,
                })),
            )
                .into_response(),
            Err(e) => {
                tracing::error!(error = %e, "token signing failed");
                errors::json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "token_error",
                    "could not issue token",
                )
            }
        }
    }
}

pub fn router() -> Router {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/cas", post(cas_login))
}

pub async fn login(
    Extension(auth): Extension<Arc<AuthServices>>,
    Json(body): Json<dto::LoginRequest>,
) -> axum::response::Response {
    let credential = match verify_login(&auth.credentials, &body.username, &body.password) {
        Ok(c) => c,
        Err(CredentialError::InvalidCredentials) => {
            return errors::json_error(
                StatusCode::UNAUTHORIZED,
                "invalid_credentials",
                "invalid username or password",
            );
        }
        Err(e) => {
            tracing::error!(error = %e, "credential check failed");
            return errors::json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "auth_error",
                "login unavailable",
            );
        }
    };

    let claims = jwt::claims_for(
        credential.principal_id,
        credential.username,
        credential.roles,
        Utc::now(),
    );
    auth.token_response(&claims)
}

/// Validate a CAS service ticket and issue a store token.
///
/// The CAS server only proves who the user is; whether that user may
/// administer the store comes from the configured allowlist.
pub async fn cas_login(
    Extension(auth): Extension<Arc<AuthServices>>,
    Json(body): Json<dto::CasLoginRequest>,
) -> axum::response::Response {
    let url = format!("{}/serviceValidate", auth.cas_base_url);
    let response = match auth
        .http
        .get(&url)
        .query(&[("ticket", &body.ticket), ("service", &body.service)])
        .send()
        .await
    {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(error = %e, "CAS server unreachable");
            return errors::json_error(
                StatusCode::BAD_GATEWAY,
                "cas_unreachable",
                "could not reach the CAS server",
            );
        }
    };

    let xml = match response.text().await {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(error = %e, "CAS response unreadable");
            return errors::json_error(
                StatusCode::BAD_GATEWAY,
                "cas_unreachable",
                "could not read the CAS response",
            );
        }
    };

    let Some(success) = parse_service_validate(&xml) else {
        return errors::json_error(StatusCode::UNAUTHORIZED, "invalid_ticket", "ticket rejected");
    };

    if !auth.cas_allowed_users.iter().any(|u| u == &success.username) {
        tracing::warn!(username = %success.username, "CAS user not on the admin allowlist");
        return errors::json_error(
            StatusCode::FORBIDDEN,
            "not_allowed",
            "this account may not administer the store",
        );
    }

    let claims = jwt::claims_for(
        PrincipalId::new(),
        success.username,
        vec![Role::ADMIN],
        Utc::now(),
    );
    auth.token_response(&claims)
}
