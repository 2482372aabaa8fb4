//! Process configuration, read once from the environment at startup.

use merchstore_notify::EmailBranding;

/// Everything the server needs from its environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// HS256 signing secret for admin tokens.
    pub jwt_secret: String,
    /// Admin login name for the credentials flow.
    pub admin_username: String,
    /// bcrypt hash of the admin password. Login is disabled when unset.
    pub admin_password_hash: Option<String>,
    /// Shared secret expected in `x-api-key` on cron endpoints.
    pub cron_api_key: String,
    /// Base URL of the campus CAS server, without the trailing path.
    pub cas_base_url: String,
    /// CAS net ids allowed to log in. Empty list rejects all CAS logins.
    pub cas_allowed_users: Vec<String>,
    /// Resend API key; emails are recorded instead of sent when unset.
    pub resend_api_key: Option<String>,
    /// From address for outgoing order emails.
    pub email_from: String,
    /// Store identity used in email subjects and bodies.
    pub branding: EmailBranding,
    /// Postgres connection string; in-memory event store when unset.
    pub database_url: Option<String>,
    /// Socket address to listen on.
    pub bind_addr: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| {
            tracing::warn!("JWT_SECRET not set; using insecure dev default");
            "dev-secret".to_string()
        });

        let cron_api_key = std::env::var("CRON_API_KEY").unwrap_or_else(|_| {
            tracing::warn!("CRON_API_KEY not set; using insecure dev default");
            "dev-cron-key".to_string()
        });

        Self {
            jwt_secret,
            admin_username: std::env::var("ADMIN_USERNAME").unwrap_or_else(|_| "admin".to_string()),
            admin_password_hash: std::env::var("ADMIN_PASSWORD_HASH").ok(),
            cron_api_key,
            cas_base_url: std::env::var("CAS_BASE_URL")
                .unwrap_or_else(|_| "https://secure.its.yale.edu/cas".to_string()),
            cas_allowed_users: std::env::var("CAS_ALLOWED_USERS")
                .map(|raw| split_csv(&raw))
                .unwrap_or_default(),
            resend_api_key: std::env::var("RESEND_API_KEY").ok(),
            email_from: std::env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "orders@merchstore.dev".to_string()),
            branding: EmailBranding {
                store_name: std::env::var("STORE_NAME").unwrap_or_else(|_| "Merch Store".to_string()),
                contact_handle: std::env::var("DISCORD_CONTACT")
                    .unwrap_or_else(|_| "@merchstore".to_string()),
            },
            database_url: std::env::var("DATABASE_URL").ok(),
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
        }
    }
}

fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_splitting_trims_and_drops_empties() {
        assert_eq!(split_csv("abc, def ,,ghi"), vec!["abc", "def", "ghi"]);
        assert_eq!(split_csv(""), Vec::<String>::new());
    }
}
