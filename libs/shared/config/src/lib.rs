use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub notes_encryption_key: String,
    pub sms_gateway_url: String,
    pub sms_enabled: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            notes_encryption_key: env::var("NOTES_ENCRYPTION_KEY")
                .unwrap_or_else(|_| {
                    warn!("NOTES_ENCRYPTION_KEY not set, medical notes cannot be stored");
                    String::new()
                }),
            sms_gateway_url: env::var("SMS_GATEWAY_URL")
                .unwrap_or_else(|_| String::new()),
            sms_enabled: env::var("SMS_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    pub fn is_notifications_configured(&self) -> bool {
        !self.sms_enabled || !self.sms_gateway_url.is_empty()
    }
}
