use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use shared_config::AppConfig;

/// Storage-layer failure, with enough structure that callers can tell a
/// lost uniqueness race apart from a plain API error.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Unique constraint violated ({constraint}): {message}")]
    Conflict { constraint: String, message: String },

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

pub struct PostgrestClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl PostgrestClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.clone(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn headers(&self, auth_token: Option<&str>, prefer: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();

        headers.insert("apikey", HeaderValue::from_str(&self.anon_key).unwrap());
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
            );
        }

        if let Some(prefer) = prefer {
            headers.insert("Prefer", HeaderValue::from_str(prefer).unwrap());
        }

        headers
    }

    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
    ) -> Result<T, DbError>
    where
        T: DeserializeOwned,
    {
        self.request_with_prefer(method, path, auth_token, body, None)
            .await
    }

    /// Insert that asks the store to echo the written row back.
    pub async fn insert<T>(
        &self,
        path: &str,
        auth_token: Option<&str>,
        body: Value,
    ) -> Result<T, DbError>
    where
        T: DeserializeOwned,
    {
        self.request_with_prefer(
            Method::POST,
            path,
            auth_token,
            Some(body),
            Some("return=representation"),
        )
        .await
    }

    /// Partial update returning the rows that matched the filter. An empty
    /// result means the filter matched nothing, which callers use to detect
    /// guarded updates that lost a race.
    pub async fn update<T>(
        &self,
        path: &str,
        auth_token: Option<&str>,
        body: Value,
    ) -> Result<T, DbError>
    where
        T: DeserializeOwned,
    {
        self.request_with_prefer(
            Method::PATCH,
            path,
            auth_token,
            Some(body),
            Some("return=representation"),
        )
        .await
    }

    pub async fn request_with_prefer<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        prefer: Option<&str>,
    ) -> Result<T, DbError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making request to {}", url);

        let headers = self.headers(auth_token, prefer);

        let mut req = self.client.request(method, &url).headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req
            .send()
            .await
            .map_err(|e| DbError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .map_err(|e| DbError::Transport(e.to_string()))?;
            error!("API error ({}): {}", status, error_text);

            return Err(classify_error(status, error_text));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| DbError::Decode(e.to_string()))
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}

fn classify_error(status: StatusCode, body: String) -> DbError {
    match status.as_u16() {
        401 | 403 => DbError::Auth(body),
        404 => DbError::NotFound(body),
        409 => DbError::Conflict {
            constraint: extract_constraint(&body),
            message: body,
        },
        code => DbError::Api {
            status: code,
            message: body,
        },
    }
}

/// Pull the constraint name out of a Postgres unique-violation message,
/// e.g. `duplicate key value violates unique constraint "appointments_slot_key"`.
/// Works on both the raw message and the JSON-escaped form PostgREST returns.
fn extract_constraint(body: &str) -> String {
    body.find("constraint")
        .and_then(|idx| body[idx..].split('"').nth(1))
        .map(|s| s.trim_matches('\\').to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_extracts_constraint_name() {
        let raw = "duplicate key value violates unique constraint \"appointments_slot_active_key\"";
        assert_eq!(extract_constraint(raw), "appointments_slot_active_key");

        let json = r#"{"code":"23505","message":"duplicate key value violates unique constraint \"appointments_slot_active_key\""}"#;
        assert_eq!(extract_constraint(json), "appointments_slot_active_key");
    }

    #[test]
    fn constraint_falls_back_when_absent() {
        assert_eq!(extract_constraint("no quotes here"), "unknown");
    }

    #[test]
    fn status_classification() {
        assert!(matches!(
            classify_error(StatusCode::CONFLICT, "x".into()),
            DbError::Conflict { .. }
        ));
        assert!(matches!(
            classify_error(StatusCode::UNAUTHORIZED, "x".into()),
            DbError::Auth(_)
        ));
        assert!(matches!(
            classify_error(StatusCode::NOT_FOUND, "x".into()),
            DbError::NotFound(_)
        ));
        assert!(matches!(
            classify_error(StatusCode::INTERNAL_SERVER_ERROR, "x".into()),
            DbError::Api { status: 500, .. }
        ));
    }
}
