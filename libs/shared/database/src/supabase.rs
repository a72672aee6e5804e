use anyhow::{Result, anyhow};
use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION},
    Method,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use shared_config::AppConfig;

/// Failure reported by a Supabase endpoint. Carried inside `anyhow::Error`
/// so services can `downcast_ref` when they care about the kind.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SupabaseError {
    #[error("Authentication error: {0}")]
    Unauthorized(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
}

impl SupabaseError {
    pub fn is_conflict(err: &anyhow::Error) -> bool {
        matches!(err.downcast_ref::<SupabaseError>(), Some(SupabaseError::Conflict(_)))
    }

    pub fn is_not_found(err: &anyhow::Error) -> bool {
        matches!(err.downcast_ref::<SupabaseError>(), Some(SupabaseError::NotFound(_)))
    }

    fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => SupabaseError::Unauthorized(body),
            404 => SupabaseError::NotFound(body),
            // PostgREST reports unique violations (23505) as 409
            409 => SupabaseError::Conflict(body),
            _ => SupabaseError::Api { status, message: body },
        }
    }
}

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.clone(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        headers.insert("apikey", HeaderValue::from_str(&self.anon_key)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let bearer = auth_token.unwrap_or(&self.anon_key);
        if !bearer.is_empty() {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", bearer))?,
            );
        }

        Ok(headers)
    }

    /// `Prefer: return=representation`, so PostgREST writes echo the affected rows.
    pub fn representation_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        headers
    }

    pub async fn request<T>(&self, method: Method, path: &str,
                            auth_token: Option<&str>, body: Option<Value>)
                            -> Result<T>
    where T: DeserializeOwned {
        self.request_with_headers(method, path, auth_token, body, None).await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<T>
    where T: DeserializeOwned {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers(auth_token)?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url)
            .headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);
            return Err(SupabaseError::from_status(status.as_u16(), error_text).into());
        }

        // DELETE and PATCH without representation answer with an empty body
        let text = response.text().await?;
        if text.trim().is_empty() {
            return serde_json::from_value(Value::Null)
                .map_err(|e| anyhow!("Empty response body: {}", e));
        }

        Ok(serde_json::from_str::<T>(&text)?)
    }

    /// Upload raw bytes to Supabase Storage and return the public URL of the object.
    pub async fn upload_object(
        &self,
        bucket: &str,
        object_path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        auth_token: Option<&str>,
    ) -> Result<String> {
        let url = format!("{}/storage/v1/object/{}/{}", self.base_url, bucket, object_path);
        debug!("Uploading {} bytes to {}", bytes.len(), url);

        let mut headers = self.get_headers(auth_token)?;
        headers.insert(CONTENT_TYPE, HeaderValue::from_str(content_type)?);
        headers.insert("x-upsert", HeaderValue::from_static("true"));

        let response = self.client.post(&url)
            .headers(headers)
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("Storage upload failed ({}): {}", status, error_text);
            return Err(SupabaseError::from_status(status.as_u16(), error_text).into());
        }

        Ok(self.get_public_url(bucket, object_path))
    }

    pub async fn delete_object(
        &self,
        bucket: &str,
        object_path: &str,
        auth_token: Option<&str>,
    ) -> Result<()> {
        let path = format!("/storage/v1/object/{}/{}", bucket, object_path);
        let _: Value = self.request(Method::DELETE, &path, auth_token, None).await?;
        Ok(())
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }

    pub fn get_public_url(&self, bucket: &str, object_path: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.base_url, bucket, object_path)
    }
}
