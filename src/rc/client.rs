use super::endpoints::{self, build_url};
use super::{RawFields, RcloneApi};
use crate::config::{OperationKind, RcSettings};
use crate::error::{AppError, AppResult};
use crate::interactive::InteractiveReply;
use crate::logging::sanitize_json;
use crate::schema::{BackendType, FieldDefinition};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

/// HTTP client for a running rclone daemon
pub struct RcClient {
    base_url: String,
    auth: Option<(String, String)>,
    client: reqwest::Client,
}

impl RcClient {
    pub fn new(settings: &RcSettings) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| AppError::Network(format!("Failed to create HTTP client: {}", e)))?;

        let auth = match (&settings.user, &settings.password) {
            (Some(user), Some(password)) if !user.is_empty() => {
                Some((user.clone(), password.clone()))
            }
            _ => None,
        };

        Ok(Self {
            base_url: settings.url.clone(),
            auth,
            client,
        })
    }

    async fn post_json(&self, endpoint: &str, body: &Value) -> AppResult<Value> {
        let url = build_url(&self.base_url, endpoint);
        tracing::debug!("POST {} {}", endpoint, sanitize_json(body));

        let mut request = self.client.post(&url).json(body);
        if let Some((user, password)) = &self.auth {
            request = request.basic_auth(user, Some(password));
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::Network(format!("Request to {} failed: {}", endpoint, e)))?;

        let status = response.status();
        let body_text = response.text().await.map_err(|e| {
            AppError::Network(format!("Reading reply from {} failed: {}", endpoint, e))
        })?;

        if !status.is_success() {
            return Err(AppError::Network(format!(
                "{} returned {}: {}",
                endpoint, status, body_text
            )));
        }

        decode_body(endpoint, &body_text)
    }
}

/// An empty body is an empty object; anything else must be JSON
fn decode_body(endpoint: &str, body_text: &str) -> AppResult<Value> {
    if body_text.trim().is_empty() {
        return Ok(json!({}));
    }
    serde_json::from_str(body_text).map_err(|e| {
        AppError::Network(format!("{} returned a non-JSON reply: {}", endpoint, e))
    })
}

pub(crate) fn parse_providers(raw: &Value) -> Vec<BackendType> {
    raw.get("providers")
        .and_then(Value::as_array)
        .map(|providers| {
            providers
                .iter()
                .filter_map(|p| BackendType::from_rclone(p).ok())
                .collect()
        })
        .unwrap_or_default()
}

pub(crate) fn parse_remotes(raw: &Value) -> Vec<String> {
    raw.get("remotes")
        .and_then(Value::as_array)
        .map(|remotes| {
            remotes
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

pub(crate) fn parse_flag_block(raw: &Value, block: &str) -> Vec<FieldDefinition> {
    raw.get(block)
        .map(FieldDefinition::list_from_rclone)
        .unwrap_or_default()
}

#[async_trait]
impl RcloneApi for RcClient {
    async fn get_remote_types(&self) -> AppResult<Vec<BackendType>> {
        let raw = self
            .post_json(endpoints::config::PROVIDERS, &json!({}))
            .await
            .map_err(|e| AppError::SchemaLoad(e.to_string()))?;
        Ok(parse_providers(&raw))
    }

    async fn get_flag_fields(&self, kind: OperationKind) -> AppResult<Vec<FieldDefinition>> {
        let block = kind.options_block();
        let raw = self
            .post_json(endpoints::options::INFO, &json!({ "blocks": block }))
            .await
            .map_err(|e| AppError::SchemaLoad(e.to_string()))?;
        Ok(parse_flag_block(&raw, block))
    }

    async fn list_remotes(&self) -> AppResult<Vec<String>> {
        let raw = self
            .post_json(endpoints::config::LISTREMOTES, &json!({}))
            .await?;
        Ok(parse_remotes(&raw))
    }

    async fn get_backend_entry(&self, name: &str) -> AppResult<RawFields> {
        let raw = self
            .post_json(endpoints::config::GET, &json!({ "name": name }))
            .await?;
        match raw {
            Value::Object(fields) => Ok(fields),
            other => Err(AppError::Config(format!(
                "Unexpected config/get reply for '{}': {}",
                name, other
            ))),
        }
    }

    async fn start_interactive_config(
        &self,
        name: &str,
        remote_type: &str,
        params: &RawFields,
    ) -> AppResult<InteractiveReply> {
        let body = json!({
            "name": name,
            "type": remote_type,
            "parameters": params,
            "opt": { "nonInteractive": true },
        });
        let raw = self
            .post_json(endpoints::config::CREATE, &body)
            .await
            .map_err(|e| AppError::InteractiveProtocol(e.to_string()))?;
        InteractiveReply::from_rclone(&raw)
    }

    async fn continue_interactive_config(
        &self,
        name: &str,
        state_token: &str,
        answer: &str,
        params: &RawFields,
    ) -> AppResult<InteractiveReply> {
        let body = json!({
            "name": name,
            "parameters": params,
            "opt": {
                "continue": true,
                "state": state_token,
                "result": answer,
                "nonInteractive": true,
            },
        });
        let raw = self
            .post_json(endpoints::config::UPDATE, &body)
            .await
            .map_err(|e| AppError::InteractiveProtocol(e.to_string()))?;
        InteractiveReply::from_rclone(&raw)
    }

    async fn cancel_interactive_config(&self, name: &str) -> AppResult<()> {
        // Drops the half-created entry left behind by an unfinished flow
        self.post_json(endpoints::config::DELETE, &json!({ "name": name }))
            .await
            .map_err(|e| AppError::InteractiveProtocol(e.to_string()))?;
        Ok(())
    }

    async fn create_backend_entry(&self, name: &str, fields: &RawFields) -> AppResult<()> {
        let remote_type = fields
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::Config("Missing remote type".to_string()))?
            .to_string();
        let mut parameters = fields.clone();
        parameters.remove("type");

        let body = json!({
            "name": name,
            "type": remote_type,
            "parameters": parameters,
        });
        self.post_json(endpoints::config::CREATE, &body).await?;
        Ok(())
    }

    async fn update_backend_entry(&self, name: &str, fields: &RawFields) -> AppResult<()> {
        let mut parameters = fields.clone();
        parameters.remove("type");
        let body = json!({ "name": name, "parameters": parameters });
        self.post_json(endpoints::config::UPDATE, &body).await?;
        Ok(())
    }

    async fn start_operation(&self, endpoint: &str, body: &Value) -> AppResult<Value> {
        self.post_json(endpoint, body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_providers_skips_nameless_entries() {
        let raw = json!({
            "providers": [
                {"Name": "drive", "Description": "Google Drive", "Options": []},
                {"Description": "broken"},
                {"Name": "s3", "Description": "Amazon S3", "Options": [{"Name": "provider", "Type": "string"}]}
            ]
        });
        let types = parse_providers(&raw);
        assert_eq!(types.len(), 2);
        assert_eq!(types[0].name, "drive");
        assert_eq!(types[1].options.len(), 1);
    }

    #[test]
    fn test_parse_remotes() {
        let raw = json!({"remotes": ["gdrive", "s3-backup"]});
        assert_eq!(parse_remotes(&raw), vec!["gdrive", "s3-backup"]);
        assert!(parse_remotes(&json!({})).is_empty());
    }

    #[test]
    fn test_parse_flag_block() {
        let raw = json!({
            "vfs": [
                {"Name": "vfs_cache_mode", "FieldName": "CacheMode", "Type": "CacheMode", "DefaultStr": "off",
                 "Exclusive": true, "Examples": [{"Value": "off"}, {"Value": "full"}]}
            ]
        });
        let fields = parse_flag_block(&raw, "vfs");
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].name, "vfs_cache_mode");
        assert!(parse_flag_block(&raw, "mount").is_empty());
    }

    #[test]
    fn test_client_requires_user_for_auth() {
        let settings = RcSettings {
            url: "http://127.0.0.1:5572".into(),
            user: Some(String::new()),
            password: Some("secret".into()),
            timeout_secs: 5,
        };
        let client = RcClient::new(&settings).unwrap();
        assert!(client.auth.is_none());
    }

    #[test]
    fn test_decode_body_rejects_non_json() {
        assert_eq!(decode_body("config/create", "  ").unwrap(), json!({}));
        assert_eq!(
            decode_body("config/create", r#"{"State": ""}"#).unwrap(),
            json!({"State": ""})
        );

        let err = decode_body("config/create", "<html>Bad Gateway</html>").unwrap_err();
        assert!(matches!(err, AppError::Network(ref m) if m.contains("config/create")));
    }
}
