//! `google` auth service kind: verifies a Google ID token carried in a
//! `<serviceName>_token` request header (spec concrete scenario 3) against
//! Google's tokeninfo endpoint and returns its claims.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use toolbox_core::registry::AuthServiceConstructor;
use toolbox_core::{AuthService, ToolboxError};

const TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

pub struct GoogleAuthService {
    name: String,
    client_id: String,
    client: reqwest::Client,
}

#[async_trait]
impl AuthService for GoogleAuthService {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        "google"
    }

    async fn claims_from_request(
        &self,
        headers: &http::HeaderMap,
    ) -> Result<Option<HashMap<String, Value>>, ToolboxError> {
        let header_name = format!("{}_token", self.name);
        let token = match headers.get(header_name.as_str()) {
            Some(value) => value
                .to_str()
                .map_err(|e| ToolboxError::AuthFail(format!("{header_name}: {e}")))?,
            None => return Ok(None),
        };

        let response = self
            .client
            .get(TOKENINFO_URL)
            .query(&[("id_token", token)])
            .send()
            .await
            .map_err(|e| ToolboxError::AuthFail(format!("{}: tokeninfo request failed: {e}", self.name)))?;

        if !response.status().is_success() {
            return Err(ToolboxError::AuthFail(format!(
                "{}: token rejected by Google ({})",
                self.name,
                response.status()
            )));
        }

        let claims: HashMap<String, Value> = response
            .json()
            .await
            .map_err(|e| ToolboxError::AuthFail(format!("{}: malformed tokeninfo response: {e}", self.name)))?;

        let audience = claims
            .get("aud")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolboxError::AuthFail(format!("{}: tokeninfo response has no aud", self.name)))?;
        if audience != self.client_id {
            return Err(ToolboxError::AuthFail(format!(
                "{}: token audience {audience:?} does not match configured client",
                self.name
            )));
        }

        Ok(Some(claims))
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GoogleAuthConfig {
    kind: String,
    #[serde(rename = "clientId")]
    client_id: String,
}

pub struct GoogleAuthServiceConstructor;

#[async_trait]
impl AuthServiceConstructor for GoogleAuthServiceConstructor {
    async fn construct(&self, name: &str, raw: &Value) -> Result<Arc<dyn AuthService>, ToolboxError> {
        let config: GoogleAuthConfig = serde_json::from_value(raw.clone())
            .map_err(|e| ToolboxError::Config(format!("authService {name:?}: {e}")))?;
        let _ = &config.kind;

        Ok(Arc::new(GoogleAuthService {
            name: name.to_string(),
            client_id: config.client_id,
            client: reqwest::Client::new(),
        }))
    }
}
