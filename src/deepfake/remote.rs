//! Hugging Face hub client
//!
//! Loading a model means confirming the hub knows it; classifying means
//! posting the raw image to the hosted inference endpoint for that model.
//! The hub lists public models whether or not the inference API will serve
//! them, so a refusal from the endpoint (401, 403, 404, 503) is reported as
//! [`ModelError::Unavailable`] rather than as a failed inference.
//! The access token is never compiled in: it comes from `HF_TOKEN` or is
//! passed explicitly.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};

use super::loader::{BoxFuture, Classifier, ModelLoader};
use crate::errors::ModelError;
use crate::models::ClassScore;
use crate::upload::ImageUpload;

pub const DEFAULT_MODEL_ID: &str = "Xiang-cd/DiFace-aig";
pub const DEFAULT_HUB_URL: &str = "https://huggingface.co";
pub const DEFAULT_INFERENCE_URL: &str = "https://api-inference.huggingface.co";
pub const TOKEN_ENV_VAR: &str = "HF_TOKEN";

/// Hub connection settings
#[derive(Debug, Clone)]
pub struct HubConfig {
    pub model_id: String,
    pub hub_url: String,
    pub inference_url: String,
    pub token: Option<String>,
    pub timeout: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            model_id: DEFAULT_MODEL_ID.to_string(),
            hub_url: DEFAULT_HUB_URL.to_string(),
            inference_url: DEFAULT_INFERENCE_URL.to_string(),
            token: std::env::var(TOKEN_ENV_VAR).ok().filter(|t| !t.is_empty()),
            timeout: Duration::from_secs(30),
        }
    }
}

impl HubConfig {
    fn metadata_url(&self) -> String {
        format!("{}/api/models/{}", self.hub_url.trim_end_matches('/'), self.model_id)
    }

    fn inference_endpoint(&self) -> String {
        format!("{}/models/{}", self.inference_url.trim_end_matches('/'), self.model_id)
    }
}

/// Loads classifiers backed by the hosted inference API.
pub struct HubModelLoader {
    client: Client,
    config: HubConfig,
}

impl HubModelLoader {
    pub fn new(config: HubConfig) -> Result<Self, ModelError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ModelError::Load {
                model_id: config.model_id.clone(),
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client, config })
    }

    fn load_error(&self, message: impl Into<String>) -> ModelError {
        ModelError::Load {
            model_id: self.config.model_id.clone(),
            message: message.into(),
        }
    }

    async fn probe(&self) -> Result<Arc<dyn Classifier>, ModelError> {
        let url = self.config.metadata_url();
        log::debug!("Probing model metadata at {}", url);

        let mut request = self.client.get(&url);
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| self.load_error(e.to_string()))?;

        if !response.status().is_success() {
            return Err(self.load_error(format!("model hub returned {}", response.status())));
        }

        Ok(Arc::new(HubClassifier {
            client: self.client.clone(),
            model_id: self.config.model_id.clone(),
            endpoint: self.config.inference_endpoint(),
            token: self.config.token.clone(),
        }) as Arc<dyn Classifier>)
    }
}

impl ModelLoader for HubModelLoader {
    fn model_id(&self) -> &str {
        &self.config.model_id
    }

    fn load(&self) -> BoxFuture<'_, Result<Arc<dyn Classifier>, ModelError>> {
        Box::pin(self.probe())
    }
}

/// Classifier calling the hosted inference endpoint of one model.
pub struct HubClassifier {
    client: Client,
    model_id: String,
    endpoint: String,
    token: Option<String>,
}

impl HubClassifier {
    async fn post(&self, image: &ImageUpload) -> Result<Vec<ClassScore>, ModelError> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, image.mime())
            .body(image.data().clone());
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ModelError::Inference(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = format!("{}: {}", status, body.trim());
            return Err(if refuses_model(status) {
                ModelError::Unavailable {
                    model_id: self.model_id.clone(),
                    message,
                }
            } else {
                ModelError::Inference(message)
            });
        }

        let classes: Vec<ClassScore> = response
            .json()
            .await
            .map_err(|e| ModelError::Inference(format!("unexpected response: {}", e)))?;

        log::debug!("Raw classification result: {:?}", classes);
        Ok(classes)
    }
}

/// Statuses meaning the endpoint will not run this model for us
fn refuses_model(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND | StatusCode::SERVICE_UNAVAILABLE
    )
}

impl Classifier for HubClassifier {
    fn classify<'a>(&'a self, image: &'a ImageUpload) -> BoxFuture<'a, Result<Vec<ClassScore>, ModelError>> {
        Box::pin(self.post(image))
    }
}
