//! Request/response client for the fallback and harvest endpoints

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::client::ClientError;
use crate::wire::{EntityQuery, HarvestRequest, ResourceView};
use crate::world::{EntityId, HarvestOutcome};
use crate::ws::protocol::{ClientFrame, ServerFrame};

#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    token: String,
}

impl ApiClient {
    pub fn new(base_url: &str, token: &str) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.bearer_auth(&self.token)
    }

    async fn read<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        let status = response.status();
        if !status.is_success() {
            let body: serde_json::Value = response.json().await.unwrap_or_default();
            let message = body["error"].as_str().unwrap_or_default().to_string();
            return Err(ClientError::Status {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json().await?)
    }

    /// Current state of every entity the caller owns
    pub async fn owned_entities(&self) -> Result<Vec<ServerFrame>, ClientError> {
        let response = self.authed(self.http.get(self.url("/entities"))).send().await?;
        Self::read(response).await
    }

    pub async fn query_entities(&self, ids: &[EntityId]) -> Result<Vec<ServerFrame>, ClientError> {
        let body = EntityQuery { ids: ids.to_vec() };
        let response = self
            .authed(self.http.post(self.url("/entities/query")))
            .json(&body)
            .send()
            .await?;
        Self::read(response).await
    }

    /// One update, answered with the confirmed state
    pub async fn update_position(&self, frame: &ClientFrame) -> Result<ServerFrame, ClientError> {
        let response = self
            .authed(self.http.post(self.url("/entities/position")))
            .json(frame)
            .send()
            .await?;
        Self::read(response).await
    }

    pub async fn world_resources(&self, world_id: &str) -> Result<Vec<ResourceView>, ClientError> {
        let response = self
            .authed(self.http.get(self.url(&format!("/worlds/{world_id}/resources"))))
            .send()
            .await?;
        Self::read(response).await
    }

    pub async fn harvest(&self, resource_id: &str, entity_id: &str) -> Result<HarvestOutcome, ClientError> {
        let body = HarvestRequest {
            resource_id: resource_id.to_string(),
            entity_id: entity_id.to_string(),
        };
        let response = self
            .authed(self.http.post(self.url("/harvest")))
            .json(&body)
            .send()
            .await?;
        Self::read(response).await
    }
}
