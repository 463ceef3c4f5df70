//! PostgREST access for the entity, world and inventory tables

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};

/// PostgREST query pairs, e.g. `[("id", eq(id)), ("order", "id".into())]`.
/// Values are form-encoded on the way out, so ids cannot extend the filter.
pub type Filter<'a> = [(&'a str, String)];

/// `eq.` operand for a [`Filter`] value
pub fn eq(value: &str) -> String {
    format!("eq.{value}")
}

/// PostgREST client authenticated with the service role key.
/// The key bypasses row level security, so it never leaves the server.
#[derive(Clone)]
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    service_role_key: String,
}

impl SupabaseClient {
    pub fn new(base_url: &str, service_role_key: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            service_role_key: service_role_key.to_string(),
        }
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn table_request(&self, method: Method, table: &str, filter: &Filter<'_>) -> RequestBuilder {
        self.client.request(method, self.rest_url(table)).query(filter)
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.service_role_key)
            .header("Authorization", format!("Bearer {}", self.service_role_key))
            .header("Content-Type", "application/json")
    }

    async fn check(response: Response) -> Result<Response, SupabaseError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(SupabaseError::Api {
            status: status.as_u16(),
            body,
        })
    }

    /// Send, reject non-2xx, decode the JSON body
    async fn fetch<R: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<R, SupabaseError> {
        let response = self.authed(builder).send().await?;
        Self::check(response)
            .await?
            .json()
            .await
            .map_err(SupabaseError::Parse)
    }

    /// Rows of `table` matching a PostgREST filter
    pub async fn get<T: DeserializeOwned>(
        &self,
        table: &str,
        filter: &Filter<'_>,
    ) -> Result<Vec<T>, SupabaseError> {
        self.fetch(self.table_request(Method::GET, table, filter)).await
    }

    /// At most one row. PostgREST answers 406 to the object media type when
    /// nothing matches.
    pub async fn get_one<T: DeserializeOwned>(
        &self,
        table: &str,
        filter: &Filter<'_>,
    ) -> Result<Option<T>, SupabaseError> {
        let response = self
            .authed(self.table_request(Method::GET, table, filter))
            .header("Accept", "application/vnd.pgrst.object+json")
            .send()
            .await?;
        if response.status() == StatusCode::NOT_ACCEPTABLE {
            return Ok(None);
        }
        Self::check(response)
            .await?
            .json()
            .await
            .map(Some)
            .map_err(SupabaseError::Parse)
    }

    /// Insert one row and return it as stored
    pub async fn insert<T: Serialize, R: DeserializeOwned>(
        &self,
        table: &str,
        row: &T,
    ) -> Result<R, SupabaseError> {
        let rows: Vec<R> = self
            .fetch(
                self.client
                    .post(self.rest_url(table))
                    .header("Prefer", "return=representation")
                    .json(row),
            )
            .await?;
        rows.into_iter().next().ok_or(SupabaseError::NoRowReturned)
    }

    /// PATCH the rows matching `filter`; returns the rows after the update.
    /// An empty result means the filter matched nothing.
    pub async fn update_returning<T: Serialize, R: DeserializeOwned>(
        &self,
        table: &str,
        filter: &Filter<'_>,
        patch: &T,
    ) -> Result<Vec<R>, SupabaseError> {
        self.fetch(
            self.table_request(Method::PATCH, table, filter)
                .header("Prefer", "return=representation")
                .json(patch),
        )
        .await
    }

    /// Insert, merging into the existing row on `on_conflict`
    pub async fn upsert<T: Serialize>(
        &self,
        table: &str,
        row: &T,
        on_conflict: &str,
    ) -> Result<(), SupabaseError> {
        let response = self
            .authed(
                self.table_request(Method::POST, table, &[("on_conflict", on_conflict.to_string())])
                    .header("Prefer", "resolution=merge-duplicates,return=minimal")
                    .json(row),
            )
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    /// Call a Postgres function exposed under `/rpc`
    pub async fn rpc<T: Serialize, R: DeserializeOwned>(
        &self,
        function: &str,
        args: &T,
    ) -> Result<R, SupabaseError> {
        self.fetch(
            self.client
                .post(format!("{}/rest/v1/rpc/{}", self.base_url, function))
                .json(args),
        )
        .await
    }
}

/// Quote a value for a PostgREST `in.(...)` filter
pub fn in_list<'a>(values: impl IntoIterator<Item = &'a str>) -> String {
    let quoted: Vec<String> = values
        .into_iter()
        .map(|v| format!("\"{}\"", v.replace('"', "")))
        .collect();
    format!("({})", quoted.join(","))
}

/// Supabase errors
#[derive(Debug, thiserror::Error)]
pub enum SupabaseError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    Parse(reqwest::Error),

    #[error("Insert returned no row")]
    NoRowReturned,
}
