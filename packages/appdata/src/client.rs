// ABOUTME: HTTP client for the remote app API
// ABOUTME: Implements the snapshot store, telemetry sink and file download over REST

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::time::Duration;
use tracing::{debug, error};
use tutor_core::{AppAction, AppData, AppDataType, NewAppData};

use crate::error::{AppDataError, AppDataResult};
use crate::store::{ActionSink, CodeStore, FileContentSource};

/// Client scoped to one app item on one API host
#[derive(Clone)]
pub struct AppsApiClient {
    http_client: Client,
    api_host: String,
    item_id: String,
    token: String,
}

impl AppsApiClient {
    pub fn new(
        api_host: impl Into<String>,
        item_id: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> AppDataResult<Self> {
        let api_host = api_host.into();
        if api_host.is_empty() {
            return Err(AppDataError::config("API host is empty"));
        }

        let http_client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppDataError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            api_host: api_host.trim_end_matches('/').to_string(),
            item_id: item_id.into(),
            token: token.into(),
        })
    }

    fn item_url(&self, path: &str) -> String {
        format!("{}/app-items/{}/{}", self.api_host, self.item_id, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(&self.token)
    }

    /// Turn a non-success response into an error carrying the body text
    async fn check(response: Response) -> AppDataResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        error!("App API error: {} - {}", status, message);
        if status == StatusCode::NOT_FOUND {
            return Err(AppDataError::NotFound(message));
        }
        Err(AppDataError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl CodeStore for AppsApiClient {
    async fn post_app_data(&self, record: NewAppData) -> AppDataResult<AppData> {
        debug!("Posting app data of type {}", record.data_type.as_str());
        let response = self
            .authorized(self.http_client.post(self.item_url("app-data")))
            .json(&record)
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(response.json::<AppData>().await?)
    }

    async fn list_app_data(&self, data_type: AppDataType) -> AppDataResult<Vec<AppData>> {
        let response = self
            .authorized(self.http_client.get(self.item_url("app-data")))
            .query(&[("type", data_type.as_str())])
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(response.json::<Vec<AppData>>().await?)
    }
}

#[async_trait]
impl ActionSink for AppsApiClient {
    async fn post_action(&self, action: AppAction) -> AppDataResult<()> {
        debug!("Posting action {}", action.action_type);
        let response = self
            .authorized(self.http_client.post(self.item_url("app-action")))
            .json(&action)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

#[async_trait]
impl FileContentSource for AppsApiClient {
    async fn file_content(&self, setting_id: &str) -> AppDataResult<Bytes> {
        let url = format!(
            "{}/app-items/app-settings/{}/download",
            self.api_host, setting_id
        );
        debug!("Downloading data file (id: {})", setting_id);
        let response = self.authorized(self.http_client.get(url)).send().await?;
        let response = Self::check(response).await?;
        Ok(response.bytes().await?)
    }
}
