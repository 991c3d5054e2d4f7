//! JSON client for downstream services.
//!
//! Each service is called under the resilience policy of the same name, so
//! `services = [{ name = "roomService", ... }]` pairs with a
//! `[[policies]] name = "roomService"` entry.

use std::collections::HashMap;
use std::sync::Arc;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::config::ServiceEndpoint;
use crate::resilience::error::classify_status;
use crate::resilience::{CallError, CallOptions, CallOutcome, CallResult, ResilientCaller};

/// Calls named services through the resilient pipeline.
#[derive(Clone)]
pub struct ServiceClient {
    http: Client,
    caller: ResilientCaller,
    endpoints: Arc<HashMap<String, Url>>,
}

impl ServiceClient {
    pub fn new(caller: ResilientCaller, services: &[ServiceEndpoint]) -> CallResult<Self> {
        let http = Client::builder()
            .user_agent(concat!("booking-core/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CallError::Validation(format!("http client: {}", e)))?;

        let mut endpoints = HashMap::with_capacity(services.len());
        for service in services {
            endpoints.insert(service.name.clone(), base_url(&service.base_url)?);
        }

        Ok(Self {
            http,
            caller,
            endpoints: Arc::new(endpoints),
        })
    }

    pub fn caller(&self) -> &ResilientCaller {
        &self.caller
    }

    /// Absolute URL for `path` on `service`.
    pub fn url(&self, service: &str, path: &str) -> CallResult<Url> {
        let base = self
            .endpoints
            .get(service)
            .ok_or_else(|| CallError::NotConfigured(format!("service '{}'", service)))?;
        base.join(path.trim_start_matches('/'))
            .map_err(|e| CallError::Validation(format!("invalid path '{}': {}", path, e)))
    }

    pub async fn get_json<T>(&self, service: &str, path: &str, options: CallOptions) -> CallResult<CallOutcome<T>>
    where
        T: Serialize + DeserializeOwned,
    {
        let url = self.url(service, path)?;
        tracing::debug!(service, url = %url, "GET");
        self.caller
            .call_with(service, options, || {
                let request = self.http.get(url.clone());
                async move { decode(request.send().await?).await }
            })
            .await
    }

    pub async fn post_json<B, T>(
        &self,
        service: &str,
        path: &str,
        body: &B,
        options: CallOptions,
    ) -> CallResult<CallOutcome<T>>
    where
        B: Serialize + ?Sized,
        T: Serialize + DeserializeOwned,
    {
        let url = self.url(service, path)?;
        tracing::debug!(service, url = %url, "POST");
        self.caller
            .call_with(service, options, || {
                let request = self.http.post(url.clone()).json(body);
                async move { decode(request.send().await?).await }
            })
            .await
    }
}

fn base_url(raw: &str) -> CallResult<Url> {
    let mut url = Url::parse(raw).map_err(|e| CallError::Validation(format!("invalid base url '{}': {}", raw, e)))?;
    // Url::join replaces the last segment unless the base ends with a slash.
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

async fn decode<T: DeserializeOwned>(response: Response) -> CallResult<T> {
    let status = response.status();
    if status.is_success() {
        return response
            .json::<T>()
            .await
            .map_err(|e| CallError::terminal(Some(status.as_u16()), format!("undecodable body: {}", e)));
    }
    let body = response.text().await.unwrap_or_default();
    Err(classify_status(status.as_u16(), body))
}
