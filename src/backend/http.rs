use super::{BackendError, ProvisionBackend};
use crate::model::{NewProvision, PageConfig, ProvisionEdit, ProvisionEntity};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Response, Url};
use serde::Deserialize;

/// REST client for the provisioning service.
#[derive(Clone)]
pub struct HttpBackend {
    http: reqwest::Client,
    base_url: Url,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClusterList {
    #[serde(default)]
    cluster_list: Vec<ProvisionEntity>,
}

impl HttpBackend {
    pub fn new(cfg: &PageConfig) -> Result<Self> {
        let base_url = Url::parse(&cfg.base_url)
            .with_context(|| format!("parse base URL {}", cfg.base_url))?;

        let mut headers = HeaderMap::new();
        if let Some(token) = cfg.token.as_deref() {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .context("token is not a valid header value")?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .timeout(cfg.request_timeout)
            .default_headers(headers)
            .build()
            .context("build HTTP client")?;

        Ok(Self { http, base_url })
    }

    pub fn clusters_url(&self) -> Result<Url, BackendError> {
        self.url(&["provision", "clusters"])
    }

    pub fn cluster_url(&self, id: Option<&str>) -> Result<Url, BackendError> {
        match id {
            Some(id) => self.url(&["provision", "cluster", id]),
            None => self.url(&["provision", "cluster"]),
        }
    }

    /// Append path segments to the base URL; ids are percent-encoded as single segments.
    fn url(&self, segments: &[&str]) -> Result<Url, BackendError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| BackendError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

/// Map non-2xx responses to [`BackendError::Server`], picking up the
/// `errorMessage` field of a JSON error body when there is one.
async fn check(resp: Response) -> Result<Response, BackendError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| {
            v.get("errorMessage")
                .and_then(|m| m.as_str())
                .map(|m| m.to_string())
        })
        .filter(|m| !m.trim().is_empty());
    Err(BackendError::Server {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl ProvisionBackend for HttpBackend {
    async fn load_entities(
        &self,
        filter_id: Option<&str>,
    ) -> Result<Vec<ProvisionEntity>, BackendError> {
        match filter_id {
            Some(id) => {
                let url = self.cluster_url(Some(id))?;
                let resp = check(self.http.get(url).send().await?).await?;
                let entity = resp
                    .json::<ProvisionEntity>()
                    .await
                    .map_err(|e| BackendError::Decode(e.to_string()))?;
                Ok(vec![entity])
            }
            None => {
                let url = self.clusters_url()?;
                let resp = check(self.http.get(url).send().await?).await?;
                let list = resp
                    .json::<ClusterList>()
                    .await
                    .map_err(|e| BackendError::Decode(e.to_string()))?;
                Ok(list.cluster_list)
            }
        }
    }

    async fn remove_entity(&self, id: &str) -> Result<(), BackendError> {
        let url = self.cluster_url(Some(id))?;
        check(self.http.delete(url).send().await?).await?;
        Ok(())
    }

    async fn edit_entity(&self, data: &ProvisionEdit) -> Result<(), BackendError> {
        let url = self.cluster_url(Some(&data.id))?;
        check(self.http.put(url).json(data).send().await?).await?;
        Ok(())
    }

    async fn create_entity(&self, data: &NewProvision) -> Result<(), BackendError> {
        let url = self.cluster_url(None)?;
        check(self.http.post(url).json(data).send().await?).await?;
        Ok(())
    }
}
