//! Cloud Run Admin API (v2) access.

use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use gcp_auth::TokenProvider;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::error::AppError;
use crate::models::{ListRevisionsResponse, ListServicesResponse, Revision, Service};

const RUN_API_ENDPOINT: &str = "https://run.googleapis.com/v2";
const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// One page of a server-paginated listing.
#[derive(Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_page_token: Option<String>,
}

/// The control-plane operations the cleanup needs.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    async fn list_services(&self, parent: &str, page_token: Option<&str>) -> Result<Page<Service>>;

    async fn list_revisions(
        &self,
        service: &str,
        page_token: Option<&str>,
    ) -> Result<Page<Revision>>;

    async fn delete_revision(&self, name: &str) -> Result<()>;
}

/// Records that can be listed page by page from a [`ControlPlane`].
#[async_trait]
pub trait Listable: Sized + Send {
    async fn fetch_page(
        client: &dyn ControlPlane,
        parent: &str,
        page_token: Option<&str>,
    ) -> Result<Page<Self>>;
}

#[async_trait]
impl Listable for Service {
    async fn fetch_page(
        client: &dyn ControlPlane,
        parent: &str,
        page_token: Option<&str>,
    ) -> Result<Page<Self>> {
        client.list_services(parent, page_token).await
    }
}

#[async_trait]
impl Listable for Revision {
    async fn fetch_page(
        client: &dyn ControlPlane,
        parent: &str,
        page_token: Option<&str>,
    ) -> Result<Page<Self>> {
        client.list_revisions(parent, page_token).await
    }
}

/// Lazily walks a paginated collection, fetching the next page only once the
/// current one has been consumed.
pub struct Pager<'a, T> {
    client: &'a dyn ControlPlane,
    parent: String,
    buffer: VecDeque<T>,
    next_page_token: Option<String>,
    exhausted: bool,
}

impl<'a, T: Listable> Pager<'a, T> {
    pub fn new(client: &'a dyn ControlPlane, parent: impl Into<String>) -> Self {
        Self {
            client,
            parent: parent.into(),
            buffer: VecDeque::new(),
            next_page_token: None,
            exhausted: false,
        }
    }

    pub async fn next(&mut self) -> Result<Option<T>> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Ok(Some(item));
            }
            if self.exhausted {
                return Ok(None);
            }

            let page =
                T::fetch_page(self.client, &self.parent, self.next_page_token.as_deref()).await?;
            self.buffer.extend(page.items);
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => self.next_page_token = Some(token),
                None => self.exhausted = true,
            }
        }
    }
}

/// Google API error envelope.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

pub struct CloudRunClient {
    client: Client,
    endpoint: String,
    token_provider: Arc<dyn TokenProvider>,
}

impl CloudRunClient {
    /// Client authenticated with Application Default Credentials.
    pub async fn from_environment() -> Result<Self> {
        let token_provider = gcp_auth::provider()
            .await
            .map_err(|e| AppError::Auth(format!("failed to initialize GCP authentication: {e}")))?;
        Self::new(token_provider, RUN_API_ENDPOINT)
    }

    pub fn new(token_provider: Arc<dyn TokenProvider>, endpoint: &str) -> Result<Self> {
        let client = http_client().context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token_provider,
        })
    }

    async fn access_token(&self) -> Result<String> {
        let token = self
            .token_provider
            .token(&[CLOUD_PLATFORM_SCOPE])
            .await
            .map_err(|e| AppError::Auth(format!("failed to get access token: {e}")))?;
        Ok(token.as_str().to_string())
    }

    async fn list_page<T: serde::de::DeserializeOwned>(
        &self,
        parent: &str,
        collection: &str,
        page_token: Option<&str>,
    ) -> Result<T> {
        let url = format!("{}/{}/{}", self.endpoint, parent, collection);
        debug!(%url, ?page_token, "GET");
        let token = self.access_token().await?;
        let mut req = self.client.get(&url).bearer_auth(token);
        if let Some(page_token) = page_token {
            req = req.query(&[("pageToken", page_token)]);
        }
        let resp = req
            .send()
            .await
            .with_context(|| format!("Failed to GET {}", url))?;

        let resp = check_status(resp).await?;
        resp.json()
            .await
            .with_context(|| format!("Failed to parse response from {}", url))
    }
}

#[async_trait]
impl ControlPlane for CloudRunClient {
    async fn list_services(&self, parent: &str, page_token: Option<&str>) -> Result<Page<Service>> {
        let resp: ListServicesResponse = self.list_page(parent, "services", page_token).await?;
        Ok(Page {
            items: resp.services,
            next_page_token: resp.next_page_token,
        })
    }

    async fn list_revisions(
        &self,
        service: &str,
        page_token: Option<&str>,
    ) -> Result<Page<Revision>> {
        let resp: ListRevisionsResponse =
            self.list_page(service, "revisions", page_token).await?;
        Ok(Page {
            items: resp.revisions,
            next_page_token: resp.next_page_token,
        })
    }

    /// Returns once the API has accepted the deletion; the resulting
    /// long-running operation is not polled.
    async fn delete_revision(&self, name: &str) -> Result<()> {
        let url = format!("{}/{}", self.endpoint, name);
        debug!(%url, "DELETE");
        let token = self.access_token().await?;
        let resp = self
            .client
            .delete(&url)
            .bearer_auth(token)
            .send()
            .await
            .with_context(|| format!("Failed to DELETE revision {}", name))?;

        check_status(resp).await?;
        Ok(())
    }
}

/// Transport defaults are left as they are: no request timeout.
fn http_client() -> reqwest::Result<Client> {
    Client::builder().build()
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, AppError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(AppError::Api {
        status: status.as_u16(),
        message: api_error_message(&body),
    })
}

fn api_error_message(body: &str) -> String {
    serde_json::from_str::<ErrorResponse>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string())
}

#[cfg(test)]
pub(crate) mod fake {
    //! In-memory control plane that paginates and records every delete.

    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    pub struct FakeControlPlane {
        pub page_size: usize,
        pub services: Vec<Service>,
        pub revisions: HashMap<String, Vec<Revision>>,
        pub deleted: Mutex<Vec<String>>,
        pub page_requests: Mutex<Vec<(String, Option<String>)>>,
        pub fail_delete: Option<String>,
    }

    impl FakeControlPlane {
        pub fn new(page_size: usize) -> Self {
            Self {
                page_size,
                services: Vec::new(),
                revisions: HashMap::new(),
                deleted: Mutex::new(Vec::new()),
                page_requests: Mutex::new(Vec::new()),
                fail_delete: None,
            }
        }

        pub fn with_service(mut self, name: &str, revisions: Vec<Revision>) -> Self {
            self.services.push(Service {
                name: name.to_string(),
            });
            self.revisions.insert(name.to_string(), revisions);
            self
        }

        pub fn deleted(&self) -> Vec<String> {
            self.deleted.lock().unwrap().clone()
        }

        fn page<T: Clone>(&self, items: &[T], page_token: Option<&str>) -> Page<T> {
            let start: usize = page_token.map(|t| t.parse().unwrap()).unwrap_or(0);
            let end = (start + self.page_size).min(items.len());
            Page {
                items: items[start..end].to_vec(),
                next_page_token: (end < items.len()).then(|| end.to_string()),
            }
        }
    }

    #[async_trait]
    impl ControlPlane for FakeControlPlane {
        async fn list_services(
            &self,
            parent: &str,
            page_token: Option<&str>,
        ) -> Result<Page<Service>> {
            self.page_requests
                .lock()
                .unwrap()
                .push((parent.to_string(), page_token.map(str::to_string)));
            Ok(self.page(&self.services, page_token))
        }

        async fn list_revisions(
            &self,
            service: &str,
            page_token: Option<&str>,
        ) -> Result<Page<Revision>> {
            self.page_requests
                .lock()
                .unwrap()
                .push((service.to_string(), page_token.map(str::to_string)));
            let revisions = self.revisions.get(service).cloned().unwrap_or_default();
            Ok(self.page(&revisions, page_token))
        }

        async fn delete_revision(&self, name: &str) -> Result<()> {
            if self.fail_delete.as_deref() == Some(name) {
                return Err(AppError::Api {
                    status: 403,
                    message: "permission denied".into(),
                }
                .into());
            }
            self.deleted.lock().unwrap().push(name.to_string());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakeControlPlane;
    use super::*;

    fn revision(name: &str) -> Revision {
        Revision {
            name: name.to_string(),
            conditions: Vec::new(),
            containers: Vec::new(),
            create_time: None,
        }
    }

    #[tokio::test]
    async fn test_pager_walks_every_page() {
        let revisions: Vec<Revision> = (0..5).map(|i| revision(&format!("r{i}"))).collect();
        let plane = FakeControlPlane::new(2).with_service("svc", revisions);

        let mut pager: Pager<'_, Revision> = Pager::new(&plane, "svc");
        let mut names = Vec::new();
        while let Some(r) = pager.next().await.unwrap() {
            names.push(r.name);
        }
        assert_eq!(names, vec!["r0", "r1", "r2", "r3", "r4"]);

        let requests = plane.page_requests.lock().unwrap().clone();
        let tokens: Vec<Option<String>> = requests.into_iter().map(|(_, t)| t).collect();
        assert_eq!(tokens, vec![None, Some("2".into()), Some("4".into())]);
    }

    #[tokio::test]
    async fn test_pager_fetches_lazily() {
        let revisions: Vec<Revision> = (0..4).map(|i| revision(&format!("r{i}"))).collect();
        let plane = FakeControlPlane::new(2).with_service("svc", revisions);

        let mut pager: Pager<'_, Revision> = Pager::new(&plane, "svc");
        pager.next().await.unwrap();
        pager.next().await.unwrap();
        assert_eq!(plane.page_requests.lock().unwrap().len(), 1);
        pager.next().await.unwrap();
        assert_eq!(plane.page_requests.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_pager_empty_collection() {
        let plane = FakeControlPlane::new(3);
        let mut pager: Pager<'_, Service> = Pager::new(&plane, "projects/p/locations/l");
        assert!(pager.next().await.unwrap().is_none());
        assert!(pager.next().await.unwrap().is_none());
        assert_eq!(plane.page_requests.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_http_client_waits_for_slow_responses() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await.unwrap();
            tokio::time::sleep(std::time::Duration::from_secs(600)).await;
            socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 2\r\n\r\n{}",
                )
                .await
                .unwrap();
        });

        let resp = http_client()
            .unwrap()
            .get(format!("http://{addr}/v2/projects/p/locations/l/services"))
            .send()
            .await
            .unwrap();
        assert!(resp.status().is_success());
        let page: ListServicesResponse = resp.json().await.unwrap();
        assert!(page.services.is_empty());
        server.await.unwrap();
    }

    #[test]
    fn test_api_error_message_from_envelope() {
        let body = r#"{"error": {"code": 404, "message": "Revision not found", "status": "NOT_FOUND"}}"#;
        assert_eq!(api_error_message(body), "Revision not found");
        assert_eq!(api_error_message("bad gateway"), "bad gateway");
    }
}
