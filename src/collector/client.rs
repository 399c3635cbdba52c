//! Management API HTTP 클라이언트
//!
//! Basic Auth, 경로 prefix, 타임아웃, 추가 CA 인증서를 지원하는 비동기 HTTP 클라이언트입니다.

use reqwest::header::CONTENT_TYPE;
use reqwest::{Certificate, Client, ClientBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use super::{CollectResult, Endpoint};
use crate::error::CollectorError;

/// Management API HTTP 클라이언트
#[derive(Clone)]
pub struct ManagementClient {
    client: Client,
    base_url: Url,
    timeout_ms: u64,
    auth: Option<(String, String)>,
}

impl std::fmt::Debug for ManagementClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagementClient")
            .field("base_url", &self.base_url.as_str())
            .field("timeout_ms", &self.timeout_ms)
            .field("auth", &self.auth.as_ref().map(|(user, _)| user))
            .finish()
    }
}

impl ManagementClient {
    /// 새 클라이언트 생성
    ///
    /// # Arguments
    /// * `base_url` - Management API 기본 URL (예: "http://localhost:15672")
    /// * `timeout_ms` - 요청 타임아웃 (밀리초)
    /// * `certificates` - 추가로 신뢰할 CA 인증서
    ///
    /// # Example
    /// ```ignore
    /// let client = ManagementClient::new("http://localhost:15672", 30_000, vec![])?;
    /// let nodes: Vec<NodeData> = client.fetch(&Endpoint::Nodes).await?;
    /// ```
    pub fn new(base_url: &str, timeout_ms: u64, certificates: Vec<Certificate>) -> CollectResult<Self> {
        let parsed = Url::parse(base_url).map_err(|source| CollectorError::InvalidUrl {
            url: base_url.to_string(),
            source,
        })?;
        if parsed.cannot_be_a_base() {
            return Err(CollectorError::InvalidUrl {
                url: base_url.to_string(),
                source: url::ParseError::RelativeUrlWithCannotBeABaseBase,
            });
        }

        let mut builder = ClientBuilder::new()
            .timeout(Duration::from_millis(timeout_ms))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(30));
        for certificate in certificates {
            builder = builder.add_root_certificate(certificate);
        }
        let client = builder.build().map_err(CollectorError::HttpClientInit)?;

        Ok(Self {
            client,
            base_url: parsed,
            timeout_ms,
            auth: None,
        })
    }

    /// Basic Auth 설정
    pub fn with_auth(mut self, username: &str, password: &str) -> Self {
        self.auth = Some((username.to_string(), password.to_string()));
        self
    }

    /// 엔드포인트의 전체 URL
    ///
    /// 각 경로 세그먼트는 개별적으로 percent-encoding 됩니다 (vhost `/` -> `%2F`).
    pub fn endpoint_url(&self, endpoint: &Endpoint) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(endpoint.segments());
        }
        url
    }

    /// 엔드포인트 조회 후 JSON 디코딩
    ///
    /// HTTP 200 과 JSON content type 인 응답만 허용합니다.
    #[instrument(skip(self), fields(endpoint = %endpoint))]
    pub async fn fetch<T: DeserializeOwned>(&self, endpoint: &Endpoint) -> CollectResult<T> {
        let url = self.endpoint_url(endpoint);
        debug!(url = %url, "Sending management API request");

        let mut req = self.client.get(url.clone());
        if let Some((username, password)) = &self.auth {
            req = req.basic_auth(username, Some(password));
        }

        let response = req.send().await.map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(CollectorError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.starts_with("application/json") {
            return Err(CollectorError::UnexpectedContentType {
                url: url.to_string(),
                content_type,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.map_send_error(e))?;

        serde_json::from_slice(&body).map_err(|source| CollectorError::JsonParse {
            url: url.to_string(),
            source,
        })
    }

    fn map_send_error(&self, err: reqwest::Error) -> CollectorError {
        if err.is_timeout() {
            CollectorError::timeout_with_duration(self.timeout_ms)
        } else {
            CollectorError::from(err)
        }
    }
}

/// CA 번들 로드
///
/// `file` 의 PEM 번들과 `dir` 안의 모든 `.pem`/`.crt` 파일을 읽습니다.
pub fn load_ca_certificates(file: Option<&Path>, dir: Option<&Path>) -> CollectResult<Vec<Certificate>> {
    let mut certificates = Vec::new();

    if let Some(file) = file {
        certificates.extend(read_pem_bundle(file)?);
    }

    if let Some(dir) = dir {
        let entries = std::fs::read_dir(dir).map_err(|source| CollectorError::CaBundle {
            path: dir.display().to_string(),
            source,
        })?;
        let mut paths: Vec<_> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .and_then(|ext| ext.to_str())
                        .is_some_and(|ext| matches!(ext, "pem" | "crt"))
            })
            .collect();
        paths.sort();
        for path in paths {
            certificates.extend(read_pem_bundle(&path)?);
        }
    }

    debug!(count = certificates.len(), "Loaded CA certificates");
    Ok(certificates)
}

fn read_pem_bundle(path: &Path) -> CollectResult<Vec<Certificate>> {
    let pem = std::fs::read(path).map_err(|source| CollectorError::CaBundle {
        path: path.display().to_string(),
        source,
    })?;
    Certificate::from_pem_bundle(&pem).map_err(|source| CollectorError::InvalidCertificate {
        path: path.display().to_string(),
        source,
    })
}
