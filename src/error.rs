//! Error types for rabbitmq-collector
//!
//! Configuration problems are fatal before any request is made. Fetch errors
//! are fatal only for the required resources; everything else degrades to
//! "skip this object".

use thiserror::Error;

use crate::transformer::payload::SourceType;

/// Filter list parsing errors
#[derive(Error, Debug)]
pub enum FilterError {
    /// 필터 값이 JSON 문자열 배열이 아님
    #[error("Invalid JSON array for '{field}': {source}")]
    InvalidJson {
        field: String,
        #[source]
        source: serde_json::Error,
    },

    /// 정규식 패턴 컴파일 실패
    #[error("Invalid regex pattern '{pattern}' in '{field}': {source}")]
    InvalidPattern {
        field: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Collector 모듈 에러 타입
#[derive(Error, Debug)]
pub enum CollectorError {
    /// HTTP 클라이언트 초기화 실패
    #[error("Failed to initialize HTTP client: {0}")]
    HttpClientInit(#[source] reqwest::Error),

    /// 잘못된 URL
    #[error("Invalid management URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// CA 번들 읽기 실패
    #[error("Failed to read CA bundle '{path}': {source}")]
    CaBundle {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// 인증서 파싱 실패
    #[error("Invalid certificate in '{path}': {source}")]
    InvalidCertificate {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    /// HTTP 요청 실패
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[source] reqwest::Error),

    /// HTTP 응답 읽기 실패
    #[error("Failed to read HTTP response: {0}")]
    HttpResponse(#[source] reqwest::Error),

    /// HTTP 상태 코드 에러
    #[error("HTTP error status {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    /// JSON 이외의 응답
    #[error("Unexpected content type '{content_type}' from {url}")]
    UnexpectedContentType { url: String, content_type: String },

    /// JSON 파싱 에러
    #[error("JSON parse error for {url}: {source}")]
    JsonParse {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// 타임아웃
    /// The value is the configured timeout in milliseconds, if known.
    #[error("Request timed out{}", .0.map(|ms| format!(" after {}ms", ms)).unwrap_or_default())]
    Timeout(Option<u64>),

    /// 연결 실패
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
}

impl CollectorError {
    /// 일시적인 에러인지 확인
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CollectorError::HttpRequest(_)
                | CollectorError::HttpResponse(_)
                | CollectorError::Timeout(..)
                | CollectorError::ConnectionFailed(_)
                | CollectorError::HttpStatus {
                    status: 500..=599,
                    ..
                }
        )
    }

    /// HTTP 상태 코드 추출
    pub fn http_status(&self) -> Option<u16> {
        match self {
            CollectorError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Create a Timeout error with known duration
    pub fn timeout_with_duration(ms: u64) -> Self {
        CollectorError::Timeout(Some(ms))
    }
}

impl From<reqwest::Error> for CollectorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CollectorError::Timeout(None)
        } else if err.is_connect() {
            CollectorError::ConnectionFailed(err.to_string())
        } else if err.is_request() {
            CollectorError::HttpRequest(err)
        } else {
            CollectorError::HttpResponse(err)
        }
    }
}

/// Payload building errors
#[derive(Error, Debug)]
pub enum PayloadError {
    #[error("Invalid entity name '{name}' in namespace '{namespace}'")]
    InvalidEntity { name: String, namespace: String },

    #[error("Value of metric '{name}' does not fit source type {source_type}")]
    InvalidMetricValue { name: String, source_type: SourceType },

    #[error("Invalid inventory item key '{key}' field '{field}'")]
    InvalidInventoryItem { key: String, field: String },

    #[error("Failed to serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to write payload: {0}")]
    Write(#[from] std::io::Error),
}

/// Local node inventory errors
#[derive(Error, Debug)]
pub enum InventoryError {
    #[error("Failed to run '{command}': {source}")]
    Command {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{command}' exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("Local node '{0}' not found in node list")]
    UnknownNode(String),

    #[error("Failed to read config file '{path}': {source}")]
    ConfigFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Collector error
    #[error("Collector error: {0}")]
    Collector(#[from] CollectorError),

    /// Required resource could not be fetched
    #[error("Failed to fetch required resource {endpoint}: {source}")]
    RequiredResource {
        endpoint: String,
        #[source]
        source: CollectorError,
    },

    /// Payload could not be built or written
    #[error("Payload error: {0}")]
    Payload(#[from] PayloadError),
}

impl AppError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Config(_) => 2,
            AppError::Collector(_) | AppError::RequiredResource { .. } | AppError::Payload(_) => 1,
        }
    }
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;
