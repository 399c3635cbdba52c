//! RabbitMQ Management API 수집 모듈
//!
//! 관리 API 엔드포인트를 조회하여 타입이 있는 스냅샷([`ApiSnapshot`])을 만듭니다.
//! `nodes` 와 `overview` 는 필수이며 실패하면 수집 주기 전체가 실패합니다.
//! 나머지 리소스는 실패 시 경고를 남기고 빈 목록으로 계속합니다.
//!
//! # Example
//!
//! ```ignore
//! use rabbitmq_collector::collector::{ApiSnapshot, Endpoint, ManagementClient};
//!
//! let client = ManagementClient::new("http://localhost:15672", 30_000, vec![])?;
//! let snapshot = ApiSnapshot::gather(&client, &scope).await?;
//! ```

mod client;
mod resources;

pub use client::{load_ca_certificates, ManagementClient};
pub use resources::{
    BindingData, ConnectionData, ExchangeData, ExchangeMessageStats, ManagedObject, MetricDef,
    MetricReading, NodeData, NodeTest, OverviewData, QueueData, QueueMessageStats, RateDetails,
    TestData, VhostData, VhostTest,
};

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::CollectionScope;
use crate::error::{AppError, CollectorError};

/// Collector 작업 결과 타입
pub type CollectResult<T> = Result<T, CollectorError>;

/// Management API 엔드포인트
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Overview,
    Nodes,
    Queues,
    Exchanges,
    Vhosts,
    Connections,
    Bindings,
    /// vhost 이름 (URL 인코딩 전)
    AlivenessTest(String),
    /// 노드 이름 (URL 인코딩 전)
    NodeHealthcheck(String),
}

impl Endpoint {
    /// 경로 세그먼트 (인코딩 전)
    pub fn segments(&self) -> Vec<&str> {
        match self {
            Endpoint::Overview => vec!["api", "overview"],
            Endpoint::Nodes => vec!["api", "nodes"],
            Endpoint::Queues => vec!["api", "queues"],
            Endpoint::Exchanges => vec!["api", "exchanges"],
            Endpoint::Vhosts => vec!["api", "vhosts"],
            Endpoint::Connections => vec!["api", "connections"],
            Endpoint::Bindings => vec!["api", "bindings"],
            Endpoint::AlivenessTest(vhost) => vec!["api", "aliveness-test", vhost.as_str()],
            Endpoint::NodeHealthcheck(node) => vec!["api", "healthchecks", "node", node.as_str()],
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for segment in self.segments() {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

/// 한 번의 수집 주기에서 가져온 API 데이터
#[derive(Debug, Clone, Default)]
pub struct ApiSnapshot {
    pub overview: OverviewData,
    pub nodes: Vec<NodeData>,
    pub queues: Vec<QueueData>,
    pub exchanges: Vec<ExchangeData>,
    pub vhosts: Vec<VhostData>,
    pub connections: Vec<ConnectionData>,
    pub bindings: Vec<BindingData>,
    pub aliveness: Vec<VhostTest>,
    pub healthchecks: Vec<NodeTest>,
}

impl ApiSnapshot {
    /// 수집 범위에 필요한 리소스 조회
    ///
    /// # Errors
    ///
    /// 필수 리소스(nodes, overview) 조회 실패 시 [`AppError::RequiredResource`]
    pub async fn gather(client: &ManagementClient, scope: &CollectionScope) -> Result<Self, AppError> {
        let nodes = fetch_required(client, Endpoint::Nodes).await?;
        let overview = fetch_required(client, Endpoint::Overview).await?;

        let mut snapshot = ApiSnapshot {
            overview,
            nodes,
            ..Default::default()
        };

        if scope.has_metrics() {
            let (connections, bindings, vhosts, queues, exchanges) = tokio::join!(
                fetch_optional(client, Endpoint::Connections),
                fetch_optional(client, Endpoint::Bindings),
                fetch_optional(client, Endpoint::Vhosts),
                fetch_optional(client, Endpoint::Queues),
                fetch_optional(client, Endpoint::Exchanges),
            );
            snapshot.connections = connections;
            snapshot.bindings = bindings;
            snapshot.vhosts = vhosts;
            snapshot.queues = queues;
            snapshot.exchanges = exchanges;
        } else if scope.has_events() {
            snapshot.vhosts = fetch_optional(client, Endpoint::Vhosts).await;
        }

        if scope.has_events() {
            snapshot.healthchecks = node_healthchecks(client, &snapshot.nodes).await;
            snapshot.aliveness = aliveness_tests(client, &snapshot.vhosts).await;
        }

        debug!(
            nodes = snapshot.nodes.len(),
            vhosts = snapshot.vhosts.len(),
            queues = snapshot.queues.len(),
            exchanges = snapshot.exchanges.len(),
            connections = snapshot.connections.len(),
            bindings = snapshot.bindings.len(),
            "Management API snapshot gathered"
        );

        Ok(snapshot)
    }
}

async fn fetch_required<T: DeserializeOwned>(
    client: &ManagementClient,
    endpoint: Endpoint,
) -> Result<T, AppError> {
    client
        .fetch(&endpoint)
        .await
        .map_err(|source| AppError::RequiredResource {
            endpoint: endpoint.to_string(),
            source,
        })
}

async fn fetch_optional<T: DeserializeOwned>(client: &ManagementClient, endpoint: Endpoint) -> Vec<T> {
    match client.fetch::<Vec<T>>(&endpoint).await {
        Ok(items) => items,
        Err(e) => {
            warn!(
                endpoint = %endpoint,
                error = %e,
                transient = e.is_transient(),
                "Failed to collect resource, continuing without it"
            );
            Vec::new()
        }
    }
}

/// 노드별 healthcheck. 요청 실패는 `error` 상태로 기록
async fn node_healthchecks(client: &ManagementClient, nodes: &[NodeData]) -> Vec<NodeTest> {
    let mut tests = Vec::with_capacity(nodes.len());

    for node in nodes {
        let endpoint = Endpoint::NodeHealthcheck(node.name.clone());
        let test = run_test(client, &endpoint).await;
        tests.push(NodeTest {
            node: node.clone(),
            test,
        });
    }

    tests
}

async fn run_test(client: &ManagementClient, endpoint: &Endpoint) -> TestData {
    match client.fetch::<TestData>(endpoint).await {
        Ok(test) => test,
        Err(e) => {
            debug!(endpoint = %endpoint, error = %e, "Test request failed");
            TestData::error(e.to_string())
        }
    }
}

/// vhost별 aliveness test. 요청 실패는 `error` 상태로 기록
async fn aliveness_tests(client: &ManagementClient, vhosts: &[VhostData]) -> Vec<VhostTest> {
    let mut tests = Vec::with_capacity(vhosts.len());

    for vhost in vhosts {
        let endpoint = Endpoint::AlivenessTest(vhost.name.clone());
        let test = run_test(client, &endpoint).await;
        tests.push(VhostTest {
            vhost: vhost.clone(),
            test,
        });
    }

    tests
}
