//! Management API 응답 타입
//!
//! 각 엔드포인트의 JSON 응답을 타입이 있는 구조체로 디코딩합니다.
//! 메트릭으로 보고되는 필드는 리소스별 정적 테이블
//! (`메트릭 이름`, `소스 타입`, `읽기 함수`)로 선언됩니다.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::entity::EntityKind;
use crate::transformer::payload::{MetricValue, SourceType};

/// 메트릭 테이블 항목
pub struct MetricDef<T> {
    /// 보고되는 메트릭 이름
    pub name: &'static str,
    /// 소스 타입
    pub source_type: SourceType,
    /// 값 읽기 (필드가 없으면 None)
    pub read: fn(&T) -> Option<MetricValue>,
}

/// 테이블에서 읽어낸 메트릭 값
#[derive(Debug, Clone, PartialEq)]
pub struct MetricReading {
    pub name: &'static str,
    pub source_type: SourceType,
    pub value: MetricValue,
}

/// 엔티티로 보고되는 Management API 객체
pub trait ManagedObject: Sized + 'static {
    /// 엔티티 종류
    const KIND: EntityKind;

    /// API가 보고한 원래 이름
    fn name(&self) -> &str;

    /// 소속 vhost (vhost 범위가 아니면 빈 문자열)
    fn vhost(&self) -> &str {
        ""
    }

    /// 정적 메트릭 테이블
    fn metric_table() -> &'static [MetricDef<Self>];

    /// 값이 있는 메트릭만 테이블 순서대로 반환
    fn metrics(&self) -> Vec<MetricReading> {
        Self::metric_table()
            .iter()
            .filter_map(|def| {
                (def.read)(self).map(|value| MetricReading {
                    name: def.name,
                    source_type: def.source_type,
                    value,
                })
            })
            .collect()
    }
}

/// `*_details` 객체의 rate 필드
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RateDetails {
    pub rate: Option<f64>,
}

/// `/api/overview` 응답
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct OverviewData {
    pub cluster_name: String,
    pub rabbitmq_version: String,
    pub management_version: String,
}

/// `/api/nodes` 항목
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct NodeData {
    pub name: String,
    pub config_files: Vec<String>,
    pub disk_free_alarm: Option<bool>,
    #[serde(deserialize_with = "deserialize_disk_free")]
    pub disk_free: Option<i64>,
    pub fd_used: Option<i64>,
    pub fd_total: Option<i64>,
    pub proc_total: Option<i64>,
    pub proc_used: Option<i64>,
    pub mem_alarm: Option<bool>,
    pub mem_used: Option<i64>,
    /// 보이는 파티션 수 (배열 길이)
    #[serde(deserialize_with = "deserialize_array_len")]
    pub partitions: usize,
    pub running: Option<bool>,
    pub run_queue: Option<i64>,
    pub sockets_total: Option<i64>,
    pub sockets_used: Option<i64>,
}

static NODE_METRICS: &[MetricDef<NodeData>] = &[
    MetricDef {
        name: "node.diskAlarm",
        source_type: SourceType::Gauge,
        read: |n| n.disk_free_alarm.map(MetricValue::from),
    },
    MetricDef {
        name: "node.diskSpaceFreeInBytes",
        source_type: SourceType::Gauge,
        read: |n| n.disk_free.map(MetricValue::from),
    },
    MetricDef {
        name: "node.fileDescriptorsTotalUsed",
        source_type: SourceType::Gauge,
        read: |n| n.fd_used.map(MetricValue::from),
    },
    MetricDef {
        name: "node.fileDescriptorsTotal",
        source_type: SourceType::Gauge,
        read: |n| n.fd_total.map(MetricValue::from),
    },
    MetricDef {
        name: "node.processesTotal",
        source_type: SourceType::Gauge,
        read: |n| n.proc_total.map(MetricValue::from),
    },
    MetricDef {
        name: "node.processesUsed",
        source_type: SourceType::Gauge,
        read: |n| n.proc_used.map(MetricValue::from),
    },
    MetricDef {
        name: "node.hostMemoryAlarm",
        source_type: SourceType::Gauge,
        read: |n| n.mem_alarm.map(MetricValue::from),
    },
    MetricDef {
        name: "node.totalMemoryUsedInBytes",
        source_type: SourceType::Gauge,
        read: |n| n.mem_used.map(MetricValue::from),
    },
    MetricDef {
        name: "node.partitionsSeen",
        source_type: SourceType::Gauge,
        read: |n| Some(MetricValue::from(n.partitions)),
    },
    MetricDef {
        name: "node.running",
        source_type: SourceType::Gauge,
        read: |n| n.running.map(MetricValue::from),
    },
    MetricDef {
        name: "node.averageErlangProcessesWaiting",
        source_type: SourceType::Gauge,
        read: |n| n.run_queue.map(MetricValue::from),
    },
    MetricDef {
        name: "node.fileDescriptorsTotalSockets",
        source_type: SourceType::Gauge,
        read: |n| n.sockets_total.map(MetricValue::from),
    },
    MetricDef {
        name: "node.fileDescriptorsUsedSockets",
        source_type: SourceType::Gauge,
        read: |n| n.sockets_used.map(MetricValue::from),
    },
];

impl ManagedObject for NodeData {
    const KIND: EntityKind = EntityKind::Node;

    fn name(&self) -> &str {
        &self.name
    }

    fn metric_table() -> &'static [MetricDef<Self>] {
        NODE_METRICS
    }
}

/// 큐의 `message_stats`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct QueueMessageStats {
    pub ack: Option<i64>,
    pub ack_details: RateDetails,
    pub deliver: Option<i64>,
    pub deliver_details: RateDetails,
    pub deliver_get: Option<i64>,
    pub deliver_get_details: RateDetails,
    pub publish: Option<i64>,
    pub publish_details: RateDetails,
    pub redeliver: Option<i64>,
    pub redeliver_details: RateDetails,
}

/// `/api/queues` 항목
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct QueueData {
    pub name: String,
    pub vhost: String,
    pub exclusive: bool,
    pub durable: bool,
    pub auto_delete: bool,
    pub arguments: BTreeMap<String, Value>,
    pub consumers: Option<i64>,
    /// 숫자 또는 숫자 문자열
    #[serde(deserialize_with = "deserialize_lenient_f64")]
    pub consumer_utilisation: Option<f64>,
    pub active_consumers: Option<i64>,
    pub memory: Option<i64>,
    pub messages: Option<i64>,
    pub messages_details: RateDetails,
    pub messages_ready: Option<i64>,
    pub messages_ready_details: RateDetails,
    pub messages_unacknowledged: Option<i64>,
    pub messages_unacknowledged_details: RateDetails,
    pub message_stats: QueueMessageStats,
}

static QUEUE_METRICS: &[MetricDef<QueueData>] = &[
    MetricDef {
        name: "queue.consumers",
        source_type: SourceType::Gauge,
        read: |q| q.consumers.map(MetricValue::from),
    },
    MetricDef {
        name: "queue.consumerMessageUtilizationPerSecond",
        source_type: SourceType::Gauge,
        read: |q| q.consumer_utilisation.map(MetricValue::from),
    },
    MetricDef {
        name: "queue.countActiveConsumersReceiveMessages",
        source_type: SourceType::Gauge,
        read: |q| q.active_consumers.map(MetricValue::from),
    },
    MetricDef {
        name: "queue.erlangBytesConsumedInBytes",
        source_type: SourceType::Gauge,
        read: |q| q.memory.map(MetricValue::from),
    },
    MetricDef {
        name: "queue.totalMessages",
        source_type: SourceType::Gauge,
        read: |q| q.messages.map(MetricValue::from),
    },
    MetricDef {
        name: "queue.totalMessagesPerSecond",
        source_type: SourceType::Gauge,
        read: |q| q.messages_details.rate.map(MetricValue::from),
    },
    MetricDef {
        name: "queue.messagesReadyDeliveryClients",
        source_type: SourceType::Gauge,
        read: |q| q.messages_ready.map(MetricValue::from),
    },
    MetricDef {
        name: "queue.messagesReadyDeliveryClientsPerSecond",
        source_type: SourceType::Gauge,
        read: |q| q.messages_ready_details.rate.map(MetricValue::from),
    },
    MetricDef {
        name: "queue.messagesReadyUnacknowledged",
        source_type: SourceType::Gauge,
        read: |q| q.messages_unacknowledged.map(MetricValue::from),
    },
    MetricDef {
        name: "queue.messagesReadyUnacknowledgedPerSecond",
        source_type: SourceType::Gauge,
        read: |q| q.messages_unacknowledged_details.rate.map(MetricValue::from),
    },
    MetricDef {
        name: "queue.messagesAcknowledged",
        source_type: SourceType::Gauge,
        read: |q| q.message_stats.ack.map(MetricValue::from),
    },
    MetricDef {
        name: "queue.messagesAcknowledgedPerSecond",
        source_type: SourceType::Gauge,
        read: |q| q.message_stats.ack_details.rate.map(MetricValue::from),
    },
    MetricDef {
        name: "queue.messagesDeliveredAckMode",
        source_type: SourceType::Gauge,
        read: |q| q.message_stats.deliver.map(MetricValue::from),
    },
    MetricDef {
        name: "queue.messagesDeliveredAckModePerSecond",
        source_type: SourceType::Gauge,
        read: |q| q.message_stats.deliver_details.rate.map(MetricValue::from),
    },
    MetricDef {
        name: "queue.sumMessagesDelivered",
        source_type: SourceType::Gauge,
        read: |q| q.message_stats.deliver_get.map(MetricValue::from),
    },
    MetricDef {
        name: "queue.sumMessagesDeliveredPerSecond",
        source_type: SourceType::Gauge,
        read: |q| q.message_stats.deliver_get_details.rate.map(MetricValue::from),
    },
    MetricDef {
        name: "queue.messagesPublished",
        source_type: SourceType::Gauge,
        read: |q| q.message_stats.publish.map(MetricValue::from),
    },
    MetricDef {
        name: "queue.messagesPublishedPerSecond",
        source_type: SourceType::Gauge,
        read: |q| q.message_stats.publish_details.rate.map(MetricValue::from),
    },
    MetricDef {
        name: "queue.messagesRedeliverGet",
        source_type: SourceType::Gauge,
        read: |q| q.message_stats.redeliver.map(MetricValue::from),
    },
    MetricDef {
        name: "queue.messagesRedeliverGetPerSecond",
        source_type: SourceType::Gauge,
        read: |q| q.message_stats.redeliver_details.rate.map(MetricValue::from),
    },
];

impl ManagedObject for QueueData {
    const KIND: EntityKind = EntityKind::Queue;

    fn name(&self) -> &str {
        &self.name
    }

    fn vhost(&self) -> &str {
        &self.vhost
    }

    fn metric_table() -> &'static [MetricDef<Self>] {
        QUEUE_METRICS
    }
}

/// 익스체인지의 `message_stats`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExchangeMessageStats {
    pub publish_in: Option<i64>,
    pub publish_in_details: RateDetails,
    pub publish_out: Option<i64>,
    pub publish_out_details: RateDetails,
}

/// `/api/exchanges` 항목
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExchangeData {
    pub name: String,
    pub vhost: String,
    #[serde(rename = "type")]
    pub exchange_type: String,
    pub durable: bool,
    pub auto_delete: bool,
    pub arguments: BTreeMap<String, Value>,
    pub message_stats: ExchangeMessageStats,
}

static EXCHANGE_METRICS: &[MetricDef<ExchangeData>] = &[
    MetricDef {
        name: "exchange.messagesPublishedPerChannel",
        source_type: SourceType::Gauge,
        read: |e| e.message_stats.publish_in.map(MetricValue::from),
    },
    MetricDef {
        name: "exchange.messagesPublishedPerChannelPerSecond",
        source_type: SourceType::Gauge,
        read: |e| e.message_stats.publish_in_details.rate.map(MetricValue::from),
    },
    MetricDef {
        name: "exchange.messagesPublishedQueue",
        source_type: SourceType::Gauge,
        read: |e| e.message_stats.publish_out.map(MetricValue::from),
    },
    MetricDef {
        name: "exchange.messagesPublishedQueuePerSecond",
        source_type: SourceType::Gauge,
        read: |e| e.message_stats.publish_out_details.rate.map(MetricValue::from),
    },
];

impl ManagedObject for ExchangeData {
    const KIND: EntityKind = EntityKind::Exchange;

    fn name(&self) -> &str {
        &self.name
    }

    fn vhost(&self) -> &str {
        &self.vhost
    }

    fn metric_table() -> &'static [MetricDef<Self>] {
        EXCHANGE_METRICS
    }
}

/// `/api/vhosts` 항목
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct VhostData {
    pub name: String,
}

/// `/api/connections` 항목
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectionData {
    pub vhost: String,
    pub state: String,
}

/// `/api/bindings` 항목
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BindingData {
    #[serde(default)]
    pub vhost: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub destination: String,
    /// 알 수 없는 destination_type이면 None
    #[serde(default, deserialize_with = "deserialize_destination_type")]
    pub destination_type: Option<EntityKind>,
}

/// `/api/aliveness-test/{vhost}`, `/api/healthchecks/node/{node}` 응답
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TestData {
    pub status: String,
    pub reason: String,
}

impl TestData {
    pub const OK: &'static str = "ok";

    /// 요청 자체가 실패한 경우의 결과
    pub fn error(reason: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            reason: reason.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Self::OK
    }
}

/// vhost와 aliveness 결과 쌍
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VhostTest {
    pub vhost: VhostData,
    pub test: TestData,
}

/// 노드와 healthcheck 결과 쌍
#[derive(Debug, Clone, PartialEq)]
pub struct NodeTest {
    pub node: NodeData,
    pub test: TestData,
}

/// 배열을 길이로 디코딩 (null이면 0)
fn deserialize_array_len<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    let items: Option<Vec<serde::de::IgnoredAny>> = Option::deserialize(deserializer)?;
    Ok(items.map_or(0, |items| items.len()))
}

/// i64 범위를 넘는 disk_free 값은 버림
fn deserialize_disk_free<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let number: Option<serde_json::Number> = Option::deserialize(deserializer)?;
    Ok(number.and_then(|n| match n.as_i64() {
        Some(v) => Some(v),
        None => {
            tracing::warn!(value = %n, "Node's disk_free value is too high to be reported, ignoring it");
            None
        }
    }))
}

/// 숫자 또는 숫자 문자열을 f64로 디코딩 (그 외는 None)
fn deserialize_lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<Value> = Option::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// 알 수 없는 destination_type은 목록 전체를 실패시키지 않고 None으로 디코딩
fn deserialize_destination_type<'de, D>(deserializer: D) -> Result<Option<EntityKind>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<Value> = Option::deserialize(deserializer)?;
    Ok(value.and_then(|value| match serde_json::from_value(value.clone()) {
        Ok(kind) => Some(kind),
        Err(_) => {
            tracing::warn!(destination_type = %value, "Unknown binding destination type, skipping binding");
            None
        }
    }))
}
