pub mod colors;
pub mod config;
pub mod error;
pub mod expiry;
pub mod metrics;
pub mod orchestrator;
pub mod output;
pub mod record;
pub mod resolver;
pub mod retry;
pub mod special;
pub mod store;
pub mod trigger;
pub mod validation;
pub mod whois;

pub use error::{Result, WatchError};
pub use validation::normalize_domain;

pub use config::{ConfigCoordinator, ConfigDelta, ConfigLayers, ConfigSource, ExecutionMode, LiveConfig, NacosSource};
pub use expiry::{Extraction, ExpiryExtractor, SanityWindow};
pub use metrics::{DomainMetrics, MetricSample};
pub use orchestrator::{CheckOrchestrator, PassReason, PassSummary};
pub use record::{DomainRecord, ResolutionMethod, FAILURE_SENTINEL_DAYS};
pub use resolver::{DomainResolver, WhoisResolver};
pub use retry::RetryPolicy;
pub use special::{ExpiryEstimator, FixedHorizon, SpecialDomains};
pub use store::DomainStore;
pub use trigger::CheckTrigger;
pub use whois::{TcpTransport, WhoisClient, WhoisTransport};

pub use output::{OutputFormat, OutputFormatter};
