//! # Dispatcher
//!
//! 埋点分发模块。
//!
//! 负责：
//! - 按采样率将页面浏览与交互事件 fan-out 到多个后端
//! - 隔离失败的后端，不影响其他后端
//! - 在可延迟的点击上暂缓跳转，直到所有 beacon 完成或超时

pub mod backends;
pub mod classifier;
pub mod coordinator;
pub mod dispatcher;
pub mod eligibility;
pub mod error;
pub mod host;
pub mod metrics;
pub mod registry;
pub mod sampling;
pub mod sender;
pub mod transports;

pub use backends::StaticBackend;
pub use classifier::{ClickDecision, SkipReason, classify, is_deferral_eligible};
pub use coordinator::{
    BatchState, BeaconBatch, BeaconTicket, CompletionTrigger, HeldClick, NavigationCoordinator,
};
pub use dispatcher::{ClickOutcome, Dispatcher, DispatcherBuilder, create_dispatcher};
pub use eligibility::EligibilityPolicy;
pub use error::DispatcherError;
pub use host::{LogNavigator, MemoryCookieJar, NoTargets, StaticCapabilities, StoredCookie};
pub use metrics::{DispatchMetrics, MetricsSnapshot};
pub use registry::{Delivery, DispatchReport, TrackerRegistry};
pub use sampling::SamplingDecision;
pub use sender::{BeaconSender, SettleGuard};
pub use transports::{HttpBeaconTransport, LogTransport};
