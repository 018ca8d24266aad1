//! 信标分发指标模块
//!
//! 通过 `metrics` facade 记录信标发送、结算、后端失败与导航事件。
//! 未安装 recorder 时所有调用均为空操作。

use metrics::{counter, histogram};

/// 信标发送模式标签
pub const MODE_SIMPLE: &str = "simple";
/// 需要结算回执的发送模式
pub const MODE_ACKNOWLEDGED: &str = "acknowledged";

/// 记录一次分发调用 (无论采样结果)
pub fn record_dispatch(request: &str) {
    counter!(
        "beacon_dispatch_events_total",
        "request" => request.to_string()
    )
    .increment(1);
}

/// 记录信标发出
pub fn record_beacon_fired(mode: &'static str) {
    counter!("beacon_dispatch_beacons_fired_total", "mode" => mode).increment(1);
}

/// 记录信标结算 (load / error / abort 均视为结算)
pub fn record_beacon_settled() {
    counter!("beacon_dispatch_beacons_settled_total").increment(1);
}

/// 记录被采样排除的后端
pub fn record_sampled_out(backend: &str) {
    counter!(
        "beacon_dispatch_sampled_out_total",
        "backend" => backend.to_string()
    )
    .increment(1);
}

/// 记录后端计算 URL 失败
pub fn record_backend_failure(backend: &str) {
    counter!(
        "beacon_dispatch_backend_failures_total",
        "backend" => backend.to_string()
    )
    .increment(1);
}

/// 记录一次延迟导航的完成
///
/// `trigger` 为 "all_settled" 或 "deadline"，`hold_ms` 为点击到完成的持有时长。
pub fn record_navigation(trigger: &'static str, hold_ms: f64) {
    counter!("beacon_dispatch_navigations_total", "trigger" => trigger).increment(1);
    histogram!("beacon_dispatch_hold_ms").record(hold_ms);
}

/// 记录被新点击取代的批次
pub fn record_batch_superseded() {
    counter!("beacon_dispatch_batches_superseded_total").increment(1);
}
