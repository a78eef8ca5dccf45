use std::sync::{Mutex, OnceLock};

static METRICS: OnceLock<Mutex<MetricsState>> = OnceLock::new();

#[derive(Default)]
struct MetricsState {
    // 确认队列
    confirmations_requested: u64,
    confirmations_duplicate: u64,
    confirmations_approved: u64,
    confirmations_rejected: u64,
    confirmations_validator_rejected: u64,
    confirmations_cancelled: u64,
    confirmations_pending: u64,
    // 外部请求
    external_requests_created: u64,
    external_requests_swept: u64,
    // 生命周期
    lifecycle_transitions: u64,
    lifecycle_wakeups_coalesced: u64,
}

fn state() -> &'static Mutex<MetricsState> {
    METRICS.get_or_init(|| Mutex::new(MetricsState::default()))
}

fn with_state(f: impl FnOnce(&mut MetricsState)) {
    let mut s = match state().lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(), // 避免因锁污染导致 panic
    };
    f(&mut s);
}

pub fn count_confirmation_requested() {
    with_state(|s| s.confirmations_requested += 1);
}

pub fn count_confirmation_duplicate() {
    with_state(|s| s.confirmations_duplicate += 1);
}

pub fn count_confirmation_approved() {
    with_state(|s| s.confirmations_approved += 1);
}

pub fn count_confirmation_rejected() {
    with_state(|s| s.confirmations_rejected += 1);
}

pub fn count_confirmation_validator_rejected() {
    with_state(|s| s.confirmations_validator_rejected += 1);
}

pub fn count_confirmation_cancelled() {
    with_state(|s| s.confirmations_cancelled += 1);
}

pub fn set_confirmations_pending(count: usize) {
    with_state(|s| s.confirmations_pending = count as u64);
}

pub fn count_external_request_created() {
    with_state(|s| s.external_requests_created += 1);
}

pub fn count_external_requests_swept(n: usize) {
    with_state(|s| s.external_requests_swept += n as u64);
}

pub fn count_lifecycle_transition() {
    with_state(|s| s.lifecycle_transitions += 1);
}

pub fn count_wakeup_coalesced() {
    with_state(|s| s.lifecycle_wakeups_coalesced += 1);
}

pub fn render_prometheus() -> String {
    let s = match state().lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    let mut out = String::new();

    out.push_str("# HELP walletcore_confirmations_requested_total Confirmation requests enqueued\n");
    out.push_str("# TYPE walletcore_confirmations_requested_total counter\n");
    out.push_str(&format!(
        "walletcore_confirmations_requested_total {}\n",
        s.confirmations_requested
    ));

    out.push_str("# HELP walletcore_confirmations_duplicate_total Rejected duplicate confirmation requests\n");
    out.push_str("# TYPE walletcore_confirmations_duplicate_total counter\n");
    out.push_str(&format!(
        "walletcore_confirmations_duplicate_total {}\n",
        s.confirmations_duplicate
    ));

    out.push_str("# HELP walletcore_confirmations_approved_total Confirmations settled as approved\n");
    out.push_str("# TYPE walletcore_confirmations_approved_total counter\n");
    out.push_str(&format!(
        "walletcore_confirmations_approved_total {}\n",
        s.confirmations_approved
    ));

    out.push_str("# HELP walletcore_confirmations_rejected_total Confirmations settled as rejected by the user\n");
    out.push_str("# TYPE walletcore_confirmations_rejected_total counter\n");
    out.push_str(&format!(
        "walletcore_confirmations_rejected_total {}\n",
        s.confirmations_rejected
    ));

    out.push_str("# HELP walletcore_confirmations_validator_rejected_total Approvals rejected by a result validator\n");
    out.push_str("# TYPE walletcore_confirmations_validator_rejected_total counter\n");
    out.push_str(&format!(
        "walletcore_confirmations_validator_rejected_total {}\n",
        s.confirmations_validator_rejected
    ));

    out.push_str("# HELP walletcore_confirmations_cancelled_total Confirmations cancelled by the caller\n");
    out.push_str("# TYPE walletcore_confirmations_cancelled_total counter\n");
    out.push_str(&format!(
        "walletcore_confirmations_cancelled_total {}\n",
        s.confirmations_cancelled
    ));

    out.push_str("# HELP walletcore_confirmations_pending Live entries across all confirmation queues\n");
    out.push_str("# TYPE walletcore_confirmations_pending gauge\n");
    out.push_str(&format!(
        "walletcore_confirmations_pending {}\n",
        s.confirmations_pending
    ));

    out.push_str("# HELP walletcore_external_requests_created_total External signing flows registered\n");
    out.push_str("# TYPE walletcore_external_requests_created_total counter\n");
    out.push_str(&format!(
        "walletcore_external_requests_created_total {}\n",
        s.external_requests_created
    ));

    out.push_str("# HELP walletcore_external_requests_swept_total External request entries removed by sweep\n");
    out.push_str("# TYPE walletcore_external_requests_swept_total counter\n");
    out.push_str(&format!(
        "walletcore_external_requests_swept_total {}\n",
        s.external_requests_swept
    ));

    out.push_str("# HELP walletcore_lifecycle_transitions_total Lifecycle state transitions performed\n");
    out.push_str("# TYPE walletcore_lifecycle_transitions_total counter\n");
    out.push_str(&format!(
        "walletcore_lifecycle_transitions_total {}\n",
        s.lifecycle_transitions
    ));

    out.push_str("# HELP walletcore_lifecycle_wakeups_coalesced_total Wakeup calls that joined an in-flight transition\n");
    out.push_str("# TYPE walletcore_lifecycle_wakeups_coalesced_total counter\n");
    out.push_str(&format!(
        "walletcore_lifecycle_wakeups_coalesced_total {}\n",
        s.lifecycle_wakeups_coalesced
    ));

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_all_series() {
        count_confirmation_requested();
        set_confirmations_pending(3);
        let text = render_prometheus();
        // 其它并行测试也会写指标，这里只验证序列存在
        assert!(text.contains("walletcore_confirmations_requested_total"));
        assert!(text.contains("walletcore_confirmations_pending"));
        assert!(text.contains("walletcore_lifecycle_transitions_total"));
        assert!(text.contains("walletcore_external_requests_swept_total"));
    }
}
