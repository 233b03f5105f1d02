use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

pub struct Metrics {
    pub updates_received: AtomicU64,
    pub messages_sent: AtomicU64,
    pub callbacks_answered: AtomicU64,
    pub gate_rejections: AtomicU64,
    pub churned_users: AtomicU64,
    pub returned_users: AtomicU64,
    pub errors: AtomicU64,
    pub start_time: Instant,
}

#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub updates_received: u64,
    pub messages_sent: u64,
    pub callbacks_answered: u64,
    pub gate_rejections: u64,
    pub churned_users: u64,
    pub returned_users: u64,
    pub errors: u64,
    pub uptime_secs: u64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            updates_received: AtomicU64::new(0),
            messages_sent: AtomicU64::new(0),
            callbacks_answered: AtomicU64::new(0),
            gate_rejections: AtomicU64::new(0),
            churned_users: AtomicU64::new(0),
            returned_users: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn increment_updates(&self) {
        self.updates_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_messages_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_callbacks(&self) {
        self.callbacks_answered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_gate_rejections(&self) {
        self.gate_rejections.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a my_chat_member transition: `blocked == true` means the user left.
    pub fn record_member_status(&self, blocked: bool) {
        if blocked {
            self.churned_users.fetch_add(1, Ordering::Relaxed);
        } else {
            self.returned_users.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn increment_errors(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            updates_received: self.updates_received.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            callbacks_answered: self.callbacks_answered.load(Ordering::Relaxed),
            gate_rejections: self.gate_rejections.load(Ordering::Relaxed),
            churned_users: self.churned_users.load(Ordering::Relaxed),
            returned_users: self.returned_users.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            uptime_secs: self.start_time.elapsed().as_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_metrics() {
        let metrics = Metrics::new();
        metrics.increment_updates();
        metrics.increment_updates();
        metrics.increment_messages_sent();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.updates_received, 2);
        assert_eq!(snapshot.messages_sent, 1);
    }

    #[test]
    fn test_member_status_split() {
        let metrics = Metrics::new();
        metrics.record_member_status(true);
        metrics.record_member_status(true);
        metrics.record_member_status(false);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.churned_users, 2);
        assert_eq!(snapshot.returned_users, 1);
    }
}
