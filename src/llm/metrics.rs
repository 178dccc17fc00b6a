use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct ProviderStats {
    pub successes: u64,
    pub failures: u64,
    pub total_latency: Duration,
}

impl ProviderStats {
    pub fn success_rate(&self) -> f32 {
        let total = self.successes + self.failures;
        if total == 0 {
            0.0
        } else {
            self.successes as f32 / total as f32
        }
    }

    pub fn mean_latency(&self) -> Option<Duration> {
        let calls = self.successes + self.failures;
        u32::try_from(calls)
            .ok()
            .filter(|c| *c > 0)
            .map(|c| self.total_latency / c)
    }
}

/// Per-provider call counters kept by the failover orchestrator
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    providers: HashMap<String, ProviderStats>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, provider_id: &str, latency: Duration) {
        let stats = self.providers.entry(provider_id.to_string()).or_default();
        stats.successes += 1;
        stats.total_latency += latency;
    }

    pub fn record_failure(&mut self, provider_id: &str, latency: Duration) {
        let stats = self.providers.entry(provider_id.to_string()).or_default();
        stats.failures += 1;
        stats.total_latency += latency;
    }

    pub fn stats(&self, provider_id: &str) -> ProviderStats {
        self.providers.get(provider_id).cloned().unwrap_or_default()
    }

    pub fn success_rate(&self, provider_id: &str) -> f32 {
        self.stats(provider_id).success_rate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_rate() {
        let mut m = Metrics::new();
        assert_eq!(m.success_rate("groq"), 0.0);

        m.record_success("groq", Duration::from_millis(100));
        m.record_success("groq", Duration::from_millis(100));
        m.record_failure("groq", Duration::from_millis(400));
        m.record_failure("ollama", Duration::from_millis(10));

        assert!((m.success_rate("groq") - 2.0 / 3.0).abs() < 1e-6);
        assert_eq!(m.stats("groq").mean_latency(), Some(Duration::from_millis(200)));
        assert_eq!(m.success_rate("ollama"), 0.0);
    }
}
