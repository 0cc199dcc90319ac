use std::time::Duration;

use parking_lot::Mutex;

use crate::{net::address::Address, presets::PresetConfig};

/// A server the client can forward connections to.
#[derive(Debug, Clone, PartialEq)]
pub struct Upstream {
    pub id: usize,
    pub address: Address,
    pub key: String,
    pub presets: Vec<PresetConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Latency {
    Unmeasured,
    Measured(Duration),
    Failed(u32),
}

struct State {
    latencies: Vec<Latency>,
    current: Option<usize>,
}

/// Picks the upstream with the lowest connect latency, servers never tried come first.
pub struct Balancer {
    upstreams: Vec<Upstream>,
    state: Mutex<State>,
}

impl Balancer {
    pub fn new(upstreams: Vec<Upstream>) -> Self {
        let latencies = vec![Latency::Unmeasured; upstreams.len()];

        Self {
            upstreams,
            state: Mutex::new(State {
                latencies,
                current: None,
            }),
        }
    }

    pub fn select(&self) -> Option<Upstream> {
        let mut state = self.state.lock();

        // min_by_key keeps the first one among equals, which is configuration order
        let (index, _) = state.latencies.iter().enumerate().min_by_key(|(_, latency)| **latency)?;

        if state.current != Some(index) {
            log::info!("[balancer] use: {}", self.upstreams[index].address);
            state.current = Some(index);
        }

        Some(self.upstreams[index].clone())
    }

    pub fn report_latency(&self, id: usize, latency: Duration) {
        if let Some(slot) = self.state.lock().latencies.get_mut(id) {
            *slot = Latency::Measured(latency);
        }
    }

    pub fn report_failure(&self, id: usize) {
        if let Some(slot) = self.state.lock().latencies.get_mut(id) {
            *slot = match *slot {
                Latency::Failed(n) => Latency::Failed(n.saturating_add(1)),
                _ => Latency::Failed(1),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upstream(id: usize, address: &str) -> Upstream {
        Upstream {
            id,
            address: address.parse().unwrap(),
            key: "key".into(),
            presets: vec![],
        }
    }

    #[test]
    fn test_select() {
        let balancer = Balancer::new(vec![upstream(0, "127.0.0.1:1"), upstream(1, "127.0.0.1:2")]);

        assert_eq!(balancer.select().unwrap().id, 0);

        balancer.report_latency(0, Duration::from_millis(50));
        assert_eq!(balancer.select().unwrap().id, 1);

        balancer.report_latency(1, Duration::from_millis(80));
        assert_eq!(balancer.select().unwrap().id, 0);

        balancer.report_failure(0);
        assert_eq!(balancer.select().unwrap().id, 1);
    }

    #[test]
    fn test_select_empty() {
        assert!(Balancer::new(vec![]).select().is_none());
    }
}
