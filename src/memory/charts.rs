use crate::models::ChartAnalysis;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tracing::debug;

pub trait ChartMemory: Send + Sync {
    /// Appends an analysis, evicting the oldest one when the scope is full.
    fn remember(&self, analysis: ChartAnalysis);
    /// Analyses for a scope, oldest first.
    fn recent(&self, scope_key: &str) -> Vec<ChartAnalysis>;
    /// Drops everything for a scope and returns how many entries were removed.
    fn clear(&self, scope_key: &str) -> usize;
    /// Most analyses kept per scope.
    fn capacity(&self) -> usize;
}

pub struct InMemoryChartMemory {
    capacity: usize,
    scopes: Mutex<HashMap<String, VecDeque<ChartAnalysis>>>,
}

impl InMemoryChartMemory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            scopes: Mutex::new(HashMap::new()),
        }
    }
}

impl ChartMemory for InMemoryChartMemory {
    fn remember(&self, analysis: ChartAnalysis) {
        let mut scopes = self.scopes.lock().unwrap_or_else(|e| e.into_inner());
        let buffer = scopes.entry(analysis.scope_key.clone()).or_default();
        debug!(
            "Chart memory: storing {} for scope {}",
            analysis.filename, analysis.scope_key
        );
        buffer.push_back(analysis);
        while buffer.len() > self.capacity {
            buffer.pop_front();
        }
    }

    fn recent(&self, scope_key: &str) -> Vec<ChartAnalysis> {
        let scopes = self.scopes.lock().unwrap_or_else(|e| e.into_inner());
        scopes
            .get(scope_key)
            .map(|b| b.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn clear(&self, scope_key: &str) -> usize {
        let mut scopes = self.scopes.lock().unwrap_or_else(|e| e.into_inner());
        scopes.remove(scope_key).map(|b| b.len()).unwrap_or(0)
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn analysis(scope: &str, n: usize) -> ChartAnalysis {
        ChartAnalysis {
            scope_key: scope.to_string(),
            filename: format!("chart-{}.png", n),
            analysis: format!("analysis {}", n),
            source_url: format!("https://cdn.example/chart-{}.png", n),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_ring_buffer_evicts_oldest() {
        let memory = InMemoryChartMemory::new(3);
        for n in 0..4 {
            memory.remember(analysis("c1", n));
        }

        let kept = memory.recent("c1");
        assert_eq!(kept.len(), 3);
        assert_eq!(kept[0].filename, "chart-1.png");
        assert_eq!(kept[2].filename, "chart-3.png");
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let memory = InMemoryChartMemory::new(10);
        for n in 0..25 {
            memory.remember(analysis("c1", n));
            assert!(memory.recent("c1").len() <= memory.capacity());
        }
    }

    #[test]
    fn test_scopes_are_isolated() {
        let memory = InMemoryChartMemory::new(2);
        memory.remember(analysis("c1", 1));
        memory.remember(analysis("c2", 2));

        assert_eq!(memory.recent("c1").len(), 1);
        assert_eq!(memory.recent("c2")[0].filename, "chart-2.png");
        assert!(memory.recent("c3").is_empty());

        assert_eq!(memory.clear("c1"), 1);
        assert!(memory.recent("c1").is_empty());
        assert_eq!(memory.recent("c2").len(), 1);
    }
}
