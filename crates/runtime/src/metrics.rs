use std::collections::BTreeMap;

/// Counters and gauges describing one synthesis run.
///
/// Values come from attempt counts and result sizes only, never from clocks,
/// and both maps are sorted, so two identical runs produce equal reports.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Metrics {
    counters: BTreeMap<String, u64>,
    gauges: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub counters: Vec<(String, u64)>,
    pub gauges: Vec<(String, i64)>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty() && self.gauges.is_empty()
    }

    pub fn counter(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    pub fn inc_counter(&mut self, name: impl Into<String>, by: u64) {
        let name = name.into();
        *self.counters.entry(name).or_insert(0) += by;
    }

    pub fn gauge(&self, name: &str) -> Option<i64> {
        self.gauges.get(name).copied()
    }

    pub fn set_gauge(&mut self, name: impl Into<String>, value: i64) {
        self.gauges.insert(name.into(), value);
    }

    /// Folds another report into this one: counters add up, gauges from
    /// `other` win.
    pub fn merge(&mut self, other: Metrics) {
        for (name, by) in other.counters {
            *self.counters.entry(name).or_insert(0) += by;
        }
        self.gauges.extend(other.gauges);
    }

    /// Sorted copy for logging.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            counters: self.counters.iter().map(|(k, v)| (k.clone(), *v)).collect(),
            gauges: self.gauges.iter().map(|(k, v)| (k.clone(), *v)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Metrics;

    #[test]
    fn counters_accumulate() {
        let mut m = Metrics::new();
        m.inc_counter("a", 1);
        m.inc_counter("a", 2);
        assert_eq!(m.counter("a"), 3);
        assert_eq!(m.counter("missing"), 0);
    }

    #[test]
    fn gauges_overwrite() {
        let mut m = Metrics::new();
        assert_eq!(m.gauge("g"), None);
        m.set_gauge("g", 10);
        m.set_gauge("g", 11);
        assert_eq!(m.gauge("g"), Some(11));
    }

    #[test]
    fn merge_adds_counters_and_replaces_gauges() {
        let mut run = Metrics::new();
        assert!(run.is_empty());
        run.inc_counter("airports.seed.attempts", 4);
        run.set_gauge("airports.count", 10);

        let mut stage = Metrics::new();
        stage.inc_counter("airports.seed.attempts", 6);
        stage.inc_counter("routes.built", 3);
        stage.set_gauge("airports.count", 12);
        run.merge(stage);

        assert_eq!(run.counter("airports.seed.attempts"), 10);
        assert_eq!(run.counter("routes.built"), 3);
        assert_eq!(run.gauge("airports.count"), Some(12));
        assert!(!run.is_empty());
    }

    #[test]
    fn snapshot_is_stably_sorted() {
        let mut m = Metrics::new();
        m.inc_counter("b", 1);
        m.inc_counter("a", 1);
        m.set_gauge("z", 1);
        m.set_gauge("m", 2);

        let snap = m.snapshot();
        assert_eq!(
            snap.counters,
            vec![("a".to_string(), 1), ("b".to_string(), 1)]
        );
        assert_eq!(
            snap.gauges,
            vec![("m".to_string(), 2), ("z".to_string(), 1)]
        );
    }
}
