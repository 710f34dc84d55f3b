//! Hit/miss accounting for the response cache.

use std::collections::VecDeque;
use std::fmt;

use serde::Serialize;

/// Counters and latency samples, guarded by the cache lock.
///
/// Hit and miss counts and the latency sums are exact for the life of the
/// process. The retained sample sequences are unbounded unless a window is
/// configured, in which case only the newest samples are kept.
#[derive(Debug, Default)]
pub(crate) struct LatencyStats {
    hits: u64,
    misses: u64,
    hit_total_ms: f64,
    miss_total_ms: f64,
    hit_samples: VecDeque<f64>,
    miss_samples: VecDeque<f64>,
    max_samples: Option<usize>,
}

impl LatencyStats {
    pub(crate) fn new(max_samples: Option<usize>) -> Self {
        Self {
            max_samples,
            ..Default::default()
        }
    }

    pub(crate) fn record_hit(&mut self, elapsed_ms: f64) {
        self.hits += 1;
        self.hit_total_ms += elapsed_ms;
        push_capped(&mut self.hit_samples, elapsed_ms, self.max_samples);
    }

    pub(crate) fn record_miss(&mut self, elapsed_ms: f64) {
        self.misses += 1;
        self.miss_total_ms += elapsed_ms;
        push_capped(&mut self.miss_samples, elapsed_ms, self.max_samples);
    }

    pub(crate) fn max_samples(&self) -> Option<usize> {
        self.max_samples
    }

    pub(crate) fn hit_samples(&self) -> Vec<f64> {
        self.hit_samples.iter().copied().collect()
    }

    pub(crate) fn miss_samples(&self) -> Vec<f64> {
        self.miss_samples.iter().copied().collect()
    }

    pub(crate) fn snapshot(&self, size: usize, capacity: usize) -> CacheStats {
        let total = self.hits + self.misses;
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            hit_rate: ratio(self.hits as f64, total),
            size,
            capacity,
            total_time_saved_ms: self.hit_total_ms,
            avg_hit_latency_ms: ratio(self.hit_total_ms, self.hits),
            avg_miss_latency_ms: ratio(self.miss_total_ms, self.misses),
        }
    }
}

fn push_capped(samples: &mut VecDeque<f64>, value: f64, cap: Option<usize>) {
    if cap == Some(0) {
        return;
    }
    if let Some(cap) = cap {
        while samples.len() >= cap {
            samples.pop_front();
        }
    }
    samples.push_back(value);
}

fn ratio(numerator: f64, count: u64) -> f64 {
    if count == 0 {
        0.0
    } else {
        numerator / count as f64
    }
}

/// Point-in-time view of cache health.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// `hits / (hits + misses)`, 0 before the first request.
    pub hit_rate: f64,
    /// Live (unexpired) entries.
    pub size: usize,
    pub capacity: usize,
    /// Sum of all hit latencies in milliseconds.
    pub total_time_saved_ms: f64,
    /// Mean hit latency in milliseconds, 0 before the first hit.
    pub avg_hit_latency_ms: f64,
    /// Mean upstream latency of successful misses in milliseconds.
    pub avg_miss_latency_ms: f64,
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Cache Statistics:")?;
        writeln!(f, "  - Cache hits: {}", self.hits)?;
        writeln!(f, "  - Cache misses: {}", self.misses)?;
        writeln!(f, "  - Hit rate: {:.1}%", self.hit_rate * 100.0)?;
        writeln!(f, "  - Cache size: {}/{}", self.size, self.capacity)?;
        writeln!(
            f,
            "  - Time saved: {:.1}s total",
            self.total_time_saved_ms / 1000.0
        )?;
        write!(
            f,
            "  - Avg time saved per hit: {:.1}ms",
            self.avg_hit_latency_ms
        )
    }
}
