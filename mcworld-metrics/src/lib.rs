use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Counters of one keyed cache (chunks or players).
#[derive(Debug, Default)]
pub struct CacheMetrics {
    pub hits: AtomicUsize,
    pub misses: AtomicUsize,
    // Requests that joined a load already in flight
    pub coalesced: AtomicUsize,

    pub loads: AtomicUsize,
    pub failures: AtomicUsize,
    pub total_load_time_us: AtomicU64,
    pub max_load_time_us: AtomicU64,
}

impl CacheMetrics {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_coalesced(&self) {
        self.coalesced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_load(&self, duration: Duration) {
        self.loads.fetch_add(1, Ordering::Relaxed);
        self.record_load_time(duration);
    }

    pub fn record_failure(&self, duration: Duration) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        self.record_load_time(duration);
    }

    fn record_load_time(&self, duration: Duration) {
        let us = duration.as_micros() as u64;
        self.total_load_time_us.fetch_add(us, Ordering::Relaxed);
        self.max_load_time_us.fetch_max(us, Ordering::Relaxed);
    }

    /// Share of requests answered without waiting on storage, in percent.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let total = hits + self.misses.load(Ordering::Relaxed) + self.coalesced.load(Ordering::Relaxed);
        if total > 0 { (hits as f64 / total as f64) * 100.0 } else { 0.0 }
    }

    fn report_section(&self, title: &str) -> String {
        let loads = self.loads.load(Ordering::Relaxed);
        let failures = self.failures.load(Ordering::Relaxed);
        let attempts = loads + failures;
        let total_ms = self.total_load_time_us.load(Ordering::Relaxed) as f64 / 1000.0;
        let avg_ms = if attempts > 0 { total_ms / attempts as f64 } else { 0.0 };
        let max_ms = self.max_load_time_us.load(Ordering::Relaxed) as f64 / 1000.0;

        format!(
            "[{}]\n\
             Hits: {}\n\
             Misses: {}\n\
             Coalesced: {}\n\
             Hit Rate: {:.1}%\n\
             Loaded: {}\n\
             Failed: {}\n\
             Avg Load: {:.2} ms\n\
             Max Load: {:.2} ms\n",
            title,
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
            self.coalesced.load(Ordering::Relaxed),
            self.hit_rate(),
            loads,
            failures,
            avg_ms,
            max_ms,
        )
    }
}

#[derive(Debug)]
pub struct WorldMetrics {
    pub chunks: Arc<CacheMetrics>,
    pub players: Arc<CacheMetrics>,

    pub regions_opened: AtomicUsize,

    pub chunks_saved: AtomicUsize,
    pub save_failures: AtomicUsize,
    pub total_save_time_us: AtomicU64,
    pub total_bytes_saved: AtomicUsize,

    pub start_time: Instant,
}

impl Default for WorldMetrics {
    fn default() -> Self {
        Self {
            chunks: Arc::default(),
            players: Arc::default(),
            regions_opened: AtomicUsize::new(0),
            chunks_saved: AtomicUsize::new(0),
            save_failures: AtomicUsize::new(0),
            total_save_time_us: AtomicU64::new(0),
            total_bytes_saved: AtomicUsize::new(0),
            start_time: Instant::now(),
        }
    }
}

impl WorldMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_region_opened(&self) {
        self.regions_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_save(&self, duration: Duration, bytes: usize) {
        self.chunks_saved.fetch_add(1, Ordering::Relaxed);
        self.total_save_time_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        self.total_bytes_saved.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_save_failure(&self) {
        self.save_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn generate_report(&self) -> String {
        let uptime = self.start_time.elapsed();

        let saved = self.chunks_saved.load(Ordering::Relaxed);
        let save_time = self.total_save_time_us.load(Ordering::Relaxed) as f64 / 1000.0;
        let save_avg = if saved > 0 { save_time / saved as f64 } else { 0.0 };
        let saved_kb = self.total_bytes_saved.load(Ordering::Relaxed) as f64 / 1024.0;

        format!(
            "World Access Report\n\
             ===================\n\
             Session Duration: {:.2?}\n\
             Regions Opened: {}\n\n\
             {}\n\
             {}\n\
             [Chunk Saves]\n\
             Saved: {}\n\
             Failed: {}\n\
             Avg Time: {:.2} ms/chunk\n\
             Written: {:.1} KB\n",
            uptime,
            self.regions_opened.load(Ordering::Relaxed),
            self.chunks.report_section("Chunk Cache"),
            self.players.report_section("Player Cache"),
            saved,
            self.save_failures.load(Ordering::Relaxed),
            save_avg,
            saved_kb,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        let metrics = CacheMetrics::default();
        assert_eq!(metrics.hit_rate(), 0.0);

        metrics.record_miss();
        metrics.record_hit();
        metrics.record_hit();
        metrics.record_coalesced();
        assert_eq!(metrics.hit_rate(), 50.0);
    }

    #[test]
    fn test_load_times() {
        let metrics = CacheMetrics::default();
        metrics.record_load(Duration::from_micros(300));
        metrics.record_failure(Duration::from_micros(900));

        assert_eq!(metrics.loads.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.failures.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.total_load_time_us.load(Ordering::Relaxed), 1200);
        assert_eq!(metrics.max_load_time_us.load(Ordering::Relaxed), 900);
    }

    #[test]
    fn test_report_mentions_every_section() {
        let metrics = WorldMetrics::new();
        metrics.record_region_opened();
        metrics.record_save(Duration::from_millis(2), 2048);

        let report = metrics.generate_report();
        assert!(report.contains("Regions Opened: 1"));
        assert!(report.contains("[Chunk Cache]"));
        assert!(report.contains("[Player Cache]"));
        assert!(report.contains("Saved: 1"));
        assert!(report.contains("Written: 2.0 KB"));
    }
}
