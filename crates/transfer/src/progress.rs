use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use s3up_protocol::{Eta, MIB, ProgressEvent};

/// Minimum spacing between two in-flight progress notifications.
const DEFAULT_INTERIM_INTERVAL: Duration = Duration::from_millis(100);

/// Callback invoked with upload progress.
pub type ProgressCallback = Box<dyn Fn(ProgressEvent) + Send + Sync>;

/// Accumulates confirmed bytes for one upload and derives throughput/ETA.
///
/// In-flight updates are throttled; confirmed-part updates always go out.
/// Nothing is persisted.
pub struct ProgressTracker {
    inner: Mutex<TrackerInner>,
    callback: ProgressCallback,
}

struct TrackerInner {
    file_size: u64,
    bytes_confirmed: u64,
    /// Bytes already confirmed when this run started (resume).
    baseline: u64,
    started_at: Instant,
    in_flight: HashMap<u32, u64>,
    last_interim: Option<Instant>,
    interim_interval: Duration,
}

impl TrackerInner {
    fn percent_of(&self, bytes: u64) -> f64 {
        if self.file_size == 0 {
            return 0.0;
        }
        (bytes as f64 / self.file_size as f64 * 100.0).clamp(0.0, 100.0)
    }

    fn throughput(&self) -> f64 {
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed <= 0.0 {
            return 0.0;
        }
        self.bytes_confirmed.saturating_sub(self.baseline) as f64 / elapsed
    }

    fn eta(&self) -> Eta {
        let speed = self.throughput();
        if speed <= 0.0 {
            return Eta::Unknown;
        }
        let remaining = self.file_size.saturating_sub(self.bytes_confirmed);
        Eta::Seconds(remaining as f64 / speed)
    }

    fn event(&self, bytes: u64, message: &str) -> ProgressEvent {
        ProgressEvent {
            percent: self.percent_of(bytes),
            status_message: message.to_string(),
            throughput_mbs: self.throughput() / MIB,
            eta_seconds: self.eta(),
        }
    }
}

impl ProgressTracker {
    #[cfg(test)]
    pub fn new(file_size: u64, callback: ProgressCallback) -> Self {
        Self::resumed(file_size, 0, callback)
    }

    /// Starts tracking with `already_confirmed` bytes carried over from an
    /// earlier run. Those bytes count toward progress but not throughput.
    pub fn resumed(file_size: u64, already_confirmed: u64, callback: ProgressCallback) -> Self {
        Self {
            inner: Mutex::new(TrackerInner {
                file_size,
                bytes_confirmed: already_confirmed,
                baseline: already_confirmed,
                started_at: Instant::now(),
                in_flight: HashMap::new(),
                last_interim: None,
                interim_interval: DEFAULT_INTERIM_INTERVAL,
            }),
            callback,
        }
    }

    #[cfg(test)]
    pub fn with_interim_interval(self, interval: Duration) -> Self {
        self.lock().interim_interval = interval;
        self
    }

    fn lock(&self) -> MutexGuard<'_, TrackerInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Records in-flight bytes sent so far for one part.
    ///
    /// Emits at most one event per interim interval. Returns `true` if an
    /// event was emitted.
    pub fn record_part_progress(&self, part_number: u32, bytes_within_part: u64, message: &str) -> bool {
        let event = {
            let mut s = self.lock();
            s.in_flight.insert(part_number, bytes_within_part);

            let now = Instant::now();
            let due = s
                .last_interim
                .is_none_or(|last| now.duration_since(last) >= s.interim_interval);
            if !due {
                return false;
            }
            s.last_interim = Some(now);

            let in_flight: u64 = s.in_flight.values().sum();
            s.event(s.bytes_confirmed + in_flight, message)
        };
        (self.callback)(event);
        true
    }

    /// Records a confirmed part. Never throttled.
    pub fn record_part_complete(&self, part_number: u32, part_size_bytes: u64, message: &str) {
        let event = {
            let mut s = self.lock();
            s.in_flight.remove(&part_number);
            s.bytes_confirmed += part_size_bytes;
            s.event(s.bytes_confirmed, message)
        };
        (self.callback)(event);
    }

    /// Emits a status message with the current confirmed figures.
    pub fn status(&self, message: &str) {
        let event = {
            let s = self.lock();
            s.event(s.bytes_confirmed, message)
        };
        (self.callback)(event);
    }

    #[cfg(test)]
    pub fn bytes_confirmed(&self) -> u64 {
        self.lock().bytes_confirmed
    }

    #[cfg(test)]
    pub fn percent(&self) -> f64 {
        let s = self.lock();
        s.percent_of(s.bytes_confirmed)
    }

    /// Average bytes/second confirmed during this run; 0 before any time has passed.
    pub fn throughput(&self) -> f64 {
        self.lock().throughput()
    }

    #[cfg(test)]
    pub fn eta(&self) -> Eta {
        self.lock().eta()
    }

    pub fn elapsed(&self) -> Duration {
        self.lock().started_at.elapsed()
    }
}
