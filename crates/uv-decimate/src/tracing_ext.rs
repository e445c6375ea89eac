//! Timing helpers for the `tracing` ecosystem.

use std::time::Instant;
use tracing::{debug, info};

/// A performance timer that logs its duration on drop.
pub struct OperationTimer {
    name: &'static str,
    start: Instant,
}

impl OperationTimer {
    /// Create a new operation timer.
    pub fn new(name: &'static str) -> Self {
        debug!(target: "uv_decimate::timing", operation = name, "Starting operation");
        Self {
            name,
            start: Instant::now(),
        }
    }

    /// Create a timer carrying mesh-size context fields.
    pub fn with_context(name: &'static str, face_count: usize, vertex_count: usize) -> Self {
        debug!(
            target: "uv_decimate::timing",
            operation = name,
            faces = face_count,
            vertices = vertex_count,
            "Starting operation"
        );
        Self {
            name,
            start: Instant::now(),
        }
    }

    /// Elapsed time in milliseconds.
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for OperationTimer {
    fn drop(&mut self) {
        info!(
            target: "uv_decimate::timing",
            operation = self.name,
            elapsed_ms = format!("{:.2}", self.elapsed_ms()),
            "Operation completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_timer() {
        let timer = OperationTimer::new("test_operation");
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert!(timer.elapsed_ms() >= 10.0);
    }
}
