//! Periodic metrics export
//!
//! The exporter runs on its own thread, independent of the ramp phases. Every
//! period it takes a [`Snapshot`](super::Snapshot) of the shared aggregator and
//! appends it to the sink as one JSON line. A failed write is logged and the
//! loop keeps going; the run is never aborted because the metrics file
//! misbehaves.
//!
//! # Example
//!
//! ```
//! use stairload::stats::MetricsAggregator;
//! use stairload::stats::exporter::SnapshotExporter;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let metrics = Arc::new(MetricsAggregator::new());
//! let exporter = SnapshotExporter::spawn(
//!     Arc::clone(&metrics),
//!     Duration::from_secs(60),
//!     Vec::<u8>::new(),
//!     true,
//! ).unwrap();
//!
//! // Stopping performs one final flush
//! let stats = exporter.stop();
//! assert_eq!(stats.written, 1);
//! ```

use super::MetricsAggregator;
use crate::config::OutputConfig;
use crate::output::json::encode_snapshot;
use crate::Result;
use anyhow::Context;
use crossbeam::channel::{self, Receiver, Sender};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Counts of export attempts, returned by [`SnapshotExporter::stop`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportStats {
    pub written: u64,
    pub failed: u64,
}

/// Handle to the background export thread
#[derive(Debug)]
pub struct SnapshotExporter {
    stop: Sender<()>,
    handle: Option<JoinHandle<ExportStats>>,
}

impl SnapshotExporter {
    /// Start exporting `metrics` to `sink` every `period`
    ///
    /// With `final_flush` set, one more snapshot is written when the exporter
    /// is stopped, so the sink always ends with the final totals.
    pub fn spawn<W>(
        metrics: Arc<MetricsAggregator>,
        period: Duration,
        sink: W,
        final_flush: bool,
    ) -> Result<Self>
    where
        W: Write + Send + 'static,
    {
        if period.is_zero() {
            anyhow::bail!("Metrics export period must be greater than zero");
        }

        let (stop_tx, stop_rx) = channel::bounded(1);
        let handle = thread::Builder::new()
            .name("stairload-exporter".to_string())
            .spawn(move || export_loop(metrics, period, sink, stop_rx, final_flush))
            .context("Failed to spawn metrics exporter thread")?;

        Ok(Self {
            stop: stop_tx,
            handle: Some(handle),
        })
    }

    /// Stop the loop, perform the final flush (if enabled) and wait for the thread
    pub fn stop(mut self) -> ExportStats {
        self.shutdown()
    }

    fn shutdown(&mut self) -> ExportStats {
        let _ = self.stop.try_send(());
        match self.handle.take() {
            Some(handle) => handle.join().unwrap_or_else(|_| {
                tracing::error!("metrics exporter thread panicked");
                ExportStats::default()
            }),
            None => ExportStats::default(),
        }
    }
}

impl Drop for SnapshotExporter {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Start exporting to the configured metrics file, if there is one
///
/// The file is truncated on open. Without a metrics file nothing is spawned
/// and `None` is returned.
///
/// # Errors
///
/// Fails when the file cannot be created.
pub fn start_file_exporter(
    metrics: Arc<MetricsAggregator>,
    output: &OutputConfig,
) -> Result<Option<SnapshotExporter>> {
    let Some(path) = output.metrics_file.as_deref() else {
        tracing::info!("no metrics file configured, periodic export disabled");
        return Ok(None);
    };

    let sink = File::create(path)
        .with_context(|| format!("Unable to create metrics file: {}", path.display()))?;
    let exporter = SnapshotExporter::spawn(
        metrics,
        output.metrics_period(),
        BufWriter::new(sink),
        output.final_flush,
    )?;
    Ok(Some(exporter))
}

fn export_loop<W: Write>(
    metrics: Arc<MetricsAggregator>,
    period: Duration,
    mut sink: W,
    stop: Receiver<()>,
    final_flush: bool,
) -> ExportStats {
    let ticker = channel::tick(period);
    let mut stats = ExportStats::default();

    loop {
        channel::select! {
            recv(ticker) -> _ => export_once(&metrics, &mut sink, &mut stats),
            recv(stop) -> _ => break,
        }
    }

    if final_flush {
        export_once(&metrics, &mut sink, &mut stats);
    }

    tracing::debug!(written = stats.written, failed = stats.failed, "metrics exporter stopped");
    stats
}

fn export_once<W: Write>(metrics: &MetricsAggregator, sink: &mut W, stats: &mut ExportStats) {
    let snapshot = metrics.snapshot();

    let written = encode_snapshot(&snapshot).and_then(|line| {
        sink.write_all(line.as_bytes())?;
        sink.write_all(b"\n")?;
        sink.flush()?;
        Ok(())
    });

    match written {
        Ok(()) => stats.written += 1,
        Err(e) => {
            stats.failed += 1;
            tracing::warn!(error = %e, "failed to write metrics snapshot");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::AttackResult;
    use crate::output::json::decode_snapshot;
    use chrono::Utc;
    use std::io;
    use std::sync::Mutex;

    /// Sink whose writes always fail
    struct BrokenSink;

    impl Write for BrokenSink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Sink shared with the test so contents can be inspected after the thread ends
    #[derive(Clone, Default)]
    struct SharedSink(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn ok_result() -> AttackResult {
        AttackResult {
            attack: "exporter".to_string(),
            seq: 0,
            code: 200,
            timestamp: Utc::now(),
            latency: Duration::from_millis(1),
            bytes_out: 0,
            bytes_in: 0,
            error: None,
            method: "GET".to_string(),
            url: "http://localhost/".to_string(),
        }
    }

    #[test]
    fn test_exporter_writes_periodically() {
        let metrics = Arc::new(MetricsAggregator::new());
        metrics.add(&ok_result());
        let sink = SharedSink::default();

        let exporter =
            SnapshotExporter::spawn(Arc::clone(&metrics), Duration::from_millis(20), sink.clone(), false)
                .unwrap();
        thread::sleep(Duration::from_millis(150));
        let stats = exporter.stop();

        assert!(stats.written >= 2, "only {} snapshots written", stats.written);
        assert_eq!(stats.failed, 0);

        let contents = String::from_utf8(sink.0.lock().unwrap().clone()).unwrap();
        assert!(contents.ends_with('\n'));
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len() as u64, stats.written);
        for line in lines {
            let snapshot = decode_snapshot(line).unwrap();
            assert_eq!(snapshot.requests, 1);
            assert_eq!(snapshot.status_codes["200"], 1);
        }
    }

    #[test]
    fn test_exporter_final_flush_has_final_totals() {
        let metrics = Arc::new(MetricsAggregator::new());
        let sink = SharedSink::default();

        let exporter =
            SnapshotExporter::spawn(Arc::clone(&metrics), Duration::from_secs(3600), sink.clone(), true)
                .unwrap();
        for _ in 0..5 {
            metrics.add(&ok_result());
        }
        let stats = exporter.stop();

        assert_eq!(stats, ExportStats { written: 1, failed: 0 });
        let contents = String::from_utf8(sink.0.lock().unwrap().clone()).unwrap();
        assert_eq!(decode_snapshot(&contents).unwrap().requests, 5);
    }

    #[test]
    fn test_exporter_without_final_flush() {
        let metrics = Arc::new(MetricsAggregator::new());
        let sink = SharedSink::default();

        let exporter =
            SnapshotExporter::spawn(metrics, Duration::from_secs(3600), sink.clone(), false).unwrap();
        let stats = exporter.stop();

        assert_eq!(stats.written, 0);
        assert!(sink.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_exporter_survives_write_failures() {
        let metrics = Arc::new(MetricsAggregator::new());
        let exporter =
            SnapshotExporter::spawn(metrics, Duration::from_millis(10), BrokenSink, true).unwrap();
        thread::sleep(Duration::from_millis(80));
        let stats = exporter.stop();

        assert_eq!(stats.written, 0);
        assert!(stats.failed >= 2);
    }

    #[test]
    fn test_exporter_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.jsonl");
        let file = std::fs::File::create(&path).unwrap();

        let metrics = Arc::new(MetricsAggregator::new());
        let exporter =
            SnapshotExporter::spawn(metrics, Duration::from_secs(3600), file, true).unwrap();
        exporter.stop();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "{\"status_codes\":{\"200\":0},\"requests\":0,\"success\":0.0}\n");
    }

    #[test]
    fn test_start_file_exporter_without_file() {
        let metrics = Arc::new(MetricsAggregator::new());
        let output = OutputConfig::default();
        assert!(output.metrics_file.is_none());

        let exporter = start_file_exporter(metrics, &output).unwrap();
        assert!(exporter.is_none());
    }

    #[test]
    fn test_start_file_exporter_with_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.jsonl");
        let output = OutputConfig {
            metrics_file: Some(path.clone()),
            ..Default::default()
        };

        let metrics = Arc::new(MetricsAggregator::new());
        metrics.add(&ok_result());
        let exporter = start_file_exporter(Arc::clone(&metrics), &output)
            .unwrap()
            .expect("exporter should start when a file is set");
        let stats = exporter.stop();

        assert_eq!(stats.written, 1);
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(decode_snapshot(contents.trim_end()).unwrap().requests, 1);
    }

    #[test]
    fn test_start_file_exporter_unopenable_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = OutputConfig {
            metrics_file: Some(dir.path().join("missing").join("run.jsonl")),
            ..Default::default()
        };

        let metrics = Arc::new(MetricsAggregator::new());
        let err = start_file_exporter(metrics, &output).unwrap_err();
        assert!(err.to_string().contains("Unable to create metrics file"));
    }

    #[test]
    fn test_exporter_rejects_zero_period() {
        let metrics = Arc::new(MetricsAggregator::new());
        assert!(SnapshotExporter::spawn(metrics, Duration::ZERO, Vec::<u8>::new(), true).is_err());
    }

    #[test]
    fn test_exporter_drop_stops_thread() {
        let metrics = Arc::new(MetricsAggregator::new());
        let exporter =
            SnapshotExporter::spawn(metrics, Duration::from_millis(5), Vec::<u8>::new(), true).unwrap();
        drop(exporter);
    }
}
