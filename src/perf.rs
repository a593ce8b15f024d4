use serde_json::json;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// JSON-lines span log for render operations. Cloning shares the same sink.
#[derive(Clone)]
pub struct PerfLogger {
    inner: Arc<Mutex<PerfState>>,
}

struct PerfState {
    writer: BufWriter<File>,
    span_totals: BTreeMap<String, (u64, f64)>,
}

impl PerfLogger {
    pub fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(PerfState {
                writer: BufWriter::new(file),
                span_totals: BTreeMap::new(),
            })),
        })
    }

    pub fn log_span_ms(&self, name: &str, page_id: Option<&str>, ms: f64) {
        let line = json!({
            "type": "perf.span",
            "name": name,
            "page_id": page_id,
            "unit": "ms",
            "ms": (ms * 1000.0).round() / 1000.0,
        });
        if let Ok(mut state) = self.inner.lock() {
            let entry = state.span_totals.entry(name.to_string()).or_insert((0, 0.0));
            entry.0 = entry.0.saturating_add(1);
            entry.1 += ms;
            let _ = writeln!(state.writer, "{line}");
        }
    }

    pub fn flush(&self) {
        if let Ok(mut state) = self.inner.lock() {
            let _ = state.writer.flush();
        }
    }
}

impl Drop for PerfState {
    fn drop(&mut self) {
        for (name, (count, total_ms)) in &self.span_totals {
            let avg = if *count == 0 {
                0.0
            } else {
                total_ms / *count as f64
            };
            let line = json!({
                "type": "perf.summary",
                "name": name,
                "count": count,
                "total_ms": (total_ms * 1000.0).round() / 1000.0,
                "avg_ms": (avg * 1000.0).round() / 1000.0,
            });
            let _ = writeln!(self.writer, "{line}");
        }
        let _ = self.writer.flush();
    }
}

/// Runs `f`, recording its wall time under `name` when a logger is attached.
pub(crate) fn timed<T>(
    perf: Option<&PerfLogger>,
    name: &str,
    page_id: Option<&str>,
    f: impl FnOnce() -> T,
) -> T {
    let Some(perf) = perf else {
        return f();
    };
    let started = Instant::now();
    let out = f();
    perf.log_span_ms(name, page_id, started.elapsed().as_secs_f64() * 1000.0);
    out
}
