//! Fire-and-forget persistence of finished runs.
//!
//! The engine returns a finalized [`SwarmRun`] to its caller; storing it is the
//! caller's business. [`spawn_record`] detaches the write so a slow or failing
//! sink can never change a result that was already handed back.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::Error;
use crate::swarm::SwarmRun;

/// Destination for finished runs (database, analytics, log).
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    async fn record_run(&self, run: &SwarmRun) -> Result<(), Error>;
}

/// Record `run` on a detached task. Failures are logged and dropped.
pub fn spawn_record(sink: Arc<dyn PersistenceSink>, run: SwarmRun) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        match sink.record_run(&run).await {
            Ok(()) => debug!(run_id = %run.id, "Run persisted"),
            Err(e) => warn!(run_id = %run.id, error = %e, "Failed to persist run"),
        }
    })
}

/// A sink that discards everything.
pub struct NoopSink;

#[async_trait]
impl PersistenceSink for NoopSink {
    async fn record_run(&self, _run: &SwarmRun) -> Result<(), Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingSink(AtomicUsize);

    #[async_trait]
    impl PersistenceSink for FailingSink {
        async fn record_run(&self, _run: &SwarmRun) -> Result<(), Error> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(Error::Internal("disk full".into()))
        }
    }

    #[tokio::test]
    async fn sink_failure_does_not_propagate() {
        let sink = Arc::new(FailingSink(AtomicUsize::new(0)));
        let run = SwarmRun::new("task");
        let run_id = run.id.clone();

        let handle = spawn_record(sink.clone(), run);
        handle.await.unwrap();

        assert_eq!(sink.0.load(Ordering::SeqCst), 1);
        assert!(!run_id.is_empty());
    }

    #[tokio::test]
    async fn noop_sink_accepts_runs() {
        assert!(NoopSink.record_run(&SwarmRun::new("t")).await.is_ok());
    }
}
