//! Append-only JSONL log of finished runs.

use async_trait::async_trait;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use swarmforge_config::AppConfig;
use swarmforge_core::error::Error;
use swarmforge_core::sink::{PersistenceSink, spawn_record};
use swarmforge_core::swarm::SwarmRun;
use tracing::{debug, warn};

pub struct RunLogSink {
    path: PathBuf,
}

impl RunLogSink {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// `~/.swarmforge/runs.jsonl`
    pub fn default_path() -> PathBuf {
        AppConfig::config_dir().join("runs.jsonl")
    }
}

#[async_trait]
impl PersistenceSink for RunLogSink {
    async fn record_run(&self, run: &SwarmRun) -> Result<(), Error> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Internal(format!("Failed to create run log directory: {e}")))?;
        }

        let mut line = serde_json::to_string(run)?;
        line.push('\n');

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| Error::Internal(format!("Failed to open run log: {e}")))?;
        file.write_all(line.as_bytes())
            .map_err(|e| Error::Internal(format!("Failed to write run log: {e}")))?;
        debug!(run_id = %run.id, path = %self.path.display(), "Run appended to log");
        Ok(())
    }
}

/// Record `run` and wait for the write task. Returns `false` if the task
/// itself died; sink errors are already logged inside it.
pub async fn persist(sink: Arc<dyn PersistenceSink>, run: SwarmRun) -> bool {
    match spawn_record(sink, run).await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Run log task failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct PanickingSink;

    #[async_trait]
    impl PersistenceSink for PanickingSink {
        async fn record_run(&self, _run: &SwarmRun) -> Result<(), Error> {
            panic!("sink blew up");
        }
    }

    #[tokio::test]
    async fn appends_one_line_per_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("runs.jsonl");
        let sink = Arc::new(RunLogSink::new(path.clone()));

        spawn_record(sink.clone(), SwarmRun::new("first")).await.unwrap();
        spawn_record(sink, SwarmRun::new("second")).await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let tasks: Vec<String> = raw
            .lines()
            .map(|l| serde_json::from_str::<SwarmRun>(l).unwrap().task)
            .collect();
        assert_eq!(tasks, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn unwritable_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be
        let sink = RunLogSink::new(dir.path().to_path_buf());
        assert!(sink.record_run(&SwarmRun::new("t")).await.is_err());
    }

    #[tokio::test]
    async fn persist_survives_a_dead_write_task() {
        assert!(!persist(Arc::new(PanickingSink), SwarmRun::new("t")).await);

        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(RunLogSink::new(dir.path().join("runs.jsonl")));
        assert!(persist(sink, SwarmRun::new("t")).await);
    }
}
