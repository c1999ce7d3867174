use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use engine_logging::engine_debug;
use shorts_core::PublishMetadata;

use crate::command::{check_exit, run_with_deadline};
use crate::{deterministic_filename, AtomicFileWriter, CollabError, PublishedRef, Publisher};

/// Exit code an uploader uses to say its credentials need attention.
pub const AUTH_REQUIRED_EXIT: i32 = 2;

/// Hands uploads to an external program.
///
/// Runs `program [args..] <artifact> <metadata.json>` and reads
/// `{"id": "...", "url": "..."}` from its stdout. An upload still running
/// after `timeout` is killed.
#[derive(Debug, Clone)]
pub struct CommandPublisher {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
    metadata: AtomicFileWriter,
}

impl CommandPublisher {
    pub fn new(program: impl Into<PathBuf>, work_dir: PathBuf) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: Duration::from_secs(5 * 60),
            metadata: AtomicFileWriter::new(work_dir),
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Publisher for CommandPublisher {
    fn publish(
        &self,
        artifact: &Path,
        metadata: &PublishMetadata,
    ) -> Result<PublishedRef, CollabError> {
        let key = artifact.to_string_lossy();
        let metadata_path = self
            .metadata
            .write_json(
                &deterministic_filename(Some(&metadata.title), &key, "meta.json"),
                metadata,
            )
            .map_err(|err| CollabError::Rejected(err.to_string()))?;

        engine_debug!("publishing {:?} via {:?}", artifact, self.program);
        let mut command = Command::new(&self.program);
        command.args(&self.args).arg(artifact).arg(&metadata_path);
        let output = run_with_deadline(&self.program, &mut command, self.timeout)?;

        if output.status.code() == Some(AUTH_REQUIRED_EXIT) {
            return Err(CollabError::AuthRequired(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        check_exit(&self.program, &output)?;

        serde_json::from_slice::<PublishedRef>(&output.stdout).map_err(|err| {
            CollabError::Rejected(format!("unreadable publisher response: {err}"))
        })
    }
}
