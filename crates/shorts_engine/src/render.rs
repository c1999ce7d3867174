use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use engine_logging::engine_debug;
use serde::Serialize;
use shorts_core::Script;

use crate::command::{check_exit, run_with_deadline};
use crate::{
    deterministic_filename, ensure_output_dir, AtomicFileWriter, CollabError, Renderer,
    StyleOptions,
};

#[derive(Debug, Serialize)]
struct RenderRequest<'a> {
    script: &'a str,
    sections: &'a [String],
    style: &'a StyleOptions,
    output_file: &'a Path,
}

/// Hands rendering to an external program.
///
/// Writes a JSON render request to `work_dir`, runs
/// `program [args..] <request.json>` and expects the video at the
/// `output_file` named in the request. A renderer still running after
/// `timeout` is killed.
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
    requests: AtomicFileWriter,
    output_dir: PathBuf,
}

impl CommandRenderer {
    pub fn new(program: impl Into<PathBuf>, work_dir: PathBuf, output_dir: PathBuf) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: Duration::from_secs(10 * 60),
            requests: AtomicFileWriter::new(work_dir),
            output_dir,
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

impl Renderer for CommandRenderer {
    fn render(&self, script: &Script, style: &StyleOptions) -> Result<PathBuf, CollabError> {
        ensure_output_dir(&self.output_dir)
            .map_err(|err| CollabError::Rejected(err.to_string()))?;

        let title = script.sections().first().map(String::as_str);
        let key = format!("{}|{}", style.theme, script.text());
        let output_file = self
            .output_dir
            .join(deterministic_filename(title, &key, "mp4"));
        let request = RenderRequest {
            script: script.text(),
            sections: script.sections(),
            style,
            output_file: &output_file,
        };
        let request_path = self
            .requests
            .write_json(&deterministic_filename(title, &key, "json"), &request)
            .map_err(|err| CollabError::Rejected(err.to_string()))?;

        engine_debug!("rendering {:?} via {:?}", request_path, self.program);
        let mut command = Command::new(&self.program);
        command.args(&self.args).arg(&request_path);
        let output = run_with_deadline(&self.program, &mut command, self.timeout)?;
        check_exit(&self.program, &output)?;

        if !output_file.is_file() {
            return Err(CollabError::Rejected(format!(
                "renderer finished without producing {}",
                output_file.display()
            )));
        }
        Ok(output_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shorts_core::{ContentRecord, ScriptComposer};

    #[test]
    fn missing_program_is_a_permanent_rejection() {
        let temp = tempfile::TempDir::new().unwrap();
        let renderer = CommandRenderer::new(
            temp.path().join("no-such-renderer"),
            temp.path().join("requests"),
            temp.path().join("videos"),
        );
        let record = ContentRecord::new("Title here", "Body", "https://a.org").unwrap();
        let script = ScriptComposer::default().compose(&record);

        let err = renderer.render(&script, &StyleOptions::default()).unwrap_err();
        assert!(matches!(err, CollabError::Rejected(_)), "{err:?}");
        let requests: Vec<_> = std::fs::read_dir(temp.path().join("requests"))
            .unwrap()
            .collect();
        assert_eq!(requests.len(), 1);
    }
}
