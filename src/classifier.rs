//! Runs the external phishing classifier as a child process.
//!
//! The classifier is invoked as `<program> [script] <url>` with its own
//! directory as working directory, and must print one JSON object on stdout
//! before exiting with status 0.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::{debug, error, warn};

use crate::config::Config;
use crate::error::{AppError, Result};

/// Upper bound on captured stdout.
pub const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// Verdict emitted by the classifier, normalized from whichever field
/// spellings it used.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierOutput {
    pub verdict: String,
    pub probability: f64,
    pub note: Option<Value>,
    pub features: Map<String, Value>,
}

/// Classifier stdout as written. `result`/`proba` take precedence over
/// `status`/`probability_phishing` when both are present.
#[derive(Debug, Deserialize)]
struct RawOutput {
    result: Option<String>,
    status: Option<String>,
    proba: Option<f64>,
    probability_phishing: Option<f64>,
    #[serde(default)]
    note: Option<Value>,
    #[serde(default)]
    features: Option<Map<String, Value>>,
}

impl TryFrom<RawOutput> for ClassifierOutput {
    type Error = AppError;

    fn try_from(raw: RawOutput) -> Result<Self> {
        let verdict = raw
            .result
            .or(raw.status)
            .ok_or_else(|| AppError::InvalidOutput("missing verdict (`result` or `status`)".to_string()))?;
        let probability = raw.proba.or(raw.probability_phishing).ok_or_else(|| {
            AppError::InvalidOutput("missing probability (`proba` or `probability_phishing`)".to_string())
        })?;

        Ok(ClassifierOutput {
            verdict,
            probability,
            note: raw.note,
            features: raw.features.unwrap_or_default(),
        })
    }
}

#[derive(Debug)]
pub struct Classifier {
    program: String,
    script: Option<PathBuf>,
    working_dir: PathBuf,
    timeout: Duration,
    permits: Arc<Semaphore>,
}

impl Classifier {
    pub fn new(
        program: impl Into<String>,
        script: Option<PathBuf>,
        timeout: Duration,
        max_concurrency: usize,
    ) -> Self {
        let working_dir = script
            .as_deref()
            .and_then(Path::parent)
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        Self {
            program: program.into(),
            script,
            working_dir,
            timeout,
            permits: Arc::new(Semaphore::new(max_concurrency.max(1))),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.classifier_program.clone(),
            config.classifier_script.clone(),
            config.classifier_timeout,
            config.classifier_max_concurrency,
        )
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Classifies `url`, waiting for a free slot if too many classifier
    /// processes are already running.
    pub async fn classify(&self, url: &str) -> Result<ClassifierOutput> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| AppError::SubprocessError(format!("classifier pool closed: {}", e)))?;

        let start = Instant::now();
        let stdout = match tokio::time::timeout(self.timeout, self.run(url)).await {
            Ok(result) => result?,
            Err(_) => {
                error!(url, timeout = ?self.timeout, "classifier timed out");
                return Err(AppError::Timeout(self.timeout));
            }
        };
        debug!(url, elapsed = ?start.elapsed(), "classifier finished");

        parse_output(&stdout).inspect_err(|e| {
            error!(error = %e, stdout = %stdout, "classifier produced unusable output");
        })
    }

    async fn run(&self, url: &str) -> Result<String> {
        let mut command = Command::new(&self.program);
        if let Some(script) = &self.script {
            // The child runs inside `working_dir`, so pass the script by file name.
            let script_arg = script.file_name().map(Path::new).unwrap_or(script.as_path());
            command.arg(script_arg);
        }
        command
            .arg(url)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|e| {
            error!(program = %self.program, error = %e, "failed to spawn classifier");
            AppError::SubprocessError(format!("spawn failed: {}", e))
        })?;

        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();
        let (stdout, stderr) = tokio::join!(
            read_capped(stdout_pipe, MAX_OUTPUT_BYTES),
            read_capped(stderr_pipe, MAX_OUTPUT_BYTES),
        );

        let status = child.wait().await.map_err(|e| {
            error!(error = %e, "failed to wait for classifier");
            AppError::SubprocessError(format!("wait failed: {}", e))
        })?;

        let stdout = stdout?;
        let stderr = String::from_utf8_lossy(&stderr?).into_owned();

        if !status.success() {
            error!(url, exit_code = ?status.code(), stderr = %stderr.trim(), "classifier exited with failure");
            return Err(AppError::SubprocessError(format!("exit status {}", status)));
        }
        if !stderr.trim().is_empty() {
            warn!(url, stderr = %stderr.trim(), "classifier wrote to stderr");
        }

        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }
}

async fn read_capped<R>(pipe: Option<R>, limit: usize) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let Some(pipe) = pipe else {
        return Ok(Vec::new());
    };
    let mut buf = Vec::new();
    pipe.take(limit as u64 + 1)
        .read_to_end(&mut buf)
        .await
        .map_err(|e| AppError::SubprocessError(format!("failed to read classifier output: {}", e)))?;
    if buf.len() > limit {
        error!(limit, "classifier output exceeded capture limit");
        return Err(AppError::SubprocessError(format!("output exceeded {} bytes", limit)));
    }
    Ok(buf)
}

/// Parses classifier stdout into a [`ClassifierOutput`].
pub fn parse_output(stdout: &str) -> Result<ClassifierOutput> {
    let value: Value = serde_json::from_str(stdout.trim())
        .map_err(|e| AppError::InvalidOutput(format!("not JSON: {}", e)))?;
    if !value.is_object() {
        return Err(AppError::InvalidOutput("not a JSON object".to_string()));
    }
    let raw: RawOutput = serde_json::from_value(value).map_err(|e| AppError::InvalidOutput(e.to_string()))?;
    ClassifierOutput::try_from(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_result_proba_schema() {
        let out = parse_output(r#"{"result":"phishing","proba":0.9}"#).unwrap();
        assert_eq!(out.verdict, "phishing");
        assert_eq!(out.probability, 0.9);
        assert!(out.note.is_none());
        assert!(out.features.is_empty());
    }

    #[test]
    fn parses_status_probability_schema() {
        let out = parse_output(
            r#"{"status":"aman","probability_phishing":0.0,"note":"popular domain","features":{"num_dots":2}}"#,
        )
        .unwrap();
        assert_eq!(out.verdict, "aman");
        assert_eq!(out.probability, 0.0);
        assert_eq!(out.note, Some(json!("popular domain")));
        assert_eq!(out.features.get("num_dots"), Some(&json!(2)));
    }

    #[test]
    fn trailing_newline_is_fine() {
        assert!(parse_output("{\"result\":\"aman\",\"proba\":0.1}\n").is_ok());
    }

    #[test]
    fn rejects_non_json() {
        assert!(matches!(parse_output("not-json"), Err(AppError::InvalidOutput(_))));
    }

    #[test]
    fn rejects_non_object() {
        assert!(matches!(parse_output("[1,2]"), Err(AppError::InvalidOutput(_))));
        assert!(matches!(parse_output("\"phishing\""), Err(AppError::InvalidOutput(_))));
    }

    #[test]
    fn rejects_missing_verdict() {
        assert!(matches!(parse_output(r#"{"proba":0.5}"#), Err(AppError::InvalidOutput(_))));
    }

    #[test]
    fn rejects_missing_probability() {
        assert!(matches!(parse_output(r#"{"result":"phishing"}"#), Err(AppError::InvalidOutput(_))));
    }

    #[test]
    fn null_features_become_empty() {
        let out = parse_output(r#"{"result":"phishing","proba":0.9,"features":null}"#).unwrap();
        assert!(out.features.is_empty());
    }

    #[test]
    fn both_spellings_prefer_result_and_proba() {
        let out = parse_output(
            r#"{"result":"phishing","status":"aman","proba":0.9,"probability_phishing":0.1}"#,
        )
        .unwrap();
        assert_eq!(out.verdict, "phishing");
        assert_eq!(out.probability, 0.9);
    }

    #[test]
    fn working_dir_is_script_parent() {
        let c = Classifier::new("python3", Some(PathBuf::from("python/predict.py")), Duration::from_secs(1), 1);
        assert_eq!(c.working_dir(), Path::new("python"));

        let c = Classifier::new("python3", Some(PathBuf::from("predict.py")), Duration::from_secs(1), 1);
        assert_eq!(c.working_dir(), Path::new("."));

        let c = Classifier::new("/usr/bin/detect", None, Duration::from_secs(1), 1);
        assert_eq!(c.working_dir(), Path::new("."));
    }

    #[tokio::test]
    async fn missing_program_is_subprocess_error() {
        let c = Classifier::new("definitely-not-a-real-classifier-binary", None, Duration::from_secs(5), 1);
        assert!(matches!(c.classify("http://a.test").await, Err(AppError::SubprocessError(_))));
    }
}
