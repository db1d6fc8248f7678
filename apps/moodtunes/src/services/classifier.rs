//! External emotion classifier.
//!
//! Runs a configured program against an audio file and maps the label it
//! prints to one of the catalog's emotion tags.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;

use crate::config::ClassifierConfig;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("failed to run classifier: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("classifier exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("classifier timed out after {0:?}")]
    Timeout(Duration),
}

pub struct EmotionClassifier {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    fallback: String,
}

impl EmotionClassifier {
    pub fn new(program: String, args: Vec<String>, timeout: Duration, fallback: String) -> Self {
        Self {
            program,
            args,
            timeout,
            fallback,
        }
    }

    /// Builds a classifier from configuration; `None` when no command is set.
    pub fn from_config(config: &ClassifierConfig) -> Option<Self> {
        let program = config.command.as_deref()?.trim();
        if program.is_empty() {
            return None;
        }
        Some(Self::new(
            program.to_string(),
            config.args.clone(),
            Duration::from_secs(config.timeout_secs),
            config.fallback_emotion.clone(),
        ))
    }

    /// Classifies `audio_path`, returning an emotion tag.
    pub async fn classify(&self, audio_path: &Path) -> Result<String, ClassifierError> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(audio_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ClassifierError::Timeout(self.timeout))??;

        if !output.status.success() {
            return Err(ClassifierError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let label = String::from_utf8_lossy(&output.stdout).trim().to_lowercase();
        let emotion = self.map_label(&label);
        tracing::debug!(path = %audio_path.display(), label = %label, emotion = %emotion, "Classified audio");
        Ok(emotion)
    }

    /// Maps a classifier label to an emotion tag.
    pub fn map_label(&self, label: &str) -> String {
        match label {
            "happy" => "Joy",
            "sad" => "Sad",
            "angry" => "Anger",
            "relaxed" => "Romantic",
            "energetic" => "Excitement",
            _ => self.fallback.as_str(),
        }
        .to_string()
    }
}
