use async_trait::async_trait;
use edge_filter_common::config::DetectorConfig;
use edge_filter_common::scene::Scene;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, trace, warn};

use super::parse::parse_detection_line;

/// Object detection on a single image.
#[async_trait]
pub trait Detector: Send + Sync {
    async fn detect(&self, image: &Path) -> Result<Scene, DetectionError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error("failed to spawn detector: {0}")]
    Spawn(String),
    #[error("failed to read detector {0}: {1}")]
    Io(&'static str, String),
    #[error("detector output reader failed: {0}")]
    Join(String),
    #[error("failed to wait for detector: {0}")]
    Wait(String),
    #[error("detector exited with non-zero status: {0}")]
    Exited(String),
}

/// Runs the Darknet CLI once per image:
/// `<executable> detect <config_path> <weights_path> <image>` from inside the
/// Darknet installation directory.
///
/// Darknet writes progress to stderr and detections to stdout. Both pipes are
/// drained by their own task while the process runs; reading one to EOF
/// before touching the other stalls darknet as soon as the unread pipe fills.
#[derive(Debug, Clone)]
pub struct DarknetProcess {
    darknet_dir: PathBuf,
    executable: String,
    config_path: String,
    weights_path: String,
}

impl DarknetProcess {
    /// A relative `darknet_dir` is taken against the agent's working
    /// directory, once, here. The child runs inside that directory, so every
    /// path derived from it must already be absolute.
    pub fn new(config: &DetectorConfig) -> Self {
        let darknet_dir = std::path::absolute(&config.darknet_dir)
            .unwrap_or_else(|_| config.darknet_dir.clone());
        Self {
            darknet_dir,
            executable: config.executable.clone(),
            config_path: config.config_path.clone(),
            weights_path: config.weights_path.clone(),
        }
    }

    /// Relative executables such as `./darknet` live in the install dir.
    fn program(&self) -> PathBuf {
        let exe = Path::new(&self.executable);
        if exe.is_relative() && exe.components().count() > 1 {
            self.darknet_dir.join(exe)
        } else {
            exe.to_path_buf()
        }
    }
}

#[async_trait]
impl Detector for DarknetProcess {
    async fn detect(&self, image: &Path) -> Result<Scene, DetectionError> {
        let mut cmd = Command::new(self.program());
        cmd.arg("detect")
            .arg(&self.config_path)
            .arg(&self.weights_path)
            .arg(image)
            .current_dir(&self.darknet_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| DetectionError::Spawn(e.to_string()))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DetectionError::Spawn("could not get stdout handle".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| DetectionError::Spawn("could not get stderr handle".into()))?;

        debug!(image = %image.display(), "detector started");

        let stdout_task = tokio::spawn(collect_records(stdout, "stdout"));
        let stderr_task = tokio::spawn(collect_records(stderr, "stderr"));
        let (stdout_records, stderr_records) = tokio::join!(stdout_task, stderr_task);

        let mut scene = stdout_records.map_err(|e| DetectionError::Join(e.to_string()))??;
        let stray = stderr_records.map_err(|e| DetectionError::Join(e.to_string()))??;
        if !stray.is_empty() {
            debug!(count = stray.len(), "detection records found on stderr");
        }
        scene.extend(stray);

        let status = child
            .wait()
            .await
            .map_err(|e| DetectionError::Wait(e.to_string()))?;

        if !status.success() {
            warn!(image = %image.display(), %status, "detector exited with error");
            return Err(DetectionError::Exited(status.to_string()));
        }

        debug!(
            image = %image.display(),
            objects = scene.len(),
            "detection complete"
        );
        Ok(scene)
    }
}

/// Read `stream` to EOF, keeping the lines that parse as detection records.
async fn collect_records<R>(stream: R, name: &'static str) -> Result<Scene, DetectionError>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    let mut records = Scene::new();

    loop {
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .await
            .map_err(|e| DetectionError::Io(name, e.to_string()))?;
        if n == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        match parse_detection_line(&line) {
            Some(obj) => {
                debug!(stream = name, object = %obj, "detected object");
                records.push(obj);
            }
            None => trace!(stream = name, line = line.trim_end(), "detector output"),
        }
    }

    Ok(records)
}
