use std::io;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::{Config, ExternalCommand};
use crate::job::{DecoderKind, Job};
use crate::matcher::count_matches;

/// Bytes of decoder stderr kept for error messages
const STDERR_LIMIT: u64 = 64 * 1024;
/// How long a failed decoder's stderr may stay open after it exits
const STDERR_GRACE: Duration = Duration::from_millis(100);

/// Why a single trace could not be scanned
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} failed with {status}: {stderr}")]
    Exit {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("failed to read output of {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} timed out after {timeout:?}")]
    TimedOut { program: String, timeout: Duration },

    #[error("scan cancelled")]
    Cancelled,
}

/// Runs the external decoders and counts matching mounts in their output
#[derive(Debug, Clone)]
pub struct TraceDecoder {
    target_mount_prefix: String,
    job_timeout: Option<Duration>,
    decompressor: ExternalCommand,
    parser: ExternalCommand,
}

impl TraceDecoder {
    pub fn new(config: &Config) -> Self {
        Self {
            target_mount_prefix: config.target_mount_prefix.clone(),
            job_timeout: config.job_timeout,
            decompressor: config.decompressor.clone(),
            parser: config.parser.clone(),
        }
    }

    pub fn command_for(&self, kind: DecoderKind) -> &ExternalCommand {
        match kind {
            DecoderKind::Decompress => &self.decompressor,
            DecoderKind::DarshanParser => &self.parser,
        }
    }

    /// Decode one trace and count its mount entries under the target prefix.
    ///
    /// The decoder output is streamed, never buffered whole. The child process
    /// has exited and been reaped by the time this returns, including when the
    /// job times out or `cancel` fires.
    pub async fn scan(&self, job: &Job, cancel: &CancellationToken) -> Result<usize, ScanError> {
        if cancel.is_cancelled() {
            return Err(ScanError::Cancelled);
        }

        let external = self.command_for(job.decoder);
        let program = external.program.clone();
        let mut cmd = self.build_command(external, &job.path);
        debug!("Executing decoder command: {:?}", cmd);

        let mut child = cmd.spawn().map_err(|source| ScanError::Launch {
            program: program.clone(),
            source,
        })?;
        let stderr = child.stderr.take().map(StderrDrain::spawn);

        let finished = match child.stdout.take() {
            Some(stdout) => {
                let target = self.target_mount_prefix.as_str();
                let child = &mut child;
                let scan = async move {
                    let count = count_matches(BufReader::new(stdout), target).await?;
                    let status = child.wait().await?;
                    Ok::<_, io::Error>((count, status))
                };

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(ScanError::Cancelled),
                    timeout = expire(self.job_timeout) => Err(ScanError::TimedOut {
                        program: program.clone(),
                        timeout,
                    }),
                    result = scan => result.map_err(|source| ScanError::Io {
                        program: program.clone(),
                        source,
                    }),
                }
            }
            None => Err(ScanError::Io {
                program: program.clone(),
                source: io::Error::new(io::ErrorKind::BrokenPipe, "stdout was not captured"),
            }),
        };

        let (count, status) = match finished {
            Ok(done) => done,
            Err(e) => {
                warn!("Stopping {} for {:?}: {}", program, job.path, e);
                reap(&mut child, stderr).await;
                return Err(e);
            }
        };

        if !status.success() {
            let stderr = match stderr {
                Some(drain) => drain.collect(cancel).await,
                None => String::new(),
            };
            return Err(ScanError::Exit {
                program,
                status,
                stderr,
            });
        }

        if let Some(drain) = stderr {
            drain.stop();
        }
        debug!("{:?}: {} matching mounts", job.path, count);
        Ok(count)
    }

    fn build_command(&self, external: &ExternalCommand, path: &Path) -> Command {
        let mut cmd = Command::new(&external.program);
        cmd.args(&external.args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

/// Background reader that keeps a decoder from blocking on a full stderr pipe.
///
/// Only the first [`STDERR_LIMIT`] bytes are kept; the rest is discarded.
struct StderrDrain {
    captured: Arc<Mutex<Vec<u8>>>,
    task: JoinHandle<()>,
}

impl StderrDrain {
    fn spawn(stderr: ChildStderr) -> Self {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&captured);

        let task = tokio::spawn(async move {
            let mut limited = stderr.take(STDERR_LIMIT);
            let mut chunk = [0u8; 4096];
            loop {
                match limited.read(&mut chunk).await {
                    Ok(0) => break,
                    Ok(n) => {
                        let mut captured = sink.lock().unwrap_or_else(|e| e.into_inner());
                        captured.extend_from_slice(&chunk[..n]);
                    }
                    Err(e) => {
                        debug!("Failed to read decoder stderr: {}", e);
                        return;
                    }
                }
            }

            let mut rest = limited.into_inner();
            if let Err(e) = tokio::io::copy(&mut rest, &mut tokio::io::sink()).await {
                debug!("Failed to discard decoder stderr: {}", e);
            }
        });

        Self { captured, task }
    }

    /// Wait briefly for the pipe to close, then return what was captured.
    ///
    /// A background process of the decoder may hold stderr open indefinitely,
    /// so the wait is bounded by [`STDERR_GRACE`] and by `cancel`.
    async fn collect(mut self, cancel: &CancellationToken) -> String {
        tokio::select! {
            _ = &mut self.task => {}
            _ = tokio::time::sleep(STDERR_GRACE) => {
                debug!("Decoder stderr still open after exit, giving up on it");
            }
            _ = cancel.cancelled() => {}
        }
        self.task.abort();

        let captured = self.captured.lock().unwrap_or_else(|e| e.into_inner());
        String::from_utf8_lossy(&captured).trim().to_string()
    }

    fn stop(self) {
        self.task.abort();
    }
}

/// Resolves once `timeout` has elapsed; never resolves without one
async fn expire(timeout: Option<Duration>) -> Duration {
    match timeout {
        Some(timeout) => {
            tokio::time::sleep(timeout).await;
            timeout
        }
        None => std::future::pending().await,
    }
}

async fn reap(child: &mut Child, stderr: Option<StderrDrain>) {
    if let Err(e) = child.kill().await {
        debug!("Decoder already gone: {}", e);
    }
    if let Some(drain) = stderr {
        drain.stop();
    }
}
