use crate::error::Result;
use chrono::{SecondsFormat, Utc};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader as AsyncBufReader};
use tokio::task::JoinHandle;

/// Prefix added to lines read from a child's stderr.
pub(crate) const STDERR_PREFIX: &str = "[stderr] ";

/// Approximate bytes per line, used to seek near the end for unfiltered tails.
const BYTES_PER_LINE_ESTIMATE: u64 = 200;

/// Append-only text log shared by every runtime.
///
/// Each line is `[<ISO-8601 UTC>][<service>] <message>`. Writers take an
/// exclusive advisory lock for the duration of a single append so lines from
/// concurrent runtimes (or concurrent `rtl` processes) never interleave.
#[derive(Debug, Clone)]
pub struct SharedLog {
    path: PathBuf,
}

impl SharedLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line for `service`.
    ///
    /// Multi-line messages are split so every physical line carries the prefix.
    pub fn append(&self, service: &str, message: &str) -> Result<()> {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let mut buf = String::new();
        for line in message.lines() {
            buf.push_str(&format!("[{}][{}] {}\n", timestamp, service, line));
        }
        if buf.is_empty() {
            buf = format!("[{}][{}] \n", timestamp, service);
        }

        // The lock is released when `file` is closed.
        let mut file = self.open_append()?;
        file.lock_exclusive()?;
        file.write_all(buf.as_bytes())?;
        Ok(())
    }

    /// Open the log for appending, creating it and its directory if needed.
    ///
    /// Detached runtimes get this handle as their stdout and stderr.
    pub(crate) fn open_append(&self) -> Result<File> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?)
    }

    /// Last `n` lines of the log, optionally only those for `service`.
    pub async fn tail(&self, service: Option<&str>, n: usize) -> Result<Vec<String>> {
        let path = self.path.clone();
        let service = service.map(str::to_string);
        tokio::task::spawn_blocking(move || read_tail(&path, service.as_deref(), n))
            .await
            .map_err(|e| std::io::Error::other(e.to_string()))?
    }
}

fn read_tail(path: &Path, service: Option<&str>, n: usize) -> Result<Vec<String>> {
    if n == 0 {
        return Ok(Vec::new());
    }

    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    // Filtered tails must scan everything; unfiltered ones can seek near the end.
    let mut skip_partial = false;
    if service.is_none() {
        let len = file.metadata()?.len();
        let estimate = (n as u64 + 1).saturating_mul(BYTES_PER_LINE_ESTIMATE);
        if len > estimate {
            file.seek(SeekFrom::Start(len - estimate))?;
            skip_partial = true;
        }
    }

    let marker = service.map(|s| format!("][{}] ", s));
    let mut lines: Vec<String> = Vec::new();
    for (i, line) in lossy_lines(BufReader::new(file)).enumerate() {
        let line = line?;
        if skip_partial && i == 0 {
            continue;
        }
        if let Some(marker) = &marker {
            if !line.contains(marker.as_str()) {
                continue;
            }
        }
        lines.push(line);
    }

    // Short lines can leave the estimate short; fall back to a full scan.
    if skip_partial && lines.len() < n {
        return read_tail_full(path, n);
    }

    let start = lines.len().saturating_sub(n);
    Ok(lines.split_off(start))
}

fn read_tail_full(path: &Path, n: usize) -> Result<Vec<String>> {
    let file = File::open(path)?;
    let mut lines: Vec<String> =
        lossy_lines(BufReader::new(file)).collect::<std::io::Result<_>>()?;
    let start = lines.len().saturating_sub(n);
    Ok(lines.split_off(start))
}

/// Lines of `reader`, decoded lossily.
///
/// Detached runtimes write raw bytes into the log, so it is not guaranteed
/// to be valid UTF-8.
fn lossy_lines<R: BufRead>(reader: R) -> impl Iterator<Item = std::io::Result<String>> {
    reader
        .split(b'\n')
        .map(|line| line.map(|bytes| String::from_utf8_lossy(trim_line_end(&bytes)).into_owned()))
}

/// Spawn a task that forwards every line of `stream` into the shared log.
///
/// Output is decoded lossily; the pipe is drained until EOF so the child never
/// sees a closed reader.
pub(crate) fn spawn_capture<R>(
    log: Arc<SharedLog>,
    service: String,
    stream: R,
    is_stderr: bool,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = AsyncBufReader::new(stream);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(trim_line_end(&buf));
                    let message = if is_stderr {
                        tracing::warn!(service = %service, "{}", line);
                        format!("{}{}", STDERR_PREFIX, line)
                    } else {
                        tracing::info!(service = %service, "{}", line);
                        line.into_owned()
                    };
                    if let Err(e) = log.append(&service, &message) {
                        tracing::error!("Failed to write log line for '{}': {}", service, e);
                    }
                }
                Err(e) => {
                    tracing::debug!("Output stream for '{}' closed: {}", service, e);
                    break;
                }
            }
        }
    })
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
