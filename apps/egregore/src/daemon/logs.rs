//! Read-only access to the daemon log file.

use egregore_core::EgregoreError;
use std::fs::File;
use std::future::Future;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::time::Duration;

/// Default number of lines shown by `logs`.
pub const DEFAULT_TAIL_LINES: usize = 50;

const FOLLOW_POLL: Duration = Duration::from_millis(250);

/// The last `lines` lines of the log. A missing log is empty.
pub fn tail(path: &Path, lines: usize) -> Result<Vec<String>, EgregoreError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(EgregoreError::IoError(format!(
                "Cannot read log '{}': {}",
                path.display(),
                e
            )));
        }
    };
    let text = String::from_utf8_lossy(&bytes);
    let all: Vec<&str> = text.lines().collect();
    let start = all.len().saturating_sub(lines);
    Ok(all[start..].iter().map(|l| (*l).to_string()).collect())
}

/// Print the tail, then keep printing appended output until `stop`
/// resolves. A truncated log is read again from the start.
pub async fn follow<W: Write>(
    path: &Path,
    lines: usize,
    out: &mut W,
    stop: impl Future<Output = ()>,
) -> Result<(), EgregoreError> {
    for line in tail(path, lines)? {
        writeln!(out, "{line}")?;
    }
    out.flush()?;

    let mut offset = file_len(path);
    tokio::pin!(stop);
    loop {
        tokio::select! {
            () = &mut stop => return Ok(()),
            () = tokio::time::sleep(FOLLOW_POLL) => {}
        }

        let len = file_len(path);
        if len < offset {
            offset = 0;
        }
        if len == offset {
            continue;
        }

        let mut file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };
        file.seek(SeekFrom::Start(offset))?;
        let mut chunk = Vec::new();
        file.read_to_end(&mut chunk)?;
        offset += chunk.len() as u64;
        out.write_all(&chunk)?;
        out.flush()?;
    }
}

fn file_len(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}
