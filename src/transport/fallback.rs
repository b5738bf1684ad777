//! File-backed fallback channel.
//!
//! While no live connection exists, every outbound command is written as
//! its own file into a staging directory. File names sort lexically in
//! creation order and embed the process id plus a sequence counter, so
//! several bridge instances can share one directory without collisions.
//! A downstream consumer (or [`FallbackQueue::drain`]) replays them in order.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{TransportError, TransportResult};

const FILE_PREFIX: &str = "cmd_";
const FILE_EXT: &str = "scm";

/// Process-wide counter; breaks ties between commands queued in the same nanosecond.
static SEQ: AtomicU64 = AtomicU64::new(0);

/// Last timestamp handed out by [`next_stamp`].
static LAST_STAMP: AtomicU64 = AtomicU64::new(0);

/// Strictly increasing nanosecond stamp for this process.
///
/// Returns `now` unless the wall clock has stepped back (or stalled) since
/// the previous call, in which case it returns the previous stamp plus one.
fn next_stamp(now: u64) -> u64 {
    let mut issued = now;
    let _ = LAST_STAMP.fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
        issued = now.max(last.saturating_add(1));
        Some(issued)
    });
    issued
}

/// Append-only queue of commands, one file per command.
#[derive(Debug)]
pub struct FallbackQueue {
    dir: PathBuf,
}

impl FallbackQueue {
    /// Queue rooted at `dir`. The directory is created on first enqueue.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Durably write `command` as a new file and return its path.
    pub fn enqueue(&self, command: &str) -> TransportResult<PathBuf> {
        std::fs::create_dir_all(&self.dir).map_err(|source| TransportError::Fallback {
            path: self.dir.display().to_string(),
            source,
        })?;

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let nanos = next_stamp(u64::try_from(now).unwrap_or(u64::MAX));
        let seq = SEQ.fetch_add(1, Ordering::Relaxed);
        let name = format!(
            "{FILE_PREFIX}{nanos:020}_{pid}_{seq:06}.{FILE_EXT}",
            pid = std::process::id()
        );
        let path = self.dir.join(&name);

        // Write to a hidden temp name first so consumers never see a partial file.
        let tmp = self.dir.join(format!(".{name}.tmp"));
        std::fs::write(&tmp, command)
            .and_then(|()| std::fs::rename(&tmp, &path))
            .map_err(|source| TransportError::Fallback {
                path: path.display().to_string(),
                source,
            })?;

        tracing::debug!(path = %path.display(), "queued command to fallback channel");
        Ok(path)
    }

    /// Queued command files in creation order.
    pub fn pending(&self) -> TransportResult<Vec<PathBuf>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(TransportError::Fallback {
                    path: self.dir.display().to_string(),
                    source,
                });
            }
        };

        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| is_queue_file(p))
            .collect();
        files.sort();
        Ok(files)
    }

    pub fn len(&self) -> usize {
        self.pending().map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read one queued command back.
    pub fn read(&self, path: &Path) -> TransportResult<String> {
        std::fs::read_to_string(path).map_err(|source| TransportError::Fallback {
            path: path.display().to_string(),
            source,
        })
    }

    /// Hand queued commands to `consume` in creation order.
    ///
    /// A file is removed once `consume` accepts it; draining stops at the
    /// first rejection so the remaining order is preserved. Returns the
    /// number of commands consumed.
    pub fn drain(&self, mut consume: impl FnMut(&str) -> bool) -> TransportResult<usize> {
        let mut consumed = 0;
        for path in self.pending()? {
            let command = self.read(&path)?;
            if !consume(&command) {
                break;
            }
            std::fs::remove_file(&path).map_err(|source| TransportError::Fallback {
                path: path.display().to_string(),
                source,
            })?;
            consumed += 1;
        }
        Ok(consumed)
    }
}

fn is_queue_file(path: &Path) -> bool {
    let name_ok = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(FILE_PREFIX));
    let ext_ok = path.extension().and_then(|e| e.to_str()) == Some(FILE_EXT);
    name_ok && ext_ok
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamps_keep_increasing_when_clock_steps_back() {
        let first = next_stamp(1_000);
        let second = next_stamp(500);
        let third = next_stamp(0);
        assert!(second > first);
        assert!(third > second);

        let ahead = third + (1 << 30);
        assert_eq!(next_stamp(ahead), ahead);
    }

    #[test]
    fn enqueue_creates_dir_and_preserves_order() {
        let dir = tempfile::TempDir::new().unwrap();
        let queue = FallbackQueue::new(dir.path().join("staging"));
        assert!(queue.is_empty());

        for i in 0..5 {
            queue.enqueue(&format!("(ConceptNode \"c{i}\")")).unwrap();
        }
        let pending = queue.pending().unwrap();
        assert_eq!(pending.len(), 5);
        let contents: Vec<String> = pending.iter().map(|p| queue.read(p).unwrap()).collect();
        assert_eq!(contents[0], "(ConceptNode \"c0\")");
        assert_eq!(contents[4], "(ConceptNode \"c4\")");
    }

    #[test]
    fn foreign_files_are_ignored() {
        let dir = tempfile::TempDir::new().unwrap();
        let queue = FallbackQueue::new(dir.path());
        std::fs::write(dir.path().join("status.json"), "{}").unwrap();
        std::fs::write(dir.path().join("cmd_notes.txt"), "x").unwrap();
        queue.enqueue("(ping)").unwrap();
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn drain_stops_at_first_rejection() {
        let dir = tempfile::TempDir::new().unwrap();
        let queue = FallbackQueue::new(dir.path());
        queue.enqueue("a").unwrap();
        queue.enqueue("b").unwrap();
        queue.enqueue("c").unwrap();

        let mut seen = Vec::new();
        let consumed = queue
            .drain(|cmd| {
                if cmd == "c" {
                    return false;
                }
                seen.push(cmd.to_string());
                true
            })
            .unwrap();
        assert_eq!(consumed, 2);
        assert_eq!(seen, vec!["a", "b"]);
        assert_eq!(queue.len(), 1);

        assert_eq!(queue.drain(|_| true).unwrap(), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn two_queues_share_a_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let q1 = FallbackQueue::new(dir.path());
        let q2 = FallbackQueue::new(dir.path());
        let a = q1.enqueue("one").unwrap();
        let b = q2.enqueue("two").unwrap();
        assert_ne!(a, b);
        assert_eq!(q1.len(), 2);
    }

    #[test]
    fn missing_directory_has_nothing_pending() {
        let dir = tempfile::TempDir::new().unwrap();
        let queue = FallbackQueue::new(dir.path().join("never-created"));
        assert!(queue.pending().unwrap().is_empty());
    }
}
