//! Recognition of `# mount entry` records in decoded Darshan output.
//!
//! darshan-parser prints one header line per mount point observed during the
//! profiled run:
//!
//! ```text
//! # mount entry: 8157206977945068522   /global/cscratch1   lustre
//! ```

use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// First `:`-delimited field of a mount record
pub const MOUNT_ENTRY_MARKER: &str = "# mount entry";

/// Check whether `line` is a mount record whose path starts with `target_prefix`.
///
/// Lines without the marker, and marked lines missing the path token, never match.
pub fn is_target_mount(line: &str, target_prefix: &str) -> bool {
    let mut fields = line.split(':');
    if fields.next() != Some(MOUNT_ENTRY_MARKER) {
        return false;
    }

    fields
        .next()
        .and_then(|record| record.split_whitespace().nth(1))
        .is_some_and(|mount_path| mount_path.starts_with(target_prefix))
}

/// Count matching mount records while reading `reader` line by line.
///
/// Invalid UTF-8 is replaced rather than treated as an error.
pub async fn count_matches<R>(mut reader: R, target_prefix: &str) -> io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let mut count = 0;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }

        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(|c| c == '\n' || c == '\r');
        if is_target_mount(line, target_prefix) {
            count += 1;
        }
    }

    Ok(count)
}
