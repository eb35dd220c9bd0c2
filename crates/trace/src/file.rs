//! Loader and writer for the textual trace format.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::TraceError;
use crate::operation::{Operation, kind};

/// Empirical average line length, used to pre-size the operation buffer.
const AVG_LINE_LENGTH: u64 = 80;
/// Initial read-buffer size.
const READ_BUFFER_SIZE: usize = 1 << 20;
/// Lines longer than this are rejected rather than buffered without bound.
const MAX_LINE_LENGTH: usize = 16 << 20;

/// Loads one or more trace files into a single operation sequence.
///
/// `first`/`last` are the block-filter bounds inherited from the recording
/// pipeline; filtering while loading is not supported, so both must be zero.
/// Fails if no paths are given or if no operations were produced.
pub fn load_trace(
    paths: &[PathBuf],
    first: u64,
    last: u64,
) -> Result<Vec<Operation>, TraceError> {
    if paths.is_empty() {
        return Err(TraceError::NoInputFiles);
    }
    if first != 0 || last != 0 {
        return Err(TraceError::BlockFilterUnsupported { first, last });
    }

    let mut total_bytes = 0u64;
    for path in paths {
        let meta = fs::metadata(path)
            .map_err(|e| TraceError::io(format!("stat trace file {}", path.display()), e))?;
        total_bytes += meta.len();
    }
    let mut ops = Vec::with_capacity((total_bytes / AVG_LINE_LENGTH) as usize);

    for path in paths {
        load_file(path, &mut ops)?;
    }
    if ops.is_empty() {
        return Err(TraceError::EmptyTrace);
    }
    debug!(operations = ops.len(), files = paths.len(), "loaded trace");
    Ok(ops)
}

fn load_file(path: &Path, ops: &mut Vec<Operation>) -> Result<(), TraceError> {
    let file = File::open(path)
        .map_err(|e| TraceError::io(format!("open trace file {}", path.display()), e))?;
    let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);

    // Block context does not carry over from one file to the next.
    let mut current_block: Option<u64> = None;
    let mut buf = String::new();
    let mut line_no = 0usize;

    loop {
        buf.clear();
        let read = reader
            .read_line(&mut buf)
            .map_err(|e| TraceError::io(format!("read trace file {}", path.display()), e))?;
        if read == 0 {
            break;
        }
        line_no += 1;
        if buf.len() > MAX_LINE_LENGTH {
            return Err(parse_error(path, line_no, "line exceeds the 16 MiB limit"));
        }
        let line = buf.strip_suffix('\n').unwrap_or(&buf);
        if line.trim().is_empty() {
            continue;
        }

        let mut op = Operation::from_line(line)
            .map_err(|e| parse_error(path, line_no, e.to_string()))?;

        if op.kind == kind::BEGIN_BLOCK {
            let token = op
                .args
                .first()
                .ok_or_else(|| parse_error(path, line_no, "BeginBlock requires a block number"))?;
            let number: u64 = token.parse().map_err(|_| {
                parse_error(path, line_no, format!("invalid block number {token:?}"))
            })?;
            current_block = Some(number);
        }
        if let Some(block) = current_block {
            op.block = Some(block);
        }
        ops.push(op);
    }
    Ok(())
}

fn parse_error(path: &Path, line: usize, reason: impl Into<String>) -> TraceError {
    TraceError::Parse {
        file: path.to_path_buf(),
        line,
        reason: reason.into(),
    }
}

/// Writes a trace back to disk, creating the parent directory as needed.
///
/// Each operation's `raw` text is emitted unchanged, followed by a newline
/// unless it already carries one, so a loaded trace round-trips byte for
/// byte.
pub fn write_trace(path: &Path, ops: &[Operation]) -> Result<(), TraceError> {
    if ops.is_empty() {
        return Err(TraceError::EmptyWrite);
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .map_err(|e| TraceError::io(format!("create directory {}", parent.display()), e))?;
    }
    let file = File::create(path)
        .map_err(|e| TraceError::io(format!("create trace file {}", path.display()), e))?;
    let mut writer = BufWriter::new(file);
    for op in ops {
        writer
            .write_all(op.raw.as_bytes())
            .map_err(|e| TraceError::io(format!("write trace file {}", path.display()), e))?;
        if !op.raw.ends_with('\n') {
            writer
                .write_all(b"\n")
                .map_err(|e| TraceError::io(format!("write trace file {}", path.display()), e))?;
        }
    }
    writer
        .flush()
        .map_err(|e| TraceError::io(format!("flush trace file {}", path.display()), e))
}

/// The block number of the first `BeginBlock`, if any.
pub fn first_block(ops: &[Operation]) -> Option<u64> {
    ops.iter()
        .find(|op| op.kind == kind::BEGIN_BLOCK)
        .and_then(|op| op.block)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).expect("write test trace");
        path
    }

    #[test]
    fn empty_file_list_fails() {
        assert!(matches!(
            load_trace(&[], 0, 0),
            Err(TraceError::NoInputFiles)
        ));
    }

    #[test]
    fn block_filter_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_file(dir.path(), "trace.txt", "BeginBlock, 1\n");
        assert!(matches!(
            load_trace(&[path.clone()], 1, 0),
            Err(TraceError::BlockFilterUnsupported { .. })
        ));
        assert!(matches!(
            load_trace(&[path], 0, 7),
            Err(TraceError::BlockFilterUnsupported { .. })
        ));
    }

    #[test]
    fn empty_file_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_file(dir.path(), "trace.txt", "\n\n");
        assert!(matches!(load_trace(&[path], 0, 0), Err(TraceError::EmptyTrace)));
    }

    #[test]
    fn block_is_stamped_onto_following_operations() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_file(
            dir.path(),
            "trace.txt",
            "GetRefund\n\
             BeginBlock, 12\n\
             BeginTransaction, 0\n\
             GetBalance, 0x0000000000000000000000000000000000000002, 0\n\
             EndTransaction\n\
             EndBlock\n\
             BeginBlock, 13\n\
             EndBlock\n",
        );
        let ops = load_trace(&[path], 0, 0).expect("load");
        assert_eq!(ops[0].block, None, "ops before the first BeginBlock are unstamped");
        for op in &ops[1..6] {
            assert_eq!(op.block, Some(12), "op {:?}", op.kind);
        }
        assert_eq!(ops[6].block, Some(13));
        assert_eq!(ops[7].block, Some(13));
        assert_eq!(first_block(&ops), Some(12));
    }

    #[test]
    fn bad_begin_block_number_names_file_and_line() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_file(dir.path(), "trace.txt", "GetRefund\nBeginBlock, abc\n");
        let err = load_trace(&[path], 0, 0).expect_err("should fail");
        match err {
            TraceError::Parse { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_kind_is_a_parse_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_file(dir.path(), "trace.txt", ", 0x1\n");
        assert!(matches!(
            load_trace(&[path], 0, 0),
            Err(TraceError::Parse { line: 1, .. })
        ));
    }

    #[test]
    fn round_trip_is_byte_identical() {
        let text = "BeginBlock, 1000\n\
                    BeginTransaction, 0\n\
                    CreateAccount, 0x1234567890123456789012345678901234567890\n\
                    EndTransaction\n\
                    EndBlock\n";
        let dir = tempfile::tempdir().expect("tempdir");
        let input = write_file(dir.path(), "in.txt", text);
        let ops = load_trace(&[input], 0, 0).expect("load");
        let output = dir.path().join("out.txt");
        write_trace(&output, &ops).expect("write");
        let written = fs::read(&output).expect("read back");
        assert_eq!(written, text.as_bytes());
    }

    #[test]
    fn writer_rejects_empty_trace_and_creates_parents() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(matches!(
            write_trace(&dir.path().join("out.txt"), &[]),
            Err(TraceError::EmptyWrite)
        ));

        let op = Operation::from_line("GetRefund").expect("parse");
        let nested = dir.path().join("a/b/out.txt");
        write_trace(&nested, &[op]).expect("write creates parents");
        assert_eq!(fs::read(&nested).expect("read back"), b"GetRefund\n");
    }

    #[test]
    fn multiple_files_reset_block_context() {
        let dir = tempfile::tempdir().expect("tempdir");
        let a = write_file(dir.path(), "a.txt", "BeginBlock, 5\nEndBlock\n");
        let b = write_file(dir.path(), "b.txt", "GetRefund\n");
        let ops = load_trace(&[a, b], 0, 0).expect("load");
        assert_eq!(ops[2].kind, "GetRefund");
        assert_eq!(ops[2].block, None, "block context must not leak across files");
    }
}
