//! Edge JSONL: one edge object per line. Zero lines is a valid edge set.

use crate::edge::Edge;
use serde_json::Value;
use std::ffi::OsString;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

/// Errors from edge-file reads and atomic writes.
#[derive(Debug, thiserror::Error)]
pub enum JsonlError {
    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("line {line}: {message}")]
    Line { line: usize, message: String },

    #[error("{path}: corrupt edge file ({reason})")]
    Corrupt { path: String, reason: &'static str },
}

impl JsonlError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }

    fn line(line: usize, message: impl ToString) -> Self {
        Self::Line {
            line,
            message: message.to_string(),
        }
    }
}

/// Read edges from a JSONL reader. Blank lines and `#` comments are skipped.
pub fn read_edges(reader: impl BufRead) -> Result<Vec<Edge>, JsonlError> {
    let mut edges = Vec::new();
    for (line, value) in read_lines(reader)? {
        edges.push(serde_json::from_value(value).map_err(|e| JsonlError::line(line, e))?);
    }
    Ok(edges)
}

/// Raw JSON objects paired with their 1-based line numbers.
pub fn read_lines(reader: impl BufRead) -> Result<Vec<(usize, Value)>, JsonlError> {
    let mut out = Vec::new();
    let mut line = 0;
    for text in reader.lines() {
        line += 1;
        let text = text.map_err(|e| JsonlError::line(line, format!("read failed: {e}")))?;
        let payload = text.trim();
        if payload.is_empty() || payload.starts_with('#') {
            continue;
        }
        match serde_json::from_str::<Value>(payload) {
            Ok(value @ Value::Object(_)) => out.push((line, value)),
            Ok(_) => return Err(JsonlError::line(line, "expected a JSON object")),
            Err(e) => return Err(JsonlError::line(line, e)),
        }
    }
    Ok(out)
}

pub fn read_edges_from_path(path: impl AsRef<Path>) -> Result<Vec<Edge>, JsonlError> {
    read_edges(load_checked(path.as_ref())?.as_bytes())
}

pub fn read_lines_from_path(path: impl AsRef<Path>) -> Result<Vec<(usize, Value)>, JsonlError> {
    read_lines(load_checked(path.as_ref())?.as_bytes())
}

// NUL bytes and invalid UTF-8 mean the file was damaged, not mis-authored.
fn load_checked(path: &Path) -> Result<String, JsonlError> {
    let bytes = fs::read(path).map_err(|e| JsonlError::io(path, e))?;
    let corrupt = |reason| JsonlError::Corrupt {
        path: path.display().to_string(),
        reason,
    };
    if bytes.contains(&0) {
        return Err(corrupt("NUL byte"));
    }
    String::from_utf8(bytes).map_err(|_| corrupt("invalid UTF-8"))
}

/// Replace `path` with `contents` so readers never observe a partial file.
pub fn write_atomic(path: impl AsRef<Path>, contents: &[u8]) -> Result<(), JsonlError> {
    write_atomic_all(&[(path.as_ref(), contents)])
}

/// Publish several files as one unit.
///
/// Every payload is staged in a sibling temp file and synced before any
/// destination is touched. If staging or any rename fails, the staged files
/// and the destinations already renamed in this call are removed, so a
/// failure never leaves a subset of the outputs behind.
pub fn write_atomic_all(files: &[(&Path, &[u8])]) -> Result<(), JsonlError> {
    for (path, _) in files {
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir).map_err(|e| JsonlError::io(dir, e))?;
        }
    }

    let staged: Vec<PathBuf> = files.iter().map(|(path, _)| staging_path(path)).collect();
    let discard = |upto: usize| {
        for staging in &staged[..upto] {
            let _ = fs::remove_file(staging);
        }
    };

    for (idx, ((path, contents), staging)) in files.iter().zip(&staged).enumerate() {
        let written = fs::File::create(staging).and_then(|mut file| {
            file.write_all(contents)?;
            file.sync_all()
        });
        if let Err(e) = written {
            discard(idx + 1);
            return Err(JsonlError::io(path, e));
        }
    }

    for (idx, ((path, _), staging)) in files.iter().zip(&staged).enumerate() {
        if let Err(e) = fs::rename(staging, path) {
            discard(staged.len());
            for (published, _) in &files[..idx] {
                let _ = fs::remove_file(published);
            }
            return Err(JsonlError::io(path, e));
        }
    }
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(format!(".pulse-{}.partial", std::process::id()));
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn scratch(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let pid = std::process::id();
        std::env::temp_dir().join(format!("pulse-jsonl-{name}-{pid}-{nanos}.jsonl"))
    }

    const EDGE_LINE: &str = r#"{"edge_id":"e_01","type":"gate_metric_tension","src_atom_id":"a_01","dst_atom_id":"a_02","severity":"crit","tension_atom_id":"t_01","rule":"same_family","run_context":{"run_pair_id":"pair1_x"}}"#;

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let text = format!("# edges\n\n{EDGE_LINE}\n");
        let edges = read_edges(text.as_bytes()).expect("edges should parse");
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].edge_id, "e_01");
    }

    #[test]
    fn no_lines_means_no_edges() {
        assert!(read_edges(&b""[..]).expect("empty input").is_empty());
    }

    #[test]
    fn bad_line_reports_its_number() {
        let text = format!("{EDGE_LINE}\n{{not json\n");
        match read_edges(text.as_bytes()) {
            Err(JsonlError::Line { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected line error, got {other:?}"),
        }
    }

    #[test]
    fn arrays_are_not_edges() {
        match read_lines(&b"[1,2]\n"[..]) {
            Err(JsonlError::Line { line: 1, message }) => assert!(message.contains("object")),
            other => panic!("expected line error, got {other:?}"),
        }
    }

    #[test]
    fn nul_bytes_mark_the_file_corrupt() {
        let path = scratch("nul");
        fs::write(&path, format!("{EDGE_LINE}\n\0garbage")).expect("fixture should write");
        let result = read_edges_from_path(&path);
        let _ = fs::remove_file(&path);
        assert!(matches!(
            result,
            Err(JsonlError::Corrupt {
                reason: "NUL byte",
                ..
            })
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let path = scratch("absent");
        assert!(matches!(
            read_lines_from_path(&path),
            Err(JsonlError::Io { .. })
        ));
    }

    #[test]
    fn failed_group_write_publishes_nothing() {
        let dir = scratch("group");
        fs::create_dir_all(&dir).expect("scratch dir");
        let blocker = dir.join("blocker");
        fs::write(&blocker, b"not a directory").expect("blocker file");
        let first = dir.join("field.json");
        let second = blocker.join("edges.jsonl");

        let result = write_atomic_all(&[
            (first.as_path(), &b"{}\n"[..]),
            (second.as_path(), &b""[..]),
        ]);
        let first_exists = first.exists();
        let staging_left = staging_path(&first).exists();
        let _ = fs::remove_dir_all(&dir);

        assert!(matches!(result, Err(JsonlError::Io { .. })));
        assert!(!first_exists);
        assert!(!staging_left);
    }

    #[test]
    fn group_write_publishes_every_file() {
        let dir = scratch("group-ok");
        let first = dir.join("a.json");
        let second = dir.join("nested").join("b.jsonl");
        write_atomic_all(&[(first.as_path(), &b"a"[..]), (second.as_path(), &b"b"[..])])
            .expect("group write");
        let contents = (fs::read(&first), fs::read(&second));
        let _ = fs::remove_dir_all(&dir);
        assert_eq!(contents.0.expect("first"), b"a");
        assert_eq!(contents.1.expect("second"), b"b");
    }

    #[test]
    fn atomic_write_overwrites_and_leaves_no_staging_file() {
        let path = scratch("atomic");
        write_atomic(&path, b"first\n").expect("first write");
        write_atomic(&path, b"second\n").expect("second write");
        let text = fs::read_to_string(&path).expect("file should exist");
        let staging_left = staging_path(&path).exists();
        let _ = fs::remove_file(&path);
        assert_eq!(text, "second\n");
        assert!(!staging_left);
    }
}
