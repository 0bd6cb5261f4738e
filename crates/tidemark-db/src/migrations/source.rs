use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use tidemark_common::{Error, Result, Sequence};
use tracing::debug;
use walkdir::WalkDir;

/// Separates the up body from the down body inside a migration file.
pub const SPLIT_MARKER: &str = "-- SPLIT --";

/// One schema change read from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    pub sequence: Sequence,
    pub up: String,
    /// Carried for completeness; the runner never executes it.
    pub down: String,
    pub path: PathBuf,
}

/// Load every migration under `dir`, in discovery order.
///
/// The walk is recursive: files in nested directories are migrations too,
/// directories themselves are skipped. Any unreadable entry, malformed name,
/// missing split marker or repeated sequence fails the whole load.
pub fn load_dir(dir: &Path) -> Result<Vec<Migration>> {
    let mut migrations = Vec::new();
    let mut seen: HashMap<Sequence, PathBuf> = HashMap::new();

    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.map_err(|e| walk_error(dir, e))?;
        if entry.file_type().is_dir() {
            continue;
        }

        let migration = parse_file(entry.path())?;
        if let Some(first) = seen.insert(migration.sequence, migration.path.clone()) {
            return Err(Error::DuplicateSequence {
                sequence: migration.sequence,
                first,
                second: migration.path,
            });
        }
        migrations.push(migration);
    }

    debug!("loaded {} migrations from {}", migrations.len(), dir.display());
    Ok(migrations)
}

/// Parse a single migration file.
pub fn parse_file(path: &Path) -> Result<Migration> {
    let sequence = sequence_from_path(path)?;
    let content = std::fs::read_to_string(path).map_err(|source| Error::Source {
        path: path.to_path_buf(),
        source,
    })?;
    let (up, down) = split_body(path, &content)?;

    Ok(Migration {
        sequence,
        up,
        down,
        path: path.to_path_buf(),
    })
}

/// Sequence encoded in the file name: the name without its final extension,
/// parsed as a non-negative integer. Values the signed 64-bit ledger column
/// cannot hold are malformed.
pub fn sequence_from_path(path: &Path) -> Result<Sequence> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .and_then(|stem| stem.parse::<Sequence>().ok())
        .filter(|&sequence| i64::try_from(sequence).is_ok())
        .ok_or_else(|| Error::MalformedFilename {
            path: path.to_path_buf(),
        })
}

/// Split file content at the first [`SPLIT_MARKER`]. Anything after a second
/// marker stays part of the down body.
pub fn split_body(path: &Path, content: &str) -> Result<(String, String)> {
    content
        .split_once(SPLIT_MARKER)
        .map(|(up, down)| (up.to_string(), down.to_string()))
        .ok_or_else(|| Error::MissingDownSection {
            path: path.to_path_buf(),
        })
}

fn walk_error(root: &Path, err: walkdir::Error) -> Error {
    let path = err
        .path()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| root.to_path_buf());
    let source = err
        .into_io_error()
        .unwrap_or_else(|| io::Error::other("filesystem loop in migration directory"));
    Error::Source { path, source }
}
