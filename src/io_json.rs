//! JSON persistence for export payloads.
//!
//! Thin wrappers around `serde_json` with buffered file I/O that attach the
//! offending path to parse and write errors.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CvatError;

/// Reads a JSON document from `path`.
///
/// # Errors
/// Returns an error if the file cannot be opened or does not parse into `T`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, CvatError> {
    let file = File::open(path).map_err(CvatError::Io)?;
    let reader = BufReader::new(file);

    serde_json::from_reader(reader).map_err(|source| CvatError::JsonParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes `value` to `path` as pretty-printed JSON, replacing any existing file.
///
/// # Errors
/// Returns an error if the file cannot be created or written.
pub fn write_json<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<(), CvatError> {
    let file = File::create(path).map_err(CvatError::Io)?;
    let mut writer = BufWriter::new(file);

    serde_json::to_writer_pretty(&mut writer, value).map_err(|source| CvatError::JsonWrite {
        path: path.to_path_buf(),
        source,
    })?;
    writer.flush().map_err(CvatError::Io)
}
