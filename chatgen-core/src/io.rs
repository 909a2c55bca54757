use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{ChatgenError, Result};

/// Reads a text file and returns all its lines as a `Vec<String>`.
///
/// - Reads the entire file into memory
/// - Splits on `\n` / `\r\n`
pub(crate) fn read_lines<P: AsRef<Path>>(filename: P) -> Result<Vec<String>> {
	let path = filename.as_ref();
	let mut contents = String::new();
	File::open(path)
		.and_then(|mut file| file.read_to_string(&mut contents))
		.map_err(|e| ChatgenError::io(e, Some(path.to_path_buf())))?;
	Ok(contents.lines().map(str::to_owned).collect())
}

/// Serializes `value` with postcard and writes it to `path`.
///
/// Parent directories are created when missing.
pub(crate) fn write_postcard<T: Serialize, P: AsRef<Path>>(value: &T, path: P) -> Result<()> {
	let path = path.as_ref();
	if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
		create_dir(parent)?;
	}
	let bytes = postcard::to_stdvec(value)?;
	fs::write(path, bytes).map_err(|e| ChatgenError::io(e, Some(path.to_path_buf())))
}

/// Reads a postcard-encoded value from `path`.
pub(crate) fn read_postcard<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
	let path = path.as_ref();
	let bytes = fs::read(path).map_err(|e| ChatgenError::io(e, Some(path.to_path_buf())))?;
	Ok(postcard::from_bytes(&bytes)?)
}

/// Creates `dir` and any missing parents.
pub(crate) fn create_dir<P: AsRef<Path>>(dir: P) -> Result<()> {
	let dir = dir.as_ref();
	fs::create_dir_all(dir).map_err(|e| ChatgenError::io(e, Some(dir.to_path_buf())))
}

/// Lists all files with a given extension in a directory.
///
/// Returns file stems only (no paths, no extension). A missing directory
/// yields an empty list.
pub(crate) fn list_file_stems<P: AsRef<Path>>(dir: P, extension: &str) -> Result<Vec<String>> {
	let dir = dir.as_ref();
	if !dir.is_dir() {
		return Ok(Vec::new());
	}

	let mut stems = Vec::new();
	let entries = fs::read_dir(dir).map_err(|e| ChatgenError::io(e, Some(dir.to_path_buf())))?;
	for entry in entries {
		let path = entry?.path();
		if path.is_file() && path.extension() == Some(std::ffi::OsStr::new(extension)) {
			if let Some(stem) = path.file_stem() {
				stems.push(stem.to_string_lossy().to_string());
			}
		}
	}

	Ok(stems)
}
