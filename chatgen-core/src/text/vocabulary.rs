use std::collections::HashSet;
use std::path::Path;
use std::sync::mpsc;
use std::thread;

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{ChatgenError, Result};
use crate::io::{read_postcard, write_postcard};

/// Set of every symbol the model may read or emit.
///
/// A `Vocabulary` holds each distinct character seen in the corpus plus
/// the two sentinels framing a string. It carries no ordering: indices are
/// assigned later, by [`IndexCodec`](super::codec::IndexCodec).
///
/// # Invariants
/// - `start` and `end` are always members of `symbols`
/// - `start != end`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Vocabulary {
	/// Sentinel marking the beginning of a string.
	start: char,
	/// Sentinel marking the end of a string.
	end: char,
	/// Distinct symbols, sentinels included.
	symbols: HashSet<char>,
}

impl Vocabulary {
	/// Creates a vocabulary holding only the two sentinels.
	///
	/// # Errors
	/// Returns an error if both sentinels are the same character.
	pub fn new(start: char, end: char) -> Result<Self> {
		if start == end {
			return Err(ChatgenError::InvalidConfig(format!(
				"start and end sentinels must differ, both are {start:?}"
			)));
		}
		Ok(Self { start, end, symbols: HashSet::from([start, end]) })
	}

	/// Builds a vocabulary from every character of every text.
	///
	/// Both sentinels are inserted even when the corpus never uses them.
	pub fn build<S: AsRef<str>>(texts: &[S], start: char, end: char) -> Result<Self> {
		let mut vocabulary = Self::new(start, end)?;
		for text in texts {
			vocabulary.add_text(text.as_ref());
		}
		Ok(vocabulary)
	}

	/// Same as [`Vocabulary::build`], splitting the corpus across threads.
	///
	/// # Behavior
	/// - Splits texts into chunks (based on CPU cores * factor).
	/// - Spawns threads building a partial vocabulary for each chunk.
	/// - Merges partial vocabularies as they arrive; set union makes the
	///   arrival order irrelevant.
	pub fn build_parallel(texts: &[String], start: char, end: char) -> Result<Self> {
		let mut vocabulary = Self::new(start, end)?;
		if texts.is_empty() {
			return Ok(vocabulary);
		}

		let chunks = num_cpus::get() * 8;
		let chunk_size = texts.len().div_ceil(chunks).max(1);

		let (tx, rx) = mpsc::channel();
		for chunk in texts.chunks(chunk_size) {
			let tx = tx.clone();
			let chunk: Vec<String> = chunk.to_vec();
			let mut partial = vocabulary.clone();

			thread::spawn(move || {
				for text in &chunk {
					partial.add_text(text);
				}
				// The receiver outlives every sender
				let _ = tx.send(partial);
			});
		}
		drop(tx);

		for partial in rx.iter() {
			vocabulary.merge(&partial)?;
		}

		info!("vocabulary built from {} texts: {} symbols", texts.len(), vocabulary.len());
		Ok(vocabulary)
	}

	/// Adds every character of `text`.
	pub fn add_text(&mut self, text: &str) {
		self.symbols.extend(text.chars());
	}

	/// Merges another vocabulary into this one.
	///
	/// # Errors
	/// Returns an error if the sentinels of both vocabularies differ.
	pub fn merge(&mut self, other: &Self) -> Result<()> {
		if self.start != other.start || self.end != other.end {
			return Err(ChatgenError::InvalidConfig(format!(
				"sentinel mismatch: self=({:?}, {:?}), other=({:?}, {:?})",
				self.start, self.end, other.start, other.end
			)));
		}
		self.symbols.extend(other.symbols.iter().copied());
		Ok(())
	}

	pub fn start(&self) -> char {
		self.start
	}

	pub fn end(&self) -> char {
		self.end
	}

	pub fn contains(&self, symbol: char) -> bool {
		self.symbols.contains(&symbol)
	}

	/// Number of symbols, sentinels included.
	pub fn len(&self) -> usize {
		self.symbols.len()
	}

	/// Always `false`: the sentinels are members of every vocabulary.
	pub fn is_empty(&self) -> bool {
		self.symbols.is_empty()
	}

	/// Iterates over the symbols in no particular order.
	pub fn symbols(&self) -> impl Iterator<Item = char> + '_ {
		self.symbols.iter().copied()
	}

	/// Writes the vocabulary to `path` (postcard).
	pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
		write_postcard(self, path)
	}

	/// Reads a vocabulary written by [`Vocabulary::save`].
	///
	/// # Errors
	/// Returns an error if the file is unreadable, malformed, or does not
	/// contain both of its own sentinels.
	pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
		let vocabulary: Self = read_postcard(path)?;
		if vocabulary.start == vocabulary.end
			|| !vocabulary.contains(vocabulary.start)
			|| !vocabulary.contains(vocabulary.end)
		{
			return Err(ChatgenError::Serialization(
				"persisted vocabulary is missing its sentinels".to_owned(),
			));
		}
		Ok(vocabulary)
	}
}
