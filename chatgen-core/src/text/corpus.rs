use std::path::Path;

use log::info;

use crate::error::Result;
use crate::io::read_lines;

/// Cleaned text column handed over by the data-cleaning stage.
///
/// The corpus only drops blank lines and, optionally, strings that are
/// too long; it does not otherwise re-clean its input.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Corpus {
	texts: Vec<String>,
}

impl Corpus {
	/// Wraps in-memory texts. Empty strings are skipped.
	pub fn from_texts<I, S>(texts: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let texts = texts.into_iter().map(Into::into).filter(|t: &String| !t.is_empty()).collect();
		Self { texts }
	}

	/// Reads one text per line from `path`.
	///
	/// # Parameters
	/// - `max_chars`: when set, only texts strictly shorter than this many
	///   characters are kept.
	pub fn from_file<P: AsRef<Path>>(path: P, max_chars: Option<usize>) -> Result<Self> {
		let lines = read_lines(&path)?;
		let total = lines.len();
		let corpus = Self::from_texts(lines).shorter_than(max_chars);
		info!(
			"loaded {} texts from {} ({} lines read)",
			corpus.len(),
			path.as_ref().display(),
			total
		);
		Ok(corpus)
	}

	/// Keeps only texts with fewer than `max_chars` characters.
	pub fn shorter_than(mut self, max_chars: Option<usize>) -> Self {
		if let Some(max_chars) = max_chars {
			self.texts.retain(|t| t.chars().count() < max_chars);
		}
		self
	}

	pub fn texts(&self) -> &[String] {
		&self.texts
	}

	pub fn len(&self) -> usize {
		self.texts.len()
	}

	pub fn is_empty(&self) -> bool {
		self.texts.is_empty()
	}

	/// Builds the model inputs and targets.
	///
	/// Each input is `start + text`, each target is `text + end`: position
	/// `i` of a target holds the symbol following position `i` of its input.
	pub fn framed(&self, start: char, end: char) -> (Vec<String>, Vec<String>) {
		self.texts
			.iter()
			.map(|text| {
				let mut input = String::with_capacity(text.len() + start.len_utf8());
				input.push(start);
				input.push_str(text);

				let mut target = text.clone();
				target.push(end);
				(input, target)
			})
			.unzip()
	}
}
