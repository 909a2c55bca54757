use std::collections::HashMap;

use crate::error::{ChatgenError, Result};

use super::vocabulary::Vocabulary;

/// Bijection between vocabulary symbols and the indices `0..len()`.
///
/// Symbols are sorted by codepoint before numbering, so two codecs built
/// from equal vocabularies are identical regardless of set iteration order.
/// The codec is derived data: it is never persisted, only rebuilt.
///
/// # Invariants
/// - `index_to_symbol[symbol_to_index[c]] == c` for every symbol `c`
/// - `index_to_symbol` is strictly increasing
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexCodec {
	symbol_to_index: HashMap<char, usize>,
	index_to_symbol: Vec<char>,
}

impl IndexCodec {
	/// Builds the codec for a whole vocabulary.
	pub fn new(vocabulary: &Vocabulary) -> Self {
		let mut index_to_symbol: Vec<char> = vocabulary.symbols().collect();
		index_to_symbol.sort_unstable();

		let symbol_to_index = index_to_symbol
			.iter()
			.enumerate()
			.map(|(index, symbol)| (*symbol, index))
			.collect();

		Self { symbol_to_index, index_to_symbol }
	}

	/// Number of symbols, i.e. the width of every one-hot vector.
	pub fn len(&self) -> usize {
		self.index_to_symbol.len()
	}

	pub fn is_empty(&self) -> bool {
		self.index_to_symbol.is_empty()
	}

	/// Index used for pre-padding. Out of range, so it never names a symbol.
	pub fn pad_index(&self) -> usize {
		self.len()
	}

	pub fn index_of(&self, symbol: char) -> Result<usize> {
		self.symbol_to_index
			.get(&symbol)
			.copied()
			.ok_or(ChatgenError::UnknownSymbol(symbol))
	}

	pub fn symbol_of(&self, index: usize) -> Result<char> {
		self.index_to_symbol
			.get(index)
			.copied()
			.ok_or(ChatgenError::UnknownIndex(index))
	}

	/// Encodes a string symbol by symbol.
	pub fn encode(&self, text: &str) -> Result<Vec<usize>> {
		text.chars().map(|c| self.index_of(c)).collect()
	}

	/// Decodes indices back into a string.
	pub fn decode(&self, indices: &[usize]) -> Result<String> {
		indices.iter().map(|&i| self.symbol_of(i)).collect()
	}

	/// Symbols in index order.
	pub fn symbols(&self) -> &[char] {
		&self.index_to_symbol
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::text::{END_TOKEN, START_TOKEN};

	fn dogs_and_cats() -> Vocabulary {
		Vocabulary::build(&["Dogs", "Cats"], START_TOKEN, END_TOKEN).unwrap()
	}

	#[test]
	fn sorted_by_codepoint() {
		let codec = IndexCodec::new(&dogs_and_cats());
		assert_eq!(codec.symbols(), &['\t', '\n', 'C', 'D', 'a', 'g', 'o', 's', 't']);
		assert_eq!(codec.index_of('\t').unwrap(), 0);
		assert_eq!(codec.index_of('\n').unwrap(), 1);
		assert_eq!(codec.pad_index(), 9);
	}

	#[test]
	fn every_symbol_round_trips() {
		let vocabulary = dogs_and_cats();
		let codec = IndexCodec::new(&vocabulary);
		for symbol in vocabulary.symbols() {
			assert_eq!(codec.symbol_of(codec.index_of(symbol).unwrap()).unwrap(), symbol);
		}
	}

	#[test]
	fn rebuilding_is_deterministic() {
		let texts: Vec<String> = (0..200).map(|i| format!("ŝalut {i} les amis")).collect();
		let a = Vocabulary::build(&texts, START_TOKEN, END_TOKEN).unwrap();
		let b = Vocabulary::build_parallel(&texts, START_TOKEN, END_TOKEN).unwrap();
		assert_eq!(IndexCodec::new(&a), IndexCodec::new(&b));
		assert_eq!(IndexCodec::new(&a), IndexCodec::new(&a));
	}

	#[test]
	fn unknown_symbols_and_indices_fail() {
		let codec = IndexCodec::new(&dogs_and_cats());
		assert!(matches!(codec.encode("Dogz"), Err(ChatgenError::UnknownSymbol('z'))));
		assert!(matches!(codec.decode(&[0, 9]), Err(ChatgenError::UnknownIndex(9))));
	}

	#[test]
	fn encode_then_decode() {
		let codec = IndexCodec::new(&dogs_and_cats());
		let encoded = codec.encode("\tCats").unwrap();
		assert_eq!(encoded, vec![0, 2, 4, 8, 7]);
		assert_eq!(codec.decode(&encoded).unwrap(), "\tCats");
	}
}
