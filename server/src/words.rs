//! Word pairs for each game
//!
//! A corpus file holds one group of related words per line, comma separated.
//! Each game draws one line and two distinct words from it: the first becomes
//! the common word, the second the impostor's word.

use crate::error::WordSourceError;
use log::{info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{MAX_WORD_LEN, PARAM_SEPARATOR};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordPair {
    pub common: String,
    pub impostor: String,
}

impl WordPair {
    pub fn new(common: impl Into<String>, impostor: impl Into<String>) -> Self {
        Self {
            common: common.into(),
            impostor: impostor.into(),
        }
    }
}

/// Supplies the secret words for a new game.
pub trait WordSource: Send {
    fn pick_pair(&mut self) -> WordPair;
}

/// Word groups loaded from a CSV corpus
pub struct CsvWordSource {
    groups: Vec<Vec<String>>,
    rng: StdRng,
}

impl CsvWordSource {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, WordSourceError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| WordSourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let groups = parse_groups(&contents);
        if groups.is_empty() {
            return Err(WordSourceError::Empty(path.to_path_buf()));
        }

        info!("Loaded {} word groups from {}", groups.len(), path.display());
        Ok(Self {
            groups,
            rng: StdRng::from_entropy(),
        })
    }

    /// Builds a source from in-memory corpus text with a fixed seed.
    pub fn from_str_seeded(contents: &str, seed: u64) -> Option<Self> {
        let groups = parse_groups(contents);
        if groups.is_empty() {
            return None;
        }
        Some(Self {
            groups,
            rng: StdRng::seed_from_u64(seed),
        })
    }
}

impl WordSource for CsvWordSource {
    fn pick_pair(&mut self) -> WordPair {
        let group = &self.groups[self.rng.gen_range(0..self.groups.len())];
        let picked = rand::seq::index::sample(&mut self.rng, group.len(), 2);
        WordPair::new(group[picked.index(0)].clone(), group[picked.index(1)].clone())
    }
}

/// Parses corpus text into groups of at least two distinct usable words.
fn parse_groups(contents: &str) -> Vec<Vec<String>> {
    let mut groups = Vec::new();

    for (line_no, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let mut group: Vec<String> = Vec::new();
        for entry in line.split(',') {
            let word: String = entry.trim().chars().take(MAX_WORD_LEN).collect();
            if word.is_empty() || word.contains(PARAM_SEPARATOR) {
                continue;
            }
            if group.iter().any(|w| w.eq_ignore_ascii_case(&word)) {
                continue;
            }
            group.push(word);
        }

        if group.len() < 2 {
            warn!(
                "Skipping corpus line {}: needs at least two distinct words",
                line_no + 1
            );
            continue;
        }
        groups.push(group);
    }

    groups
}

/// Hands out a fixed list of pairs in order, wrapping around
pub struct FixedWordSource {
    pairs: Vec<WordPair>,
    next: usize,
}

impl FixedWordSource {
    pub fn new(pairs: Vec<WordPair>) -> Self {
        assert!(!pairs.is_empty(), "FixedWordSource needs at least one pair");
        Self { pairs, next: 0 }
    }

    pub fn single(common: &str, impostor: &str) -> Self {
        Self::new(vec![WordPair::new(common, impostor)])
    }
}

impl WordSource for FixedWordSource {
    fn pick_pair(&mut self) -> WordPair {
        let pair = self.pairs[self.next % self.pairs.len()].clone();
        self.next += 1;
        pair
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_groups_skips_unusable_lines() {
        let corpus = "apple, pear ,banana\n\nsolo\ncat,Cat,CAT\n , ,\nsea,ocean\n";
        let groups = parse_groups(corpus);

        assert_eq!(
            groups,
            vec![
                vec!["apple".to_string(), "pear".into(), "banana".into()],
                vec!["sea".to_string(), "ocean".into()],
            ]
        );
    }

    #[test]
    fn test_parse_groups_drops_separator_and_truncates() {
        let long = "a".repeat(40);
        let corpus = format!("bad:word,{long},short");
        let groups = parse_groups(&corpus);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0][0].len(), MAX_WORD_LEN);
        assert_eq!(groups[0][1], "short");
    }

    #[test]
    fn test_pick_pair_is_distinct_and_from_one_line() {
        let corpus = "red,green,blue\ndog,wolf\n";
        let mut source = CsvWordSource::from_str_seeded(corpus, 7).unwrap();

        for _ in 0..50 {
            let pair = source.pick_pair();
            assert_ne!(pair.common, pair.impostor);
            let colors = ["red", "green", "blue"];
            let animals = ["dog", "wolf"];
            let same_line = (colors.contains(&pair.common.as_str())
                && colors.contains(&pair.impostor.as_str()))
                || (animals.contains(&pair.common.as_str())
                    && animals.contains(&pair.impostor.as_str()));
            assert!(same_line, "{pair:?} mixes lines");
        }
    }

    #[test]
    fn test_from_str_rejects_empty_corpus() {
        assert!(CsvWordSource::from_str_seeded("one\n\n", 1).is_none());
    }

    #[test]
    fn test_load_missing_file() {
        let result = CsvWordSource::load("/definitely/not/here/words.csv");
        assert!(matches!(result, Err(WordSourceError::Io { .. })));
    }

    #[test]
    fn test_load_file() {
        let path = std::env::temp_dir().join(format!("impostor-words-{}.csv", std::process::id()));
        {
            let mut file = fs::File::create(&path).unwrap();
            writeln!(file, "sun,moon").unwrap();
            writeln!(file, "lonely").unwrap();
        }

        let mut source = CsvWordSource::load(&path).unwrap();
        let pair = source.pick_pair();
        let mut words = [pair.common, pair.impostor];
        words.sort();
        assert_eq!(words, ["moon".to_string(), "sun".to_string()]);

        fs::write(&path, "lonely\n").unwrap();
        assert!(matches!(
            CsvWordSource::load(&path),
            Err(WordSourceError::Empty(_))
        ));
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_fixed_source_cycles() {
        let mut source = FixedWordSource::new(vec![
            WordPair::new("cat", "dog"),
            WordPair::new("tea", "coffee"),
        ]);
        assert_eq!(source.pick_pair().common, "cat");
        assert_eq!(source.pick_pair().common, "tea");
        assert_eq!(source.pick_pair().impostor, "dog");
    }
}
