//! Token-bounded splitting at natural language boundaries.
//!
//! Boundaries are tried coarsest first. A unit that still exceeds the chunk size is
//! re-split with the next finer boundary; raw characters are the last resort. Every
//! separator stays attached to the unit it terminates, so the chunk texts concatenate
//! back to the input byte for byte.

use crate::tokenizer::TokenCounter;

pub const OPEN_TAG: &str = "<TRANSLATE_THIS>";
pub const CLOSE_TAG: &str = "</TRANSLATE_THIS>";

/// Paragraphs, lines, CJK and Western sentence ends, whitespace, characters.
pub const DEFAULT_SEPARATORS: &[&str] = &[
    "\n\n", "\n", "。", "！", "？", "；", "……", "…", ". ", "! ", "? ", " ", "",
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
    /// Original text of every earlier chunk.
    pub preceding: String,
    /// Original text of every later chunk.
    pub following: String,
}

impl Chunk {
    /// Whole document with this chunk's span delimited for the model.
    #[must_use]
    pub fn tagged_text(&self) -> String {
        let mut out = String::with_capacity(
            self.preceding.len()
                + self.text.len()
                + self.following.len()
                + OPEN_TAG.len()
                + CLOSE_TAG.len(),
        );
        out.push_str(&self.preceding);
        out.push_str(OPEN_TAG);
        out.push_str(&self.text);
        out.push_str(CLOSE_TAG);
        out.push_str(&self.following);
        out
    }
}

pub struct TextSplitter<'a> {
    counter: &'a dyn TokenCounter,
    chunk_size: usize,
    separators: &'a [&'a str],
}

impl<'a> TextSplitter<'a> {
    pub fn new(counter: &'a dyn TokenCounter, chunk_size: usize) -> Self {
        Self {
            counter,
            chunk_size: chunk_size.max(1),
            separators: DEFAULT_SEPARATORS,
        }
    }

    /// Splits `text` into ordered pieces. Empty input yields one empty piece.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return vec![String::new()];
        }
        let mut units = Vec::new();
        self.collect_units(text, self.separators, &mut units);
        let mut out = Vec::new();
        self.merge_units(&units, &mut out);
        out
    }

    pub fn split_chunks(&self, text: &str) -> Vec<Chunk> {
        chunks_with_context(self.split_text(text))
    }

    /// Cuts `text` into units that each fit the chunk size, going to finer
    /// boundaries only inside units that do not. Packing happens once over the
    /// whole sequence, so pieces of a re-split unit can join their neighbours.
    fn collect_units<'t>(&self, text: &'t str, separators: &[&str], units: &mut Vec<&'t str>) {
        let pos = separators
            .iter()
            .position(|s| s.is_empty() || text.contains(s))
            .unwrap_or(separators.len());
        let separator = separators.get(pos).copied().unwrap_or("");
        let finer = separators.get(pos + 1..).unwrap_or(&[]);

        for unit in split_keep_separator(text, separator) {
            if finer.is_empty() || self.counter.count_tokens(unit) <= self.chunk_size {
                // A unit with no finer boundary left is kept whole, even if oversized.
                units.push(unit);
            } else {
                self.collect_units(unit, finer, units);
            }
        }
    }

    /// Greedy packing: the token count is measured on the actual concatenation,
    /// since BPE counts are not additive across boundaries.
    fn merge_units(&self, units: &[&str], out: &mut Vec<String>) {
        let mut current = String::new();
        for unit in units {
            if !current.is_empty() {
                let mut candidate = String::with_capacity(current.len() + unit.len());
                candidate.push_str(&current);
                candidate.push_str(unit);
                if self.counter.count_tokens(&candidate) > self.chunk_size {
                    out.push(std::mem::take(&mut current));
                } else {
                    current = candidate;
                    continue;
                }
            }
            current.push_str(unit);
        }
        if !current.is_empty() {
            out.push(current);
        }
    }
}

pub fn split_chunks(counter: &dyn TokenCounter, text: &str, chunk_size: usize) -> Vec<Chunk> {
    TextSplitter::new(counter, chunk_size).split_chunks(text)
}

/// Attaches the untranslated surroundings to each piece.
pub fn chunks_with_context(pieces: Vec<String>) -> Vec<Chunk> {
    let joined = pieces.concat();
    let mut offset = 0usize;
    pieces
        .into_iter()
        .enumerate()
        .map(|(index, text)| {
            let end = offset + text.len();
            let chunk = Chunk {
                index,
                preceding: joined[..offset].to_string(),
                following: joined[end..].to_string(),
                text,
            };
            offset = end;
            chunk
        })
        .collect()
}

fn split_keep_separator<'t>(text: &'t str, separator: &str) -> Vec<&'t str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }
    text.split_inclusive(separator).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::tests::CharCounter;

    struct HashIsHeavy;

    impl TokenCounter for HashIsHeavy {
        fn count_tokens(&self, text: &str) -> usize {
            text.chars().map(|c| if c == '#' { 5 } else { 1 }).sum()
        }
    }

    fn texts(chunks: &[Chunk]) -> Vec<&str> {
        chunks.iter().map(|c| c.text.as_str()).collect()
    }

    #[test]
    fn prefers_paragraph_breaks_and_keeps_them() {
        let chunks = split_chunks(&CharCounter, "aaaa\n\nbbbb\n\ncccc", 12);
        assert_eq!(texts(&chunks), vec!["aaaa\n\nbbbb\n\n", "cccc"]);
    }

    #[test]
    fn splits_on_cjk_sentence_ends() {
        let chunks = split_chunks(&CharCounter, "第一句。第二句！第三句？", 5);
        assert_eq!(texts(&chunks), vec!["第一句。", "第二句！", "第三句？"]);
    }

    #[test]
    fn splits_on_western_sentence_ends() {
        let chunks = split_chunks(&CharCounter, "One. Two. Three.", 6);
        assert_eq!(texts(&chunks), vec!["One. ", "Two. ", "Three."]);
    }

    #[test]
    fn falls_back_to_characters() {
        let chunks = split_chunks(&CharCounter, "abcdefg", 3);
        assert_eq!(texts(&chunks), vec!["abc", "def", "g"]);
    }

    #[test]
    fn oversized_atomic_unit_stands_alone() {
        let chunks = split_chunks(&HashIsHeavy, "ab#cd", 2);
        assert_eq!(texts(&chunks), vec!["ab", "#", "cd"]);
    }

    #[test]
    fn pieces_of_a_long_paragraph_join_their_neighbours() {
        let chunks = split_chunks(&CharCounter, "A.\n\nxx yy zz\n\nB.", 7);
        assert_eq!(texts(&chunks), vec!["A.\n\nxx ", "yy zz\n\n", "B."]);
    }

    #[test]
    fn empty_input_is_one_empty_chunk() {
        let chunks = split_chunks(&CharCounter, "", 10);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "");
        assert_eq!(chunks[0].index, 0);
    }

    #[test]
    fn lossless_and_bounded() {
        let text = "First paragraph has a few sentences. It goes on! Does it end?\n\n\
                    第二段。很长的中文句子没有空格但是有标点；还有更多内容……最后一句。\n\
                    A line with    odd   spacing and a verylongwordthatcannotbesplitonspaces.\n\n\
                    tail";
        for size in [1usize, 3, 7, 16, 40, 100] {
            let chunks = split_chunks(&CharCounter, text, size);
            let rebuilt: String = chunks.iter().map(|c| c.text.as_str()).collect();
            assert_eq!(rebuilt, text, "size={size}");
            for c in &chunks {
                assert!(CharCounter.count_tokens(&c.text) <= size, "size={size} {c:?}");
                assert!(!c.text.is_empty());
            }
            for (i, c) in chunks.iter().enumerate() {
                assert_eq!(c.index, i);
            }
        }
    }

    #[test]
    fn context_covers_the_rest_of_the_document() {
        let chunks = split_chunks(&CharCounter, "aaa bbb ccc", 4);
        assert_eq!(texts(&chunks), vec!["aaa ", "bbb ", "ccc"]);
        let mid = &chunks[1];
        assert_eq!(mid.preceding, "aaa ");
        assert_eq!(mid.following, "ccc");
        assert_eq!(
            mid.tagged_text(),
            "aaa <TRANSLATE_THIS>bbb </TRANSLATE_THIS>ccc"
        );
        assert_eq!(chunks[0].preceding, "");
        assert_eq!(chunks[2].following, "");
    }
}
