//! Text-level handling of SNBT description blocks.
//!
//! Blocks are located with a pattern match over the raw file text rather than a
//! full SNBT parse. Everything outside a located block is never touched.

use anyhow::{Context, Result};
use regex::Regex;
use std::ops::Range;

mod extract;
mod substitute;

pub use extract::{extract_entries, parse_block_lines};
pub use substitute::{Substitution, SubstitutionOutcome, quote_literal, substitute_blocks};

pub const DEFAULT_BLOCK_KEY: &str = "description";

/// Locates `<key>: [ ... ]` spans. The closing bracket is the first `]` after
/// the opening one, so a `]` inside a quoted string ends the block early.
#[derive(Debug, Clone)]
pub struct BlockPattern {
    key: String,
    regex: Regex,
}

/// One located block, borrowed from the scanned content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block<'a> {
    /// Byte range of the whole `key: [ ... ]` match.
    pub range: Range<usize>,
    /// The whole match, marker and brackets included.
    pub text: &'a str,
    /// Content between the brackets.
    pub body: &'a str,
}

impl BlockPattern {
    pub fn new(key: &str) -> Result<Self> {
        let key = key.trim();
        if key.is_empty() {
            return Err(anyhow::anyhow!("block key is empty"));
        }
        let pattern = format!(r"\b{}:\s*\[([\s\S]*?)\]", regex::escape(key));
        let regex = Regex::new(&pattern)
            .with_context(|| format!("failed to compile block pattern for key '{}'", key))?;
        Ok(Self {
            key: key.to_string(),
            regex,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn blocks<'a>(&self, content: &'a str) -> Vec<Block<'a>> {
        self.regex
            .captures_iter(content)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let body = caps.get(1)?;
                Some(Block {
                    range: whole.range(),
                    text: whole.as_str(),
                    body: body.as_str(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern() -> BlockPattern {
        BlockPattern::new(DEFAULT_BLOCK_KEY).expect("pattern")
    }

    #[test]
    fn locates_single_and_multi_line_blocks() {
        let content = "{\n\ttitle: \"Start\"\n\tdescription: [\"One\"]\n\tdescription: [\n\t\t\"Two\"\n\t]\n}";
        let blocks = pattern().blocks(content);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].text, "description: [\"One\"]");
        assert_eq!(blocks[0].body, "\"One\"");
        assert_eq!(blocks[1].body, "\n\t\t\"Two\"\n\t");
        assert_eq!(&content[blocks[1].range.clone()], blocks[1].text);
    }

    #[test]
    fn ignores_other_keys() {
        let content = "subtitle: [\"No\"]\nsubdescription: [\"No\"]\ndescription:[\"Yes\"]";
        let blocks = pattern().blocks(content);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].body, "\"Yes\"");
    }

    #[test]
    fn custom_key_is_escaped() {
        let pattern = BlockPattern::new("hover.text").expect("pattern");
        let blocks = pattern.blocks("hover.text: [\"a\"] hoverXtext: [\"b\"]");
        assert_eq!(blocks.len(), 1);
        assert_eq!(pattern.key(), "hover.text");
    }

    #[test]
    fn empty_key_is_rejected() {
        assert!(BlockPattern::new("  ").is_err());
    }
}
