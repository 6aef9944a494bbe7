use super::BlockPattern;

/// One `source -> translation` replacement scoped to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Substitution<'a> {
    pub source: &'a str,
    pub translation: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstitutionOutcome {
    pub content: String,
    /// Number of quoted literals rewritten to a different value.
    pub replaced: usize,
}

impl SubstitutionOutcome {
    pub fn changed(&self, original: &str) -> bool {
        self.content != original
    }
}

/// Rewrites quoted entries inside every located block.
///
/// Pairs are applied in the given order to the block text, each replacing all
/// of its occurrences. A later pair sees the output of earlier ones, so a
/// translation that contains another pair's quoted source will be rewritten
/// again. Bytes outside blocks are copied unchanged.
pub fn substitute_blocks(
    pattern: &BlockPattern,
    content: &str,
    pairs: &[Substitution<'_>],
) -> SubstitutionOutcome {
    if pairs.is_empty() {
        return SubstitutionOutcome {
            content: content.to_string(),
            replaced: 0,
        };
    }

    let quoted = pairs
        .iter()
        .map(|pair| (format!("\"{}\"", pair.source), quote_literal(pair.translation)))
        .filter(|(needle, replacement)| needle != replacement)
        .collect::<Vec<_>>();

    let mut output = String::with_capacity(content.len());
    let mut cursor = 0usize;
    let mut replaced = 0usize;
    for block in pattern.blocks(content) {
        output.push_str(&content[cursor..block.range.start]);
        let mut patched = block.text.to_string();
        for (needle, replacement) in &quoted {
            let hits = patched.matches(needle.as_str()).count();
            if hits == 0 {
                continue;
            }
            patched = patched.replace(needle.as_str(), replacement);
            replaced += hits;
        }
        output.push_str(&patched);
        cursor = block.range.end;
    }
    output.push_str(&content[cursor..]);

    SubstitutionOutcome {
        content: output,
        replaced,
    }
}

/// Wraps `text` in double quotes, escaping bare quotes inside it. Existing
/// escape sequences are kept as they are.
pub fn quote_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    let mut escaped = false;
    for ch in text.chars() {
        if escaped {
            out.push(ch);
            escaped = false;
            continue;
        }
        match ch {
            '\\' => {
                out.push(ch);
                escaped = true;
            }
            '"' => out.push_str("\\\""),
            _ => out.push(ch),
        }
    }
    if escaped {
        // a lone trailing backslash would swallow the closing quote
        out.push('\\');
    }
    out.push('"');
    out
}
