use super::BlockPattern;

/// All non-empty entries of every block in `content`, in document order.
/// Duplicates are kept; deduplication belongs to the catalog.
pub fn extract_entries(pattern: &BlockPattern, content: &str) -> Vec<String> {
    pattern
        .blocks(content)
        .iter()
        .flat_map(|block| parse_block_lines(block.body))
        .collect()
}

/// Splits a block body into entries, one or more per line.
///
/// A line made only of complete quoted literals (`"a", "b"`) yields each
/// literal's raw body. Any other line is trimmed and loses one leading and one
/// trailing quote if present, so malformed quoting degrades instead of failing.
pub fn parse_block_lines(body: &str) -> Vec<String> {
    let mut entries = Vec::new();
    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match split_literals(line) {
            Some(literals) => entries.extend(
                literals
                    .into_iter()
                    .filter(|literal| !literal.trim().is_empty())
                    .map(str::to_string),
            ),
            None => {
                let stripped = strip_quote_pair(line);
                if !stripped.trim().is_empty() {
                    entries.push(stripped.to_string());
                }
            }
        }
    }
    entries
}

fn split_literals(line: &str) -> Option<Vec<&str>> {
    let mut literals = Vec::new();
    let mut rest = line;
    loop {
        rest = rest.trim_start_matches(|ch: char| ch.is_whitespace() || ch == ',');
        if rest.is_empty() {
            break;
        }
        let inner = rest.strip_prefix('"')?;
        let end = closing_quote(inner)?;
        literals.push(&inner[..end]);
        rest = &inner[end + 1..];
    }
    if literals.is_empty() {
        None
    } else {
        Some(literals)
    }
}

fn closing_quote(text: &str) -> Option<usize> {
    let mut escaped = false;
    for (idx, ch) in text.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '"' => return Some(idx),
            _ => {}
        }
    }
    None
}

fn strip_quote_pair(line: &str) -> &str {
    let line = line.strip_prefix('"').unwrap_or(line);
    line.strip_suffix('"').unwrap_or(line)
}
