use colored::Colorize;
use similar::TextDiff;

const CONTEXT_LINES: usize = 3;

/// Unified diff of `old` against `new`, or `None` when they are equal.
pub fn unified_diff(old: &str, new: &str, filename: &str) -> Option<String> {
    if old == new {
        return None;
    }
    let from = format!("{} (before)", filename);
    let to = format!("{} (after)", filename);
    let diff = TextDiff::from_lines(old, new);
    let rendered = diff
        .unified_diff()
        .context_radius(CONTEXT_LINES)
        .header(&from, &to)
        .to_string();
    if rendered.is_empty() {
        None
    } else {
        Some(rendered)
    }
}

/// Added lines green, removed lines red.
pub fn colorize(diff: &str) -> String {
    diff.lines()
        .map(|line| {
            if line.starts_with('+') {
                line.green().to_string()
            } else if line.starts_with('-') {
                line.red().to_string()
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prints the change summary for one file to stdout.
pub fn print_change_summary(old: &str, new: &str, filename: &str) {
    match unified_diff(old, new, filename) {
        Some(diff) => {
            println!("\n{} {}:", "changes in".bold(), filename.bold());
            println!("{}", colorize(&diff));
        }
        None => println!("{} has no changes", filename),
    }
}
