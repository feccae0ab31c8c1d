//! Bulk import text parser.
//!
//! Converts newline-delimited `KEY=value` text into an ordered pair list.
//! Never fails: malformed lines are counted and dropped.

use crate::models::{ImportPair, ParsedImport};

/// Parse import text line by line, after trimming each line:
///
/// - blank lines and `#` comments are ignored
/// - `[anything]` sets the heading to the trimmed inner text, last one wins
/// - everything else splits on the first `=`; a missing `=`, an `=` in the
///   first column, or an empty trimmed key or value skips the line
///
/// Duplicate keys are kept in order; reconciliation resolves them against
/// live state one pair at a time, so the last occurrence wins there.
pub fn parse(text: &str) -> ParsedImport {
    let mut parsed = ParsedImport::default();

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line.starts_with('[') && line.ends_with(']') {
            parsed.heading = Some(line[1..line.len() - 1].trim().to_string());
            continue;
        }

        match line.find('=') {
            None | Some(0) => {
                parsed.skipped += 1;
            }
            Some(idx) => {
                let key = line[..idx].trim();
                let value = line[idx + 1..].trim();
                if key.is_empty() || value.is_empty() {
                    parsed.skipped += 1;
                } else {
                    parsed.pairs.push(ImportPair {
                        key: key.to_string(),
                        value: value.to_string(),
                    });
                }
            }
        }
    }

    parsed
}
