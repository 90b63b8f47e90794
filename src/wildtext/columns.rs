use std::sync::OnceLock;

use regex::Regex;

const COLUMN_RULE: &str = "----------------------------------------";

struct Patterns {
    /// `Surf, Normal:      Surf, Dark Spot:`
    start: Regex,
    rule: Regex,
    /// Either column may be empty.
    content: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        start: Regex::new(r"^(.+?):\s+(.+?):$").expect("valid regex"),
        rule: Regex::new(r"---+\s+---+").expect("valid regex"),
        content: Regex::new(r"^(.*?)\s\s\s+(.*?)$").expect("valid regex"),
    })
}

/// Rewrite side-by-side blocks as the left column followed by the right
/// column. A block starts at a line with two `Heading:` titles and ends at
/// the next blank line.
pub fn decolumn(text: &str) -> String {
    let p = patterns();
    let mut out = String::with_capacity(text.len());
    let mut in_block = false;
    let mut left = String::new();
    let mut right = String::new();

    for line in text.lines() {
        if !in_block {
            if let Some(caps) = p.start.captures(line) {
                in_block = true;
                push_line(&mut left, &caps[1]);
                push_line(&mut right, &caps[2]);
            } else {
                push_line(&mut out, line);
            }
            continue;
        }

        if p.rule.is_match(line) {
            push_line(&mut left, COLUMN_RULE);
            push_line(&mut right, COLUMN_RULE);
        } else if let Some(caps) = p.content.captures(line) {
            push_line(&mut left, &caps[1]);
            push_line(&mut right, &caps[2]);
        } else if line.trim().is_empty() {
            flush(&mut out, &mut left, &mut right);
            in_block = false;
        } else {
            // Only the left column has content on this line.
            push_line(&mut left, line.trim());
        }
    }
    if in_block {
        flush(&mut out, &mut left, &mut right);
    }
    out
}

/// Emit the left then the right column, each followed by a blank line.
fn flush(out: &mut String, left: &mut String, right: &mut String) {
    for buffer in [left, right] {
        out.push_str(buffer);
        out.push('\n');
        buffer.clear();
    }
}

fn push_line(buffer: &mut String, line: &str) {
    buffer.push_str(line);
    buffer.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_column_block() {
        let text = "\
~~~ Route 1 ~~~
Surf, Normal:                 Surf, Dark Spot:
-------------                 ----------------
Basculin Lv. 20-25 60%        Frillish Lv. 20-25 40%
Alomomola Lv. 20-25 40%

after
";
        let expected = "\
~~~ Route 1 ~~~
Surf, Normal
----------------------------------------
Basculin Lv. 20-25 60%
Alomomola Lv. 20-25 40%

Surf, Dark Spot
----------------------------------------
Frillish Lv. 20-25 40%

after
";
        assert_eq!(decolumn(text), expected);
    }

    #[test]
    fn test_plain_text_untouched() {
        let text = "Grass\n-----\nPatrat Lv. 2 40%\n";
        assert_eq!(decolumn(text), text);
    }

    #[test]
    fn test_unterminated_block_is_flushed() {
        let text = "A:   B:\nx   y";
        assert_eq!(decolumn(text), "A\nx\n\nB\ny\n\n");
    }
}
