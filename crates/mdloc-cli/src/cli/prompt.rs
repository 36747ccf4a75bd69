//! Interactive prompts: source path and overwrite confirmation.

use std::io::{self, BufRead, Write};

/// Writes `question`, reads one line. EOF yields an empty answer.
pub fn prompt_line<R: BufRead, W: Write>(input: &mut R, output: &mut W, question: &str) -> io::Result<String> {
    write!(output, "{}", question)?;
    output.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// `y`, `yes` and an empty answer (the default) confirm; anything else cancels.
pub fn is_confirmed(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "" | "y" | "yes")
}

/// Trims a pasted path and strips one pair of surrounding quotes.
/// Returns `None` when nothing is left.
pub fn clean_path_input(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let unquoted = trimmed
        .strip_prefix(['"', '\''])
        .unwrap_or(trimmed);
    let unquoted = unquoted
        .strip_suffix(['"', '\''])
        .unwrap_or(unquoted)
        .trim();
    (!unquoted.is_empty()).then(|| unquoted.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn confirmation_answers() {
        for yes in ["", "y", "Y", "yes", " YES ", "\n"] {
            assert!(is_confirmed(yes), "{:?} should confirm", yes);
        }
        for no in ["n", "no", "yep", "x"] {
            assert!(!is_confirmed(no), "{:?} should cancel", no);
        }
    }

    #[test]
    fn pasted_paths_lose_quotes() {
        assert_eq!(clean_path_input("  \"/tmp/my notes\"  ").as_deref(), Some("/tmp/my notes"));
        assert_eq!(clean_path_input("'docs'").as_deref(), Some("docs"));
        assert_eq!(clean_path_input("plain/path").as_deref(), Some("plain/path"));
        assert_eq!(clean_path_input("   "), None);
        assert_eq!(clean_path_input("\"\""), None);
    }

    #[test]
    fn prompt_reads_one_line() {
        let mut input = Cursor::new("first\r\nsecond\n");
        let mut output = Vec::new();
        let answer = prompt_line(&mut input, &mut output, "Path: ").unwrap();
        assert_eq!(answer, "first");
        assert_eq!(output, b"Path: ");

        let mut empty = Cursor::new("");
        assert_eq!(prompt_line(&mut empty, &mut Vec::new(), "? ").unwrap(), "");
    }
}
