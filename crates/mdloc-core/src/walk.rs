//! Document enumeration in natural order (`2.md` before `10.md`).

use std::cmp::Ordering;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const MARKDOWN_EXTENSION: &str = "md";

/// Natural ordering: digit runs compare numerically, other text compares
/// case-insensitively; ties fall back to a plain byte comparison.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut x = a.chars().peekable();
    let mut y = b.chars().peekable();
    loop {
        match (x.peek().copied(), y.peek().copied()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(cx), Some(cy)) if cx.is_ascii_digit() && cy.is_ascii_digit() => {
                let nx = take_digits(&mut x);
                let ny = take_digits(&mut y);
                let ord = compare_digit_runs(&nx, &ny);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(cx), Some(cy)) => {
                let ord = cx.to_lowercase().cmp(cy.to_lowercase());
                if ord != Ordering::Equal {
                    return ord;
                }
                x.next();
                y.next();
            }
        }
    }
}

fn take_digits(it: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut run = String::new();
    while let Some(c) = it.peek().copied().filter(char::is_ascii_digit) {
        run.push(c);
        it.next();
    }
    run
}

/// Numeric comparison of two digit strings of any length.
fn compare_digit_runs(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Recursively lists `.md` files under `root`. Each directory's entries are
/// visited in natural order and subdirectories are expanded in place.
pub fn collect_markdown(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    visit(root, &mut out)?;
    Ok(out)
}

fn visit(dir: &Path, out: &mut Vec<PathBuf>) -> io::Result<()> {
    let mut entries: Vec<(String, PathBuf, bool)> = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let is_dir = entry.file_type()?.is_dir();
        entries.push((name, entry.path(), is_dir));
    }
    entries.sort_by(|a, b| natural_cmp(&a.0, &b.0));

    for (_, path, is_dir) in entries {
        if is_dir {
            visit(&path, out)?;
        } else if is_markdown(&path) {
            out.push(path);
        }
    }
    Ok(())
}

pub fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(MARKDOWN_EXTENSION))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(mut names: Vec<&str>) -> Vec<&str> {
        names.sort_by(|a, b| natural_cmp(a, b));
        names
    }

    #[test]
    fn numbers_sort_numerically() {
        assert_eq!(sorted(vec!["1.md", "10.md", "2.md"]), ["1.md", "2.md", "10.md"]);
        assert_eq!(
            sorted(vec!["ch10-b.md", "ch2-a.md", "ch2-B.md", "ch1.md"]),
            ["ch1.md", "ch2-a.md", "ch2-B.md", "ch10-b.md"]
        );
    }

    #[test]
    fn case_insensitive_with_stable_tiebreak() {
        assert_eq!(sorted(vec!["b.md", "A.md", "a.md"]), ["A.md", "a.md", "b.md"]);
        assert_eq!(natural_cmp("007.md", "7.md"), "007.md".cmp("7.md"));
        assert_eq!(natural_cmp("x", "x"), Ordering::Equal);
    }

    #[test]
    fn long_digit_runs_do_not_overflow() {
        assert_eq!(
            natural_cmp("99999999999999999999999.md", "100000000000000000000000.md"),
            Ordering::Less
        );
    }

    #[test]
    fn collect_recurses_in_natural_order() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("part2")).unwrap();
        fs::create_dir_all(root.join("part10")).unwrap();
        for p in ["10.md", "2.md", "notes.txt", "part2/b.md", "part2/a.MD", "part10/1.md"] {
            fs::write(root.join(p), "x").unwrap();
        }
        let found: Vec<String> = collect_markdown(root)
            .unwrap()
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            found,
            ["2.md", "10.md", "part2/a.MD", "part2/b.md", "part10/1.md"]
        );
    }
}
