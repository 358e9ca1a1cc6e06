//! Natural ("human") string ordering
//!
//! Runs of ASCII digits compare by numeric value, so `file2` sorts before
//! `file10`. Everything else compares case-insensitively first.

use std::cmp::Ordering;

#[derive(Debug, Clone, Copy)]
enum Chunk<'a> {
    Digits(&'a str),
    Text(&'a str),
}

struct Chunks<'a> {
    rest: &'a str,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Chunk<'a>;

    fn next(&mut self) -> Option<Chunk<'a>> {
        let first = self.rest.chars().next()?;
        let digits = first.is_ascii_digit();
        let end = self
            .rest
            .char_indices()
            .find(|(_, c)| c.is_ascii_digit() != digits)
            .map_or(self.rest.len(), |(i, _)| i);
        let (chunk, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some(if digits {
            Chunk::Digits(chunk)
        } else {
            Chunk::Text(chunk)
        })
    }
}

fn compare_digits(a: &str, b: &str) -> Ordering {
    let a_trimmed = a.trim_start_matches('0');
    let b_trimmed = b.trim_start_matches('0');
    a_trimmed
        .len()
        .cmp(&b_trimmed.len())
        .then_with(|| a_trimmed.cmp(b_trimmed))
        .then_with(|| a.len().cmp(&b.len()))
}

fn compare_text(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}

/// Compare two strings in natural order
///
/// # Example
/// ```
/// use nzb_rs::nzb::natural_cmp;
/// use std::cmp::Ordering;
///
/// assert_eq!(natural_cmp("file2.txt", "file10.txt"), Ordering::Less);
/// assert_eq!(natural_cmp("File1", "file1"), Ordering::Less);
/// ```
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = Chunks { rest: a };
    let mut right = Chunks { rest: b };

    loop {
        let ord = match (left.next(), right.next()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(Chunk::Digits(x)), Some(Chunk::Digits(y))) => compare_digits(x, y),
            (Some(Chunk::Text(x)), Some(Chunk::Text(y))) => compare_text(x, y),
            (Some(Chunk::Digits(_)), Some(Chunk::Text(_))) => Ordering::Less,
            (Some(Chunk::Text(_)), Some(Chunk::Digits(_))) => Ordering::Greater,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
}

/// Stable natural sort of `items` by a string key
pub fn sort_natural_by_key<T>(items: &mut [T], key: impl Fn(&T) -> &str) {
    items.sort_by(|a, b| natural_cmp(key(a), key(b)));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(items: &[&str]) -> Vec<String> {
        let mut items: Vec<String> = items.iter().map(|s| s.to_string()).collect();
        sort_natural_by_key(&mut items, |s| s.as_str());
        items
    }

    #[test]
    fn test_numeric_runs() {
        assert_eq!(
            sorted(&["file1.txt", "file10.txt", "file2.txt"]),
            vec!["file1.txt", "file2.txt", "file10.txt"]
        );
    }

    #[test]
    fn test_par2_volumes() {
        assert_eq!(
            sorted(&[
                "x.mkv.vol03+04.par2",
                "x.mkv.par2",
                "x.mkv.vol00+01.par2",
                "x.mkv",
                "x.mkv.vol01+02.par2",
            ]),
            vec![
                "x.mkv",
                "x.mkv.par2",
                "x.mkv.vol00+01.par2",
                "x.mkv.vol01+02.par2",
                "x.mkv.vol03+04.par2",
            ]
        );
    }

    #[test]
    fn test_case_insensitive_with_tiebreak() {
        assert_eq!(sorted(&["b", "A", "a", "B"]), vec!["A", "a", "B", "b"]);
    }

    #[test]
    fn test_leading_zeros() {
        assert_eq!(natural_cmp("part01", "part1"), Ordering::Greater);
        assert_eq!(natural_cmp("part01", "part2"), Ordering::Less);
        assert_eq!(natural_cmp("r9", "r10"), Ordering::Less);
    }

    #[test]
    fn test_digits_before_text() {
        assert_eq!(natural_cmp("1abc", "abc"), Ordering::Less);
        assert_eq!(natural_cmp("", "a"), Ordering::Less);
        assert_eq!(natural_cmp("same", "same"), Ordering::Equal);
    }

    #[test]
    fn test_huge_numbers_do_not_overflow() {
        assert_eq!(
            natural_cmp("a99999999999999999999999", "a100000000000000000000000"),
            Ordering::Less
        );
    }
}
