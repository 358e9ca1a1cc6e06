//! File name heuristics for NZB subject lines
//!
//! Posters put the file name somewhere in the free-form `subject` attribute,
//! usually in double quotes:
//!
//! ```text
//! [1/5] - "Big Buck Bunny - S01E01.mkv" yEnc (1/24) 16981056
//! ```
//!
//! The helpers here recover that name and classify it (PAR2, RAR,
//! obfuscated). Patterns follow the ones SABnzbd uses.

use regex::Regex;
use std::sync::LazyLock;

static QUOTED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#""(.*)""#).expect("valid regex"));

static YENC_SUBJECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\[|\()(?:\d+/\d+)(?:\]|\))\s-\s(.*)\syEnc\s(?:\[|\()(?:\d+/\d+)(?:\]|\))\s\d+$")
        .expect("valid regex")
});

static FILENAME_LIKE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([\w\-+()' .,]+(?:\[[\w\-/+()' .,]*\][\w\-+()' .,]*)*\.[A-Za-z0-9]{2,4})\b")
        .expect("valid regex")
});

static EXTENSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.[a-z]\w{2,5}$").expect("valid regex"));

static RAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(?:rar|[rstuv]\d\d)$").expect("valid regex"));

static HEX32: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-f0-9]{32}$").expect("valid regex"));

static HEX_DOTTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-f0-9.]{40,}$").expect("valid regex"));

static HEX30: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[a-f0-9]{30}").expect("valid regex"));

static BRACKETED_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\w+\]").expect("valid regex"));

fn non_empty(candidate: &str) -> Option<String> {
    let candidate = candidate.trim();
    (!candidate.is_empty()).then(|| candidate.to_string())
}

/// Extract the file name from a subject line
///
/// Tried in order, most specific first:
/// 1. text between the first and the last double quote
/// 2. the `[n/m] - NAME yEnc (n/m) size` layout
/// 3. the first run that looks like `name.ext`
///
/// # Example
/// ```
/// use nzb_rs::nzb::subject::extract_filename;
///
/// assert_eq!(
///     extract_filename(r#"[1/5] - "Big Buck Bunny - S01E01.mkv" yEnc (1/24) 16981056"#).as_deref(),
///     Some("Big Buck Bunny - S01E01.mkv")
/// );
/// assert_eq!(
///     extract_filename("Here's your file!  abc-mr2a.r01 (1/2)").as_deref(),
///     Some("abc-mr2a.r01")
/// );
/// assert_eq!(extract_filename("no file name"), None);
/// ```
pub fn extract_filename(subject: &str) -> Option<String> {
    [&*QUOTED, &*YENC_SUBJECT, &*FILENAME_LIKE]
        .into_iter()
        .find_map(|pattern| {
            pattern
                .captures(subject)
                .and_then(|captures| non_empty(&captures[1]))
        })
}

/// Split a file name into stem and extension (without the dot)
///
/// Only extensions of 3 to 6 characters starting with a letter count;
/// `Path::extension` has too many false positives on release names.
pub fn split_extension(name: &str) -> (&str, Option<&str>) {
    match EXTENSION.find(name) {
        Some(found) => (&name[..found.start()], Some(&name[found.start() + 1..])),
        None => (name, None),
    }
}

/// True if `name` looks like a PAR2 recovery file
pub fn name_is_par2(name: &str) -> bool {
    name.to_lowercase().ends_with(".par2")
}

/// True if `name` looks like a RAR volume (`.rar`, `.r00`, `.s00` ...)
pub fn name_is_rar(name: &str) -> bool {
    RAR.is_match(name)
}

/// Guess whether a file stem has been obfuscated
///
/// Certainly obfuscated: 32 hex digits, 40+ hex digits and dots, 30 hex
/// digits alongside two or more `[tags]`, or an `abc.xyz` prefix. Clearly
/// named: mixed case with separators, several separators, letters and a year,
/// or a capitalized mostly lowercase word. Anything else counts as
/// obfuscated.
pub fn stem_is_obfuscated(stem: &str) -> bool {
    if stem.is_empty() {
        return true;
    }

    if HEX32.is_match(stem) || HEX_DOTTED.is_match(stem) {
        return true;
    }

    if HEX30.is_match(stem) && BRACKETED_WORD.find_iter(stem).count() >= 2 {
        return true;
    }

    if stem.starts_with("abc.xyz") {
        return true;
    }

    let decimals = stem.chars().filter(|c| c.is_numeric()).count();
    let upper = stem.chars().filter(|c| c.is_uppercase()).count();
    let lower = stem.chars().filter(|c| c.is_lowercase()).count();
    let separators = stem
        .chars()
        .filter(|c| matches!(c, ' ' | '.' | '_'))
        .count();

    // "Great Distro"
    if upper >= 2 && lower >= 2 && separators >= 1 {
        return false;
    }

    // "this is a download"
    if separators >= 3 {
        return false;
    }

    // "Beast 2020"
    if upper + lower >= 4 && decimals >= 4 && separators >= 1 {
        return false;
    }

    // "Catullus"
    let starts_upper = stem.chars().next().is_some_and(char::is_uppercase);
    if starts_upper && lower > 2 && (upper as f64 / lower as f64) <= 0.25 {
        return false;
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_quoted_is_greedy() {
        assert_eq!(
            extract_filename(r#"a "b" and "c.txt" z"#).as_deref(),
            Some(r#"b" and "c.txt"#)
        );
        assert_eq!(extract_filename(r#"[1/1] - "  " yEnc"#), None);
    }

    #[test]
    fn test_extract_yenc_layout() {
        let subject = "[011/116] - [AC-FFF] Highschool DxD BorN - 02 [BD][1080p-Hi10p] FLAC][Dual-Audio][442E5446].mkv yEnc (1/2401) 1720916370";
        assert_eq!(
            extract_filename(subject).as_deref(),
            Some("[AC-FFF] Highschool DxD BorN - 02 [BD][1080p-Hi10p] FLAC][Dual-Audio][442E5446].mkv")
        );
    }

    #[test]
    fn test_extract_filename_like() {
        assert_eq!(
            extract_filename("Here's your file!  abc-mr2a.r01 (1/2)").as_deref(),
            Some("abc-mr2a.r01")
        );
        assert_eq!(extract_filename("File 1"), None);
    }

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("abc-mr2a.r01"), ("abc-mr2a", Some("r01")));
        assert_eq!(
            split_extension("Big Buck Bunny - S01E01.mkv.vol03+04.par2"),
            ("Big Buck Bunny - S01E01.mkv.vol03+04", Some("par2"))
        );
        assert_eq!(split_extension("README"), ("README", None));
        assert_eq!(split_extension("archive.7z"), ("archive.7z", None));
    }

    #[test]
    fn test_name_is_rar() {
        assert!(!name_is_rar(""));
        assert!(!name_is_rar("blah"));
        assert!(name_is_rar("blah.rar"));
        assert!(name_is_rar("blah.R07"));
        assert!(name_is_rar("blah.s12"));
        assert!(!name_is_rar("blah.par"));
        assert!(!name_is_rar("blah.r1"));
    }

    #[test]
    fn test_name_is_par2() {
        assert!(!name_is_par2(""));
        assert!(!name_is_par2("blah"));
        assert!(!name_is_par2("blah.rar"));
        assert!(name_is_par2("blah.par2"));
        assert!(name_is_par2("blah.vol01+02.PAR2"));
    }

    #[test]
    fn test_obfuscated_stems() {
        assert!(stem_is_obfuscated(""));
        assert!(stem_is_obfuscated("b082fa0beaa644d3aa01045d5b8d0b36"));
        assert!(stem_is_obfuscated(
            "0675e29e9abfd2.f7d069dab0b853283cc1b069a25f82.6547"
        ));
        assert!(stem_is_obfuscated(
            "[BlaBla] something [More] something 5937bc5e32146e.bef89a622e4a23f07b0d3757ad5e8a.a02b264e [Brrr]"
        ));
        assert!(stem_is_obfuscated("abc.xyz.a4c567edbcbf27.BLA"));
        assert!(stem_is_obfuscated("abc-mr2a"));
    }

    #[test]
    fn test_clear_stems() {
        assert!(!stem_is_obfuscated("Great Distro"));
        assert!(!stem_is_obfuscated("this is a download"));
        assert!(!stem_is_obfuscated("Beast 2020"));
        assert!(!stem_is_obfuscated("Catullus"));
        assert!(!stem_is_obfuscated("Big Buck Bunny - S01E01"));
    }
}
