use std::ops::Range;

use super::model::{GroupKey, MatchConfidence, ParsedFilename};
use super::vocabulary::{self, IdentifierToken, TokenMatch};

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Read the group key and acquisition type out of an image filename.
///
/// Never fails: names without a recognisable identifier or number come back
/// with the corresponding fields unset and `MatchConfidence::None`.
///
/// ```text
///  "NiCoCr_48h_0001_1_PDBSE1(COMP).tif"  →  group 0001, PDBSE, Exact
///  "Co K_alpha_1 Map Data 3.tif"         →  group 3,    Map,   Exact
///  "0002 UD BSE.tif"                     →  group 0002, UD,    Ambiguous
///  "0003.tif"                            →  group 0003, –,     None
/// ```
pub fn parse(filename: &str) -> ParsedFilename {
    let stem = file_stem(filename);
    let words = split_words(stem);
    let matches = vocabulary::scan(stem);

    let mut candidates: Vec<IdentifierToken> = Vec::new();
    for m in &matches {
        if !candidates.contains(&m.token) {
            candidates.push(m.token);
        }
    }
    let confidence = match candidates.len() {
        0 => MatchConfidence::None,
        1 => MatchConfidence::Exact,
        _ => MatchConfidence::Ambiguous,
    };

    // Leftmost match wins.
    let resolved = matches.first().and_then(|m| IdentifierSpan::locate(m, &words));
    let group_key = group_digits(stem, &words, resolved.as_ref()).and_then(GroupKey::new);

    ParsedFilename {
        group_key,
        identifier: matches.first().map(|m| m.token),
        raw_name: filename.to_string(),
        confidence,
        matched_text: matches.first().map(|m| stem[m.start..m.end].to_string()),
        candidates,
    }
}

// ---------------------------------------------------------------------------
// Stem and word splitting
// ---------------------------------------------------------------------------

/// Drop any directory part and a trailing alphanumeric extension.
fn file_stem(filename: &str) -> &str {
    let name = filename
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(filename);
    match name.rfind('.') {
        Some(dot) if dot > 0 && is_extension(&name[dot + 1..]) => &name[..dot],
        _ => name,
    }
}

fn is_extension(ext: &str) -> bool {
    !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric())
}

/// A separator-delimited piece of the stem. `start..end` is a byte range.
#[derive(Debug, Clone, Copy)]
struct Word<'a> {
    text: &'a str,
    start: usize,
    end: usize,
}

impl Word<'_> {
    fn is_digits(&self) -> bool {
        !self.text.is_empty() && self.text.bytes().all(|b| b.is_ascii_digit())
    }
}

fn split_words(stem: &str) -> Vec<Word<'_>> {
    let mut words = Vec::new();
    let mut start = None;
    for (i, c) in stem.char_indices() {
        if vocabulary::is_separator(c) {
            if let Some(s) = start.take() {
                words.push(Word { text: &stem[s..i], start: s, end: i });
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        words.push(Word { text: &stem[s..], start: s, end: stem.len() });
    }
    words
}

/// The words covered by the resolved identifier (two for `Electron Image`).
struct IdentifierSpan {
    token: IdentifierToken,
    first: usize,
    last: usize,
}

impl IdentifierSpan {
    fn locate(m: &TokenMatch, words: &[Word<'_>]) -> Option<Self> {
        let word_at = |byte: usize| words.iter().position(|w| w.start <= byte && byte < w.end);
        Some(IdentifierSpan {
            token: m.token,
            first: word_at(m.start)?,
            last: word_at(m.end.saturating_sub(1))?,
        })
    }
}

// ---------------------------------------------------------------------------
// Group key extraction
// ---------------------------------------------------------------------------

/// Pick the digits that name the image's group.
///
/// Naming conventions of the acquisition software are tried first; the first
/// free digit run in the stem is the fallback. Digits inside the identifier's
/// own word (`PDBSE1`) never count.
fn group_digits<'a>(
    stem: &'a str,
    words: &[Word<'a>],
    resolved: Option<&IdentifierSpan>,
) -> Option<&'a str> {
    let Some(span) = resolved else {
        return first_digit_run(stem, None);
    };

    let by_convention = if span.token.groupable() {
        // 0001 UD | 0001_1_PDBSE | Sample ABF 0100
        digits_before(words, span.first).or_else(|| digits_after(words, span.last, false))
    } else if span.token.is_map_like() {
        // Co K_alpha_1 Map Data 3 | Electron Image 3_1
        digits_after(words, span.last, true).or_else(|| trailing_digits(stem, words))
    } else {
        // Spectrum 5
        trailing_digits(stem, words)
    };

    by_convention.or_else(|| {
        let own_words = words[span.first].start..words[span.last].end;
        first_digit_run(stem, Some(own_words))
    })
}

fn digits_before<'a>(words: &[Word<'a>], first: usize) -> Option<&'a str> {
    let prev = words[..first].last().filter(|w| w.is_digits())?;
    // A four-digit key followed by a tile index: `0001_2_UD`.
    if first >= 2 {
        let farther = &words[first - 2];
        if farther.is_digits() && farther.text.len() == 4 {
            return Some(farther.text);
        }
    }
    Some(prev.text)
}

fn digits_after<'a>(words: &[Word<'a>], last: usize, skip_words: bool) -> Option<&'a str> {
    let mut after = words[last + 1..].iter();
    let found = if skip_words {
        after.find(|w| w.is_digits())
    } else {
        after.next().filter(|w| w.is_digits())
    };
    found.map(|w| w.text)
}

/// The final number of the stem; in `3_1` the `1` is a tile index and `3` wins.
fn trailing_digits<'a>(stem: &str, words: &[Word<'a>]) -> Option<&'a str> {
    let (last, rest) = words.split_last()?;
    if !last.is_digits() {
        return None;
    }
    if let Some(prev) = rest.last() {
        if prev.is_digits() && &stem[prev.end..last.start] == "_" {
            return Some(prev.text);
        }
    }
    Some(last.text)
}

fn first_digit_run(stem: &str, exclude: Option<Range<usize>>) -> Option<&str> {
    let bytes = stem.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if !bytes[i].is_ascii_digit() {
            i += 1;
            continue;
        }
        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if !exclude.as_ref().is_some_and(|r| r.contains(&start)) {
            return Some(&stem[start..i]);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use IdentifierToken::*;

    fn summary(name: &str) -> (Option<String>, Option<IdentifierToken>, MatchConfidence) {
        let p = parse(name);
        (
            p.group_key.map(|k| k.display().to_string()),
            p.identifier,
            p.confidence,
        )
    }

    fn exact(group: &str, token: IdentifierToken) -> (Option<String>, Option<IdentifierToken>, MatchConfidence) {
        (Some(group.to_string()), Some(token), MatchConfidence::Exact)
    }

    #[test]
    fn number_then_detector() {
        for (name, group) in [("0007 UD.tif", "0007"), ("0123 UD.png", "0123"), ("1 UD.jpg", "1")] {
            assert_eq!(summary(name), exact(group, Ud), "{name}");
        }
        assert_eq!(summary("0025_BSE.tif"), exact("0025", Bse));
        assert_eq!(summary("0001-LD.tif"), exact("0001", Ld));
    }

    #[test]
    fn number_after_detector() {
        assert_eq!(summary("Sample ABF 0100.tif"), exact("0100", Abf));
    }

    #[test]
    fn longest_token_wins() {
        assert_eq!(summary("0001 PDBSE.tif"), exact("0001", Pdbse));
        assert_eq!(summary("0001 UVD.tif"), exact("0001", Uvd));
    }

    #[test]
    fn ambiguous_names_take_the_leftmost_token() {
        let p = parse("0002 UD BSE.tif");
        assert_eq!(p.confidence, MatchConfidence::Ambiguous);
        assert_eq!(p.identifier, Some(Ud));
        assert_eq!(p.candidates, vec![Ud, Bse]);
        assert_eq!(p.group_key.unwrap().display(), "0002");
    }

    #[test]
    fn repeated_token_stays_exact() {
        let p = parse("UD 0004 UD.tif");
        assert_eq!(p.confidence, MatchConfidence::Exact);
        assert_eq!(p.candidates, vec![Ud]);
    }

    #[test]
    fn instrument_export_names() {
        assert_eq!(summary("NiCoCr_HT1250c_48h_0001_1_PDBSE1(COMP).tif"), exact("0001", Pdbse));
        assert_eq!(summary("NiCoCr_HT1250c_48h_0001_2_UD.tif"), exact("0001", Ud));
        assert_eq!(summary("NiCoCr_HT1250c_48h_0003_2_UDmod2.tif"), exact("0003", Ud));
        assert_eq!(summary("NiCoCr_HT1250c_48h_0003_1_PDBSE1(COMP) mod.tif"), exact("0003", Pdbse));
    }

    #[test]
    fn maps_and_electron_images_use_the_number_after_them() {
        assert_eq!(summary("Co K_alpha_1 Map Data 1.tif"), exact("1", Map));
        assert_eq!(summary("Cr K_alpha_1 Map Data 2.tif"), exact("2", Map));
        assert_eq!(summary("Electron Image 3_1.tif"), exact("3", ElectronImage));
        assert_eq!(summary("Electron Image 4.tif"), exact("4", ElectronImage));
    }

    #[test]
    fn spectra_use_the_trailing_number() {
        assert_eq!(summary("Spectrum 5.tiff"), exact("5", Spectrum));
        assert_eq!(summary("Spectra_12_1.png"), exact("12", Spectra));
    }

    #[test]
    fn fallback_to_first_free_digit_run() {
        assert_eq!(summary("0005 Map.tif"), exact("0005", Map));
        assert_eq!(summary("UD sample 0003 overview.tif"), exact("0003", Ud));
        assert_eq!(summary("0004 Spectrum.tif"), exact("0004", Spectrum));
    }

    #[test]
    fn digits_inside_the_identifier_word_are_ignored() {
        assert_eq!(summary("PDBSE1(COMP).tif"), (None, Some(Pdbse), MatchConfidence::Exact));
    }

    #[test]
    fn number_without_identifier() {
        assert_eq!(summary("0003.tif"), (Some("0003".into()), None, MatchConfidence::None));
    }

    #[test]
    fn identifier_without_number() {
        assert_eq!(summary("Spectrum.tif"), (None, Some(Spectrum), MatchConfidence::Exact));
        assert_eq!(summary("overview_BSE.tif"), (None, Some(Bse), MatchConfidence::Exact));
    }

    #[test]
    fn degenerate_inputs() {
        assert_eq!(summary(""), (None, None, MatchConfidence::None));
        assert_eq!(summary(".tif"), (None, None, MatchConfidence::None));
        assert_eq!(summary("___"), (None, None, MatchConfidence::None));
        assert_eq!(summary("holiday photo.jpg"), (None, None, MatchConfidence::None));
    }

    #[test]
    fn keeps_raw_name_and_matched_text() {
        let p = parse("/data/run 2/0001 ud.tif");
        assert_eq!(p.raw_name, "/data/run 2/0001 ud.tif");
        assert_eq!(p.matched_text.as_deref(), Some("ud"));
        assert_eq!(p.group_key.unwrap().display(), "0001");
    }

    #[test]
    fn stem_only_strips_real_extensions() {
        assert_eq!(file_stem("0001 UD.tif"), "0001 UD");
        assert_eq!(file_stem("C:\\scans\\0001 UD.tif"), "0001 UD");
        assert_eq!(file_stem("Sample 1.5 UD"), "Sample 1.5 UD");
        assert_eq!(file_stem(".hidden"), ".hidden");
    }
}
