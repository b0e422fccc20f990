use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::IndexError;

// ---------------------------------------------------------------------------
// IdentifierToken – the acquisition types recognised in filenames
// ---------------------------------------------------------------------------

/// A recognised acquisition type (detector, signal or analysis product).
///
/// Variant order is the display priority used when images of one group are
/// laid out together: detectors first, then maps, then spectra.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IdentifierToken {
    #[serde(rename = "UD")]
    Ud,
    #[serde(rename = "LD")]
    Ld,
    #[serde(rename = "MD")]
    Md,
    #[serde(rename = "UVD")]
    Uvd,
    #[serde(rename = "PDBSE")]
    Pdbse,
    #[serde(rename = "BSE")]
    Bse,
    #[serde(rename = "SE")]
    Se,
    #[serde(rename = "ABF")]
    Abf,
    #[serde(rename = "ADF")]
    Adf,
    #[serde(rename = "Spectrum")]
    Spectrum,
    #[serde(rename = "Spectra")]
    Spectra,
    #[serde(rename = "Map")]
    Map,
    #[serde(rename = "Maps")]
    Maps,
    #[serde(rename = "Electron Image")]
    ElectronImage,
}

/// Every recognised token, in priority order.
pub const VOCABULARY: [IdentifierToken; 14] = [
    IdentifierToken::Ud,
    IdentifierToken::Ld,
    IdentifierToken::Md,
    IdentifierToken::Uvd,
    IdentifierToken::Pdbse,
    IdentifierToken::Bse,
    IdentifierToken::Se,
    IdentifierToken::Abf,
    IdentifierToken::Adf,
    IdentifierToken::Spectrum,
    IdentifierToken::Spectra,
    IdentifierToken::Map,
    IdentifierToken::Maps,
    IdentifierToken::ElectronImage,
];

/// The same tokens ordered by name length, longest first. A scan tries them
/// in this order so `PDBSE` wins over `BSE` and `UVD` over `UD`.
const LONGEST_FIRST: [IdentifierToken; 14] = [
    IdentifierToken::ElectronImage,
    IdentifierToken::Spectrum,
    IdentifierToken::Spectra,
    IdentifierToken::Pdbse,
    IdentifierToken::Maps,
    IdentifierToken::Uvd,
    IdentifierToken::Bse,
    IdentifierToken::Abf,
    IdentifierToken::Adf,
    IdentifierToken::Map,
    IdentifierToken::Ud,
    IdentifierToken::Ld,
    IdentifierToken::Md,
    IdentifierToken::Se,
];

impl IdentifierToken {
    /// Canonical spelling, as it appears in filenames and in saved state.
    pub const fn name(self) -> &'static str {
        match self {
            IdentifierToken::Ud => "UD",
            IdentifierToken::Ld => "LD",
            IdentifierToken::Md => "MD",
            IdentifierToken::Uvd => "UVD",
            IdentifierToken::Pdbse => "PDBSE",
            IdentifierToken::Bse => "BSE",
            IdentifierToken::Se => "SE",
            IdentifierToken::Abf => "ABF",
            IdentifierToken::Adf => "ADF",
            IdentifierToken::Spectrum => "Spectrum",
            IdentifierToken::Spectra => "Spectra",
            IdentifierToken::Map => "Map",
            IdentifierToken::Maps => "Maps",
            IdentifierToken::ElectronImage => "Electron Image",
        }
    }

    /// Whether images of this type are clustered into numbered group slots.
    pub const fn groupable(self) -> bool {
        !matches!(
            self,
            IdentifierToken::Spectrum
                | IdentifierToken::Spectra
                | IdentifierToken::Map
                | IdentifierToken::Maps
                | IdentifierToken::ElectronImage
        )
    }

    pub const fn is_spectrum(self) -> bool {
        matches!(self, IdentifierToken::Spectrum | IdentifierToken::Spectra)
    }

    /// Elemental maps and the electron image they were acquired over.
    pub const fn is_map_like(self) -> bool {
        matches!(
            self,
            IdentifierToken::Map | IdentifierToken::Maps | IdentifierToken::ElectronImage
        )
    }
}

impl fmt::Display for IdentifierToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for IdentifierToken {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        lookup(s).ok_or_else(|| IndexError::UnknownIdentifier(s.to_string()))
    }
}

/// Case-insensitive lookup of a whole token by its canonical name.
pub fn lookup(token: &str) -> Option<IdentifierToken> {
    let token = token.trim();
    VOCABULARY
        .iter()
        .copied()
        .find(|t| names_match(token, t.name()))
}

// ---------------------------------------------------------------------------
// Scanner – find vocabulary tokens embedded in a filename stem
// ---------------------------------------------------------------------------

/// One vocabulary hit inside a stem. `start..end` is a byte range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenMatch {
    pub token: IdentifierToken,
    pub start: usize,
    pub end: usize,
}

/// Word separators in filenames.
pub fn is_separator(c: char) -> bool {
    c.is_whitespace() || c == '_' || c == '-'
}

/// Scan `stem` left to right and return every token match in order.
///
/// A token may only start at the beginning of a word. At each word start the
/// longest matching token wins and the scan continues after it.
pub fn scan(stem: &str) -> Vec<TokenMatch> {
    let mut matches = Vec::new();
    let mut pos = 0;

    while pos < stem.len() {
        let at_word_start = pos == 0 || stem[..pos].chars().next_back().is_some_and(is_separator);
        if at_word_start {
            if let Some(m) = match_at(stem, pos) {
                pos = m.end;
                matches.push(m);
                continue;
            }
        }
        pos += stem[pos..].chars().next().map_or(1, char::len_utf8);
    }

    matches
}

fn match_at(stem: &str, pos: usize) -> Option<TokenMatch> {
    let rest = &stem[pos..];
    LONGEST_FIRST.iter().copied().find_map(|token| {
        let name = token.name();
        let candidate = rest.get(..name.len())?;
        if !names_match(candidate, name) {
            return None;
        }
        if !right_boundary(candidate == name, &rest[name.len()..]) {
            return None;
        }
        Some(TokenMatch {
            token,
            start: pos,
            end: pos + name.len(),
        })
    })
}

/// ASCII case-insensitive comparison where a space in `name` accepts any
/// separator, so `Electron_Image` reads as `Electron Image`.
fn names_match(candidate: &str, name: &str) -> bool {
    candidate.len() == name.len()
        && candidate
            .bytes()
            .zip(name.bytes())
            .all(|(c, n)| match n {
                b' ' => is_separator(c as char),
                _ => c.eq_ignore_ascii_case(&n),
            })
}

/// What may follow a token. Lowercase suffixes (`UDmod2`) are only accepted
/// when the token itself is written in canonical case, otherwise `Series`
/// would read as `SE`. The cost is that an all-lowercase `udmod` has no type;
/// a fully case-insensitive suffix rule would read it as UD.
fn right_boundary(canonical_case: bool, tail: &str) -> bool {
    match tail.chars().next() {
        None => true,
        Some(c) if is_separator(c) || c.is_ascii_digit() || matches!(c, '(' | ')' | '.') => true,
        Some(c) => canonical_case && c.is_ascii_lowercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(stem: &str) -> Vec<IdentifierToken> {
        scan(stem).into_iter().map(|m| m.token).collect()
    }

    #[test]
    fn longest_first_is_a_length_ordered_permutation() {
        let lengths: Vec<usize> = LONGEST_FIRST.iter().map(|t| t.name().len()).collect();
        assert!(lengths.windows(2).all(|w| w[0] >= w[1]));

        let mut a = LONGEST_FIRST.to_vec();
        let mut b = VOCABULARY.to_vec();
        a.sort();
        b.sort();
        assert_eq!(a, b);
    }

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(lookup("ud"), Some(IdentifierToken::Ud));
        assert_eq!(lookup("SPECTRUM"), Some(IdentifierToken::Spectrum));
        assert_eq!(lookup(" pdbse "), Some(IdentifierToken::Pdbse));
        assert_eq!(lookup("electron_image"), Some(IdentifierToken::ElectronImage));
        assert_eq!(lookup("HAADF"), None);
        assert_eq!(lookup(""), None);
    }

    #[test]
    fn groupable_flags() {
        let groupable: Vec<&str> = VOCABULARY
            .iter()
            .filter(|t| t.groupable())
            .map(|t| t.name())
            .collect();
        assert_eq!(
            groupable,
            ["UD", "LD", "MD", "UVD", "PDBSE", "BSE", "SE", "ABF", "ADF"]
        );
    }

    #[test]
    fn longest_match_wins() {
        assert_eq!(tokens("0001 PDBSE"), [IdentifierToken::Pdbse]);
        assert_eq!(tokens("0001 UVD"), [IdentifierToken::Uvd]);
        assert_eq!(tokens("Maps 2"), [IdentifierToken::Maps]);
        assert_eq!(tokens("Spectra_7"), [IdentifierToken::Spectra]);
    }

    #[test]
    fn tokens_need_a_word_start() {
        assert!(tokens("0001BSE").is_empty());
        assert!(tokens("Old sample").is_empty());
        assert_eq!(tokens("x-BSE"), [IdentifierToken::Bse]);
    }

    #[test]
    fn right_boundary_rules() {
        assert_eq!(tokens("PDBSE1(COMP)"), [IdentifierToken::Pdbse]);
        assert_eq!(tokens("0003_2_UDmod2"), [IdentifierToken::Ud]);
        assert!(tokens("Sample Series 3").is_empty());
        assert!(tokens("0001 sem").is_empty());
        assert!(tokens("UDX").is_empty());
    }

    #[test]
    fn multi_word_token() {
        let m = scan("Electron Image 3_1");
        assert_eq!(m.len(), 1);
        assert_eq!(m[0].token, IdentifierToken::ElectronImage);
        assert_eq!((m[0].start, m[0].end), (0, 14));
    }

    #[test]
    fn reports_every_match_in_order() {
        assert_eq!(
            tokens("0002 UD BSE"),
            [IdentifierToken::Ud, IdentifierToken::Bse]
        );
    }

    #[test]
    fn lowercase_suffix_needs_canonical_case() {
        assert_eq!(tokens("0001 UDmod"), [IdentifierToken::Ud]);
        assert!(tokens("0001 udmod").is_empty());
        assert!(tokens("Series 0001").is_empty());
        assert_eq!(tokens("0001 ud"), [IdentifierToken::Ud]);
    }

    #[test]
    fn non_ascii_does_not_split_characters() {
        assert_eq!(tokens("échantillon µ UD"), [IdentifierToken::Ud]);
    }
}
