use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use super::vocabulary::IdentifierToken;
use crate::error::IndexError;

/// Width group labels are zero-padded to when typed in by hand (`7` → `0007`).
pub const LABEL_WIDTH: usize = 4;

// ---------------------------------------------------------------------------
// ImageId – caller-assigned handle for one indexed image
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(pub u64);

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// GroupKey – numeric cluster key read from a filename
// ---------------------------------------------------------------------------

/// A run of digits taken from a filename.
///
/// The text is kept as written (`0007`) for display; identity and ordering use
/// the value with leading zeros stripped, so `0007` and `7` are the same group
/// and `2` sorts before `10`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GroupKey {
    display: String,
    normalized: String,
}

impl GroupKey {
    /// `None` unless `digits` is a non-empty run of ASCII digits.
    pub fn new(digits: &str) -> Option<Self> {
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let trimmed = digits.trim_start_matches('0');
        let normalized = if trimmed.is_empty() { "0" } else { trimmed };
        Some(GroupKey {
            display: digits.to_string(),
            normalized: normalized.to_string(),
        })
    }

    /// Parse a hand-typed group label.
    ///
    /// Accepts plain digits (`7`, `0007`) and the formatted slide labels
    /// (`MAP7`, `SPEC7`); digits are padded to `width`. A blank label means
    /// "no group" and yields `Ok(None)`.
    pub fn from_label(label: &str, width: usize) -> Result<Option<Self>, IndexError> {
        let label = label.trim();
        if label.is_empty() {
            return Ok(None);
        }
        let digits = strip_prefix_ignore_case(label, "MAP")
            .or_else(|| strip_prefix_ignore_case(label, "SPEC"))
            .unwrap_or(label);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(IndexError::InvalidGroupLabel(label.to_string()));
        }
        Ok(GroupKey::new(&format!("{digits:0>width$}")))
    }

    /// The digits as they appeared in the filename.
    pub fn display(&self) -> &str {
        &self.display
    }

    /// Leading zeros stripped; `"0"` for an all-zero key.
    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    /// Numeric value, when it fits in a `u64`.
    pub fn value(&self) -> Option<u64> {
        self.normalized.parse().ok()
    }
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &s[prefix.len()..])
}

// -- Identity and order follow the normalized digits --

impl PartialEq for GroupKey {
    fn eq(&self, other: &Self) -> bool {
        self.normalized == other.normalized
    }
}

impl Eq for GroupKey {}

impl Hash for GroupKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized.hash(state);
    }
}

impl PartialOrd for GroupKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GroupKey {
    // Without leading zeros a shorter digit string is always the smaller number,
    // which also holds for keys too long for any integer type.
    fn cmp(&self, other: &Self) -> Ordering {
        self.normalized
            .len()
            .cmp(&other.normalized.len())
            .then_with(|| self.normalized.cmp(&other.normalized))
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

impl TryFrom<String> for GroupKey {
    type Error = IndexError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        GroupKey::new(&value).ok_or(IndexError::InvalidGroupLabel(value))
    }
}

impl From<GroupKey> for String {
    fn from(key: GroupKey) -> Self {
        key.display
    }
}

// ---------------------------------------------------------------------------
// ParsedFilename – what one filename says about its image
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchConfidence {
    /// Exactly one distinct identifier in the name.
    Exact,
    /// Several different identifiers; the leftmost one was used.
    Ambiguous,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedFilename {
    pub group_key: Option<GroupKey>,
    pub identifier: Option<IdentifierToken>,
    pub raw_name: String,
    pub confidence: MatchConfidence,
    /// The slice of the name the identifier was read from (`PDBSE`, `ud`).
    #[serde(default)]
    pub matched_text: Option<String>,
    /// Every distinct identifier found, in filename order.
    #[serde(default)]
    pub candidates: Vec<IdentifierToken>,
}

// ---------------------------------------------------------------------------
// ImageEntry / ImageGroup / UnmatchedBucket – the filed records
// ---------------------------------------------------------------------------

/// One image as the index stores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageEntry {
    pub id: ImageId,
    pub parsed: ParsedFilename,
}

impl ImageEntry {
    pub fn filename(&self) -> &str {
        &self.parsed.raw_name
    }
}

/// All images sharing one normalized group key.
#[derive(Debug, Clone)]
pub struct ImageGroup {
    /// The key as first seen in this group.
    pub key: GroupKey,
    /// Groupable types; every image of a type is kept, in insertion order.
    pub members: BTreeMap<IdentifierToken, Vec<ImageEntry>>,
    /// Non-groupable types (maps, spectra) and unclassified images.
    pub ungrouped: Vec<ImageEntry>,
}

impl ImageGroup {
    pub fn new(key: GroupKey) -> Self {
        ImageGroup {
            key,
            members: BTreeMap::new(),
            ungrouped: Vec::new(),
        }
    }

    pub fn members_of(&self, identifier: IdentifierToken) -> &[ImageEntry] {
        self.members.get(&identifier).map_or(&[], Vec::as_slice)
    }

    /// Images filed without an identifier.
    pub fn unclassified(&self) -> impl Iterator<Item = &ImageEntry> + '_ {
        self.ungrouped.iter().filter(|e| e.parsed.identifier.is_none())
    }

    /// Members slot by slot, then the ungrouped images.
    pub fn entries(&self) -> impl Iterator<Item = &ImageEntry> + '_ {
        self.members.values().flatten().chain(self.ungrouped.iter())
    }

    pub fn len(&self) -> usize {
        self.members.values().map(Vec::len).sum::<usize>() + self.ungrouped.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.values().all(Vec::is_empty) && self.ungrouped.is_empty()
    }
}

/// Key of the unmatched bucket: the identifier if one was found, else `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BucketTag {
    Identifier(IdentifierToken),
    Unknown,
}

impl BucketTag {
    pub fn identifier(self) -> Option<IdentifierToken> {
        match self {
            BucketTag::Identifier(token) => Some(token),
            BucketTag::Unknown => None,
        }
    }
}

impl From<Option<IdentifierToken>> for BucketTag {
    fn from(identifier: Option<IdentifierToken>) -> Self {
        identifier.map_or(BucketTag::Unknown, BucketTag::Identifier)
    }
}

impl fmt::Display for BucketTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BucketTag::Identifier(token) => write!(f, "{token}"),
            BucketTag::Unknown => f.write_str("unknown"),
        }
    }
}

/// Images that have no group key.
#[derive(Debug, Clone, Default)]
pub struct UnmatchedBucket {
    pub entries: BTreeMap<BucketTag, Vec<ImageEntry>>,
}

impl UnmatchedBucket {
    pub fn get(&self, tag: BucketTag) -> &[ImageEntry] {
        self.entries.get(&tag).map_or(&[], Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ImageEntry> + '_ {
        self.entries.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.values().all(Vec::is_empty)
    }
}

// ---------------------------------------------------------------------------
// Placement / InsertOutcome – where an image was filed
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// `groups[group].members[identifier]`
    Member {
        group: GroupKey,
        identifier: IdentifierToken,
    },
    /// `groups[group].ungrouped`; `identifier == None` is "unclassified".
    Ungrouped {
        group: GroupKey,
        identifier: Option<IdentifierToken>,
    },
    Unmatched(BucketTag),
}

impl Placement {
    /// Where a parse result belongs.
    pub fn for_parsed(parsed: &ParsedFilename) -> Self {
        match (&parsed.group_key, parsed.identifier) {
            (Some(group), Some(identifier)) if identifier.groupable() => Placement::Member {
                group: group.clone(),
                identifier,
            },
            (Some(group), identifier) => Placement::Ungrouped {
                group: group.clone(),
                identifier,
            },
            (None, identifier) => Placement::Unmatched(identifier.into()),
        }
    }

    pub fn group(&self) -> Option<&GroupKey> {
        match self {
            Placement::Member { group, .. } | Placement::Ungrouped { group, .. } => Some(group),
            Placement::Unmatched(_) => None,
        }
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Placement::Member { group, identifier } => write!(f, "group {group} / {identifier}"),
            Placement::Ungrouped {
                group,
                identifier: Some(identifier),
            } => write!(f, "group {group} / ungrouped {identifier}"),
            Placement::Ungrouped {
                group,
                identifier: None,
            } => write!(f, "group {group} / unclassified"),
            Placement::Unmatched(tag) => write!(f, "unmatched / {tag}"),
        }
    }
}

/// Result of filing one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertOutcome {
    pub placement: Placement,
    /// The member slot already held an image of the same type.
    pub conflict: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> GroupKey {
        GroupKey::new(s).unwrap()
    }

    #[test]
    fn group_key_normalizes_leading_zeros() {
        let k = key("0007");
        assert_eq!(k.display(), "0007");
        assert_eq!(k.normalized(), "7");
        assert_eq!(k.value(), Some(7));
        assert_eq!(k, key("7"));
        assert_eq!(key("0000").normalized(), "0");
    }

    #[test]
    fn group_key_rejects_non_digits() {
        assert!(GroupKey::new("").is_none());
        assert!(GroupKey::new("12a").is_none());
        assert!(GroupKey::new("-1").is_none());
    }

    #[test]
    fn group_keys_order_numerically() {
        let mut keys = vec![key("0010"), key("0002"), key("9"), key("100")];
        keys.sort();
        let shown: Vec<&str> = keys.iter().map(GroupKey::display).collect();
        assert_eq!(shown, ["0002", "9", "0010", "100"]);

        let huge = key("123456789012345678901234567890");
        assert!(huge > key("99999999999999999999"));
        assert_eq!(huge.value(), None);
    }

    #[test]
    fn group_key_from_label() {
        assert_eq!(GroupKey::from_label("7", 4).unwrap().unwrap().display(), "0007");
        assert_eq!(GroupKey::from_label("map3", 4).unwrap().unwrap().display(), "0003");
        assert_eq!(GroupKey::from_label("SPEC12", 4).unwrap().unwrap().display(), "0012");
        assert_eq!(GroupKey::from_label("12345", 4).unwrap().unwrap().display(), "12345");
        assert_eq!(GroupKey::from_label("  ", 4).unwrap(), None);
        assert_eq!(
            GroupKey::from_label("Sample-A", 4),
            Err(IndexError::InvalidGroupLabel("Sample-A".into()))
        );
        assert!(GroupKey::from_label("MAP", 4).is_err());
    }

    #[test]
    fn group_key_serializes_as_display_text() {
        let json = serde_json::to_string(&key("0042")).unwrap();
        assert_eq!(json, "\"0042\"");
        let back: GroupKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back.display(), "0042");
        assert!(serde_json::from_str::<GroupKey>("\"4x\"").is_err());
    }

    fn parsed(group: Option<&str>, identifier: Option<IdentifierToken>) -> ParsedFilename {
        ParsedFilename {
            group_key: group.map(key),
            identifier,
            raw_name: "x.tif".into(),
            confidence: MatchConfidence::Exact,
            matched_text: None,
            candidates: Vec::new(),
        }
    }

    #[test]
    fn placement_table() {
        use IdentifierToken::*;

        assert_eq!(
            Placement::for_parsed(&parsed(Some("1"), Some(Ud))),
            Placement::Member { group: key("1"), identifier: Ud }
        );
        assert_eq!(
            Placement::for_parsed(&parsed(Some("5"), Some(Map))),
            Placement::Ungrouped { group: key("5"), identifier: Some(Map) }
        );
        assert_eq!(
            Placement::for_parsed(&parsed(Some("3"), None)),
            Placement::Ungrouped { group: key("3"), identifier: None }
        );
        assert_eq!(
            Placement::for_parsed(&parsed(None, Some(Spectrum))),
            Placement::Unmatched(BucketTag::Identifier(Spectrum))
        );
        assert_eq!(
            Placement::for_parsed(&parsed(None, None)),
            Placement::Unmatched(BucketTag::Unknown)
        );
    }

    #[test]
    fn placement_display() {
        let p = Placement::Ungrouped { group: key("0003"), identifier: None };
        assert_eq!(p.to_string(), "group 0003 / unclassified");
        assert_eq!(Placement::Unmatched(BucketTag::Unknown).to_string(), "unmatched / unknown");
    }
}
