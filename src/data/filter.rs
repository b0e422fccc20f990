use std::collections::BTreeMap;

use serde::Serialize;

use super::index::ImageIndex;
use super::model::{BucketTag, GroupKey, ImageGroup, ImageId, MatchConfidence};
use super::vocabulary::IdentifierToken;
use crate::error::{IndexError, Result};

// ---------------------------------------------------------------------------
// Read-only views over an ImageIndex
// ---------------------------------------------------------------------------

/// One line of [`list_groups`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub key: GroupKey,
    /// Images in member slots.
    pub member_count: usize,
    pub ungrouped_count: usize,
    /// Member slots present, in priority order.
    pub identifiers: Vec<IdentifierToken>,
    /// Member slots holding more than one image.
    pub conflicts: Vec<IdentifierToken>,
}

/// Groups in ascending numeric key order (`2` before `10`).
pub fn list_groups(index: &ImageIndex) -> Vec<GroupSummary> {
    index
        .groups()
        .map(|g| GroupSummary {
            key: g.key.clone(),
            member_count: g.members.values().map(Vec::len).sum(),
            ungrouped_count: g.ungrouped.len(),
            identifiers: g.members.keys().copied().collect(),
            conflicts: g
                .members
                .iter()
                .filter(|(_, images)| images.len() > 1)
                .map(|(identifier, _)| *identifier)
                .collect(),
        })
        .collect()
}

/// Look a group up by its key text. `"7"`, `"0007"` and `"007"` all find the
/// same group; anything that is not digits finds nothing.
pub fn filter_by_group<'a>(index: &'a ImageIndex, key: &str) -> Option<&'a ImageGroup> {
    GroupKey::new(key.trim()).and_then(|k| index.group(&k))
}

/// Like [`filter_by_group`], reporting a missing group as an error.
pub fn require_group<'a>(index: &'a ImageIndex, key: &str) -> Result<&'a ImageGroup> {
    filter_by_group(index, key).ok_or_else(|| IndexError::UnknownGroup(key.to_string()))
}

/// Every grouped image of one type, in group order. Member slots come before
/// the group's ungrouped images.
pub fn filter_by_type(index: &ImageIndex, identifier: IdentifierToken) -> Vec<(GroupKey, ImageId)> {
    index
        .groups()
        .flat_map(|g| {
            g.members_of(identifier)
                .iter()
                .chain(g.ungrouped.iter().filter(move |e| e.parsed.identifier == Some(identifier)))
                .map(move |e| (g.key.clone(), e.id))
        })
        .collect()
}

/// Images without a group key, for one bucket tag.
pub fn unmatched(index: &ImageIndex, tag: BucketTag) -> Vec<ImageId> {
    index.unmatched().get(tag).iter().map(|e| e.id).collect()
}

/// Case-insensitive substring search over filenames, identifier names and
/// group keys.
pub fn search(index: &ImageIndex, query: &str) -> Vec<ImageId> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return index.entries().map(|e| e.id).collect();
    }
    index
        .entries()
        .filter(|e| {
            let p = &e.parsed;
            p.raw_name.to_lowercase().contains(&query)
                || p.identifier
                    .is_some_and(|t| t.name().to_lowercase().contains(&query))
                || p.group_key
                    .as_ref()
                    .is_some_and(|k| k.display().contains(&query))
        })
        .map(|e| e.id)
        .collect()
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndexStatistics {
    pub total_images: usize,
    pub total_groups: usize,
    /// Images per identifier, grouped or not.
    pub per_type_counts: BTreeMap<IdentifierToken, usize>,
    /// Grouped images without an identifier.
    pub unclassified: usize,
    /// Images with neither group key nor identifier.
    pub unknown: usize,
    pub ambiguous: usize,
    /// Member slots holding more than one image.
    pub conflicting_slots: usize,
}

/// Computed from scratch on every call.
pub fn statistics(index: &ImageIndex) -> IndexStatistics {
    let mut stats = IndexStatistics {
        total_images: index.len(),
        total_groups: index.group_count(),
        ..Default::default()
    };

    for entry in index.entries() {
        if let Some(identifier) = entry.parsed.identifier {
            *stats.per_type_counts.entry(identifier).or_default() += 1;
        }
        if entry.parsed.confidence == MatchConfidence::Ambiguous {
            stats.ambiguous += 1;
        }
    }
    for group in index.groups() {
        stats.unclassified += group.unclassified().count();
        stats.conflicting_slots += group.members.values().filter(|s| s.len() > 1).count();
    }
    stats.unknown = index.unmatched().get(BucketTag::Unknown).len();

    stats
}
