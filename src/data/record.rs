use std::collections::HashSet;

use log::info;
use serde::{Deserialize, Serialize};

use super::index::ImageIndex;
use super::model::{BucketTag, GroupKey, ImageEntry, Placement};
use super::vocabulary::IdentifierToken;
use crate::error::{IndexError, Result};

/// Bumped whenever the layout of [`IndexState`] changes.
pub const STATE_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// IndexState – the persisted form of an ImageIndex
// ---------------------------------------------------------------------------

/// Serializable snapshot of an index.
///
/// ```json
/// {
///   "version": 1,
///   "groups": [
///     { "key": "0001",
///       "members": [ { "identifier": "UD", "images": [ { "id": 1, "parsed": {..} } ] } ],
///       "ungrouped": [] }
///   ],
///   "unmatched": [ { "identifier": null, "images": [..] } ]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexState {
    pub version: u32,
    pub groups: Vec<GroupRecord>,
    pub unmatched: Vec<BucketRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub key: GroupKey,
    pub members: Vec<SlotRecord>,
    pub ungrouped: Vec<ImageEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotRecord {
    pub identifier: IdentifierToken,
    pub images: Vec<ImageEntry>,
}

/// One tag of the unmatched bucket; `identifier: None` is "unknown".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketRecord {
    pub identifier: Option<IdentifierToken>,
    pub images: Vec<ImageEntry>,
}

impl Default for IndexState {
    fn default() -> Self {
        IndexState {
            version: STATE_VERSION,
            groups: Vec::new(),
            unmatched: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Export / import
// ---------------------------------------------------------------------------

impl ImageIndex {
    /// Snapshot every group and bucket, keeping slot order.
    pub fn export_state(&self) -> IndexState {
        let groups = self
            .groups()
            .map(|g| GroupRecord {
                key: g.key.clone(),
                members: g
                    .members
                    .iter()
                    .map(|(identifier, images)| SlotRecord {
                        identifier: *identifier,
                        images: images.clone(),
                    })
                    .collect(),
                ungrouped: g.ungrouped.clone(),
            })
            .collect();

        let unmatched = self
            .unmatched
            .entries
            .iter()
            .map(|(tag, images)| BucketRecord {
                identifier: tag.identifier(),
                images: images.clone(),
            })
            .collect();

        IndexState {
            version: STATE_VERSION,
            groups,
            unmatched,
        }
    }

    /// Replace the index with `state`.
    ///
    /// The record is checked in full first; on any error the current contents
    /// are left as they were.
    pub fn import_state(&mut self, state: IndexState) -> Result<()> {
        let rebuilt = ImageIndex::from_state(state)?;
        info!(
            "imported {} images in {} groups",
            rebuilt.len(),
            rebuilt.group_count()
        );
        *self = rebuilt;
        Ok(())
    }

    pub fn from_state(state: IndexState) -> Result<ImageIndex> {
        if state.version != STATE_VERSION {
            return Err(IndexError::UnsupportedStateVersion {
                found: state.version,
                expected: STATE_VERSION,
            });
        }

        let mut index = ImageIndex::new();
        let mut seen_groups: HashSet<GroupKey> = HashSet::new();

        for group in state.groups {
            if !seen_groups.insert(group.key.clone()) {
                return Err(import_error(format!("group {} appears twice", group.key)));
            }
            if group.members.iter().all(|s| s.images.is_empty()) && group.ungrouped.is_empty() {
                return Err(import_error(format!("group {} is empty", group.key)));
            }
            for slot in group.members {
                let placement = Placement::Member {
                    group: group.key.clone(),
                    identifier: slot.identifier,
                };
                restore_slot(&mut index, slot.images, &placement)?;
            }
            for entry in group.ungrouped {
                let placement = Placement::Ungrouped {
                    group: group.key.clone(),
                    identifier: entry.parsed.identifier,
                };
                restore(&mut index, entry, &placement)?;
            }
        }

        let mut seen_tags: HashSet<BucketTag> = HashSet::new();
        for bucket in state.unmatched {
            let tag = BucketTag::from(bucket.identifier);
            if !seen_tags.insert(tag) {
                return Err(import_error(format!("unmatched bucket {tag} appears twice")));
            }
            restore_slot(&mut index, bucket.images, &Placement::Unmatched(tag))?;
        }

        Ok(index)
    }
}

fn restore_slot(index: &mut ImageIndex, images: Vec<ImageEntry>, placement: &Placement) -> Result<()> {
    if images.is_empty() {
        return Err(import_error(format!("{placement} is listed without images")));
    }
    images
        .into_iter()
        .try_for_each(|entry| restore(index, entry, placement))
}

/// File `entry` at `placement` after checking its parse puts it there.
fn restore(index: &mut ImageIndex, entry: ImageEntry, placement: &Placement) -> Result<()> {
    if index.contains(entry.id) {
        return Err(import_error(format!("image {} appears more than once", entry.id)));
    }
    let expected = Placement::for_parsed(&entry.parsed);
    if &expected != placement {
        return Err(import_error(format!(
            "image {} ({}) is stored under {placement} but belongs under {expected}",
            entry.id, entry.parsed.raw_name
        )));
    }
    index.file_at(entry, placement);
    Ok(())
}

fn import_error(message: String) -> IndexError {
    IndexError::StateImport(message)
}
