use std::collections::{BTreeMap, HashMap};

use log::{debug, info, warn};

use super::model::{
    GroupKey, ImageEntry, ImageGroup, ImageId, InsertOutcome, MatchConfidence,
    ParsedFilename, Placement, UnmatchedBucket, LABEL_WIDTH,
};
use super::parser;
use super::vocabulary::IdentifierToken;
use crate::error::{IndexError, Result};

// ---------------------------------------------------------------------------
// ImageIndex – groups, unmatched bucket and a reverse lookup by id
// ---------------------------------------------------------------------------

/// The aggregate of every filed image.
///
/// Groups iterate in numeric key order. A group exists only while it holds at
/// least one image.
#[derive(Debug, Clone, Default)]
pub struct ImageIndex {
    pub(crate) groups: BTreeMap<GroupKey, ImageGroup>,
    pub(crate) unmatched: UnmatchedBucket,
    pub(crate) locations: HashMap<ImageId, Placement>,
}

impl ImageIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// File a parsed image.
    ///
    /// A second image of the same type in the same group is kept next to the
    /// first and reported through `InsertOutcome::conflict`.
    pub fn insert(&mut self, id: ImageId, parsed: ParsedFilename) -> Result<InsertOutcome> {
        if self.locations.contains_key(&id) {
            return Err(IndexError::DuplicateImageId(id));
        }
        if parsed.confidence == MatchConfidence::Ambiguous {
            let found: Vec<&str> = parsed.candidates.iter().map(|t| t.name()).collect();
            warn!(
                "{}: several identifiers ({}), using {}",
                parsed.raw_name,
                found.join(", "),
                parsed.identifier.map_or("none", IdentifierToken::name)
            );
        }

        let outcome = self.file(ImageEntry { id, parsed });
        if outcome.conflict {
            warn!("image {id}: {} already holds an image of this type", outcome.placement);
        }
        debug!("image {id} filed under {}", outcome.placement);
        Ok(outcome)
    }

    /// Parse `filename` and file it.
    pub fn insert_filename(&mut self, id: ImageId, filename: &str) -> Result<InsertOutcome> {
        self.insert(id, parser::parse(filename))
    }

    /// Take an image out of the index. Slots and groups left empty are dropped.
    pub fn remove(&mut self, id: ImageId) -> Result<ImageEntry> {
        let placement = self
            .locations
            .get(&id)
            .cloned()
            .ok_or(IndexError::UnknownImageId(id))?;
        let entry = self
            .take(id, &placement)
            .ok_or(IndexError::UnknownImageId(id))?;
        self.locations.remove(&id);
        debug!("image {id} removed from {placement}");
        Ok(entry)
    }

    /// Move an image to another group.
    ///
    /// `label` is a hand-typed group: digits (`7`, `0007`) or a slide label
    /// (`MAP7`, `SPEC7`). A blank label takes the image out of its group.
    pub fn regroup(&mut self, id: ImageId, label: &str) -> Result<InsertOutcome> {
        let group_key = GroupKey::from_label(label, LABEL_WIDTH)?;
        let mut entry = self.remove(id)?;
        entry.parsed.group_key = group_key;
        Ok(self.file(entry))
    }

    /// Override the identifier read from the filename.
    pub fn retype(&mut self, id: ImageId, identifier: IdentifierToken) -> Result<InsertOutcome> {
        let mut entry = self.remove(id)?;
        entry.parsed.identifier = Some(identifier);
        entry.parsed.confidence = MatchConfidence::Exact;
        Ok(self.file(entry))
    }

    /// Parse every stored filename again and rebuild the index from the
    /// results. Manual regroup/retype edits are lost. Returns how many images
    /// changed group or type.
    pub fn reparse_all(&mut self) -> usize {
        let entries: Vec<ImageEntry> = self.entries().cloned().collect();
        let mut rebuilt = ImageIndex::new();
        let mut changed = 0;

        for entry in entries {
            let parsed = parser::parse(&entry.parsed.raw_name);
            if parsed.group_key != entry.parsed.group_key
                || parsed.identifier != entry.parsed.identifier
            {
                debug!(
                    "{}: {} → {}",
                    entry.parsed.raw_name,
                    Placement::for_parsed(&entry.parsed),
                    Placement::for_parsed(&parsed)
                );
                changed += 1;
            }
            rebuilt.file(ImageEntry { id: entry.id, parsed });
        }

        info!("re-indexed {} images, {changed} changed", rebuilt.len());
        *self = rebuilt;
        changed
    }

    pub fn clear(&mut self) {
        *self = ImageIndex::new();
    }

    // -- Lookups --

    pub fn get(&self, id: ImageId) -> Option<&ImageEntry> {
        let slot: &[ImageEntry] = match self.locations.get(&id)? {
            Placement::Member { group, identifier } => {
                self.groups.get(group)?.members_of(*identifier)
            }
            Placement::Ungrouped { group, .. } => self.groups.get(group)?.ungrouped.as_slice(),
            Placement::Unmatched(tag) => self.unmatched.get(*tag),
        };
        slot.iter().find(|e| e.id == id)
    }

    pub fn placement(&self, id: ImageId) -> Option<&Placement> {
        self.locations.get(&id)
    }

    pub fn contains(&self, id: ImageId) -> bool {
        self.locations.contains_key(&id)
    }

    /// Group by key; `key` is compared by numeric value.
    pub fn group(&self, key: &GroupKey) -> Option<&ImageGroup> {
        self.groups.get(key)
    }

    /// Groups in ascending numeric order.
    pub fn groups(&self) -> impl Iterator<Item = &ImageGroup> + '_ {
        self.groups.values()
    }

    pub fn unmatched(&self) -> &UnmatchedBucket {
        &self.unmatched
    }

    /// Every image: groups in order, then the unmatched bucket.
    pub fn entries(&self) -> impl Iterator<Item = &ImageEntry> + '_ {
        self.groups
            .values()
            .flat_map(ImageGroup::entries)
            .chain(self.unmatched.iter())
    }

    /// One past the highest id in use, for callers that number images themselves.
    /// Fails once `u64::MAX` is taken.
    pub fn next_id(&self) -> Result<ImageId> {
        match self.locations.keys().max() {
            None => Ok(ImageId(1)),
            Some(top) => top.0.checked_add(1).map(ImageId).ok_or(IndexError::IdsExhausted),
        }
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    // -- Filing internals --

    pub(crate) fn file(&mut self, entry: ImageEntry) -> InsertOutcome {
        let placement = Placement::for_parsed(&entry.parsed);
        let conflict = self.file_at(entry, &placement);
        InsertOutcome {
            placement,
            conflict,
        }
    }

    /// Put `entry` in the slot named by `placement`; true when a member slot
    /// was already occupied.
    pub(crate) fn file_at(&mut self, entry: ImageEntry, placement: &Placement) -> bool {
        let id = entry.id;
        let conflict = match placement {
            Placement::Member { group, identifier } => {
                let slot = self.group_mut(group).members.entry(*identifier).or_default();
                let occupied = !slot.is_empty();
                slot.push(entry);
                occupied
            }
            Placement::Ungrouped { group, .. } => {
                self.group_mut(group).ungrouped.push(entry);
                false
            }
            Placement::Unmatched(tag) => {
                self.unmatched.entries.entry(*tag).or_default().push(entry);
                false
            }
        };
        self.locations.insert(id, placement.clone());
        conflict
    }

    fn group_mut(&mut self, key: &GroupKey) -> &mut ImageGroup {
        self.groups
            .entry(key.clone())
            .or_insert_with(|| ImageGroup::new(key.clone()))
    }

    fn take(&mut self, id: ImageId, placement: &Placement) -> Option<ImageEntry> {
        match placement {
            Placement::Member { group, identifier } => {
                let g = self.groups.get_mut(group)?;
                let slot = g.members.get_mut(identifier)?;
                let entry = take_entry(slot, id)?;
                if slot.is_empty() {
                    g.members.remove(identifier);
                }
                if g.is_empty() {
                    self.groups.remove(group);
                }
                Some(entry)
            }
            Placement::Ungrouped { group, .. } => {
                let g = self.groups.get_mut(group)?;
                let entry = take_entry(&mut g.ungrouped, id)?;
                if g.is_empty() {
                    self.groups.remove(group);
                }
                Some(entry)
            }
            Placement::Unmatched(tag) => {
                let slot = self.unmatched.entries.get_mut(tag)?;
                let entry = take_entry(slot, id)?;
                if slot.is_empty() {
                    self.unmatched.entries.remove(tag);
                }
                Some(entry)
            }
        }
    }
}

fn take_entry(entries: &mut Vec<ImageEntry>, id: ImageId) -> Option<ImageEntry> {
    let pos = entries.iter().position(|e| e.id == id)?;
    Some(entries.remove(pos))
}
