use std::sync::{Arc, Mutex, MutexGuard};

use log::info;

use crate::data::index::ImageIndex;
use crate::data::loader::ManifestRecord;
use crate::data::model::{ImageEntry, ImageId, InsertOutcome, ParsedFilename};
use crate::data::parser;
use crate::data::record::IndexState;
use crate::data::vocabulary::IdentifierToken;
use crate::error::{IndexError, Result};

// ---------------------------------------------------------------------------
// Shared index state
// ---------------------------------------------------------------------------

/// An [`ImageIndex`] shared between an upload thread and readers.
///
/// Every mutation takes the lock. Readers call [`snapshot`](Self::snapshot)
/// and iterate their own copy without holding it.
#[derive(Debug, Clone, Default)]
pub struct SharedIndex {
    inner: Arc<Mutex<ImageIndex>>,
}

impl SharedIndex {
    pub fn new(index: ImageIndex) -> Self {
        SharedIndex {
            inner: Arc::new(Mutex::new(index)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, ImageIndex>> {
        self.inner.lock().map_err(|_| IndexError::LockPoisoned)
    }

    /// Parse a freshly uploaded filename and file it. Parsing happens before
    /// the lock is taken.
    pub fn ingest(&self, id: ImageId, filename: &str) -> Result<(ParsedFilename, InsertOutcome)> {
        let parsed = parser::parse(filename);
        let outcome = self.lock()?.insert(id, parsed.clone())?;
        Ok((parsed, outcome))
    }

    /// Ingest a whole manifest. Rows that fail (duplicate ids) are returned
    /// alongside the outcomes instead of stopping the batch.
    pub fn ingest_all(
        &self,
        records: &[ManifestRecord],
    ) -> Result<(Vec<(ImageId, InsertOutcome)>, Vec<(ImageId, IndexError)>)> {
        let parsed: Vec<(ImageId, ParsedFilename)> = records
            .iter()
            .map(|r| (r.id, parser::parse(&r.filename)))
            .collect();

        let mut index = self.lock()?;
        let mut filed = Vec::new();
        let mut failed = Vec::new();
        for (id, p) in parsed {
            match index.insert(id, p) {
                Ok(outcome) => filed.push((id, outcome)),
                Err(e) => failed.push((id, e)),
            }
        }
        info!("ingested {} images, {} rejected", filed.len(), failed.len());
        Ok((filed, failed))
    }

    pub fn insert(&self, id: ImageId, parsed: ParsedFilename) -> Result<InsertOutcome> {
        self.lock()?.insert(id, parsed)
    }

    pub fn remove(&self, id: ImageId) -> Result<ImageEntry> {
        self.lock()?.remove(id)
    }

    pub fn regroup(&self, id: ImageId, label: &str) -> Result<InsertOutcome> {
        self.lock()?.regroup(id, label)
    }

    pub fn retype(&self, id: ImageId, identifier: IdentifierToken) -> Result<InsertOutcome> {
        self.lock()?.retype(id, identifier)
    }

    pub fn clear(&self) -> Result<()> {
        self.lock()?.clear();
        Ok(())
    }

    pub fn export_state(&self) -> Result<IndexState> {
        Ok(self.lock()?.export_state())
    }

    /// Validated without the lock; swapped in under it.
    pub fn import_state(&self, state: IndexState) -> Result<()> {
        let rebuilt = ImageIndex::from_state(state)?;
        *self.lock()? = rebuilt;
        Ok(())
    }

    /// A private copy of the current index.
    pub fn snapshot(&self) -> Result<ImageIndex> {
        Ok(self.lock()?.clone())
    }

    pub fn next_id(&self) -> Result<ImageId> {
        self.lock()?.next_id()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::data::filter;

    #[test]
    fn concurrent_ingest_is_serialized() {
        let shared = SharedIndex::default();
        let handles: Vec<_> = (0..4u64)
            .map(|t| {
                let shared = shared.clone();
                thread::spawn(move || {
                    for i in 0..25u64 {
                        let id = ImageId(t * 100 + i);
                        shared.ingest(id, &format!("{:04} UD.tif", i)).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let snapshot = shared.snapshot().unwrap();
        assert_eq!(snapshot.len(), 100);
        assert_eq!(snapshot.group_count(), 25);
        assert!(filter::list_groups(&snapshot)
            .iter()
            .all(|g| g.member_count == 4 && g.conflicts == [IdentifierToken::Ud]));
    }

    #[test]
    fn snapshot_is_detached() {
        let shared = SharedIndex::default();
        shared.ingest(ImageId(1), "0001 UD.tif").unwrap();
        let snapshot = shared.snapshot().unwrap();
        shared.remove(ImageId(1)).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert!(shared.snapshot().unwrap().is_empty());
    }

    #[test]
    fn ingest_all_reports_rejected_rows() {
        let shared = SharedIndex::default();
        let rows = vec![
            ManifestRecord { id: ImageId(1), filename: "0001 UD.tif".into() },
            ManifestRecord { id: ImageId(1), filename: "0001 LD.tif".into() },
            ManifestRecord { id: ImageId(2), filename: "0001 UD copy.tif".into() },
        ];
        let (filed, failed) = shared.ingest_all(&rows).unwrap();
        assert_eq!(filed.len(), 2);
        assert!(filed[1].1.conflict);
        assert_eq!(failed, [(ImageId(1), IndexError::DuplicateImageId(ImageId(1)))]);
    }

    #[test]
    fn failed_import_keeps_shared_state() {
        let shared = SharedIndex::default();
        shared.ingest(ImageId(1), "0001 UD.tif").unwrap();
        let bad = IndexState { version: 0, ..IndexState::default() };
        assert!(shared.import_state(bad).is_err());
        assert_eq!(shared.snapshot().unwrap().len(), 1);

        let good = shared.export_state().unwrap();
        shared.clear().unwrap();
        shared.import_state(good).unwrap();
        assert_eq!(shared.next_id().unwrap(), ImageId(2));
    }

    #[test]
    fn edits_go_through_the_lock() {
        let shared = SharedIndex::default();
        shared.ingest(ImageId(1), "0001.tif").unwrap();
        shared.retype(ImageId(1), IdentifierToken::Se).unwrap();
        let outcome = shared.regroup(ImageId(1), "3").unwrap();
        assert_eq!(outcome.placement.group().unwrap().display(), "0003");
    }
}
