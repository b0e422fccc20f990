use std::collections::BTreeMap;

use serde::Serialize;

use crate::data::index::ImageIndex;
use crate::data::model::{GroupKey, ImageEntry, ImageId, LABEL_WIDTH};
use crate::data::vocabulary::IdentifierToken;

// ---------------------------------------------------------------------------
// Group labels
// ---------------------------------------------------------------------------

/// Label shown on a slide for a group.
///
/// The key's value is zero-padded to [`LABEL_WIDTH`], so `1`, `01` and `0001`
/// all label the same. Spectra read `SPEC{n}`, maps and electron images
/// `MAP{n}`, anything else the padded digits (`0001`). Keys wider than
/// `LABEL_WIDTH` are shown without a prefix.
pub fn format_group_label(key: &GroupKey, identifier: Option<IdentifierToken>) -> String {
    let padded = format!("{:0>width$}", key.normalized(), width = LABEL_WIDTH);
    if padded.len() != LABEL_WIDTH {
        return padded;
    }
    match identifier {
        Some(t) if t.is_spectrum() => format!("SPEC{}", key.normalized()),
        Some(t) if t.is_map_like() => format!("MAP{}", key.normalized()),
        _ => padded,
    }
}

/// Which kind of slide an image lands on; also the slide order within a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum SlideKind {
    Detector,
    Map,
    Spectrum,
}

impl SlideKind {
    fn of(identifier: Option<IdentifierToken>) -> Self {
        match identifier {
            Some(t) if t.is_spectrum() => SlideKind::Spectrum,
            Some(t) if t.is_map_like() => SlideKind::Map,
            _ => SlideKind::Detector,
        }
    }
}

// ---------------------------------------------------------------------------
// Grid layout
// ---------------------------------------------------------------------------

/// `(rows, cols)` of the image grid for `count` images.
pub fn grid_layout(count: usize) -> (usize, usize) {
    match count {
        0 => (0, 0),
        1 => (1, 1),
        2 => (1, 2),
        3..=4 => (2, 2),
        5..=6 => (2, 3),
        7..=9 => (3, 3),
        10..=12 => (3, 4),
        13..=16 => (4, 4),
        17..=20 => (4, 5),
        n => {
            let cols = ceil_sqrt(n);
            (n.div_ceil(cols), cols)
        }
    }
}

fn ceil_sqrt(n: usize) -> usize {
    let mut root = (n as f64).sqrt() as usize;
    while root * root < n {
        root += 1;
    }
    while root > 1 && (root - 1) * (root - 1) >= n {
        root -= 1;
    }
    root
}

// ---------------------------------------------------------------------------
// Slide plan
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlideImage {
    pub id: ImageId,
    pub filename: String,
    pub identifier: Option<IdentifierToken>,
}

impl From<&ImageEntry> for SlideImage {
    fn from(entry: &ImageEntry) -> Self {
        SlideImage {
            id: entry.id,
            filename: entry.parsed.raw_name.clone(),
            identifier: entry.parsed.identifier,
        }
    }
}

/// What the presentation side needs to lay out one slide.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlidePlan {
    pub label: String,
    pub group: GroupKey,
    pub kind: SlideKind,
    /// Grid images, by identifier priority then filename.
    pub images: Vec<SlideImage>,
    /// Spectra, laid out in a strip apart from the grid.
    pub spectra: Vec<SlideImage>,
    pub grid: (usize, usize),
}

/// One slide per group and slide kind, groups in numeric order.
///
/// `include` restricts the plan to the given labels (case-insensitive).
/// Images without a group key are not planned.
pub fn plan_slides(index: &ImageIndex, include: Option<&[String]>) -> Vec<SlidePlan> {
    let mut plans = Vec::new();

    for group in index.groups() {
        let mut by_kind: BTreeMap<SlideKind, Vec<&ImageEntry>> = BTreeMap::new();
        for entry in group.entries() {
            by_kind
                .entry(SlideKind::of(entry.parsed.identifier))
                .or_default()
                .push(entry);
        }

        for (kind, mut entries) in by_kind {
            let label = format_group_label(&group.key, entries[0].parsed.identifier);
            if let Some(wanted) = include {
                if !wanted.iter().any(|w| w.eq_ignore_ascii_case(&label)) {
                    continue;
                }
            }

            // Unclassified images sort after every identifier.
            entries.sort_by_key(|e| {
                (
                    e.parsed.identifier.is_none(),
                    e.parsed.identifier,
                    e.parsed.raw_name.to_lowercase(),
                )
            });
            let (spectra, images): (Vec<&ImageEntry>, Vec<&ImageEntry>) = entries
                .into_iter()
                .partition(|e| e.parsed.identifier.is_some_and(IdentifierToken::is_spectrum));

            plans.push(SlidePlan {
                label,
                group: group.key.clone(),
                kind,
                grid: grid_layout(images.len()),
                images: images.into_iter().map(SlideImage::from).collect(),
                spectra: spectra.into_iter().map(SlideImage::from).collect(),
            });
        }
    }

    plans
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> GroupKey {
        GroupKey::new(s).unwrap()
    }

    #[test]
    fn labels() {
        use IdentifierToken::*;
        assert_eq!(format_group_label(&key("0001"), Some(Ud)), "0001");
        assert_eq!(format_group_label(&key("0003"), Some(Map)), "MAP3");
        assert_eq!(format_group_label(&key("0003"), Some(ElectronImage)), "MAP3");
        assert_eq!(format_group_label(&key("0012"), Some(Spectra)), "SPEC12");
        assert_eq!(format_group_label(&key("0003"), None), "0003");
        assert_eq!(format_group_label(&key("3"), Some(Map)), "MAP3");
        assert_eq!(format_group_label(&key("07"), None), "0007");
        assert_eq!(format_group_label(&key("31337"), Some(Spectrum)), "31337");
    }

    #[test]
    fn grid_table() {
        let expected = [
            (0, (0, 0)),
            (1, (1, 1)),
            (2, (1, 2)),
            (3, (2, 2)),
            (4, (2, 2)),
            (5, (2, 3)),
            (9, (3, 3)),
            (12, (3, 4)),
            (16, (4, 4)),
            (20, (4, 5)),
            (21, (5, 5)),
            (25, (5, 5)),
            (26, (5, 6)),
            (50, (7, 8)),
        ];
        for (n, grid) in expected {
            assert_eq!(grid_layout(n), grid, "{n} images");
        }
    }

    fn index_of(names: &[&str]) -> ImageIndex {
        let mut index = ImageIndex::new();
        for (i, name) in names.iter().enumerate() {
            index.insert_filename(ImageId(i as u64 + 1), name).unwrap();
        }
        index
    }

    #[test]
    fn plan_splits_groups_by_slide_kind() {
        let index = index_of(&[
            "0002 LD.tif",
            "0001 SE.tif",
            "0001 UD.tif",
            "0001.tif",
            "Electron Image 1.tif",
            "Co Map Data 1.tif",
            "Spectrum 1.tif",
            "Spectrum.tif",
        ]);
        let plans = plan_slides(&index, None);
        let labels: Vec<&str> = plans.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, ["0001", "MAP1", "SPEC1", "0002"]);
        assert_eq!(plans[0].kind, SlideKind::Detector);

        let detector = &plans[0];
        let order: Vec<&str> = detector.images.iter().map(|i| i.filename.as_str()).collect();
        assert_eq!(order, ["0001 UD.tif", "0001 SE.tif", "0001.tif"]);
        assert_eq!(detector.grid, (2, 2));

        let maps = &plans[1];
        assert_eq!(maps.kind, SlideKind::Map);
        assert_eq!(maps.images.len(), 2);

        let spectra = &plans[2];
        assert!(spectra.images.is_empty());
        assert_eq!(spectra.spectra.len(), 1);
        assert_eq!(spectra.grid, (0, 0));
    }

    #[test]
    fn four_digit_groups_get_map_and_spec_labels() {
        let index = index_of(&["0004 UD.tif", "0004 Map.tif", "0004 Spectrum.tif"]);
        let labels: Vec<String> = plan_slides(&index, None).into_iter().map(|p| p.label).collect();
        assert_eq!(labels, ["0004", "MAP4", "SPEC4"]);
    }

    #[test]
    fn labels_do_not_depend_on_upload_order() {
        let ud_first = index_of(&["0001 UD.tif", "Spectrum 1.tif"]);
        let spectrum_first = index_of(&["Spectrum 1.tif", "0001 UD.tif"]);
        let labels = |index: &ImageIndex| -> Vec<String> {
            plan_slides(index, None).into_iter().map(|p| p.label).collect()
        };
        assert_eq!(labels(&ud_first), ["0001", "SPEC1"]);
        assert_eq!(labels(&spectrum_first), labels(&ud_first));

        assert_eq!(labels(&index_of(&["Spectrum 5.tiff"])), ["SPEC5"]);
        assert_eq!(labels(&index_of(&["Electron Image 1.tif"])), ["MAP1"]);
    }

    #[test]
    fn include_filters_by_label() {
        let index = index_of(&["0004 UD.tif", "0004 Map.tif", "0005 UD.tif"]);
        let wanted = vec!["map4".to_string(), "0005".to_string()];
        let labels: Vec<String> = plan_slides(&index, Some(&wanted))
            .into_iter()
            .map(|p| p.label)
            .collect();
        assert_eq!(labels, ["MAP4", "0005"]);
    }
}
