//! Reading and writing functional groups from and to a DICOM data set,
//! via the _Shared Functional Groups Sequence_
//! and the _Per-Frame Functional Groups Sequence_.
//!
//! With the `rayon` feature enabled,
//! the per-frame items are processed in parallel.

use crate::attribute::sequence_element;
use crate::group::{FunctionalGroup, RawGroup};
use crate::store::{FunctionalGroups, GroupStore, Violation};
use crate::types::{FrameIndex, GroupType};
use dicom_core::header::Header;
use dicom_core::VR;
use dicom_dictionary_std::tags;
use dicom_object::InMemDicomObject;
use snafu::{ensure, Backtrace, OptionExt, Snafu};
use tracing::{debug, warn};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum ReadError {
    #[snafu(display("Could not find Shared Functional Groups Sequence"))]
    MissingSharedSequence { backtrace: Backtrace },

    #[snafu(display("Shared Functional Groups Sequence has no item"))]
    EmptySharedSequence { backtrace: Backtrace },

    #[snafu(display("Could not find Per-Frame Functional Groups Sequence"))]
    MissingPerFrameSequence { backtrace: Backtrace },

    #[snafu(display("Per-Frame Functional Groups Sequence has no item"))]
    EmptyPerFrameSequence { backtrace: Backtrace },

    #[snafu(display("Number of frames {} exceeds the maximum of 2^32-1", count))]
    TooManyFrames { count: usize, backtrace: Backtrace },
}

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum WriteError {
    #[snafu(display("Functional group structure has {} violations", violations.len()))]
    InvalidStructure {
        violations: Vec<Violation>,
        backtrace: Backtrace,
    },
}

/// Options for writing functional groups.
#[derive(Debug, Copy, Clone, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub struct WriteOptions {
    /// whether to check the functional group structure before writing
    pub check_structure: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        WriteOptions {
            check_structure: true,
        }
    }
}

impl WriteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace whether the structure is checked before writing.
    pub fn check_structure(mut self, check_structure: bool) -> Self {
        self.check_structure = check_structure;
        self
    }
}

/// Read the shared and per-frame functional groups of a data set
/// into a new group store.
///
/// Only the first item of the shared functional groups sequence is read.
/// Elements other than sequences are ignored,
/// and groups which cannot be interpreted are kept uninterpreted.
///
/// Groups are stored as found: a per-frame group does not replace
/// a shared group of the same type,
/// and [`GroupStore::check`] reports the conflict.
pub fn read_dataset(obj: &InMemDicomObject) -> Result<GroupStore, ReadError> {
    let shared = obj
        .get(tags::SHARED_FUNCTIONAL_GROUPS_SEQUENCE)
        .and_then(|e| e.items())
        .context(MissingSharedSequenceSnafu)?;
    let shared_item = shared.first().context(EmptySharedSequenceSnafu)?;
    if shared.len() > 1 {
        warn!("More than one item in Shared Functional Groups Sequence, using the first one");
    }

    let per_frame = obj
        .get(tags::PER_FRAME_FUNCTIONAL_GROUPS_SEQUENCE)
        .and_then(|e| e.items())
        .context(MissingPerFrameSequenceSnafu)?;
    ensure!(!per_frame.is_empty(), EmptyPerFrameSequenceSnafu);
    ensure!(
        per_frame.len() <= u32::MAX as usize,
        TooManyFramesSnafu {
            count: per_frame.len()
        }
    );

    let mut store = GroupStore::new();
    for group in read_item(shared_item, None) {
        let group_type = group.group_type();
        if let Err(e) = store.add_shared(group) {
            warn!("Cannot use {} as shared functional group (ignored): {}", group_type, e);
        }
    }

    #[cfg(feature = "rayon")]
    let frames: Vec<Vec<FunctionalGroup>> = per_frame
        .par_iter()
        .enumerate()
        .map(|(i, item)| read_item(item, Some(i as FrameIndex)))
        .collect();
    #[cfg(not(feature = "rayon"))]
    let frames: Vec<Vec<FunctionalGroup>> = per_frame
        .iter()
        .enumerate()
        .map(|(i, item)| read_item(item, Some(i as FrameIndex)))
        .collect();

    for (i, groups) in frames.into_iter().enumerate() {
        let frame = i as FrameIndex;
        if groups.is_empty() {
            warn!("No functional groups found for frame #{}", frame);
        }
        for group in groups {
            let group_type = group.group_type();
            if let Err(e) = store.insert_per_frame_as_read(frame, group) {
                warn!(
                    "Cannot use {} as per-frame functional group for frame #{} (ignored): {}",
                    group_type, frame, e
                );
                continue;
            }
            if store.get_shared(group_type).is_some() {
                warn!(
                    "Functional group {} of frame #{} is also present as shared functional group",
                    group_type, frame
                );
            }
        }
    }
    debug!(
        "Read {} shared functional groups and {} frames",
        store.shared().len(),
        store.number_of_frames()
    );
    Ok(store)
}

/// Write the functional groups of the store into a data set,
/// replacing any existing functional group sequences.
///
/// One per-frame item is written for each frame, in frame index order.
pub fn write_dataset(
    store: &GroupStore,
    obj: &mut InMemDicomObject,
    options: WriteOptions,
) -> Result<(), WriteError> {
    if options.check_structure {
        let violations = store.check();
        ensure!(violations.is_empty(), InvalidStructureSnafu { violations });
    }

    debug!("Writing shared functional groups");
    let shared_item = write_item(store.shared());

    debug!("Writing per-frame functional groups");
    let frames: Vec<FrameIndex> = store.frames().collect();
    let empty = FunctionalGroups::new();
    #[cfg(feature = "rayon")]
    let per_frame_items: Vec<InMemDicomObject> = frames
        .par_iter()
        .map(|f| write_item(store.per_frame(*f).unwrap_or(&empty)))
        .collect();
    #[cfg(not(feature = "rayon"))]
    let per_frame_items: Vec<InMemDicomObject> = frames
        .iter()
        .map(|f| write_item(store.per_frame(*f).unwrap_or(&empty)))
        .collect();

    obj.put(sequence_element(tags::SHARED_FUNCTIONAL_GROUPS_SEQUENCE, vec![shared_item]));
    obj.put(sequence_element(tags::PER_FRAME_FUNCTIONAL_GROUPS_SEQUENCE, per_frame_items));
    Ok(())
}

fn read_item(item: &InMemDicomObject, frame: Option<FrameIndex>) -> Vec<FunctionalGroup> {
    let mut groups = Vec::new();
    for elem in item {
        let tag = elem.tag();
        if elem.vr() != VR::SQ {
            warn!(
                "Found non-sequence element in functional group sequence item (ignored): {}",
                tag
            );
            continue;
        }
        let items = elem.items().unwrap_or(&[]);
        let group_type = GroupType::from_sequence_tag(tag);
        if let GroupType::Unknown(_) = group_type {
            warn!("Cannot understand functional group for sequence tag {}, keeping it as is", tag);
        }
        let group = match FunctionalGroup::read(group_type, items) {
            Ok(group) => group,
            Err(e) => {
                match frame {
                    Some(frame) => warn!(
                        "Cannot read functional group {} of frame #{}, keeping it as is: {}",
                        group_type, frame, e
                    ),
                    None => warn!(
                        "Cannot read shared functional group {}, keeping it as is: {}",
                        group_type, e
                    ),
                }
                RawGroup::new(group_type, items.to_vec()).into()
            }
        };
        groups.push(group);
    }
    groups
}

fn write_item(groups: &FunctionalGroups) -> InMemDicomObject {
    InMemDicomObject::from_element_iter(groups.iter().map(|group| group.to_element()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::{FrameContent, PixelMeasures, PlaneOrientation, PlanePosition};
    use crate::store::GroupState;

    fn sample_store() -> GroupStore {
        let mut store = GroupStore::new();
        store
            .add_shared(PlaneOrientation::new([1., 0., 0.], [0., 1., 0.]).into())
            .unwrap();
        store
            .add_shared(PixelMeasures::with_slice_thickness(2.5).into())
            .unwrap();
        for f in 0..3_u32 {
            store
                .add_per_frame(
                    f,
                    FrameContent {
                        dimension_index_values: vec![1, f + 1],
                        ..Default::default()
                    }
                    .into(),
                )
                .unwrap();
            store
                .add_per_frame(f, PlanePosition::new(0., 0., f64::from(f) * 2.5).into())
                .unwrap();
        }
        store
    }

    #[test]
    fn store_is_written_and_read_back() {
        let store = sample_store();
        let mut obj = InMemDicomObject::new_empty();
        write_dataset(&store, &mut obj, WriteOptions::default()).unwrap();

        let per_frame = obj
            .get(tags::PER_FRAME_FUNCTIONAL_GROUPS_SEQUENCE)
            .and_then(|e| e.items())
            .unwrap();
        assert_eq!(per_frame.len(), 3);

        let back = read_dataset(&obj).unwrap();
        assert_eq!(back, store);
        assert_eq!(back.state(GroupType::PlanePosition), GroupState::PerFrame);
        assert_eq!(back.state(GroupType::PixelMeasures), GroupState::Shared);
    }

    #[test]
    fn invalid_structure_is_not_written() {
        let mut store = sample_store();
        store.delete_per_frame(1, GroupType::FrameContent);
        let mut obj = InMemDicomObject::new_empty();
        let err = write_dataset(&store, &mut obj, WriteOptions::default()).unwrap_err();
        let WriteError::InvalidStructure { violations, .. } = err;
        assert!(violations.contains(&Violation::MissingFrameContent { frame: 1 }));
        assert!(obj.get(tags::SHARED_FUNCTIONAL_GROUPS_SEQUENCE).is_none());

        write_dataset(&store, &mut obj, WriteOptions::new().check_structure(false)).unwrap();
        assert!(obj.get(tags::SHARED_FUNCTIONAL_GROUPS_SEQUENCE).is_some());
    }

    #[test]
    fn missing_sequences_are_errors() {
        let obj = InMemDicomObject::new_empty();
        assert!(matches!(
            read_dataset(&obj),
            Err(ReadError::MissingSharedSequence { .. })
        ));

        let mut obj = InMemDicomObject::new_empty();
        obj.put(sequence_element(
            tags::SHARED_FUNCTIONAL_GROUPS_SEQUENCE,
            vec![InMemDicomObject::new_empty()],
        ));
        obj.put(sequence_element(tags::PER_FRAME_FUNCTIONAL_GROUPS_SEQUENCE, vec![]));
        assert!(matches!(
            read_dataset(&obj),
            Err(ReadError::EmptyPerFrameSequence { .. })
        ));
    }

    #[test]
    fn per_frame_group_conflicting_with_shared_is_kept_as_read() {
        let shared = InMemDicomObject::from_element_iter(vec![
            FunctionalGroup::from(PixelMeasures::with_slice_thickness(1.)).to_element(),
        ]);
        let content = || FunctionalGroup::from(FrameContent::default()).to_element();
        let frames = vec![
            InMemDicomObject::from_element_iter(vec![content()]),
            InMemDicomObject::from_element_iter(vec![
                FunctionalGroup::from(PixelMeasures::with_slice_thickness(2.)).to_element(),
                content(),
            ]),
            InMemDicomObject::from_element_iter(vec![content()]),
        ];
        let mut obj = InMemDicomObject::new_empty();
        obj.put(sequence_element(tags::SHARED_FUNCTIONAL_GROUPS_SEQUENCE, vec![shared]));
        obj.put(sequence_element(tags::PER_FRAME_FUNCTIONAL_GROUPS_SEQUENCE, frames));

        let store = read_dataset(&obj).unwrap();
        let one: FunctionalGroup = PixelMeasures::with_slice_thickness(1.).into();
        let two: FunctionalGroup = PixelMeasures::with_slice_thickness(2.).into();
        assert_eq!(store.get_shared(GroupType::PixelMeasures), Some(&one));
        assert_eq!(store.get(0, GroupType::PixelMeasures), Some((&one, false)));
        assert_eq!(store.get(1, GroupType::PixelMeasures), Some((&two, true)));
        assert_eq!(store.get(2, GroupType::PixelMeasures), Some((&one, false)));

        let violations = store.check();
        assert!(violations.contains(&Violation::SharedAndPerFrame {
            group_type: GroupType::PixelMeasures,
            frame: 1,
        }));
    }

    #[test]
    fn unreadable_groups_are_kept_raw() {
        let mut obj = InMemDicomObject::new_empty();
        obj.put(sequence_element(
            tags::SHARED_FUNCTIONAL_GROUPS_SEQUENCE,
            vec![InMemDicomObject::new_empty()],
        ));
        // plane position item without Image Position (Patient)
        let frame_item = InMemDicomObject::from_element_iter(vec![sequence_element(
            GroupType::PlanePosition.sequence_tag(),
            vec![InMemDicomObject::new_empty()],
        )]);
        obj.put(sequence_element(tags::PER_FRAME_FUNCTIONAL_GROUPS_SEQUENCE, vec![frame_item]));

        let store = read_dataset(&obj).unwrap();
        assert_eq!(store.number_of_frames(), 1);
        let group = store.get_per_frame(0, GroupType::PlanePosition).unwrap();
        assert!(matches!(group, FunctionalGroup::Raw(_)));
        assert!(group.as_plane_position().is_none());
    }
}
