//! This crate contains the functional group model of
//! enhanced multi-frame DICOM objects:
//! the attributes describing each frame,
//! kept either once for all frames (_shared_)
//! or separately for each frame (_per-frame_).
//!
//! The main type is [`GroupStore`],
//! which owns the functional groups of one object
//! and keeps them consistent as groups are added:
//! adding a per-frame group which differs from a shared one
//! demotes the shared group to per-frame storage.
//!
//! Frames can then be put in spatial order
//! with a [`FrameSorter`] such as [`PositionSorter`].
//!
//! # Examples
//!
//! ```
//! # use std::error::Error;
//! use dicom_fg::{GroupStore, GroupType, PlaneOrientation, PlanePosition};
//! use dicom_fg::sorter::{FrameSorter, PositionSorter, SortOptions};
//!
//! # fn main() -> Result<(), Box<dyn Error>> {
//! let mut store = GroupStore::new();
//! store.add_shared(PlaneOrientation::new([1., 0., 0.], [0., 1., 0.]).into())?;
//! store.add_per_frame(0, PlanePosition::new(0., 0., 5.).into())?;
//! store.add_per_frame(1, PlanePosition::new(0., 0., 0.).into())?;
//!
//! let (group, is_per_frame) = store.get(1, GroupType::PlanePosition).unwrap();
//! assert!(is_per_frame);
//! assert_eq!(group.as_plane_position().unwrap().image_position, [0., 0., 0.]);
//!
//! let sorted = PositionSorter::new(SortOptions::default()).sort(&store)?;
//! assert_eq!(sorted[0].frame, 1);
//! assert_eq!(sorted[1].frame, 0);
//! #   Ok(())
//! # }
//! ```

mod attribute;
pub mod group;
pub mod io;
pub mod sorter;
pub mod store;
pub mod types;

pub use attribute::GetAttributeError;
pub use group::{
    FrameContent, FunctionalGroup, PixelMeasures, PlaneOrientation, PlanePosition, RawGroup,
    SegmentIdentification,
};
pub use io::{read_dataset, write_dataset, WriteOptions};
pub use sorter::{FrameSorter, IdentitySorter, PositionSorter, SortedFrame};
pub use store::{FunctionalGroups, GroupState, GroupStore, Violation};
pub use types::{FrameIndex, GroupType, SharedType};
