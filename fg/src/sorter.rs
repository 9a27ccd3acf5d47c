//! Ordering of the frames of a multi-frame object.
//!
//! A [`FrameSorter`] reads the functional groups of a [`GroupStore`]
//! and produces the frames in a well defined order.
//! [`PositionSorter`] orders frames spatially,
//! by projecting each frame's _Image Position (Patient)_
//! onto the normal of the (shared) imaging plane.

use crate::store::GroupStore;
use crate::types::{FrameIndex, GroupType};
use snafu::{ensure, Backtrace, OptionExt, Snafu};
use tracing::debug;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("No frames to sort"))]
    NotEnoughItems { backtrace: Backtrace },

    #[snafu(display("Number of frames {} exceeds the maximum of {}", count, max))]
    TooManyItems {
        count: usize,
        max: usize,
        backtrace: Backtrace,
    },

    #[snafu(display(
        "Frame indices are not consecutive, highest index is {} for {} frames",
        max_index,
        count
    ))]
    NonDenseFrames {
        count: usize,
        max_index: FrameIndex,
        backtrace: Backtrace,
    },

    #[snafu(display("Missing {} functional group for frame {}", group_type, frame))]
    MissingGroup {
        group_type: GroupType,
        frame: FrameIndex,
        backtrace: Backtrace,
    },

    #[snafu(display(
        "{} functional group for frame {} could not be interpreted",
        group_type,
        frame
    ))]
    UninterpretedGroup {
        group_type: GroupType,
        frame: FrameIndex,
        backtrace: Backtrace,
    },

    #[snafu(display(
        "Image Orientation (Patient) is per-frame, frames are not guaranteed to be parallel"
    ))]
    FramesNotParallel { backtrace: Backtrace },

    #[snafu(display(
        "Image Position (Patient) is shared by {} frames, cannot sort by position",
        count
    ))]
    PositionNotPerFrame { count: usize, backtrace: Backtrace },

    #[snafu(display(
        "Image Orientation (Patient) {:?} is degenerate, slice normal has length {}",
        orientation,
        length
    ))]
    DegenerateOrientation {
        orientation: [f64; 6],
        length: f64,
        backtrace: Backtrace,
    },

    #[snafu(display("Image Position (Patient) of frame {} is not finite", frame))]
    NonFinitePosition {
        frame: FrameIndex,
        backtrace: Backtrace,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Options for sorting frames.
#[derive(Debug, Copy, Clone, PartialEq)]
#[non_exhaustive]
pub struct SortOptions {
    /// the maximum number of frames accepted
    pub max_frames: usize,
    /// the minimum length of the cross product of the orientation vectors
    /// before normalization
    pub min_normal_length: f64,
}

impl Default for SortOptions {
    fn default() -> Self {
        SortOptions {
            max_frames: u32::MAX as usize,
            min_normal_length: 1e-6,
        }
    }
}

impl SortOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the maximum number of frames.
    pub fn max_frames(mut self, max_frames: usize) -> Self {
        self.max_frames = max_frames;
        self
    }

    /// Replace the minimum slice normal length.
    pub fn min_normal_length(mut self, min_normal_length: f64) -> Self {
        self.min_normal_length = min_normal_length;
        self
    }
}

/// A frame in sorted order.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SortedFrame {
    /// the physical frame index
    pub frame: FrameIndex,
    /// the frame's _Image Position (Patient)_, if the sorter used it
    pub position: Option<[f64; 3]>,
    /// the value the frames were sorted by
    pub key: f64,
}

/// A strategy for ordering the frames of a group store.
pub trait FrameSorter {
    /// Sort the frames described by the given store.
    fn sort(&self, store: &GroupStore) -> Result<Vec<SortedFrame>>;

    /// A human readable description of the sort criterion.
    fn description(&self) -> &'static str;
}

/// Keeps frames in the order of their frame index.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct IdentitySorter {
    options: SortOptions,
}

impl IdentitySorter {
    pub fn new(options: SortOptions) -> Self {
        IdentitySorter { options }
    }
}

impl FrameSorter for IdentitySorter {
    fn sort(&self, store: &GroupStore) -> Result<Vec<SortedFrame>> {
        check_frame_count(store, &self.options)?;
        Ok(store
            .frames()
            .map(|frame| SortedFrame {
                frame,
                position: None,
                key: f64::from(frame),
            })
            .collect())
    }

    fn description(&self) -> &'static str {
        "Frames in their original order"
    }
}

/// Sorts frames by the projection of their _Image Position (Patient)_
/// onto the slice normal.
///
/// Requires a shared _Plane Orientation (Patient)_ group,
/// so that all frames are parallel,
/// and a per-frame _Plane Position (Patient)_ group on every frame.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct PositionSorter {
    options: SortOptions,
}

impl PositionSorter {
    pub fn new(options: SortOptions) -> Self {
        PositionSorter { options }
    }

    /// The unit normal of the shared imaging plane.
    pub fn slice_direction(&self, store: &GroupStore) -> Result<[f64; 3]> {
        slice_direction(store, &self.options)
    }
}

impl FrameSorter for PositionSorter {
    fn sort(&self, store: &GroupStore) -> Result<Vec<SortedFrame>> {
        let count = check_frame_count(store, &self.options)?;
        let direction = slice_direction(store, &self.options)?;

        let mut sorted = Vec::with_capacity(count);
        for frame in store.frames() {
            let (group, per_frame) = store
                .get(frame, GroupType::PlanePosition)
                .context(MissingGroupSnafu {
                    group_type: GroupType::PlanePosition,
                    frame,
                })?;
            ensure!(per_frame || count == 1, PositionNotPerFrameSnafu { count });
            let position = group
                .as_plane_position()
                .context(UninterpretedGroupSnafu {
                    group_type: GroupType::PlanePosition,
                    frame,
                })?
                .image_position;
            ensure!(
                position.iter().all(|v| v.is_finite()),
                NonFinitePositionSnafu { frame }
            );
            sorted.push(SortedFrame {
                frame,
                position: Some(position),
                key: dot(position, direction),
            });
        }

        // stable, so frames at the same position keep their index order
        sorted.sort_by(|a, b| a.key.total_cmp(&b.key));
        Ok(sorted)
    }

    fn description(&self) -> &'static str {
        "Frames sorted by Image Position (Patient) along the slice normal"
    }
}

/// Compute the unit normal of the imaging plane
/// from the shared _Image Orientation (Patient)_.
pub fn slice_direction(store: &GroupStore, options: &SortOptions) -> Result<[f64; 3]> {
    let (group, per_frame) = store
        .get(0, GroupType::PlaneOrientation)
        .context(MissingGroupSnafu {
            group_type: GroupType::PlaneOrientation,
            frame: 0_u32,
        })?;
    ensure!(!per_frame, FramesNotParallelSnafu);
    let orientation = group
        .as_plane_orientation()
        .context(UninterpretedGroupSnafu {
            group_type: GroupType::PlaneOrientation,
            frame: 0_u32,
        })?;

    let normal = cross(orientation.row(), orientation.column());
    let length = dot(normal, normal).sqrt();
    ensure!(
        length.is_finite() && length >= options.min_normal_length,
        DegenerateOrientationSnafu {
            orientation: orientation.image_orientation,
            length,
        }
    );
    let direction = [normal[0] / length, normal[1] / length, normal[2] / length];
    debug!(
        "Image Orientation (Patient) {:?}, slice normal {:?}",
        orientation.image_orientation, direction
    );
    Ok(direction)
}

fn check_frame_count(store: &GroupStore, options: &SortOptions) -> Result<usize> {
    let count = store.number_of_frames();
    ensure!(count > 0, NotEnoughItemsSnafu);
    ensure!(
        count <= options.max_frames,
        TooManyItemsSnafu {
            count,
            max: options.max_frames,
        }
    );
    if !store.has_dense_frames() {
        let max_index = store.frames().last().unwrap_or_default();
        return NonDenseFramesSnafu { count, max_index }.fail();
    }
    Ok(count)
}

#[inline]
fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[inline]
fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}
