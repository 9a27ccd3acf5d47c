//! Grouping of physical frames into logical frames,
//! one per distinct slice position.

use dicom_fg::sorter::{self, FrameSorter, PositionSorter, SortOptions, SortedFrame};
use dicom_fg::{FrameIndex, GroupStore, GroupType};
use snafu::{ensure, Backtrace, OptionExt, ResultExt, Snafu};
use tracing::{debug, trace};

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("No frames to group"))]
    NotEnoughItems { backtrace: Backtrace },

    #[snafu(display("Could not sort frames by position"))]
    SortFrames {
        #[snafu(backtrace)]
        source: sorter::Error,
    },

    #[snafu(display("Missing Pixel Measures functional group with Slice Thickness"))]
    MissingSliceThickness { backtrace: Backtrace },

    #[snafu(display("Invalid Slice Thickness {}", value))]
    InvalidSliceThickness { value: f64, backtrace: Backtrace },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Options for grouping frames by position.
#[derive(Debug, Copy, Clone, PartialEq)]
#[non_exhaustive]
pub struct GroupingOptions {
    /// the fraction of the slice thickness below which
    /// two consecutive frames are considered to be at the same position
    pub tolerance_factor: f64,
}

impl Default for GroupingOptions {
    fn default() -> Self {
        GroupingOptions {
            tolerance_factor: 0.01,
        }
    }
}

impl GroupingOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the tolerance factor.
    pub fn tolerance_factor(mut self, tolerance_factor: f64) -> Self {
        self.tolerance_factor = tolerance_factor;
        self
    }
}

/// The physical frames found at one slice position,
/// in sort order.
pub type LogicalFrame = Vec<FrameIndex>;

/// Read the slice thickness which applies to the first frame,
/// from a shared or per-frame _Pixel Measures_ group.
pub fn slice_thickness(store: &GroupStore) -> Result<f64> {
    let value = store
        .get(0, GroupType::PixelMeasures)
        .and_then(|(group, _)| group.as_pixel_measures())
        .and_then(|measures| measures.slice_thickness)
        .context(MissingSliceThicknessSnafu)?;
    ensure!(
        value.is_finite() && value > 0.,
        InvalidSliceThicknessSnafu { value }
    );
    Ok(value)
}

/// Partition sorted frames into logical frames.
///
/// A frame joins the current logical frame
/// if its sort key differs from the key of the frame before it
/// by less than `slice_thickness * tolerance_factor`.
/// Otherwise it starts a new logical frame.
pub fn group_by_position(
    sorted: &[SortedFrame],
    slice_thickness: f64,
    options: &GroupingOptions,
) -> Result<Vec<LogicalFrame>> {
    let (first, rest) = sorted.split_first().context(NotEnoughItemsSnafu)?;
    let tolerance = slice_thickness * options.tolerance_factor;
    trace!("Grouping {} frames, tolerance {}", sorted.len(), tolerance);

    let mut logical_frames = vec![vec![first.frame]];
    let mut previous = first.key;
    for frame in rest {
        if (frame.key - previous).abs() < tolerance {
            if let Some(current) = logical_frames.last_mut() {
                current.push(frame.frame);
            }
        } else {
            logical_frames.push(vec![frame.frame]);
        }
        previous = frame.key;
    }
    Ok(logical_frames)
}

/// Sort the frames of a store by position
/// and group them into logical frames.
pub fn frames_by_position(
    store: &GroupStore,
    sort_options: SortOptions,
    options: &GroupingOptions,
) -> Result<Vec<LogicalFrame>> {
    let sorted = PositionSorter::new(sort_options)
        .sort(store)
        .context(SortFramesSnafu)?;
    let thickness = slice_thickness(store)?;
    let logical_frames = group_by_position(&sorted, thickness, options)?;
    debug!(
        "{} frames at {} distinct positions",
        sorted.len(),
        logical_frames.len()
    );
    Ok(logical_frames)
}
