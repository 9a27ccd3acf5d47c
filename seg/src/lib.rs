//! This crate contains support for binary DICOM segmentations:
//! the bit-packed frame layout of their pixel data,
//! the grouping of frames into slice positions,
//! and the analysis of which segments overlap.
//!
//! # Examples
//!
//! ```
//! # use std::error::Error;
//! use dicom_fg::{FrameContent, FunctionalGroup, PixelMeasures, PlaneOrientation, PlanePosition};
//! use dicom_seg::{AlgorithmType, AnalyzerOptions, OverlapAnalyzer, Segment, Segmentation};
//!
//! # fn main() -> Result<(), Box<dyn Error>> {
//! let mut seg = Segmentation::new(2, 4)?;
//! let bone = seg.add_segment(Segment::new("bone", AlgorithmType::Manual))?;
//! let tumor = seg.add_segment(Segment::new("tumor", AlgorithmType::Automatic))?;
//! seg.add_for_all_frames(PlaneOrientation::new([1., 0., 0.], [0., 1., 0.]).into())?;
//! seg.add_for_all_frames(PixelMeasures::with_slice_thickness(1.5).into())?;
//!
//! let groups = || -> Vec<FunctionalGroup> {
//!     vec![FrameContent::default().into(), PlanePosition::new(0., 0., 0.).into()]
//! };
//! seg.add_frame(&[1, 1, 0, 0, 0, 0, 0, 0], bone, groups())?;
//! seg.add_frame(&[0, 1, 1, 0, 0, 0, 0, 0], tumor, groups())?;
//!
//! let mut analyzer = OverlapAnalyzer::new(&seg, AnalyzerOptions::default());
//! assert!(analyzer.has_overlapping_segments()?);
//! assert_eq!(analyzer.non_overlapping_segments()?.len(), 2);
//! #   Ok(())
//! # }
//! ```

pub mod binary;
pub mod overlap;
pub mod position;
pub mod segmentation;

pub use overlap::{
    AnalyzerOptions, OverlapAnalyzer, OverlapMatrix, OverlapState, SegmentGroup, SegmentNumber,
    SegmentationSource,
};
pub use position::{GroupingOptions, LogicalFrame};
pub use segmentation::{AlgorithmType, Segment, Segmentation};
