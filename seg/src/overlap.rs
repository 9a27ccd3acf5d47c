//! Analysis of overlapping segments.
//!
//! Segments of a binary segmentation may share pixels.
//! The [`OverlapAnalyzer`] finds out which segments do,
//! by comparing the frames of every pair of segments
//! found at the same slice position,
//! and groups the segments into sets of mutually non-overlapping segments.
//!
//! Segments which never appear at the same slice position
//! are assumed not to overlap.
//! This assumption only holds if frames of overlapping segments
//! are always grouped to the same logical frame.

use crate::binary;
use crate::position::{self, GroupingOptions, LogicalFrame};
use dicom_fg::sorter::SortOptions;
use dicom_fg::{FrameIndex, GroupStore, GroupType};
use snafu::{ensure, Backtrace, OptionExt, ResultExt, Snafu};
use std::fmt::{self, Write as _};
use std::time::Instant;
use tracing::{debug, enabled, trace, Level};

/// The 1-based number of a segment.
pub type SegmentNumber = u16;

/// A set of segments none of which overlap each other.
pub type SegmentGroup = Vec<SegmentNumber>;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("Could not group frames by position"))]
    GroupFrames {
        #[snafu(backtrace)]
        source: position::Error,
    },

    #[snafu(display("Frame {} has no Segmentation functional group", frame))]
    MissingSegmentation {
        frame: FrameIndex,
        backtrace: Backtrace,
    },

    #[snafu(display(
        "Segmentation functional group of frame {} could not be interpreted",
        frame
    ))]
    UninterpretedSegmentation {
        frame: FrameIndex,
        backtrace: Backtrace,
    },

    #[snafu(display(
        "Frame {} references segment {} but only segments 1 to {} exist",
        frame,
        segment,
        count
    ))]
    InvalidSegmentNumber {
        frame: FrameIndex,
        segment: SegmentNumber,
        count: usize,
        backtrace: Backtrace,
    },

    #[snafu(display(
        "Number of segments {} exceeds the maximum of {}",
        count,
        SegmentNumber::MAX
    ))]
    TooManyItems { count: usize, backtrace: Backtrace },

    #[snafu(display("No pixel data for frame {}", frame))]
    MissingFrameData {
        frame: FrameIndex,
        backtrace: Backtrace,
    },

    #[snafu(display("Could not compare frames {} and {}", first, second))]
    CompareFrames {
        first: FrameIndex,
        second: FrameIndex,
        #[snafu(backtrace)]
        source: binary::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A provider of the segmentation data needed for overlap analysis.
pub trait SegmentationSource {
    /// The shared and per-frame functional groups.
    fn functional_groups(&self) -> &GroupStore;

    /// The number of segments, numbered from 1.
    fn number_of_segments(&self) -> usize;

    fn rows(&self) -> u16;

    fn columns(&self) -> u16;

    /// The bit-packed pixel data of a frame.
    fn frame(&self, index: FrameIndex) -> Option<&[u8]>;
}

/// A segment found at a logical frame position,
/// with the frame representing it there.
#[derive(Debug, Copy, Clone, Eq, Hash, PartialEq)]
pub struct SegmentAndFrame {
    pub segment: SegmentNumber,
    pub frame: FrameIndex,
}

/// Whether two segments overlap.
#[derive(Debug, Copy, Clone, Eq, Hash, PartialEq)]
pub enum OverlapState {
    /// not yet compared
    Unknown,
    /// no pixel in common
    Disjoint,
    /// at least one pixel in common
    Overlapping,
}

/// A symmetric matrix of the overlap state of every pair of segments.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlapMatrix {
    size: usize,
    cells: Vec<OverlapState>,
}

impl OverlapMatrix {
    /// Create a matrix for `size` segments,
    /// with all pairs of distinct segments unknown.
    pub fn new(size: usize) -> Self {
        let mut cells = vec![OverlapState::Unknown; size * size];
        for i in 0..size {
            cells[i * size + i] = OverlapState::Disjoint;
        }
        OverlapMatrix { size, cells }
    }

    /// The number of segments.
    pub fn size(&self) -> usize {
        self.size
    }

    /// The overlap state of two segments,
    /// or `None` if either segment number is out of range.
    pub fn get(&self, a: SegmentNumber, b: SegmentNumber) -> Option<OverlapState> {
        self.index(a, b).map(|i| self.cells[i])
    }

    /// Whether the two segments are known to overlap.
    pub fn overlaps(&self, a: SegmentNumber, b: SegmentNumber) -> bool {
        self.get(a, b) == Some(OverlapState::Overlapping)
    }

    /// Whether any two segments overlap.
    pub fn has_overlaps(&self) -> bool {
        self.cells.contains(&OverlapState::Overlapping)
    }

    fn set(&mut self, a: SegmentNumber, b: SegmentNumber, state: OverlapState) {
        if a == b {
            return;
        }
        if let (Some(i), Some(j)) = (self.index(a, b), self.index(b, a)) {
            self.cells[i] = state;
            self.cells[j] = state;
        }
    }

    fn resolve_unknown(&mut self, state: OverlapState) {
        for cell in &mut self.cells {
            if *cell == OverlapState::Unknown {
                *cell = state;
            }
        }
    }

    fn index(&self, a: SegmentNumber, b: SegmentNumber) -> Option<usize> {
        let (a, b) = (usize::from(a), usize::from(b));
        if a == 0 || b == 0 || a > self.size || b > self.size {
            return None;
        }
        Some((a - 1) * self.size + (b - 1))
    }
}

impl fmt::Display for OverlapMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.cells.chunks(self.size.max(1)) {
            for cell in row {
                let c = match cell {
                    OverlapState::Unknown => '?',
                    OverlapState::Disjoint => '0',
                    OverlapState::Overlapping => '1',
                };
                write!(f, "{} ", c)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Options for overlap analysis.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
#[non_exhaustive]
pub struct AnalyzerOptions {
    /// how frames are sorted by position
    pub sort: SortOptions,
    /// how sorted frames are grouped into logical frames
    pub grouping: GroupingOptions,
}

impl AnalyzerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the frame sorting options.
    pub fn sort(mut self, sort: SortOptions) -> Self {
        self.sort = sort;
        self
    }

    /// Replace the logical frame grouping options.
    pub fn grouping(mut self, grouping: GroupingOptions) -> Self {
        self.grouping = grouping;
        self
    }
}

/// Finds overlapping segments in a binary segmentation.
///
/// Results are computed on first request and kept
/// until the source is replaced or [`clear`](Self::clear) is called.
/// The source is borrowed for as long as the analyzer lives,
/// so it cannot change under a computed result.
#[derive(Debug)]
pub struct OverlapAnalyzer<'s, S: ?Sized> {
    source: &'s S,
    options: AnalyzerOptions,
    frames_by_position: Option<Vec<LogicalFrame>>,
    segments_by_position: Option<Vec<Vec<SegmentAndFrame>>>,
    overlap_matrix: Option<OverlapMatrix>,
    non_overlapping_segments: Option<Vec<SegmentGroup>>,
}

impl<'s, S> OverlapAnalyzer<'s, S>
where
    S: ?Sized + SegmentationSource,
{
    pub fn new(source: &'s S, options: AnalyzerOptions) -> Self {
        OverlapAnalyzer {
            source,
            options,
            frames_by_position: None,
            segments_by_position: None,
            overlap_matrix: None,
            non_overlapping_segments: None,
        }
    }

    /// Analyze another segmentation, discarding all results.
    pub fn set_source(&mut self, source: &'s S) {
        self.source = source;
        self.clear();
    }

    /// Discard all computed results.
    pub fn clear(&mut self) {
        self.frames_by_position = None;
        self.segments_by_position = None;
        self.overlap_matrix = None;
        self.non_overlapping_segments = None;
    }

    /// The physical frames grouped by slice position,
    /// in ascending position order.
    pub fn frames_by_position(&mut self) -> Result<&[LogicalFrame]> {
        if self.frames_by_position.is_none() {
            let start = Instant::now();
            let logical_frames = position::frames_by_position(
                self.source.functional_groups(),
                self.options.sort,
                &self.options.grouping,
            )
            .context(GroupFramesSnafu)?;
            if enabled!(Level::DEBUG) {
                for (i, frames) in logical_frames.iter().enumerate() {
                    debug!("Logical frame #{}: {:?}", i, frames);
                }
            }
            debug!("Grouping frames by position took {:?}", start.elapsed());
            self.frames_by_position = Some(logical_frames);
        }
        Ok(self.frames_by_position.as_deref().unwrap_or_default())
    }

    /// The distinct segments found at each logical frame,
    /// each with the first frame representing it there.
    pub fn segments_by_position(&mut self) -> Result<&[Vec<SegmentAndFrame>]> {
        if self.segments_by_position.is_none() {
            self.frames_by_position()?;
            let start = Instant::now();
            let logical_frames = self.frames_by_position.as_deref().unwrap_or_default();
            let segments = collect_segments(self.source, logical_frames)?;
            if enabled!(Level::DEBUG) {
                debug!("{}", format_segments_by_position(&segments));
            }
            debug!("Grouping segments by position took {:?}", start.elapsed());
            self.segments_by_position = Some(segments);
        }
        Ok(self.segments_by_position.as_deref().unwrap_or_default())
    }

    /// The overlap state of every pair of segments.
    ///
    /// Pairs of segments which never share a logical frame
    /// are reported as disjoint.
    pub fn overlap_matrix(&mut self) -> Result<&OverlapMatrix> {
        if self.overlap_matrix.is_none() {
            self.segments_by_position()?;
            let start = Instant::now();
            let segments = self.segments_by_position.as_deref().unwrap_or_default();
            let matrix = build_overlap_matrix(self.source, segments)?;
            if enabled!(Level::DEBUG) {
                debug!("Overlap matrix:\n{}", matrix);
            }
            debug!("Building overlap matrix took {:?}", start.elapsed());
            self.overlap_matrix = Some(matrix);
        }
        let matrix: &OverlapMatrix = self
            .overlap_matrix
            .get_or_insert_with(|| OverlapMatrix::new(0));
        Ok(matrix)
    }

    /// Groups of segments which do not overlap each other.
    ///
    /// Each segment is placed in the first group
    /// with none of whose members it overlaps.
    /// The number of groups is not guaranteed to be minimal.
    pub fn non_overlapping_segments(&mut self) -> Result<&[SegmentGroup]> {
        if self.non_overlapping_segments.is_none() {
            self.overlap_matrix()?;
            let start = Instant::now();
            let groups = match &self.overlap_matrix {
                Some(matrix) => group_non_overlapping(matrix),
                None => Vec::new(),
            };
            if enabled!(Level::DEBUG) {
                debug!("{}", format_segment_groups(&groups));
            }
            debug!("Grouping non-overlapping segments took {:?}", start.elapsed());
            self.non_overlapping_segments = Some(groups);
        }
        Ok(self.non_overlapping_segments.as_deref().unwrap_or_default())
    }

    /// Whether any two segments overlap.
    pub fn has_overlapping_segments(&mut self) -> Result<bool> {
        Ok(self.overlap_matrix()?.has_overlaps())
    }

    /// A human readable table of the segments found at each logical frame.
    pub fn dump_segments_by_position(&mut self) -> Result<String> {
        self.segments_by_position().map(format_segments_by_position)
    }

    /// A human readable rendition of the overlap matrix.
    pub fn dump_overlap_matrix(&mut self) -> Result<String> {
        self.overlap_matrix()
            .map(|matrix| format!("Overlap matrix:\n{}", matrix))
    }

    /// A human readable list of the groups of non-overlapping segments.
    pub fn dump_non_overlapping_segments(&mut self) -> Result<String> {
        self.non_overlapping_segments().map(format_segment_groups)
    }
}

fn collect_segments<S>(
    source: &S,
    logical_frames: &[LogicalFrame],
) -> Result<Vec<Vec<SegmentAndFrame>>>
where
    S: ?Sized + SegmentationSource,
{
    let store = source.functional_groups();
    let count = source.number_of_segments();
    ensure!(
        count <= usize::from(SegmentNumber::MAX),
        TooManyItemsSnafu { count }
    );

    let mut out = Vec::with_capacity(logical_frames.len());
    for frames in logical_frames {
        let mut segments: Vec<SegmentAndFrame> = Vec::new();
        for &frame in frames {
            let (group, _) = store
                .get(frame, GroupType::Segmentation)
                .context(MissingSegmentationSnafu { frame })?;
            let segment = group
                .as_segmentation()
                .context(UninterpretedSegmentationSnafu { frame })?
                .referenced_segment_number;
            ensure!(
                segment > 0 && usize::from(segment) <= count,
                InvalidSegmentNumberSnafu {
                    frame,
                    segment,
                    count,
                }
            );
            if !segments.iter().any(|s| s.segment == segment) {
                segments.push(SegmentAndFrame { segment, frame });
            }
        }
        out.push(segments);
    }
    Ok(out)
}

fn build_overlap_matrix<S>(source: &S, segments: &[Vec<SegmentAndFrame>]) -> Result<OverlapMatrix>
where
    S: ?Sized + SegmentationSource,
{
    let (rows, columns) = (source.rows(), source.columns());
    let mut matrix = OverlapMatrix::new(source.number_of_segments());

    for (position, segments) in segments.iter().enumerate() {
        trace!("Comparing segments at logical frame #{}", position);
        for (i, a) in segments.iter().enumerate() {
            for b in &segments[i + 1..] {
                if matrix.overlaps(a.segment, b.segment) {
                    trace!(
                        "Segments {} and {} already overlap, skipping logical frame #{}",
                        a.segment,
                        b.segment,
                        position
                    );
                    continue;
                }
                let first = source
                    .frame(a.frame)
                    .context(MissingFrameDataSnafu { frame: a.frame })?;
                let second = source
                    .frame(b.frame)
                    .context(MissingFrameDataSnafu { frame: b.frame })?;
                let overlap = binary::frames_overlap(first, second, rows, columns).context(
                    CompareFramesSnafu {
                        first: a.frame,
                        second: b.frame,
                    },
                )?;
                trace!(
                    "Frames {} and {} {}",
                    a.frame,
                    b.frame,
                    if overlap { "overlap" } else { "do not overlap" }
                );
                let state = if overlap {
                    OverlapState::Overlapping
                } else {
                    OverlapState::Disjoint
                };
                matrix.set(a.segment, b.segment, state);
            }
        }
    }

    // never found at the same position
    matrix.resolve_unknown(OverlapState::Disjoint);
    Ok(matrix)
}

fn group_non_overlapping(matrix: &OverlapMatrix) -> Vec<SegmentGroup> {
    let mut groups: Vec<SegmentGroup> = Vec::new();
    // segment numbers were bounded when the matrix was built
    let count = matrix.size().min(usize::from(SegmentNumber::MAX)) as SegmentNumber;
    for segment in 1..=count {
        let free = groups
            .iter_mut()
            .find(|group| group.iter().all(|&other| !matrix.overlaps(segment, other)));
        match free {
            Some(group) => group.push(segment),
            None => groups.push(vec![segment]),
        }
    }
    groups
}

fn format_segments_by_position(segments: &[Vec<SegmentAndFrame>]) -> String {
    let mut out = String::from("Segments by logical frame (segment, frame):\n");
    for (i, segments) in segments.iter().enumerate() {
        let _ = write!(out, "Logical frame #{}:", i);
        for s in segments {
            let _ = write!(out, " ({}, {})", s.segment, s.frame);
        }
        out.push('\n');
    }
    out
}

fn format_segment_groups(groups: &[SegmentGroup]) -> String {
    let mut out = String::from("Non-overlapping segments:\n");
    for (i, group) in groups.iter().enumerate() {
        let members: Vec<String> = group.iter().map(|s| s.to_string()).collect();
        let _ = writeln!(out, "Group #{}: {}", i, members.join(", "));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicom_fg::{
        FrameContent, PixelMeasures, PlaneOrientation, PlanePosition, SegmentIdentification,
    };

    /// 2x4 frames, so the byte-wise comparison applies
    struct Mock {
        store: GroupStore,
        segments: usize,
        frames: Vec<Vec<u8>>,
    }

    impl Mock {
        fn new(segments: usize) -> Self {
            let mut store = GroupStore::new();
            store
                .add_shared(PlaneOrientation::new([1., 0., 0.], [0., 1., 0.]).into())
                .unwrap();
            store
                .add_shared(PixelMeasures::with_slice_thickness(1.).into())
                .unwrap();
            Mock {
                store,
                segments,
                frames: Vec::new(),
            }
        }

        fn add(&mut self, segment: SegmentNumber, z: f64, pixels: u8) {
            let f = self.frames.len() as FrameIndex;
            self.store
                .add_per_frame(f, FrameContent::default().into())
                .unwrap();
            self.store
                .add_per_frame(f, PlanePosition::new(0., 0., z).into())
                .unwrap();
            self.store
                .add_per_frame(f, SegmentIdentification::new(segment).into())
                .unwrap();
            self.frames.push(vec![pixels]);
        }
    }

    impl SegmentationSource for Mock {
        fn functional_groups(&self) -> &GroupStore {
            &self.store
        }

        fn number_of_segments(&self) -> usize {
            self.segments
        }

        fn rows(&self) -> u16 {
            2
        }

        fn columns(&self) -> u16 {
            4
        }

        fn frame(&self, index: FrameIndex) -> Option<&[u8]> {
            self.frames.get(index as usize).map(|f| f.as_slice())
        }
    }

    fn sample() -> Mock {
        let mut mock = Mock::new(4);
        // slice 0: segments 1 and 2 overlap, 3 is apart
        mock.add(1, 0., 0b0000_0011);
        mock.add(2, 0., 0b0000_0010);
        mock.add(3, 0., 0b1000_0000);
        // slice 1: segments 1 and 3 are disjoint, 4 overlaps 3
        mock.add(3, 1., 0b0000_1100);
        mock.add(1, 1., 0b0011_0000);
        mock.add(4, 1., 0b0000_0100);
        mock
    }

    #[test]
    fn segments_are_found_per_position() {
        let mock = sample();
        let mut analyzer = OverlapAnalyzer::new(&mock, AnalyzerOptions::default());
        assert_eq!(
            analyzer.frames_by_position().unwrap(),
            &[vec![0, 1, 2], vec![3, 4, 5]]
        );
        let segments = analyzer.segments_by_position().unwrap();
        let numbers: Vec<Vec<SegmentNumber>> = segments
            .iter()
            .map(|s| s.iter().map(|s| s.segment).collect())
            .collect();
        assert_eq!(numbers, vec![vec![1, 2, 3], vec![3, 1, 4]]);
        assert_eq!(segments[1][0], SegmentAndFrame { segment: 3, frame: 3 });
    }

    #[test]
    fn overlap_matrix_is_symmetric() {
        let mock = sample();
        let mut analyzer = OverlapAnalyzer::new(&mock, AnalyzerOptions::default());
        let matrix = analyzer.overlap_matrix().unwrap().clone();
        assert!(matrix.overlaps(1, 2));
        assert!(matrix.overlaps(3, 4));
        assert!(!matrix.overlaps(1, 3));
        // never at the same position
        assert_eq!(matrix.get(2, 4), Some(OverlapState::Disjoint));
        for a in 1..=4 {
            assert_eq!(matrix.get(a, a), Some(OverlapState::Disjoint));
            for b in 1..=4 {
                assert_eq!(matrix.get(a, b), matrix.get(b, a));
            }
        }
        assert_eq!(matrix.get(0, 1), None);
        assert_eq!(matrix.get(1, 5), None);
        assert!(analyzer.has_overlapping_segments().unwrap());
    }

    #[test]
    fn overlap_found_at_a_later_position_is_kept() {
        let mut mock = Mock::new(2);
        mock.add(1, 0., 0b0000_0001);
        mock.add(2, 0., 0b0000_0010);
        mock.add(1, 1., 0b0000_0001);
        mock.add(2, 1., 0b0000_0001);
        mock.add(1, 2., 0b0000_0001);
        mock.add(2, 2., 0b0000_0010);
        let mut analyzer = OverlapAnalyzer::new(&mock, AnalyzerOptions::default());
        assert!(analyzer.overlap_matrix().unwrap().overlaps(1, 2));
    }

    #[test]
    fn greedy_grouping() {
        let mock = sample();
        let mut analyzer = OverlapAnalyzer::new(&mock, AnalyzerOptions::default());
        let groups = analyzer.non_overlapping_segments().unwrap().to_vec();
        // 1: new group; 2 overlaps 1; 3 joins 1; 4 overlaps 3 so joins 2
        assert_eq!(groups, vec![vec![1, 3], vec![2, 4]]);

        let matrix = analyzer.overlap_matrix().unwrap();
        for group in &groups {
            for &a in group {
                for &b in group {
                    assert!(!matrix.overlaps(a, b));
                }
            }
        }
    }

    #[test]
    fn no_overlap_means_a_single_group() {
        let mut mock = Mock::new(3);
        mock.add(1, 0., 0b0000_0001);
        mock.add(2, 0., 0b0000_0010);
        mock.add(3, 5., 0b0000_0011);
        let mut analyzer = OverlapAnalyzer::new(&mock, AnalyzerOptions::default());
        assert!(!analyzer.has_overlapping_segments().unwrap());
        assert_eq!(analyzer.non_overlapping_segments().unwrap(), &[vec![1, 2, 3]]);
    }

    #[test]
    fn invalid_segment_numbers_are_reported() {
        let mut mock = Mock::new(1);
        mock.add(1, 0., 1);
        mock.add(2, 1., 1);
        let mut analyzer = OverlapAnalyzer::new(&mock, AnalyzerOptions::default());
        assert!(matches!(
            analyzer.segments_by_position(),
            Err(Error::InvalidSegmentNumber {
                frame: 1,
                segment: 2,
                count: 1,
                ..
            })
        ));

        let mut mock = Mock::new(1);
        mock.add(0, 0., 1);
        let mut analyzer = OverlapAnalyzer::new(&mock, AnalyzerOptions::default());
        assert!(matches!(
            analyzer.overlap_matrix(),
            Err(Error::InvalidSegmentNumber { segment: 0, .. })
        ));
    }

    #[test]
    fn new_source_discards_results() {
        let first = sample();
        let mut second = Mock::new(1);
        second.add(1, 0., 1);

        let mut analyzer = OverlapAnalyzer::new(&first, AnalyzerOptions::default());
        assert_eq!(analyzer.non_overlapping_segments().unwrap().len(), 2);
        analyzer.set_source(&second);
        assert_eq!(analyzer.non_overlapping_segments().unwrap(), &[vec![1]]);
        assert_eq!(analyzer.frames_by_position().unwrap(), &[vec![0]]);
    }

    #[test]
    fn dumps() {
        let mock = sample();
        let mut analyzer = OverlapAnalyzer::new(&mock, AnalyzerOptions::default());
        assert_eq!(
            analyzer.dump_overlap_matrix().unwrap(),
            "Overlap matrix:\n0 1 0 0 \n1 0 0 0 \n0 0 0 1 \n0 0 1 0 \n"
        );
        assert_eq!(
            analyzer.dump_non_overlapping_segments().unwrap(),
            "Non-overlapping segments:\nGroup #0: 1, 3\nGroup #1: 2, 4\n"
        );
        let table = analyzer.dump_segments_by_position().unwrap();
        assert!(table.contains("Logical frame #1: (3, 3) (1, 4) (4, 5)"));
    }
}
