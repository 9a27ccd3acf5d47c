//! Binary segmentation documents.
//!
//! A [`Segmentation`] holds the segments of a binary segmentation,
//! the functional groups of its frames,
//! and the bit-packed pixel data of each frame.

use crate::binary;
use crate::overlap::{SegmentNumber, SegmentationSource};
use dicom_core::value::{ConvertValueError, PrimitiveValue};
use dicom_core::{DataElement, Tag, VR};
use dicom_dictionary_std::tags;
use dicom_fg::io::{self, WriteOptions};
use dicom_fg::{FrameIndex, FunctionalGroup, GroupStore, GroupType, SegmentIdentification};
use dicom_object::mem::InMemElement;
use dicom_object::InMemDicomObject;
use snafu::{ensure, Backtrace, OptionExt, ResultExt, Snafu};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, error, trace, warn};

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("Invalid frame dimensions {}x{}", rows, columns))]
    InvalidDimensions {
        rows: u16,
        columns: u16,
        backtrace: Backtrace,
    },

    #[snafu(display("Cannot add more than {} segments", SegmentNumber::MAX))]
    TooManySegments { backtrace: Backtrace },

    #[snafu(display("Cannot add more than {} frames", FrameIndex::MAX))]
    TooManyFrames { backtrace: Backtrace },

    #[snafu(display("No segment with number {} (there are {} segments)", segment, count))]
    NoSuchSegment {
        segment: SegmentNumber,
        count: usize,
        backtrace: Backtrace,
    },

    #[snafu(display("Functional group {} for new frame is invalid", group_type))]
    InvalidGroup {
        group_type: GroupType,
        source: dicom_fg::group::CheckGroupError,
        backtrace: Backtrace,
    },

    #[snafu(display("Could not add functional group for all frames"))]
    AddSharedGroup {
        #[snafu(backtrace)]
        source: dicom_fg::store::Error,
    },

    #[snafu(display("Could not add functional group {} to frame {}", group_type, frame))]
    AddFrameGroup {
        group_type: GroupType,
        frame: FrameIndex,
        #[snafu(backtrace)]
        source: dicom_fg::store::Error,
    },

    #[snafu(display("Invalid frame pixel data"))]
    FramePixelData {
        #[snafu(backtrace)]
        source: binary::Error,
    },

    #[snafu(display("Segmentation has no frames"))]
    NoFrames { backtrace: Backtrace },

    #[snafu(display("Segmentation has no segments"))]
    NoSegments { backtrace: Backtrace },

    #[snafu(display("There are more segments ({}) than frames ({})", segments, frames))]
    MoreSegmentsThanFrames {
        segments: usize,
        frames: usize,
        backtrace: Backtrace,
    },

    #[snafu(display(
        "Functional groups describe {} frames but there is pixel data for {}",
        group_frames,
        pixel_frames
    ))]
    FrameCountMismatch {
        group_frames: usize,
        pixel_frames: usize,
        backtrace: Backtrace,
    },

    #[snafu(display(
        "Functional group structure is invalid ({} problems)",
        violations.len()
    ))]
    InvalidStructure {
        violations: Vec<dicom_fg::Violation>,
        backtrace: Backtrace,
    },

    #[snafu(display("Missing required attribute `{}`", name))]
    MissingAttribute {
        name: &'static str,
        backtrace: Backtrace,
    },

    #[snafu(display("Could not convert attribute `{}`", name))]
    ConvertAttribute {
        name: &'static str,
        source: ConvertValueError,
        backtrace: Backtrace,
    },

    #[snafu(display("Unsupported Segmentation Type `{}`, only BINARY is supported", value))]
    UnsupportedSegmentationType { value: String, backtrace: Backtrace },

    #[snafu(display("Invalid Segment Algorithm Type `{}`", value))]
    InvalidAlgorithmType { value: String, backtrace: Backtrace },

    #[snafu(display(
        "Segment #{} has Segment Number {}, segments must be numbered from 1",
        index,
        segment
    ))]
    NonConsecutiveSegments {
        index: usize,
        segment: u16,
        backtrace: Backtrace,
    },

    #[snafu(display("Pixel Data has {} bytes but {} are required", actual, expected))]
    NotEnoughPixelData {
        expected: usize,
        actual: usize,
        backtrace: Backtrace,
    },

    #[snafu(display("Could not read functional groups"))]
    ReadFunctionalGroups {
        #[snafu(backtrace)]
        source: io::ReadError,
    },

    #[snafu(display("Could not write functional groups"))]
    WriteFunctionalGroups {
        #[snafu(backtrace)]
        source: io::WriteError,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// How a segment was created.
#[derive(Debug, Copy, Clone, Eq, Hash, PartialEq)]
pub enum AlgorithmType {
    Automatic,
    SemiAutomatic,
    Manual,
}

impl AlgorithmType {
    /// The code string of the _Segment Algorithm Type_ attribute.
    pub fn code(self) -> &'static str {
        match self {
            AlgorithmType::Automatic => "AUTOMATIC",
            AlgorithmType::SemiAutomatic => "SEMIAUTOMATIC",
            AlgorithmType::Manual => "MANUAL",
        }
    }
}

impl fmt::Display for AlgorithmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for AlgorithmType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "AUTOMATIC" => Ok(AlgorithmType::Automatic),
            "SEMIAUTOMATIC" => Ok(AlgorithmType::SemiAutomatic),
            "MANUAL" => Ok(AlgorithmType::Manual),
            other => Err(other.to_string()),
        }
    }
}

/// A labeled region type of a segmentation.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub label: String,
    pub description: Option<String>,
    pub algorithm_type: AlgorithmType,
}

impl Segment {
    pub fn new(label: impl Into<String>, algorithm_type: AlgorithmType) -> Self {
        Segment {
            label: label.into(),
            description: None,
            algorithm_type,
        }
    }

    /// Replace the segment description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A binary segmentation:
/// segments, functional groups and bit-packed frames.
#[derive(Debug, Clone, PartialEq)]
pub struct Segmentation {
    rows: u16,
    columns: u16,
    segments: Vec<Segment>,
    groups: GroupStore,
    frames: Vec<Vec<u8>>,
}

impl Segmentation {
    /// Create an empty binary segmentation with frames of the given size.
    pub fn new(rows: u16, columns: u16) -> Result<Self> {
        ensure!(
            rows > 0 && columns > 0,
            InvalidDimensionsSnafu { rows, columns }
        );
        Ok(Segmentation {
            rows,
            columns,
            segments: Vec::new(),
            groups: GroupStore::new(),
            frames: Vec::new(),
        })
    }

    pub fn rows(&self) -> u16 {
        self.rows
    }

    pub fn columns(&self) -> u16 {
        self.columns
    }

    pub fn number_of_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn number_of_segments(&self) -> usize {
        self.segments.len()
    }

    /// The segment with the given 1-based number.
    pub fn segment(&self, number: SegmentNumber) -> Option<&Segment> {
        usize::from(number)
            .checked_sub(1)
            .and_then(|i| self.segments.get(i))
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Add a segment, returning its number.
    pub fn add_segment(&mut self, segment: Segment) -> Result<SegmentNumber> {
        ensure!(
            self.segments.len() < usize::from(SegmentNumber::MAX),
            TooManySegmentsSnafu
        );
        self.segments.push(segment);
        Ok(self.segments.len() as SegmentNumber)
    }

    pub fn functional_groups(&self) -> &GroupStore {
        &self.groups
    }

    pub fn functional_groups_mut(&mut self) -> &mut GroupStore {
        &mut self.groups
    }

    /// Add a functional group which applies to all frames.
    pub fn add_for_all_frames(&mut self, group: FunctionalGroup) -> Result<()> {
        self.groups.add_shared(group).context(AddSharedGroupSnafu)
    }

    /// Add a frame of one byte per pixel (non-zero meaning set)
    /// belonging to the given segment,
    /// along with its per-frame functional groups.
    ///
    /// If any group cannot be added,
    /// the groups already added for the new frame are removed again.
    /// Shared groups demoted in the process stay per-frame.
    pub fn add_frame(
        &mut self,
        pixels: &[u8],
        segment: SegmentNumber,
        per_frame_groups: Vec<FunctionalGroup>,
    ) -> Result<FrameIndex> {
        ensure!(
            segment > 0 && usize::from(segment) <= self.segments.len(),
            NoSuchSegmentSnafu {
                segment,
                count: self.segments.len(),
            }
        );
        ensure!(
            self.frames.len() < FrameIndex::MAX as usize,
            TooManyFramesSnafu
        );
        for group in &per_frame_groups {
            group.check().context(InvalidGroupSnafu {
                group_type: group.group_type(),
            })?;
        }
        let packed = binary::pack(pixels, self.rows, self.columns).context(FramePixelDataSnafu)?;

        let frame = self.frames.len() as FrameIndex;
        let groups = per_frame_groups
            .into_iter()
            .chain(std::iter::once(SegmentIdentification::new(segment).into()));
        for group in groups {
            let group_type = group.group_type();
            if let Err(e) = self.groups.add_per_frame(frame, group) {
                error!("Could not add new frame {}: {}", frame, e);
                self.groups.delete_frame(frame);
                return Err(e).context(AddFrameGroupSnafu { group_type, frame });
            }
        }

        self.frames.push(packed);
        trace!("Added frame {} for segment {}", frame, segment);
        Ok(frame)
    }

    /// The bit-packed pixel data of a frame.
    pub fn frame(&self, index: FrameIndex) -> Option<&[u8]> {
        self.frames.get(index as usize).map(|f| f.as_slice())
    }

    /// The pixel data of a frame, one byte per pixel.
    pub fn unpacked_frame(&self, index: FrameIndex) -> Option<Result<Vec<u8>>> {
        self.frame(index).map(|packed| {
            binary::unpack(packed, self.rows, self.columns).context(FramePixelDataSnafu)
        })
    }

    /// The frames which belong to the given segment, in frame order.
    pub fn frames_for_segment(&self, segment: SegmentNumber) -> Vec<FrameIndex> {
        let mut frames = Vec::new();
        for frame in 0..self.frames.len() as FrameIndex {
            match self
                .groups
                .get(frame, GroupType::Segmentation)
                .and_then(|(g, _)| g.as_segmentation())
            {
                Some(s) if s.referenced_segment_number == segment => frames.push(frame),
                Some(_) => {}
                None => warn!("No segmentation functional group for frame {}", frame),
            }
        }
        frames
    }

    /// Check that the segmentation can be written.
    pub fn check(&self, check_structure: bool) -> Result<()> {
        let frames = self.frames.len();
        let segments = self.segments.len();
        ensure!(frames > 0, NoFramesSnafu);
        ensure!(segments > 0, NoSegmentsSnafu);
        ensure!(
            segments <= frames,
            MoreSegmentsThanFramesSnafu { segments, frames }
        );
        let group_frames = self.groups.number_of_frames();
        ensure!(
            group_frames == frames,
            FrameCountMismatchSnafu {
                group_frames,
                pixel_frames: frames,
            }
        );
        if check_structure {
            let violations = self.groups.check();
            ensure!(violations.is_empty(), InvalidStructureSnafu { violations });
        }
        Ok(())
    }

    /// Write the pixel data and the image pixel attributes
    /// of a binary segmentation.
    pub fn write_pixel_data(&self, obj: &mut InMemDicomObject) -> Result<()> {
        let mut data =
            binary::concat(&self.frames, self.rows, self.columns).context(FramePixelDataSnafu)?;
        if data.len() % 2 == 1 {
            data.push(0);
        }
        debug!(
            "Writing {} frames of {}x{} into {} bytes of pixel data",
            self.frames.len(),
            self.rows,
            self.columns,
            data.len()
        );

        obj.put(DataElement::new(tags::ROWS, VR::US, PrimitiveValue::from(self.rows)));
        obj.put(DataElement::new(tags::COLUMNS, VR::US, PrimitiveValue::from(self.columns)));
        obj.put(DataElement::new(
            tags::NUMBER_OF_FRAMES,
            VR::IS,
            PrimitiveValue::from(self.frames.len().to_string()),
        ));
        obj.put(DataElement::new(tags::SAMPLES_PER_PIXEL, VR::US, PrimitiveValue::from(1_u16)));
        obj.put(DataElement::new(
            tags::PHOTOMETRIC_INTERPRETATION,
            VR::CS,
            PrimitiveValue::from("MONOCHROME2"),
        ));
        obj.put(DataElement::new(tags::BITS_ALLOCATED, VR::US, PrimitiveValue::from(1_u16)));
        obj.put(DataElement::new(tags::BITS_STORED, VR::US, PrimitiveValue::from(1_u16)));
        obj.put(DataElement::new(tags::HIGH_BIT, VR::US, PrimitiveValue::from(0_u16)));
        obj.put(DataElement::new(
            tags::PIXEL_REPRESENTATION,
            VR::US,
            PrimitiveValue::from(0_u16),
        ));
        obj.put(DataElement::new(
            tags::SEGMENTATION_TYPE,
            VR::CS,
            PrimitiveValue::from("BINARY"),
        ));
        obj.put(DataElement::new(tags::PIXEL_DATA, VR::OB, PrimitiveValue::U8(data.into())));
        Ok(())
    }

    /// Write the segments, the functional groups and the pixel data
    /// into a data set.
    pub fn write_dataset(&self, obj: &mut InMemDicomObject, options: WriteOptions) -> Result<()> {
        self.check(options.check_structure)?;

        let items = self
            .segments
            .iter()
            .enumerate()
            .map(|(i, segment)| segment_item(i as SegmentNumber + 1, segment))
            .collect::<Vec<_>>();
        obj.put(DataElement::new(
            tags::SEGMENT_SEQUENCE,
            VR::SQ,
            dicom_core::value::DataSetSequence::from(items),
        ));

        // structure was checked above
        io::write_dataset(&self.groups, obj, options.check_structure(false))
            .context(WriteFunctionalGroupsSnafu)?;
        self.write_pixel_data(obj)
    }

    /// Read a binary segmentation from a data set.
    pub fn read_dataset(obj: &InMemDicomObject) -> Result<Self> {
        let segmentation_type = required_str(obj, tags::SEGMENTATION_TYPE, "SegmentationType")?;
        ensure!(
            segmentation_type == "BINARY",
            UnsupportedSegmentationTypeSnafu {
                value: segmentation_type,
            }
        );
        let rows = required_u16(obj, tags::ROWS, "Rows")?;
        let columns = required_u16(obj, tags::COLUMNS, "Columns")?;
        let number_of_frames = required(obj, tags::NUMBER_OF_FRAMES, "NumberOfFrames")?
            .to_int::<u32>()
            .context(ConvertAttributeSnafu {
                name: "NumberOfFrames",
            })?;

        let mut segmentation = Segmentation::new(rows, columns)?;
        let items = obj
            .get(tags::SEGMENT_SEQUENCE)
            .and_then(|e| e.items())
            .context(MissingAttributeSnafu {
                name: "SegmentSequence",
            })?;
        for (index, item) in items.iter().enumerate() {
            let segment = required_u16(item, tags::SEGMENT_NUMBER, "SegmentNumber")?;
            ensure!(
                usize::from(segment) == index + 1,
                NonConsecutiveSegmentsSnafu { index, segment }
            );
            segmentation.add_segment(read_segment(item)?)?;
        }

        segmentation.groups = io::read_dataset(obj).context(ReadFunctionalGroupsSnafu)?;
        segmentation.frames = read_pixel_data(obj, rows, columns, number_of_frames as usize)?;
        debug!(
            "Read segmentation with {} segments and {} frames",
            segmentation.segments.len(),
            segmentation.frames.len()
        );
        Ok(segmentation)
    }
}

impl SegmentationSource for Segmentation {
    fn functional_groups(&self) -> &GroupStore {
        &self.groups
    }

    fn number_of_segments(&self) -> usize {
        self.segments.len()
    }

    fn rows(&self) -> u16 {
        self.rows
    }

    fn columns(&self) -> u16 {
        self.columns
    }

    fn frame(&self, index: FrameIndex) -> Option<&[u8]> {
        Segmentation::frame(self, index)
    }
}

/// Read the bit-packed frames of a binary segmentation's _Pixel Data_.
///
/// Pixel data shorter than the frames require is an error,
/// while trailing data beyond the even-padded length only causes a warning.
pub fn read_pixel_data(
    obj: &InMemDicomObject,
    rows: u16,
    columns: u16,
    number_of_frames: usize,
) -> Result<Vec<Vec<u8>>> {
    let data = required(obj, tags::PIXEL_DATA, "PixelData")?
        .value()
        .to_bytes()
        .context(ConvertAttributeSnafu { name: "PixelData" })?;

    let required_bytes = binary::total_bytes_required(rows, columns, number_of_frames)
        .context(FramePixelDataSnafu)?;
    let expected = required_bytes + required_bytes % 2;
    ensure!(
        data.len() >= required_bytes,
        NotEnoughPixelDataSnafu {
            expected,
            actual: data.len(),
        }
    );
    if data.len() > expected {
        warn!(
            "Too many bytes in Pixel Data: found {} but {} expected",
            data.len(),
            expected
        );
    }
    binary::extract(&data, number_of_frames, rows, columns).context(FramePixelDataSnafu)
}

fn segment_item(number: SegmentNumber, segment: &Segment) -> InMemDicomObject {
    let mut item = InMemDicomObject::new_empty();
    item.put(DataElement::new(tags::SEGMENT_NUMBER, VR::US, PrimitiveValue::from(number)));
    item.put(DataElement::new(
        tags::SEGMENT_LABEL,
        VR::LO,
        PrimitiveValue::from(segment.label.as_str()),
    ));
    if let Some(description) = &segment.description {
        item.put(DataElement::new(
            tags::SEGMENT_DESCRIPTION,
            VR::ST,
            PrimitiveValue::from(description.as_str()),
        ));
    }
    item.put(DataElement::new(
        tags::SEGMENT_ALGORITHM_TYPE,
        VR::CS,
        PrimitiveValue::from(segment.algorithm_type.code()),
    ));
    item
}

fn read_segment(item: &InMemDicomObject) -> Result<Segment> {
    let label = required_str(item, tags::SEGMENT_LABEL, "SegmentLabel")?;
    let algorithm_type = required_str(item, tags::SEGMENT_ALGORITHM_TYPE, "SegmentAlgorithmType")?;
    let algorithm_type: AlgorithmType = algorithm_type
        .parse()
        .ok()
        .context(InvalidAlgorithmTypeSnafu {
            value: algorithm_type,
        })?;
    let description = match item.get(tags::SEGMENT_DESCRIPTION) {
        Some(e) => Some(element_str(e, "SegmentDescription")?).filter(|s| !s.is_empty()),
        None => None,
    };
    Ok(Segment {
        label,
        description,
        algorithm_type,
    })
}

fn required<'a>(
    obj: &'a InMemDicomObject,
    tag: Tag,
    name: &'static str,
) -> Result<&'a InMemElement> {
    obj.get(tag).context(MissingAttributeSnafu { name })
}

fn required_u16(obj: &InMemDicomObject, tag: Tag, name: &'static str) -> Result<u16> {
    required(obj, tag, name)?
        .to_int::<u16>()
        .context(ConvertAttributeSnafu { name })
}

fn required_str(obj: &InMemDicomObject, tag: Tag, name: &'static str) -> Result<String> {
    element_str(required(obj, tag, name)?, name)
}

fn element_str(elem: &InMemElement, name: &'static str) -> Result<String> {
    let s = elem
        .value()
        .to_str()
        .context(ConvertAttributeSnafu { name })?;
    Ok(s.trim_end_matches(|c| c == ' ' || c == '\0').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicom_fg::{FrameContent, PixelMeasures, PlaneOrientation, PlanePosition};

    fn two_segments() -> Segmentation {
        let mut seg = Segmentation::new(3, 4).unwrap();
        assert_eq!(
            seg.add_segment(Segment::new("liver", AlgorithmType::Manual))
                .unwrap(),
            1
        );
        assert_eq!(
            seg.add_segment(
                Segment::new("lesion", AlgorithmType::SemiAutomatic).with_description("primary")
            )
            .unwrap(),
            2
        );
        seg.add_for_all_frames(PlaneOrientation::new([1., 0., 0.], [0., 1., 0.]).into())
            .unwrap();
        seg.add_for_all_frames(PixelMeasures::with_slice_thickness(1.).into())
            .unwrap();
        seg
    }

    fn frame_groups(z: f64) -> Vec<FunctionalGroup> {
        vec![
            FrameContent::default().into(),
            PlanePosition::new(0., 0., z).into(),
        ]
    }

    #[test]
    fn frames_are_added_per_segment() {
        let mut seg = two_segments();
        assert_eq!(seg.add_frame(&[1; 12], 1, frame_groups(0.)).unwrap(), 0);
        assert_eq!(seg.add_frame(&[0; 12], 2, frame_groups(0.)).unwrap(), 1);
        assert_eq!(seg.add_frame(&[1; 12], 1, frame_groups(1.)).unwrap(), 2);

        assert_eq!(seg.number_of_frames(), 3);
        assert_eq!(seg.frames_for_segment(1), vec![0, 2]);
        assert_eq!(seg.frames_for_segment(2), vec![1]);
        assert_eq!(seg.frame(0), Some(&[0xFF, 0x0F][..]));
        assert_eq!(seg.unpacked_frame(1).unwrap().unwrap(), vec![0; 12]);
        assert!(seg.frame(3).is_none());
        seg.check(true).unwrap();
    }

    #[test]
    fn failed_frame_leaves_no_groups_behind() {
        let mut seg = two_segments();
        seg.add_frame(&[1; 12], 1, frame_groups(0.)).unwrap();

        let err = seg.add_frame(&[1; 12], 3, frame_groups(1.)).unwrap_err();
        assert!(matches!(err, Error::NoSuchSegment { segment: 3, .. }));

        let err = seg.add_frame(&[1; 5], 1, frame_groups(1.)).unwrap_err();
        assert!(matches!(err, Error::FramePixelData { .. }));

        let mut groups = frame_groups(1.);
        groups.push(PixelMeasures::with_slice_thickness(-1.).into());
        let err = seg.add_frame(&[1; 12], 1, groups).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidGroup {
                group_type: GroupType::PixelMeasures,
                ..
            }
        ));

        assert_eq!(seg.number_of_frames(), 1);
        assert_eq!(seg.functional_groups().number_of_frames(), 1);
        assert!(seg.functional_groups().per_frame(1).is_none());
        // the shared group was not demoted by the rejected frame
        assert!(seg
            .functional_groups()
            .get_shared(GroupType::PixelMeasures)
            .is_some());
    }

    #[test]
    fn check_counts() {
        let mut seg = two_segments();
        assert!(matches!(seg.check(true), Err(Error::NoFrames { .. })));
        seg.add_frame(&[1; 12], 1, frame_groups(0.)).unwrap();
        assert!(matches!(
            seg.check(true),
            Err(Error::MoreSegmentsThanFrames {
                segments: 2,
                frames: 1,
                ..
            })
        ));
        seg.add_frame(&[1; 12], 2, frame_groups(0.)).unwrap();
        seg.check(true).unwrap();

        seg.functional_groups_mut()
            .delete_per_frame(1, GroupType::FrameContent);
        assert!(matches!(seg.check(true), Err(Error::InvalidStructure { .. })));
        seg.check(false).unwrap();
    }

    #[test]
    fn pixel_data_is_packed_without_frame_padding() {
        let mut seg = two_segments();
        seg.add_frame(&[1; 12], 1, frame_groups(0.)).unwrap();
        let mut second = [1; 12];
        second[0] = 0;
        seg.add_frame(&second, 2, frame_groups(0.)).unwrap();

        let mut obj = InMemDicomObject::new_empty();
        seg.write_pixel_data(&mut obj).unwrap();
        let pixel_data = obj.get(tags::PIXEL_DATA).unwrap();
        let data = pixel_data.value().to_bytes().unwrap();
        assert_eq!(&data[..], &[0b1111_1111, 0b1110_1111, 0b1111_1111, 0]);
        let bits_allocated = obj.get(tags::BITS_ALLOCATED).unwrap();
        assert_eq!(bits_allocated.to_int::<u16>().unwrap(), 1);
        let number_of_frames = obj.get(tags::NUMBER_OF_FRAMES).unwrap();
        assert_eq!(number_of_frames.to_int::<u32>().unwrap(), 2);

        let frames = read_pixel_data(&obj, 3, 4, 2).unwrap();
        assert_eq!(frames[0], seg.frame(0).unwrap());
        assert_eq!(frames[1], seg.frame(1).unwrap());

        assert!(matches!(
            read_pixel_data(&obj, 3, 4, 3),
            Err(Error::NotEnoughPixelData { .. })
        ));
    }

    #[test]
    fn written_segmentation_is_read_back() {
        let mut seg = two_segments();
        seg.add_frame(&[1; 12], 1, frame_groups(0.)).unwrap();
        seg.add_frame(&[0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1], 2, frame_groups(0.))
            .unwrap();
        seg.add_frame(&[1; 12], 1, frame_groups(2.)).unwrap();

        let mut obj = InMemDicomObject::new_empty();
        seg.write_dataset(&mut obj, WriteOptions::default())
            .unwrap();

        let back = Segmentation::read_dataset(&obj).unwrap();
        assert_eq!(back, seg);
        assert_eq!(
            back.segment(2).and_then(|s| s.description.as_deref()),
            Some("primary")
        );
    }

    #[test]
    fn fractional_segmentation_is_rejected() {
        let mut seg = two_segments();
        seg.add_frame(&[1; 12], 1, frame_groups(0.)).unwrap();
        seg.add_frame(&[1; 12], 2, frame_groups(0.)).unwrap();
        let mut obj = InMemDicomObject::new_empty();
        seg.write_dataset(&mut obj, WriteOptions::default())
            .unwrap();

        obj.put(DataElement::new(
            tags::SEGMENTATION_TYPE,
            VR::CS,
            PrimitiveValue::from("FRACTIONAL"),
        ));
        let err = Segmentation::read_dataset(&obj).unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedSegmentationType { ref value, .. } if value == "FRACTIONAL"
        ));
    }
}
