//! Functional group macros.
//!
//! A [`FunctionalGroup`] is one bundle of attribute values
//! of a given [`GroupType`].
//! The groups needed for spatial and segmentation analysis
//! are interpreted into dedicated types,
//! whereas every other kind of group is retained as a [`RawGroup`]
//! holding the items of its sequence verbatim.

use crate::attribute::{self, ds_element, sequence_element, GetAttributeError};
use crate::types::{GroupType, SharedType};
use dicom_core::value::PrimitiveValue;
use dicom_core::{DataElement, Tag, VR};
use dicom_dictionary_std::tags;
use dicom_object::mem::InMemElement;
use dicom_object::InMemDicomObject;
use snafu::{ensure, Backtrace, OptionExt, ResultExt, Snafu};

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum ReadGroupError {
    #[snafu(display("Sequence of {} group has no items", group_type))]
    NoItems {
        group_type: GroupType,
        backtrace: Backtrace,
    },

    #[snafu(display("Could not read {} group", group_type))]
    ReadAttribute {
        group_type: GroupType,
        #[snafu(backtrace)]
        source: GetAttributeError,
    },
}

/// An inconsistency in the values of a functional group.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum CheckGroupError {
    #[snafu(display("Slice Thickness must be positive, got {}", value))]
    NonPositiveSliceThickness { value: f64 },

    #[snafu(display("Pixel Spacing must be positive, got {:?}", value))]
    NonPositivePixelSpacing { value: [f64; 2] },

    #[snafu(display("Image Orientation (Patient) contains non-finite values"))]
    NonFiniteOrientation,

    #[snafu(display("Image Position (Patient) contains non-finite values"))]
    NonFinitePosition,

    #[snafu(display("Referenced Segment Number must not be 0"))]
    ZeroSegmentNumber,

    #[snafu(display("{} group has no items", group_type))]
    EmptyRawGroup { group_type: GroupType },
}

/// Pixel Measures functional group.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PixelMeasures {
    /// physical distance between the centers of adjacent rows and columns, in mm
    pub pixel_spacing: Option<[f64; 2]>,
    /// nominal slice thickness, in mm
    pub slice_thickness: Option<f64>,
    /// spacing between adjacent slices, in mm
    pub spacing_between_slices: Option<f64>,
}

impl PixelMeasures {
    /// Create a pixel measures group with the given slice thickness.
    pub fn with_slice_thickness(slice_thickness: f64) -> Self {
        PixelMeasures {
            slice_thickness: Some(slice_thickness),
            ..Default::default()
        }
    }

    fn read(item: &InMemDicomObject) -> attribute::Result<Self> {
        Ok(PixelMeasures {
            pixel_spacing: attribute::optional_f64s(item, tags::PIXEL_SPACING, "PixelSpacing")?,
            slice_thickness: attribute::optional_f64(
                item,
                tags::SLICE_THICKNESS,
                "SliceThickness",
            )?,
            spacing_between_slices: attribute::optional_f64(
                item,
                tags::SPACING_BETWEEN_SLICES,
                "SpacingBetweenSlices",
            )?,
        })
    }

    fn write(&self, item: &mut InMemDicomObject) {
        if let Some(spacing) = self.pixel_spacing {
            item.put(ds_element(tags::PIXEL_SPACING, &spacing));
        }
        if let Some(thickness) = self.slice_thickness {
            item.put(ds_element(tags::SLICE_THICKNESS, &[thickness]));
        }
        if let Some(spacing) = self.spacing_between_slices {
            item.put(ds_element(tags::SPACING_BETWEEN_SLICES, &[spacing]));
        }
    }
}

/// Plane Position (Patient) functional group.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanePosition {
    /// Image Position (Patient): x, y and z coordinates
    /// of the upper left hand corner of the frame, in mm
    pub image_position: [f64; 3],
}

impl PlanePosition {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        PlanePosition {
            image_position: [x, y, z],
        }
    }

    fn read(item: &InMemDicomObject) -> attribute::Result<Self> {
        Ok(PlanePosition {
            image_position: attribute::required_f64s(
                item,
                tags::IMAGE_POSITION_PATIENT,
                "ImagePositionPatient",
            )?,
        })
    }

    fn write(&self, item: &mut InMemDicomObject) {
        item.put(ds_element(tags::IMAGE_POSITION_PATIENT, &self.image_position));
    }
}

/// Plane Orientation (Patient) functional group.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaneOrientation {
    /// Image Orientation (Patient):
    /// direction cosines of the first row followed by those of the first column
    pub image_orientation: [f64; 6],
}

impl PlaneOrientation {
    pub fn new(row: [f64; 3], column: [f64; 3]) -> Self {
        PlaneOrientation {
            image_orientation: [row[0], row[1], row[2], column[0], column[1], column[2]],
        }
    }

    /// The row direction cosines.
    pub fn row(&self) -> [f64; 3] {
        let o = &self.image_orientation;
        [o[0], o[1], o[2]]
    }

    /// The column direction cosines.
    pub fn column(&self) -> [f64; 3] {
        let o = &self.image_orientation;
        [o[3], o[4], o[5]]
    }

    fn read(item: &InMemDicomObject) -> attribute::Result<Self> {
        Ok(PlaneOrientation {
            image_orientation: attribute::required_f64s(
                item,
                tags::IMAGE_ORIENTATION_PATIENT,
                "ImageOrientationPatient",
            )?,
        })
    }

    fn write(&self, item: &mut InMemDicomObject) {
        item.put(ds_element(tags::IMAGE_ORIENTATION_PATIENT, &self.image_orientation));
    }
}

/// Frame Content functional group.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FrameContent {
    pub frame_acquisition_number: Option<u16>,
    pub dimension_index_values: Vec<u32>,
    pub temporal_position_index: Option<u32>,
    pub stack_id: Option<String>,
    pub in_stack_position_number: Option<u32>,
}

impl FrameContent {
    fn read(item: &InMemDicomObject) -> attribute::Result<Self> {
        Ok(FrameContent {
            frame_acquisition_number: attribute::optional_u16(
                item,
                tags::FRAME_ACQUISITION_NUMBER,
                "FrameAcquisitionNumber",
            )?,
            dimension_index_values: attribute::multi_u32(
                item,
                tags::DIMENSION_INDEX_VALUES,
                "DimensionIndexValues",
            )?,
            temporal_position_index: attribute::optional_u32(
                item,
                tags::TEMPORAL_POSITION_INDEX,
                "TemporalPositionIndex",
            )?,
            stack_id: attribute::optional_string(item, tags::STACK_ID, "StackID")?,
            in_stack_position_number: attribute::optional_u32(
                item,
                tags::IN_STACK_POSITION_NUMBER,
                "InStackPositionNumber",
            )?,
        })
    }

    fn write(&self, item: &mut InMemDicomObject) {
        if let Some(n) = self.frame_acquisition_number {
            item.put(DataElement::new(
                tags::FRAME_ACQUISITION_NUMBER,
                VR::US,
                PrimitiveValue::from(n),
            ));
        }
        if !self.dimension_index_values.is_empty() {
            item.put(DataElement::new(
                tags::DIMENSION_INDEX_VALUES,
                VR::UL,
                PrimitiveValue::U32(self.dimension_index_values.iter().copied().collect()),
            ));
        }
        if let Some(n) = self.temporal_position_index {
            item.put(DataElement::new(
                tags::TEMPORAL_POSITION_INDEX,
                VR::UL,
                PrimitiveValue::from(n),
            ));
        }
        if let Some(stack_id) = &self.stack_id {
            item.put(DataElement::new(
                tags::STACK_ID,
                VR::SH,
                PrimitiveValue::from(stack_id.as_str()),
            ));
        }
        if let Some(n) = self.in_stack_position_number {
            item.put(DataElement::new(
                tags::IN_STACK_POSITION_NUMBER,
                VR::UL,
                PrimitiveValue::from(n),
            ));
        }
    }
}

/// Segmentation functional group,
/// identifying the segment represented by a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentIdentification {
    /// 1-based number of the referenced segment
    pub referenced_segment_number: u16,
}

impl SegmentIdentification {
    pub fn new(referenced_segment_number: u16) -> Self {
        SegmentIdentification {
            referenced_segment_number,
        }
    }

    fn read(item: &InMemDicomObject) -> attribute::Result<Self> {
        Ok(SegmentIdentification {
            referenced_segment_number: attribute::required_u16(
                item,
                tags::REFERENCED_SEGMENT_NUMBER,
                "ReferencedSegmentNumber",
            )?,
        })
    }

    fn write(&self, item: &mut InMemDicomObject) {
        item.put(DataElement::new(
            tags::REFERENCED_SEGMENT_NUMBER,
            VR::US,
            PrimitiveValue::from(self.referenced_segment_number),
        ));
    }
}

/// A functional group kept as the items of its sequence,
/// without further interpretation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawGroup {
    group_type: GroupType,
    items: Vec<InMemDicomObject>,
}

impl RawGroup {
    /// Create a raw group of the given type.
    pub fn new(group_type: GroupType, items: Vec<InMemDicomObject>) -> Self {
        RawGroup { group_type, items }
    }

    pub fn group_type(&self) -> GroupType {
        self.group_type
    }

    /// The items of the functional group sequence.
    pub fn items(&self) -> &[InMemDicomObject] {
        &self.items
    }
}

/// One bundle of attribute values of a given [`GroupType`].
///
/// Groups are compared by value,
/// which is what decides whether a per-frame insertion
/// can reuse an existing shared group.
#[derive(Debug, Clone, PartialEq)]
pub enum FunctionalGroup {
    PixelMeasures(PixelMeasures),
    PlanePosition(PlanePosition),
    PlaneOrientation(PlaneOrientation),
    FrameContent(FrameContent),
    Segmentation(SegmentIdentification),
    Raw(RawGroup),
}

impl FunctionalGroup {
    /// The kind of this functional group.
    pub fn group_type(&self) -> GroupType {
        match self {
            FunctionalGroup::PixelMeasures(_) => GroupType::PixelMeasures,
            FunctionalGroup::PlanePosition(_) => GroupType::PlanePosition,
            FunctionalGroup::PlaneOrientation(_) => GroupType::PlaneOrientation,
            FunctionalGroup::FrameContent(_) => GroupType::FrameContent,
            FunctionalGroup::Segmentation(_) => GroupType::Segmentation,
            FunctionalGroup::Raw(raw) => raw.group_type,
        }
    }

    /// Where this group may be stored.
    #[inline]
    pub fn shared_type(&self) -> SharedType {
        self.group_type().shared_type()
    }

    /// Interpret the items of a functional group sequence.
    ///
    /// Only the first item is considered for the interpreted group types,
    /// as the standard permits exactly one.
    pub fn read(group_type: GroupType, items: &[InMemDicomObject]) -> Result<Self, ReadGroupError> {
        let interpreted = matches!(
            group_type,
            GroupType::PixelMeasures
                | GroupType::PlanePosition
                | GroupType::PlaneOrientation
                | GroupType::FrameContent
                | GroupType::Segmentation
        );
        if !interpreted {
            let raw = RawGroup::new(group_type, items.to_vec());
            return Ok(FunctionalGroup::Raw(raw));
        }

        let item = items.first().context(NoItemsSnafu { group_type })?;
        let group = match group_type {
            GroupType::PixelMeasures => {
                PixelMeasures::read(item).map(FunctionalGroup::PixelMeasures)
            }
            GroupType::PlanePosition => {
                PlanePosition::read(item).map(FunctionalGroup::PlanePosition)
            }
            GroupType::PlaneOrientation => {
                PlaneOrientation::read(item).map(FunctionalGroup::PlaneOrientation)
            }
            GroupType::FrameContent => FrameContent::read(item).map(FunctionalGroup::FrameContent),
            _ => SegmentIdentification::read(item).map(FunctionalGroup::Segmentation),
        };
        group.context(ReadAttributeSnafu { group_type })
    }

    /// Build the functional group sequence element for this group.
    pub fn to_element(&self) -> InMemElement {
        let tag: Tag = self.group_type().sequence_tag();
        let items = match self {
            FunctionalGroup::Raw(raw) => raw.items.clone(),
            other => {
                let mut item = InMemDicomObject::new_empty();
                match other {
                    FunctionalGroup::PixelMeasures(g) => g.write(&mut item),
                    FunctionalGroup::PlanePosition(g) => g.write(&mut item),
                    FunctionalGroup::PlaneOrientation(g) => g.write(&mut item),
                    FunctionalGroup::FrameContent(g) => g.write(&mut item),
                    FunctionalGroup::Segmentation(g) => g.write(&mut item),
                    FunctionalGroup::Raw(_) => {}
                }
                vec![item]
            }
        };
        sequence_element(tag, items)
    }

    /// Check the values of this group for consistency.
    pub fn check(&self) -> Result<(), CheckGroupError> {
        match self {
            FunctionalGroup::PixelMeasures(pm) => {
                if let Some(value) = pm.slice_thickness {
                    ensure!(value > 0., NonPositiveSliceThicknessSnafu { value });
                }
                if let Some(value) = pm.pixel_spacing {
                    ensure!(
                        value[0] > 0. && value[1] > 0.,
                        NonPositivePixelSpacingSnafu { value }
                    );
                }
                Ok(())
            }
            FunctionalGroup::PlanePosition(p) => {
                ensure!(
                    p.image_position.iter().all(|v| v.is_finite()),
                    NonFinitePositionSnafu
                );
                Ok(())
            }
            FunctionalGroup::PlaneOrientation(o) => {
                ensure!(
                    o.image_orientation.iter().all(|v| v.is_finite()),
                    NonFiniteOrientationSnafu
                );
                Ok(())
            }
            FunctionalGroup::FrameContent(_) => Ok(()),
            FunctionalGroup::Segmentation(s) => {
                ensure!(s.referenced_segment_number > 0, ZeroSegmentNumberSnafu);
                Ok(())
            }
            FunctionalGroup::Raw(raw) => {
                ensure!(
                    !raw.items.is_empty(),
                    EmptyRawGroupSnafu {
                        group_type: raw.group_type
                    }
                );
                Ok(())
            }
        }
    }

    pub fn as_pixel_measures(&self) -> Option<&PixelMeasures> {
        match self {
            FunctionalGroup::PixelMeasures(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_plane_position(&self) -> Option<&PlanePosition> {
        match self {
            FunctionalGroup::PlanePosition(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_plane_orientation(&self) -> Option<&PlaneOrientation> {
        match self {
            FunctionalGroup::PlaneOrientation(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_frame_content(&self) -> Option<&FrameContent> {
        match self {
            FunctionalGroup::FrameContent(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_segmentation(&self) -> Option<&SegmentIdentification> {
        match self {
            FunctionalGroup::Segmentation(g) => Some(g),
            _ => None,
        }
    }
}

impl From<PixelMeasures> for FunctionalGroup {
    fn from(group: PixelMeasures) -> Self {
        FunctionalGroup::PixelMeasures(group)
    }
}

impl From<PlanePosition> for FunctionalGroup {
    fn from(group: PlanePosition) -> Self {
        FunctionalGroup::PlanePosition(group)
    }
}

impl From<PlaneOrientation> for FunctionalGroup {
    fn from(group: PlaneOrientation) -> Self {
        FunctionalGroup::PlaneOrientation(group)
    }
}

impl From<FrameContent> for FunctionalGroup {
    fn from(group: FrameContent) -> Self {
        FunctionalGroup::FrameContent(group)
    }
}

impl From<SegmentIdentification> for FunctionalGroup {
    fn from(group: SegmentIdentification) -> Self {
        FunctionalGroup::Segmentation(group)
    }
}

impl From<RawGroup> for FunctionalGroup {
    fn from(group: RawGroup) -> Self {
        FunctionalGroup::Raw(group)
    }
}
