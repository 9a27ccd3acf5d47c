//! Functional group kinds and their sharing capabilities.

use dicom_core::Tag;
use dicom_dictionary_std::tags;
use std::fmt;

/// The 0-based ordinal of a physical frame in a multi-frame object.
pub type FrameIndex = u32;

/// Whether a functional group kind may appear in the shared
/// functional groups, in the per-frame functional groups, or in both.
#[derive(Debug, Copy, Clone, Eq, Hash, PartialEq)]
pub enum SharedType {
    /// may be shared or per-frame
    Both,
    /// may only appear in the shared functional groups
    OnlyShared,
    /// may only appear in the per-frame functional groups
    OnlyPerFrame,
}

impl SharedType {
    /// Whether a group of this kind may be stored as shared.
    pub fn can_be_shared(self) -> bool {
        self != SharedType::OnlyPerFrame
    }

    /// Whether a group of this kind may be stored per frame.
    pub fn can_be_per_frame(self) -> bool {
        self != SharedType::OnlyShared
    }
}

/// Discriminator for a kind of functional group,
/// identified in a data set by the tag of its sequence.
#[derive(Debug, Copy, Clone, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[non_exhaustive]
pub enum GroupType {
    /// Pixel Measures (C.7.6.16.2.1)
    PixelMeasures,
    /// Frame Content (C.7.6.16.2.2)
    FrameContent,
    /// Plane Position (Patient) (C.7.6.16.2.3)
    PlanePosition,
    /// Plane Orientation (Patient) (C.7.6.16.2.4)
    PlaneOrientation,
    /// Derivation Image (C.7.6.16.2.6)
    DerivationImage,
    /// Frame Anatomy (C.7.6.16.2.8)
    FrameAnatomy,
    /// Pixel Value Transformation (C.7.6.16.2.9)
    PixelValueTransformation,
    /// Frame VOI LUT (C.7.6.16.2.10)
    FrameVoiLut,
    /// Real World Value Mapping (C.7.6.16.2.11)
    RealWorldValueMapping,
    /// Segmentation (C.8.20.3.1)
    Segmentation,
    /// Plane Position (Volume) (C.7.6.16.2.21)
    PlanePositionVolume,
    /// Plane Orientation (Volume) (C.7.6.16.2.22)
    PlaneOrientationVolume,
    /// Temporal Position (C.7.6.16.2.23)
    TemporalPosition,
    /// Image Data Type (C.7.6.16.2.24)
    ImageDataType,
    /// A functional group sequence not known to this crate
    Unknown(Tag),
}

/// Every group type known to this crate.
const KNOWN_TYPES: [GroupType; 14] = [
    GroupType::PixelMeasures,
    GroupType::FrameContent,
    GroupType::PlanePosition,
    GroupType::PlaneOrientation,
    GroupType::DerivationImage,
    GroupType::FrameAnatomy,
    GroupType::PixelValueTransformation,
    GroupType::FrameVoiLut,
    GroupType::RealWorldValueMapping,
    GroupType::Segmentation,
    GroupType::PlanePositionVolume,
    GroupType::PlaneOrientationVolume,
    GroupType::TemporalPosition,
    GroupType::ImageDataType,
];

impl GroupType {
    /// Identify the group type from the tag of its functional group sequence.
    ///
    /// Unrecognized tags map to [`GroupType::Unknown`].
    pub fn from_sequence_tag(tag: Tag) -> Self {
        KNOWN_TYPES
            .iter()
            .copied()
            .find(|group_type| group_type.sequence_tag() == tag)
            .unwrap_or(GroupType::Unknown(tag))
    }

    /// The tag of the sequence holding a functional group of this type.
    pub fn sequence_tag(self) -> Tag {
        match self {
            GroupType::PixelMeasures => tags::PIXEL_MEASURES_SEQUENCE,
            GroupType::FrameContent => tags::FRAME_CONTENT_SEQUENCE,
            GroupType::PlanePosition => tags::PLANE_POSITION_SEQUENCE,
            GroupType::PlaneOrientation => tags::PLANE_ORIENTATION_SEQUENCE,
            GroupType::DerivationImage => tags::DERIVATION_IMAGE_SEQUENCE,
            GroupType::FrameAnatomy => tags::FRAME_ANATOMY_SEQUENCE,
            GroupType::PixelValueTransformation => tags::PIXEL_VALUE_TRANSFORMATION_SEQUENCE,
            GroupType::FrameVoiLut => tags::FRAME_VOILUT_SEQUENCE,
            GroupType::RealWorldValueMapping => tags::REAL_WORLD_VALUE_MAPPING_SEQUENCE,
            GroupType::Segmentation => tags::SEGMENT_IDENTIFICATION_SEQUENCE,
            GroupType::PlanePositionVolume => tags::PLANE_POSITION_VOLUME_SEQUENCE,
            GroupType::PlaneOrientationVolume => tags::PLANE_ORIENTATION_VOLUME_SEQUENCE,
            GroupType::TemporalPosition => tags::TEMPORAL_POSITION_SEQUENCE,
            GroupType::ImageDataType => tags::IMAGE_DATA_TYPE_SEQUENCE,
            GroupType::Unknown(tag) => tag,
        }
    }

    /// Where a group of this type may be stored.
    pub fn shared_type(self) -> SharedType {
        match self {
            GroupType::FrameContent => SharedType::OnlyPerFrame,
            _ => SharedType::Both,
        }
    }

    /// A short human readable name of the group type.
    pub fn name(self) -> &'static str {
        match self {
            GroupType::PixelMeasures => "Pixel Measures",
            GroupType::FrameContent => "Frame Content",
            GroupType::PlanePosition => "Plane Position (Patient)",
            GroupType::PlaneOrientation => "Plane Orientation (Patient)",
            GroupType::DerivationImage => "Derivation Image",
            GroupType::FrameAnatomy => "Frame Anatomy",
            GroupType::PixelValueTransformation => "Pixel Value Transformation",
            GroupType::FrameVoiLut => "Frame VOI LUT",
            GroupType::RealWorldValueMapping => "Real World Value Mapping",
            GroupType::Segmentation => "Segmentation",
            GroupType::PlanePositionVolume => "Plane Position (Volume)",
            GroupType::PlaneOrientationVolume => "Plane Orientation (Volume)",
            GroupType::TemporalPosition => "Temporal Position",
            GroupType::ImageDataType => "Image Data Type",
            GroupType::Unknown(_) => "Unknown",
        }
    }
}

impl fmt::Display for GroupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupType::Unknown(tag) => write!(f, "Unknown {}", tag),
            other => f.write_str(other.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_tags_map_both_ways() {
        for group_type in KNOWN_TYPES.iter().copied() {
            assert_eq!(
                GroupType::from_sequence_tag(group_type.sequence_tag()),
                group_type
            );
        }
        assert_eq!(
            GroupType::from_sequence_tag(Tag(0x0028, 0x9110)),
            GroupType::PixelMeasures
        );
        assert_eq!(GroupType::Segmentation.sequence_tag(), Tag(0x0062, 0x000A));
    }

    #[test]
    fn unknown_sequence_keeps_its_tag() {
        let tag = Tag(0x0009, 0x1001);
        let group_type = GroupType::from_sequence_tag(tag);
        assert_eq!(group_type, GroupType::Unknown(tag));
        assert_eq!(group_type.sequence_tag(), tag);
        assert_eq!(group_type.shared_type(), SharedType::Both);
    }

    #[test]
    fn frame_content_is_per_frame_only() {
        let shared_type = GroupType::FrameContent.shared_type();
        assert!(!shared_type.can_be_shared());
        assert!(shared_type.can_be_per_frame());
    }
}
