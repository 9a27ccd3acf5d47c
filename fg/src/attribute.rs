//! Utility module for fetching and storing attributes
//! inside a functional group sequence item.

use dicom_core::value::{DataSetSequence, PrimitiveValue};
use dicom_core::{DataElement, Tag, VR};
use dicom_object::mem::InMemElement;
use dicom_object::InMemDicomObject;
use snafu::{ensure, Backtrace, OptionExt, ResultExt, Snafu};

#[derive(Debug, Snafu)]
pub enum GetAttributeError {
    #[snafu(display("Missing required attribute `{}`", name))]
    MissingRequiredField {
        name: &'static str,
        backtrace: Backtrace,
    },

    #[snafu(display("Could not convert attribute `{}`", name))]
    ConvertValue {
        name: &'static str,
        source: dicom_core::value::ConvertValueError,
        backtrace: Backtrace,
    },

    #[snafu(display(
        "Attribute `{}` has {} values but {} were expected",
        name,
        found,
        expected
    ))]
    ValueMultiplicity {
        name: &'static str,
        found: usize,
        expected: usize,
        backtrace: Backtrace,
    },

    #[snafu(display("Semantically invalid value `{}` for attribute `{}`", value, name))]
    InvalidValue {
        name: &'static str,
        value: String,
        backtrace: Backtrace,
    },
}

pub type Result<T, E = GetAttributeError> = std::result::Result<T, E>;

/// Retrieve exactly `N` decimal values from a required attribute.
pub(crate) fn required_f64s<const N: usize>(
    item: &InMemDicomObject,
    tag: Tag,
    name: &'static str,
) -> Result<[f64; N]> {
    let values = item
        .get(tag)
        .context(MissingRequiredFieldSnafu { name })?
        .to_multi_float64()
        .context(ConvertValueSnafu { name })?;

    ensure!(
        values.len() == N,
        ValueMultiplicitySnafu {
            name,
            found: values.len(),
            expected: N,
        }
    );

    let mut out = [0.; N];
    out.copy_from_slice(&values);
    Ok(out)
}

/// Retrieve exactly `N` decimal values from an attribute if it exists.
pub(crate) fn optional_f64s<const N: usize>(
    item: &InMemDicomObject,
    tag: Tag,
    name: &'static str,
) -> Result<Option<[f64; N]>> {
    if item.get(tag).is_none() {
        return Ok(None);
    }
    required_f64s(item, tag, name).map(Some)
}

/// Retrieve a single decimal value from an attribute if it exists.
pub(crate) fn optional_f64(
    item: &InMemDicomObject,
    tag: Tag,
    name: &'static str,
) -> Result<Option<f64>> {
    match item.get(tag) {
        None => Ok(None),
        Some(e) if is_empty(e) => Ok(None),
        Some(e) => e.to_float64().context(ConvertValueSnafu { name }).map(Some),
    }
}

/// Retrieve a required unsigned 16-bit attribute.
pub(crate) fn required_u16(item: &InMemDicomObject, tag: Tag, name: &'static str) -> Result<u16> {
    item.get(tag)
        .context(MissingRequiredFieldSnafu { name })?
        .to_int::<u16>()
        .context(ConvertValueSnafu { name })
}

/// Retrieve an unsigned 16-bit attribute if it exists.
pub(crate) fn optional_u16(
    item: &InMemDicomObject,
    tag: Tag,
    name: &'static str,
) -> Result<Option<u16>> {
    match item.get(tag) {
        None => Ok(None),
        Some(e) if is_empty(e) => Ok(None),
        Some(e) => {
            let value = e.to_int::<u16>().context(ConvertValueSnafu { name })?;
            Ok(Some(value))
        }
    }
}

/// Retrieve an unsigned 32-bit attribute if it exists.
pub(crate) fn optional_u32(
    item: &InMemDicomObject,
    tag: Tag,
    name: &'static str,
) -> Result<Option<u32>> {
    match item.get(tag) {
        None => Ok(None),
        Some(e) if is_empty(e) => Ok(None),
        Some(e) => {
            let value = e.to_int::<u32>().context(ConvertValueSnafu { name })?;
            Ok(Some(value))
        }
    }
}

/// Retrieve all unsigned 32-bit values of an attribute,
/// or an empty list if it does not exist.
pub(crate) fn multi_u32(item: &InMemDicomObject, tag: Tag, name: &'static str) -> Result<Vec<u32>> {
    match item.get(tag) {
        None => Ok(Vec::new()),
        Some(e) => e.to_multi_int::<u32>().context(ConvertValueSnafu { name }),
    }
}

/// Retrieve a trimmed text attribute if it exists and is not empty.
pub(crate) fn optional_string(
    item: &InMemDicomObject,
    tag: Tag,
    name: &'static str,
) -> Result<Option<String>> {
    match item.get(tag) {
        None => Ok(None),
        Some(e) => {
            let s = e.value().to_str().context(ConvertValueSnafu { name })?;
            let s = s.trim_end_matches(|c| c == ' ' || c == '\0').trim_start();
            if s.is_empty() {
                Ok(None)
            } else {
                Ok(Some(s.to_string()))
            }
        }
    }
}

fn is_empty(elem: &InMemElement) -> bool {
    elem.value()
        .primitive()
        .map_or(false, |v| v.multiplicity() == 0)
}

/// Format a decimal value so that it fits
/// the 16 characters of a Decimal String (DS).
pub(crate) fn format_ds(value: f64) -> String {
    let s = value.to_string();
    if s.len() <= 16 {
        return s;
    }
    // scientific notation always fits with this precision
    let mut precision = 9;
    loop {
        let s = format!("{:.*e}", precision, value);
        if s.len() <= 16 || precision == 0 {
            return s;
        }
        precision -= 1;
    }
}

/// Create a Decimal String element with the given values.
pub(crate) fn ds_element(tag: Tag, values: &[f64]) -> InMemElement {
    let strings = values.iter().map(|v| format_ds(*v)).collect();
    DataElement::new(tag, VR::DS, PrimitiveValue::Strs(strings))
}

/// Create an element with a sequence of the given items.
pub(crate) fn sequence_element(tag: Tag, items: Vec<InMemDicomObject>) -> InMemElement {
    DataElement::new(tag, VR::SQ, DataSetSequence::from(items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicom_dictionary_std::tags;

    #[test]
    fn decimal_strings_fit_in_16_characters() {
        assert_eq!(format_ds(1.5), "1.5");
        assert_eq!(format_ds(-120.25), "-120.25");
        for value in [0.1 + 0.2, -123456.78901234567, 1e-300, std::f64::consts::PI] {
            let s = format_ds(value);
            assert!(s.len() <= 16, "`{}` is too long", s);
            let parsed: f64 = s.parse().unwrap();
            assert!((parsed - value).abs() <= value.abs() * 1e-8);
        }
    }

    #[test]
    fn read_multi_valued_decimals() {
        let mut item = InMemDicomObject::new_empty();
        item.put(ds_element(tags::IMAGE_POSITION_PATIENT, &[1., 2.5, -3.]));

        let (tag, name) = (tags::IMAGE_POSITION_PATIENT, "ImagePositionPatient");
        let pos: [f64; 3] = required_f64s(&item, tag, name).unwrap();
        assert_eq!(pos, [1., 2.5, -3.]);

        let err = required_f64s::<6>(&item, tag, name).unwrap_err();
        assert!(matches!(
            err,
            GetAttributeError::ValueMultiplicity {
                found: 3,
                expected: 6,
                ..
            }
        ));

        let (tag, name) = (tags::IMAGE_ORIENTATION_PATIENT, "ImageOrientationPatient");
        let missing = required_f64s::<6>(&item, tag, name);
        assert!(matches!(
            missing,
            Err(GetAttributeError::MissingRequiredField { .. })
        ));
        assert_eq!(
            optional_f64(&item, tags::SLICE_THICKNESS, "SliceThickness").unwrap(),
            None
        );
    }
}
