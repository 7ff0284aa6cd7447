//! Coercion of raw vision-provider output into a [`ParsedTag`].
//!
//! The provider is asked for a strict JSON schema but nothing guarantees it
//! honours it. [`normalize`] is total: any JSON value produces a tag whose
//! care profile has all four slots filled with a known code or `null`.

use serde_json::{Map, Value};
use std::str::FromStr;

use crate::care::{CareProfile, DryCleaning, DryingMethod, IroningSetting, WashingMethod};
use crate::tag::{CareData, MaterialComponent, ParsedTag};

pub fn normalize(raw: &Value) -> ParsedTag {
    let empty = Map::new();
    let obj = raw.as_object().unwrap_or(&empty);

    ParsedTag {
        ocr_text: obj.get("ocr_text").and_then(Value::as_str).map(str::to_string),
        country: normalize_country(obj.get("country")),
        materials: normalize_materials(obj.get("materials")),
        care: CareData::Structured(normalize_care(obj.get("care"))),
    }
}

/// Re-run normalization over an already typed tag. Structured care passes
/// through; unstructured care is discarded wholesale.
pub fn normalize_tag(tag: &ParsedTag) -> ParsedTag {
    match serde_json::to_value(tag) {
        Ok(value) => normalize(&value),
        Err(_) => ParsedTag::default(),
    }
}

fn normalize_country(value: Option<&Value>) -> Option<String> {
    let country = value?.as_str()?.trim();
    if country.is_empty() {
        None
    } else {
        Some(country.to_string())
    }
}

fn normalize_materials(value: Option<&Value>) -> Vec<MaterialComponent> {
    let Some(items) = value.and_then(Value::as_array) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| match serde_json::from_value::<MaterialComponent>(item.clone()) {
            Ok(component) => Some(component),
            Err(e) => {
                tracing::debug!("Dropping unreadable material entry {item}: {e}");
                None
            }
        })
        .collect()
}

/// Non-object care is thrown away, not salvaged.
fn normalize_care(value: Option<&Value>) -> CareProfile {
    let Some(care) = value.and_then(Value::as_object) else {
        return CareProfile::empty();
    };

    CareProfile {
        washing: care_code::<WashingMethod>(care.get("washing")),
        drying: care_code::<DryingMethod>(care.get("drying")),
        ironing: care_code::<IroningSetting>(care.get("ironing")),
        dry_cleaning: care_code::<DryCleaning>(care.get("dry_cleaning")),
    }
}

/// Accepts `"Machine Wash Cold"`, `"machine-wash-cold"` and so on. Anything
/// that still doesn't name a code becomes `None`.
fn care_code<T: FromStr>(value: Option<&Value>) -> Option<T> {
    let raw = value?.as_str()?;
    let code: String = raw
        .trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            c => c.to_ascii_lowercase(),
        })
        .collect();
    T::from_str(&code).ok()
}
