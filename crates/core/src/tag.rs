use serde::{Deserialize, Serialize};

use crate::care::CareProfile;
use crate::estimate::EmissionsResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialComponent {
    pub fiber: String,
    pub pct: f64,
}

impl MaterialComponent {
    pub fn new(fiber: impl Into<String>, pct: f64) -> Self {
        Self { fiber: fiber.into(), pct }
    }
}

/// The `care` slot of a tag.
///
/// Tags produced by [`crate::normalize`] always carry `Structured` care.
/// `Unstructured` holds whatever a caller put there without normalizing
/// first; the estimator refuses it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CareData {
    Structured(CareProfile),
    Unstructured(serde_json::Value),
}

impl CareData {
    pub fn as_profile(&self) -> Option<&CareProfile> {
        match self {
            CareData::Structured(profile) => Some(profile),
            CareData::Unstructured(_) => None,
        }
    }
}

impl Default for CareData {
    fn default() -> Self {
        CareData::Structured(CareProfile::empty())
    }
}

impl From<CareProfile> for CareData {
    fn from(profile: CareProfile) -> Self {
        CareData::Structured(profile)
    }
}

/// Canonical record of a garment tag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedTag {
    /// Text read off the label by the vision provider. Not used for estimation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr_text: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub materials: Vec<MaterialComponent>,
    #[serde(default)]
    pub care: CareData,
}

impl ParsedTag {
    /// Short label for history lists: the two dominant fibers, e.g.
    /// `"70% Cotton + 30% Polyester"`, or `"Tag scan"` when the composition
    /// is unknown.
    pub fn display_name(&self) -> String {
        let mut materials: Vec<&MaterialComponent> = self.materials.iter().collect();
        materials.sort_by(|a, b| b.pct.total_cmp(&a.pct));
        let top: Vec<String> = materials
            .iter()
            .take(2)
            .map(|m| format!("{}% {}", format_number(m.pct), m.fiber))
            .collect();

        if top.is_empty() {
            "Tag scan".to_string()
        } else {
            top.join(" + ")
        }
    }
}

/// What the service hands back for one tag image, and what the response
/// cache stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagResponse {
    pub parsed: ParsedTag,
    pub emissions: EmissionsResult,
}

/// Render a float without a trailing `.0` (`2.0` → `"2"`, `1.5` → `"1.5"`).
pub(crate) fn format_number(value: f64) -> String {
    let s = format!("{value:.2}");
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::care::WashingMethod;

    #[test]
    fn display_name_takes_two_dominant_fibers() {
        let tag = ParsedTag {
            materials: vec![
                MaterialComponent::new("Elastane", 5.0),
                MaterialComponent::new("Cotton", 70.0),
                MaterialComponent::new("Polyester", 25.0),
            ],
            ..Default::default()
        };
        assert_eq!(tag.display_name(), "70% Cotton + 25% Polyester");
    }

    #[test]
    fn display_name_without_materials() {
        assert_eq!(ParsedTag::default().display_name(), "Tag scan");
    }

    #[test]
    fn ocr_text_omitted_when_absent() {
        let json = serde_json::to_value(ParsedTag::default()).unwrap();
        assert!(json.get("ocr_text").is_none());
        assert!(json["country"].is_null());
        assert_eq!(json["materials"], serde_json::json!([]));
    }

    #[test]
    fn structured_care_deserializes_as_profile() {
        let tag: ParsedTag = serde_json::from_value(serde_json::json!({
            "country": "Portugal",
            "materials": [],
            "care": {"washing": "machine_wash_cold", "drying": null, "ironing": null, "dry_cleaning": null}
        }))
        .unwrap();
        let profile = tag.care.as_profile().unwrap();
        assert_eq!(profile.washing, Some(WashingMethod::MachineWashCold));
    }

    #[test]
    fn string_care_deserializes_as_unstructured() {
        let tag: ParsedTag = serde_json::from_value(serde_json::json!({
            "country": null,
            "materials": [],
            "care": "machine_wash_cold"
        }))
        .unwrap();
        assert!(tag.care.as_profile().is_none());
    }

    #[test]
    fn format_number_trims_zeros() {
        assert_eq!(format_number(2.0), "2");
        assert_eq!(format_number(1.5), "1.5");
        assert_eq!(format_number(0.25), "0.25");
    }
}
