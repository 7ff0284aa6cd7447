use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::care::CareProfile;
use crate::factors::{FactorTable, TransportMode, TransportReporting};
use crate::tag::{format_number, ParsedTag};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EstimateError {
    /// The tag's care slot is not a structured profile. Callers are expected
    /// to normalize first; the pipeline retries once with a default profile.
    #[error("Care instructions must be a structured object")]
    CareStructure,
}

/// Per-phase kg CO2e.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Breakdown {
    pub materials: f64,
    pub manufacturing: f64,
    pub washing: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<f64>,
}

impl Breakdown {
    pub fn sum(&self) -> f64 {
        self.materials + self.manufacturing + self.washing + self.transport.unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmissionsResult {
    pub total_kgco2e: f64,
    pub breakdown: Breakdown,
    /// Human-readable notes on every value the estimator had to assume.
    pub assumptions: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransportLeg {
    pub mode: TransportMode,
    pub distance_km: f64,
}

/// Optional caller-supplied facts that sharpen the estimate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EstimateContext {
    pub garment_type: Option<String>,
    pub weight_g: Option<f64>,
    pub washes_per_month: Option<f64>,
    pub transport: Option<TransportLeg>,
}

/// Estimate lifecycle emissions for a tag using the built-in factor table
/// and no caller context.
pub fn estimate(tag: &ParsedTag) -> Result<EmissionsResult, EstimateError> {
    estimate_with(tag, &EstimateContext::default(), &FactorTable::default())
}

pub fn estimate_with(
    tag: &ParsedTag,
    context: &EstimateContext,
    factors: &FactorTable,
) -> Result<EmissionsResult, EstimateError> {
    let care = tag.care.as_profile().ok_or(EstimateError::CareStructure)?;
    let mut assumptions = BTreeMap::new();

    let mass_kg = garment_mass_kg(context, factors, &mut assumptions);
    let materials = round_grams(materials_phase(tag, mass_kg, factors, &mut assumptions));
    let manufacturing =
        round_grams(manufacturing_phase(tag.country.as_deref(), mass_kg, factors, &mut assumptions));
    let washing = round_grams(washing_phase(care, context, factors, &mut assumptions));
    let transport = transport_phase(context, mass_kg, factors, &mut assumptions).map(round_grams);

    let breakdown = Breakdown { materials, manufacturing, washing, transport };

    Ok(EmissionsResult {
        total_kgco2e: breakdown.sum(),
        breakdown,
        assumptions,
    })
}

fn round_grams(kg: f64) -> f64 {
    (kg * 1000.0).round() / 1000.0
}

fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v > 0.0)
}

// ── Mass ──────────────────────────────────────────────────────────────────────

fn garment_mass_kg(
    context: &EstimateContext,
    factors: &FactorTable,
    assumptions: &mut BTreeMap<String, String>,
) -> f64 {
    let (garment_type, default_mass_g) = factors.garment_mass(context.garment_type.as_deref());
    assumptions.insert("garment_type".into(), garment_type);

    let mass_g = match positive(context.weight_g) {
        Some(grams) => {
            assumptions.insert("weight".into(), format!("{}g supplied", format_number(grams)));
            grams
        }
        None => {
            assumptions.insert("weight".into(), format!("{default_mass_g:.0}g estimated"));
            default_mass_g
        }
    };
    mass_g / 1000.0
}

// ── Phases ────────────────────────────────────────────────────────────────────

fn materials_phase(
    tag: &ParsedTag,
    mass_kg: f64,
    factors: &FactorTable,
    assumptions: &mut BTreeMap<String, String>,
) -> f64 {
    if tag.materials.is_empty() {
        assumptions.insert("materials".into(), "no composition on tag".into());
        return 0.0;
    }

    let mut unknown = Vec::new();
    let per_kg: f64 = tag
        .materials
        .iter()
        .map(|m| {
            let factor = factors.fiber_factor(&m.fiber).unwrap_or_else(|| {
                unknown.push(m.fiber.trim().to_string());
                factors.unknown_fiber_kgco2e_per_kg
            });
            factor * share_pct(m.pct) / 100.0
        })
        .sum();

    if !unknown.is_empty() {
        assumptions.insert("unknown_fibers".into(), unknown.join(", "));
    }
    per_kg * mass_kg
}

/// A single component can be at most the whole garment. Non-finite and
/// negative shares count as nothing.
fn share_pct(pct: f64) -> f64 {
    if pct.is_finite() {
        pct.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

fn manufacturing_phase(
    country: Option<&str>,
    mass_kg: f64,
    factors: &FactorTable,
    assumptions: &mut BTreeMap<String, String>,
) -> f64 {
    let multiplier = match country {
        Some(country) => match factors.grid_multiplier(country) {
            Some(m) => {
                assumptions.insert("grid".into(), format!("{country} grid x{}", format_number(m)));
                m
            }
            None => {
                assumptions.insert("grid".into(), format!("{country} not in table, average grid"));
                1.0
            }
        },
        None => {
            assumptions.insert("grid".into(), "origin unknown, average grid".into());
            1.0
        }
    };
    factors.manufacturing_kgco2e_per_kg * mass_kg * multiplier
}

fn washing_phase(
    care: &CareProfile,
    context: &EstimateContext,
    factors: &FactorTable,
    assumptions: &mut BTreeMap<String, String>,
) -> f64 {
    let per_month = positive(context.washes_per_month).unwrap_or(factors.usage.washes_per_month);
    let years = factors.usage.lifetime_years;
    let events = per_month * 12.0 * years;
    assumptions.insert(
        "washes".into(),
        format!(
            "{} per month over {} year{}",
            format_number(per_month),
            format_number(years),
            if years == 1.0 { "" } else { "s" }
        ),
    );

    let mut per_event = match care.dry_cleaning {
        Some(kind) => {
            assumptions.insert("care".into(), format!("{kind} each cleaning"));
            factors.care.dry_cleaning(kind)
        }
        None => {
            let method = care.washing.unwrap_or_else(|| {
                assumptions.insert(
                    "care".into(),
                    format!("no washing symbol, assumed {}", factors.care.default_washing),
                );
                factors.care.default_washing
            });
            factors.care.washing(method) + care.drying.map_or(0.0, |d| factors.care.drying(d))
        }
    };
    if let Some(setting) = care.ironing {
        per_event += factors.care.ironing(setting);
    }

    per_event * events
}

fn transport_phase(
    context: &EstimateContext,
    mass_kg: f64,
    factors: &FactorTable,
    assumptions: &mut BTreeMap<String, String>,
) -> Option<f64> {
    match context.transport {
        Some(leg) if leg.distance_km.is_finite() && leg.distance_km >= 0.0 => {
            assumptions.insert(
                "transport".into(),
                format!("{} km by {}", format_number(leg.distance_km), leg.mode),
            );
            let tonnes = mass_kg / 1000.0;
            Some(tonnes * leg.distance_km * factors.transport.per_tonne_km(leg.mode))
        }
        _ => match factors.transport.reporting {
            TransportReporting::Always => Some(0.0),
            TransportReporting::WhenModelled => None,
        },
    }
}
