//! Emission-factor table driving the estimator.
//!
//! All constants the estimator uses live here so deployments can swap them
//! with a TOML file. [`FactorTable::from_toml`] deep-merges the document over
//! [`FactorTable::default`], so an override file only needs the keys it
//! changes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::care::{DryCleaning, DryingMethod, IroningSetting, WashingMethod};

#[derive(Debug, Error)]
pub enum FactorError {
    #[error("Failed to parse factor table: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to encode factor table: {0}")]
    Encode(#[from] toml::ser::Error),
    #[error("Invalid factor table: {0}")]
    Invalid(String),
}

/// Whether `breakdown.transport` is emitted as `0` when no transport model
/// applies, or left out entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportReporting {
    #[default]
    Always,
    WhenModelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    Sea,
    Road,
    Rail,
    Air,
}

impl std::fmt::Display for TransportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportMode::Sea => write!(f, "sea"),
            TransportMode::Road => write!(f, "road"),
            TransportMode::Rail => write!(f, "rail"),
            TransportMode::Air => write!(f, "air"),
        }
    }
}

/// Per-event care factors (kg CO2e per garment per event), keyed by care code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CareFactors {
    /// Method assumed when the label has no washing symbol.
    pub default_washing: WashingMethod,
    pub washing: BTreeMap<String, f64>,
    pub drying: BTreeMap<String, f64>,
    pub ironing: BTreeMap<String, f64>,
    pub dry_cleaning: BTreeMap<String, f64>,
}

impl CareFactors {
    pub fn washing(&self, method: WashingMethod) -> f64 {
        self.washing.get(method.as_str()).copied().unwrap_or(0.0)
    }

    pub fn drying(&self, method: DryingMethod) -> f64 {
        self.drying.get(method.as_str()).copied().unwrap_or(0.0)
    }

    pub fn ironing(&self, setting: IroningSetting) -> f64 {
        self.ironing.get(setting.as_str()).copied().unwrap_or(0.0)
    }

    pub fn dry_cleaning(&self, kind: DryCleaning) -> f64 {
        self.dry_cleaning.get(kind.as_str()).copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageAssumptions {
    pub washes_per_month: f64,
    pub lifetime_years: f64,
}

/// kg CO2e per tonne-kilometre.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportFactors {
    pub reporting: TransportReporting,
    pub sea: f64,
    pub road: f64,
    pub rail: f64,
    pub air: f64,
}

impl TransportFactors {
    pub fn per_tonne_km(&self, mode: TransportMode) -> f64 {
        match mode {
            TransportMode::Sea => self.sea,
            TransportMode::Road => self.road,
            TransportMode::Rail => self.rail,
            TransportMode::Air => self.air,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorTable {
    /// kg CO2e per kg of fiber, keyed by lowercase fiber name.
    pub fibers: BTreeMap<String, f64>,
    /// Alternate spellings, lowercase alias → key of `fibers`.
    pub fiber_aliases: BTreeMap<String, String>,
    pub unknown_fiber_kgco2e_per_kg: f64,
    /// Typical finished mass per garment type, grams.
    pub garment_mass_g: BTreeMap<String, f64>,
    pub default_garment_type: String,
    /// Cut-make-trim energy per kg of garment.
    pub manufacturing_kgco2e_per_kg: f64,
    /// Grid carbon intensity relative to a world-average grid, keyed by
    /// lowercase country name.
    pub grid_intensity: BTreeMap<String, f64>,
    pub care: CareFactors,
    pub usage: UsageAssumptions,
    pub transport: TransportFactors,
}

fn table<V: Clone>(entries: &[(&str, V)]) -> BTreeMap<String, V> {
    entries.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

impl Default for FactorTable {
    fn default() -> Self {
        FactorTable {
            fibers: table(&[
                ("cotton", 8.0),
                ("organic cotton", 3.8),
                ("polyester", 6.4),
                ("recycled polyester", 3.5),
                ("nylon", 7.3),
                ("recycled nylon", 4.0),
                ("elastane", 15.0),
                ("acrylic", 11.5),
                ("wool", 20.0),
                ("cashmere", 38.0),
                ("silk", 25.0),
                ("linen", 4.5),
                ("hemp", 2.5),
                ("viscose", 5.0),
                ("modal", 4.5),
                ("lyocell", 3.5),
                ("leather", 17.0),
            ]),
            fiber_aliases: table(&[
                ("spandex", "elastane".to_string()),
                ("lycra", "elastane".to_string()),
                ("polyamide", "nylon".to_string()),
                ("rayon", "viscose".to_string()),
                ("tencel", "lyocell".to_string()),
                ("flax", "linen".to_string()),
                ("merino", "wool".to_string()),
                ("merino wool", "wool".to_string()),
                ("pes", "polyester".to_string()),
                ("pa", "nylon".to_string()),
                ("ea", "elastane".to_string()),
            ]),
            unknown_fiber_kgco2e_per_kg: 7.0,
            garment_mass_g: table(&[
                ("generic", 200.0),
                ("t-shirt", 150.0),
                ("shirt", 250.0),
                ("dress", 350.0),
                ("skirt", 250.0),
                ("sweater", 450.0),
                ("hoodie", 550.0),
                ("jeans", 600.0),
                ("trousers", 450.0),
                ("shorts", 250.0),
                ("jacket", 900.0),
                ("coat", 1200.0),
                ("socks", 50.0),
                ("underwear", 60.0),
            ]),
            default_garment_type: "generic".to_string(),
            manufacturing_kgco2e_per_kg: 5.0,
            grid_intensity: table(&[
                ("bangladesh", 1.15),
                ("cambodia", 1.1),
                ("china", 1.25),
                ("india", 1.3),
                ("indonesia", 1.3),
                ("pakistan", 0.95),
                ("sri lanka", 1.0),
                ("turkey", 0.9),
                ("vietnam", 1.05),
                ("mexico", 0.9),
                ("portugal", 0.5),
                ("italy", 0.6),
                ("spain", 0.45),
                ("france", 0.15),
                ("germany", 0.8),
                ("united kingdom", 0.45),
                ("usa", 0.8),
                ("united states", 0.8),
                ("canada", 0.3),
            ]),
            care: CareFactors {
                default_washing: WashingMethod::MachineWashCold,
                washing: table(&[
                    ("machine_wash_hot", 0.05),
                    ("machine_wash_warm", 0.03),
                    ("machine_wash_gentle", 0.02),
                    ("machine_wash_cold", 0.015),
                    ("hand_wash_warm", 0.01),
                    ("hand_wash_cold", 0.005),
                ]),
                drying: table(&[
                    ("tumble_dry_high", 0.06),
                    ("tumble_dry_medium", 0.045),
                    ("tumble_dry_low", 0.035),
                    ("line_dry", 0.0),
                    ("lay_flat_to_dry", 0.0),
                    ("do_not_tumble_dry", 0.0),
                ]),
                ironing: table(&[
                    ("iron_high", 0.03),
                    ("iron_medium", 0.02),
                    ("iron_low", 0.015),
                    ("do_not_iron", 0.0),
                ]),
                dry_cleaning: table(&[("dry_clean", 0.45), ("dry_clean_only", 0.45)]),
            },
            usage: UsageAssumptions { washes_per_month: 2.0, lifetime_years: 2.0 },
            transport: TransportFactors {
                reporting: TransportReporting::Always,
                sea: 0.016,
                road: 0.105,
                rail: 0.028,
                air: 0.602,
            },
        }
    }
}

impl FactorTable {
    /// Deep-merge a TOML document over the built-in table.
    pub fn from_toml(toml_content: &str) -> Result<Self, FactorError> {
        let mut overlay: toml::Value = toml::from_str(toml_content)?;
        fold_name_case(&mut overlay);
        let mut merged = toml::Value::try_from(FactorTable::default())?;
        merge_toml(&mut merged, overlay);
        let factors: FactorTable = merged.try_into()?;
        factors.validate()?;
        Ok(factors)
    }

    /// kg CO2e per kg for a fiber name, `None` when the name is unrecognized.
    pub fn fiber_factor(&self, fiber: &str) -> Option<f64> {
        let key = fiber.trim().to_lowercase();
        if let Some(factor) = self.fibers.get(&key) {
            return Some(*factor);
        }
        self.fiber_aliases
            .get(&key)
            .and_then(|canonical| self.fibers.get(canonical))
            .copied()
    }

    /// Resolve a garment type to its table key and default mass. Unknown or
    /// missing types resolve to the default garment type.
    pub fn garment_mass(&self, garment_type: Option<&str>) -> (String, f64) {
        if let Some(kind) = garment_type.map(|g| g.trim().to_lowercase()) {
            if let Some(mass) = self.garment_mass_g.get(&kind) {
                return (kind, *mass);
            }
        }
        let mass = self
            .garment_mass_g
            .get(&self.default_garment_type)
            .copied()
            .unwrap_or(0.0);
        (self.default_garment_type.clone(), mass)
    }

    pub fn grid_multiplier(&self, country: &str) -> Option<f64> {
        self.grid_intensity.get(&country.trim().to_lowercase()).copied()
    }

    pub fn validate(&self) -> Result<(), FactorError> {
        let named = [
            ("unknown_fiber_kgco2e_per_kg", self.unknown_fiber_kgco2e_per_kg),
            ("manufacturing_kgco2e_per_kg", self.manufacturing_kgco2e_per_kg),
            ("usage.washes_per_month", self.usage.washes_per_month),
            ("usage.lifetime_years", self.usage.lifetime_years),
            ("transport.sea", self.transport.sea),
            ("transport.road", self.transport.road),
            ("transport.rail", self.transport.rail),
            ("transport.air", self.transport.air),
        ];
        let tables = [
            ("fibers", &self.fibers),
            ("garment_mass_g", &self.garment_mass_g),
            ("grid_intensity", &self.grid_intensity),
            ("care.washing", &self.care.washing),
            ("care.drying", &self.care.drying),
            ("care.ironing", &self.care.ironing),
            ("care.dry_cleaning", &self.care.dry_cleaning),
        ];

        let values = named.iter().map(|(name, v)| (name.to_string(), *v)).chain(
            tables.iter().flat_map(|(name, t)| {
                t.iter().map(move |(k, v)| (format!("{name}.{k}"), *v))
            }),
        );
        for (name, value) in values {
            if !value.is_finite() || value < 0.0 {
                return Err(FactorError::Invalid(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }

        if !self.garment_mass_g.contains_key(&self.default_garment_type) {
            return Err(FactorError::Invalid(format!(
                "default_garment_type '{}' has no entry in garment_mass_g",
                self.default_garment_type
            )));
        }
        for (alias, canonical) in &self.fiber_aliases {
            if !self.fibers.contains_key(canonical) {
                return Err(FactorError::Invalid(format!(
                    "fiber alias '{alias}' points at unknown fiber '{canonical}'"
                )));
            }
        }
        Ok(())
    }
}

/// Lookups lowercase the query, so every user-supplied name is stored
/// lowercased: keys of the name-keyed tables, alias targets and the default
/// garment type.
fn fold_name_case(overlay: &mut toml::Value) {
    let Some(root) = overlay.as_table_mut() else {
        return;
    };

    for name in ["fibers", "fiber_aliases", "garment_mass_g", "grid_intensity"] {
        if let Some(toml::Value::Table(table)) = root.get_mut(name) {
            let entries = std::mem::take(table);
            for (key, mut value) in entries {
                if name == "fiber_aliases" {
                    if let toml::Value::String(target) = &mut value {
                        *target = target.trim().to_lowercase();
                    }
                }
                table.insert(key.trim().to_lowercase(), value);
            }
        }
    }

    if let Some(toml::Value::String(kind)) = root.get_mut("default_garment_type") {
        *kind = kind.trim().to_lowercase();
    }
}

fn merge_toml(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_toml(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
