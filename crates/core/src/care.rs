use serde::{Deserialize, Serialize};

// ── Care symbol vocabularies ──────────────────────────────────────────────────

macro_rules! care_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $code:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $code),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($code => Ok($name::$variant),)+
                    other => Err(format!("Unknown {} code: '{other}'", stringify!($name))),
                }
            }
        }
    };
}

care_enum!(
    /// Laundering instruction. Hot/warm water ranks above cold, machine above hand.
    WashingMethod {
        MachineWashCold => "machine_wash_cold",
        MachineWashWarm => "machine_wash_warm",
        MachineWashHot => "machine_wash_hot",
        MachineWashGentle => "machine_wash_gentle",
        HandWashCold => "hand_wash_cold",
        HandWashWarm => "hand_wash_warm",
    }
);

care_enum!(
    DryingMethod {
        TumbleDryLow => "tumble_dry_low",
        TumbleDryMedium => "tumble_dry_medium",
        TumbleDryHigh => "tumble_dry_high",
        LayFlatToDry => "lay_flat_to_dry",
        LineDry => "line_dry",
        DoNotTumbleDry => "do_not_tumble_dry",
    }
);

care_enum!(
    IroningSetting {
        IronLow => "iron_low",
        IronMedium => "iron_medium",
        IronHigh => "iron_high",
        DoNotIron => "do_not_iron",
    }
);

care_enum!(
    DryCleaning {
        DryClean => "dry_clean",
        DryCleanOnly => "dry_clean_only",
    }
);

/// The four care slots of a label. Every slot is always present; `None`
/// serializes as `null`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CareProfile {
    pub washing: Option<WashingMethod>,
    pub drying: Option<DryingMethod>,
    pub ironing: Option<IroningSetting>,
    pub dry_cleaning: Option<DryCleaning>,
}

impl CareProfile {
    /// All four slots `null`.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::empty()
    }
}
