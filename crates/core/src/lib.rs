pub mod care;
pub mod estimate;
pub mod factors;
pub mod normalize;
pub mod tag;

pub use care::{CareProfile, DryCleaning, DryingMethod, IroningSetting, WashingMethod};
pub use estimate::{
    estimate, estimate_with, Breakdown, EmissionsResult, EstimateContext, EstimateError,
    TransportLeg,
};
pub use factors::{FactorError, FactorTable, TransportMode, TransportReporting};
pub use normalize::{normalize, normalize_tag};
pub use tag::{CareData, MaterialComponent, ParsedTag, TagResponse};
