use ecotag_core::{
    estimate_with, normalize, CareData, CareProfile, EmissionsResult, EstimateContext,
    EstimateError, FactorTable, ParsedTag, TagResponse, WashingMethod,
};
use std::sync::Arc;
use thiserror::Error;

use crate::cache::ResponseCache;
use crate::extractor::{ExtractError, TagExtractor, TagImage};
use crate::hash;
use crate::history::ScanHistory;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Tag extraction failed: {0}")]
    Upstream(#[from] ExtractError),
    #[error("Emissions estimate failed: {0}")]
    Estimate(#[from] EstimateError),
}

impl PipelineError {
    /// Stable code reported at the service boundary.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::Upstream(_) => "UPSTREAM_ERROR",
            PipelineError::Estimate(_) => "INTERNAL_ERROR",
        }
    }
}

/// Everything one analysis run needs. Nothing is shared between requests.
#[derive(Debug, Clone)]
pub struct TagRequest {
    pub image: TagImage,
    pub context: EstimateContext,
}

impl TagRequest {
    pub fn new(image_bytes: Vec<u8>) -> Self {
        Self { image: TagImage::new(image_bytes), context: EstimateContext::default() }
    }

    pub fn with_context(mut self, context: EstimateContext) -> Self {
        self.context = context;
        self
    }
}

/// Orchestrates: cache lookup → extract → normalize → estimate → cache store.
///
/// The extractor is called at most once per request and never on a cache
/// hit; the estimator at most twice (see [`estimate_with_fallback`]).
pub struct TagPipeline {
    extractor: Arc<dyn TagExtractor>,
    cache: ResponseCache,
    factors: Arc<FactorTable>,
    history: Option<ScanHistory>,
}

impl TagPipeline {
    pub fn new(extractor: Arc<dyn TagExtractor>, cache: ResponseCache, factors: Arc<FactorTable>) -> Self {
        Self { extractor, cache, factors, history: None }
    }

    pub fn with_history(mut self, history: ScanHistory) -> Self {
        self.history = Some(history);
        self
    }

    pub fn history(&self) -> Option<&ScanHistory> {
        self.history.as_ref()
    }

    pub async fn analyze(&self, request: &TagRequest) -> Result<TagResponse, PipelineError> {
        let outcome = self.run(request).await;

        if let Some(history) = &self.history {
            history.record(&hash::image_key(&request.image.bytes), &outcome).await;
        }
        outcome
    }

    async fn run(&self, request: &TagRequest) -> Result<TagResponse, PipelineError> {
        let key = hash::response_key(&request.image.bytes, &request.context);
        if let Some(cached) = self.cache.lookup(&key).await {
            return Ok(cached);
        }

        let raw = self.extractor.extract(&request.image).await.map_err(|e| {
            tracing::warn!("Tag extraction failed: {e}");
            PipelineError::Upstream(e)
        })?;

        let parsed = normalize(&raw);
        let emissions = estimate_with_fallback(&parsed, |tag| {
            estimate_with(tag, &request.context, &self.factors)
        })?;
        tracing::info!(
            total_kgco2e = emissions.total_kgco2e,
            materials = parsed.materials.len(),
            "Estimated tag emissions"
        );

        let response = TagResponse { parsed, emissions };
        self.cache.store(&key, &response).await;
        Ok(response)
    }
}

/// Run `estimate`, retrying exactly once with [`with_fallback_care`] when the
/// first attempt rejects the care structure. A second failure is returned.
pub fn estimate_with_fallback<F>(tag: &ParsedTag, mut estimate: F) -> Result<EmissionsResult, EstimateError>
where
    F: FnMut(&ParsedTag) -> Result<EmissionsResult, EstimateError>,
{
    match estimate(tag) {
        Err(EstimateError::CareStructure) => {
            tracing::warn!("Care data is not structured, retrying with {}", WashingMethod::MachineWashCold);
            estimate(&with_fallback_care(tag))
        }
        other => other,
    }
}

/// Copy of `tag` whose washing is forced to `machine_wash_cold`. The other
/// care slots are kept when they can be read, otherwise left `null`.
pub fn with_fallback_care(tag: &ParsedTag) -> ParsedTag {
    let existing = match &tag.care {
        CareData::Structured(profile) => *profile,
        CareData::Unstructured(value) => normalize(&serde_json::json!({ "care": value }))
            .care
            .as_profile()
            .copied()
            .unwrap_or_default(),
    };

    ParsedTag {
        care: CareData::Structured(CareProfile {
            washing: Some(WashingMethod::MachineWashCold),
            ..existing
        }),
        ..tag.clone()
    }
}
