pub mod cache;
pub mod extractor;
pub mod hash;
pub mod history;
pub mod openai;
pub mod pipeline;

pub use cache::{CacheError, ResponseCache};
pub use extractor::{ExtractError, MockExtractor, TagExtractor, TagImage};
pub use hash::{image_key, response_key, sha256_bytes, to_hex};
pub use history::ScanHistory;
pub use openai::{OpenAiExtractor, OpenAiSettings};
pub use pipeline::{estimate_with_fallback, with_fallback_care, PipelineError, TagPipeline, TagRequest};
