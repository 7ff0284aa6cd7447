//! Vision extraction through an OpenAI-compatible chat-completions API.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use crate::extractor::{ExtractError, TagExtractor, TagImage};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-5.2";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const SYSTEM_PROMPT: &str = "You are an expert at reading clothing care/composition tags.
Step 1: Read ALL visible text on the tag exactly as printed and put it in the \"ocr_text\" field.
Step 2: Using the ocr_text you just extracted, populate the structured fields below. Do NOT return null or [] if the information is present in the ocr_text.
  - country: the country of origin or manufacture. Only null if truly not visible.
  - materials: an array of {fiber, pct} objects for the fabric composition (e.g. \"80%SILK\" -> {fiber:\"Silk\",pct:80}). Only [] if truly not visible.
  - care: an object with exactly four keys: washing, drying, ironing, dry_cleaning, each one of the allowed values or null if not visible.
    - washing: machine_wash_cold, machine_wash_warm, machine_wash_hot, machine_wash_gentle, hand_wash_cold, hand_wash_warm
    - drying: tumble_dry_low, tumble_dry_medium, tumble_dry_high, lay_flat_to_dry, line_dry, do_not_tumble_dry
    - ironing: iron_low, iron_medium, iron_high, do_not_iron
    - dry_cleaning: dry_clean, dry_clean_only
Return ONLY the JSON object. Do not return care as a string. Be precise with percentages, fiber names, and care keys.";

const USER_PROMPT: &str = "First read ALL visible text on this clothing tag image, then extract the country, materials, and care instructions from it.";

#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    /// `None` leaves the extractor constructible; every call then fails.
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

pub struct OpenAiExtractor {
    http_client: Client,
    settings: OpenAiSettings,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl OpenAiExtractor {
    pub fn new(settings: OpenAiSettings) -> Result<Self, ExtractError> {
        let http_client = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self { http_client, settings })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.settings.base_url.trim_end_matches('/'))
    }

    fn request_body(&self, image: &TagImage) -> Value {
        json!({
            "model": self.settings.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {
                    "role": "user",
                    "content": [
                        {"type": "image_url", "image_url": {"url": image.data_url(), "detail": "high"}},
                        {"type": "text", "text": USER_PROMPT},
                    ],
                },
            ],
            "response_format": tag_schema(),
        })
    }
}

#[async_trait]
impl TagExtractor for OpenAiExtractor {
    async fn extract(&self, image: &TagImage) -> Result<Value, ExtractError> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .ok_or(ExtractError::MissingApiKey)?;

        tracing::debug!(model = %self.settings.model, bytes = image.bytes.len(), "Requesting tag extraction");

        let response = self
            .http_client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&self.request_body(image))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractError::Status { status: status.as_u16(), body });
        }

        let chat: ChatResponse = response.json().await?;
        parse_content(chat)
    }
}

fn parse_content(chat: ChatResponse) -> Result<Value, ExtractError> {
    let content = chat
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| ExtractError::MalformedResponse("no message content".into()))?;

    serde_json::from_str(&content).map_err(|e| ExtractError::MalformedResponse(e.to_string()))
}

/// Strict JSON schema the provider is asked to fill.
fn tag_schema() -> Value {
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": "clothing_tag",
            "strict": true,
            "schema": {
                "type": "object",
                "properties": {
                    "ocr_text": {"type": "string"},
                    "country": {"type": ["string", "null"]},
                    "materials": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "fiber": {"type": "string"},
                                "pct": {"type": "number"},
                            },
                            "required": ["fiber", "pct"],
                            "additionalProperties": false,
                        },
                    },
                    "care": {
                        "type": "object",
                        "properties": {
                            "washing": care_slot(ecotag_core::WashingMethod::ALL.iter().map(|c| c.as_str())),
                            "drying": care_slot(ecotag_core::DryingMethod::ALL.iter().map(|c| c.as_str())),
                            "ironing": care_slot(ecotag_core::IroningSetting::ALL.iter().map(|c| c.as_str())),
                            "dry_cleaning": care_slot(ecotag_core::DryCleaning::ALL.iter().map(|c| c.as_str())),
                        },
                        "required": ["washing", "drying", "ironing", "dry_cleaning"],
                        "additionalProperties": false,
                    },
                },
                "required": ["ocr_text", "country", "materials", "care"],
                "additionalProperties": false,
            },
        },
    })
}

fn care_slot<'a>(codes: impl Iterator<Item = &'a str>) -> Value {
    let mut values: Vec<Value> = codes.map(Value::from).collect();
    values.push(Value::Null);
    json!({"type": ["string", "null"], "enum": values})
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat(content: Option<&str>) -> ChatResponse {
        ChatResponse {
            choices: vec![ChatChoice {
                message: ChatMessage { content: content.map(str::to_string) },
            }],
        }
    }

    #[test]
    fn schema_enumerates_every_care_code() {
        let schema = tag_schema();
        let washing = &schema["json_schema"]["schema"]["properties"]["care"]["properties"]["washing"]["enum"];
        let codes = washing.as_array().unwrap();
        assert_eq!(codes.len(), ecotag_core::WashingMethod::ALL.len() + 1);
        assert!(codes.contains(&Value::from("machine_wash_cold")));
        assert!(codes.contains(&Value::Null));
    }

    #[test]
    fn content_is_parsed_as_json() {
        let value = parse_content(chat(Some(r#"{"country":"Portugal"}"#))).unwrap();
        assert_eq!(value["country"], "Portugal");
    }

    #[test]
    fn missing_or_invalid_content_is_malformed() {
        assert!(matches!(parse_content(chat(None)), Err(ExtractError::MalformedResponse(_))));
        assert!(matches!(
            parse_content(chat(Some("not json"))),
            Err(ExtractError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_content(ChatResponse { choices: vec![] }),
            Err(ExtractError::MalformedResponse(_))
        ));
    }

    #[test]
    fn request_carries_data_url_and_model() {
        let extractor = OpenAiExtractor::new(OpenAiSettings {
            model: "vision-test".into(),
            ..Default::default()
        })
        .unwrap();
        let image = TagImage { bytes: b"abc".to_vec(), mime: "image/png" };
        let body = extractor.request_body(&image);
        assert_eq!(body["model"], "vision-test");
        assert_eq!(
            body["messages"][1]["content"][0]["image_url"]["url"],
            "data:image/png;base64,YWJj"
        );
    }

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let extractor = OpenAiExtractor::new(OpenAiSettings {
            base_url: "http://localhost:9999/v1/".into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(extractor.endpoint(), "http://localhost:9999/v1/chat/completions");
    }

    #[tokio::test]
    async fn missing_api_key_fails_without_network() {
        let extractor = OpenAiExtractor::new(OpenAiSettings::default()).unwrap();
        let err = extractor.extract(&TagImage::new(b"x".to_vec())).await.unwrap_err();
        assert!(matches!(err, ExtractError::MissingApiKey));
    }
}
