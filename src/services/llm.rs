use crate::core::config::LlmConfig;
use crate::core::state::{StoryContext, StoryPage};
use crate::core::turn::Segment;
use crate::services::prompt;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Debug;
use std::time::Duration;
use url::Url;

/// Shown in place of a panel when the image model answers without image data.
pub const PLACEHOLDER_IMAGE_URL: &str =
    "https://placehold.co/1024x1024/1a1a1a/FFF?text=Image+Generation+Failed";

#[cfg(target_arch = "wasm32")]
pub trait GeneratorBounds {}
#[cfg(target_arch = "wasm32")]
impl<T> GeneratorBounds for T {}

#[cfg(not(target_arch = "wasm32"))]
pub trait GeneratorBounds: Send + Sync {}
#[cfg(not(target_arch = "wasm32"))]
impl<T: Send + Sync> GeneratorBounds for T {}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait ComicGenerator: GeneratorBounds + Debug {
    async fn generate_segment(
        &self,
        history: &[StoryPage],
        instruction: &str,
        context: &StoryContext,
    ) -> Result<Segment>;

    /// Returns an image reference: a `data:` URI, or [`PLACEHOLDER_IMAGE_URL`]
    /// when the provider answered but produced no image.
    async fn generate_image(&self, visual_description: &str, art_style: &str) -> Result<String>;
}

pub fn create_generator(config: &LlmConfig) -> Result<Box<dyn ComicGenerator>> {
    Ok(Box::new(GeminiClient::new(config)?))
}

// --- Gemini ---
#[derive(Debug)]
pub struct GeminiClient {
    api_key: Option<String>,
    text_model: String,
    image_model: String,
    base_url: String,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            api_key: config.api_key.clone(),
            text_model: config.text_model.clone(),
            image_model: config.image_model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client: http_client(Duration::from_secs(config.timeout_seconds))?,
        })
    }

    fn endpoint(&self, model: &str) -> Result<Url> {
        let api_key = self
            .api_key
            .as_deref()
            .context("Gemini API key missing. Set API_KEY or GEMINI_API_KEY.")?;

        let mut url = Url::parse(&format!("{}/models/{}:generateContent", self.base_url, model))
            .with_context(|| format!("Invalid Gemini base url: {}", self.base_url))?;
        url.query_pairs_mut().append_pair("key", api_key);
        Ok(url)
    }

    async fn generate_content(&self, model: &str, request_body: &GeminiRequest) -> Result<GeminiResponse> {
        let url = self.endpoint(model)?;
        log::debug!("Gemini request to model {}", model);

        let resp = self.client.post(url).json(request_body).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let error_text = resp.text().await?;
            return Err(anyhow!("Gemini API error ({}): {}", status, error_text));
        }

        let response_text = resp.text().await?;
        let result: GeminiResponse = match serde_json::from_str(&response_text) {
            Ok(r) => r,
            Err(e) => {
                return Err(anyhow!(
                    "Failed to parse Gemini response: {}. Body: {}",
                    e,
                    response_text
                ))
            }
        };

        if let Some(err) = &result.error {
            return Err(anyhow!("Gemini API returned error: {}", err.message));
        }

        Ok(result)
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")
}

// The browser fetch API has no client-level timeout.
#[cfg(target_arch = "wasm32")]
fn http_client(_timeout: Duration) -> Result<reqwest::Client> {
    Ok(reqwest::Client::new())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiSystemInstruction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    response_mime_type: String,
    response_schema: Value,
}

impl GeminiRequest {
    fn user_text(text: String) -> Self {
        Self {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart { text }],
            }],
            system_instruction: None,
            generation_config: None,
        }
    }
}

#[derive(Deserialize, Debug)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiError>,
}

#[derive(Deserialize, Debug)]
struct GeminiCandidate {
    content: Option<GeminiContentResponse>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Deserialize, Debug)]
struct GeminiPartResponse {
    #[serde(default)]
    text: Option<String>,
    #[serde(rename = "inlineData", default)]
    inline_data: Option<GeminiInlineData>,
}

#[derive(Deserialize, Debug)]
struct GeminiInlineData {
    #[serde(rename = "mimeType", default)]
    mime_type: Option<String>,
    #[serde(default)]
    data: String,
}

#[derive(Deserialize, Debug)]
struct GeminiError {
    message: String,
}

impl GeminiResponse {
    fn first_candidate(&self) -> Option<&GeminiCandidate> {
        self.candidates.as_ref().and_then(|c| c.first())
    }

    /// Concatenated text parts of the first candidate.
    fn text(&self) -> Result<String> {
        let first = self
            .first_candidate()
            .context("Gemini response has no candidates")?;

        let text: String = first
            .content
            .iter()
            .flat_map(|c| c.parts.iter())
            .filter_map(|p| p.text.as_deref())
            .collect();

        if text.trim().is_empty() {
            let reason = first.finish_reason.as_deref().unwrap_or("UNKNOWN");
            return Err(anyhow!("Gemini response empty. Finish reason: {}", reason));
        }
        Ok(text)
    }

    /// The first inline image of the first candidate, as a `data:` URI.
    fn image_data_uri(&self) -> Option<String> {
        self.first_candidate()?
            .content
            .as_ref()?
            .parts
            .iter()
            .filter_map(|p| p.inline_data.as_ref())
            .find(|d| !d.data.is_empty())
            .map(|d| {
                format!(
                    "data:{};base64,{}",
                    d.mime_type.as_deref().unwrap_or("image/jpeg"),
                    d.data
                )
            })
    }

    /// Falls back to [`PLACEHOLDER_IMAGE_URL`] when the answer carries no image.
    fn image_reference(&self) -> String {
        match self.image_data_uri() {
            Some(uri) => uri,
            None => {
                let reason = self
                    .first_candidate()
                    .and_then(|c| c.finish_reason.as_deref())
                    .unwrap_or("UNKNOWN");
                log::warn!(
                    "Gemini returned no image data (finish reason: {}), using placeholder",
                    reason
                );
                PLACEHOLDER_IMAGE_URL.to_string()
            }
        }
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl ComicGenerator for GeminiClient {
    async fn generate_segment(
        &self,
        history: &[StoryPage],
        instruction: &str,
        context: &StoryContext,
    ) -> Result<Segment> {
        let mut request_body =
            GeminiRequest::user_text(prompt::segment_prompt(history, instruction, context));
        request_body.system_instruction = Some(GeminiSystemInstruction {
            parts: vec![GeminiPart {
                text: prompt::SYSTEM_INSTRUCTION.to_string(),
            }],
        });
        request_body.generation_config = Some(GeminiGenerationConfig {
            response_mime_type: "application/json".to_string(),
            response_schema: prompt::segment_schema(),
        });

        let response = self.generate_content(&self.text_model, &request_body).await?;
        let text = response.text()?;
        prompt::parse_segment(&text)
    }

    async fn generate_image(&self, visual_description: &str, art_style: &str) -> Result<String> {
        let request_body =
            GeminiRequest::user_text(prompt::image_prompt(visual_description, art_style));

        let response = self.generate_content(&self.image_model, &request_body).await?;
        Ok(response.image_reference())
    }
}
