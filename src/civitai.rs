use crate::error::Result;
use log::{info, warn};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;

const MODEL_INFO_BY_HASH_URL: &str = "https://civitai.com/api/v1/model-versions/by-hash/";
const MODEL_PAGE_BY_ID_URL: &str = "https://civitai.com/models/";
const MODEL_DESCRIPTION_TAG: &str = "mantine-TypographyStylesProvider-root mantine-dfvxn9";
const PRESET_PREFIX: &str = "###ModelPresets###";

// The page endpoint serves a challenge page to non-browser agents.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0";

/// Metadata the hash-indexed API yields for a model version. Absent payload
/// fields degrade to empty values rather than failing the lookup.
#[derive(Clone, Debug)]
pub struct HashLookup {
    pub model_url: String,
    pub trigger_words: Vec<String>,
    pub first_image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelVersionPayload {
    #[serde(default)]
    trained_words: Vec<String>,
    #[serde(default)]
    images: Vec<ImagePayload>,
    #[serde(default)]
    model_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ImagePayload {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug)]
pub struct CivitaiClient {
    client: Client,
}

impl CivitaiClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(format!(
                "{}/{}",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;
        Ok(Self { client })
    }

    /// Queries the hash-indexed metadata endpoint for trigger words, the
    /// model page URL and a representative image URL.
    pub fn lookup_by_hash(&self, hash: &str) -> Result<HashLookup> {
        let api_url = format!("{MODEL_INFO_BY_HASH_URL}{hash}");
        info!("Fetching model metadata from {api_url}");

        let payload: ModelVersionPayload = self
            .client
            .get(&api_url)
            .send()?
            .error_for_status()?
            .json()?;

        let model_url = model_page_url(payload.model_id);
        let first_image_url = payload
            .images
            .into_iter()
            .find_map(|image| image.url)
            .filter(|url| !url.is_empty());

        Ok(HashLookup {
            model_url,
            trigger_words: payload.trained_words,
            first_image_url,
        })
    }

    /// Fetches a model page and scans it for an embedded preset-sharing
    /// payload. Missing markers or an unparseable block yield `Ok(None)`;
    /// callers fall back to locally-authored presets.
    pub fn fetch_presets_from_page(&self, model_url: &str) -> Result<Option<Value>> {
        info!("Scanning model page {model_url} for shared presets");
        let page = self
            .client
            .get(model_url)
            .header(reqwest::header::USER_AGENT, BROWSER_USER_AGENT)
            .send()?
            .error_for_status()?
            .text()?;

        let presets = extract_embedded_presets(&page);
        if presets.is_none() {
            info!("No shared presets found on {model_url}");
        }
        Ok(presets)
    }

    /// Downloads raw image bytes, logging and discarding failures; preview
    /// images are best-effort.
    pub fn download_image_bytes(&self, image_url: &str) -> Option<Vec<u8>> {
        let response = match self.client.get(image_url).send() {
            Ok(response) => response,
            Err(err) => {
                warn!("Failed to request image {image_url}: {err}");
                return None;
            }
        };
        if !response.status().is_success() {
            warn!(
                "Image request for {image_url} returned status {}",
                response.status()
            );
            return None;
        }
        match response.bytes() {
            Ok(bytes) => Some(bytes.to_vec()),
            Err(err) => {
                warn!("Failed to read image bytes from {image_url}: {err}");
                None
            }
        }
    }
}

/// Locates the preset-sharing payload embedded in a model page: the
/// description marker, then the preset prefix, then the first balanced JSON
/// object after it. The depth scan is string-aware so braces inside quoted
/// payload strings do not desynchronize it. Only the first balanced block is
/// considered; anything unparseable yields `None`.
pub fn extract_embedded_presets(page: &str) -> Option<Value> {
    let description_start = page.find(MODEL_DESCRIPTION_TAG)?;
    let after_description = &page[description_start + MODEL_DESCRIPTION_TAG.len()..];

    let prefix_start = after_description.find(PRESET_PREFIX)?;
    let after_prefix = &after_description[prefix_start + PRESET_PREFIX.len()..];

    let block = first_balanced_block(after_prefix)?;
    serde_json::from_str::<Value>(block)
        .ok()
        .filter(Value::is_object)
}

fn first_balanced_block(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (index, byte) in text.bytes().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }

        match byte {
            b'"' if start.is_some() => in_string = true,
            b'{' => {
                if depth == 0 {
                    start = Some(index);
                }
                depth += 1;
            }
            b'}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start?..=index]);
                }
            }
            _ => {}
        }
    }

    None
}

pub(crate) fn model_page_url(model_id: Option<u64>) -> String {
    match model_id {
        Some(id) => format!("{MODEL_PAGE_BY_ID_URL}{id}"),
        None => MODEL_PAGE_BY_ID_URL.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORD_JSON: &str = r#"{"url":"x","default_preset":"default","trigger_words":[],"presets":{"default":""}}"#;

    fn page_with(payload: &str) -> String {
        format!(
            "<html><div class=\"{MODEL_DESCRIPTION_TAG}\">description \
             {PRESET_PREFIX}{payload} trailing text</div></html>"
        )
    }

    #[test]
    fn extracts_embedded_payload() {
        let page = page_with(RECORD_JSON);
        let value = extract_embedded_presets(&page).unwrap();
        assert_eq!(value["url"], "x");
        assert_eq!(value["default_preset"], "default");
    }

    #[test]
    fn unbalanced_payload_yields_none() {
        let truncated = &RECORD_JSON[..RECORD_JSON.len() - 1];
        assert!(extract_embedded_presets(&page_with(truncated)).is_none());
    }

    #[test]
    fn missing_description_marker_yields_none() {
        let page = format!("<html>{PRESET_PREFIX}{RECORD_JSON}</html>");
        assert!(extract_embedded_presets(&page).is_none());
    }

    #[test]
    fn prefix_before_description_marker_is_ignored() {
        let page = format!(
            "<html>{PRESET_PREFIX}{RECORD_JSON}<div class=\"{MODEL_DESCRIPTION_TAG}\">no payload here</div></html>"
        );
        assert!(extract_embedded_presets(&page).is_none());
    }

    #[test]
    fn braces_inside_quoted_strings_do_not_break_the_scan() {
        let payload = r#"{"url":"x","default_preset":"default","trigger_words":[],"presets":{"default":"pose: {standing}, mood: {calm}"}}"#;
        let value = extract_embedded_presets(&page_with(payload)).unwrap();
        assert_eq!(
            value["presets"]["default"],
            "pose: {standing}, mood: {calm}"
        );
    }

    #[test]
    fn escaped_quotes_inside_strings_are_handled() {
        let payload = r#"{"url":"x","default_preset":"default","trigger_words":[],"presets":{"default":"say \"{hi}\""}}"#;
        let value = extract_embedded_presets(&page_with(payload)).unwrap();
        assert_eq!(value["presets"]["default"], "say \"{hi}\"");
    }

    #[test]
    fn first_balanced_block_only_is_considered() {
        // first block is not valid JSON, so the scan gives up rather than
        // hunting for a later block
        let page = page_with("{not json} {\"url\":\"x\",\"default_preset\":\"d\",\"trigger_words\":[],\"presets\":{}}");
        assert!(extract_embedded_presets(&page).is_none());
    }

    #[test]
    fn non_object_payload_is_rejected() {
        let page = page_with("[1, 2, 3]");
        assert!(extract_embedded_presets(&page).is_none());
    }

    #[test]
    fn model_page_url_falls_back_to_bare_prefix() {
        assert_eq!(model_page_url(Some(42)), "https://civitai.com/models/42");
        assert_eq!(model_page_url(None), "https://civitai.com/models/");
    }
}
