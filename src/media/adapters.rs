//! Response schemas of third-party lookup providers and their conversion
//! into format candidates.

use super::{
    backend::BackendError,
    types::{FormatCandidate, SizeHint},
};
use crate::config::ResponseShape;
use serde::Deserialize;
use serde_json::Value;

/// `formats` / `adaptiveFormats` lists in the player-response style, either
/// at the top level or nested under `streamingData`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamingDataResponse {
    status: Option<Value>,
    reason: Option<String>,
    message: Option<String>,
    streaming_data: Option<StreamingLists>,
    #[serde(flatten)]
    top_level: StreamingLists,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamingLists {
    #[serde(default)]
    formats: Vec<StreamingFormat>,
    #[serde(default)]
    adaptive_formats: Vec<StreamingFormat>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamingFormat {
    url: Option<String>,
    mime_type: Option<String>,
    quality_label: Option<String>,
    height: Option<u32>,
    content_length: Option<SizeHint>,
}

impl From<StreamingFormat> for FormatCandidate {
    fn from(format: StreamingFormat) -> Self {
        Self {
            mime_type: format.mime_type,
            quality_label: format.quality_label,
            height: format.height,
            content_length: format.content_length,
            url: format.url,
            ..Default::default()
        }
    }
}

/// A converter-style answer with one muxed download link. Providers often
/// send several of the synonym fields at once.
#[derive(Debug, Deserialize)]
struct DirectLinkResponse {
    link: Option<String>,
    url: Option<String>,
    download_url: Option<String>,
    quality: Option<String>,
    ext: Option<String>,
    format: Option<String>,
    filesize: Option<SizeHint>,
    size: Option<SizeHint>,
}

impl DirectLinkResponse {
    fn into_candidate(self) -> Option<FormatCandidate> {
        let url = [self.link, self.url, self.download_url]
            .into_iter()
            .flatten()
            .find(|link| !link.trim().is_empty())?;

        Some(FormatCandidate {
            ext: Some(
                self.ext
                    .or(self.format)
                    .unwrap_or_else(|| "mp4".to_string()),
            ),
            has_video: Some(true),
            has_audio: Some(true),
            quality_label: self.quality,
            filesize: self.filesize.or(self.size),
            url: Some(url),
            ..Default::default()
        })
    }
}

/// Maps a provider body to candidates according to its configured shape.
pub fn adapt(shape: ResponseShape, body: &[u8]) -> Result<Vec<FormatCandidate>, BackendError> {
    match shape {
        ResponseShape::StreamingData => adapt_streaming_data(body),
        ResponseShape::DirectLink => adapt_direct_link(body),
    }
}

fn adapt_streaming_data(body: &[u8]) -> Result<Vec<FormatCandidate>, BackendError> {
    let response: StreamingDataResponse = serde_json::from_slice(body)
        .map_err(|e| BackendError::MalformedResponse(e.to_string()))?;

    // Only a textual status other than "ok" signals failure; numeric codes pass.
    if let Some(Value::String(status)) = &response.status {
        if !status.eq_ignore_ascii_case("ok") {
            let reason = response
                .reason
                .or(response.message)
                .unwrap_or_else(|| status.clone());
            return Err(BackendError::Upstream(reason));
        }
    }

    let mut lists = response.top_level;
    if let Some(nested) = response.streaming_data {
        lists.formats.extend(nested.formats);
        lists.adaptive_formats.extend(nested.adaptive_formats);
    }

    Ok(lists
        .formats
        .into_iter()
        .chain(lists.adaptive_formats)
        .map(FormatCandidate::from)
        .collect())
}

fn adapt_direct_link(body: &[u8]) -> Result<Vec<FormatCandidate>, BackendError> {
    let response: DirectLinkResponse = serde_json::from_slice(body)
        .map_err(|e| BackendError::MalformedResponse(e.to_string()))?;

    Ok(response.into_candidate().into_iter().collect())
}
