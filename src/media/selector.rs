//! Progressive MP4 selection over provider-neutral candidates.

use super::types::{FormatCandidate, FormatRecord};
use std::collections::HashSet;

const MP4: &str = "mp4";
const FALLBACK_LABEL: &str = "MP4";

const VIDEO_CODEC_PREFIXES: &[&str] = &["avc", "av01", "vp8", "vp9", "vp09", "hev1", "hvc1", "mp4v"];
const AUDIO_CODEC_PREFIXES: &[&str] = &["mp4a", "opus", "vorbis", "ac-3", "ec-3", "mp3", "flac"];

/// Filters candidates to progressive MP4 streams, sorted by descending
/// rank and unique by label. An empty result means no qualifying format.
pub fn select_progressive_mp4(candidates: &[FormatCandidate]) -> Vec<FormatRecord> {
    let mut accepted: Vec<(u64, FormatRecord)> = candidates
        .iter()
        .filter_map(qualify)
        .map(|record| (rank(&record.label), record))
        .collect();

    // Stable, so equal ranks keep provider order.
    accepted.sort_by(|a, b| b.0.cmp(&a.0));

    let mut seen = HashSet::new();
    accepted
        .into_iter()
        .filter(|(_, record)| seen.insert(record.label.clone()))
        .map(|(_, record)| record)
        .collect()
}

/// Numeric rank embedded in a label: its digits read as one integer.
pub fn rank(label: &str) -> u64 {
    let digits: String = label.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        0
    } else {
        digits.parse().unwrap_or(u64::MAX)
    }
}

fn qualify(candidate: &FormatCandidate) -> Option<FormatRecord> {
    if !is_mp4(candidate) || !has_video(candidate) || !has_audio(candidate) {
        return None;
    }
    let url = candidate
        .url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())?;

    Some(FormatRecord {
        label: label(candidate),
        extension: MP4.to_string(),
        size_bytes: size_bytes(candidate),
        url: url.to_string(),
    })
}

fn is_mp4(candidate: &FormatCandidate) -> bool {
    let by_ext = candidate
        .ext
        .as_deref()
        .is_some_and(|ext| ext.trim().eq_ignore_ascii_case(MP4));
    let by_mime = candidate
        .mime_type
        .as_deref()
        .is_some_and(|mime| mime.to_ascii_lowercase().contains("video/mp4"));
    by_ext || by_mime
}

fn has_video(candidate: &FormatCandidate) -> bool {
    track_present(
        candidate.vcodec.as_deref(),
        candidate.has_video,
        candidate.mime_type.as_deref(),
        VIDEO_CODEC_PREFIXES,
    )
}

fn has_audio(candidate: &FormatCandidate) -> bool {
    track_present(
        candidate.acodec.as_deref(),
        candidate.has_audio,
        candidate.mime_type.as_deref(),
        AUDIO_CODEC_PREFIXES,
    )
}

/// An explicit codec field wins, then an explicit flag, then the codec
/// list of the mime type.
fn track_present(codec: Option<&str>, flag: Option<bool>, mime: Option<&str>, prefixes: &[&str]) -> bool {
    if let Some(codec) = codec {
        let codec = codec.trim();
        return !codec.is_empty() && !codec.eq_ignore_ascii_case("none");
    }
    if let Some(flag) = flag {
        return flag;
    }
    mime.map(mime_codecs)
        .unwrap_or_default()
        .iter()
        .any(|codec| prefixes.iter().any(|prefix| codec.starts_with(prefix)))
}

/// `video/mp4; codecs="avc1.42001E, mp4a.40.2"` -> `["avc1.42001e", "mp4a.40.2"]`
fn mime_codecs(mime: &str) -> Vec<String> {
    mime.split(';')
        .filter_map(|param| param.trim().strip_prefix("codecs="))
        .flat_map(|list| list.trim_matches('"').split(','))
        .map(|codec| codec.trim().to_ascii_lowercase())
        .filter(|codec| !codec.is_empty())
        .collect()
}

fn label(candidate: &FormatCandidate) -> String {
    if let Some(label) = candidate
        .quality_label
        .as_deref()
        .map(str::trim)
        .filter(|label| !label.is_empty())
    {
        return label.to_string();
    }
    match candidate.height {
        Some(height) if height > 0 => format!("{height}p"),
        _ => FALLBACK_LABEL.to_string(),
    }
}

fn size_bytes(candidate: &FormatCandidate) -> Option<u64> {
    candidate
        .content_length
        .as_ref()
        .or(candidate.filesize.as_ref())
        .or(candidate.filesize_approx.as_ref())
        .and_then(|hint| hint.to_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::types::SizeHint;

    fn progressive(label: &str, url: &str) -> FormatCandidate {
        FormatCandidate {
            ext: Some("mp4".into()),
            vcodec: Some("avc1.64001F".into()),
            acodec: Some("mp4a.40.2".into()),
            quality_label: Some(label.into()),
            url: Some(url.into()),
            ..Default::default()
        }
    }

    fn as_candidate(record: &FormatRecord) -> FormatCandidate {
        FormatCandidate {
            ext: Some(record.extension.clone()),
            has_video: Some(true),
            has_audio: Some(true),
            quality_label: Some(record.label.clone()),
            filesize: record.size_bytes.map(SizeHint::Bytes),
            url: Some(record.url.clone()),
            ..Default::default()
        }
    }

    #[test]
    fn test_rank() {
        assert_eq!(rank("720p"), 720);
        assert_eq!(rank("1080p60"), 108060);
        assert_eq!(rank("MP4"), 4);
        assert_eq!(rank(""), 0);
        assert_eq!(rank("99999999999999999999999p"), u64::MAX);
    }

    #[test]
    fn test_container_label_sorts_below_lowest_resolution() {
        let unlabeled = FormatCandidate {
            quality_label: None,
            ..progressive("", "https://a/unlabeled")
        };
        let out = select_progressive_mp4(&[unlabeled, progressive("144p", "https://a/144")]);
        let labels: Vec<_> = out.iter().map(|f| f.label.as_str()).collect();
        assert_eq!(labels, ["144p", "MP4"]);
        assert_eq!(out[1].url, "https://a/unlabeled");
    }

    #[test]
    fn test_filters_non_progressive() {
        let video_only = FormatCandidate {
            acodec: Some("none".into()),
            ..progressive("1080p", "https://a/1")
        };
        let audio_only = FormatCandidate {
            vcodec: Some("none".into()),
            ..progressive("audio", "https://a/2")
        };
        let missing_codecs = FormatCandidate {
            vcodec: None,
            acodec: None,
            ..progressive("480p", "https://a/3")
        };
        let webm = FormatCandidate {
            ext: Some("webm".into()),
            ..progressive("720p", "https://a/4")
        };
        let no_url = FormatCandidate {
            url: Some("  ".into()),
            ..progressive("360p", "")
        };
        let ok = progressive("240p", "https://a/ok");

        let out = select_progressive_mp4(&[video_only, audio_only, missing_codecs, webm, no_url, ok]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].label, "240p");
        assert_eq!(out[0].url, "https://a/ok");
    }

    #[test]
    fn test_sorts_and_dedups() {
        let out = select_progressive_mp4(&[
            progressive("360p", "https://a/360"),
            progressive("720p", "https://a/720-first"),
            progressive("MP4", "https://a/unknown"),
            progressive("720p", "https://a/720-second"),
            progressive("1080p", "https://a/1080"),
        ]);
        let labels: Vec<_> = out.iter().map(|f| f.label.as_str()).collect();
        assert_eq!(labels, ["1080p", "720p", "360p", "MP4"]);
        assert_eq!(out[1].url, "https://a/720-first");
    }

    #[test]
    fn test_label_fallbacks() {
        let by_height = FormatCandidate {
            quality_label: None,
            height: Some(480),
            ..progressive("", "https://a/1")
        };
        let unknown = FormatCandidate {
            quality_label: Some("  ".into()),
            height: Some(0),
            ..progressive("", "https://a/2")
        };
        let out = select_progressive_mp4(&[unknown, by_height]);
        assert_eq!(out[0].label, "480p");
        assert_eq!(out[1].label, "MP4");
    }

    #[test]
    fn test_size_synonyms() {
        let from_content_length = FormatCandidate {
            content_length: Some(SizeHint::Text("12345678".into())),
            filesize: Some(SizeHint::Bytes(1)),
            ..progressive("720p", "https://a/1")
        };
        let from_approx = FormatCandidate {
            filesize_approx: Some(SizeHint::Approx(2048.4)),
            ..progressive("480p", "https://a/2")
        };
        let uncoercible = FormatCandidate {
            filesize: Some(SizeHint::Text("n/a".into())),
            ..progressive("360p", "https://a/3")
        };
        let out = select_progressive_mp4(&[from_content_length, from_approx, uncoercible]);
        assert_eq!(out[0].size_bytes, Some(12345678));
        assert_eq!(out[1].size_bytes, Some(2048));
        assert_eq!(out[2].size_bytes, None);
    }

    #[test]
    fn test_mime_based_detection() {
        let muxed = FormatCandidate {
            mime_type: Some(r#"video/mp4; codecs="avc1.42001E, mp4a.40.2""#.into()),
            quality_label: Some("360p".into()),
            url: Some("https://a/muxed".into()),
            ..Default::default()
        };
        let adaptive = FormatCandidate {
            mime_type: Some(r#"video/mp4; codecs="avc1.640028""#.into()),
            quality_label: Some("1080p".into()),
            url: Some("https://a/adaptive".into()),
            ..Default::default()
        };
        let out = select_progressive_mp4(&[adaptive, muxed]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].url, "https://a/muxed");
        assert_eq!(out[0].extension, "mp4");
    }

    #[test]
    fn test_flags_beat_mime() {
        let flagged = FormatCandidate {
            ext: Some("MP4".into()),
            has_video: Some(true),
            has_audio: Some(true),
            url: Some("https://a/direct".into()),
            ..Default::default()
        };
        let out = select_progressive_mp4(&[flagged]);
        assert_eq!(out[0].label, "MP4");
    }

    #[test]
    fn test_empty_input() {
        assert!(select_progressive_mp4(&[]).is_empty());
    }

    #[test]
    fn test_idempotent() {
        let first = select_progressive_mp4(&[
            progressive("360p", "https://a/360"),
            progressive("720p", "https://a/720"),
            progressive("720p", "https://a/720b"),
            FormatCandidate {
                filesize: Some(SizeHint::Bytes(10)),
                ..progressive("1080p", "https://a/1080")
            },
        ]);
        let again: Vec<_> = first.iter().map(as_candidate).collect();
        assert_eq!(select_progressive_mp4(&again), first);
    }
}
