use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Video,
    Playlist,
    Story,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatInfo {
    pub format_id: String,
    pub ext: String,
    pub height: Option<u32>,
    pub format_note: Option<String>,
    pub filesize: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistEntry {
    pub id: String,
    pub title: String,
    pub thumbnail: Option<String>,
    pub duration: f64,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataResult {
    pub id: Option<String>,
    pub title: String,
    pub thumbnail: Option<String>,
    pub uploader: String,
    pub duration: f64,
    pub view_count: u64,
    pub formats: Vec<FormatInfo>,
    pub webpage_url: String,
    pub content_type: ContentType,
    pub entries: Vec<PlaylistEntry>,
    pub playlist_count: u64,
}

fn str_field<'a>(json: &'a serde_json::Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| json.get(*k).and_then(|v| v.as_str()))
        .find(|s| !s.is_empty())
}

fn first_thumbnail(json: &serde_json::Value) -> Option<String> {
    if let Some(t) = str_field(json, &["thumbnail"]) {
        return Some(t.to_string());
    }
    json.get("thumbnails")
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.iter().find_map(|t| t.get("url").and_then(|u| u.as_str())))
        .map(|s| s.to_string())
}

impl MetadataResult {
    /// Shapes the extractor's `--dump-single-json` output. Missing fields get
    /// the same fallbacks the UI expects (`Untitled`, `Track N`, ...).
    pub fn from_json(raw: &serde_json::Value, requested_url: &str) -> Self {
        let entries: Vec<PlaylistEntry> = raw
            .get("entries")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter(|e| !e.is_null())
                    .enumerate()
                    .map(|(i, e)| {
                        let id = str_field(e, &["id"]).unwrap_or_default().to_string();
                        let url = str_field(e, &["url", "webpage_url"])
                            .map(|s| s.to_string())
                            .unwrap_or_else(|| format!("https://www.youtube.com/watch?v={}", id));
                        PlaylistEntry {
                            title: str_field(e, &["title"])
                                .map(|s| s.to_string())
                                .unwrap_or_else(|| format!("Track {}", i + 1)),
                            thumbnail: first_thumbnail(e),
                            duration: e.get("duration").and_then(|v| v.as_f64()).unwrap_or(0.0),
                            id,
                            url,
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        let content_type = if requested_url.contains("/stories/") || requested_url.contains("/story/") {
            ContentType::Story
        } else if raw.get("_type").and_then(|v| v.as_str()) == Some("playlist") || !entries.is_empty() {
            ContentType::Playlist
        } else {
            ContentType::Video
        };

        let formats = raw
            .get("formats")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|f| {
                        let format_id = f.get("format_id").and_then(|v| v.as_str())?;
                        Some(FormatInfo {
                            format_id: format_id.to_string(),
                            ext: f.get("ext").and_then(|v| v.as_str()).unwrap_or("").to_string(),
                            height: f.get("height").and_then(|v| v.as_u64()).map(|v| v as u32),
                            format_note: f
                                .get("format_note")
                                .and_then(|v| v.as_str())
                                .map(|s| s.to_string()),
                            filesize: f
                                .get("filesize")
                                .or_else(|| f.get("filesize_approx"))
                                .and_then(|v| v.as_u64()),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let thumbnail = first_thumbnail(raw).or_else(|| entries.first().and_then(|e| e.thumbnail.clone()));
        let playlist_count = raw
            .get("playlist_count")
            .and_then(|v| v.as_u64())
            .unwrap_or(entries.len() as u64);

        Self {
            id: str_field(raw, &["id"]).map(|s| s.to_string()),
            title: str_field(raw, &["title", "fulltitle"])
                .unwrap_or("Untitled")
                .to_string(),
            thumbnail,
            uploader: str_field(raw, &["uploader", "channel", "creator", "uploader_id"])
                .unwrap_or("Unknown")
                .to_string(),
            duration: raw.get("duration").and_then(|v| v.as_f64()).unwrap_or(0.0),
            view_count: raw.get("view_count").and_then(|v| v.as_u64()).unwrap_or(0),
            formats,
            webpage_url: str_field(raw, &["webpage_url"])
                .unwrap_or(requested_url)
                .to_string(),
            content_type,
            entries,
            playlist_count,
        }
    }
}
