use std::path::Path;
use std::time::Duration;

use anyhow::anyhow;
use id3::TagLike;

/// Time given to the extractor to release the output file before tagging.
pub const FILE_RELEASE_DELAY: Duration = Duration::from_millis(500);

pub fn sniff_mime(content_type: Option<&str>, data: &[u8]) -> String {
    if let Some(ct) = content_type.filter(|ct| ct.starts_with("image/")) {
        return ct.split(';').next().unwrap_or(ct).trim().to_string();
    }
    if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        "image/png".to_string()
    } else if data.len() > 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        "image/webp".to_string()
    } else {
        "image/jpeg".to_string()
    }
}

pub async fn fetch_cover(client: &reqwest::Client, url: &str) -> anyhow::Result<(Vec<u8>, String)> {
    let resp = client.get(url).send().await?;
    if !resp.status().is_success() {
        return Err(anyhow!("Thumbnail fetch failed: HTTP {}", resp.status()));
    }
    let content_type = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    let bytes = resp.bytes().await?.to_vec();
    let mime = sniff_mime(content_type.as_deref(), &bytes);
    Ok((bytes, mime))
}

/// Writes a front-cover picture and title into the file's ID3 tag, replacing
/// any cover already present.
pub fn write_cover_tag(path: &Path, title: &str, cover: Vec<u8>, mime: &str) -> anyhow::Result<()> {
    let mut tag = id3::Tag::read_from_path(path).unwrap_or_else(|_| id3::Tag::new());
    tag.set_title(title);
    tag.remove_picture_by_type(id3::frame::PictureType::CoverFront);
    tag.add_frame(id3::frame::Picture {
        mime_type: mime.to_string(),
        picture_type: id3::frame::PictureType::CoverFront,
        description: "Cover".to_string(),
        data: cover,
    });
    tag.write_to_path(path, id3::Version::Id3v24)?;
    Ok(())
}

/// Best-effort cover embedding for a finished audio file.
pub async fn embed_cover(
    client: &reqwest::Client,
    audio_path: &Path,
    title: &str,
    thumbnail_url: &str,
) -> anyhow::Result<()> {
    let (cover, mime) = fetch_cover(client, thumbnail_url).await?;
    tokio::time::sleep(FILE_RELEASE_DELAY).await;

    if !tokio::fs::try_exists(audio_path).await.unwrap_or(false) {
        return Err(anyhow!("Output file not found: {}", audio_path.display()));
    }

    let path = audio_path.to_path_buf();
    let title = title.to_string();
    tokio::task::spawn_blocking(move || write_cover_tag(&path, &title, cover, &mime)).await??;
    Ok(())
}
