use crate::core::state::StoryPage;
use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Decodes a `data:{mime};base64,{payload}` URI. Anything that is not a
/// `data:` URI (a placeholder URL, say) gives `None`.
pub fn decode_data_uri(uri: &str) -> Result<Option<DecodedImage>> {
    let Some(rest) = uri.strip_prefix("data:") else {
        return Ok(None);
    };

    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| anyhow!("Malformed data URI: missing ','"))?;
    let mime_type = header
        .strip_suffix(";base64")
        .ok_or_else(|| anyhow!("Unsupported data URI encoding: {}", header))?;

    let bytes = STANDARD
        .decode(payload.trim())
        .context("Invalid base64 image payload")?;

    Ok(Some(DecodedImage {
        mime_type: mime_type.to_string(),
        bytes,
    }))
}

pub fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "bin",
    }
}

/// Writes the page's inline image to `{folder}/{page id}.{ext}`.
/// Returns `None` for pages whose image is a remote or placeholder URL.
pub fn save_panel_image(folder: &Path, page: &StoryPage) -> Result<Option<PathBuf>> {
    let Some(image) = decode_data_uri(&page.image_url)? else {
        return Ok(None);
    };

    fs::create_dir_all(folder)?;
    let path = folder.join(format!("{}.{}", page.id, extension_for(&image.mime_type)));
    fs::write(&path, &image.bytes)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(Some(path))
}
