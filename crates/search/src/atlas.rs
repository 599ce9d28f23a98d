use mapstate::ThumbnailAtlas;
use protocol::paths;
use tracing::debug;
use transport::{Transport, TransportError};

use crate::error::SearchError;
use crate::merge::AtlasRequest;

/// Sprite edge length assumed when the backend does not send one.
pub const DEFAULT_SPRITE_SIZE: u32 = 64;

/// Fetches and decodes a thumbnail atlas into RGBA8.
pub async fn load_atlas<T: Transport>(
    transport: &T,
    request: &AtlasRequest,
) -> Result<ThumbnailAtlas, SearchError> {
    let path = paths::thumbnail_atlas(&request.filename);
    let response = transport.get(&path).await?;
    if !response.is_success() {
        return Err(TransportError::Status {
            path,
            status: response.status,
        }
        .into());
    }

    let image = image::load_from_memory(&response.body).map_err(|err| SearchError::Atlas {
        filename: request.filename.clone(),
        reason: err.to_string(),
    })?;
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    debug!(filename = %request.filename, width, height, "thumbnail atlas decoded");

    Ok(ThumbnailAtlas {
        filename: request.filename.clone(),
        width,
        height,
        sprite_size: request.sprite_size.unwrap_or(DEFAULT_SPRITE_SIZE),
        rgba: rgba.into_raw(),
    })
}

#[cfg(test)]
pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    use std::io::Cursor;

    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 255]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}
