//! A free-form image gallery kept in its own bucket.

use crate::error::{Error, Result};
use crate::platform::{Platform, Upload};
use crate::schema::GALLERY_BUCKET;
use crate::uploads::{timestamp, ImageFile, ImageFormats};
use serde::Serialize;

/// The most images listed at once.
pub const LIST_LIMIT: usize = 100;

/// An image in the gallery.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryImage {
    pub name: String,
    pub public_url: String,
}

/// The images in the gallery, sorted by name.
pub async fn list<P: Platform + ?Sized>(platform: &P) -> Result<Vec<GalleryImage>> {
    Ok(platform
        .list_objects(GALLERY_BUCKET, "", LIST_LIMIT)
        .await?
        .into_iter()
        .map(|object| GalleryImage {
            public_url: platform.public_url(GALLERY_BUCKET, &object.name),
            name: object.name,
        })
        .collect())
}

/// Add an image to the gallery under a timestamped copy of its file name.
pub async fn add<P: Platform + ?Sized>(
    platform: &P,
    file: Option<ImageFile>,
) -> Result<GalleryImage> {
    let file = file.ok_or_else(|| Error::invalid("Falta el archivo."))?;
    ImageFormats::JpegPngWebp.check(&file)?;

    let base = file
        .file_name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or("")
        .trim();
    let name = format!(
        "{}-{}",
        timestamp(),
        if base.is_empty() { "imagen" } else { base }
    );
    platform
        .upload(
            GALLERY_BUCKET,
            &name,
            &Upload {
                bytes: file.bytes,
                content_type: file.content_type,
                upsert: false,
            },
        )
        .await?;
    tracing::info!(%name, "added gallery image");
    Ok(GalleryImage {
        public_url: platform.public_url(GALLERY_BUCKET, &name),
        name,
    })
}

/// Remove an image from the gallery.
pub async fn remove<P: Platform + ?Sized>(platform: &P, name: &str) -> Result<()> {
    let name = name.trim();
    if name.is_empty() || name.contains('/') {
        return Err(Error::invalid("Nombre de imagen inválido."));
    }
    platform
        .remove_objects(GALLERY_BUCKET, &[name.to_string()])
        .await?;
    tracing::info!(%name, "removed gallery image");
    Ok(())
}
