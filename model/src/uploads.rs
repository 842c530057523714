//! Photo uploads for weekly progress reports.

use crate::error::{Error, Result};
use crate::platform::{insert, Access, Platform, Upload};
use crate::schema::{self, NewWeeklyReport};
use chrono::Utc;

/// An image received from a multipart form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// The image formats an upload accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageFormats {
    /// JPEG and PNG.
    JpegPng,
    /// JPEG, PNG and WebP.
    JpegPngWebp,
}

impl ImageFormats {
    fn allowed(&self) -> &'static [&'static str] {
        match self {
            Self::JpegPng => &["image/jpeg", "image/png"],
            Self::JpegPngWebp => &["image/jpeg", "image/png", "image/webp"],
        }
    }

    fn rejection(&self) -> &'static str {
        match self {
            Self::JpegPng => "Formato inválido. Solo JPG o PNG.",
            Self::JpegPngWebp => "Formato inválido. Solo JPG, PNG o WEBP.",
        }
    }

    /// Fail unless `file` has one of these formats.
    pub fn check(&self, file: &ImageFile) -> Result<()> {
        if self.allowed().contains(&file.content_type.as_str()) {
            Ok(())
        } else {
            Err(Error::invalid(self.rejection()))
        }
    }

    /// The extension to store `file` under.
    ///
    /// JPEG/PNG uploads are stored as either `png` or `jpg`. Uploads which also accept WebP keep
    /// the text after the last dot of the file name, or the whole name if it has no dot, and fall
    /// back to `jpg` only when that is empty.
    pub fn extension(&self, file: &ImageFile) -> String {
        let name = file.file_name.to_lowercase();
        match self {
            Self::JpegPng if name.ends_with(".png") => "png".into(),
            Self::JpegPng => "jpg".into(),
            Self::JpegPngWebp => match name.rsplit('.').next() {
                Some(ext) if !ext.is_empty() => ext.into(),
                _ => "jpg".into(),
            },
        }
    }
}

/// A weekly report as submitted by the admin dashboard.
#[derive(Clone, Debug, Default)]
pub struct ReportForm {
    pub user_id: Option<String>,
    pub description: Option<String>,
    pub file: Option<ImageFile>,
}

/// Milliseconds since the Unix epoch, used to keep object paths unique.
pub fn timestamp() -> i64 {
    Utc::now().timestamp_millis()
}

/// Store a report photo and record the report.
///
/// The photo goes to `weekly-reports/<user>/<millis>.<ext>` in the projects bucket. If the report
/// row cannot be written, the photo is removed again.
pub async fn upload_report<P: Platform + ?Sized>(
    platform: &P,
    form: ReportForm,
    formats: ImageFormats,
) -> Result<NewWeeklyReport> {
    let user_id = form.user_id.as_deref().map(str::trim).unwrap_or("");
    let description = form.description.as_deref().map(str::trim).unwrap_or("");
    let file = match form.file {
        Some(file) if !user_id.is_empty() && !description.is_empty() => file,
        _ => {
            return Err(Error::invalid(
                "Faltan datos para cargar el reporte semanal.",
            ))
        }
    };
    formats.check(&file)?;

    let path = format!(
        "weekly-reports/{user_id}/{}.{}",
        timestamp(),
        formats.extension(&file)
    );
    platform
        .upload(
            schema::PROJECTS_BUCKET,
            &path,
            &Upload {
                bytes: file.bytes,
                content_type: file.content_type,
                upsert: false,
            },
        )
        .await?;
    let report = NewWeeklyReport {
        user_id: user_id.into(),
        description: description.into(),
        photo_url: platform.public_url(schema::PROJECTS_BUCKET, &path),
    };

    if let Err(err) = insert(
        platform,
        Access::Service,
        schema::WEEKLY_REPORTS,
        [report.clone()],
    )
    .await
    {
        if let Err(cleanup) = platform
            .remove_objects(schema::PROJECTS_BUCKET, &[path.clone()])
            .await
        {
            tracing::error!("cannot remove orphaned report photo {path}: {cleanup}");
        }
        return Err(err);
    }

    tracing::info!(user = %report.user_id, %path, "uploaded weekly report");
    Ok(report)
}
