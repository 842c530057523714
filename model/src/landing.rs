//! The public landing page and the admin tools that manage its images.

use crate::error::{Error, Result};
use crate::platform::{fetch, Access, Platform, Query, Upload};
use crate::schema::{self, LandingSection, SectionKey, MAX_LANDING_SLOTS};
use crate::uploads::{timestamp, ImageFile, ImageFormats};
use serde::Serialize;
use serde_json::json;
use strum::IntoEnumIterator;

/// An image with a caption.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Picture {
    pub src: String,
    pub alt: String,
    pub caption: Option<String>,
}

/// Everything shown on the landing page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LandingContent {
    pub hero: String,
    pub projects: Vec<Picture>,
    pub details: Vec<Picture>,
    pub services: Vec<&'static str>,
}

const DEFAULT_HERO: &str = "https://images.unsplash.com/photo-1600585154340-be6161a56a0c?auto=format&fit=crop&w=1600&q=80";

const DEFAULT_PROJECTS: [(&str, &str); 4] = [
    (
        "Casa Nordelta",
        "https://images.unsplash.com/photo-1613490493576-7fde63acd811?auto=format&fit=crop&w=800&q=80",
    ),
    (
        "Residencia El Naudir",
        "https://images.unsplash.com/photo-1512917774080-9991f1c4c750?auto=format&fit=crop&w=800&q=80",
    ),
    (
        "Vivienda Escobar",
        "https://images.unsplash.com/photo-1600607687940-47a04b697a7d?auto=format&fit=crop&w=800&q=80",
    ),
    (
        "Casa Benavidez",
        "https://images.unsplash.com/photo-1600566753190-17f0bb2a6c3e?auto=format&fit=crop&w=800&q=80",
    ),
];

const DEFAULT_DETAILS: [&str; 4] = [
    "https://images.unsplash.com/photo-1600585154526-990dced4db0d?auto=format&fit=crop&w=600&q=80",
    "https://images.unsplash.com/photo-1600566753086-00f18fb6b3ea?auto=format&fit=crop&w=600&q=80",
    "https://images.unsplash.com/photo-1600210492486-724fe5c67fb0?auto=format&fit=crop&w=600&q=80",
    "https://images.unsplash.com/photo-1600573472591-ee6b68d14c68?auto=format&fit=crop&w=600&q=80",
];

const SERVICES: [&str; 3] = [
    "PROYECTO INTEGRAL DE ARQUITECTURA",
    "DIRECCION Y ADMINISTRACIÓN DE OBRAS",
    "CONSULTORÍA DE DISEÑO Y CONSTRUCCIÓN",
];

impl Default for LandingContent {
    fn default() -> Self {
        Self {
            hero: DEFAULT_HERO.into(),
            projects: DEFAULT_PROJECTS
                .iter()
                .map(|(name, src)| Picture {
                    src: (*src).into(),
                    alt: (*name).into(),
                    caption: Some((*name).into()),
                })
                .collect(),
            details: DEFAULT_DETAILS
                .iter()
                .enumerate()
                .map(|(i, src)| Picture {
                    src: (*src).into(),
                    alt: format!("Detalle {}", i + 1),
                    caption: None,
                })
                .collect(),
            services: SERVICES.to_vec(),
        }
    }
}

impl LandingContent {
    /// Overlay uploaded sections on the built-in content.
    ///
    /// A section with at least one uploaded image replaces the built-in images of that section
    /// entirely; sections without uploads keep the defaults. Rows without an image are ignored,
    /// and rows without a position sort first.
    pub fn with_sections(mut self, rows: &[LandingSection]) -> Self {
        let section = |key: SectionKey| {
            let mut rows = rows
                .iter()
                .filter(|row| row.section_key == key.to_string())
                .filter_map(|row| {
                    let src = row.image_url.as_deref().map(str::trim).unwrap_or("");
                    let order = row.sort_order.unwrap_or(0);
                    (!src.is_empty()).then(|| (order, src.to_string(), row))
                })
                .collect::<Vec<_>>();
            rows.sort_by_key(|(order, _, _)| *order);
            rows
        };

        if let Some((_, hero, _)) = section(SectionKey::Hero).into_iter().next() {
            self.hero = hero;
        }
        let projects = section(SectionKey::Obras);
        if !projects.is_empty() {
            self.projects = projects
                .into_iter()
                .map(|(order, src, row)| {
                    let title = row.title.clone().filter(|t| !t.trim().is_empty());
                    Picture {
                        src,
                        alt: title.clone().unwrap_or_else(|| format!("Obra {order}")),
                        caption: title,
                    }
                })
                .collect();
        }
        let details = section(SectionKey::Detalles);
        if !details.is_empty() {
            self.details = details
                .into_iter()
                .map(|(order, src, row)| Picture {
                    src,
                    alt: row
                        .title
                        .clone()
                        .unwrap_or_else(|| format!("Detalle {order}")),
                    caption: None,
                })
                .collect();
        }
        self
    }
}

/// Load the landing page content, falling back to the built-in content if the platform fails.
pub async fn content<P: Platform + ?Sized>(platform: &P) -> LandingContent {
    match sections(platform).await {
        Ok(rows) => LandingContent::default().with_sections(&rows),
        Err(err) => {
            tracing::warn!("cannot load landing sections, using defaults: {err}");
            LandingContent::default()
        }
    }
}

/// Every uploaded landing image, ordered by section and position.
pub async fn sections<P: Platform + ?Sized>(platform: &P) -> Result<Vec<LandingSection>> {
    let query = Query::table(schema::LANDING_SECTIONS)
        .select("section_key, sort_order, title, image_url")
        .order("section_key", true)
        .order("sort_order", true);
    fetch(platform, Access::Service, &query).await
}

/// A landing image as submitted by the admin dashboard.
#[derive(Clone, Debug, Default)]
pub struct SectionForm {
    pub section_key: Option<String>,
    pub sort_order: Option<String>,
    pub title: Option<String>,
    pub file: Option<ImageFile>,
}

/// Store an image in a landing section slot, replacing whatever the slot held.
///
/// The position must lie between 1 and the section's slot limit.
pub async fn save_section<P: Platform + ?Sized>(
    platform: &P,
    form: SectionForm,
) -> Result<LandingSection> {
    let missing = || Error::invalid("Faltan datos para actualizar landing_sections.");

    let section_key = form
        .section_key
        .as_deref()
        .map(|key| key.trim().to_lowercase())
        .unwrap_or_default();
    let sort_order = match form.sort_order.as_deref().map(str::trim) {
        None | Some("") => 1,
        Some(order) => order.parse::<i64>().map_err(|_| missing())?,
    };
    let max = section_key
        .parse::<SectionKey>()
        .map_or(MAX_LANDING_SLOTS, |key| key.max_slots());
    if !(1..=max).contains(&sort_order) {
        return Err(missing());
    }
    let title = form
        .title
        .as_deref()
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .map(String::from);
    let file = match form.file {
        Some(file) if !section_key.is_empty() => file,
        _ => return Err(missing()),
    };
    let formats = ImageFormats::JpegPng;
    formats.check(&file)?;

    let path = format!(
        "landing/{section_key}/{sort_order}-{}.{}",
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
                upsert: true,
            },
        )
        .await?;

    let slot = Query::table(schema::LANDING_SECTIONS)
        .eq("section_key", &section_key)
        .eq("sort_order", sort_order);
    platform.delete(Access::Service, &slot).await?;

    let section = LandingSection {
        image_url: Some(platform.public_url(schema::PROJECTS_BUCKET, &path)),
        section_key,
        sort_order: Some(sort_order),
        title,
    };
    platform
        .insert(
            Access::Service,
            schema::LANDING_SECTIONS,
            vec![json!(section)],
        )
        .await?;
    tracing::info!(
        section = %section.section_key,
        order = sort_order,
        "updated landing image"
    );
    Ok(section)
}

/// A position on the landing page the admin dashboard offers an upload for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LandingSlot {
    pub section_key: String,
    pub sort_order: i64,
    pub label: String,
    pub image_url: Option<String>,
    pub title: Option<String>,
}

/// The slots to offer in the admin dashboard.
///
/// The hero has a single slot. Every other section offers at least its minimum number of slots,
/// and one slot for every position up to the highest one already filled, within its limit.
pub fn landing_slots(rows: &[LandingSection]) -> Vec<LandingSlot> {
    SectionKey::iter()
        .flat_map(|key| {
            let name = key.to_string();
            let in_section = rows
                .iter()
                .filter(|row| row.section_key.eq_ignore_ascii_case(&name))
                .collect::<Vec<_>>();
            let count = match key {
                SectionKey::Hero => 1,
                _ => in_section
                    .iter()
                    .map(|row| row.sort_order.unwrap_or(0))
                    .fold(key.min_slots(), i64::max)
                    .min(key.max_slots()),
            };
            (1..=count)
                .map(|order| {
                    let row = in_section.iter().find(|row| row.sort_order == Some(order));
                    LandingSlot {
                        section_key: name.clone(),
                        sort_order: order,
                        label: match key {
                            SectionKey::Hero => key.label().into(),
                            _ => format!("{} {order}", key.label()),
                        },
                        image_url: row.and_then(|row| row.image_url.clone()),
                        title: row.and_then(|row| row.title.clone()),
                    }
                })
                .collect::<Vec<_>>()
        })
        .collect()
}
