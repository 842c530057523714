//! The tables, buckets and fixed vocabularies stored on the hosted platform.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// Table mapping auth users to their [`Role`](crate::roles::Role).
pub const USER_ROLES: &str = "user_roles";
/// Table with one profile per client.
pub const CLIENT_PROFILES: &str = "client_profiles";
/// Table with the per-category resource links of each client.
pub const CLIENT_LINKS: &str = "client_links";
/// Table with one row per weekly progress photo.
pub const WEEKLY_REPORTS: &str = "weekly_reports";
/// Table with the images shown on the landing page.
pub const LANDING_SECTIONS: &str = "landing_sections";

/// Bucket holding weekly report photos and landing page images.
pub const PROJECTS_BUCKET: &str = "proyectos";
/// Bucket holding the free-form image gallery.
pub const GALLERY_BUCKET: &str = "gallery";

/// A row of [`USER_ROLES`].
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct UserRole {
    pub user_id: String,
    pub role: Option<String>,
}

/// A row of [`CLIENT_PROFILES`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ClientProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub user_id: String,
    pub client_name: Option<String>,
    pub project_status: Option<String>,
}

/// The columns of a [`ClientProfile`] listed in the admin dashboard.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct ClientSummary {
    pub user_id: String,
    pub client_name: Option<String>,
    pub project_status: Option<String>,
}

/// A row of [`CLIENT_LINKS`].
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct ClientLink {
    pub user_id: String,
    pub category: String,
    pub url: String,
}

/// The columns of a [`ClientLink`] returned to the admin dashboard.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct LinkEntry {
    pub category: String,
    pub url: String,
}

/// A row of [`WEEKLY_REPORTS`] as written by the admin dashboard.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct NewWeeklyReport {
    pub user_id: String,
    pub description: String,
    pub photo_url: String,
}

/// A row of [`WEEKLY_REPORTS`] as read back by the portal.
///
/// Older rows were written with different column names for the photo and the caption, so every
/// alternative is optional.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct WeeklyReportRow {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub report_date: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// A row of [`LANDING_SECTIONS`].
///
/// Rows written by hand may leave the position or the image empty.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct LandingSection {
    pub section_key: String,
    #[serde(default)]
    pub sort_order: Option<i64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// The kinds of resource link every client has.
#[derive(
    Clone,
    Copy,
    Debug,
    Display,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    EnumIter,
    EnumString,
    Deserialize,
    Serialize,
)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum LinkCategory {
    Documentacion,
    Planos,
    Renders,
    Contratos,
    Pagos,
    Fotos,
}

impl LinkCategory {
    /// Every category, all of which are required when a client is created.
    pub fn all() -> impl Iterator<Item = Self> {
        Self::iter()
    }

    /// The categories shown to clients and editable after creation.
    pub fn editable() -> impl Iterator<Item = Self> {
        Self::iter().filter(|category| *category != Self::Fotos)
    }

    /// The label of the portal card for this category.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Documentacion => "DOCUMENTACIÓN DE LA OBRA",
            Self::Planos => "PLANOS",
            Self::Renders => "RENDERS",
            Self::Contratos => "CONTRATOS",
            Self::Pagos => "SEGUIMIENTO DE PAGOS",
            Self::Fotos => "FOTOS",
        }
    }
}

/// The highest position in a landing section.
pub const MAX_LANDING_SLOTS: i64 = 20;

/// The sections of the landing page that can hold uploaded images.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash, EnumIter, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum SectionKey {
    Hero,
    Obras,
    Detalles,
}

impl SectionKey {
    /// The minimum number of slots offered for this section in the admin dashboard.
    pub fn min_slots(&self) -> i64 {
        match self {
            Self::Hero => 1,
            Self::Obras | Self::Detalles => 4,
        }
    }

    /// The maximum number of slots offered, and the highest position an upload may target.
    pub fn max_slots(&self) -> i64 {
        match self {
            Self::Hero => 1,
            Self::Obras | Self::Detalles => MAX_LANDING_SLOTS,
        }
    }

    /// The human-readable name of this section.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Hero => "Hero Principal",
            Self::Obras => "Obras",
            Self::Detalles => "Detalles",
        }
    }
}
