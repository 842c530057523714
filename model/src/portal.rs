//! The client portal: project status, resource links and the weekly progress log.

use crate::auth::Viewer;
use crate::error::Result;
use crate::platform::{fetch, fetch_optional, Platform, Query};
use crate::roles::to_client_slug;
use crate::schema::{self, ClientProfile, LinkCategory, WeeklyReportRow};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Status shown when a project has none recorded.
pub const NO_STATUS: &str = "Sin estado";

/// A link to one of the client's project resources.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResourceCard {
    pub title: &'static str,
    pub category: LinkCategory,
    /// The link target, or [`None`] if the studio has not shared this resource yet.
    pub url: Option<String>,
}

/// A single progress photo.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReportItem {
    pub id: String,
    pub image_url: String,
    pub description: String,
    pub created_at: Option<String>,
}

/// The photos of one day sharing the same description.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReportGroup {
    pub id: String,
    pub date_key: String,
    pub date_label: String,
    pub description: String,
    pub photos: Vec<ReportPhoto>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReportPhoto {
    pub id: String,
    pub image_url: String,
}

/// Everything shown on a client's dashboard.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Dashboard {
    pub client_name: String,
    pub project_status: String,
    pub cards: Vec<ResourceCard>,
    pub reports: Vec<ReportGroup>,
}

/// What to do with a request for a client's portal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PortalPage {
    /// Show the dashboard.
    Dashboard(Dashboard),
    /// The user's portal lives at a different slug.
    Redirect { slug: String },
    /// The user has no usable client profile.
    NoProfile,
}

/// Load the portal page at `slug` for a signed-in user.
///
/// Everything is read with the user's own credentials, so a client only ever sees their own
/// profile, links and reports.
pub async fn load<P: Platform + ?Sized>(
    platform: &P,
    viewer: &Viewer,
    slug: &str,
) -> Result<PortalPage> {
    let query = Query::table(schema::CLIENT_PROFILES)
        .select("id, user_id, client_name, project_status")
        .eq("user_id", &viewer.user.id);
    let profile: Option<ClientProfile> =
        match fetch_optional(platform, viewer.access(), &query).await {
            Ok(profile) => profile,
            Err(err) => {
                tracing::warn!(user = %viewer.user.id, "cannot load client profile: {err}");
                None
            }
        };
    let Some(profile) = profile else {
        return Ok(PortalPage::NoProfile);
    };
    let client_name = profile.client_name.as_deref().map(str::trim).unwrap_or("");
    let expected = to_client_slug(client_name);
    if expected.is_empty() {
        return Ok(PortalPage::NoProfile);
    }
    if slug != expected {
        return Ok(PortalPage::Redirect { slug: expected });
    }

    let query = Query::table(schema::CLIENT_LINKS)
        .select("category, url")
        .eq("user_id", &viewer.user.id);
    let links: Vec<Map<String, Value>> = fetch(platform, viewer.access(), &query).await?;
    let cards = resource_cards(&links);

    let query = Query::table(schema::WEEKLY_REPORTS)
        .eq("user_id", &viewer.user.id)
        .order("report_date", false)
        .order("created_at", false);
    let rows: Vec<WeeklyReportRow> = fetch(platform, viewer.access(), &query).await?;
    tracing::debug!(user = %viewer.user.id, rows = rows.len(), "loaded weekly reports");
    let reports = group_reports(report_items(rows));

    Ok(PortalPage::Dashboard(Dashboard {
        client_name: client_name.into(),
        project_status: profile
            .project_status
            .as_deref()
            .map(str::trim)
            .filter(|status| !status.is_empty())
            .unwrap_or(NO_STATUS)
            .into(),
        cards,
        reports,
    }))
}

/// One card per editable category, linked when the client has a URL for it.
///
/// Link rows name their category in either `category` or `link_type`; later rows win.
pub fn resource_cards(links: &[Map<String, Value>]) -> Vec<ResourceCard> {
    let text = |row: &Map<String, Value>, key: &str| {
        row.get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or("")
            .to_string()
    };
    let mut by_category = HashMap::new();
    for row in links {
        let mut category = text(row, "category");
        if category.is_empty() {
            category = text(row, "link_type");
        }
        let url = text(row, "url");
        if !category.is_empty() && !url.is_empty() {
            by_category.insert(category.to_uppercase(), url);
        }
    }

    LinkCategory::editable()
        .map(|category| ResourceCard {
            title: category.label(),
            category,
            url: by_category.get(&category.to_string()).cloned(),
        })
        .collect()
}

fn first_non_empty<'a>(candidates: impl IntoIterator<Item = &'a Option<String>>) -> String {
    candidates
        .into_iter()
        .filter_map(|value| value.as_deref().map(str::trim))
        .find(|value| !value.is_empty())
        .unwrap_or("")
        .to_string()
}

/// Normalize report rows, dropping those without a photo.
pub fn report_items(rows: Vec<WeeklyReportRow>) -> Vec<ReportItem> {
    rows.into_iter()
        .enumerate()
        .filter_map(|(index, row)| {
            let image_url = first_non_empty([&row.photo_url, &row.image_url, &row.url]);
            if image_url.is_empty() {
                return None;
            }
            let id = match &row.id {
                Some(Value::String(id)) => id.clone(),
                Some(Value::Null) | None => format!(
                    "{}-{index}",
                    row.created_at.as_deref().unwrap_or("report")
                ),
                Some(id) => id.to_string(),
            };
            Some(ReportItem {
                id,
                image_url,
                description: first_non_empty([&row.description, &row.summary, &row.notes]),
                created_at: row.created_at.or(row.report_date),
            })
        })
        .collect()
}

/// Group photos taken the same day with the same description.
///
/// Groups appear in the order their first photo appears in `reports`.
pub fn group_reports(reports: Vec<ReportItem>) -> Vec<ReportGroup> {
    let mut groups: Vec<ReportGroup> = vec![];
    let mut index = HashMap::new();
    for report in reports {
        let date_key = report
            .created_at
            .as_deref()
            .map(|date| date.chars().take(10).collect::<String>())
            .filter(|date| !date.is_empty())
            .unwrap_or_else(|| "sin-fecha".into());
        let description = report.description.trim().to_string();
        let group_key = format!(
            "{date_key}::{}",
            if description.is_empty() {
                "sin-descripcion"
            } else {
                description.as_str()
            }
        );
        let slot = *index.entry(group_key.clone()).or_insert_with(|| {
            groups.push(ReportGroup {
                id: group_key,
                date_label: format_report_date(&date_key),
                date_key,
                description,
                photos: vec![],
            });
            groups.len() - 1
        });
        groups[slot].photos.push(ReportPhoto {
            id: report.id,
            image_url: report.image_url,
        });
    }
    groups
}

const MONTHS: [&str; 12] = [
    "ENERO",
    "FEBRERO",
    "MARZO",
    "ABRIL",
    "MAYO",
    "JUNIO",
    "JULIO",
    "AGOSTO",
    "SEPTIEMBRE",
    "OCTUBRE",
    "NOVIEMBRE",
    "DICIEMBRE",
];

/// Label for a `YYYY-MM-DD` date key, like `05 DE MARZO DE 2026`.
pub fn format_report_date(date_key: &str) -> String {
    const UNKNOWN: &str = "FECHA NO DISPONIBLE";
    use chrono::Datelike;

    match NaiveDate::parse_from_str(date_key, "%Y-%m-%d") {
        Ok(date) => format!(
            "{:02} DE {} DE {}",
            date.day(),
            MONTHS[date.month0() as usize],
            date.year()
        ),
        Err(_) => UNKNOWN.into(),
    }
}
