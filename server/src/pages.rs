//! Server-rendered HTML pages.

use crate::{
    app::State,
    session::{self, expired_cookie, session_cookie},
};
use askama::Template;
use serde::Deserialize;
use studio_model::{
    auth::{self, Destination, Tokens},
    clients, gallery,
    gallery::GalleryImage,
    landing::{self, LandingContent, LandingSlot},
    portal::{self, Dashboard, PortalPage},
    schema::LinkCategory,
    Error,
};
use tide::{http::mime, Redirect, Request, Response, StatusCode};

fn html(status: StatusCode, page: impl Template) -> tide::Result {
    Ok(Response::builder(status)
        .body(page.render()?)
        .content_type(mime::HTML)
        .build())
}

fn page_error(err: Error) -> tide::Error {
    let status = StatusCode::try_from(err.status()).unwrap_or(StatusCode::InternalServerError);
    tide::Error::from_str(status, err.to_string())
}

#[derive(Template)]
#[template(path = "landing.html")]
struct LandingPage {
    content: LandingContent,
}

/// `GET /`
pub async fn landing(req: Request<State>) -> tide::Result {
    let content = landing::content(req.state().platform()).await;
    html(StatusCode::Ok, LandingPage { content })
}

#[derive(Template)]
#[template(path = "login.html")]
struct LoginPage {
    error: Option<String>,
    next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoginQuery {
    #[serde(default)]
    next: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// `GET /login`
pub async fn login_form(req: Request<State>) -> tide::Result {
    let query: LoginQuery = req.query().unwrap_or_default();
    let error = query
        .error
        .filter(|error| error == "unauthorized")
        .map(|_| "No tenés permisos para acceder a esa sección.".to_string());
    html(
        StatusCode::Ok,
        LoginPage {
            error,
            next: query.next.filter(|next| is_safe_path(next)),
        },
    )
}

#[derive(Debug, Default, Deserialize)]
struct LoginForm {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    next: Option<String>,
}

/// Whether `path` is a local path it is safe to redirect to.
fn is_safe_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//") && !path.contains('\\')
}

/// `POST /login`
pub async fn login(mut req: Request<State>) -> tide::Result {
    let form: LoginForm = req.body_form().await.unwrap_or_default();
    let next = form.next.filter(|next| is_safe_path(next));

    match auth::login(req.state().platform(), &form.email, &form.password).await {
        Ok(login) => {
            let target = match (&login.destination, next) {
                (Destination::Admin, Some(next)) => next,
                (destination, _) => destination.path(),
            };
            let mut res: Response = Redirect::see_other(target).into();
            let tokens = Tokens::from(&login.session);
            res.insert_cookie(session_cookie(&tokens, req.state().secure_cookies()));
            Ok(res)
        }
        Err(err) => {
            tracing::info!(email = %form.email.trim(), "sign-in rejected: {err}");
            let status =
                StatusCode::try_from(err.status()).unwrap_or(StatusCode::InternalServerError);
            html(
                status,
                LoginPage {
                    error: Some(err.to_string()),
                    next,
                },
            )
        }
    }
}

/// `POST /logout`
pub async fn logout(req: Request<State>) -> tide::Result {
    if let Some(tokens) = session::tokens(&req) {
        if let Err(err) = req.state().platform().sign_out(&tokens.access_token).await {
            tracing::warn!("cannot sign out: {err}");
        }
    }
    let mut res: Response = Redirect::see_other("/login").into();
    res.remove_cookie(expired_cookie());
    Ok(res)
}

#[derive(Template)]
#[template(path = "portal.html")]
struct ClientDashboard {
    dashboard: Dashboard,
}

/// `GET /clientes/:slug`
pub async fn portal(req: Request<State>) -> tide::Result {
    let viewer = session::viewer(&req)?;
    let slug = req.param("slug")?;
    match portal::load(req.state().platform(), &viewer, slug)
        .await
        .map_err(page_error)?
    {
        PortalPage::Dashboard(dashboard) => html(StatusCode::Ok, ClientDashboard { dashboard }),
        PortalPage::Redirect { slug } => Ok(Redirect::new(format!("/clientes/{slug}")).into()),
        PortalPage::NoProfile => Ok(Redirect::new("/login").into()),
    }
}

/// A row of the admin client table.
struct ClientRow {
    user_id: String,
    name: String,
    status: String,
}

/// A link category offered in the admin forms.
struct CategoryField {
    code: String,
    label: &'static str,
}

impl From<LinkCategory> for CategoryField {
    fn from(category: LinkCategory) -> Self {
        Self {
            code: category.to_string(),
            label: category.label(),
        }
    }
}

#[derive(Template)]
#[template(path = "admin.html")]
struct AdminDashboard {
    clients: Vec<ClientRow>,
    categories: Vec<CategoryField>,
    editable: Vec<CategoryField>,
    slots: Vec<LandingSlot>,
    images: Vec<GalleryImage>,
}

/// `GET /admin`
pub async fn admin(req: Request<State>) -> tide::Result {
    let platform = req.state().platform();
    let clients = clients::list(platform)
        .await
        .map_err(page_error)?
        .into_iter()
        .map(|client| ClientRow {
            name: client.client_name.unwrap_or_default(),
            status: client.project_status.unwrap_or_default(),
            user_id: client.user_id,
        })
        .collect();
    let sections = landing::sections(platform).await.map_err(page_error)?;
    let images = match gallery::list(platform).await {
        Ok(images) => images,
        Err(err) => {
            tracing::warn!("cannot list gallery: {err}");
            vec![]
        }
    };
    html(
        StatusCode::Ok,
        AdminDashboard {
            clients,
            categories: LinkCategory::all().map(CategoryField::from).collect(),
            editable: LinkCategory::editable().map(CategoryField::from).collect(),
            slots: landing::landing_slots(&sections),
            images,
        },
    )
}
