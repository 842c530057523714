//! Routing for the studio site.

use crate::{api, pages, session::Gate};
use std::path::Path;
use std::sync::Arc;
use studio_model::{contact::Mailer, Platform};
use tide::Server;

/// Shared state of every request.
#[derive(Clone)]
pub struct State {
    platform: Arc<dyn Platform>,
    mailer: Arc<dyn Mailer>,
    secure_cookies: bool,
}

impl State {
    pub fn new(platform: impl Platform, mailer: impl Mailer, secure_cookies: bool) -> Self {
        Self {
            platform: Arc::new(platform),
            mailer: Arc::new(mailer),
            secure_cookies,
        }
    }

    pub fn platform(&self) -> &dyn Platform {
        &*self.platform
    }

    pub fn mailer(&self) -> &dyn Mailer {
        &*self.mailer
    }

    /// Whether session cookies should only be sent over HTTPS.
    pub fn secure_cookies(&self) -> bool {
        self.secure_cookies
    }
}

/// Build the application.
///
/// Static assets are served from `public_dir` under `/static`.
pub fn app(state: State, public_dir: impl AsRef<Path>) -> std::io::Result<Server<State>> {
    let mut app = tide::with_state(state);

    app.at("/").get(pages::landing);
    app.at("/login").get(pages::login_form).post(pages::login);
    app.at("/logout").post(pages::logout);
    app.at("/static").serve_dir(public_dir)?;

    app.at("/admin").with(Gate::AdminPage).get(pages::admin);
    app.at("/clientes/:slug")
        .with(Gate::ClientPage)
        .get(pages::portal);

    app.at("/api/contact").post(api::submit_contact);
    app.at("/api/admin/upload")
        .with(Gate::UploadApi)
        .post(api::upload_report);

    let mut admin = app.at("/api/admin");
    admin.with(Gate::Api);
    admin
        .at("/clients")
        .get(api::list_clients)
        .post(api::create_client)
        .delete(api::delete_client);
    admin
        .at("/clients/:user_id")
        .get(api::client_detail)
        .patch(api::update_client);
    admin.at("/reports").post(api::create_report);
    admin
        .at("/landing-sections")
        .get(api::landing_sections)
        .post(api::save_landing_section);
    admin
        .at("/gallery")
        .get(api::list_gallery)
        .post(api::add_gallery_image);
    admin.at("/gallery/:name").delete(api::remove_gallery_image);

    Ok(app)
}
