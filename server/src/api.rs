//! JSON endpoints of the admin dashboard and the contact form.
//!
//! Every endpoint answers with a JSON body. Failures are reported as `{"error": "<message>"}`
//! with the status of the underlying [`Error`], except on `/api/admin/upload`, which reports
//! `{"ok": false, "error": "<message>"}`.

use crate::{app::State, multipart};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use studio_model::{
    clients::{self, ClientRemoval, ClientUpdate, NewClient},
    contact::{self, ContactRequest},
    gallery,
    landing::{self, SectionForm},
    uploads::{self, ImageFormats, ReportForm},
    Error, Result,
};
use tide::{Request, Response, StatusCode};

fn status(err: &Error) -> StatusCode {
    StatusCode::try_from(err.status()).unwrap_or(StatusCode::InternalServerError)
}

fn log(err: &Error, req: &Request<State>) {
    if err.status() >= 500 {
        tracing::error!(method = %req.method(), path = %req.url().path(), "{err}");
    } else {
        tracing::warn!(method = %req.method(), path = %req.url().path(), "{err}");
    }
}

/// Build a JSON response.
fn json_response(status: StatusCode, body: Value) -> Response {
    Response::builder(status).body(body).build()
}

/// Answer with `body` on success, or with the error message and its status on failure.
fn reply(req: &Request<State>, ok: StatusCode, result: Result<Value>) -> tide::Result {
    Ok(match result {
        Ok(body) => json_response(ok, body),
        Err(err) => {
            log(&err, req);
            json_response(status(&err), json!({ "error": err.to_string() }))
        }
    })
}

async fn body<T: DeserializeOwned>(req: &mut Request<State>) -> Result<T> {
    req.body_json()
        .await
        .map_err(|err| Error::invalid(format!("JSON inválido: {err}")))
}

/// A path parameter. Parameters arrive percent-encoded.
fn param(req: &Request<State>, name: &str) -> Result<String> {
    let raw = req
        .param(name)
        .map_err(|err| Error::invalid(err.to_string()))?;
    Ok(form_urlencoded::parse(format!("{name}={raw}").as_bytes())
        .next()
        .map(|(_, value)| value.into_owned())
        .unwrap_or_default())
}

fn report_form(mut form: multipart::Form) -> ReportForm {
    ReportForm {
        user_id: form.take("userId"),
        description: form.take("description"),
        file: form.file.take(),
    }
}

/// `GET /api/admin/clients`
pub async fn list_clients(req: Request<State>) -> tide::Result {
    let result = clients::list(req.state().platform())
        .await
        .map(|clients| json!({ "clients": clients }));
    reply(&req, StatusCode::Ok, result)
}

/// `POST /api/admin/clients`
pub async fn create_client(mut req: Request<State>) -> tide::Result {
    let result = async {
        let new: NewClient = body(&mut req).await?;
        clients::create(req.state().platform(), new).await?;
        Ok::<_, Error>(json!({ "ok": true }))
    }
    .await;
    reply(&req, StatusCode::Created, result)
}

/// `DELETE /api/admin/clients`
pub async fn delete_client(mut req: Request<State>) -> tide::Result {
    let result = async {
        let removal: ClientRemoval = body(&mut req).await?;
        clients::delete(req.state().platform(), removal).await?;
        Ok::<_, Error>(json!({ "ok": true }))
    }
    .await;
    reply(&req, StatusCode::Ok, result)
}

/// `GET /api/admin/clients/:user_id`
pub async fn client_detail(req: Request<State>) -> tide::Result {
    let result = async {
        let user_id = param(&req, "user_id")?;
        let detail = clients::detail(req.state().platform(), &user_id).await?;
        Ok::<_, Error>(json!(detail))
    }
    .await;
    reply(&req, StatusCode::Ok, result)
}

/// `PATCH /api/admin/clients/:user_id`
pub async fn update_client(mut req: Request<State>) -> tide::Result {
    let result = async {
        let user_id = param(&req, "user_id")?;
        let update: ClientUpdate = body(&mut req).await?;
        clients::update(req.state().platform(), &user_id, update).await?;
        Ok::<_, Error>(json!({ "ok": true }))
    }
    .await;
    reply(&req, StatusCode::Ok, result)
}

/// `POST /api/admin/reports`
pub async fn create_report(mut req: Request<State>) -> tide::Result {
    let result = async {
        let form = report_form(multipart::read(&mut req).await?);
        uploads::upload_report(req.state().platform(), form, ImageFormats::JpegPng).await?;
        Ok::<_, Error>(json!({ "ok": true }))
    }
    .await;
    reply(&req, StatusCode::Ok, result)
}

/// `POST /api/admin/upload`
///
/// Unlike the other endpoints, failures keep the `ok` flag, and anything other than a rejected
/// request or a platform refusal is a server error.
pub async fn upload_report(mut req: Request<State>) -> tide::Result {
    let result = async {
        let form = report_form(multipart::read(&mut req).await?);
        uploads::upload_report(req.state().platform(), form, ImageFormats::JpegPngWebp).await
    }
    .await;
    Ok(match result {
        Ok(report) => json_response(StatusCode::Ok, json!({ "ok": true, "report": report })),
        Err(err) => {
            log(&err, &req);
            json_response(status(&err), json!({ "ok": false, "error": err.to_string() }))
        }
    })
}

/// `GET /api/admin/landing-sections`
pub async fn landing_sections(req: Request<State>) -> tide::Result {
    let result = landing::sections(req.state().platform())
        .await
        .map(|sections| json!({ "sections": sections }));
    reply(&req, StatusCode::Ok, result)
}

/// `POST /api/admin/landing-sections`
pub async fn save_landing_section(mut req: Request<State>) -> tide::Result {
    let result = async {
        let mut form = multipart::read(&mut req).await?;
        let form = SectionForm {
            section_key: form.take("sectionKey"),
            sort_order: form.take("sortOrder"),
            title: form.take("title"),
            file: form.file.take(),
        };
        let section = landing::save_section(req.state().platform(), form).await?;
        Ok::<_, Error>(json!({ "ok": true, "section": section }))
    }
    .await;
    reply(&req, StatusCode::Ok, result)
}

/// `GET /api/admin/gallery`
pub async fn list_gallery(req: Request<State>) -> tide::Result {
    let result = gallery::list(req.state().platform())
        .await
        .map(|images| json!({ "images": images }));
    reply(&req, StatusCode::Ok, result)
}

/// `POST /api/admin/gallery`
pub async fn add_gallery_image(mut req: Request<State>) -> tide::Result {
    let result = async {
        let form = multipart::read(&mut req).await?;
        let image = gallery::add(req.state().platform(), form.file).await?;
        Ok::<_, Error>(json!({ "ok": true, "image": image }))
    }
    .await;
    reply(&req, StatusCode::Created, result)
}

/// `DELETE /api/admin/gallery/:name`
pub async fn remove_gallery_image(req: Request<State>) -> tide::Result {
    let result = async {
        let name = param(&req, "name")?;
        gallery::remove(req.state().platform(), &name).await?;
        Ok::<_, Error>(json!({ "ok": true }))
    }
    .await;
    reply(&req, StatusCode::Ok, result)
}

/// `POST /api/contact`
pub async fn submit_contact(mut req: Request<State>) -> tide::Result {
    let result = async {
        let inquiry: ContactRequest = body(&mut req).await?;
        contact::submit(req.state().mailer(), inquiry).await?;
        Ok::<_, Error>(json!({ "success": true }))
    }
    .await;
    reply(&req, StatusCode::Ok, result)
}
