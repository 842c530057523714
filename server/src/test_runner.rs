#![cfg(test)]

//! End-to-end tests of the studio site.
//!
//! Every test starts the real server on an unused port, backed by an in-memory platform seeded
//! with an administrator and one client, and a mailer which records messages instead of sending
//! them.
//!
//! Stateless request/response cases live in `server/tests/cases`. Each case is a JSON file:
//! ```json
//! {
//!     "as": "admin",
//!     "request": { "method": "GET", "path": "/api/admin/clients/{client_id}", "body": null },
//!     "response": { "status": 200, "location": null, "body": { "profile": {} } }
//! }
//! ```
//! `as` optionally names the seeded user (`admin` or `client`) whose session cookie is sent.
//! `{client_id}` in the path is replaced with the id of the seeded client. The expected `body`, if
//! any, must be contained in the actual body: objects may have extra keys, but arrays must match
//! element for element. All cases run concurrently against the same server, so they must not
//! change any state.
//!
//! Flows which do change state (sign-in, client management, uploads) are separate tests below,
//! each with its own server.

use crate::{
    app::{app, State},
    session::{decode, encode, SESSION_COOKIE},
};
use ansi_term::Color;
use anyhow::Error;
use async_std::task::{sleep, spawn};
use futures::future::join_all;
use portpicker::pick_unused_port;
use serde::Deserialize;
use serde_json::{json, Value};
use std::ffi::OsString;
use std::fmt::{self, Display, Formatter};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;
use studio_model::{
    auth::Tokens,
    contact::MockMailer,
    init_logging,
    platform::MockPlatform,
    schema::{self, LinkCategory},
    Platform,
};
use surf::{http::Method, Client, Response, StatusCode};

const ADMIN_EMAIL: &str = "estudio@example.com";
const ADMIN_PASSWORD: &str = "admin-secret";
const CLIENT_EMAIL: &str = "maria@example.com";
const CLIENT_PASSWORD: &str = "client-secret";
const CLIENT_SLUG: &str = "maria-jose-perez";

const JPEG: &[u8] = b"\xff\xd8\xff";
const PNG: &[u8] = b"\x89PNG\r\n\x1a\n";
const WEBP: &[u8] = b"RIFF";
const GIF: &[u8] = b"GIF89a";

fn workspace() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .to_path_buf()
}

/// A running server and handles on its backing services.
struct Fixture {
    platform: MockPlatform,
    mailer: MockMailer,
    client: Client,
    client_id: String,
    admin_cookie: String,
    client_cookie: String,
}

impl Fixture {
    async fn start() -> Result<Self, Error> {
        Self::with_mailer(MockMailer::new()).await
    }

    async fn with_mailer(mailer: MockMailer) -> Result<Self, Error> {
        init_logging();

        let platform = MockPlatform::new();
        platform
            .add_user(ADMIN_EMAIL, ADMIN_PASSWORD, json!({ "role": "admin" }))
            .await;
        let client_id = platform
            .add_user(CLIENT_EMAIL, CLIENT_PASSWORD, json!({}))
            .await;
        platform
            .seed(
                schema::USER_ROLES,
                [json!({ "user_id": client_id, "role": "client" })],
            )
            .await;
        platform
            .seed(
                schema::CLIENT_PROFILES,
                [json!({
                    "user_id": client_id,
                    "client_name": "María José Pérez",
                    "project_status": "En obra",
                })],
            )
            .await;
        platform
            .seed(
                schema::CLIENT_LINKS,
                LinkCategory::all().map(|category| {
                    json!({
                        "user_id": client_id,
                        "category": category.to_string(),
                        "url": format!("https://docs.example.com/{category}"),
                    })
                }),
            )
            .await;
        platform
            .seed(
                schema::WEEKLY_REPORTS,
                [
                    json!({
                        "id": 1,
                        "user_id": client_id,
                        "description": "Losa terminada",
                        "photo_url": "https://img.example.com/losa-1.jpg",
                        "created_at": "2026-03-05T10:00:00Z",
                    }),
                    json!({
                        "id": 2,
                        "user_id": client_id,
                        "description": "Losa terminada",
                        "photo_url": "https://img.example.com/losa-2.jpg",
                        "created_at": "2026-03-05T09:00:00Z",
                    }),
                ],
            )
            .await;

        let admin_cookie = session_for(&platform, ADMIN_EMAIL, ADMIN_PASSWORD).await?;
        let client_cookie = session_for(&platform, CLIENT_EMAIL, CLIENT_PASSWORD).await?;

        let port = pick_unused_port().unwrap();
        let server = app(
            State::new(platform.clone(), mailer.clone(), false),
            workspace().join("public"),
        )?;
        spawn(async move {
            if let Err(err) = server.listen(format!("127.0.0.1:{port}")).await {
                tracing::warn!("server exited: {err}");
            }
        });

        // Connect a client.
        let client: Client = surf::Config::default()
            .set_base_url(format!("http://127.0.0.1:{port}").parse().unwrap())
            .try_into()
            .unwrap();
        // Wait for the server to come up.
        wait_for_server(&client).await?;

        Ok(Self {
            platform,
            mailer,
            client,
            client_id,
            admin_cookie,
            client_cookie,
        })
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        cookie: Option<&str>,
        body: Option<&Value>,
    ) -> Result<Response, Error> {
        let mut req = self.client.request(method, path);
        if let Some(cookie) = cookie {
            req = req.header("Cookie", format!("{SESSION_COOKIE}={cookie}"));
        }
        if let Some(body) = body {
            req = req.body_json(body).map_err(Error::msg)?;
        }
        req.send().await.map_err(Error::msg)
    }

    async fn send_json(
        &self,
        method: Method,
        path: &str,
        cookie: Option<&str>,
        body: Option<&Value>,
    ) -> Result<(StatusCode, Value), Error> {
        let mut res = self.send(method, path, cookie, body).await?;
        let body = res.body_json().await.map_err(Error::msg)?;
        Ok((res.status(), body))
    }

    async fn send_multipart(
        &self,
        path: &str,
        fields: &[(&str, &str)],
        file: Option<(&str, &str, &[u8])>,
    ) -> Result<(StatusCode, Value), Error> {
        let (content_type, body) = multipart_body(fields, file);
        let mut res = self
            .client
            .post(path)
            .header("Cookie", format!("{SESSION_COOKIE}={}", self.admin_cookie))
            .body(body)
            .header("Content-Type", content_type)
            .send()
            .await
            .map_err(Error::msg)?;
        let body = res.body_json().await.map_err(Error::msg)?;
        Ok((res.status(), body))
    }

    async fn login(&self, email: &str, password: &str, next: Option<&str>) -> Result<Response, Error> {
        let mut form = json!({ "email": email, "password": password });
        if let Some(next) = next {
            form["next"] = next.into();
        }
        self.client
            .post("/login")
            .body(surf::Body::from_form(&form).map_err(Error::msg)?)
            .send()
            .await
            .map_err(Error::msg)
    }

    async fn page(&self, path: &str, cookie: Option<&str>) -> Result<(Response, String), Error> {
        let mut res = self.send(Method::Get, path, cookie, None).await?;
        let body = res.body_string().await.map_err(Error::msg)?;
        Ok((res, body))
    }
}

/// Sign in directly against the platform and encode the session as the server would.
async fn session_for(platform: &MockPlatform, email: &str, password: &str) -> Result<String, Error> {
    let session = platform.sign_in(email, password).await?;
    Ok(encode(&Tokens::from(&session)))
}

fn header(res: &Response, name: &str) -> Option<String> {
    res.header(name).map(|values| values.last().as_str().to_string())
}

/// The session cookie value set by a response, if any.
fn set_session(res: &Response) -> Option<String> {
    res.header("Set-Cookie")?
        .iter()
        .filter_map(|value| {
            value
                .as_str()
                .split(';')
                .next()?
                .trim()
                .strip_prefix(&format!("{SESSION_COOKIE}="))
                .map(String::from)
        })
        .find(|value| !value.is_empty())
}

fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &str, &[u8])>) -> (String, Vec<u8>) {
    const BOUNDARY: &str = "studio-test-boundary";
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, content_type, bytes)) = file {
        body.extend(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; \
                 filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend(bytes);
        body.extend(b"\r\n");
    }
    body.extend(format!("--{BOUNDARY}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={BOUNDARY}"), body)
}

async fn wait_for_server(client: &Client) -> Result<(), Error> {
    const MAX_CONNECT_RETRIES: usize = 60;

    for _ in 0..MAX_CONNECT_RETRIES {
        match client.connect("/").await {
            Ok(_) => return Ok(()),
            Err(err) => {
                tracing::warn!("waiting for server to start: {err}");
                sleep(Duration::from_millis(250)).await;
            }
        }
    }

    Err(Error::msg("timed out waiting for server"))
}

#[async_std::test]
async fn http_test_cases() -> Result<(), Error> {
    let fixture = Fixture::start().await?;

    // Discover test cases.
    let test_cases = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/cases")
        .read_dir()?
        .filter_map(|dirent| {
            let path = dirent.unwrap().path();
            if path.extension()?.to_str().unwrap() == "json" {
                Some(TestCase::new(&path).unwrap())
            } else {
                None
            }
        })
        .collect::<Vec<_>>();
    assert!(!test_cases.is_empty(), "no test cases found");

    let results = join_all(test_cases.into_iter().map(|test| test.run(&fixture))).await;
    for result in &results {
        println!("{}", result);
    }
    if results.iter().any(TestResult::failed) {
        Err(Error::msg(format!("{}", Color::Red.paint("tests failed"))))
    } else {
        println!("All test cases passed.");
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize)]
struct CaseRequest {
    method: String,
    path: String,
    #[serde(default)]
    body: Option<Value>,
}

#[derive(Clone, Debug, Deserialize)]
struct CaseResponse {
    status: u16,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    body: Option<Value>,
}

#[derive(Clone, Debug, Deserialize)]
struct Case {
    #[serde(default, rename = "as")]
    user: Option<String>,
    request: CaseRequest,
    response: CaseResponse,
}

#[derive(Clone, Debug)]
struct TestCase {
    name: OsString,
    case: Case,
}

impl TestCase {
    fn new(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let name = path.file_stem().unwrap();
        let case = serde_json::from_reader(File::open(path)?)?;
        Ok(Self {
            name: name.into(),
            case,
        })
    }

    async fn run(self, fixture: &Fixture) -> TestResult {
        TestResult {
            name: self.name,
            failure: Self::do_test(fixture, self.case).await.err(),
        }
    }

    async fn do_test(fixture: &Fixture, case: Case) -> Result<(), Error> {
        let cookie = match case.user.as_deref() {
            None => None,
            Some("admin") => Some(fixture.admin_cookie.as_str()),
            Some("client") => Some(fixture.client_cookie.as_str()),
            Some(user) => return Err(Error::msg(format!("unknown user {user}"))),
        };
        let method = case.request.method.parse::<Method>().map_err(Error::msg)?;
        let path = case.request.path.replace("{client_id}", &fixture.client_id);
        let mut res = fixture
            .send(method, &path, cookie, case.request.body.as_ref())
            .await?;

        let status = u16::from(res.status());
        if status != case.response.status {
            let body = res.body_string().await.unwrap_or_default();
            return Err(Error::msg(format!(
                "expected status {}, got {status}: {body}",
                case.response.status
            )));
        }
        if let Some(expected) = &case.response.location {
            let location = header(&res, "Location");
            if location.as_ref() != Some(expected) {
                return Err(Error::msg(format!(
                    "expected redirect to {expected}, got {location:?}"
                )));
            }
        }
        if let Some(expected) = &case.response.body {
            let body: Value = res
                .body_json()
                .await
                .map_err(|err| Error::msg(format!("cannot parse response body as JSON: {err}")))?;
            if !contains(&body, expected) {
                return Err(Error::msg(format!(
                    "expected response:\n{expected}\nactual response:\n{body}"
                )));
            }
        }
        Ok(())
    }
}

struct TestResult {
    name: OsString,
    failure: Option<anyhow::Error>,
}

impl TestResult {
    fn failed(&self) -> bool {
        self.failure.is_some()
    }
}

impl Display for TestResult {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}...", self.name.to_string_lossy())?;
        if let Some(err) = &self.failure {
            writeln!(f, "{}", Color::Red.paint("FAILED"))?;
            write!(f, "{err}")?;
        } else {
            write!(f, "{}", Color::Green.paint("OK"))?;
        }
        Ok(())
    }
}

/// Whether `actual` contains everything in `expected`.
fn contains(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Object(actual), Value::Object(expected)) => expected
            .iter()
            .all(|(key, val)| actual.get(key).map_or(false, |act| contains(act, val))),
        (Value::Array(actual), Value::Array(expected)) => {
            actual.len() == expected.len()
                && actual.iter().zip(expected).all(|(act, exp)| contains(act, exp))
        }
        _ => actual == expected,
    }
}

#[async_std::test]
async fn login_and_portal_flow() -> Result<(), Error> {
    let fixture = Fixture::start().await?;

    // A client lands on their portal.
    let res = fixture.login(CLIENT_EMAIL, CLIENT_PASSWORD, None).await?;
    assert_eq!(res.status(), StatusCode::SeeOther);
    assert_eq!(
        header(&res, "Location").as_deref(),
        Some("/clientes/maria-jose-perez")
    );
    let cookie = set_session(&res).expect("login sets the session cookie");

    let (res, page) = fixture
        .page(&format!("/clientes/{CLIENT_SLUG}"), Some(cookie.as_str()))
        .await?;
    assert_eq!(res.status(), StatusCode::Ok);
    assert!(page.contains("Bienvenido, María José Pérez"));
    assert!(page.contains("Estado del proyecto: En obra"));
    assert!(page.contains("05 DE MARZO DE 2026"));
    assert!(page.contains("losa-1.jpg"));
    assert!(page.contains("losa-2.jpg"));
    assert_eq!(page.matches("Avance Semanal").count(), 1);

    // An expired access token is refreshed once and the new session is sent back.
    let tokens = decode(&cookie).unwrap();
    fixture.platform.expire(&tokens.access_token).await;
    let (res, _) = fixture
        .page(&format!("/clientes/{CLIENT_SLUG}"), Some(cookie.as_str()))
        .await?;
    assert_eq!(res.status(), StatusCode::Ok);
    let refreshed = set_session(&res).expect("refresh re-issues the session cookie");
    assert_ne!(refreshed, cookie);

    // The old refresh token was used up, so the old cookie no longer works.
    let (res, _) = fixture
        .page(&format!("/clientes/{CLIENT_SLUG}"), Some(cookie.as_str()))
        .await?;
    assert_eq!(res.status(), StatusCode::Found);

    // Signing out clears the session.
    let res = fixture
        .send(Method::Post, "/logout", Some(refreshed.as_str()), None)
        .await?;
    assert_eq!(res.status(), StatusCode::SeeOther);
    assert_eq!(header(&res, "Location").as_deref(), Some("/login"));
    let (res, _) = fixture
        .page(&format!("/clientes/{CLIENT_SLUG}"), Some(refreshed.as_str()))
        .await?;
    assert_eq!(res.status(), StatusCode::Found);
    Ok(())
}

#[async_std::test]
async fn login_outcomes() -> Result<(), Error> {
    let fixture = Fixture::start().await?;

    let res = fixture
        .login(ADMIN_EMAIL, ADMIN_PASSWORD, Some("/admin"))
        .await?;
    assert_eq!(res.status(), StatusCode::SeeOther);
    assert_eq!(header(&res, "Location").as_deref(), Some("/admin"));
    let cookie = set_session(&res).unwrap();
    let (res, page) = fixture.page("/admin", Some(cookie.as_str())).await?;
    assert_eq!(res.status(), StatusCode::Ok);
    assert!(page.contains("Gestión de Clientes"));
    assert!(page.contains("María José Pérez"));
    assert!(page.contains("Hero Principal"));

    // Off-site destinations are ignored.
    let res = fixture
        .login(ADMIN_EMAIL, ADMIN_PASSWORD, Some("//evil.example"))
        .await?;
    assert_eq!(header(&res, "Location").as_deref(), Some("/admin"));

    let mut res = fixture.login(ADMIN_EMAIL, "wrong", None).await?;
    assert_eq!(res.status(), StatusCode::BadRequest);
    assert!(set_session(&res).is_none());
    let page = res.body_string().await.map_err(Error::msg)?;
    assert!(page.contains("Invalid login credentials"));

    fixture
        .platform
        .add_user("nadie@example.com", "secret", json!({}))
        .await;
    let mut res = fixture.login("nadie@example.com", "secret", None).await?;
    assert_eq!(res.status(), StatusCode::BadRequest);
    let page = res.body_string().await.map_err(Error::msg)?;
    assert!(page.contains("Tu usuario no tiene un perfil válido para ingresar."));
    Ok(())
}

#[async_std::test]
async fn client_lifecycle() -> Result<(), Error> {
    let fixture = Fixture::start().await?;
    let admin = Some(fixture.admin_cookie.as_str());

    let links = LinkCategory::all()
        .map(|category| (category.to_string(), json!(format!("https://drive.example.com/{category}"))))
        .collect::<serde_json::Map<_, _>>();
    let (status, body) = fixture
        .send_json(
            Method::Post,
            "/api/admin/clients",
            admin,
            Some(&json!({
                "email": " juan@example.com ",
                "password": "secreto",
                "clientName": "Juan Núñez",
                "projectStatus": "Anteproyecto",
                "links": links,
            })),
        )
        .await?;
    assert_eq!(status, StatusCode::Created, "{body}");
    assert_eq!(body, json!({ "ok": true }));

    let (_, body) = fixture
        .send_json(Method::Get, "/api/admin/clients", admin, None)
        .await?;
    let clients = body["clients"].as_array().unwrap();
    assert_eq!(clients.len(), 2);
    assert_eq!(clients[0]["client_name"], "Juan Núñez");
    let user_id = clients[0]["user_id"].as_str().unwrap().to_string();

    // The new client can sign in to their own portal.
    let res = fixture.login("juan@example.com", "secreto", None).await?;
    assert_eq!(
        header(&res, "Location").as_deref(),
        Some("/clientes/juan-nunez")
    );

    let (_, detail) = fixture
        .send_json(Method::Get, &format!("/api/admin/clients/{user_id}"), admin, None)
        .await?;
    assert_eq!(detail["profile"]["project_status"], "Anteproyecto");
    assert_eq!(detail["links"].as_array().unwrap().len(), 5);

    let editable = LinkCategory::editable()
        .map(|category| (category.to_string(), json!(format!("https://new.example.com/{category}"))))
        .collect::<serde_json::Map<_, _>>();
    let (status, _) = fixture
        .send_json(
            Method::Patch,
            &format!("/api/admin/clients/{user_id}"),
            admin,
            Some(&json!({ "projectStatus": "En obra", "links": editable })),
        )
        .await?;
    assert_eq!(status, StatusCode::Ok);
    let (_, detail) = fixture
        .send_json(Method::Get, &format!("/api/admin/clients/{user_id}"), admin, None)
        .await?;
    assert_eq!(detail["profile"]["project_status"], "En obra");
    assert!(detail["links"]
        .as_array()
        .unwrap()
        .iter()
        .all(|link| link["url"].as_str().unwrap().starts_with("https://new.example.com/")));

    let (status, _) = fixture
        .send_json(
            Method::Delete,
            "/api/admin/clients",
            admin,
            Some(&json!({ "userId": user_id })),
        )
        .await?;
    assert_eq!(status, StatusCode::Ok);
    assert!(!fixture.platform.has_user(&user_id).await);
    let (_, body) = fixture
        .send_json(Method::Get, "/api/admin/clients", admin, None)
        .await?;
    assert_eq!(body["clients"].as_array().unwrap().len(), 1);
    Ok(())
}

#[async_std::test]
async fn failed_client_creation_rolls_back() -> Result<(), Error> {
    let fixture = Fixture::start().await?;
    fixture.platform.fail_writes_to(schema::CLIENT_LINKS).await;

    let links = LinkCategory::all()
        .map(|category| (category.to_string(), json!("https://drive.example.com")))
        .collect::<serde_json::Map<_, _>>();
    let (status, body) = fixture
        .send_json(
            Method::Post,
            "/api/admin/clients",
            Some(fixture.admin_cookie.as_str()),
            Some(&json!({
                "email": "roto@example.com",
                "password": "secreto",
                "clientName": "Roto",
                "links": links,
            })),
        )
        .await?;
    assert_eq!(status, StatusCode::BadRequest);
    assert!(body["error"].is_string());
    assert_eq!(fixture.platform.rows(schema::CLIENT_PROFILES).await.len(), 1);
    assert_eq!(fixture.platform.rows(schema::USER_ROLES).await.len(), 1);
    let res = fixture.login("roto@example.com", "secreto", None).await?;
    assert_eq!(res.status(), StatusCode::BadRequest);
    Ok(())
}

#[async_std::test]
async fn report_uploads() -> Result<(), Error> {
    let fixture = Fixture::start().await?;
    let (status, body) = fixture
        .send_multipart(
            "/api/admin/reports",
            &[("userId", fixture.client_id.as_str()), ("description", "Estructura")],
            Some(("avance.png", "image/png", PNG)),
        )
        .await?;
    assert_eq!(status, StatusCode::Ok, "{body}");
    assert_eq!(body, json!({ "ok": true }));
    let paths = fixture.platform.object_paths(schema::PROJECTS_BUCKET).await;
    assert_eq!(paths.len(), 1);
    assert!(paths[0].starts_with(&format!("weekly-reports/{}/", fixture.client_id)));
    assert!(paths[0].ends_with(".png"));
    assert_eq!(
        fixture
            .platform
            .object(schema::PROJECTS_BUCKET, &paths[0])
            .await
            .unwrap()
            .bytes,
        PNG
    );

    let (status, body) = fixture
        .send_multipart(
            "/api/admin/upload",
            &[("userId", fixture.client_id.as_str()), ("description", "Fachada")],
            Some(("fachada.WEBP", "image/webp", WEBP)),
        )
        .await?;
    assert_eq!(status, StatusCode::Ok, "{body}");
    assert_eq!(body["ok"], true);
    assert_eq!(body["report"]["description"], "Fachada");
    assert!(body["report"]["photo_url"].as_str().unwrap().ends_with(".webp"));

    let (status, body) = fixture
        .send_multipart(
            "/api/admin/upload",
            &[("userId", fixture.client_id.as_str()), ("description", "Fachada")],
            Some(("plano.gif", "image/gif", GIF)),
        )
        .await?;
    assert_eq!(status, StatusCode::BadRequest);
    assert_eq!(
        body,
        json!({ "ok": false, "error": "Formato inválido. Solo JPG, PNG o WEBP." })
    );

    let (status, body) = fixture
        .send_multipart(
            "/api/admin/reports",
            &[("userId", fixture.client_id.as_str())],
            Some(("avance.jpg", "image/jpeg", JPEG)),
        )
        .await?;
    assert_eq!(status, StatusCode::BadRequest);
    assert_eq!(
        body,
        json!({ "error": "Faltan datos para cargar el reporte semanal." })
    );

    // Both reports show up in the client's portal.
    let (_, page) = fixture
        .page(&format!("/clientes/{CLIENT_SLUG}"), Some(fixture.client_cookie.as_str()))
        .await?;
    assert!(page.contains("Estructura"));
    assert!(page.contains("Fachada"));
    Ok(())
}

#[async_std::test]
async fn landing_and_gallery() -> Result<(), Error> {
    let fixture = Fixture::start().await?;

    let (_, page) = fixture.page("/", None).await?;
    assert!(page.contains("Casa Nordelta"));

    let (status, body) = fixture
        .send_multipart(
            "/api/admin/landing-sections",
            &[("sectionKey", "obras"), ("sortOrder", "1"), ("title", "Casa Pilar")],
            Some(("pilar.jpg", "image/jpeg", JPEG)),
        )
        .await?;
    assert_eq!(status, StatusCode::Ok, "{body}");
    let url = body["section"]["image_url"].as_str().unwrap().to_string();

    let (_, body) = fixture
        .send_json(
            Method::Get,
            "/api/admin/landing-sections",
            Some(fixture.admin_cookie.as_str()),
            None,
        )
        .await?;
    assert_eq!(body["sections"].as_array().unwrap().len(), 1);
    assert_eq!(body["sections"][0]["title"], "Casa Pilar");

    let (_, page) = fixture.page("/", None).await?;
    assert!(page.contains("Casa Pilar"));
    assert!(!page.contains("Casa Nordelta"));
    assert!(page.contains(url.rsplit('/').next().unwrap()));

    let (status, body) = fixture
        .send_multipart(
            "/api/admin/landing-sections",
            &[("sectionKey", "obras"), ("sortOrder", "uno")],
            Some(("pilar.jpg", "image/jpeg", JPEG)),
        )
        .await?;
    assert_eq!(status, StatusCode::BadRequest);
    assert_eq!(
        body,
        json!({ "error": "Faltan datos para actualizar landing_sections." })
    );

    let (status, body) = fixture
        .send_multipart(
            "/api/admin/gallery",
            &[],
            Some(("frente casa.jpg", "image/jpeg", JPEG)),
        )
        .await?;
    assert_eq!(status, StatusCode::Created, "{body}");
    let name = body["image"]["name"].as_str().unwrap().to_string();
    assert!(name.ends_with("-frente casa.jpg"));

    let (_, body) = fixture
        .send_json(Method::Get, "/api/admin/gallery", Some(fixture.admin_cookie.as_str()), None)
        .await?;
    assert_eq!(body["images"][0]["name"], name.as_str());
    assert!(body["images"][0]["publicUrl"].is_string());

    let (status, _) = fixture
        .send_json(
            Method::Delete,
            &format!("/api/admin/gallery/{}", name.replace(' ', "%20")),
            Some(fixture.admin_cookie.as_str()),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::Ok);
    assert!(fixture
        .platform
        .object_paths(schema::GALLERY_BUCKET)
        .await
        .is_empty());
    Ok(())
}

#[async_std::test]
async fn contact_form() -> Result<(), Error> {
    let fixture = Fixture::start().await?;
    let (status, body) = fixture
        .send_json(
            Method::Post,
            "/api/contact",
            None,
            Some(&json!({
                "name": "Ana",
                "email": "ana@example.com",
                "phone": "",
                "details": "Quiero reformar mi casa",
            })),
        )
        .await?;
    assert_eq!(status, StatusCode::Ok);
    assert_eq!(body, json!({ "success": true }));
    let sent = fixture.mailer.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject(), "Nueva consulta web - Ana");

    let fixture = Fixture::with_mailer(MockMailer::unconfigured()).await?;
    let (status, body) = fixture
        .send_json(
            Method::Post,
            "/api/contact",
            None,
            Some(&json!({ "name": "Ana", "email": "ana@example.com", "details": "Hola" })),
        )
        .await?;
    assert_eq!(status, StatusCode::InternalServerError);
    assert_eq!(body, json!({ "error": "Configuración SMTP incompleta." }));
    Ok(())
}
