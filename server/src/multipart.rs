//! Decoding `multipart/form-data` request bodies.

use crate::app::State;
use bytes::Bytes;
use futures::stream;
use multer::Multipart;
use std::collections::HashMap;
use std::convert::Infallible;
use studio_model::{uploads::ImageFile, Error, Result};
use tide::Request;

/// A decoded multipart form: text fields plus at most one file, sent in the `file` field.
#[derive(Clone, Debug, Default)]
pub struct Form {
    pub fields: HashMap<String, String>,
    pub file: Option<ImageFile>,
}

impl Form {
    /// Take the text field `name`, if it was sent.
    pub fn take(&mut self, name: &str) -> Option<String> {
        self.fields.remove(name)
    }
}

fn malformed(err: impl std::fmt::Display) -> Error {
    Error::invalid(format!("Formulario inválido: {err}"))
}

/// Read the body of `req` as a multipart form.
///
/// A file input left empty by the browser counts as no file.
pub async fn read(req: &mut Request<State>) -> Result<Form> {
    let content_type = req
        .header("Content-Type")
        .map(|values| values.last().as_str().to_string())
        .unwrap_or_default();
    let boundary = multer::parse_boundary(&content_type).map_err(malformed)?;
    let body = req.body_bytes().await.map_err(malformed)?;
    let body = stream::once(async move { Ok::<_, Infallible>(Bytes::from(body)) });

    let mut multipart = Multipart::new(body, boundary);
    let mut form = Form::default();
    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let Some(name) = field.name().map(String::from) else {
            continue;
        };
        match field.file_name().map(String::from) {
            Some(file_name) => {
                let content_type = field
                    .content_type()
                    .map(|mime| mime.essence_str().to_string())
                    .unwrap_or_default();
                let bytes = field.bytes().await.map_err(malformed)?;
                if name == "file" && !(file_name.is_empty() && bytes.is_empty()) {
                    form.file = Some(ImageFile {
                        file_name,
                        content_type,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            None => {
                let value = field.text().await.map_err(malformed)?;
                form.fields.insert(name, value);
            }
        }
    }
    Ok(form)
}
