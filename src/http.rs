//! Framework-neutral adapters for the page and container HTTP routes.
//!
//! Each handler maps one request onto the services of an [`InkRender`] and returns a plain
//! [`HttpResponse`]; the embedding server only copies status, headers and body onto the wire.

use crate::InkRender;
use crate::error::InkError;
use crate::export::{PdfExportOptions, download_filename, export_filename};
use crate::thumbnail::CacheStorage;
use crate::vector::PageSize;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;

const PDF_CONTENT_TYPE: &str = "application/pdf";
const PNG_CONTENT_TYPE: &str = "image/png";
const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    fn bytes(content_type: &str, body: Vec<u8>) -> Self {
        Self {
            status: 200,
            headers: vec![("Content-Type".to_string(), content_type.to_string())],
            body,
        }
    }

    fn error(status: u16, message: &str) -> Self {
        Self {
            status,
            headers: vec![("Content-Type".to_string(), JSON_CONTENT_TYPE.to_string())],
            body: json!({ "error": message }).to_string().into_bytes(),
        }
    }

    fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    fn attachment(self, filename: &str) -> Self {
        self.with_header(
            "Content-Disposition",
            format!("attachment; filename=\"{filename}\""),
        )
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PdfQuery {
    include_transcription: Option<String>,
    page_size: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PngQuery {
    scale: Option<String>,
}

/// Percent- and `+`-decodes `query` into `T`; a leading `?` is ignored.
fn decode_query<T: DeserializeOwned>(query: &str) -> Result<T, serde_urlencoded::de::Error> {
    serde_urlencoded::from_str(query.trim_start_matches('?'))
}

/// `includeTranscription` (bare, `true`, `1` or `yes`) and `pageSize` (unknown means original).
pub fn parse_pdf_query(query: &str) -> PdfExportOptions {
    let parsed: PdfQuery = decode_query(query).unwrap_or_else(|err| {
        log::debug!("ignoring malformed pdf export query {query:?}: {err}");
        PdfQuery::default()
    });
    let include_transcription = parsed
        .include_transcription
        .map(|value| {
            value.is_empty()
                || matches!(value.to_ascii_lowercase().as_str(), "true" | "1" | "yes")
        })
        .unwrap_or(false);
    let page_size = parsed
        .page_size
        .and_then(|value| value.parse::<PageSize>().ok())
        .unwrap_or_default();
    PdfExportOptions::new(include_transcription, page_size)
}

/// `scale`, defaulting to 1. Unparsable values are an invalid scale.
pub fn parse_scale(query: &str) -> Result<f64, InkError> {
    let parsed: PngQuery =
        decode_query(query).map_err(|_| InkError::InvalidScale(f64::NAN))?;
    match parsed.scale.as_deref().map(str::trim) {
        None | Some("") => Ok(1.0),
        Some(raw) => raw
            .parse::<f64>()
            .map_err(|_| InkError::InvalidScale(f64::NAN)),
    }
}

fn failure(route: &str, err: &InkError) -> HttpResponse {
    match err {
        InkError::InvalidScale(_) => HttpResponse::error(400, &err.to_string()),
        _ => {
            log::error!("{route} failed: {err}");
            HttpResponse::error(500, "Internal server error")
        }
    }
}

/// `GET /pages/{id}/thumbnail`
pub fn page_thumbnail<S: CacheStorage>(render: &InkRender<S>, page_id: &str) -> HttpResponse {
    match render.thumbnails().serve(page_id) {
        Ok(Some(thumb)) => HttpResponse::bytes(thumb.content_type, thumb.bytes)
            .with_header("Cache-Control", thumb.cache_control)
            .with_header("ETag", thumb.etag),
        Ok(None) => HttpResponse::error(404, "Page not found"),
        Err(err) => failure("thumbnail", &err),
    }
}

/// `GET /pages/{id}/export/pdf?includeTranscription&pageSize=original|a4|letter`
pub fn page_pdf<S: CacheStorage>(render: &InkRender<S>, page_id: &str, query: &str) -> HttpResponse {
    let options = parse_pdf_query(query);
    match render.exports().export_page_pdf(page_id, &options) {
        Ok(Some(bytes)) => HttpResponse::bytes(PDF_CONTENT_TYPE, bytes)
            .attachment(&download_filename(&format!("page_{page_id}"), "pdf")),
        Ok(None) => HttpResponse::error(404, "Page not found"),
        Err(err) => failure("page pdf export", &err),
    }
}

/// `GET /containers/{id}/export/pdf?...`
pub fn container_pdf<S: CacheStorage>(
    render: &InkRender<S>,
    container_id: &str,
    query: &str,
) -> HttpResponse {
    let Some(container) = render.pages().container(container_id) else {
        return HttpResponse::error(404, "Notebook not found");
    };
    let options = parse_pdf_query(query);
    match render
        .exports()
        .export_notebook_pdf(container_id, &container.page_ids, &options)
    {
        Ok(Some(bytes)) => HttpResponse::bytes(PDF_CONTENT_TYPE, bytes)
            .attachment(&export_filename(&container.title)),
        Ok(None) => HttpResponse::error(404, "Notebook has no pages"),
        Err(err) => failure("notebook pdf export", &err),
    }
}

/// `GET /pages/{id}/export/png?scale=<number>`
pub fn page_png<S: CacheStorage>(render: &InkRender<S>, page_id: &str, query: &str) -> HttpResponse {
    let result = parse_scale(query).and_then(|scale| render.exports().export_page_png(page_id, scale));
    match result {
        Ok(Some(bytes)) => HttpResponse::bytes(PNG_CONTENT_TYPE, bytes)
            .attachment(&download_filename(&format!("page_{page_id}"), "png")),
        Ok(None) => HttpResponse::error(404, "Page not found"),
        Err(err) => failure("page png export", &err),
    }
}
