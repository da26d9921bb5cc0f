//! HAR 1.2 export of captured records

use anyhow::{anyhow, Context};
use base64::{engine::general_purpose, Engine as _};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;

use crate::models::{CachePolicy, HeaderFields, HttpRecord};

const HAR_VERSION: &str = "1.2";
const CREATOR_NAME: &str = "netscope";
const CREATOR_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Serialize)]
struct HarLog<'a> {
    log: HarLogInner<'a>,
}

#[derive(Serialize)]
struct HarLogInner<'a> {
    version: &'static str,
    creator: HarCreator<'a>,
    entries: Vec<HarEntry>,
}

#[derive(Serialize)]
struct HarCreator<'a> {
    name: &'a str,
    version: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HarEntry {
    started_date_time: String,
    time: i64,
    request: HarRequest,
    response: HarResponse,
    cache: Value,
    timings: HarTimings,
    #[serde(rename = "_id")]
    id: u64,
    #[serde(rename = "_cachePolicy", skip_serializing_if = "Option::is_none")]
    cache_policy: Option<&'static str>,
    #[serde(rename = "_encrypted")]
    encrypted: bool,
    #[serde(rename = "_error", skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HarRequest {
    method: String,
    url: String,
    http_version: &'static str,
    headers: Vec<HarHeader>,
    query_string: Vec<HarHeader>,
    cookies: Vec<Value>,
    headers_size: i64,
    body_size: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    post_data: Option<HarPostData>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HarResponse {
    status: i64,
    status_text: String,
    http_version: &'static str,
    headers: Vec<HarHeader>,
    cookies: Vec<Value>,
    content: HarContent,
    #[serde(rename = "redirectURL")]
    redirect_url: String,
    headers_size: i64,
    body_size: i64,
}

#[derive(Serialize)]
struct HarHeader {
    name: String,
    value: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HarPostData {
    mime_type: String,
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    encoding: Option<&'static str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HarContent {
    size: i64,
    mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    encoding: Option<&'static str>,
}

#[derive(Serialize)]
struct HarTimings {
    send: i64,
    wait: i64,
    receive: i64,
}

/// Build a HAR document from records, in the order given.
pub fn records_to_har(records: &[HttpRecord]) -> anyhow::Result<Value> {
    let entries = records.iter().map(HarEntry::from_record).collect();
    serde_json::to_value(HarLog {
        log: HarLogInner {
            version: HAR_VERSION,
            creator: HarCreator {
                name: CREATOR_NAME,
                version: CREATOR_VERSION,
            },
            entries,
        },
    })
    .context("serializing HAR log")
}

/// Write records as pretty-printed HAR; returns the number of entries written.
pub fn export_har_to_path(
    records: &[HttpRecord],
    output_path: impl AsRef<Path>,
) -> anyhow::Result<usize> {
    if records.is_empty() {
        return Err(anyhow!("No records to export"));
    }
    let value = records_to_har(records)?;
    let json = serde_json::to_string_pretty(&value)?;
    std::fs::write(output_path.as_ref(), json)
        .with_context(|| format!("writing HAR file {:?}", output_path.as_ref()))?;
    tracing::info!(entries = records.len(), "exported HAR");
    Ok(records.len())
}

impl HarEntry {
    fn from_record(record: &HttpRecord) -> Self {
        let time = record.duration_ms().unwrap_or(0) as i64;
        Self {
            started_date_time: record.started_at.to_rfc3339(),
            time,
            request: HarRequest::from_record(record),
            response: HarResponse::from_record(record),
            cache: Value::Object(Default::default()),
            timings: HarTimings {
                send: 0,
                wait: time,
                receive: 0,
            },
            id: record.id,
            cache_policy: record.cache_policy.map(policy_name),
            encrypted: record.is_encrypted(),
            error: record.error().map(|e| e.description.clone()),
        }
    }
}

impl HarRequest {
    fn from_record(record: &HttpRecord) -> Self {
        let post_data = record.request_body.as_deref().map(|bytes| {
            let (text, encoding) = encode_text(bytes);
            HarPostData {
                mime_type: record
                    .request_headers
                    .get("content-type")
                    .unwrap_or("application/octet-stream")
                    .to_string(),
                text,
                encoding,
            }
        });
        Self {
            method: record.method.clone(),
            url: record.url.clone(),
            http_version: "HTTP/1.1",
            headers: har_headers(&record.request_headers),
            query_string: parse_query_pairs(&record.url),
            cookies: Vec::new(),
            headers_size: -1,
            body_size: record.request_body.as_ref().map(|b| b.len() as i64).unwrap_or(0),
            post_data,
        }
    }
}

impl HarResponse {
    fn from_record(record: &HttpRecord) -> Self {
        let headers = record.response_headers().map(har_headers).unwrap_or_default();
        let redirect_url = record
            .response_headers()
            .and_then(|h| h.get("location"))
            .unwrap_or_default()
            .to_string();
        let mime_type = record
            .mime_type
            .clone()
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let size = record.response_size() as i64;
        let (text, encoding) = match record.display_body() {
            Some(bytes) => {
                let (text, encoding) = encode_text(bytes);
                (Some(text), encoding)
            }
            None => (None, None),
        };
        Self {
            status: record.status_code().map(i64::from).unwrap_or(0),
            status_text: record
                .status_code()
                .and_then(|c| http::StatusCode::from_u16(c).ok())
                .and_then(|c| c.canonical_reason())
                .unwrap_or_default()
                .to_string(),
            http_version: "HTTP/1.1",
            headers,
            cookies: Vec::new(),
            content: HarContent {
                size,
                mime_type,
                text,
                encoding,
            },
            redirect_url,
            headers_size: -1,
            body_size: size,
        }
    }
}

fn policy_name(policy: CachePolicy) -> &'static str {
    match policy {
        CachePolicy::NotAllowed => "notAllowed",
        CachePolicy::AllowedInMemoryOnly => "allowedInMemoryOnly",
        CachePolicy::Allowed => "allowed",
    }
}

fn har_headers(headers: &HeaderFields) -> Vec<HarHeader> {
    headers
        .iter()
        .map(|(name, value)| HarHeader {
            name: name.to_string(),
            value: value.to_string(),
        })
        .collect()
}

/// UTF-8 bodies are kept as text, anything else is base64 encoded.
fn encode_text(bytes: &[u8]) -> (String, Option<&'static str>) {
    match std::str::from_utf8(bytes) {
        Ok(text) => (text.to_string(), None),
        Err(_) => (general_purpose::STANDARD.encode(bytes), Some("base64")),
    }
}

fn parse_query_pairs(url: &str) -> Vec<HarHeader> {
    let Some(query) = url
        .split('#')
        .next()
        .and_then(|u| u.split_once('?'))
        .map(|(_, q)| q)
    else {
        return Vec::new();
    };
    query
        .split('&')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let (name, value) = segment.split_once('=').unwrap_or((segment, ""));
            HarHeader {
                name: percent_decode(name),
                value: percent_decode(value),
            }
        })
        .collect()
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut output = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                match (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                    (Some(h), Some(l)) => {
                        output.push(h << 4 | l);
                        i += 3;
                    }
                    _ => {
                        output.push(b'%');
                        i += 1;
                    }
                }
            }
            b'+' => {
                output.push(b' ');
                i += 1;
            }
            byte => {
                output.push(byte);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&output).into_owned()
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}
