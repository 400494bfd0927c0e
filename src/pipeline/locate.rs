//! Locate and decode a PDF embedded in page markup as a `data:` URI.
//!
//! Invoice viewers ship the document inline rather than as a link, in one of
//! three shapes. They are checked in this order and the first hit wins:
//!
//! 1. `<embed type="application/pdf" src="data:...">`
//! 2. `<iframe src="data:...">`
//! 3. a `<script>` (typically a PDF.js bootstrap) holding a
//!    `data:application/pdf;base64,...` string literal
//!
//! Everything here is a pure function over a markup string so it can be run
//! against a browser-rendered DOM or raw HTML alike.

use crate::error::ItemError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, warn};

/// Where on the page the data URI was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataUriLocation {
    Embed,
    Iframe,
    Script,
}

/// A data URI found on a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedDataUri {
    pub location: DataUriLocation,
    pub uri: String,
}

const SCRIPT_MARKER: &str = "data:application/pdf;base64";

/// Placeholder stem when a URL has no usable final path segment.
pub const FALLBACK_STEM: &str = "downloaded_file";

static SEL_EMBED: Lazy<Selector> = Lazy::new(|| Selector::parse("embed[type][src]").unwrap());
static SEL_IFRAME: Lazy<Selector> = Lazy::new(|| Selector::parse("iframe[src]").unwrap());
static SEL_SCRIPT: Lazy<Selector> = Lazy::new(|| Selector::parse("script").unwrap());

static RE_SCRIPT_PDF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"data:application/pdf;base64,[A-Za-z0-9+/=]+").unwrap());

fn is_data_uri(src: &str) -> bool {
    src.trim_start()
        .get(..5)
        .is_some_and(|p| p.eq_ignore_ascii_case("data:"))
}

/// Find the first PDF data URI on the page.
pub fn locate_pdf_data_uri(html: &str) -> Option<LocatedDataUri> {
    let document = Html::parse_document(html);

    let embed = document.select(&SEL_EMBED).find_map(|el| {
        let ty = el.value().attr("type")?;
        let src = el.value().attr("src")?;
        (ty.trim().eq_ignore_ascii_case("application/pdf") && is_data_uri(src))
            .then(|| src.trim().to_string())
    });
    if let Some(uri) = embed {
        return Some(LocatedDataUri {
            location: DataUriLocation::Embed,
            uri,
        });
    }

    let iframe = document.select(&SEL_IFRAME).find_map(|el| {
        let src = el.value().attr("src")?;
        is_data_uri(src).then(|| src.trim().to_string())
    });
    if let Some(uri) = iframe {
        return Some(LocatedDataUri {
            location: DataUriLocation::Iframe,
            uri,
        });
    }

    document.select(&SEL_SCRIPT).find_map(|el| {
        let body: String = el.text().collect();
        if !body.contains(SCRIPT_MARKER) {
            return None;
        }
        RE_SCRIPT_PDF.find(&body).map(|m| LocatedDataUri {
            location: DataUriLocation::Script,
            uri: m.as_str().to_string(),
        })
    })
}

/// Decode the base64 payload that follows the data URI's first comma.
///
/// ASCII whitespace inside the payload is ignored (attribute values are
/// sometimes line-wrapped).
pub fn decode_data_uri(uri: &str) -> Result<Vec<u8>, ItemError> {
    let (_, payload) = uri.split_once(',').ok_or_else(|| ItemError::InvalidPayload {
        detail: "data URI has no ',' separator".into(),
    })?;

    let cleaned: String = payload
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    if cleaned.is_empty() {
        return Err(ItemError::InvalidPayload {
            detail: "data URI payload is empty".into(),
        });
    }

    STANDARD
        .decode(cleaned.as_bytes())
        .map_err(|e| ItemError::InvalidPayload {
            detail: format!("base64 decode failed: {e}"),
        })
}

/// Locate and decode the embedded PDF, if any.
///
/// `Ok(None)` means the page carries no PDF data URI at all.
pub fn embedded_document_in(html: &str) -> Result<Option<Vec<u8>>, ItemError> {
    let Some(found) = locate_pdf_data_uri(html) else {
        return Ok(None);
    };
    debug!(
        "Found PDF data URI in {:?} ({} chars)",
        found.location,
        found.uri.len()
    );

    let bytes = decode_data_uri(&found.uri)?;
    if !bytes.starts_with(b"%PDF") {
        let head: Vec<u8> = bytes.iter().take(4).copied().collect();
        warn!("Embedded payload does not start with %PDF (first bytes: {head:?})");
    }
    Ok(Some(bytes))
}

/// Derive a filesystem-safe stem from the URL's final path segment.
///
/// `.html` / `.php` suffixes are stripped; characters outside
/// `[A-Za-z0-9._-]` become `_`. Falls back to [`FALLBACK_STEM`].
pub fn derive_document_stem(url: &str) -> String {
    let segment = match reqwest::Url::parse(url) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|mut s| s.next_back())
            .unwrap_or("")
            .to_string(),
        Err(_) => url
            .split(['?', '#'])
            .next()
            .unwrap_or("")
            .rsplit('/')
            .next()
            .unwrap_or("")
            .to_string(),
    };

    let mut stem = segment.as_str();
    for suffix in [".html", ".php"] {
        if stem.len() > suffix.len()
            && stem
                .get(stem.len() - suffix.len()..)
                .is_some_and(|s| s.eq_ignore_ascii_case(suffix))
        {
            stem = &stem[..stem.len() - suffix.len()];
        } else if stem.eq_ignore_ascii_case(suffix) {
            stem = "";
        }
    }

    let sanitized: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let sanitized = sanitized.trim_start_matches('.');

    if sanitized.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        sanitized.to_string()
    }
}
