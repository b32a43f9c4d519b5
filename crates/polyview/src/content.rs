//! Bundled page assets.
//!
//! The wry view answers `polyview://localhost/<path>` from a
//! [`ContentProvider`], and `load_html_file` reads through the same provider
//! so a file and the assets it references share one origin.

use std::borrow::Cow;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use wry::http::{Response, StatusCode};

/// Custom protocol scheme served by [`ContentProvider`].
pub const SCHEME: &str = "polyview";

const ORIGIN: &str = "polyview://localhost";

/// Prefixes a request URI may carry before the asset path. WebView2 maps
/// custom schemes onto `http://<scheme>.localhost/`.
const URI_PREFIXES: &[&str] = &[
    "polyview://localhost/",
    "polyview://localhost",
    "polyview:///",
    "polyview://",
    "http://polyview.localhost/",
];

const MIME_TYPES: &[(&str, &str)] = &[
    ("html", "text/html"),
    ("htm", "text/html"),
    ("css", "text/css"),
    ("js", "application/javascript"),
    ("mjs", "application/javascript"),
    ("json", "application/json"),
    ("wasm", "application/wasm"),
    ("svg", "image/svg+xml"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("ico", "image/x-icon"),
    ("woff", "font/woff"),
    ("woff2", "font/woff2"),
    ("ttf", "font/ttf"),
    ("txt", "text/plain"),
    ("xml", "application/xml"),
];

const FALLBACK_MIME: &str = "application/octet-stream";

/// One resolved asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset<'a> {
    pub mime: Cow<'a, str>,
    pub data: Cow<'a, [u8]>,
}

impl Asset<'_> {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

/// Asset root for one page, plus in-memory entries that shadow files.
#[derive(Debug)]
pub struct ContentProvider {
    root: PathBuf,
    memory: HashMap<String, (String, Vec<u8>)>,
}

impl ContentProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            memory: HashMap::new(),
        }
    }

    /// Serve `data` at `path` regardless of what is on disk.
    pub fn add_override(
        &mut self,
        path: impl Into<String>,
        mime: impl Into<String>,
        data: impl Into<Vec<u8>>,
    ) {
        let path = path.into();
        let key = path.trim_start_matches('/').to_string();
        self.memory.insert(key, (mime.into(), data.into()));
    }

    pub fn resolve(&self, path: &str) -> Option<Asset<'_>> {
        let key = path.trim_start_matches('/');
        match self.memory.get(key) {
            Some((mime, data)) => Some(Asset {
                mime: Cow::Borrowed(mime.as_str()),
                data: Cow::Borrowed(data.as_slice()),
            }),
            None => self.read_file(key),
        }
    }

    /// Reads `relative` under the root. Anything that canonicalizes outside
    /// the root (`..`, absolute paths, symlinks) is refused.
    fn read_file(&self, relative: &str) -> Option<Asset<'static>> {
        let root = std::fs::canonicalize(&self.root).ok()?;
        let file = std::fs::canonicalize(self.root.join(relative)).ok()?;
        if !file.starts_with(&root) {
            debug!(path = relative, "asset outside content root refused");
            return None;
        }
        let data = std::fs::read(&file).ok()?;
        Some(Asset {
            mime: Cow::Borrowed(mime_for(&file)),
            data: Cow::Owned(data),
        })
    }

    /// Lossy UTF-8 contents of `path`.
    pub fn resolve_text(&self, path: &str) -> Option<String> {
        self.resolve(path).map(|asset| asset.text())
    }

    /// Answer a custom-protocol request for `uri`.
    pub fn serve(&self, uri: &str) -> Response<Cow<'static, [u8]>> {
        let path = request_path(uri);
        let Some(asset) = self.resolve(path) else {
            warn!(path, "custom protocol: asset not found");
            return response(StatusCode::NOT_FOUND, None, b"Not Found".to_vec());
        };
        let mime = asset.mime.into_owned();
        response(StatusCode::OK, Some(mime.as_str()), asset.data.into_owned())
    }

    pub fn base_dir(&self) -> &Path {
        &self.root
    }
}

fn request_path(uri: &str) -> &str {
    let rest = URI_PREFIXES
        .iter()
        .find_map(|prefix| uri.strip_prefix(prefix))
        .unwrap_or("");
    match rest.find(['?', '#']) {
        Some(end) => &rest[..end],
        None => rest,
    }
}

fn response(
    status: StatusCode,
    mime: Option<&str>,
    body: Vec<u8>,
) -> Response<Cow<'static, [u8]>> {
    let mut builder = Response::builder().status(status);
    if let Some(mime) = mime {
        builder = builder
            .header("Content-Type", mime)
            .header("Access-Control-Allow-Origin", ORIGIN);
    }
    builder.body(Cow::Owned(body)).unwrap_or_else(|e| {
        warn!(error = %e, "custom protocol: invalid response");
        let mut fallback = Response::new(Cow::Borrowed(&b""[..]));
        *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        fallback
    })
}

fn mime_for(path: &Path) -> &'static str {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return FALLBACK_MIME;
    };
    MIME_TYPES
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(ext))
        .map_or(FALLBACK_MIME, |&(_, mime)| mime)
}
