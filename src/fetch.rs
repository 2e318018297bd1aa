use std::fs::{self, File};
use std::io;
use std::thread;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use reqwest::blocking::Client;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use url::Url;

use crate::domain::MediaKind;
use crate::error::MementoError;

pub const TLS_RETRY_ATTEMPTS: usize = 3;
const TLS_RETRY_DELAY: Duration = Duration::from_secs(60);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Suffix of the in-flight temporary file. Only a complete, successful
/// transfer is renamed to the final artifact name.
const TEMP_SUFFIX: &str = "download";

#[derive(Debug, Clone)]
pub struct DownloadedAsset {
    pub path: Utf8PathBuf,
    pub content_type: Option<String>,
}

pub trait AssetFetcher: Send + Sync {
    /// Downloads `url` into the directory of `dest_stem`, resolving the real
    /// extension after the transfer. `dest_stem` carries no extension.
    fn fetch(
        &self,
        url: &str,
        dest_stem: &Utf8Path,
        kind: MediaKind,
    ) -> Result<DownloadedAsset, MementoError>;
}

#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    retry_delay: Duration,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, MementoError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("memento/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| MementoError::Filesystem(err.to_string()))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| MementoError::Transport {
                url: String::new(),
                message: err.to_string(),
            })?;

        Ok(Self {
            client,
            retry_delay: TLS_RETRY_DELAY,
        })
    }

    fn download_once(&self, url: &str, tmp_path: &Utf8Path) -> Result<Option<String>, AttemptError> {
        let mut response = self.client.get(url).send().map_err(|err| {
            if is_tls_error(&err) {
                AttemptError::Tls(err.to_string())
            } else {
                AttemptError::Fatal(MementoError::Transport {
                    url: url.to_string(),
                    message: err.to_string(),
                })
            }
        })?;

        if !response.status().is_success() {
            return Err(AttemptError::Fatal(MementoError::HttpStatus {
                status: response.status().as_u16(),
                url: url.to_string(),
            }));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let mut file = File::create(tmp_path.as_std_path())
            .map_err(|err| AttemptError::Fatal(MementoError::Filesystem(err.to_string())))?;
        io::copy(&mut response, &mut file).map_err(|err| {
            AttemptError::Fatal(MementoError::Transport {
                url: url.to_string(),
                message: err.to_string(),
            })
        })?;

        Ok(content_type)
    }
}

impl AssetFetcher for HttpFetcher {
    fn fetch(
        &self,
        url: &str,
        dest_stem: &Utf8Path,
        kind: MediaKind,
    ) -> Result<DownloadedAsset, MementoError> {
        if let Some(parent) = dest_stem.parent() {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| MementoError::Filesystem(err.to_string()))?;
        }
        let tmp_path = Utf8PathBuf::from(format!("{dest_stem}.{TEMP_SUFFIX}"));

        let content_type = run_with_tls_retries(TLS_RETRY_ATTEMPTS, self.retry_delay, || {
            self.download_once(url, &tmp_path)
        })
        .inspect_err(|_| {
            let _ = fs::remove_file(tmp_path.as_std_path());
        })?;

        let final_path = resolve_final_path(dest_stem, url, content_type.as_deref(), kind);
        fs::rename(tmp_path.as_std_path(), final_path.as_std_path())
            .map_err(|err| MementoError::Filesystem(err.to_string()))?;

        Ok(DownloadedAsset {
            path: final_path,
            content_type,
        })
    }
}

pub(crate) enum AttemptError {
    /// TLS/handshake class, worth waiting out. Everything else is final.
    Tls(String),
    Fatal(MementoError),
}

/// Runs `op` up to `attempts` times total, sleeping `delay` between attempts,
/// but only for the TLS failure class. Exhaustion converts into
/// [`MementoError::TlsExhausted`], which the pipeline treats as fatal for the
/// whole run.
pub(crate) fn run_with_tls_retries<T>(
    attempts: usize,
    delay: Duration,
    mut op: impl FnMut() -> Result<T, AttemptError>,
) -> Result<T, MementoError> {
    let mut attempt = 1usize;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(AttemptError::Fatal(err)) => return Err(err),
            Err(AttemptError::Tls(message)) => {
                if attempt >= attempts {
                    return Err(MementoError::TlsExhausted { attempts, message });
                }
                tracing::warn!(attempt, "TLS handshake failed, retrying: {message}");
                thread::sleep(delay);
                attempt += 1;
            }
        }
    }
}

/// Extension resolution order: declared content-type (with explicit fixups
/// for `video/mp4` and `image/jpeg`, where the generic MIME tables pick
/// unhelpful suffixes), then the URL path's own suffix, then unknown.
pub fn resolve_extension(url: &str, content_type: Option<&str>) -> Option<String> {
    if let Some(value) = content_type {
        let essence = value
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase();
        match essence.as_str() {
            "video/mp4" => return Some("mp4".to_string()),
            "image/jpeg" => return Some("jpg".to_string()),
            _ => {}
        }
        if let Some(ext) = mime_guess::get_mime_extensions_str(&essence)
            .and_then(|extensions| extensions.first())
        {
            return Some((*ext).to_string());
        }
    }

    let parsed = Url::parse(url).ok()?;
    std::path::Path::new(parsed.path())
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_string())
}

fn resolve_final_path(
    dest_stem: &Utf8Path,
    url: &str,
    content_type: Option<&str>,
    kind: MediaKind,
) -> Utf8PathBuf {
    match resolve_extension(url, content_type) {
        Some(ext) => Utf8PathBuf::from(format!("{dest_stem}.{ext}")),
        // Unlabeled images in this export are almost always JPEG.
        None if kind == MediaKind::Image => Utf8PathBuf::from(format!("{dest_stem}.jpg")),
        None => dest_stem.to_path_buf(),
    }
}

fn is_tls_error(err: &reqwest::Error) -> bool {
    // reqwest exposes no TLS error class; rustls handshake failures surface
    // as connect errors whose source chain names the TLS layer.
    if !err.is_connect() {
        return false;
    }
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        let text = inner.to_string().to_lowercase();
        if text.contains("tls") || text.contains("handshake") || text.contains("certificate") {
            return true;
        }
        source = inner.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn retries_tls_then_succeeds() {
        let calls = Mutex::new(0usize);
        let result = run_with_tls_retries(3, Duration::ZERO, || {
            let mut guard = calls.lock().unwrap();
            *guard += 1;
            if *guard < 3 {
                Err(AttemptError::Tls("handshake failure".to_string()))
            } else {
                Ok(42)
            }
        });
        assert_eq!(result.unwrap(), 42);
        assert_eq!(*calls.lock().unwrap(), 3);
    }

    #[test]
    fn tls_exhaustion_after_three_attempts() {
        let calls = Mutex::new(0usize);
        let result: Result<(), _> = run_with_tls_retries(3, Duration::ZERO, || {
            *calls.lock().unwrap() += 1;
            Err(AttemptError::Tls("handshake failure".to_string()))
        });
        assert_matches!(
            result.unwrap_err(),
            MementoError::TlsExhausted { attempts: 3, .. }
        );
        assert_eq!(*calls.lock().unwrap(), 3);
    }

    #[test]
    fn http_errors_are_not_retried() {
        let calls = Mutex::new(0usize);
        let result: Result<(), _> = run_with_tls_retries(3, Duration::ZERO, || {
            *calls.lock().unwrap() += 1;
            Err(AttemptError::Fatal(MementoError::HttpStatus {
                status: 404,
                url: "https://cdn.example/a".to_string(),
            }))
        });
        assert_matches!(result.unwrap_err(), MementoError::HttpStatus { status: 404, .. });
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[test]
    fn content_type_overrides_win() {
        assert_eq!(
            resolve_extension("https://cdn.example/a", Some("video/mp4")).as_deref(),
            Some("mp4")
        );
        assert_eq!(
            resolve_extension("https://cdn.example/a", Some("image/jpeg; charset=binary"))
                .as_deref(),
            Some("jpg")
        );
    }

    #[test]
    fn content_type_generic_mapping() {
        assert_eq!(
            resolve_extension("https://cdn.example/a", Some("image/png")).as_deref(),
            Some("png")
        );
    }

    #[test]
    fn url_suffix_fallback() {
        assert_eq!(
            resolve_extension("https://cdn.example/clip.heic?sig=abc", None).as_deref(),
            Some("heic")
        );
    }

    #[test]
    fn unknown_extension() {
        assert_eq!(resolve_extension("https://cdn.example/blob", None), None);
    }

    #[test]
    fn unknown_image_defaults_to_jpg() {
        let stem = Utf8Path::new("/out/7_stamp");
        let path = resolve_final_path(stem, "https://cdn.example/blob", None, MediaKind::Image);
        assert_eq!(path, Utf8PathBuf::from("/out/7_stamp.jpg"));
        let path = resolve_final_path(stem, "https://cdn.example/blob", None, MediaKind::Video);
        assert_eq!(path, Utf8PathBuf::from("/out/7_stamp"));
    }
}
