use std::sync::Arc;

use reqwest::header::{AUTHORIZATION, LAST_MODIFIED};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, warn};
use url::Url;

use crate::path::{PathError, ResolvedPath};
use crate::site::{EnvTokenStore, SiteError, SiteHelper};

const DEFAULT_ORIGIN: &str = "http://localhost";
const STORAGE_PREFIX: &str = "api/v2/admin/sites";
const METADATA_QUERY: &str = "meta";

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("resource {path} was not found")]
    NotFound { path: String },
    #[error("authentication is not configured: {0}")]
    Auth(#[from] SiteError),
    #[error("api returned {status} {status_text}: {payload}")]
    Transport {
        status: StatusCode,
        status_text: String,
        payload: String,
    },
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("invalid path: {0}")]
    Path(#[from] PathError),
    #[error("malformed metadata: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("content is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("the root folder cannot be destroyed")]
    RootImmutable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorClass {
    Auth,
    RateLimit,
    Transient,
    Permanent,
}

impl ResourceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ResourceError::NotFound { .. })
    }

    /// Coarse class of a server-side failure. `None` for local errors.
    pub fn classification(&self) -> Option<ApiErrorClass> {
        match self {
            ResourceError::Transport { status, .. } => Some(classify_api_status(*status)),
            ResourceError::NotFound { .. } => Some(ApiErrorClass::Permanent),
            _ => None,
        }
    }
}

fn classify_api_status(status: StatusCode) -> ApiErrorClass {
    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        ApiErrorClass::Auth
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        ApiErrorClass::RateLimit
    } else if status.is_server_error()
        || matches!(
            status,
            StatusCode::REQUEST_TIMEOUT | StatusCode::CONFLICT | StatusCode::TOO_EARLY
        )
    {
        ApiErrorClass::Transient
    } else {
        ApiErrorClass::Permanent
    }
}

/// The two representations of one stored resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// JSON attribute document (`?meta`).
    Metadata,
    /// Raw bytes.
    Content,
}

#[derive(Clone, Debug)]
pub struct SiteConfig {
    pub origin: String,
    pub root_url: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.to_string(),
            root_url: String::new(),
        }
    }
}

impl SiteConfig {
    /// Reads `BCAPI_ORIGIN` and `BCAPI_ROOT_URL`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            origin: read_env("BCAPI_ORIGIN").unwrap_or(defaults.origin),
            root_url: read_env("BCAPI_ROOT_URL").unwrap_or(defaults.root_url),
        }
    }
}

fn read_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// HTTP access to a site's storage API.
///
/// Cheap to clone; every resource keeps its own handle.
#[derive(Clone, Debug)]
pub struct SiteClient {
    http: Client,
    origin: Url,
    helper: SiteHelper,
}

impl SiteClient {
    pub fn new(config: SiteConfig, helper: SiteHelper) -> Result<Self, ResourceError> {
        let helper = helper.with_root_url(config.root_url);
        Self::with_origin(&config.origin, helper)
    }

    pub fn with_origin(origin: &str, helper: SiteHelper) -> Result<Self, ResourceError> {
        Ok(Self {
            http: Client::new(),
            origin: Url::parse(origin)?,
            helper,
        })
    }

    /// Client configured from the environment, with tokens read from
    /// `BCAPI_SITE_TOKEN` / `BCAPI_GENERIC_TOKEN`.
    pub fn from_env() -> Result<Self, ResourceError> {
        let helper = SiteHelper::new().with_token_store(Arc::new(EnvTokenStore));
        Self::new(SiteConfig::from_env(), helper)
    }

    pub fn helper(&self) -> &SiteHelper {
        &self.helper
    }

    /// Base URL under which every stored resource lives.
    pub fn storage_url(&self) -> Result<Url, ResourceError> {
        let root = self.helper.root_url().trim_end_matches('/');
        let prefix = format!(
            "{root}/{STORAGE_PREFIX}/{}/storage",
            self.helper.site_id()
        );
        Ok(self.origin.join(&prefix)?)
    }

    /// URL of `path` in the given representation. Dot segments are rejected:
    /// the URL writer would collapse them and address a different resource.
    pub fn endpoint(&self, path: &str, endpoint: Endpoint) -> Result<Url, ResourceError> {
        let relative = path.strip_prefix('/').unwrap_or(path);
        if relative.split('/').any(|segment| matches!(segment, "." | "..")) {
            return Err(PathError::DotSegment(path.to_string()).into());
        }
        let mut url = self.storage_url()?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?;
            segments.extend(relative.split('/'));
        }
        if endpoint == Endpoint::Metadata {
            url.set_query(Some(METADATA_QUERY));
        }
        Ok(url)
    }

    /// Builds an authenticated request. Fails before touching the network
    /// when no site token can be obtained.
    pub(crate) fn request(
        &self,
        method: Method,
        location: &ResolvedPath,
        endpoint: Endpoint,
    ) -> Result<RequestBuilder, ResourceError> {
        let token = self.helper.site_token()?;
        let url = self.endpoint(location.path(), endpoint)?;
        Ok(self.http.request(method, url).header(AUTHORIZATION, token))
    }

    pub(crate) async fn send(
        &self,
        request: RequestBuilder,
        location: &ResolvedPath,
    ) -> Result<Response, ResourceError> {
        let request = request.build()?;
        let method = request.method().clone();
        debug!(%method, url = %request.url(), path = location.path(), "storage request");
        let response = self.http.execute(request).await?;
        Self::check_status(response, location, &method).await
    }

    async fn check_status(
        response: Response,
        location: &ResolvedPath,
        method: &Method,
    ) -> Result<Response, ResourceError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            debug!(%method, path = location.path(), "resource not found");
            return Err(ResourceError::NotFound {
                path: location.path().to_string(),
            });
        }
        let status_text = status.canonical_reason().unwrap_or_default().to_string();
        let payload = response.text().await.unwrap_or_default();
        warn!(%method, path = location.path(), %status, "storage request failed");
        Err(ResourceError::Transport {
            status,
            status_text,
            payload,
        })
    }
}

pub(crate) fn last_modified_header(response: &Response) -> Option<OffsetDateTime> {
    let raw = response.headers().get(LAST_MODIFIED)?.to_str().ok()?;
    httpdate::parse_http_date(raw).ok().map(OffsetDateTime::from)
}
