use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Body, Method, Response};
use time::OffsetDateTime;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::client::{Endpoint, ResourceError, SiteClient};
use crate::folder::FolderResource;
use crate::path::{PathError, PathSource, ResolvedPath, resolve_path};
use crate::resource::{Attributes, RemoteResource, ResourceKind, SyncState};

const OCTET_STREAM: &str = "application/octet-stream";

/// A stored file: JSON metadata plus raw content.
#[derive(Debug, Clone)]
pub struct FileResource {
    resource: RemoteResource,
}

impl FileResource {
    pub fn new(
        client: &SiteClient,
        source: PathSource<'_>,
        name: Option<&str>,
    ) -> Result<Self, PathError> {
        let location = resolve_path(source, name)?;
        Ok(Self::at(client, location))
    }

    pub fn from_path(client: &SiteClient, path: &str) -> Self {
        Self::at(client, ResolvedPath::new(path))
    }

    pub fn in_folder(folder: &FolderResource, name: &str) -> Result<Self, PathError> {
        Self::new(folder.client(), folder.location().into(), Some(name))
    }

    pub(crate) fn at(client: &SiteClient, location: ResolvedPath) -> Self {
        Self {
            resource: RemoteResource::new(client.clone(), location, ResourceKind::File),
        }
    }

    pub fn as_resource(&self) -> &RemoteResource {
        &self.resource
    }

    pub fn as_resource_mut(&mut self) -> &mut RemoteResource {
        &mut self.resource
    }

    pub fn location(&self) -> &ResolvedPath {
        self.resource.location()
    }

    pub fn path(&self) -> &str {
        self.resource.path()
    }

    pub fn name(&self) -> &str {
        self.resource.name()
    }

    pub fn folder_path(&self) -> &str {
        self.resource.folder_path()
    }

    pub fn kind(&self) -> ResourceKind {
        self.resource.kind()
    }

    pub fn attributes(&self) -> &Attributes {
        self.resource.attributes()
    }

    pub fn last_modified(&self) -> Option<OffsetDateTime> {
        self.resource.last_modified()
    }

    pub fn size(&self) -> Option<u64> {
        self.resource.size()
    }

    pub fn state(&self) -> SyncState {
        self.resource.state()
    }

    pub async fn fetch(&mut self) -> Result<&Attributes, ResourceError> {
        self.resource.fetch().await
    }

    pub async fn save(&mut self) -> Result<&Attributes, ResourceError> {
        self.resource.save().await
    }

    pub async fn destroy(&mut self) -> Result<(), ResourceError> {
        self.resource.destroy().await
    }

    /// Replaces the stored bytes with `content`, sent unmodified.
    ///
    /// Cached attributes are stale afterwards; see
    /// [`FileResource::upload_and_fetch`].
    pub async fn upload(&mut self, content: impl Into<Body>) -> Result<(), ResourceError> {
        self.resource.ensure_live()?;
        let request = self
            .client()
            .request(Method::PUT, self.location(), Endpoint::Content)?
            .header(CONTENT_TYPE, OCTET_STREAM)
            .body(content);
        self.client().send(request, self.location()).await?;
        debug!(path = self.path(), "content uploaded");
        self.resource.mark_written();
        Ok(())
    }

    /// Uploads, then refreshes attributes. A failed fetch fails the whole
    /// call even though the new content is already stored.
    pub async fn upload_and_fetch(
        &mut self,
        content: impl Into<Body>,
    ) -> Result<&Attributes, ResourceError> {
        self.upload(content).await?;
        self.fetch().await
    }

    /// Streams a local file as the new content.
    pub async fn upload_from_path(&mut self, source: &Path) -> Result<(), ResourceError> {
        self.resource.ensure_live()?;
        let file = tokio::fs::File::open(source).await?;
        let body = Body::wrap_stream(ReaderStream::new(file));
        self.upload(body).await
    }

    /// Current stored bytes, always read from the server.
    pub async fn download(&self) -> Result<Vec<u8>, ResourceError> {
        self.resource.ensure_live()?;
        let request = self
            .client()
            .request(Method::GET, self.location(), Endpoint::Content)?;
        let response = self.client().send(request, self.location()).await?;
        Ok(response.bytes().await?.to_vec())
    }

    pub async fn download_text(&self) -> Result<String, ResourceError> {
        let bytes = self.download().await?;
        Ok(String::from_utf8(bytes)?)
    }

    /// Streams content into `target`. Data lands in a `.partial` sibling that
    /// is renamed once complete.
    pub async fn download_to_path(&self, target: &Path) -> Result<(), ResourceError> {
        self.resource.ensure_live()?;
        let request = self
            .client()
            .request(Method::GET, self.location(), Endpoint::Content)?;
        let response = self.client().send(request, self.location()).await?;

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let partial = partial_path(target);
        let written = async {
            write_stream(response, &partial).await?;
            tokio::fs::rename(&partial, target).await?;
            Ok::<(), ResourceError>(())
        }
        .await;
        if written.is_err() {
            let _ = tokio::fs::remove_file(&partial).await;
        }
        written
    }

    fn client(&self) -> &SiteClient {
        self.resource.client()
    }
}

async fn write_stream(response: Response, partial: &Path) -> Result<(), ResourceError> {
    let mut file = tokio::fs::File::create(partial).await?;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        file.write_all(&chunk?).await?;
    }
    file.flush().await?;
    file.sync_all().await?;
    Ok(())
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    target.with_file_name(name)
}
