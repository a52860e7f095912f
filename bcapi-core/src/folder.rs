use reqwest::Method;
use reqwest::header::CONTENT_TYPE;
use serde_json::json;
use time::OffsetDateTime;
use tracing::debug;

use crate::client::{Endpoint, ResourceError, SiteClient};
use crate::file::FileResource;
use crate::path::{PathError, PathSource, ResolvedPath, resolve_path};
use crate::resource::{Attributes, Entry, RemoteResource, ResourceKind, SyncState};

#[derive(Debug, Clone)]
pub struct FolderResource {
    resource: RemoteResource,
}

/// A child materialized from a folder listing.
#[derive(Debug, Clone)]
pub enum Child {
    File(FileResource),
    Folder(FolderResource),
}

impl Child {
    pub fn path(&self) -> &str {
        match self {
            Child::File(file) => file.path(),
            Child::Folder(folder) => folder.path(),
        }
    }
}

impl FolderResource {
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

    pub fn in_folder(parent: &FolderResource, name: &str) -> Result<Self, PathError> {
        Self::new(parent.client(), parent.location().into(), Some(name))
    }

    fn at(client: &SiteClient, location: ResolvedPath) -> Self {
        Self {
            resource: RemoteResource::new(client.clone(), location, ResourceKind::Folder),
        }
    }

    pub fn as_resource(&self) -> &RemoteResource {
        &self.resource
    }

    pub fn as_resource_mut(&mut self) -> &mut RemoteResource {
        &mut self.resource
    }

    pub fn client(&self) -> &SiteClient {
        self.resource.client()
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

    pub fn state(&self) -> SyncState {
        self.resource.state()
    }

    /// Local handle for the file `name` inside this folder. No request is
    /// made.
    pub fn file(&self, name: &str) -> Result<FileResource, PathError> {
        FileResource::in_folder(self, name)
    }

    pub fn folder(&self, name: &str) -> Result<FolderResource, PathError> {
        FolderResource::in_folder(self, name)
    }

    /// The folder's own attributes; children are only reported through
    /// [`FolderResource::list`].
    pub async fn fetch(&mut self) -> Result<&Attributes, ResourceError> {
        self.resource.fetch().await
    }

    pub async fn save(&mut self) -> Result<&Attributes, ResourceError> {
        self.resource.save().await
    }

    pub async fn destroy(&mut self) -> Result<(), ResourceError> {
        self.resource.destroy().await
    }

    /// Creates the folder on the server.
    pub async fn create(&mut self) -> Result<(), ResourceError> {
        self.resource.ensure_live()?;
        let payload = serde_json::to_vec(&json!({ "type": ResourceKind::Folder }))?;
        let request = self
            .client()
            .request(Method::PUT, self.location(), Endpoint::Metadata)?
            .header(CONTENT_TYPE, "application/json")
            .body(payload);
        self.client().send(request, self.location()).await?;
        debug!(path = self.path(), "folder created");
        self.resource.mark_written();
        Ok(())
    }

    /// Refreshes the folder and returns the entries it reports.
    pub async fn list(&mut self) -> Result<Vec<Entry>, ResourceError> {
        let attributes = self.resource.fetch().await?;
        Ok(attributes.contents.clone().unwrap_or_default())
    }

    /// Like [`FolderResource::list`], with every entry turned into a resource
    /// handle.
    pub async fn children(&mut self) -> Result<Vec<Child>, ResourceError> {
        let entries = self.list().await?;
        entries
            .iter()
            .map(|entry| {
                let child = match entry.kind {
                    ResourceKind::File => Child::File(self.file(&entry.name)?),
                    ResourceKind::Folder => Child::Folder(self.folder(&entry.name)?),
                };
                Ok::<_, ResourceError>(child)
            })
            .collect()
    }
}

/// The folder at `/`. Cannot be destroyed.
#[derive(Debug, Clone)]
pub struct RootFolder {
    folder: FolderResource,
}

impl RootFolder {
    pub fn new(client: &SiteClient) -> Self {
        Self {
            folder: FolderResource::at(client, ResolvedPath::root()),
        }
    }

    pub fn as_folder(&self) -> &FolderResource {
        &self.folder
    }

    pub fn path(&self) -> &str {
        self.folder.path()
    }

    pub fn attributes(&self) -> &Attributes {
        self.folder.attributes()
    }

    pub fn file(&self, name: &str) -> Result<FileResource, PathError> {
        self.folder.file(name)
    }

    pub fn folder(&self, name: &str) -> Result<FolderResource, PathError> {
        self.folder.folder(name)
    }

    pub async fn fetch(&mut self) -> Result<&Attributes, ResourceError> {
        self.folder.fetch().await
    }

    pub async fn list(&mut self) -> Result<Vec<Entry>, ResourceError> {
        self.folder.list().await
    }

    pub async fn children(&mut self) -> Result<Vec<Child>, ResourceError> {
        self.folder.children().await
    }
}
