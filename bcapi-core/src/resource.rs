use reqwest::Method;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use tracing::debug;

use crate::client::{Endpoint, ResourceError, SiteClient, last_modified_header};
use crate::path::ResolvedPath;

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    File,
    Folder,
}

/// Whether the local attribute cache reflects the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Unsynced,
    Synced,
    Destroyed,
}

/// Server-populated attributes of a resource.
///
/// Fields the client does not model are preserved in `extra`.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Attributes {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ResourceKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(
        default,
        with = "crate::timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_modified: Option<OffsetDateTime>,
    /// Listing reported by the server; never sent back.
    #[serde(default, skip_serializing)]
    pub contents: Option<Vec<Entry>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One child as reported in a folder's `contents`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(
        default,
        with = "crate::timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_modified: Option<OffsetDateTime>,
}

/// A single addressable object in site storage.
#[derive(Debug, Clone)]
pub struct RemoteResource {
    client: SiteClient,
    location: ResolvedPath,
    kind: ResourceKind,
    attributes: Attributes,
    state: SyncState,
}

impl RemoteResource {
    pub fn new(client: SiteClient, location: ResolvedPath, kind: ResourceKind) -> Self {
        Self {
            client,
            location,
            kind,
            attributes: Attributes {
                kind: Some(kind),
                ..Attributes::default()
            },
            state: SyncState::Unsynced,
        }
    }

    pub fn client(&self) -> &SiteClient {
        &self.client
    }

    pub fn location(&self) -> &ResolvedPath {
        &self.location
    }

    pub fn path(&self) -> &str {
        self.location.path()
    }

    pub fn name(&self) -> &str {
        self.location.name()
    }

    pub fn folder_path(&self) -> &str {
        self.location.folder_path()
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Local edits to push with [`RemoteResource::save`]. The cache counts as
    /// unsynced from here on.
    pub fn attributes_mut(&mut self) -> &mut Attributes {
        if self.state == SyncState::Synced {
            self.state = SyncState::Unsynced;
        }
        &mut self.attributes
    }

    pub fn last_modified(&self) -> Option<OffsetDateTime> {
        self.attributes.last_modified
    }

    pub fn size(&self) -> Option<u64> {
        self.attributes.size
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn is_destroyed(&self) -> bool {
        self.state == SyncState::Destroyed
    }

    /// Reloads attributes from the metadata endpoint.
    pub async fn fetch(&mut self) -> Result<&Attributes, ResourceError> {
        self.ensure_live()?;
        let request = self
            .client
            .request(Method::GET, &self.location, Endpoint::Metadata)?;
        let response = self.client.send(request, &self.location).await?;
        let header_modified = last_modified_header(&response);
        let body = response.bytes().await?;
        let attributes: Attributes = serde_json::from_slice(&body)?;
        self.replace_attributes(attributes, header_modified);
        Ok(&self.attributes)
    }

    /// Pushes the cached attributes to the metadata endpoint. The server's
    /// answer, when it sends one, replaces the cache.
    pub async fn save(&mut self) -> Result<&Attributes, ResourceError> {
        self.ensure_live()?;
        let payload = serde_json::to_vec(&self.attributes)?;
        let request = self
            .client
            .request(Method::PUT, &self.location, Endpoint::Metadata)?
            .header(CONTENT_TYPE, "application/json")
            .body(payload);
        let response = self.client.send(request, &self.location).await?;
        let header_modified = last_modified_header(&response);
        let body = response.bytes().await?;
        if body.iter().all(u8::is_ascii_whitespace) {
            self.state = SyncState::Synced;
        } else {
            let attributes: Attributes = serde_json::from_slice(&body)?;
            self.replace_attributes(attributes, header_modified);
        }
        Ok(&self.attributes)
    }

    /// Deletes the remote object. A destroyed resource stays inert: every
    /// later operation fails with [`ResourceError::NotFound`].
    pub async fn destroy(&mut self) -> Result<(), ResourceError> {
        if self.location.is_root() {
            return Err(ResourceError::RootImmutable);
        }
        self.ensure_live()?;
        let request = self
            .client
            .request(Method::DELETE, &self.location, Endpoint::Metadata)?;
        self.client.send(request, &self.location).await?;
        debug!(path = self.path(), "resource destroyed");
        self.state = SyncState::Destroyed;
        Ok(())
    }

    pub(crate) fn ensure_live(&self) -> Result<(), ResourceError> {
        if self.is_destroyed() {
            return Err(ResourceError::NotFound {
                path: self.path().to_string(),
            });
        }
        Ok(())
    }

    /// Remote content changed; cached attributes are stale until refetched.
    pub(crate) fn mark_written(&mut self) {
        self.state = SyncState::Unsynced;
    }

    fn replace_attributes(
        &mut self,
        mut attributes: Attributes,
        header_modified: Option<OffsetDateTime>,
    ) {
        attributes.kind.get_or_insert(self.kind);
        if attributes.last_modified.is_none() {
            attributes.last_modified = header_modified;
        }
        self.attributes = attributes;
        self.state = SyncState::Synced;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    #[test]
    fn attributes_keep_unknown_fields() {
        let attributes: Attributes = serde_json::from_value(json!({
            "type": "file",
            "size": 12,
            "lastModified": "2024-01-01T00:00:00Z",
            "name": "a.txt",
            "etag": "abc"
        }))
        .unwrap();

        assert_eq!(attributes.kind, Some(ResourceKind::File));
        assert_eq!(attributes.size, Some(12));
        assert_eq!(
            attributes.last_modified,
            Some(datetime!(2024-01-01 00:00:00 UTC))
        );
        assert_eq!(attributes.extra["etag"], "abc");
        assert_eq!(attributes.extra["name"], "a.txt");
    }

    #[test]
    fn attributes_serialize_camel_case() {
        let attributes = Attributes {
            kind: Some(ResourceKind::Folder),
            last_modified: Some(datetime!(2024-01-01 00:00:00 UTC)),
            ..Attributes::default()
        };
        let value = serde_json::to_value(&attributes).unwrap();
        assert_eq!(
            value,
            json!({ "type": "folder", "lastModified": "2024-01-01T00:00:00Z" })
        );
    }

    #[test]
    fn folder_listing_is_not_serialized() {
        let attributes: Attributes = serde_json::from_value(json!({
            "type": "folder",
            "contents": [{ "name": "a.txt", "type": "file" }]
        }))
        .unwrap();
        assert_eq!(attributes.contents.as_ref().map(Vec::len), Some(1));

        let value = serde_json::to_value(&attributes).unwrap();
        assert_eq!(value, json!({ "type": "folder" }));
    }

    #[test]
    fn new_resource_is_unsynced_and_typed() {
        let client = SiteClient::with_origin("http://localhost", Default::default()).unwrap();
        let resource =
            RemoteResource::new(client, ResolvedPath::new("/a.txt"), ResourceKind::File);
        assert_eq!(resource.state(), SyncState::Unsynced);
        assert_eq!(resource.attributes().kind, Some(ResourceKind::File));
        assert_eq!(resource.last_modified(), None);
        assert_eq!(resource.size(), None);
    }
}
