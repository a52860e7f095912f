//! Client-side model of a site's remote file storage: files and folders
//! addressed by canonical path, with fetch/save/destroy on their metadata and
//! upload/download on their content.

mod client;
mod file;
mod folder;
mod path;
mod resource;
mod site;
mod timestamp;

pub use client::{ApiErrorClass, Endpoint, ResourceError, SiteClient, SiteConfig};
pub use file::FileResource;
pub use folder::{Child, FolderResource, RootFolder};
pub use path::{PathError, PathSource, ROOT_PATH, ResolvedPath, resolve_path};
pub use resource::{Attributes, Entry, RemoteResource, ResourceKind, SyncState};
pub use site::{
    CURRENT_SITE_ID, EnvTokenStore, GENERIC_TOKEN_KEY, MemoryTokenStore, SITE_TOKEN_KEY,
    SiteError, SiteHelper, TokenStore,
};
