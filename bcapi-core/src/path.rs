use thiserror::Error;

pub const ROOT_PATH: &str = "/";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("a child of {parent} requires a name")]
    MissingName { parent: String },
    #[error("resource name {0:?} must not contain '/'")]
    InvalidName(String),
    #[error("path {0:?} contains a '.' or '..' segment")]
    DotSegment(String),
}

/// Where a resource's location comes from: a literal path string or the
/// resolved location of a parent folder.
#[derive(Debug, Clone, Copy)]
pub enum PathSource<'a> {
    Literal(&'a str),
    Parent(&'a ResolvedPath),
}

impl<'a> From<&'a str> for PathSource<'a> {
    fn from(value: &'a str) -> Self {
        PathSource::Literal(value)
    }
}

impl<'a> From<&'a ResolvedPath> for PathSource<'a> {
    fn from(value: &'a ResolvedPath) -> Self {
        PathSource::Parent(value)
    }
}

/// Canonical location of a remote resource.
///
/// `path` is always absolute. `name` is the leaf segment and `folder_path`
/// everything before it, with `/` standing in for an empty prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedPath {
    path: String,
    name: String,
    folder_path: String,
}

impl ResolvedPath {
    /// Location of a literal path, with the leading slash added when missing.
    pub fn new(raw: &str) -> Self {
        Self::from_absolute(absolute(raw))
    }

    pub fn root() -> Self {
        Self::from_absolute(ROOT_PATH.to_string())
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn folder_path(&self) -> &str {
        &self.folder_path
    }

    pub fn is_root(&self) -> bool {
        self.path == ROOT_PATH
    }

    /// Location of a direct child named `name`.
    pub fn child(&self, name: &str) -> Result<Self, PathError> {
        resolve_path(PathSource::Parent(self), Some(name))
    }

    fn from_absolute(path: String) -> Self {
        // `path` always contains at least the leading slash.
        let split = path.rfind('/').unwrap_or(0);
        let name = path[split + 1..].to_string();
        let folder_path = if split == 0 {
            ROOT_PATH.to_string()
        } else {
            path[..split].to_string()
        };
        Self {
            path,
            name,
            folder_path,
        }
    }
}

/// Resolves a resource location.
///
/// An explicit `name` is always appended as the leaf, so a literal path plus a
/// name addresses a child of that literal. Paths are kept verbatim apart from
/// the leading slash: repeated slashes and dot segments are not interpreted.
pub fn resolve_path(source: PathSource<'_>, name: Option<&str>) -> Result<ResolvedPath, PathError> {
    if let Some(name) = name
        && name.contains('/')
    {
        return Err(PathError::InvalidName(name.to_string()));
    }

    let base = match source {
        PathSource::Literal(raw) => absolute(raw),
        PathSource::Parent(parent) => {
            if name.is_none() {
                return Err(PathError::MissingName {
                    parent: parent.path.clone(),
                });
            }
            parent.path.clone()
        }
    };

    let full = match name {
        Some(name) => join(&base, name),
        None => base,
    };
    Ok(ResolvedPath::from_absolute(full))
}

fn absolute(raw: &str) -> String {
    if raw.starts_with('/') {
        raw.to_string()
    } else {
        format!("/{raw}")
    }
}

fn join(folder: &str, name: &str) -> String {
    if folder == ROOT_PATH {
        format!("/{name}")
    } else {
        format!("{folder}/{name}")
    }
}
