//! Source/destination path strings
//!
//! Operation profiles persist paths as single strings in backend notation:
//! `remote:path` for a remote, anything else for the local filesystem. The
//! editor works with a [`PathDescriptor`] that says which remote the path is
//! relative to, so the current remote can be renamed without rewriting every
//! profile by hand.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

const OTHER_REMOTE_PREFIX: &str = "otherRemote:";

/// What a path is relative to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum PathType {
    #[default]
    Local,
    CurrentRemote,
    OtherRemote(String),
}

impl fmt::Display for PathType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathType::Local => write!(f, "local"),
            PathType::CurrentRemote => write!(f, "currentRemote"),
            PathType::OtherRemote(name) => write!(f, "{}{}", OTHER_REMOTE_PREFIX, name),
        }
    }
}

impl FromStr for PathType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(PathType::Local),
            "currentRemote" => Ok(PathType::CurrentRemote),
            other => match other.strip_prefix(OTHER_REMOTE_PREFIX) {
                Some(name) if !name.is_empty() => Ok(PathType::OtherRemote(name.to_string())),
                _ => Err(format!("unknown path type: {}", s)),
            },
        }
    }
}

impl Serialize for PathType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for PathType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathDescriptor {
    pub path_type: PathType,
    pub path: String,
}

impl PathDescriptor {
    pub fn local(path: impl Into<String>) -> Self {
        Self {
            path_type: PathType::Local,
            path: path.into(),
        }
    }

    pub fn current_remote(path: impl Into<String>) -> Self {
        Self {
            path_type: PathType::CurrentRemote,
            path: path.into(),
        }
    }

    pub fn other_remote(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            path_type: PathType::OtherRemote(name.into()),
            path: path.into(),
        }
    }

    pub fn other_remote_name(&self) -> Option<&str> {
        match &self.path_type {
            PathType::OtherRemote(name) => Some(name),
            _ => None,
        }
    }
}

fn is_local_root(path: &str) -> bool {
    if path.starts_with('/') || path.starts_with('~') || path.starts_with('\\') {
        return true;
    }
    // Windows drive letter, e.g. C:\ or D:/
    let bytes = path.as_bytes();
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'\\' || bytes[2] == b'/')
}

/// Split `name:path`, provided the colon comes before any path separator
fn split_remote(path: &str) -> Option<(&str, &str)> {
    let colon = path.find(':')?;
    let separator = path.find(|c| c == '/' || c == '\\');
    if matches!(separator, Some(sep) if sep < colon) {
        return None;
    }
    let (name, rest) = (&path[..colon], &path[colon + 1..]);
    if name.is_empty() {
        return None;
    }
    Some((name, rest))
}

/// Decode a backend path string.
///
/// A remote prefix that is not the current remote is kept as
/// `otherRemote:<name>` whether or not that remote is known, so that
/// [`build`] reproduces the input exactly. `default_type` applies only to an
/// empty string.
pub fn parse(full_path: &str, default_type: &PathType, current_remote: &str) -> PathDescriptor {
    if full_path.is_empty() {
        return PathDescriptor {
            path_type: default_type.clone(),
            path: String::new(),
        };
    }
    if is_local_root(full_path) {
        return PathDescriptor::local(full_path);
    }
    match split_remote(full_path) {
        None => PathDescriptor::local(full_path),
        Some((name, rest)) if !current_remote.is_empty() && name == current_remote => {
            PathDescriptor::current_remote(rest)
        }
        Some((name, rest)) => PathDescriptor::other_remote(name, rest),
    }
}

/// Encode a descriptor into a backend path string
pub fn build(descriptor: &PathDescriptor, current_remote: &str) -> String {
    match &descriptor.path_type {
        PathType::Local => descriptor.path.clone(),
        PathType::CurrentRemote => format!("{}:{}", current_remote, descriptor.path),
        PathType::OtherRemote(name) => format!("{}:{}", name, descriptor.path),
    }
}
