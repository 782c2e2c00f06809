//! Remote path model and name validation.
//!
//! A [`Path`] is an immutable value: a name, an owning parent chain and an
//! [`EntryType`]. Two paths are equal when their chains of names and types
//! are equal; any [`Attributes`] snapshot carried along is ignored.

use crate::attributes::Attributes;
use crate::error::{ErrorKind, Result};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Separator between path components in absolute paths and object keys.
pub const DELIMITER: char = '/';

/// What kind of entry a [`Path`] points to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntryType {
    File,
    Directory,
    /// Top-level container (bucket, drive, room).
    Volume,
    /// Directory represented remotely by a zero-byte marker object.
    Placeholder,
    Symlink,
}
impl EntryType {
    pub fn is_directory(self) -> bool {
        matches!(self, Self::Directory | Self::Volume | Self::Placeholder)
    }
}

#[derive(Clone, Debug)]
pub struct Path {
    parent: Option<Arc<Path>>,
    name: String,
    kind: EntryType,
    attributes: Attributes,
}

impl Path {
    /// The root of a remote hierarchy. Has no name and no parent.
    pub fn root() -> Self {
        Self {
            parent: None,
            name: String::new(),
            kind: EntryType::Directory,
            attributes: Attributes::EMPTY,
        }
    }

    /// Create a child entry of `parent`.
    ///
    /// Returns [`InvalidPath`](ErrorKind::InvalidPath) if `name` is not a
    /// valid single path component (see [`validate_name`]).
    pub fn new(parent: &Path, name: impl Into<String>, kind: EntryType) -> Result<Self> {
        let name = validate_name(name)?;
        Ok(Self {
            parent: Some(Arc::new(parent.clone())),
            name,
            kind,
            attributes: Attributes::EMPTY,
        })
    }

    /// Create a top-level container directly below the root.
    pub fn volume(name: impl Into<String>) -> Result<Self> {
        Self::new(&Self::root(), name, EntryType::Volume)
    }

    /// Parse an absolute, container-addressed path such as
    /// `/bucket/folder/file.txt`.
    ///
    /// The first component becomes a [`Volume`](EntryType::Volume), any
    /// intermediate components become [`Directory`](EntryType::Directory)
    /// entries and the last component gets `kind`. A single component is
    /// only treated as a volume when `kind` is a directory type.
    ///
    /// ```
    /// use stratus_storage::{EntryType, Path};
    ///
    /// let file = Path::parse("/bucket/a/../b/./file.txt", EntryType::File).unwrap();
    /// assert_eq!(file.absolute(), "/bucket/b/file.txt");
    /// assert!(file.container().unwrap().is_volume());
    /// // Never leaves the root.
    /// assert!(Path::parse("/bucket/../../etc", EntryType::File).is_err());
    /// ```
    pub fn parse(absolute: &str, kind: EntryType) -> Result<Self> {
        let mut components: Vec<&str> = Vec::new();
        for component in absolute.split(DELIMITER) {
            match component {
                "" | "." => {},
                ".." => {
                    if components.pop().is_none() {
                        exn::bail!(ErrorKind::InvalidPath(absolute.to_string()));
                    }
                },
                name => components.push(name),
            }
        }
        let count = components.len();
        let mut current = Self::root();
        for (index, name) in components.into_iter().enumerate() {
            let last = index + 1 == count;
            let component_kind = match (index, last) {
                (0, false) => EntryType::Volume,
                (0, true) if kind.is_directory() => EntryType::Volume,
                (_, true) => kind,
                (_, false) => EntryType::Directory,
            };
            current = Self::new(&current, name, component_kind)?;
        }
        Ok(current)
    }

    /// Create a child of this path.
    pub fn child(&self, name: impl Into<String>, kind: EntryType) -> Result<Self> {
        Self::new(self, name, kind)
    }

    /// Attach an attributes snapshot, returning the new value.
    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> EntryType {
        self.kind
    }

    pub fn parent(&self) -> Option<&Path> {
        self.parent.as_deref()
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryType::File
    }

    pub fn is_directory(&self) -> bool {
        self.kind.is_directory()
    }

    pub fn is_volume(&self) -> bool {
        self.kind == EntryType::Volume
    }

    /// A container is any entry sitting directly below the root.
    pub fn is_container(&self) -> bool {
        self.parent.as_deref().is_some_and(Path::is_root)
    }

    /// The top-most non-root ancestor, or `self` when it is the container.
    /// `None` for the root itself.
    pub fn container(&self) -> Option<&Path> {
        let mut current = self;
        while let Some(parent) = current.parent.as_deref() {
            if parent.is_root() {
                return Some(current);
            }
            current = parent;
        }
        None
    }

    /// Object key relative to the container: the chain of names below the
    /// container joined with [`DELIMITER`]. `None` for roots and containers.
    pub fn key(&self) -> Option<String> {
        if self.is_root() || self.is_container() {
            return None;
        }
        let mut names = Vec::new();
        let mut current = self;
        while let Some(parent) = current.parent.as_deref() {
            if parent.is_root() {
                break;
            }
            names.push(current.name.as_str());
            current = parent;
        }
        names.reverse();
        Some(names.join("/"))
    }

    /// Absolute representation, e.g. `/bucket/folder/file.txt`.
    pub fn absolute(&self) -> String {
        match self.parent.as_deref() {
            None => DELIMITER.to_string(),
            Some(parent) if parent.is_root() => format!("{DELIMITER}{}", self.name),
            Some(parent) => format!("{}{DELIMITER}{}", parent.absolute(), self.name),
        }
    }
}

impl PartialEq for Path {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.name == other.name && self.parent == other.parent
    }
}
impl Eq for Path {}

impl Hash for Path {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.name.hash(state);
        self.parent.hash(state);
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.absolute())
    }
}

/// Validates a single path component.
///
/// Rejects empty names, `.` and `..`, names containing the [`DELIMITER`] and
/// names containing null bytes (which pass through most APIs but cause
/// truncation in C-based ones).
///
/// ```
/// use stratus_storage::validate_name;
/// assert!(validate_name("report.pdf").is_ok());
/// assert!(validate_name("with space").is_ok());
/// assert!(validate_name("a/b").is_err());
/// assert!(validate_name("..").is_err());
/// assert!(validate_name("a\0b").is_err());
/// ```
pub fn validate_name(name: impl Into<String>) -> Result<String> {
    let name = name.into();
    if name.is_empty() || name == "." || name == ".." || name.contains(DELIMITER) || name.contains('\0') {
        exn::bail!(ErrorKind::InvalidPath(name));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashSet;

    #[test]
    fn test_root() {
        let root = Path::root();
        assert!(root.is_root());
        assert!(root.is_directory());
        assert_eq!(root.absolute(), "/");
        assert!(root.container().is_none());
        assert!(root.key().is_none());
    }

    #[rstest]
    #[case("/bucket/a/b/file.txt", "/bucket/a/b/file.txt")]
    #[case("bucket//a///file.txt", "/bucket/a/file.txt")]
    #[case("/bucket/./a/./file.txt", "/bucket/a/file.txt")]
    #[case("/bucket/wrong/../file.txt/", "/bucket/file.txt")]
    fn test_parse_normalization(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(Path::parse(input, EntryType::File).unwrap().absolute(), expected);
    }

    #[rstest]
    #[case("../etc/passwd")]
    #[case("/bucket/../../b")]
    #[case("..")]
    #[case("/bucket/a\0b")]
    fn test_parse_rejects(#[case] input: &str) {
        assert!(Path::parse(input, EntryType::File).is_err());
    }

    #[test]
    fn test_parse_types() {
        let file = Path::parse("/bucket/dir/file", EntryType::File).unwrap();
        assert!(file.is_file());
        let dir = file.parent().unwrap();
        assert_eq!(dir.kind(), EntryType::Directory);
        let bucket = dir.parent().unwrap();
        assert_eq!(bucket.kind(), EntryType::Volume);
        assert!(bucket.is_container());
        // Single component: volume only for directory types.
        assert!(Path::parse("/bucket", EntryType::Directory).unwrap().is_volume());
        assert!(Path::parse("/top-level.txt", EntryType::File).unwrap().is_file());
        // Empty path is the root.
        assert!(Path::parse("/", EntryType::Directory).unwrap().is_root());
    }

    #[test]
    fn test_container_and_key() {
        let file = Path::parse("/bucket/a/b/file.txt", EntryType::File).unwrap();
        assert_eq!(file.container().unwrap().name(), "bucket");
        assert_eq!(file.key().as_deref(), Some("a/b/file.txt"));
        let bucket = Path::volume("bucket").unwrap();
        assert_eq!(bucket.container(), Some(&bucket));
        assert!(bucket.key().is_none());
    }

    #[test]
    fn test_structural_equality_ignores_attributes() {
        let a = Path::parse("/bucket/file", EntryType::File).unwrap();
        let b = Path::parse("/bucket/file", EntryType::File)
            .unwrap()
            .with_attributes(Attributes::default().with_size(42));
        assert_eq!(a, b);
        let mut set = HashSet::new();
        set.insert(a.clone());
        assert!(set.contains(&b));
    }

    #[test]
    fn test_type_participates_in_equality() {
        let file = Path::parse("/bucket/name", EntryType::File).unwrap();
        let dir = Path::parse("/bucket/name", EntryType::Directory).unwrap();
        assert_ne!(file, dir);
        let other_bucket = Path::parse("/other/name", EntryType::File).unwrap();
        assert_ne!(file, other_bucket);
    }

    #[rstest]
    #[case("")]
    #[case(".")]
    #[case("..")]
    #[case("a/b")]
    #[case("\0")]
    fn test_invalid_names(#[case] name: &str) {
        assert!(Path::new(&Path::root(), name, EntryType::File).is_err());
    }
}
