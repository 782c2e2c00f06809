use super::client::{FileAction, FileResponse};
use super::{B2Context, LARGE_FILE_SHA1, PLACEHOLDER, SRC_LAST_MODIFIED_MILLIS, error};
use crate::DELIMITER;
use crate::attributes::{Attributes, from_millis};
use crate::capability::{Append, AttributesFinder, Find, List, PathStream, Write};
use crate::checksum::Checksum;
use crate::error::{ErrorKind, Result};
use crate::path::{EntryType, Path};
use async_stream::stream;
use async_trait::async_trait;

const LIST_PAGE_SIZE: usize = 1000;

/// Attribute lookup, existence check and listing for B2.
pub struct B2AttributesFinder {
    context: B2Context,
}
impl B2AttributesFinder {
    pub fn new(context: B2Context) -> Self {
        Self { context }
    }

    /// Whether any object exists below the virtual folder `directory`.
    async fn has_children(&self, directory: &Path) -> Result<bool> {
        let bucket_id = self.context.fileid.bucket_id(directory).await?;
        let prefix = folder_prefix(directory);
        let listing = self
            .context
            .client
            .list_file_names(&bucket_id, None, Some(&prefix), Some("/"), 1)
            .await
            .map_err(|e| error::map(e, directory))?;
        Ok(!listing.files.is_empty())
    }
}

#[async_trait]
impl AttributesFinder for B2AttributesFinder {
    #[tracing::instrument(level = "debug", skip(self), fields(path = %path))]
    async fn attributes(&self, path: &Path) -> Result<Attributes> {
        if path.is_root() {
            return Ok(Attributes::EMPTY);
        }
        if path.is_container() {
            let bucket_id = self.context.fileid.version_id(path).await?;
            return Ok(Attributes::default().with_version_id(bucket_id));
        }
        let id = match self.context.fileid.version_id(path).await {
            Ok(id) => id,
            Err(err) if err.is_not_found() && path.is_directory() => {
                // Virtual folder without a placeholder object.
                if self.has_children(path).await? {
                    return Ok(Attributes::EMPTY);
                }
                return Err(err);
            },
            Err(err) => return Err(err),
        };
        match self.context.client.get_file_info(&id).await.map_err(|e| error::map(e, path)) {
            Ok(file) => Ok(to_attributes(&file)),
            Err(ErrorKind::Pending(_)) => {
                let writer = super::write::B2Write::new(self.context.clone());
                Ok(match writer.append(path).await? {
                    Append::Resume { size } => Attributes::default().with_size(size),
                    Append::Fresh => Attributes::EMPTY,
                })
            },
            Err(kind) => Err(kind.into()),
        }
    }
}

#[async_trait]
impl Find for B2AttributesFinder {
    async fn find(&self, path: &Path) -> Result<bool> {
        if path.is_root() {
            return Ok(true);
        }
        if path.is_container() {
            let bucket = self.context.client.list_bucket(path.name()).await.map_err(|e| error::map(e, path))?;
            return Ok(bucket.is_some());
        }
        match self.context.fileid.version_id(path).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() && path.is_directory() => self.has_children(path).await,
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }
}

impl List for B2AttributesFinder {
    fn list<'a>(&'a self, directory: &'a Path) -> PathStream<'a> {
        Box::pin(stream! {
            if directory.is_root() {
                match self.buckets(directory).await {
                    Ok(buckets) => {
                        for bucket in buckets {
                            yield Ok(bucket);
                        }
                    },
                    Err(err) => yield Err(err),
                }
            } else {
                let mut start: Option<String> = None;
                loop {
                    let (children, next) = match self.page(directory, start.as_deref()).await {
                        Ok(page) => page,
                        Err(err) => {
                            yield Err(err);
                            break;
                        },
                    };
                    for child in children {
                        yield Ok(child);
                    }
                    match next {
                        Some(next) => start = Some(next),
                        None => break,
                    }
                }
            }
        })
    }
}

impl B2AttributesFinder {
    async fn buckets(&self, root: &Path) -> Result<Vec<Path>> {
        let buckets = self.context.client.list_buckets().await.map_err(|e| error::map(e, root))?;
        buckets
            .into_iter()
            .map(|bucket| {
                let attributes = Attributes::default()
                    .with_version_id(bucket.bucket_id)
                    .with_region(bucket.bucket_type.to_string());
                Ok(Path::volume(bucket.bucket_name)?.with_attributes(attributes))
            })
            .collect()
    }

    /// One page of direct children, plus where the next page starts.
    async fn page(&self, directory: &Path, start: Option<&str>) -> Result<(Vec<Path>, Option<String>)> {
        let bucket_id = self.context.fileid.bucket_id(directory).await?;
        let prefix = folder_prefix(directory);
        let page = self
            .context
            .client
            .list_file_names(&bucket_id, start, Some(&prefix), Some("/"), LIST_PAGE_SIZE)
            .await
            .map_err(|e| error::map(e, directory))?;
        let mut children = Vec::with_capacity(page.files.len());
        for file in &page.files {
            let Some(name) = file.file_name.strip_prefix(&prefix) else {
                continue;
            };
            match file.action {
                FileAction::Folder => {
                    children.push(directory.child(name.trim_end_matches(DELIMITER), EntryType::Directory)?);
                },
                FileAction::Upload if name == PLACEHOLDER => {},
                FileAction::Upload => {
                    children.push(directory.child(name, EntryType::File)?.with_attributes(to_attributes(file)));
                },
                FileAction::Start | FileAction::Hide => {},
            }
        }
        Ok((children, page.next_file_name))
    }
}

/// Object name prefix of everything below `directory`; empty for buckets.
pub(crate) fn folder_prefix(directory: &Path) -> String {
    match directory.key() {
        Some(key) => format!("{key}{DELIMITER}"),
        None => String::new(),
    }
}

/// Attributes snapshot of a committed file version.
pub(crate) fn to_attributes(file: &FileResponse) -> Attributes {
    let modified = file
        .file_info
        .get(SRC_LAST_MODIFIED_MILLIS)
        .and_then(|millis| millis.parse::<i64>().ok())
        .and_then(from_millis)
        .or_else(|| from_millis(file.upload_timestamp));
    let mut attributes = Attributes::default()
        .with_size(file.content_length)
        .with_checksum(checksum(file))
        .with_version_id(file.file_id.clone())
        .with_metadata(file.file_info.clone());
    attributes.modified = modified;
    attributes
}

/// Large files report `none` as their content SHA-1; the whole-file digest
/// only exists if the uploader stored it in the file info.
fn checksum(file: &FileResponse) -> Option<Checksum> {
    if let Some(sha1) = file.file_info.get(LARGE_FILE_SHA1)
        && let Some(checksum) = Checksum::parse(sha1)
    {
        return Some(checksum);
    }
    let sha1 = file.content_sha1.as_deref()?.to_ascii_lowercase();
    Checksum::parse(sha1.strip_prefix("unverified:").unwrap_or(&sha1))
}
