//! Fallback capabilities for backends lacking a native implementation.

use crate::attributes::Attributes;
use crate::capability::{AttributesFinder, Find, List};
use crate::error::{ErrorKind, Result};
use crate::path::Path;
use async_trait::async_trait;
use futures::TryStreamExt;
use std::sync::Arc;

/// Existence check built on an [`AttributesFinder`].
///
/// [`NotFound`](ErrorKind::NotFound) becomes `false`; every other error is
/// passed through untouched.
#[derive(Clone)]
pub struct DefaultFind {
    attributes: Arc<dyn AttributesFinder>,
}
impl DefaultFind {
    pub fn new(attributes: Arc<dyn AttributesFinder>) -> Self {
        Self { attributes }
    }
}

#[async_trait]
impl Find for DefaultFind {
    async fn find(&self, path: &Path) -> Result<bool> {
        if path.is_root() {
            return Ok(true);
        }
        match self.attributes.attributes(path).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }
}

/// Attribute lookup built on a [`List`] of the parent directory.
///
/// Costs a full listing of the parent per lookup, so backends with a native
/// lookup should always advertise it instead.
#[derive(Clone)]
pub struct ListAttributesFinder {
    list: Arc<dyn List>,
}
impl ListAttributesFinder {
    pub fn new(list: Arc<dyn List>) -> Self {
        Self { list }
    }
}

#[async_trait]
impl AttributesFinder for ListAttributesFinder {
    async fn attributes(&self, path: &Path) -> Result<Attributes> {
        let Some(parent) = path.parent() else {
            return Ok(Attributes::EMPTY);
        };
        let mut children = self.list.list(parent);
        while let Some(child) = children.try_next().await? {
            if child == *path {
                return Ok(child.attributes().clone());
            }
        }
        exn::bail!(ErrorKind::NotFound(path.to_string()))
    }
}
