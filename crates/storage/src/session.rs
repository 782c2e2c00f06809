//! Backend sessions and the registry that dispatches to them.

use crate::capability::{
    AttributesFinder, DefaultFind, Delete, Directory, Find, List, ListAttributesFinder, ServerSideCopy, Touch, Write,
};
use crate::error::{ErrorKind, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

pub type SessionHandle = Arc<dyn Session>;

/// One open connection to a provider, advertising the capabilities it
/// supports.
///
/// Each capability accessor returns `None` when the provider has no native
/// implementation. [`finder()`](Self::finder) and
/// [`attributes_finder()`](Self::attributes_finder) fill the gaps with
/// generic fallbacks where one exists.
pub trait Session: Send + Sync {
    /// Name of the configured backend (taken from the configuration object
    /// key). Used for logging and registry lookups.
    fn name(&self) -> &str;

    /// Provider identity, e.g. `"b2"` or `"s3"`.
    fn provider(&self) -> &'static str;

    fn find(&self) -> Option<Arc<dyn Find>> {
        None
    }

    fn attributes(&self) -> Option<Arc<dyn AttributesFinder>> {
        None
    }

    fn directory(&self) -> Option<Arc<dyn Directory>> {
        None
    }

    fn touch(&self) -> Option<Arc<dyn Touch>> {
        None
    }

    fn copy(&self) -> Option<Arc<dyn ServerSideCopy>> {
        None
    }

    fn delete(&self) -> Option<Arc<dyn Delete>> {
        None
    }

    fn write(&self) -> Option<Arc<dyn Write>> {
        None
    }

    fn list(&self) -> Option<Arc<dyn List>> {
        None
    }

    /// Attribute lookup: the native one, or one built on [`List`].
    fn attributes_finder(&self) -> Result<Arc<dyn AttributesFinder>> {
        if let Some(attributes) = self.attributes() {
            return Ok(attributes);
        }
        match self.list() {
            Some(list) => Ok(Arc::new(ListAttributesFinder::new(list))),
            None => exn::bail!(ErrorKind::Interoperability(format!(
                "{} ({}) supports neither attribute lookup nor listing",
                self.name(),
                self.provider()
            ))),
        }
    }

    /// Existence check: the native one, or one built on
    /// [`attributes_finder()`](Self::attributes_finder).
    fn finder(&self) -> Result<Arc<dyn Find>> {
        match self.find() {
            Some(find) => Ok(find),
            None => Ok(Arc::new(DefaultFind::new(self.attributes_finder()?))),
        }
    }
}

/// Sessions keyed by configured backend name.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: BTreeMap<String, SessionHandle>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session under its own name, replacing any previous session
    /// with that name.
    pub fn register(&mut self, session: SessionHandle) -> Option<SessionHandle> {
        let name = session.name().to_string();
        if self.sessions.contains_key(&name) {
            tracing::warn!(backend = %name, "Replacing already registered session");
        }
        self.sessions.insert(name, session)
    }

    pub fn get(&self, name: &str) -> Result<SessionHandle> {
        match self.sessions.get(name) {
            Some(session) => Ok(session.clone()),
            None => exn::bail!(ErrorKind::NotFound(format!("backend `{name}`"))),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sessions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
