pub mod attributes;
pub mod backend;
pub mod capability;
pub mod checksum;
pub mod error;
mod path;
mod session;

pub use crate::attributes::Attributes;
pub use crate::path::{DELIMITER, EntryType, Path, validate_name};
pub use crate::session::{Session, SessionHandle, SessionRegistry};
