//! Page model for StrataDB.
//!
//! A resource is a pair of fixed fan-out page trees hanging off one uber
//! page: the revision tree maps revision numbers to revision roots, and
//! each revision root anchors the data tree of that revision plus its name
//! dictionary. Inner positions of both trees are indirect pages; records
//! live in the slots of leaf pages.
//!
//! This crate defines the page kinds, their wire codecs, and the reference
//! and container types the transaction machinery moves pages around with.
//! It performs no I/O.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod container;
mod indirect;
mod leaf;
mod name;
mod page;
mod reference;
mod revision_root;
mod uber;

pub use container::PageContainer;
pub use indirect::IndirectPage;
pub use leaf::{LeafPage, RecordSlot};
pub use name::NamePage;
pub use page::Page;
pub use reference::PageReference;
pub use revision_root::RevisionRootPage;
pub use uber::UberPage;
