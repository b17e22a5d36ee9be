//! Resource helpers built on [`BoxSession`](crate::http::BoxSession)
//!
//! - [`metadata`]: metadata instances with create-or-update semantics
//! - [`translator`]: `"type"`-discriminated decoding of API items

pub mod metadata;
pub mod translator;

pub use metadata::{CreateError, Metadata, MetadataItemType, MetadataUpdate};
pub use translator::{TranslateError, TypeRegistry};
