//! Domain value types

pub mod subject;
pub mod token;

pub use subject::{Subject, SubjectType};
pub use token::TokenPair;
