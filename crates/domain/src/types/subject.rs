//! Server-auth subjects
//!
//! JWT and client-credentials grants issue tokens on behalf of either an
//! enterprise service account or a single app user.

use serde::{Deserialize, Serialize};

use crate::impl_wire_name_conversions;

/// Identity a server-auth token is issued for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Subject {
    UserId(String),
    EnterpriseId(String),
}

/// Wire form of a subject's kind (`box_sub_type` / `box_subject_type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubjectType {
    Enterprise,
    User,
}

impl_wire_name_conversions!(SubjectType {
    Enterprise => "enterprise",
    User => "user",
});

impl Subject {
    #[must_use]
    pub const fn subject_type(&self) -> SubjectType {
        match self {
            Self::UserId(_) => SubjectType::User,
            Self::EnterpriseId(_) => SubjectType::Enterprise,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::UserId(id) | Self::EnterpriseId(id) => id,
        }
    }
}
