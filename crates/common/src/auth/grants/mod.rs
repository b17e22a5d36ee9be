//! Credential grant strategies
//!
//! | strategy | grant_type | refresh token issued |
//! |---|---|---|
//! | [`AuthorizationCodeGrant`] | `authorization_code` | yes |
//! | [`RefreshTokenGrant`] | `refresh_token` | yes |
//! | [`JwtGrant`] | `urn:ietf:params:oauth:grant-type:jwt-bearer` | no |
//! | [`ClientCredentialsGrant`] | `client_credentials` | no |
//! | [`DeveloperTokenGrant`] | none, refresh always fails | no |

mod authorization_code;
mod ccg;
mod developer_token;
mod jwt;
mod refresh;

pub use authorization_code::AuthorizationCodeGrant;
pub use ccg::ClientCredentialsGrant;
pub use developer_token::DeveloperTokenGrant;
pub use jwt::{JwtClaims, JwtGrant};
pub use refresh::RefreshTokenGrant;
