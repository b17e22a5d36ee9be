//! Macro for implementing Display and FromStr for wire-name enums
//!
//! Box encodes several small enums as lowercase strings on the wire
//! (`box_subject_type`, `box_sub_type`). This macro maps each variant to its
//! wire name in both directions.
//!
//! # Example
//!
//! ```rust
//! use boxsdk_domain::impl_wire_name_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Scope {
//!     Global,
//!     Enterprise,
//! }
//!
//! impl_wire_name_conversions!(Scope {
//!     Global => "global",
//!     Enterprise => "enterprise",
//! });
//!
//! assert_eq!(Scope::Global.to_string(), "global");
//! ```

/// Implements Display and FromStr traits for wire-name enums
///
/// Parsing is case-insensitive; output is always the registered wire name.
#[macro_export]
macro_rules! impl_wire_name_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl $enum_name {
            /// Wire name of the variant.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $str,)+
                }
            }
        }

        impl ::core::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::core::str::FromStr for $enum_name {
            type Err = ::std::string::String;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                match s.to_lowercase().as_str() {
                    $($str => ::core::result::Result::Ok(Self::$variant),)+
                    _ => ::core::result::Result::Err(::std::format!(
                        "Invalid {}: {}",
                        stringify!($enum_name),
                        s
                    )),
                }
            }
        }
    };
}
