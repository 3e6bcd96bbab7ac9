//! Macro for implementing string and storage-code conversions on domain enums
//!
//! Job enums are persisted as small integer codes and logged as lowercase
//! names. The macro keeps both mappings in one table per enum.
//!
//! # Example
//!
//! ```rust
//! use datapush_domain::impl_domain_code_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Light {
//!     Red,
//!     Green,
//! }
//!
//! impl_domain_code_conversions!(Light {
//!     Red => (1, "red"),
//!     Green => (2, "green"),
//! });
//!
//! assert_eq!(Light::Green.code(), 2);
//! assert_eq!(Light::from_code(1), Some(Light::Red));
//! assert_eq!("GREEN".parse::<Light>().unwrap(), Light::Green);
//! ```

/// Implements `Display`, `FromStr`, `code()` and `from_code()` for an enum.
///
/// * `Display` writes the lowercase name
/// * `FromStr` parses case-insensitively
/// * `code()` / `from_code()` convert to and from the persisted integer
#[macro_export]
macro_rules! impl_domain_code_conversions {
    ($enum_name:ident { $($variant:ident => ($code:expr, $str:expr)),+ $(,)? }) => {
        impl $enum_name {
            /// Integer code used in storage.
            pub const fn code(self) -> i64 {
                match self {
                    $(Self::$variant => $code,)+
                }
            }

            /// Parse a stored integer code.
            pub fn from_code(code: i64) -> ::std::option::Option<Self> {
                match code {
                    $(c if c == $code => ::std::option::Option::Some(Self::$variant),)+
                    _ => ::std::option::Option::None,
                }
            }

            /// Lowercase name.
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $str,)+
                }
            }
        }

        impl ::std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::std::str::FromStr for $enum_name {
            type Err = ::std::string::String;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                match s.to_lowercase().as_str() {
                    $($str => ::std::result::Result::Ok(Self::$variant),)+
                    _ => ::std::result::Result::Err(::std::format!(
                        "Invalid {}: {}",
                        stringify!($enum_name),
                        s
                    )),
                }
            }
        }
    };
}
