//! Newtype IDs for type-safe entity references.
//!
//! Use the `define_id!` macro to create type-safe ID wrappers that prevent
//! accidentally mixing IDs from different entity types.

/// Declare an `i32`-backed row id.
///
/// Generated ids are `Copy`, ordered and hashable, serialize as bare numbers,
/// print and parse as their inner value, and convert to and from `i32`. With
/// the `postgres` feature they bind to `INTEGER`/`SERIAL` columns directly.
///
/// Attributes written before the name (doc comments included) are applied to
/// the generated struct.
///
/// ```rust
/// # use cartwheel_core::define_id;
/// define_id!(
///     /// A shelf in the warehouse.
///     ShelfId
/// );
///
/// let shelf: ShelfId = "12".parse().unwrap();
/// assert_eq!(shelf.as_i32(), 12);
/// ```
#[macro_export]
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[cfg_attr(feature = "postgres", derive(::sqlx::Type), sqlx(transparent))]
        #[serde(transparent)]
        pub struct $name(i32);

        impl $name {
            #[must_use]
            pub const fn new(id: i32) -> Self {
                Self(id)
            }

            #[must_use]
            pub const fn as_i32(self) -> i32 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                ::core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = ::core::num::ParseIntError;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                s.trim().parse().map(Self)
            }
        }

        impl From<i32> for $name {
            fn from(id: i32) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(
    /// A customer or admin account.
    UserId
);
define_id!(
    /// A catalog product.
    ProductId
);
define_id!(CategoryId);
define_id!(
    /// One line of a user's cart.
    CartId
);
define_id!(OrderId);
define_id!(PaymentId);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display_matches_inner_value() {
        assert_eq!(ProductId::new(7).to_string(), "7");
        assert_eq!(OrderId::new(-1).to_string(), "-1");
    }

    #[test]
    fn test_id_serializes_transparently() {
        let json = serde_json::to_string(&CartId::new(42)).unwrap();
        assert_eq!(json, "42");

        let id: UserId = serde_json::from_str("9").unwrap();
        assert_eq!(id, UserId::new(9));
    }

    #[test]
    fn test_id_parses_from_path_segment() {
        assert_eq!(" 17".parse::<OrderId>().unwrap(), OrderId::new(17));
        assert!("abc".parse::<OrderId>().is_err());
    }

    #[test]
    fn test_id_conversions() {
        let id = PaymentId::from(3);
        assert_eq!(id.as_i32(), 3);
        assert_eq!(i32::from(id), 3);
    }
}
