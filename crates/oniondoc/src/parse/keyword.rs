//! Declaring keywords for the document types we parse.

/// A Keyword identifies the possible types of a keyword for an Item.
///
/// These do not map one-to-one to Item strings: several Item strings
/// may be placed in a single Keyword -- for example, when their order
/// is significant with respect to one another, like "accept" and
/// "reject" in router descriptors.
///
/// Every keyword has an "index", which is a small number suitable for
/// indexing an array.  These are used in Section to narrow down the
/// elements that a related set of rules applies to.
///
/// To declare a keyword type, use the [`decl_keyword!`] macro.
pub(crate) trait Keyword: std::hash::Hash + Eq + PartialEq + Copy + Clone {
    /// Find a Keyword corresponding to a string that appears in a
    /// document.
    fn from_str(s: &str) -> Self;
    /// Return the index for this keyword.
    fn idx(self) -> usize;
    /// Return the number of indices for this keyword.
    fn n_vals() -> usize;
    /// Return the string corresponding to this keyword.
    fn to_str(self) -> &'static str;
    /// Return the variant used for a keyword we don't recognize.
    fn unrecognized() -> Self;
}

/// Declare an enumeration that implements [`Keyword`].
///
/// The syntax is a visibility, a type name, and then a body mapping each
/// recognized keyword string to a variant:
///
/// ```ignore
/// decl_keyword! {
///     pub(crate) FruitKwd {
///         "apple" => APPLE,
///         "banana" => BANANA,
///     }
/// }
/// ```
///
/// An `UNRECOGNIZED` variant is added automatically; it is what
/// `from_str` returns for any string not listed.
macro_rules! decl_keyword {
    { $(#[$meta:meta])* $v:vis $name:ident {
        $( $s:literal => $i:ident ),* $(,)? } } => {
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
        #[allow(non_camel_case_types)]
        $(#[$meta])*
        $v enum $name {
            $( #[doc = concat!("The keyword `", $s, "`.")] $i , )*
            /// Any keyword that we don't recognize.
            UNRECOGNIZED,
        }
        impl $crate::parse::keyword::Keyword for $name {
            fn from_str(s: &str) -> Self {
                match s {
                    $( $s => $name::$i , )*
                    _ => $name::UNRECOGNIZED,
                }
            }
            fn idx(self) -> usize {
                self as usize
            }
            fn n_vals() -> usize {
                ($name::UNRECOGNIZED as usize) + 1
            }
            fn to_str(self) -> &'static str {
                match self {
                    $( $name::$i => $s , )*
                    $name::UNRECOGNIZED => "<unrecognized>",
                }
            }
            fn unrecognized() -> Self {
                $name::UNRECOGNIZED
            }
        }
    };
}

#[cfg(test)]
pub(crate) mod test {
    #![allow(clippy::unwrap_used)]
    use super::Keyword;

    decl_keyword! {
        pub(crate) Fruit {
            "apple" => APPLE,
            "orange" => ORANGE,
            "lemon" => LEMON,
            "guava" => GUAVA,
            "cherry" => STONEFRUIT,
            "plum" => PLUM,
        }
    }

    #[test]
    fn kwd() {
        use Fruit::*;
        assert_eq!(Fruit::from_str("lemon"), LEMON);
        assert_eq!(Fruit::from_str("plum"), PLUM);
        assert_eq!(Fruit::from_str("pear"), UNRECOGNIZED);

        assert_eq!(Fruit::n_vals(), 7);
        assert_eq!(APPLE.idx(), 0);
        assert_eq!(UNRECOGNIZED.idx(), 6);

        assert_eq!(APPLE.to_str(), "apple");
        assert_eq!(UNRECOGNIZED.to_str(), "<unrecognized>");
    }
}
