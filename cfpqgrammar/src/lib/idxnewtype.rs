// This macro generates a struct which exposes a usize API but which, internally, stores a u32:
// grammars with more than u32::MAX rules, tokens or productions are not something we can solve
// queries over anyway.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

macro_rules! IdxNewtype {
    ($(#[$attr:meta])* $n: ident) => {
        $(#[$attr])*
        #[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
        #[cfg_attr(feature="serde", derive(Serialize, Deserialize))]
        pub struct $n(pub u32);

        impl From<$n> for usize {
            fn from(st: $n) -> Self {
                num_traits::cast(st.0).unwrap()
            }
        }

        impl From<usize> for $n {
            fn from(v: usize) -> Self {
                match num_traits::cast::<usize, u32>(v) {
                    Some(x) => $n(x),
                    None => panic!("Overflow"),
                }
            }
        }
    }
}

IdxNewtype!(
    /// A type specifically for rule indices.
    ///
    /// It is guaranteed that `RIdx` can be converted, without loss of precision, to `usize` with
    /// the idiom `usize::from(x_ridx)`. `usize` values can be converted to `RIdx`, causing a
    /// panic if this would lead to a loss of precision.
    RIdx);
IdxNewtype!(
    /// A type specifically for production indices (e.g. a rule `E -> A | B` would have two
    /// productions for the single rule `E`).
    PIdx);
IdxNewtype!(
    /// A type specifically for token indices.
    TIdx);

#[cfg(test)]
mod test {
    use super::{PIdx, RIdx};

    #[test]
    fn test_conversions() {
        assert_eq!(usize::from(RIdx::from(3usize)), 3);
        assert_eq!(PIdx::from(7usize), PIdx(7));
    }
}
