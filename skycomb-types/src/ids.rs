//! Small newtype ids for the entity arenas. Each wraps a `u32` counter
//! advanced exclusively by the run controller (see `skycomb-core::RunController`).

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! scalar_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            #[inline]
            pub fn next(self) -> Self {
                $name(self.0 + 1)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u32> for $name {
            fn from(val: u32) -> Self {
                $name(val)
            }
        }
    };
}

scalar_id!(BlockId);
scalar_id!(FeatureId);
scalar_id!(ObjectId);
scalar_id!(SpanId);
scalar_id!(StepId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_order_and_advance() {
        let a = BlockId(3);
        let b = a.next();
        assert_eq!(b, BlockId(4));
        assert!(a < b);
    }
}
