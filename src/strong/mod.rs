use num_traits::int::PrimInt;
use num_traits::{FromPrimitive, ToPrimitive, Zero, One};

pub use index_derive::IndexBase;

/// Newtype integer wrapper usable as an index
///
/// Derivable with `#[derive(IndexBase)]`, which also generates the
/// conversions from and into the wrapped integer.
pub trait IndexBase {
    /// Wrapped integer type
    type Type : PrimInt + ToPrimitive + FromPrimitive;

    /// Access the wrapped integer
    fn get(&self) -> Self::Type;
}

/// Collective trait for strongly typed indices
pub trait Index:
    IndexBase
    + Copy
    + From<<Self as IndexBase>::Type>
    + Into<<Self as IndexBase>::Type>
    + PartialEq
{
    /// Indices from zero up to, but not including, a bound
    fn range(bound: <Self as IndexBase>::Type) -> Range<Self>;

    /// Index as usize, if representable
    fn to_usize(&self) -> Option<usize> {
        ToPrimitive::to_usize(&self.get())
    }

    /// Construct from usize, if representable
    fn from_usize(value: usize) -> Option<Self> {
        <<Self as IndexBase>::Type as FromPrimitive>::from_usize(value).map(Self::from)
    }
}

impl<T> Index for T where T: IndexBase
    + Copy
    + From<<Self as IndexBase>::Type>
    + Into<<Self as IndexBase>::Type>
    + PartialEq
{
    fn range(bound: <Self as IndexBase>::Type) -> Range<Self> {
        Range {start: <<T as IndexBase>::Type as Zero>::zero(), end: bound}
    }
}

/// Iterator over a contiguous range of strongly typed indices
pub struct Range<I: Index> {
    start: <I as IndexBase>::Type,
    end: <I as IndexBase>::Type
}

impl<I: Index> Iterator for Range<I> {
    type Item = I;

    fn next(&mut self) -> Option<Self::Item> {
        if self.start >= self.end {
            return None;
        }

        let value = self.start;
        self.start = self.start + <<I as IndexBase>::Type as One>::one();
        Some(I::from(value))
    }
}

/// Bijective mappings between index spaces
pub mod bijection;
/// Surjective mappings between index spaces
pub mod surjection;
/// Position matrices indexed by strong types
pub mod matrix;
