use std::marker::PhantomData;
use std::convert::TryFrom;
use delegate::delegate;

use crate::permutation::{Permutation, PermutationError};
use crate::strong::Index;

/// Bijection between two index spaces of equal size
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Debug, Hash)]
pub struct Bijection<T: Index, U: Index> {
    /// Underlying weakly typed permutation
    pub permutation: Permutation,
    key_type: PhantomData<T>,
    value_type: PhantomData<U>
}

impl<T: Index, U: Index> Bijection<T, U> {
    /// Wrap a permutation
    pub fn new(permutation: Permutation) -> Bijection<T, U> {
        Bijection {permutation, key_type: PhantomData, value_type: PhantomData}
    }

    /// Uniformly random bijection (identity inclusive)
    pub fn new_random(n: usize) -> Bijection<T, U> {
        Bijection::new(Permutation::new_random(n))
    }

    /// Bijection mapping each index onto the same value
    pub fn identity(n: usize) -> Bijection<T, U> {
        Bijection::new(Permutation::identity(n))
    }

    /// Invert the bijection
    pub fn inverse(&self) -> Bijection<U, T> {
        Bijection::new(self.permutation.inverse())
    }

    /// Value a key is mapped onto
    ///
    /// ```
    /// # use stereomol::strong::bijection::Bijection;
    /// # use stereomol::shapes::Vertex;
    /// # use stereomol::permutation::Permutation;
    /// # use std::convert::TryFrom;
    /// let f: Bijection<Vertex, Vertex> = Bijection::new(Permutation::try_from([1, 2, 0]).unwrap());
    /// assert_eq!(f.get(&Vertex::from(2)), Some(Vertex::from(0)));
    /// assert_eq!(f.get(&Vertex::from(3)), None);
    /// ```
    pub fn get(&self, key: &T) -> Option<U> {
        let index = key.to_usize()?;
        if index >= self.permutation.set_size() {
            return None;
        }

        U::from_usize(self.permutation[index])
    }

    /// Key mapped onto a value
    pub fn inverse_of(&self, value: &U) -> Option<T> {
        let key = self.permutation.inverse_of(value.to_usize()?)?;
        T::from_usize(key)
    }

    /// Compose with another bijection, applying `self` first
    pub fn compose<V: Index>(&self, other: &Bijection<U, V>) -> Result<Bijection<T, V>, PermutationError> {
        Ok(Bijection::new(self.permutation.compose(&other.permutation)?))
    }

    delegate! {
        to self.permutation {
            /// Transform into the next bijection in lexicographic order
            pub fn next_permutation(&mut self) -> bool;
            /// Number of keys
            pub fn set_size(&self) -> usize;
        }
    }

    /// Whether a key is mapped onto the value of the same index
    pub fn is_fixed_point(&self, key: T) -> bool {
        key.to_usize().map_or(false, |i| self.permutation.is_fixed_point(i))
    }

    /// Iterate through key-value pairs
    pub fn iter_pairs(&self) -> impl Iterator<Item=(T, U)> + '_ {
        self.permutation.iter_pairs()
            .filter_map(|(k, &v)| Some((T::from_usize(k)?, U::from_usize(v)?)))
    }
}

impl<T: Index, U: Index> std::fmt::Display for Bijection<T, U> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.permutation)
    }
}

impl<T: Index, U: Index> TryFrom<Vec<U>> for Bijection<T, U> {
    type Error = PermutationError;

    fn try_from(values: Vec<U>) -> Result<Bijection<T, U>, Self::Error> {
        let sigma = values.into_iter()
            .map(|v| v.to_usize().ok_or(PermutationError::InvalidSigma))
            .collect::<Result<Vec<usize>, _>>()?;
        Permutation::try_from(sigma).map(Bijection::new)
    }
}

/// Iterator through all bijections of a set size
///
/// See [`bijections`]
pub struct BijectionIterator<T: Index, U: Index> {
    bijection: Bijection<T, U>,
    increment: bool
}

impl<T: Index, U: Index> Iterator for BijectionIterator<T, U> {
    type Item = Bijection<T, U>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.increment && !self.bijection.next_permutation() {
            return None;
        }

        self.increment = true;
        Some(self.bijection.clone())
    }
}

/// Yields bijections of a set size in increasing lexicographic order
pub fn bijections<T: Index, U: Index>(n: usize) -> BijectionIterator<T, U> {
    BijectionIterator {bijection: Bijection::identity(n), increment: false}
}

/// Types whose index space can be relabeled by a bijection
pub trait Bijectable<U: Index> {
    /// Index type before relabeling
    type T: Index;
    /// Relabeled type
    type Output;

    /// Relabel: the item at key `k` ends up at value `bijection(k)`
    fn biject(&self, bijection: &Bijection<Self::T, U>) -> Result<Self::Output, PermutationError>;
}
