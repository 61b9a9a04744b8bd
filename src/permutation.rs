use std::ops::Index;
use std::convert::TryFrom;
use itertools::Itertools;
use thiserror::Error;
use rand::seq::SliceRandom;

extern crate nalgebra as na;
type Matrix3N = na::Matrix3xX<f64>;

/// Errors arising in the use of permutations
#[derive(Error, Debug, PartialEq, Eq, Clone, Copy)]
pub enum PermutationError {
    /// Lengths of permutations or of a permutation and a container mismatch
    #[error("Mismatched lengths")]
    LengthMismatch,
    /// One-line representation is not a permutation of `0..n`
    #[error("Invalid one-line representation of a permutation")]
    InvalidSigma
}

/// Slice-level permutation incrementation
///
/// Transforms the slice into the next greater permutation of its elements in
/// lexicographic order. Repeated elements are handled, i.e. iterating from a
/// sorted slice yields each distinct multiset permutation exactly once.
///
/// Returns false and sorts the slice ascending if it was the last permutation.
pub fn slice_next<T: PartialOrd>(slice: &mut [T]) -> bool {
    let n = slice.len();

    if n == 0 {
        return false;
    }

    let mut i = n - 1;
    let mut j;
    let mut k;

    loop {
        j = i;

        if i != 0 {
            i -= 1;

            if slice[i] < slice[j] {
                k = n - 1;
                while !(slice[i] < slice[k]) {
                    k -= 1;
                }

                slice.swap(i, k);
                slice[j..n].reverse();
                break true
            }
        } else {
            slice.reverse();
            break false
        }
    }
}

/// Permutation of `0..n` in one-line representation
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Debug, Hash)]
pub struct Permutation {
    /// One-line representation: `i` is mapped to `sigma[i]`
    sigma: Vec<usize>
}

impl std::fmt::Display for Permutation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{{}}}", self.sigma.iter().format(", "))
    }
}

impl Permutation {
    /// Initialize an identity permutation of specific size
    ///
    /// ```
    /// # use stereomol::permutation::Permutation;
    /// assert_eq!(Permutation::identity(3).sigma(), &[0, 1, 2])
    /// ```
    pub fn identity(n: usize) -> Permutation {
        Permutation {sigma: (0..n).collect()}
    }

    /// Generate a uniformly random permutation (identity inclusive)
    pub fn new_random(n: usize) -> Permutation {
        let mut p = Permutation::identity(n);
        p.sigma.shuffle(&mut rand::thread_rng());
        p
    }

    /// One-line representation
    pub fn sigma(&self) -> &[usize] {
        &self.sigma
    }

    /// Number of elements being permuted
    pub fn set_size(&self) -> usize {
        self.sigma.len()
    }

    /// Transform into the next permutation within the partial order of its set
    pub fn next_permutation(&mut self) -> bool {
        slice_next(self.sigma.as_mut_slice())
    }

    /// Invert the permutation
    ///
    /// ```
    /// # use stereomol::permutation::Permutation;
    /// let permutation = Permutation::try_from([0, 2, 1]).unwrap();
    /// assert_eq!(permutation.inverse().compose(&permutation), Ok(Permutation::identity(3)));
    /// ```
    pub fn inverse(&self) -> Permutation {
        let mut inverse = vec![0; self.sigma.len()];
        for (i, &s) in self.sigma.iter().enumerate() {
            inverse[s] = i;
        }
        Permutation {sigma: inverse}
    }

    /// Find the argument mapped onto a value
    pub fn inverse_of(&self, value: usize) -> Option<usize> {
        self.sigma.iter().position(|&s| s == value)
    }

    /// Whether a value is mapped onto itself
    pub fn is_fixed_point(&self, i: usize) -> bool {
        self.sigma.get(i) == Some(&i)
    }

    /// Apply the permutation to a vector
    ///
    /// The element at position `i` ends up at position `sigma[i]`.
    pub fn apply<T: Clone>(&self, other: Vec<T>) -> Result<Vec<T>, PermutationError> {
        if other.len() != self.sigma.len() {
            return Err(PermutationError::LengthMismatch);
        }

        let mut permuted = other.clone();
        for (i, value) in other.into_iter().enumerate() {
            permuted[self.sigma[i]] = value;
        }
        Ok(permuted)
    }

    /// Compose two permutations into a new permutation
    ///
    /// The composition applies `self` first, then `other`, i.e. it maps
    /// `i` to `other[self[i]]`.
    pub fn compose(&self, other: &Permutation) -> Result<Permutation, PermutationError> {
        if self.sigma.len() != other.sigma.len() {
            return Err(PermutationError::LengthMismatch);
        }

        Ok(Permutation {sigma: self.inverse().apply(other.sigma.clone())?})
    }

    /// Iterate through the (argument, value) pairs of the permutation
    pub fn iter_pairs(&self) -> impl Iterator<Item=(usize, &usize)> {
        self.sigma.iter().enumerate()
    }
}

impl TryFrom<Vec<usize>> for Permutation {
    type Error = PermutationError;

    fn try_from(sigma: Vec<usize>) -> Result<Permutation, Self::Error> {
        let n = sigma.len();
        let mut seen = vec![false; n];
        for &s in sigma.iter() {
            if s >= n || seen[s] {
                return Err(PermutationError::InvalidSigma);
            }
            seen[s] = true;
        }

        Ok(Permutation {sigma})
    }
}

impl<const N: usize> TryFrom<[usize; N]> for Permutation {
    type Error = PermutationError;

    fn try_from(sigma: [usize; N]) -> Result<Permutation, Self::Error> {
        Permutation::try_from(sigma.to_vec())
    }
}

/// Implements indexing, letting Permutation behave as a container directly
impl Index<usize> for Permutation {
    type Output = usize;

    fn index(&self, i: usize) -> &Self::Output {
        &self.sigma[i]
    }
}

/// Iterator adaptor for iterating through all permutations of a set size
///
/// ```
/// # use stereomol::permutation::{permutations, Permutation};
/// let mut iter = permutations(2);
/// assert_eq!(iter.next(), Some(Permutation::identity(2)));
/// assert_eq!(iter.next(), Permutation::try_from([1, 0]).ok());
/// assert_eq!(iter.next(), None);
/// ```
pub struct PermutationIterator {
    permutation: Permutation,
    increment: bool
}

impl Iterator for PermutationIterator {
    type Item = Permutation;

    fn next(&mut self) -> Option<Self::Item> {
        if self.increment && !self.permutation.next_permutation() {
            return None;
        }

        self.increment = true;
        Some(self.permutation.clone())
    }
}

/// Yields permutations of a set size in increasing lexicographic order
pub fn permutations(n: usize) -> PermutationIterator {
    PermutationIterator {permutation: Permutation::identity(n), increment: false}
}

/// Types whose elements can be reordered by a permutation
pub trait Permutatable {
    /// Result of the permutation
    type Output;

    /// Reorder so that element `i` ends up at position `p[i]`
    fn permute(&self, p: &Permutation) -> Result<Self::Output, PermutationError>;
}

impl Permutatable for Matrix3N {
    type Output = Matrix3N;

    fn permute(&self, p: &Permutation) -> Result<Matrix3N, PermutationError> {
        if self.ncols() != p.set_size() {
            return Err(PermutationError::LengthMismatch);
        }

        let inverse = p.inverse();
        Ok(Matrix3N::from_fn(self.ncols(), |i, j| self[(i, inverse[j])]))
    }
}
