use std::collections::HashSet;
use std::convert::TryFrom;
use std::marker::PhantomData;
use thiserror::Error;

use crate::strong::Index;
use crate::strong::bijection::Bijection;
use crate::permutation::slice_next;

/// Surjective map from a key index space onto a minimal value space
///
/// The values of a surjection are exactly `0..k` for some `k`, each
/// occurring at least once.
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Debug, Hash)]
pub struct Surjection<T: Index, U: Index> {
    /// One-line representation: key `i` maps onto `sigma[i]`
    pub sigma: Vec<U>,
    key_type: PhantomData<T>
}

/// Errors arising in use of surjections
#[derive(Error, Debug, PartialEq, Eq, Clone, Copy)]
pub enum SurjectionError {
    /// Values are not a sequence of natural numbers starting at zero
    #[error("Codomain is not minimal")]
    NonMinimalCodomain,
    /// No values at all
    #[error("Empty codomain")]
    EmptyCodomain,
    /// Domain size mismatches an argument
    #[error("Length mismatch")]
    LengthMismatch
}

impl<T: Index, U: Index + Ord + std::hash::Hash> TryFrom<Vec<U>> for Surjection<T, U> {
    type Error = SurjectionError;

    fn try_from(sigma: Vec<U>) -> Result<Self, Self::Error> {
        let max = sigma.iter().max().ok_or(SurjectionError::EmptyCodomain)?;
        let distinct = sigma.iter().collect::<HashSet<&U>>().len();
        if max.to_usize() != Some(distinct - 1) {
            return Err(SurjectionError::NonMinimalCodomain);
        }

        Ok(Surjection {sigma, key_type: PhantomData})
    }
}

impl<T: Index, U: Index> From<Bijection<T, U>> for Surjection<T, U> {
    fn from(bijection: Bijection<T, U>) -> Surjection<T, U> {
        let sigma = bijection.iter_pairs().map(|(_, u)| u).collect();
        Surjection {sigma, key_type: PhantomData}
    }
}

impl<T: Index, U: Index + PartialOrd> Surjection<T, U> {
    /// Identity surjection (also a bijection)
    pub fn identity(size: usize) -> Surjection<T, U> {
        Surjection::from(Bijection::<T, U>::identity(size))
    }

    /// Number of keys
    pub fn domain_size(&self) -> usize {
        self.sigma.len()
    }

    /// Value of a key, if within the domain
    pub fn get(&self, key: &T) -> Option<U> {
        self.sigma.get(key.to_usize()?).copied()
    }

    /// Transform into the next permutation of its values
    pub fn next_permutation(&mut self) -> bool {
        slice_next(self.sigma.as_mut_slice())
    }

    /// Copy with values sorted ascending, the first of its permutations
    pub fn sorted(&self) -> Surjection<T, U> where U: Ord {
        let mut sigma = self.sigma.clone();
        sigma.sort();
        Surjection {sigma, key_type: PhantomData}
    }

    /// Iterate through the distinct permutations of the values, starting from this one
    pub fn iter_permutations(&self) -> SurjectionIterator<T, U> {
        SurjectionIterator {surjection: self.clone(), increment: false}
    }

    /// Relabel the keys: the value at key `k` ends up at key `bijection(k)`
    pub fn relabel(&self, bijection: &Bijection<T, T>) -> Result<Surjection<T, U>, SurjectionError> {
        let sigma = bijection.permutation.apply(self.sigma.clone())
            .map_err(|_| SurjectionError::LengthMismatch)?;
        Ok(Surjection {sigma, key_type: PhantomData})
    }
}

/// Iterator through permutations of a surjection's values
#[derive(Clone)]
pub struct SurjectionIterator<T: Index, U: Index + PartialOrd> {
    surjection: Surjection<T, U>,
    increment: bool
}

impl<T: Index, U: Index + PartialOrd> Iterator for SurjectionIterator<T, U> {
    type Item = Surjection<T, U>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.increment && !self.surjection.next_permutation() {
            return None;
        }

        self.increment = true;
        Some(self.surjection.clone())
    }
}

#[cfg(test)]
mod tests {
    use crate::strong::surjection::*;
    use crate::strong::IndexBase;
    use crate::permutation::Permutation;

    #[derive(IndexBase, Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
    struct Vertex(u8);

    #[derive(IndexBase, Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
    struct Rank(usize);

    fn occupation(values: &[usize]) -> Result<Surjection<Vertex, Rank>, SurjectionError> {
        Surjection::try_from(values.iter().copied().map(Rank).collect::<Vec<_>>())
    }

    #[test]
    fn minimal_codomain() {
        assert!(occupation(&[0, 1, 0, 2]).is_ok());
        assert_eq!(occupation(&[0, 2, 0, 2]), Err(SurjectionError::NonMinimalCodomain));
        assert_eq!(occupation(&[1, 1]), Err(SurjectionError::NonMinimalCodomain));
        assert_eq!(occupation(&[]), Err(SurjectionError::EmptyCodomain));
    }

    #[test]
    fn multiset_iteration() {
        let base = occupation(&[1, 0, 1, 0]).unwrap().sorted();
        assert_eq!(base.sigma, vec![Rank(0), Rank(0), Rank(1), Rank(1)]);
        // 4! / (2! 2!)
        assert_eq!(base.iter_permutations().count(), 6);
        assert_eq!(base.get(&Vertex(2)), Some(Rank(1)));
    }

    #[test]
    fn relabeling() {
        let base = occupation(&[0, 1, 2]).unwrap();
        let rotation = Bijection::<Vertex, Vertex>::new(Permutation::try_from([1, 2, 0]).unwrap());
        let relabeled = base.relabel(&rotation).unwrap();
        for k in 0..3u8 {
            let key = Vertex(k);
            assert_eq!(relabeled.get(&rotation.get(&key).unwrap()), base.get(&key));
        }

        let mismatched = Bijection::<Vertex, Vertex>::identity(4);
        assert_eq!(base.relabel(&mismatched), Err(SurjectionError::LengthMismatch));
    }
}
