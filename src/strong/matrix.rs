extern crate nalgebra as na;
type Matrix3N = na::Matrix3xX<f64>;

use std::marker::PhantomData;

use crate::strong::Index;
use crate::strong::bijection::{Bijection, Bijectable};
use crate::permutation::{PermutationError, Permutatable};
use crate::quaternions;

/// Owned position matrix whose columns are indexed by a strong type
#[derive(Clone, Debug, PartialEq)]
pub struct Positions<I: Index> {
    /// Underlying matrix, one column per index
    pub matrix: Matrix3N,
    index_type: PhantomData<I>
}

impl<I: Index> Positions<I> {
    /// Wrap a matrix
    pub fn wrap(matrix: Matrix3N) -> Positions<I> {
        Positions {matrix, index_type: PhantomData}
    }

    /// Number of positions
    pub fn len(&self) -> usize {
        self.matrix.ncols()
    }

    /// Whether there are no positions
    pub fn is_empty(&self) -> bool {
        self.matrix.ncols() == 0
    }

    /// Position of a particular index, if present
    pub fn point(&self, index: I) -> Option<na::VectorView3<f64>> {
        let column = index.to_usize()?;
        (column < self.matrix.ncols()).then(|| self.matrix.column(column))
    }

    /// Quaternion fit of a rotor in the same index space onto these positions
    pub fn quaternion_fit_rotor(&self, rotor: &Positions<I>) -> quaternions::Fit {
        quaternions::fit(&self.matrix, &rotor.matrix)
    }
}

impl<I: Index, U: Index> Bijectable<U> for Positions<I> {
    type T = I;
    type Output = Positions<U>;

    fn biject(&self, bijection: &Bijection<I, U>) -> Result<Positions<U>, PermutationError> {
        let matrix = self.matrix.permute(&bijection.permutation)?;
        Ok(Positions::wrap(matrix))
    }
}

#[cfg(test)]
mod tests {
    use crate::strong::matrix::*;
    use crate::strong::IndexBase;

    #[derive(IndexBase, Debug, Copy, Clone, PartialEq)]
    struct Site(usize);

    #[derive(IndexBase, Debug, Copy, Clone, PartialEq)]
    struct Vertex(u8);

    #[test]
    fn bijected_points_follow_their_index() {
        let sites = Positions::<Site>::wrap(Matrix3N::new_random(5));
        let placement = Bijection::<Site, Vertex>::new_random(5);
        let by_vertex = sites.biject(&placement).unwrap();

        for s in (0..5).map(Site) {
            let v = placement.get(&s).unwrap();
            assert_eq!(sites.point(s).unwrap(), by_vertex.point(v).unwrap());
        }

        assert!(sites.point(Site(5)).is_none());
        assert!(sites.biject(&Bijection::<Site, Vertex>::identity(3)).is_err());
    }
}
