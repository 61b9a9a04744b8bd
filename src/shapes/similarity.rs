extern crate nalgebra as na;
type Matrix3N = na::Matrix3xX<f64>;

use thiserror::Error;
use memoize::memoize;

use crate::strong::{Index, IndexBase};
use crate::strong::bijection::Bijection;
use crate::permutation::{Permutation, PermutationError, Permutatable, slice_next};
use crate::shapes::{Name, Vertex, Entry, shape_from_name};
use crate::quaternions;

/// Remove the centroid and rescale so that the longest vector has unit length
pub fn unit_sphere_normalize(mut x: Matrix3N) -> Matrix3N {
    let centroid = x.column_mean();
    for mut v in x.column_iter_mut() {
        v -= centroid;
    }

    let max_norm: f64 = x.column_iter().map(|v| v.norm()).fold(0.0, f64::max);
    if max_norm > 0.0 {
        for mut v in x.column_iter_mut() {
            v /= max_norm;
        }
    }

    x
}

/// Normalized shape coordinates with the center appended as last column
#[memoize]
pub fn reference_cloud(name: Name) -> Matrix3N {
    let shape = shape_from_name(name);
    let n = shape.size();
    unit_sphere_normalize(shape.coordinates.clone().insert_column(n, 0.0))
}

mod scaling {
    use super::Matrix3N;

    use argmin::core::{CostFunction, Error, Executor};
    use argmin::solver::brent::BrentOpt;

    const MIN_FACTOR: f64 = 0.3;
    const MAX_FACTOR: f64 = 1.8;

    fn msd(cloud: &Matrix3N, shape: &Matrix3N, factor: f64) -> f64 {
        (shape.scale(factor) - cloud)
            .column_iter()
            .map(|col| col.norm_squared())
            .sum()
    }

    struct ScalingProblem<'a> {
        cloud: &'a Matrix3N,
        shape: &'a Matrix3N
    }

    impl CostFunction for ScalingProblem<'_> {
        type Param = f64;
        type Output = f64;

        fn cost(&self, factor: &Self::Param) -> Result<Self::Output, Error> {
            Ok(msd(self.cloud, self.shape, *factor))
        }
    }

    // Closed-form isotropic scale of Horn's absolute orientation paper,
    // exact only for undistorted clouds
    pub fn direct_factor(cloud: &Matrix3N, shape: &Matrix3N) -> f64 {
        let shape_norm: f64 = shape.column_iter().map(|v| v.norm_squared()).sum();
        if shape_norm == 0.0 {
            return 1.0;
        }

        (cloud.column_iter().map(|v| v.norm_squared()).sum::<f64>() / shape_norm).sqrt()
    }

    fn minimize(cloud: &Matrix3N, shape: &Matrix3N) -> Result<f64, Error> {
        let precondition = direct_factor(cloud, shape).clamp(MIN_FACTOR, MAX_FACTOR);
        let solver = BrentOpt::new(MIN_FACTOR, MAX_FACTOR);
        let result = Executor::new(ScalingProblem {cloud, shape}, solver)
            .configure(|state| state.param(precondition).max_iters(100))
            .run()?;

        Ok(result.state.best_cost)
    }

    /// Continuous shape measure of a cloud against an aligned shape, minimized over scaling
    ///
    /// Zero for a perfect match, at most 100.
    pub fn minimize_csm(cloud: &Matrix3N, shape: &Matrix3N) -> f64 {
        let cloud_norm: f64 = cloud.column_iter().map(|v| v.norm_squared()).sum();
        if cloud_norm == 0.0 {
            return 100.0;
        }

        let msd = minimize(cloud, shape).unwrap_or_else(|e| {
            tracing::warn!("Scaling minimization failed, using direct factor: {}", e);
            msd(cloud, shape, direct_factor(cloud, shape))
        });

        (100.0 * msd / cloud_norm).min(100.0)
    }
}

pub use scaling::minimize_csm;

/// Index of a column of a position cloud
#[derive(IndexBase, Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Column(usize);

/// Errors arising in similarity calculations
#[derive(Error, Debug, PartialEq, Eq, Clone, Copy)]
pub enum SimilarityError {
    /// Cloud must have one column per vertex plus the center
    #[error("Number of particles does not match shape size")]
    ParticleNumberMismatch,
}

/// Best alignment of a cloud onto a shape
#[derive(Debug, Clone)]
pub struct Similarity {
    /// Vertex to cloud column mapping, including the center as last index
    pub bijection: Bijection<Vertex, Column>,
    /// Continuous shape measure, between 0 (perfect) and 100
    pub csm: f64,
}

impl Similarity {
    /// Vertex to cloud column mapping without the center
    pub fn vertex_columns(&self) -> Result<Bijection<Vertex, Column>, PermutationError> {
        let mut sigma = self.bijection.permutation.sigma().to_vec();
        let center = sigma.len().checked_sub(1).ok_or(PermutationError::LengthMismatch)?;
        if sigma.pop() != Some(center) {
            return Err(PermutationError::InvalidSigma);
        }

        Ok(Bijection::new(Permutation::try_from(sigma)?))
    }
}

/// Bijections from cloud columns onto vertices worth trying
///
/// The center is always matched with itself and the first column is
/// matched only with one vertex from each rotationally equivalent group.
struct TrialBijections {
    representatives: std::vec::IntoIter<usize>,
    current: Option<Vec<usize>>
}

impl TrialBijections {
    fn new(entry: &Entry) -> TrialBijections {
        let representatives: Vec<usize> = entry.vertex_groups.iter()
            .filter_map(|g| g.first().and_then(|v| v.to_usize()))
            .collect();
        let mut trials = TrialBijections {
            representatives: representatives.into_iter(),
            current: None
        };
        trials.current = trials.next_start(entry.size());
        trials
    }

    fn next_start(&mut self, n: usize) -> Option<Vec<usize>> {
        let first = self.representatives.next()?;
        let mut sigma = vec![first];
        sigma.extend((0..n).filter(|&v| v != first));
        sigma.push(n);
        Some(sigma)
    }
}

impl Iterator for TrialBijections {
    type Item = Bijection<Column, Vertex>;

    fn next(&mut self) -> Option<Self::Item> {
        let sigma = self.current.take()?;
        let n = sigma.len() - 1;

        let mut advanced = sigma.clone();
        self.current = if slice_next(&mut advanced[1..n]) {
            Some(advanced)
        } else {
            self.next_start(n)
        };

        Permutation::try_from(sigma).ok().map(Bijection::new)
    }
}

/// Similarity of a cloud to a shape
///
/// The cloud must contain one column per shape vertex followed by the center.
/// All rotationally distinct column-to-vertex bijections are tried by quaternion
/// fit, and the best alignment is then minimized over isotropic scaling.
pub fn polyhedron(x: Matrix3N, entry: &Entry) -> Result<Similarity, SimilarityError> {
    let n = x.ncols();
    if n != entry.size() + 1 {
        return Err(SimilarityError::ParticleNumberMismatch);
    }

    let cloud = unit_sphere_normalize(x);
    let shape = reference_cloud(entry.name());

    let mut best: Option<(Bijection<Column, Vertex>, quaternions::Fit)> = None;
    for trial in TrialBijections::new(entry) {
        let rotor = cloud.permute(&trial.permutation)
            .map_err(|_| SimilarityError::ParticleNumberMismatch)?;
        let fit = quaternions::fit(&shape, &rotor);
        if best.as_ref().map_or(true, |(_, best_fit)| fit.msd < best_fit.msd) {
            best = Some((trial, fit));
        }
    }

    let (trial, fit) = best.ok_or(SimilarityError::ParticleNumberMismatch)?;
    let bijection = trial.inverse();
    let permuted_shape = shape.permute(&bijection.permutation)
        .map_err(|_| SimilarityError::ParticleNumberMismatch)?;
    let rotated_shape = fit.rotate_stator(&permuted_shape);

    let csm = minimize_csm(&cloud, &rotated_shape);
    Ok(Similarity {bijection, csm})
}

#[cfg(test)]
mod tests {
    use crate::shapes::*;
    use crate::shapes::similarity::*;
    use crate::shapes::similarity::Matrix3N;
    use crate::quaternions::random_rotation;

    fn random_cloud(n: usize) -> Matrix3N {
        Matrix3N::new_random(n)
    }

    #[test]
    fn normalization() {
        let cloud = unit_sphere_normalize(random_cloud(6));
        assert!(cloud.column_mean().norm() < 1e-8);
        let max_norm = cloud.column_iter().map(|v| v.norm()).fold(0.0, f64::max);
        approx::assert_relative_eq!(max_norm, 1.0, epsilon = 1e-8);
    }

    #[test]
    fn scaling_minimization() {
        let shape = reference_cloud(Name::Octahedron);
        let scaled = 0.8 * shape.clone();
        approx::assert_relative_eq!(scaling::direct_factor(&scaled, &shape), 0.8, epsilon = 1e-8);
        assert!(minimize_csm(&scaled, &shape) < 1e-6);

        let distorted = shape.clone() + 0.05 * unit_sphere_normalize(random_cloud(7));
        assert!(minimize_csm(&distorted, &shape) > 0.0);
    }

    fn rotated_and_shuffled(entry: &Entry) -> (Matrix3N, Bijection<Vertex, Column>) {
        let rotation = random_rotation();
        let placement = Bijection::<Vertex, Column>::new_random(entry.size());
        let rotated = rotation.to_rotation_matrix() * entry.shape.coordinates.clone();
        let shuffled = rotated.permute(&placement.permutation).expect("Matching sizes");
        let n = entry.size();
        (shuffled.insert_column(n, 0.0), placement)
    }

    #[test]
    fn recovers_placements() {
        let catalog = Catalog::shared();
        for entry in catalog.entries() {
            let (cloud, placement) = rotated_and_shuffled(entry);
            let similarity = polyhedron(cloud, entry).expect("Matching sizes");
            assert!(similarity.csm < 1e-3, "Ideal {} has csm {}", entry.name(), similarity.csm);

            let found = similarity.vertex_columns().expect("Center matched last");
            assert!(entry.is_rotation(&placement, &found), "Placement for {} not recovered", entry.name());
        }
    }

    #[test]
    fn distinct_shapes_are_dissimilar() {
        let catalog = Catalog::shared();
        let (octahedron, _) = rotated_and_shuffled(catalog.entry(Name::Octahedron));
        let prism = polyhedron(octahedron, catalog.entry(Name::TrigonalPrism)).unwrap();
        assert!(prism.csm > 15.0 && prism.csm < 18.5, "Octahedron as trigonal prism csm {}", prism.csm);

        let (tetrahedron, _) = rotated_and_shuffled(catalog.entry(Name::Tetrahedron));
        let square = polyhedron(tetrahedron, catalog.entry(Name::Square)).unwrap();
        assert!(square.csm > 30.0, "Tetrahedron as square csm {}", square.csm);
    }

    #[test]
    fn size_mismatch() {
        let catalog = Catalog::shared();
        let result = polyhedron(random_cloud(4), catalog.entry(Name::Tetrahedron));
        assert_eq!(result.err(), Some(SimilarityError::ParticleNumberMismatch));
    }
}
