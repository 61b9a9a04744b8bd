extern crate nalgebra as na;
type Vector3 = na::Vector3<f64>;

use ordered_float::OrderedFloat;
use rayon::prelude::*;
use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::geometry::{check_separation, Degeneracy};
use crate::molecule::{GraphError, Nucleus, Site, StereoHint};
use crate::quaternions::Matrix3N;
use crate::shapes::{Catalog, CatalogError, Entry, Name, Vertex};
use crate::shapes::similarity::{polyhedron, SimilarityError};
use crate::strong::bijection::Bijection;
use crate::strong::matrix::Positions;

/// Thresholds governing geometry resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Continuous shape measure above which no shape is considered matching
    pub max_shape_measure: f64,
    /// Minimum continuous shape measure gap between the best and second-best shape
    pub ambiguity_tolerance: f64,
    /// Distance from the center below which a site has no direction
    pub min_site_distance: f64,
    /// Minimum angle in radians between two site directions
    pub min_separation_angle: f64,
    /// Minimum distance in radians of a double bond dihedral from a right angle
    pub dihedral_margin: f64,
    /// Discard stereopermutations in which linked sites are trans
    pub remove_trans_spanning_links: bool
}

impl Default for ResolverConfig {
    fn default() -> ResolverConfig {
        ResolverConfig {
            max_shape_measure: 10.0,
            ambiguity_tolerance: 0.25,
            min_site_distance: 1e-3,
            min_separation_angle: 0.2,
            dihedral_margin: 0.1,
            remove_trans_spanning_links: false
        }
    }
}

impl ResolverConfig {
    pub fn with_max_shape_measure(self, max_shape_measure: f64) -> ResolverConfig {
        ResolverConfig {max_shape_measure, ..self}
    }

    pub fn with_ambiguity_tolerance(self, ambiguity_tolerance: f64) -> ResolverConfig {
        ResolverConfig {ambiguity_tolerance, ..self}
    }

    pub fn with_min_site_distance(self, min_site_distance: f64) -> ResolverConfig {
        ResolverConfig {min_site_distance, ..self}
    }

    pub fn with_min_separation_angle(self, min_separation_angle: f64) -> ResolverConfig {
        ResolverConfig {min_separation_angle, ..self}
    }

    pub fn with_dihedral_margin(self, dihedral_margin: f64) -> ResolverConfig {
        ResolverConfig {dihedral_margin, ..self}
    }

    pub fn with_remove_trans_spanning_links(self, remove_trans_spanning_links: bool) -> ResolverConfig {
        ResolverConfig {remove_trans_spanning_links, ..self}
    }
}

/// Reasons a center's geometry cannot be resolved
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolutionError {
    #[error("{first} ({first_measure:.2}) and {second} ({second_measure:.2}) fit equally well")]
    AmbiguousShape {
        first: Name,
        first_measure: f64,
        second: Name,
        second_measure: f64
    },
    #[error("Best matching shape {best} deviates by {deviation:.2}")]
    NoMatchingShape {
        best: Name,
        deviation: f64
    },
    #[error("Indeterminate geometry: {0}")]
    IndeterminateGeometry(Degeneracy),
    #[error(transparent)]
    UnsupportedCoordinationNumber(#[from] CatalogError),
    #[error(transparent)]
    Similarity(#[from] SimilarityError),
    #[error(transparent)]
    Graph(#[from] GraphError)
}

/// Best fitting shape of a set of site directions
#[derive(Debug, Clone)]
pub struct ShapeFit {
    pub shape: Name,
    /// Continuous shape measure of the fit
    pub measure: f64,
    /// Site placed at each vertex
    pub vertex_sites: Bijection<Vertex, Site>
}

/// Unit vectors from the center to each site
///
/// Multi-atom sites point towards the centroid of their atoms. Sites too
/// close to the center keep their short length, for separation checks to
/// catch.
pub fn site_directions(
    positions: &Positions<Nucleus>,
    center: Nucleus,
    sites: &[Vec<Nucleus>],
    min_site_distance: f64
) -> Result<Vec<Vector3>, GraphError> {
    let point = |n: Nucleus| -> Result<Vector3, GraphError> {
        positions.point(n)
            .map(|v| v.into_owned())
            .ok_or(GraphError::PositionCountMismatch {expected: n.0.index() + 1, found: positions.len()})
    };

    let origin = point(center)?;
    sites.iter()
        .map(|atoms| {
            let mut centroid = Vector3::zeros();
            for &atom in atoms {
                centroid += point(atom)?;
            }
            let direction = centroid / atoms.len().max(1) as f64 - origin;
            let norm = direction.norm();
            Ok(if norm < min_site_distance { direction } else { direction / norm })
        })
        .collect()
}

/// Out-of-plane component below which a direction counts as drawn flat
const FLAT_TOLERANCE: f64 = 1e-3;

/// Lift hinted directions out of a flat drawing
///
/// Only applies if every direction lies in the xy-plane and at least one site
/// is hinted. Wedged sites are raised towards +z, dashed ones lowered to -z,
/// by the elevation of a tetrahedron vertex over the plane of its opposite
/// neighbors. Returns whether directions were changed.
pub fn lift_flat_directions(directions: &mut [Vector3], hints: &[Option<StereoHint>]) -> bool {
    let flat = directions.iter().all(|d| d.z.abs() < FLAT_TOLERANCE);
    if !flat || hints.iter().all(Option::is_none) {
        return false;
    }

    for (direction, hint) in directions.iter_mut().zip(hints) {
        let depth = match hint {
            Some(StereoHint::Wedge) => std::f64::consts::FRAC_1_SQRT_2,
            Some(StereoHint::Dash) => -std::f64::consts::FRAC_1_SQRT_2,
            None => continue
        };
        let norm = direction.norm();
        if norm > 0.0 {
            direction.z = depth * norm;
            *direction /= direction.norm();
        }
    }

    true
}

/// Fit site directions onto all catalog shapes of matching size
///
/// Shapes are evaluated in parallel. The best fit must be below the
/// configured measure ceiling and clearly better than the runner-up.
pub fn fit_shape(directions: &[Vector3], catalog: &Catalog, config: &ResolverConfig) -> Result<ShapeFit, ResolutionError> {
    check_separation(directions, config.min_site_distance, config.min_separation_angle)
        .map_err(ResolutionError::IndeterminateGeometry)?;

    let candidates: Vec<&Entry> = catalog.shapes_of_size(directions.len())?;
    let mut cloud = Matrix3N::zeros(directions.len() + 1);
    for (i, direction) in directions.iter().enumerate() {
        cloud.set_column(i, direction);
    }

    let mut fits = candidates.par_iter()
        .map(|&entry| polyhedron(cloud.clone(), entry).map(|s| (entry, s)))
        .collect::<Result<Vec<_>, _>>()?;
    fits.sort_by_key(|(_, s)| OrderedFloat(s.csm));

    for (entry, similarity) in fits.iter() {
        tracing::debug!("Shape {} fits with measure {:.3}", entry.name(), similarity.csm);
    }

    let mut fits = fits.into_iter();
    let (best, similarity) = fits.next().ok_or(CatalogError::UnsupportedCoordinationNumber(directions.len()))?;
    if similarity.csm > config.max_shape_measure {
        return Err(ResolutionError::NoMatchingShape {best: best.name(), deviation: similarity.csm});
    }
    if let Some((second, runner_up)) = fits.next() {
        if runner_up.csm - similarity.csm < config.ambiguity_tolerance {
            return Err(ResolutionError::AmbiguousShape {
                first: best.name(),
                first_measure: similarity.csm,
                second: second.name(),
                second_measure: runner_up.csm
            });
        }
    }

    let columns = similarity.vertex_columns().map_err(|_| SimilarityError::ParticleNumberMismatch)?;
    let vertex_sites = Bijection::new(columns.permutation);

    Ok(ShapeFit {shape: best.name(), measure: similarity.csm, vertex_sites})
}

#[cfg(test)]
mod tests {
    use crate::molecule::resolve::*;
    use crate::quaternions::random_rotation;

    fn directions_of(entry: &Entry) -> Vec<Vector3> {
        let rotation = random_rotation().to_rotation_matrix();
        entry.shape.coordinates.column_iter().map(|c| rotation * c).collect()
    }

    fn strict() -> ResolverConfig {
        ResolverConfig::default()
            .with_max_shape_measure(5.0)
            .with_ambiguity_tolerance(0.5)
    }

    #[test]
    fn default_thresholds() {
        let config = ResolverConfig::default();
        assert_eq!(config.max_shape_measure, 10.0);
        assert_eq!(config.ambiguity_tolerance, 0.25);
        assert_eq!(config.dihedral_margin, 0.1);
        assert!(!config.remove_trans_spanning_links);
        let changed = config.clone().with_min_separation_angle(0.1).with_remove_trans_spanning_links(true);
        assert_eq!(changed.min_separation_angle, 0.1);
        assert!(changed.remove_trans_spanning_links);
        assert_eq!(changed.max_shape_measure, config.max_shape_measure);
    }

    #[test]
    fn ideal_shapes_are_recognized() {
        let catalog = Catalog::shared();
        for name in [Name::Tetrahedron, Name::Square, Name::TrigonalBipyramid, Name::Octahedron] {
            let entry = catalog.entry(name);
            let fit = fit_shape(&directions_of(entry), catalog, &strict()).unwrap();
            assert_eq!(fit.shape, name);
            assert!(fit.measure < 1e-3);
            // Site i was placed at vertex i up to a rotation
            let identity = Bijection::<Vertex, Site>::identity(entry.size());
            assert!(entry.is_rotation(&identity, &fit.vertex_sites));
        }
    }

    #[test]
    fn failures() {
        let catalog = Catalog::shared();

        // Tetrahedron vs. trigonal pyramid differ by about 3.6
        let tetrahedron = directions_of(catalog.entry(Name::Tetrahedron));
        let loose = strict().with_ambiguity_tolerance(5.0);
        assert!(matches!(
            fit_shape(&tetrahedron, catalog, &loose),
            Err(ResolutionError::AmbiguousShape {first: Name::Tetrahedron, second: Name::TrigonalPyramid, ..})
        ));

        let tight = strict().with_max_shape_measure(-1.0);
        assert!(matches!(fit_shape(&tetrahedron, catalog, &tight), Err(ResolutionError::NoMatchingShape {..})));

        let collinear = vec![Vector3::x(), Vector3::y(), Vector3::new(1.0, 0.01, 0.0), -Vector3::y()];
        assert!(matches!(
            fit_shape(&collinear, catalog, &strict()),
            Err(ResolutionError::IndeterminateGeometry(Degeneracy::Overlapping {..}))
        ));

        let many: Vec<Vector3> = (0..13).map(|i| Vector3::new((i as f64).cos(), (i as f64).sin(), i as f64 - 6.0).normalize()).collect();
        assert!(matches!(
            fit_shape(&many, catalog, &strict().with_min_separation_angle(0.0)),
            Err(ResolutionError::UnsupportedCoordinationNumber(CatalogError::UnsupportedCoordinationNumber(13)))
        ));
    }

    #[test]
    fn flat_drawings_are_lifted() {
        let s = std::f64::consts::FRAC_1_SQRT_2;
        let mut drawn = vec![Vector3::new(s, s, 0.0), Vector3::new(s, -s, 0.0), Vector3::new(-1.0, 0.0, 0.0)];
        let hints = [Some(StereoHint::Wedge), Some(StereoHint::Dash), None];
        assert!(lift_flat_directions(&mut drawn, &hints));
        approx::assert_relative_eq!(drawn[0], Vector3::new(1.0, 1.0, 1.0).normalize(), epsilon = 1e-12);
        approx::assert_relative_eq!(drawn[1], Vector3::new(1.0, -1.0, -1.0).normalize(), epsilon = 1e-12);
        approx::assert_relative_eq!(drawn[2], -Vector3::x());

        // Directions with depth of their own are kept
        let mut spatial = vec![Vector3::new(0.0, 0.6, 0.8), Vector3::x()];
        let before = spatial.clone();
        assert!(!lift_flat_directions(&mut spatial, &[Some(StereoHint::Dash), None]));
        assert_eq!(spatial, before);

        let mut unhinted = vec![Vector3::x(), Vector3::y()];
        assert!(!lift_flat_directions(&mut unhinted, &[None, None]));
    }

    #[test]
    fn directions_of_sites() {
        let matrix = Matrix3N::from_column_slice(&[
            1.0, 1.0, 1.0,
            3.0, 1.0, 1.0,
            1.0, 2.0, 1.0,
            1.0, 0.0, 1.0,
            1.0, 1.0, 1.0005,
        ]);
        let positions = Positions::<Nucleus>::wrap(matrix);
        let n = |i: usize| Nucleus::from(i);
        let sites = vec![vec![n(1)], vec![n(2), n(3)], vec![n(4)]];
        let directions = site_directions(&positions, n(0), &sites, 1e-3).unwrap();
        approx::assert_relative_eq!(directions[0], Vector3::x());
        // Centroid of a site coinciding with the center is kept short
        assert!(directions[1].norm() < 1e-12);
        assert!(directions[2].norm() < 1e-3);

        let missing = vec![vec![n(7)]];
        assert!(site_directions(&positions, n(0), &missing, 1e-3).is_err());
    }
}
