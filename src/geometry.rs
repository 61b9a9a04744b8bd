extern crate nalgebra as na;
type Vector3 = na::Vector3<f64>;

/// Angle between two vectors in radians, in `[0, pi]`
///
/// Zero-length arguments yield an angle of zero.
pub fn angle<S1, S2>(
    a: &na::Matrix<f64, na::Const<3>, na::Const<1>, S1>,
    b: &na::Matrix<f64, na::Const<3>, na::Const<1>, S2>
) -> f64
where S1: na::Storage<f64, na::Const<3>, na::Const<1>>,
    S2: na::Storage<f64, na::Const<3>, na::Const<1>>
{
    a.cross(b).norm().atan2(a.dot(b))
}

/// Signed dihedral angle in radians, in `(-pi, pi]`, of the sequence a-b-c-d
pub fn dihedral(a: &Vector3, b: &Vector3, c: &Vector3, d: &Vector3) -> f64 {
    let b1 = b - a;
    let b2 = c - b;
    let b3 = d - c;

    let n1 = b1.cross(&b2);
    let n2 = b2.cross(&b3);
    let m = n1.cross(&b2.normalize());

    m.dot(&n2).atan2(n1.dot(&n2))
}

/// Reasons for which a set of directions cannot be assigned to shape vertices
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Degeneracy {
    /// A direction is too short to carry orientation
    CoincidentSite {
        /// Position of the offending direction
        site: usize,
        /// Its length
        distance: f64
    },
    /// Two directions are nearly parallel
    Overlapping {
        /// Position of the first direction
        first: usize,
        /// Position of the second direction
        second: usize,
        /// Angle between them in radians
        angle: f64
    },
    /// A substituent lies nearly on the axis of a bond
    Collinear {
        /// Position of the offending point in the dihedral sequence
        site: usize,
        /// Angle to the bond axis in radians
        angle: f64
    },
    /// The dihedral is too close to a right angle to decide on an arrangement
    Perpendicular {
        /// Dihedral angle in radians
        dihedral: f64
    }
}

impl std::fmt::Display for Degeneracy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Degeneracy::CoincidentSite {site, distance} =>
                write!(f, "site {} is only {:.2e} from the center", site, distance),
            Degeneracy::Overlapping {first, second, angle} =>
                write!(f, "sites {} and {} are separated by only {:.3} rad", first, second, angle),
            Degeneracy::Collinear {site, angle} =>
                write!(f, "point {} is only {:.3} rad off the bond axis", site, angle),
            Degeneracy::Perpendicular {dihedral} =>
                write!(f, "dihedral of {:.3} rad is too close to a right angle", dihedral)
        }
    }
}

/// Check that a set of directions are long enough and pairwise well separated
pub fn check_separation(directions: &[Vector3], min_distance: f64, min_angle: f64) -> Result<(), Degeneracy> {
    if let Some((site, distance)) = directions.iter()
        .map(|v| v.norm())
        .enumerate()
        .find(|(_, distance)| *distance < min_distance)
    {
        return Err(Degeneracy::CoincidentSite {site, distance});
    }

    for (first, a) in directions.iter().enumerate() {
        for (offset, b) in directions.iter().skip(first + 1).enumerate() {
            let separation = angle(a, b);
            if separation < min_angle {
                return Err(Degeneracy::Overlapping {first, second: first + 1 + offset, angle: separation});
            }
        }
    }

    Ok(())
}

/// Dihedral of the sequence a-b-c-d, if its sign and magnitude are meaningful
///
/// The central bond and both arms must be at least `min_distance` long, the
/// arms must be at least `min_angle` off the bond axis and the dihedral must
/// be at least `margin` away from a right angle in either direction.
///
/// ```
/// # extern crate nalgebra as na;
/// # use stereomol::geometry::{well_defined_dihedral, Degeneracy};
/// let a = na::Vector3::new(1.0, 0.0, 0.0);
/// let b = na::Vector3::zeros();
/// let c = na::Vector3::new(0.0, 0.0, 1.0);
/// let cis = na::Vector3::new(1.0, 0.0, 1.0);
/// assert!(well_defined_dihedral(&a, &b, &c, &cis, 1e-3, 0.2, 0.1).is_ok());
/// let gauche = na::Vector3::new(0.0, 1.0, 1.0);
/// assert!(matches!(
///     well_defined_dihedral(&a, &b, &c, &gauche, 1e-3, 0.2, 0.1),
///     Err(Degeneracy::Perpendicular {..})
/// ));
/// ```
pub fn well_defined_dihedral(
    a: &Vector3,
    b: &Vector3,
    c: &Vector3,
    d: &Vector3,
    min_distance: f64,
    min_angle: f64,
    margin: f64
) -> Result<f64, Degeneracy> {
    let axis = c - b;
    let bond = axis.norm();
    if !(bond >= min_distance) {
        return Err(Degeneracy::CoincidentSite {site: 2, distance: bond});
    }

    for (site, arm, reference) in [(0, a - b, axis), (3, d - c, -axis)] {
        let distance = arm.norm();
        if !(distance >= min_distance) {
            return Err(Degeneracy::CoincidentSite {site, distance});
        }

        // Angle between arm and the bond seen from the arm's own end
        let off_axis = angle(&arm, &reference);
        if off_axis < min_angle || off_axis > std::f64::consts::PI - min_angle {
            return Err(Degeneracy::Collinear {site, angle: off_axis});
        }
    }

    let phi = dihedral(a, b, c, d);
    if !phi.is_finite() || (phi.abs() - std::f64::consts::FRAC_PI_2).abs() < margin {
        return Err(Degeneracy::Perpendicular {dihedral: phi});
    }

    Ok(phi)
}
