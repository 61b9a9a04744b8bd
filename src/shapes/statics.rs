use crate::shapes::{Shape, Name, Rotation, Mirror, Matrix3N};
use crate::permutation::Permutation;

use std::f64::consts::SQRT_2;

const SQRT_3: f64 = 1.7320508075688772;
const SQRT_FRAC_1_3: f64 = 0.5773502691896257;
const PENTAGON_X1: f64 = 0.309016994374947;
const PENTAGON_Y1: f64 = 0.951056516295154;
const PENTAGON_X2: f64 = -0.809016994374947;
const PENTAGON_Y2: f64 = 0.587785252292473;

fn permutation(sigma: &[usize]) -> Permutation {
    Permutation::try_from(sigma.to_vec()).expect("Static vertex permutations are valid")
}

fn shape(name: Name, points: &[[f64; 3]], basis: &[&[usize]], mirror: Option<&[usize]>) -> Shape {
    Shape {
        name,
        coordinates: Matrix3N::from_iterator(points.len(), points.iter().flatten().copied()),
        rotation_basis: basis.iter().map(|sigma| Rotation::new(permutation(sigma))).collect(),
        mirror: mirror.map(|sigma| Mirror::new(permutation(sigma)))
    }
}

const TRIANGLE: [[f64; 3]; 3] = [
    [1.0, 0.0, 0.0],
    [-0.5, SQRT_3 / 2.0, 0.0],
    [-0.5, -SQRT_3 / 2.0, 0.0]
];

const SQUARE_PLANE: [[f64; 3]; 4] = [
    [1.0, 0.0, 0.0],
    [0.0, 1.0, 0.0],
    [-1.0, 0.0, 0.0],
    [0.0, -1.0, 0.0]
];

const PENTAGON_PLANE: [[f64; 3]; 5] = [
    [1.0, 0.0, 0.0],
    [PENTAGON_X1, PENTAGON_Y1, 0.0],
    [PENTAGON_X2, PENTAGON_Y2, 0.0],
    [PENTAGON_X2, -PENTAGON_Y2, 0.0],
    [PENTAGON_X1, -PENTAGON_Y1, 0.0]
];

const HEXAGON_PLANE: [[f64; 3]; 6] = [
    [1.0, 0.0, 0.0],
    [0.5, SQRT_3 / 2.0, 0.0],
    [-0.5, SQRT_3 / 2.0, 0.0],
    [-1.0, 0.0, 0.0],
    [-0.5, -SQRT_3 / 2.0, 0.0],
    [0.5, -SQRT_3 / 2.0, 0.0]
];

const APEX: [f64; 3] = [0.0, 0.0, 1.0];
const NADIR: [f64; 3] = [0.0, 0.0, -1.0];

fn with_axials(plane: &[[f64; 3]], axials: &[[f64; 3]]) -> Vec<[f64; 3]> {
    plane.iter().chain(axials.iter()).copied().collect()
}

lazy_static! {
    pub static ref LINE: Shape = shape(
        Name::Line,
        &[[1.0, 0.0, 0.0], [-1.0, 0.0, 0.0]],
        &[&[1, 0]],
        None
    );

    /// Bent at 107°
    pub static ref BENT: Shape = shape(
        Name::Bent,
        &[[1.0, 0.0, 0.0], [-0.292371704722737, 0.956304755963036, 0.0]],
        &[&[1, 0]],
        None
    );

    pub static ref EQUILATERAL_TRIANGLE: Shape = shape(
        Name::EquilateralTriangle,
        &TRIANGLE,
        &[&[1, 2, 0], &[0, 2, 1]],
        None
    );

    /// Monovacant tetrahedron, often called trigonal pyramidal
    pub static ref VACANT_TETRAHEDRON: Shape = shape(
        Name::VacantTetrahedron,
        &[
            [0.0, -0.366501, 0.930418],
            [0.805765, -0.366501, -0.465209],
            [-0.805765, -0.366501, -0.465209]
        ],
        &[&[2, 0, 1]],
        Some(&[0, 2, 1])
    );

    pub static ref T_SHAPE: Shape = shape(
        Name::T,
        &[[-1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0]],
        &[&[2, 1, 0]],
        None
    );

    pub static ref TETRAHEDRON: Shape = shape(
        Name::Tetrahedron,
        &[
            [-SQRT_2 / 3.0, SQRT_2 / SQRT_3, -1.0 / 3.0],
            [0.0, 0.0, 1.0],
            [2.0 * SQRT_2 / 3.0, 0.0, -1.0 / 3.0],
            [-SQRT_2 / 3.0, -SQRT_2 / SQRT_3, -1.0 / 3.0]
        ],
        &[&[0, 3, 1, 2], &[2, 1, 3, 0], &[3, 0, 2, 1], &[1, 2, 0, 3]],
        Some(&[0, 2, 1, 3])
    );

    pub static ref SQUARE: Shape = shape(
        Name::Square,
        &SQUARE_PLANE,
        &[&[3, 0, 1, 2], &[1, 0, 3, 2], &[3, 2, 1, 0]],
        None
    );

    /// Equatorially monovacant trigonal bipyramid
    pub static ref SEESAW: Shape = shape(
        Name::Seesaw,
        &[
            [0.0, 1.0, 0.0],
            [1.0, 0.0, 0.0],
            [-0.5, 0.0, -SQRT_3 / 2.0],
            [0.0, -1.0, 0.0]
        ],
        &[&[3, 2, 1, 0]],
        Some(&[0, 2, 1, 3])
    );

    /// Face-centered trigonal pyramid
    pub static ref TRIGONAL_PYRAMID: Shape = shape(
        Name::TrigonalPyramid,
        &with_axials(&TRIANGLE, &[APEX]),
        &[&[2, 0, 1, 3]],
        Some(&[0, 2, 1, 3])
    );

    pub static ref SQUARE_PYRAMID: Shape = shape(
        Name::SquarePyramid,
        &with_axials(&SQUARE_PLANE, &[APEX]),
        &[&[3, 0, 1, 2, 4]],
        Some(&[1, 0, 3, 2, 4])
    );

    pub static ref TRIGONAL_BIPYRAMID: Shape = shape(
        Name::TrigonalBipyramid,
        &with_axials(&TRIANGLE, &[APEX, NADIR]),
        &[&[2, 0, 1, 3, 4], &[0, 2, 1, 4, 3]],
        Some(&[0, 2, 1, 3, 4])
    );

    pub static ref PENTAGON: Shape = shape(
        Name::Pentagon,
        &PENTAGON_PLANE,
        &[&[4, 0, 1, 2, 3], &[0, 4, 3, 2, 1]],
        None
    );

    pub static ref OCTAHEDRON: Shape = shape(
        Name::Octahedron,
        &with_axials(&SQUARE_PLANE, &[APEX, NADIR]),
        &[&[3, 0, 1, 2, 4, 5], &[0, 5, 2, 4, 1, 3], &[4, 1, 5, 3, 2, 0]],
        Some(&[1, 0, 3, 2, 4, 5])
    );

    pub static ref TRIGONAL_PRISM: Shape = shape(
        Name::TrigonalPrism,
        &[
            [0.755929, 0.0, 0.654654],
            [-0.377964, 0.654654, 0.654654],
            [-0.377964, -0.654654, 0.654654],
            [0.755929, 0.0, -0.654654],
            [-0.377964, 0.654654, -0.654654],
            [-0.377964, -0.654654, -0.654654]
        ],
        &[&[2, 0, 1, 5, 3, 4], &[3, 5, 4, 0, 2, 1]],
        Some(&[0, 2, 1, 3, 5, 4])
    );

    pub static ref PENTAGONAL_PYRAMID: Shape = shape(
        Name::PentagonalPyramid,
        &with_axials(&PENTAGON_PLANE, &[APEX]),
        &[&[4, 0, 1, 2, 3, 5]],
        Some(&[0, 4, 3, 2, 1, 5])
    );

    pub static ref HEXAGON: Shape = shape(
        Name::Hexagon,
        &HEXAGON_PLANE,
        &[&[5, 0, 1, 2, 3, 4], &[0, 5, 4, 3, 2, 1]],
        None
    );

    pub static ref PENTAGONAL_BIPYRAMID: Shape = shape(
        Name::PentagonalBipyramid,
        &with_axials(&PENTAGON_PLANE, &[APEX, NADIR]),
        &[&[4, 0, 1, 2, 3, 5, 6], &[1, 0, 4, 3, 2, 6, 5]],
        Some(&[0, 4, 3, 2, 1, 5, 6])
    );

    /// Face-capped octahedron
    pub static ref CAPPED_OCTAHEDRON: Shape = shape(
        Name::CappedOctahedron,
        &[
            [0.0, 0.0, 1.0],
            [0.957729, 0.0, 0.287673],
            [-0.478864, 0.829418, 0.287673],
            [-0.478864, -0.829418, 0.287673],
            [0.389831, 0.675207, -0.6262],
            [-0.779662, 0.0, -0.6262],
            [0.389831, -0.675207, -0.6262]
        ],
        &[&[0, 3, 1, 2, 6, 4, 5]],
        Some(&[0, 1, 3, 2, 6, 5, 4])
    );

    /// Square-face capped trigonal prism
    pub static ref CAPPED_TRIGONAL_PRISM: Shape = shape(
        Name::CappedTrigonalPrism,
        &[
            [0.0, 0.0, 1.0],
            [0.984798, -0.069552, 0.159173],
            [-0.069552, 0.984798, 0.159173],
            [-0.984798, 0.069552, 0.159173],
            [0.069552, -0.984798, 0.159173],
            [0.413726, 0.413726, -0.810964],
            [-0.413726, -0.413726, -0.810964]
        ],
        &[&[0, 3, 4, 1, 2, 6, 5]],
        Some(&[0, 2, 1, 4, 3, 5, 6])
    );

    pub static ref SQUARE_ANTIPRISM: Shape = shape(
        Name::SquareAntiprism,
        &[
            [0.607781, 0.607781, 0.511081],
            [-0.607781, 0.607781, 0.511081],
            [-0.607781, -0.607781, 0.511081],
            [0.607781, -0.607781, 0.511081],
            [0.859533, 0.0, -0.511081],
            [0.0, 0.859533, -0.511081],
            [-0.859533, 0.0, -0.511081],
            [0.0, -0.859533, -0.511081]
        ],
        &[&[3, 0, 1, 2, 7, 4, 5, 6], &[5, 4, 7, 6, 1, 0, 3, 2]],
        Some(&[0, 3, 2, 1, 5, 4, 7, 6])
    );

    pub static ref CUBE: Shape = shape(
        Name::Cube,
        &[
            [SQRT_FRAC_1_3, SQRT_FRAC_1_3, SQRT_FRAC_1_3],
            [SQRT_FRAC_1_3, -SQRT_FRAC_1_3, SQRT_FRAC_1_3],
            [SQRT_FRAC_1_3, -SQRT_FRAC_1_3, -SQRT_FRAC_1_3],
            [SQRT_FRAC_1_3, SQRT_FRAC_1_3, -SQRT_FRAC_1_3],
            [-SQRT_FRAC_1_3, SQRT_FRAC_1_3, SQRT_FRAC_1_3],
            [-SQRT_FRAC_1_3, -SQRT_FRAC_1_3, SQRT_FRAC_1_3],
            [-SQRT_FRAC_1_3, -SQRT_FRAC_1_3, -SQRT_FRAC_1_3],
            [-SQRT_FRAC_1_3, SQRT_FRAC_1_3, -SQRT_FRAC_1_3]
        ],
        &[&[3, 0, 1, 2, 7, 4, 5, 6], &[4, 5, 1, 0, 7, 6, 2, 3]],
        Some(&[1, 0, 3, 2, 5, 4, 7, 6])
    );

    /// Snub disphenoid
    pub static ref TRIGONAL_DODECAHEDRON: Shape = shape(
        Name::TrigonalDodecahedron,
        &[
            [0.620913, 0.0, -0.78388],
            [-0.620913, 0.0, -0.78388],
            [0.0, 0.620913, 0.78388],
            [0.0, -0.620913, 0.78388],
            [0.950273, 0.0, 0.311417],
            [-0.950273, 0.0, 0.311417],
            [0.0, 0.950273, -0.311417],
            [0.0, -0.950273, -0.311417]
        ],
        &[&[1, 0, 3, 2, 5, 4, 7, 6], &[2, 3, 0, 1, 6, 7, 4, 5]],
        Some(&[0, 1, 3, 2, 4, 5, 7, 6])
    );

    pub static ref HEXAGONAL_BIPYRAMID: Shape = shape(
        Name::HexagonalBipyramid,
        &with_axials(&HEXAGON_PLANE, &[APEX, NADIR]),
        &[&[5, 0, 1, 2, 3, 4, 6, 7], &[0, 5, 4, 3, 2, 1, 7, 6]],
        Some(&[0, 5, 4, 3, 2, 1, 6, 7])
    );

    /// All shapes, ordered by size and within a size by catalog preference
    pub static ref SHAPES: Vec<&'static Shape> = vec![
        &LINE, &BENT,
        &EQUILATERAL_TRIANGLE, &VACANT_TETRAHEDRON, &T_SHAPE,
        &TETRAHEDRON, &SQUARE, &SEESAW, &TRIGONAL_PYRAMID,
        &SQUARE_PYRAMID, &TRIGONAL_BIPYRAMID, &PENTAGON,
        &OCTAHEDRON, &TRIGONAL_PRISM, &PENTAGONAL_PYRAMID, &HEXAGON,
        &PENTAGONAL_BIPYRAMID, &CAPPED_OCTAHEDRON, &CAPPED_TRIGONAL_PRISM,
        &SQUARE_ANTIPRISM, &CUBE, &TRIGONAL_DODECAHEDRON, &HEXAGONAL_BIPYRAMID
    ];
}

#[cfg(test)]
mod tests {
    use crate::shapes::*;
    use crate::shapes::similarity::unit_sphere_normalize;
    use crate::strong::matrix::Positions;
    use crate::strong::bijection::Bijectable;

    #[test]
    fn coordinates_on_unit_sphere() {
        for shape in SHAPES.iter() {
            for (i, col) in shape.coordinates.column_iter().enumerate() {
                let deviation = (col.norm() - 1.0).abs();
                assert!(deviation < 1e-5, "Vertex {} of {} is off the unit sphere by {:e}", i, shape.name, deviation);
            }
        }
    }

    #[test]
    fn rotations_are_rotations() {
        for shape in SHAPES.iter() {
            let coordinates = Positions::<Vertex>::wrap(unit_sphere_normalize(shape.coordinates.clone()));
            for rotation in shape.rotation_basis.iter() {
                let rotated = coordinates.biject(rotation).expect("Matching sizes");
                let fit = coordinates.quaternion_fit_rotor(&rotated);
                assert!(fit.msd < 1e-6, "Basis element {} of {} is not a rotation", rotation, shape.name);
            }
        }
    }

    #[test]
    fn mirrors_are_improper() {
        for shape in SHAPES.iter() {
            let rotations = shape.generate_rotations();
            if let Some(mirror) = &shape.mirror {
                assert!(!rotations.contains(mirror), "Mirror of {} is a rotation", shape.name);

                // Reflecting and inverting the coordinates is a rotation
                let coordinates = unit_sphere_normalize(shape.coordinates.clone());
                let inverted = Positions::<Vertex>::wrap(-1.0 * coordinates.clone());
                let mirrored = inverted.biject(mirror).expect("Matching sizes");
                let fit = crate::quaternions::fit(&coordinates, &mirrored.matrix);
                assert!(fit.msd < 1e-4, "Mirror of {} does not reflect its coordinates", shape.name);
            }
        }
    }
}
