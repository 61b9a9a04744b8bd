extern crate nalgebra as na;

pub type Matrix3N = na::Matrix3xX<f64>;
pub type Matrix3 = na::Matrix3<f64>;
pub type Quaternion = na::UnitQuaternion<f64>;
type Matrix4 = na::Matrix4<f64>;

/// Uniformly random axis with a random angle in `[0, pi)`
pub fn random_rotation() -> Quaternion {
    let random_axis = na::Unit::new_normalize(na::Vector3::new_random() - na::Vector3::repeat(0.5));
    let random_angle = rand::random::<f64>() * std::f64::consts::PI;
    Quaternion::from_axis_angle(&random_axis, random_angle)
}

fn pair_contribution(stator_col: &na::VectorView3<f64>, rotor_col: &na::VectorView3<f64>) -> Matrix4 {
    let mut a = Matrix4::zeros();

    let forward_difference = (rotor_col - stator_col).transpose();
    a.fixed_view_mut::<1, 3>(0, 1).copy_from(&forward_difference);
    a.fixed_view_mut::<3, 1>(1, 0).copy_from(&(stator_col - rotor_col));

    let sum = stator_col + rotor_col;
    for (i, unit) in Matrix3::identity().column_iter().enumerate() {
        a.fixed_view_mut::<3, 1>(1, 1 + i).copy_from(&unit.cross(&sum));
    }

    a.transpose() * a
}

/// Result of a quaternion superposition
#[derive(Debug, Clone)]
pub struct Fit {
    /// Rotation taking the stator onto the rotor
    pub quaternion: Quaternion,
    /// Sum of squared deviations after rotation
    pub msd: f64
}

impl Fit {
    /// Rotate stator coordinates onto the rotor
    pub fn rotate_stator(&self, stator: &Matrix3N) -> Matrix3N {
        self.quaternion.to_rotation_matrix() * stator
    }
}

fn decompose(mat: Matrix4) -> Fit {
    let decomposition = na::SymmetricEigen::new(mat);
    // Eigenvalues are unsorted, the minimal one is the residual of the best proper rotation
    let (min_index, msd) = decomposition.eigenvalues.iter()
        .enumerate()
        .fold((0, f64::INFINITY), |(best_i, best), (i, &value)| {
            if value.total_cmp(&best).is_lt() {
                (i, value)
            } else {
                (best_i, best)
            }
        });

    let q = decomposition.eigenvectors.column(min_index);
    Fit {
        quaternion: Quaternion::from_quaternion(na::Quaternion::new(q[0], q[1], q[2], q[3])),
        msd: msd.max(0.0)
    }
}

/// Find the proper rotation best transforming the stator into the rotor
///
/// Both matrices must have their centroid removed. Afterwards,
/// `rotor ≈ quaternion * stator`, see [`Fit::rotate_stator`].
pub fn fit(stator: &Matrix3N, rotor: &Matrix3N) -> Fit {
    debug_assert!(stator.column_mean().norm_squared() < 1e-8);
    debug_assert!(rotor.column_mean().norm_squared() < 1e-8);

    let a = rotor.column_iter()
        .zip(stator.column_iter())
        .fold(Matrix4::zeros(), |acc, (rotor_col, stator_col)| acc + pair_contribution(&stator_col, &rotor_col));

    decompose(a)
}

#[cfg(test)]
mod tests {
    use crate::quaternions::*;
    use crate::shapes::similarity::unit_sphere_normalize;

    fn random_cloud(n: usize) -> Matrix3N {
        unit_sphere_normalize(Matrix3N::new_random(n))
    }

    #[test]
    fn exact_rotation_is_recovered() {
        let stator = random_cloud(6);
        let rotation = random_rotation();
        let rotor = rotation.to_rotation_matrix() * stator.clone();

        let fit = fit(&stator, &rotor);
        assert!(fit.msd < 1e-8);
        approx::assert_relative_eq!(rotor, fit.rotate_stator(&stator), epsilon = 1e-6);
    }

    #[test]
    fn residual_matches_deviations() {
        let stator = random_cloud(6);
        let rotor = random_rotation().to_rotation_matrix() * stator.clone();
        let distorted = unit_sphere_normalize(rotor + 0.05 * random_cloud(6));

        let fit = fit(&stator, &distorted);
        let msd: f64 = (fit.rotate_stator(&stator) - distorted)
            .column_iter()
            .map(|col| col.norm_squared())
            .sum();

        approx::assert_relative_eq!(msd, fit.msd, epsilon = 1e-6);
    }

    #[test]
    fn inversion_is_not_a_rotation() {
        let stator = random_cloud(5);
        let inverted = -1.0 * stator.clone();
        // A generic cloud cannot be superimposed with its inversion by proper rotation
        assert!(fit(&stator, &inverted).msd > 1e-3);
    }
}
