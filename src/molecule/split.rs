use std::collections::HashMap;

use crate::molecule::{Molecule, Nucleus, GraphError};
use crate::quaternions::Matrix3N;
use crate::strong::IndexBase;
use crate::strong::matrix::Positions;

/// A connected component split off a molecule
///
/// Atoms are renumbered densely in order of their original indices. Depth
/// cues of drawn bonds are carried over, perceived stereo is not.
#[derive(Clone)]
pub struct Part {
    pub molecule: Molecule,
    /// Original atom of each atom of the part
    pub original: Vec<Nucleus>,
    pub positions: Option<Positions<Nucleus>>
}

impl Part {
    /// Original index of an atom of the part
    pub fn original_of(&self, nucleus: Nucleus) -> Option<Nucleus> {
        self.original.get(nucleus.get()).copied()
    }
}

/// Split a molecule into its connected components
///
/// Parts are ordered by the lowest original atom index they contain. An
/// empty molecule yields no parts.
///
/// ```
/// # use stereomol::molecule::{Molecule, Atom, Bond, Element, Nucleus};
/// # use stereomol::molecule::split::split;
/// let salt = Molecule::from_parts(
///     &[Atom::new(Element::CL).with_charge(-1), Atom::new(Element::H), Atom::new(Element::O), Atom::new(Element::H)],
///     &[(1, 2, Bond::SINGLE), (2, 3, Bond::SINGLE)]
/// ).unwrap();
/// let parts = split(&salt);
/// assert_eq!(parts.len(), 2);
/// assert_eq!(parts[1].original_of(Nucleus::from(0)), Some(Nucleus::from(1)));
/// ```
pub fn split(molecule: &Molecule) -> Vec<Part> {
    let components = molecule.connected_components();

    let mut location: HashMap<Nucleus, (usize, Nucleus)> = HashMap::with_capacity(molecule.atom_count());
    let mut parts: Vec<Part> = components.into_iter()
        .enumerate()
        .map(|(c, atoms)| {
            let mut part = Molecule::new();
            for &atom in atoms.iter() {
                if let Some(data) = molecule.atom(atom) {
                    location.insert(atom, (c, part.add_atom(*data)));
                }
            }
            Part {molecule: part, original: atoms, positions: None}
        })
        .collect();

    for (a, b, bond) in molecule.bonds() {
        if let (Some(&(c, i)), Some(&(_, j))) = (location.get(&a), location.get(&b)) {
            if let Err(error) = parts[c].molecule.add_bond(i, j, bond) {
                tracing::warn!("Dropping bond {}-{} while splitting: {}", a, b, error);
            }
        }
    }

    for (from, to, hint) in molecule.stereo_hints() {
        if let (Some(&(c, i)), Some(&(_, j))) = (location.get(&from), location.get(&to)) {
            if let Err(error) = parts[c].molecule.set_stereo_hint(i, j, Some(hint)) {
                tracing::warn!("Dropping hint on bond {}-{} while splitting: {}", from, to, error);
            }
        }
    }

    tracing::debug!("Split molecule into {} parts", parts.len());
    parts
}

/// Split a molecule and its positions into connected components
pub fn split_with_positions(molecule: &Molecule, positions: &Positions<Nucleus>) -> Result<Vec<Part>, GraphError> {
    if positions.len() < molecule.index_bound() {
        return Err(GraphError::PositionCountMismatch {expected: molecule.index_bound(), found: positions.len()});
    }

    let mut parts = split(molecule);
    for part in parts.iter_mut() {
        let mut matrix = Matrix3N::zeros(part.original.len());
        for (column, &atom) in part.original.iter().enumerate() {
            let point = positions.point(atom)
                .ok_or(GraphError::PositionCountMismatch {expected: atom.get() + 1, found: positions.len()})?;
            matrix.set_column(column, &point);
        }
        part.positions = Some(Positions::wrap(matrix));
    }

    Ok(parts)
}
