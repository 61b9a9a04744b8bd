use std::collections::{HashMap, HashSet, BTreeSet};
use petgraph::stable_graph::{StableGraph, NodeIndex};
use petgraph::unionfind::UnionFind;
use petgraph::visit::{Bfs, EdgeRef, IntoEdgeReferences, NodeIndexable, Walker};
use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::strong::IndexBase;
use crate::stereo::OrderedPair;

pub mod element;
pub mod ranking;
pub mod resolve;
pub mod stereo;
pub mod split;

pub use element::Element;

/// Nucleus is an index that refers to the core of an atom in a molecule
/// and simultaneously a vertex of the molecular graph
///
/// Indices are stable across mutations until the atom is removed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Nucleus(NodeIndex);

impl IndexBase for Nucleus {
    type Type = usize;

    fn get(&self) -> Self::Type {
        self.0.index()
    }
}

impl From<usize> for Nucleus {
    fn from(original: usize) -> Nucleus {
        Nucleus(NodeIndex::new(original))
    }
}

impl From<Nucleus> for usize {
    fn from(val: Nucleus) -> Self {
        val.0.index()
    }
}

impl From<NodeIndex> for Nucleus {
    fn from(val: NodeIndex) -> Self {
        Nucleus(val)
    }
}

impl std::fmt::Display for Nucleus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.index())
    }
}

/// Sites are one or more atoms bound at a single shape vertex of a center
#[derive(IndexBase, Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Site(usize);

/// Atom data of a graph vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Atom {
    pub element: Element,
    pub charge: i8
}

impl Atom {
    /// Neutral atom of an element
    pub fn new(element: Element) -> Atom {
        Atom {element, charge: 0}
    }

    pub fn with_charge(self, charge: i8) -> Atom {
        Atom {charge, ..self}
    }
}

impl From<Element> for Atom {
    fn from(element: Element) -> Atom {
        Atom::new(element)
    }
}

/// Bond type information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Bond {
    /// Integer bond order (formal orders up to six exist)
    Regular(u8),
    /// Indicates bond is between member of a multi-atom site and the coordination target of the
    /// site
    Eta
}

impl Bond {
    pub const SINGLE: Bond = Bond::Regular(1);
    pub const DOUBLE: Bond = Bond::Regular(2);
    pub const TRIPLE: Bond = Bond::Regular(3);

    /// Bond order as counted in ranking, eta bonds counting as single
    pub fn order(&self) -> u8 {
        match self {
            Bond::Regular(order) => *order,
            Bond::Eta => 1
        }
    }
}

/// Depth cue of a drawn bond, seen from its narrow end
///
/// Only consulted for centers whose positions carry no depth of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StereoHint {
    /// Wide end points towards the viewer
    Wedge,
    /// Wide end points away from the viewer
    Dash
}

/// Errors arising in molecular graph manipulation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Atom {0} is not part of the molecule")]
    UnknownAtom(Nucleus),
    #[error("No bond between atoms {0} and {1}")]
    UnknownBond(Nucleus, Nucleus),
    #[error("Atom {0} cannot be bonded to itself")]
    SelfLoop(Nucleus),
    #[error("Atoms {0} and {1} are already bonded")]
    DuplicateBond(Nucleus, Nucleus),
    #[error("Expected positions for {expected} atoms, got {found}")]
    PositionCountMismatch {
        expected: usize,
        found: usize
    }
}

/// Underlying representation of the graph part of the molecule: atoms as vertices, discrete bond
/// types as edges.
type Graph = StableGraph<Atom, Bond, petgraph::Undirected>;

/// Molecular graph with perceived stereocenters
///
/// Any mutation clears the stereo of every atom and bond in the connected
/// components it touches, both before and after the change. Stereo must then
/// be perceived again.
#[derive(Clone, Default)]
pub struct Molecule {
    graph: Graph,
    atom_stereo: HashMap<Nucleus, stereo::AtomStereo>,
    bond_stereo: HashMap<OrderedPair<Nucleus>, stereo::BondStereo>,
    /// Narrow end and depth cue of hinted bonds
    hints: HashMap<OrderedPair<Nucleus>, (Nucleus, StereoHint)>
}

impl Molecule {
    /// Empty molecule
    pub fn new() -> Molecule {
        Molecule::default()
    }

    /// Molecule from an atom list and a bond list referring to atom list positions
    ///
    /// ```
    /// # use stereomol::molecule::{Molecule, Atom, Bond, Element};
    /// let water = Molecule::from_parts(
    ///     &[Atom::new(Element::O), Atom::new(Element::H), Atom::new(Element::H)],
    ///     &[(0, 1, Bond::SINGLE), (0, 2, Bond::SINGLE)]
    /// ).unwrap();
    /// assert_eq!(water.atom_count(), 3);
    /// assert_eq!(water.bond_count(), 2);
    /// assert!(Molecule::from_parts(&[Atom::new(Element::H)], &[(0, 1, Bond::SINGLE)]).is_err());
    /// ```
    pub fn from_parts(atoms: &[Atom], bonds: &[(usize, usize, Bond)]) -> Result<Molecule, GraphError> {
        Molecule::from_parts_with_hints(atoms, bonds, &[])
    }

    /// Molecule from atom and bond lists with depth cues of drawn bonds
    ///
    /// Each hint names the narrow end first. Hinted bonds must be in the bond
    /// list.
    ///
    /// ```
    /// # use stereomol::molecule::{Molecule, Atom, Bond, Element, Nucleus, StereoHint};
    /// let atoms = [Atom::new(Element::C), Atom::new(Element::F)];
    /// let m = Molecule::from_parts_with_hints(&atoms, &[(0, 1, Bond::SINGLE)], &[(0, 1, StereoHint::Wedge)]).unwrap();
    /// assert_eq!(m.stereo_hint(Nucleus::from(1), Nucleus::from(0)), Some((Nucleus::from(0), StereoHint::Wedge)));
    /// assert!(Molecule::from_parts_with_hints(&atoms, &[], &[(0, 1, StereoHint::Dash)]).is_err());
    /// ```
    pub fn from_parts_with_hints(
        atoms: &[Atom],
        bonds: &[(usize, usize, Bond)],
        hints: &[(usize, usize, StereoHint)]
    ) -> Result<Molecule, GraphError> {
        let mut molecule = Molecule {
            graph: Graph::with_capacity(atoms.len(), bonds.len()),
            ..Molecule::default()
        };
        for atom in atoms {
            molecule.graph.add_node(*atom);
        }
        for &(i, j, bond) in bonds {
            molecule.add_bond(Nucleus::from(i), Nucleus::from(j), bond)?;
        }
        for &(i, j, hint) in hints {
            molecule.set_stereo_hint(Nucleus::from(i), Nucleus::from(j), Some(hint))?;
        }

        Ok(molecule)
    }

    /// Number of atoms
    pub fn atom_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of bonds
    pub fn bond_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Upper bound on atom indices, including removed ones
    pub fn index_bound(&self) -> usize {
        self.graph.node_bound()
    }

    /// Whether an atom exists
    pub fn contains(&self, nucleus: Nucleus) -> bool {
        self.graph.contains_node(nucleus.0)
    }

    /// Atom data
    pub fn atom(&self, nucleus: Nucleus) -> Option<&Atom> {
        self.graph.node_weight(nucleus.0)
    }

    /// Bond between two atoms, if any
    pub fn bond(&self, a: Nucleus, b: Nucleus) -> Option<Bond> {
        let edge = self.graph.find_edge(a.0, b.0)?;
        self.graph.edge_weight(edge).copied()
    }

    /// Iterate through atoms in ascending index order
    pub fn atoms(&self) -> impl Iterator<Item=Nucleus> + '_ {
        self.graph.node_indices().map(Nucleus)
    }

    /// Iterate through bonds
    pub fn bonds(&self) -> impl Iterator<Item=(Nucleus, Nucleus, Bond)> + '_ {
        self.graph.edge_references()
            .map(|e| (Nucleus(e.source()), Nucleus(e.target()), *e.weight()))
    }

    fn require(&self, nucleus: Nucleus) -> Result<(), GraphError> {
        self.contains(nucleus).then_some(()).ok_or(GraphError::UnknownAtom(nucleus))
    }

    /// Bonded atoms, in ascending index order
    pub fn neighbors(&self, nucleus: Nucleus) -> Result<Vec<Nucleus>, GraphError> {
        self.require(nucleus)?;
        let mut neighbors: Vec<Nucleus> = self.graph.neighbors(nucleus.0).map(Nucleus).collect();
        neighbors.sort();
        Ok(neighbors)
    }

    /// Add an unbonded atom
    pub fn add_atom(&mut self, atom: Atom) -> Nucleus {
        Nucleus(self.graph.add_node(atom))
    }

    /// Remove an atom and all its bonds
    pub fn remove_atom(&mut self, nucleus: Nucleus) -> Result<Atom, GraphError> {
        self.require(nucleus)?;
        let neighbors = self.neighbors(nucleus)?;
        self.invalidate_around(&[nucleus]);
        self.hints.retain(|OrderedPair(a, b), _| *a != nucleus && *b != nucleus);
        let atom = self.graph.remove_node(nucleus.0).ok_or(GraphError::UnknownAtom(nucleus))?;
        self.invalidate_around(&neighbors);
        Ok(atom)
    }

    /// Bond two distinct, unbonded atoms
    pub fn add_bond(&mut self, a: Nucleus, b: Nucleus, bond: Bond) -> Result<(), GraphError> {
        self.require(a)?;
        self.require(b)?;
        if a == b {
            return Err(GraphError::SelfLoop(a));
        }
        if self.graph.contains_edge(a.0, b.0) {
            return Err(GraphError::DuplicateBond(a, b));
        }

        self.invalidate_around(&[a, b]);
        self.graph.add_edge(a.0, b.0, bond);
        Ok(())
    }

    /// Remove the bond between two atoms
    pub fn remove_bond(&mut self, a: Nucleus, b: Nucleus) -> Result<Bond, GraphError> {
        self.require(a)?;
        self.require(b)?;
        let edge = self.graph.find_edge(a.0, b.0).ok_or(GraphError::UnknownBond(a, b))?;
        self.invalidate_around(&[a, b]);
        let bond = self.graph.remove_edge(edge).ok_or(GraphError::UnknownBond(a, b))?;
        self.hints.remove(&OrderedPair::new(a, b));
        self.invalidate_around(&[a, b]);
        Ok(bond)
    }

    /// Set or clear the depth cue of a bond drawn from `from` to `to`
    pub fn set_stereo_hint(&mut self, from: Nucleus, to: Nucleus, hint: Option<StereoHint>) -> Result<(), GraphError> {
        self.require(from)?;
        self.require(to)?;
        if !self.graph.contains_edge(from.0, to.0) {
            return Err(GraphError::UnknownBond(from, to));
        }

        let key = OrderedPair::new(from, to);
        match hint {
            Some(hint) => { self.hints.insert(key, (from, hint)); },
            None => { self.hints.remove(&key); }
        }
        Ok(())
    }

    /// Narrow end and depth cue of a bond, if hinted
    pub fn stereo_hint(&self, a: Nucleus, b: Nucleus) -> Option<(Nucleus, StereoHint)> {
        self.hints.get(&OrderedPair::new(a, b)).copied()
    }

    /// Hinted bonds as narrow end, wide end and depth cue, in ascending order
    pub fn stereo_hints(&self) -> Vec<(Nucleus, Nucleus, StereoHint)> {
        let mut hints: Vec<(Nucleus, Nucleus, StereoHint)> = self.hints.iter()
            .map(|(&OrderedPair(a, b), &(from, hint))| (from, if from == a { b } else { a }, hint))
            .collect();
        hints.sort_by_key(|&(from, to, _)| (from, to));
        hints
    }

    /// Change the type of an existing bond
    pub fn set_bond(&mut self, a: Nucleus, b: Nucleus, bond: Bond) -> Result<Bond, GraphError> {
        self.require(a)?;
        self.require(b)?;
        let edge = self.graph.find_edge(a.0, b.0).ok_or(GraphError::UnknownBond(a, b))?;
        self.invalidate_around(&[a, b]);
        let weight = self.graph.edge_weight_mut(edge).ok_or(GraphError::UnknownBond(a, b))?;
        Ok(std::mem::replace(weight, bond))
    }

    /// Atoms connected to an atom, itself included, in ascending index order
    pub fn component_of(&self, nucleus: Nucleus) -> Result<Vec<Nucleus>, GraphError> {
        self.require(nucleus)?;
        let mut component: Vec<Nucleus> = Bfs::new(&self.graph, nucleus.0)
            .iter(&self.graph)
            .map(Nucleus)
            .collect();
        component.sort();
        Ok(component)
    }

    /// Connected components, ordered by their lowest atom index
    ///
    /// Atoms within each component are in ascending index order.
    pub fn connected_components(&self) -> Vec<Vec<Nucleus>> {
        let mut sets = UnionFind::new(self.graph.node_bound());
        for edge in self.graph.edge_references() {
            sets.union(self.graph.to_index(edge.source()), self.graph.to_index(edge.target()));
        }

        let mut component_index: HashMap<usize, usize> = HashMap::new();
        let mut components: Vec<Vec<Nucleus>> = Vec::new();
        for node in self.graph.node_indices() {
            let root = sets.find(node.index());
            let index = *component_index.entry(root).or_insert_with(|| {
                components.push(Vec::new());
                components.len() - 1
            });
            components[index].push(Nucleus(node));
        }

        components
    }

    /// Neighbor sites of a center, each one or more atoms
    ///
    /// Atoms bonded by regular bonds are single-atom sites. Atoms bonded by
    /// eta bonds are grouped into one site per connected group among them.
    /// Sites are ordered by their lowest atom index.
    pub fn sites(&self, center: Nucleus) -> Result<Vec<Vec<Nucleus>>, GraphError> {
        let neighbors = self.neighbors(center)?;
        let (eta, regular): (Vec<Nucleus>, Vec<Nucleus>) = neighbors.into_iter()
            .partition(|&n| self.bond(center, n) == Some(Bond::Eta));

        let mut sites: Vec<Vec<Nucleus>> = regular.into_iter().map(|n| vec![n]).collect();

        let mut sets = UnionFind::<usize>::new(eta.len());
        for (i, a) in eta.iter().enumerate() {
            for (j, b) in eta.iter().enumerate().skip(i + 1) {
                if self.graph.contains_edge(a.0, b.0) {
                    sets.union(i, j);
                }
            }
        }
        let mut groups: HashMap<usize, Vec<Nucleus>> = HashMap::new();
        for (i, n) in eta.iter().enumerate() {
            groups.entry(sets.find(i)).or_default().push(*n);
        }
        sites.extend(groups.into_values());

        for site in sites.iter_mut() {
            site.sort();
        }
        sites.sort();
        Ok(sites)
    }

    /// Pairs of sites connected by a path that avoids the center
    pub fn links(&self, center: Nucleus, sites: &[Vec<Nucleus>]) -> Result<Vec<OrderedPair<Site>>, GraphError> {
        self.require(center)?;
        let site_of: HashMap<Nucleus, usize> = sites.iter()
            .enumerate()
            .flat_map(|(i, atoms)| atoms.iter().map(move |&a| (a, i)))
            .collect();

        let mut links = BTreeSet::new();
        for (i, atoms) in sites.iter().enumerate() {
            let mut visited: HashSet<Nucleus> = atoms.iter().copied().collect();
            visited.insert(center);
            let mut frontier: Vec<Nucleus> = atoms.clone();
            while let Some(current) = frontier.pop() {
                for next in self.graph.neighbors(current.0).map(Nucleus) {
                    if !visited.insert(next) {
                        continue;
                    }
                    if let Some(&j) = site_of.get(&next) {
                        if j != i {
                            links.insert(OrderedPair::new(Site::from(i), Site::from(j)));
                        }
                    }
                    frontier.push(next);
                }
            }
        }

        Ok(links.into_iter().collect())
    }

    /// Clear stereo of everything in the connected components of some atoms
    fn invalidate_around(&mut self, atoms: &[Nucleus]) {
        if self.atom_stereo.is_empty() && self.bond_stereo.is_empty() {
            return;
        }

        let affected: HashSet<Nucleus> = atoms.iter()
            .filter_map(|&n| self.component_of(n).ok())
            .flatten()
            .collect();
        let before = self.atom_stereo.len() + self.bond_stereo.len();
        self.atom_stereo.retain(|n, _| !affected.contains(n));
        self.bond_stereo.retain(|OrderedPair(a, b), _| !affected.contains(a) && !affected.contains(b));
        tracing::trace!(
            "Invalidated {} stereocenters",
            before - self.atom_stereo.len() - self.bond_stereo.len()
        );
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use crate::molecule::*;

    /// Build a molecule from element symbols and single bonds
    pub fn molecule(symbols: &[&str], bonds: &[(usize, usize)]) -> Molecule {
        let atoms: Vec<Atom> = symbols.iter()
            .map(|s| Atom::new(Element::from_symbol(s).expect("Valid element symbol")))
            .collect();
        let bonds: Vec<(usize, usize, Bond)> = bonds.iter().map(|&(i, j)| (i, j, Bond::SINGLE)).collect();
        Molecule::from_parts(&atoms, &bonds).expect("Valid molecule")
    }

    pub fn n(i: usize) -> Nucleus {
        Nucleus::from(i)
    }

    #[test]
    fn mutation() {
        let mut m = molecule(&["C", "O", "H"], &[(0, 1)]);
        assert_eq!(m.neighbors(n(0)), Ok(vec![n(1)]));

        m.add_bond(n(0), n(2), Bond::SINGLE).unwrap();
        assert_eq!(m.add_bond(n(2), n(0), Bond::SINGLE), Err(GraphError::DuplicateBond(n(2), n(0))));
        assert_eq!(m.add_bond(n(1), n(1), Bond::SINGLE), Err(GraphError::SelfLoop(n(1))));
        assert_eq!(m.set_bond(n(0), n(1), Bond::DOUBLE), Ok(Bond::SINGLE));
        assert_eq!(m.bond(n(1), n(0)), Some(Bond::DOUBLE));

        assert_eq!(m.remove_atom(n(0)).map(|a| a.element), Ok(Element::C));
        assert_eq!(m.bond_count(), 0);
        assert_eq!(m.remove_atom(n(0)), Err(GraphError::UnknownAtom(n(0))));
        assert_eq!(m.neighbors(n(0)), Err(GraphError::UnknownAtom(n(0))));
        assert_eq!(m.remove_bond(n(1), n(2)), Err(GraphError::UnknownBond(n(1), n(2))));

        // Indices of remaining atoms are stable
        assert_eq!(m.atom(n(2)).map(|a| a.element), Some(Element::H));
        let added = m.add_atom(Atom::new(Element::N).with_charge(1));
        assert!(m.contains(added));
        assert_eq!(m.atom(added).map(|a| a.charge), Some(1));
    }

    #[test]
    fn hints_follow_bonds() {
        let mut m = molecule(&["C", "F", "Cl", "H"], &[(0, 1), (0, 2), (0, 3)]);
        assert_eq!(m.set_stereo_hint(n(1), n(2), Some(StereoHint::Wedge)), Err(GraphError::UnknownBond(n(1), n(2))));

        m.set_stereo_hint(n(0), n(1), Some(StereoHint::Wedge)).unwrap();
        m.set_stereo_hint(n(2), n(0), Some(StereoHint::Dash)).unwrap();
        m.set_stereo_hint(n(0), n(3), Some(StereoHint::Dash)).unwrap();
        assert_eq!(m.stereo_hint(n(1), n(0)), Some((n(0), StereoHint::Wedge)));
        assert_eq!(m.stereo_hint(n(0), n(2)), Some((n(2), StereoHint::Dash)));
        assert_eq!(m.stereo_hints(), vec![
            (n(0), n(1), StereoHint::Wedge),
            (n(0), n(3), StereoHint::Dash),
            (n(2), n(0), StereoHint::Dash)
        ]);

        m.set_stereo_hint(n(0), n(3), None).unwrap();
        assert_eq!(m.stereo_hint(n(0), n(3)), None);
        m.remove_bond(n(0), n(1)).unwrap();
        assert_eq!(m.stereo_hint(n(0), n(1)), None);
        m.remove_atom(n(2)).unwrap();
        assert!(m.stereo_hints().is_empty());
    }

    #[test]
    fn components() {
        let m = molecule(&["C", "C", "O", "N", "H", "Cl"], &[(0, 1), (3, 4), (1, 2)]);
        assert_eq!(
            m.connected_components(),
            vec![vec![n(0), n(1), n(2)], vec![n(3), n(4)], vec![n(5)]]
        );
        assert_eq!(m.component_of(n(4)), Ok(vec![n(3), n(4)]));
        assert!(Molecule::new().connected_components().is_empty());
    }

    #[test]
    fn haptic_sites() {
        // Fe with a cyclopentadienyl ring and two chlorides
        let mut m = molecule(&["Fe", "C", "C", "C", "C", "C", "Cl", "Cl"], &[
            (1, 2), (2, 3), (3, 4), (4, 5), (5, 1), (0, 6), (0, 7)
        ]);
        for c in 1..=5 {
            m.add_bond(n(0), n(c), Bond::Eta).unwrap();
        }

        let sites = m.sites(n(0)).unwrap();
        assert_eq!(sites, vec![vec![n(1), n(2), n(3), n(4), n(5)], vec![n(6)], vec![n(7)]]);
        assert!(m.links(n(0), &sites).unwrap().is_empty());
    }

    #[test]
    fn chelate_links() {
        // Metal with an ethylenediamine-like chelate and a separate ligand
        let m = molecule(&["Co", "N", "C", "C", "N", "Cl"], &[
            (0, 1), (1, 2), (2, 3), (3, 4), (4, 0), (0, 5)
        ]);
        let sites = m.sites(n(0)).unwrap();
        assert_eq!(sites.len(), 3);
        assert_eq!(
            m.links(n(0), &sites).unwrap(),
            vec![OrderedPair::new(Site::from(0), Site::from(1))]
        );
    }
}
