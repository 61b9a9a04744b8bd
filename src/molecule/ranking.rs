//! Graph-based ranking of the sites around a center
//!
//! Each site atom roots a tree of the paths leading away from the center.
//! An atom is a child of the previous atom on a path unless it already lies
//! on that path, in which case it becomes a ring closure leaf. Bonds of order
//! `b` add `b - 1` duplicate leaves at both ends. The trees of all sites are
//! grown one sphere at a time and only as long as some sites are tied.
//!
//! Nodes of all sites are ranked together by iterative refinement: a node's
//! rank in a round is the dense rank of its own descriptor followed by its
//! children's ranks from the previous round, highest first. Refinement stops
//! once the partition of nodes no longer splits. Sites are then compared
//! round by round by the ranks of their root atoms, so that the nearest
//! difference decides. No step depends on neighbor order.

use std::collections::BTreeMap;

use crate::molecule::{Molecule, Nucleus, Site, GraphError};
use crate::stereo::{Occupation, Rank};
use crate::strong::Index;
use crate::strong::surjection::{Surjection, SurjectionError};

/// Tree size beyond which ties are accepted as they are
const MAX_NODES: usize = 1 << 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum NodeKind {
    Duplicate,
    RingClosure,
    Atom
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct Descriptor {
    atomic_number: u8,
    kind: NodeKind,
    charge: i8
}

struct Node {
    descriptor: Descriptor,
    /// Atom of atom nodes
    atom: Option<Nucleus>,
    parent: Option<usize>,
    children: Vec<usize>
}

struct Digraph {
    center: Nucleus,
    nodes: Vec<Node>,
    /// Root node of each atom of each site
    roots: Vec<Vec<usize>>,
    /// Atom nodes whose children are not yet known
    frontier: Vec<usize>
}

impl Digraph {
    fn new(center: Nucleus) -> Digraph {
        Digraph {center, nodes: Vec::new(), roots: Vec::new(), frontier: Vec::new()}
    }

    fn leaf(&mut self, atomic_number: u8, kind: NodeKind) -> usize {
        self.nodes.push(Node {
            descriptor: Descriptor {atomic_number, kind, charge: 0},
            atom: None,
            parent: None,
            children: Vec::new()
        });
        self.nodes.len() - 1
    }

    /// Add an unexpanded atom node
    fn atom_node(&mut self, molecule: &Molecule, atom: Nucleus, parent: Option<usize>) -> Result<usize, GraphError> {
        let data = molecule.atom(atom).ok_or(GraphError::UnknownAtom(atom))?;
        self.nodes.push(Node {
            descriptor: Descriptor {
                atomic_number: data.element.atomic_number(),
                kind: NodeKind::Atom,
                charge: data.charge
            },
            atom: Some(atom),
            parent,
            children: Vec::new()
        });
        let index = self.nodes.len() - 1;
        self.frontier.push(index);
        Ok(index)
    }

    /// Whether an atom lies on the path from the center to a node
    fn on_path(&self, node: usize, atom: Nucleus) -> bool {
        if atom == self.center {
            return true;
        }

        let mut current = Some(node);
        while let Some(index) = current {
            if self.nodes[index].atom == Some(atom) {
                return true;
            }
            current = self.nodes[index].parent;
        }
        false
    }

    /// Grow every frontier node by one sphere
    fn expand(&mut self, molecule: &Molecule) -> Result<(), GraphError> {
        let element_of = |n: Nucleus| -> Result<u8, GraphError> {
            molecule.atom(n).map(|a| a.element.atomic_number()).ok_or(GraphError::UnknownAtom(n))
        };

        for index in std::mem::take(&mut self.frontier) {
            let Some(atom) = self.nodes[index].atom else { continue };
            let previous = match self.nodes[index].parent {
                Some(parent) => self.nodes[parent].atom,
                None => Some(self.center)
            };

            let mut children = Vec::new();
            for next in molecule.neighbors(atom)? {
                let bond_order = molecule.bond(atom, next).map_or(1, |b| b.order());
                let next_element = element_of(next)?;
                for _ in 1..bond_order {
                    children.push(self.leaf(next_element, NodeKind::Duplicate));
                }

                if Some(next) == previous {
                    continue;
                }
                if self.on_path(index, next) {
                    children.push(self.leaf(next_element, NodeKind::RingClosure));
                } else {
                    children.push(self.atom_node(molecule, next, Some(index))?);
                }
            }
            self.nodes[index].children = children;
        }

        Ok(())
    }

    /// Dense ranks of all nodes per refinement round
    fn refine(&self) -> Vec<Vec<usize>> {
        let dense_rank = |keys: Vec<(Descriptor, Vec<usize>)>| -> (Vec<usize>, usize) {
            let mut classes: BTreeMap<&(Descriptor, Vec<usize>), usize> = keys.iter().map(|k| (k, 0)).collect();
            for (rank, value) in classes.values_mut().enumerate() {
                *value = rank;
            }
            (keys.iter().map(|k| classes[k]).collect(), classes.len())
        };

        let (initial, mut class_count) = dense_rank(
            self.nodes.iter().map(|n| (n.descriptor, Vec::new())).collect()
        );
        let mut rounds = vec![initial];

        while rounds.len() <= self.nodes.len() {
            let Some(previous) = rounds.last() else { break };
            let keys = self.nodes.iter()
                .map(|node| {
                    let mut children: Vec<usize> = node.children.iter().map(|&c| previous[c]).collect();
                    children.sort_unstable_by(|a, b| b.cmp(a));
                    (node.descriptor, children)
                })
                .collect();
            let (ranks, count) = dense_rank(keys);
            tracing::trace!("Ranking refinement round {} yields {} node classes", rounds.len(), count);
            if count == class_count {
                break;
            }
            class_count = count;
            rounds.push(ranks);
        }

        rounds
    }

    /// Sites grouped by their root ranks over all refinement rounds
    fn site_classes(&self) -> Ranking {
        let rounds = self.refine();
        let keys: Vec<Vec<Vec<usize>>> = self.roots.iter()
            .map(|roots| {
                rounds.iter()
                    .map(|ranks| {
                        let mut site_ranks: Vec<usize> = roots.iter().map(|&r| ranks[r]).collect();
                        site_ranks.sort_unstable_by(|a, b| b.cmp(a));
                        site_ranks
                    })
                    .collect()
            })
            .collect();

        let mut by_key: BTreeMap<&Vec<Vec<usize>>, Vec<Site>> = BTreeMap::new();
        for (i, key) in keys.iter().enumerate() {
            by_key.entry(key).or_default().push(Site::from(i));
        }

        Ranking {classes: by_key.into_values().collect()}
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// Ordered partition of the sites of a center
///
/// Classes are ordered by ascending priority: sites of the first class have
/// rank zero.
pub struct Ranking {
    classes: Vec<Vec<Site>>
}

impl Ranking {
    /// Ranking from classes, ordered by ascending priority
    ///
    /// Every site from zero up to the number of sites must occur exactly once
    /// and no class may be empty.
    pub fn from_classes(mut classes: Vec<Vec<Site>>) -> Option<Ranking> {
        let mut all: Vec<usize> = classes.iter().flatten().filter_map(|s| s.to_usize()).collect();
        all.sort_unstable();
        let complete = all.iter().copied().eq(0..all.len());
        if !complete || classes.iter().any(|c| c.is_empty()) {
            return None;
        }

        for class in classes.iter_mut() {
            class.sort();
        }
        Some(Ranking {classes})
    }

    /// Classes, ordered by ascending priority
    pub fn classes(&self) -> &[Vec<Site>] {
        &self.classes
    }

    pub fn site_count(&self) -> usize {
        self.classes.iter().map(Vec::len).sum()
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// Rank of a site, if ranked
    pub fn rank_of(&self, site: Site) -> Option<Rank> {
        self.classes.iter()
            .position(|class| class.contains(&site))
            .map(Rank::from)
    }

    /// Whether no two sites share a rank
    pub fn is_total(&self) -> bool {
        self.classes.iter().all(|c| c.len() == 1)
    }

    /// Site ranks in site order
    pub fn occupation(&self) -> Result<Occupation, SurjectionError> {
        let sigma = Site::range(self.site_count())
            .map(|s| self.rank_of(s).ok_or(SurjectionError::LengthMismatch))
            .collect::<Result<Vec<Rank>, _>>()?;
        Surjection::try_from(sigma)
    }
}

/// Rank the sites of a center by their substituent graphs
///
/// Sites are lists of atoms bonded to the center. Multi-atom sites are ranked
/// by the multiset of ranks of their atoms.
pub fn rank_sites(molecule: &Molecule, center: Nucleus, sites: &[Vec<Nucleus>]) -> Result<Ranking, GraphError> {
    if !molecule.contains(center) {
        return Err(GraphError::UnknownAtom(center));
    }

    let mut digraph = Digraph::new(center);
    for atoms in sites {
        let roots = atoms.iter()
            .map(|&atom| digraph.atom_node(molecule, atom, None))
            .collect::<Result<Vec<usize>, _>>()?;
        digraph.roots.push(roots);
    }

    let mut spheres = 0;
    let ranking = loop {
        let ranking = digraph.site_classes();
        if ranking.is_total() || digraph.frontier.is_empty() {
            break ranking;
        }
        if digraph.nodes.len() > MAX_NODES {
            tracing::warn!(
                "Stopped ranking sites of atom {} after {} spheres with {} classes",
                center, spheres, ranking.class_count()
            );
            break ranking;
        }
        digraph.expand(molecule)?;
        spheres += 1;
    };

    tracing::trace!(
        "Ranked {} sites of atom {} into {} classes over {} spheres",
        sites.len(), center, ranking.class_count(), spheres
    );
    Ok(ranking)
}

impl Molecule {
    /// Rank the sites of a center, as ordered by [`Molecule::sites`]
    pub fn ranking(&self, center: Nucleus) -> Result<Ranking, GraphError> {
        let sites = self.sites(center)?;
        rank_sites(self, center, &sites)
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;
    use crate::molecule::ranking::*;
    use crate::molecule::{Bond, Element};
    use crate::molecule::tests::{molecule, n};
    use crate::strong::IndexBase;

    /// Elements of the first atom of each site, per class
    fn class_elements(m: &Molecule, center: Nucleus) -> Vec<Vec<&'static str>> {
        let sites = m.sites(center).unwrap();
        let ranking = rank_sites(m, center, &sites).unwrap();
        ranking.classes().iter()
            .map(|class| {
                class.iter()
                    .map(|s| m.atom(sites[s.get()][0]).unwrap().element.symbol())
                    .sorted()
                    .collect()
            })
            .collect()
    }

    fn s(i: usize) -> Site {
        Site::from(i)
    }

    #[test]
    fn distinct_elements() {
        let m = molecule(&["C", "Br", "H", "Cl", "F"], &[(0, 1), (0, 2), (0, 3), (0, 4)]);
        assert_eq!(class_elements(&m, n(0)), vec![vec!["H"], vec!["F"], vec!["Cl"], vec!["Br"]]);

        let ranking = m.ranking(n(0)).unwrap();
        assert!(ranking.is_total());
        assert_eq!(ranking.rank_of(s(0)), Some(Rank::from(3)));
        let ranks: Vec<usize> = ranking.occupation().unwrap().sigma.iter().map(|r| r.get()).collect();
        assert_eq!(ranks, vec![3, 0, 2, 1]);
    }

    #[test]
    fn ties() {
        let m = molecule(&["C", "Cl", "H", "Cl", "H"], &[(0, 1), (0, 2), (0, 3), (0, 4)]);
        let ranking = m.ranking(n(0)).unwrap();
        assert_eq!(ranking.classes(), &[vec![s(1), s(3)], vec![s(0), s(2)]]);
        assert!(!ranking.is_total());
    }

    #[test]
    fn deeper_spheres_break_ties() {
        // Center with H, F, ethyl and methyl
        let m = molecule(
            &["C", "H", "F", "C", "C", "C", "H", "H", "H", "H", "H", "H", "H", "H"],
            &[(0, 1), (0, 2), (0, 3), (0, 5), (3, 4), (3, 6), (3, 7), (4, 8), (4, 9), (4, 10), (5, 11), (5, 12), (5, 13)]
        );
        let sites = m.sites(n(0)).unwrap();
        let ranking = rank_sites(&m, n(0), &sites).unwrap();
        assert!(ranking.is_total());
        // Sites are ordered by atom index: H, F, ethyl, methyl
        assert_eq!(ranking.rank_of(s(0)), Some(Rank::from(0)));
        assert_eq!(ranking.rank_of(s(3)), Some(Rank::from(1)));
        assert_eq!(ranking.rank_of(s(2)), Some(Rank::from(2)));
        assert_eq!(ranking.rank_of(s(1)), Some(Rank::from(3)));
    }

    #[test]
    fn distant_differences_are_found() {
        // Center C(H)(H) with -CH2-CH2-Cl and -CH2-CH2-F chains
        let m = molecule(
            &["C", "H", "H", "C", "C", "Cl", "C", "C", "F"],
            &[(0, 1), (0, 2), (0, 3), (3, 4), (4, 5), (0, 6), (6, 7), (7, 8)]
        );
        let ranking = m.ranking(n(0)).unwrap();
        // Sites: H, H, C3 (to Cl), C6 (to F)
        assert_eq!(ranking.classes(), &[vec![s(0), s(1)], vec![s(3)], vec![s(2)]]);
    }

    #[test]
    fn multiple_bonds_duplicate_atoms() {
        // Center with H, F, -CH=O and -CH2-OH
        let mut m = molecule(
            &["C", "H", "F", "C", "O", "H", "C", "O", "H", "H", "H"],
            &[(0, 1), (0, 2), (0, 3), (3, 4), (3, 5), (0, 6), (6, 7), (6, 8), (6, 9), (7, 10)]
        );
        m.set_bond(n(3), n(4), Bond::DOUBLE).unwrap();
        let ranking = m.ranking(n(0)).unwrap();
        assert!(ranking.rank_of(s(2)) > ranking.rank_of(s(3)), "Aldehyde outranks alcohol");
    }

    #[test]
    fn ring_paths_are_followed() {
        // Center with F, Cl, cyclobutyl and pentan-3-yl. Both carbon
        // substituents look alike in the first two spheres. Only following the
        // ring around shows that cyclobutyl has more atoms further out.
        let m = molecule(
            &["C", "F", "Cl", "C", "C", "C", "C", "C", "C", "C", "C", "C"],
            &[(0, 1), (0, 2), (0, 3), (0, 7), (3, 4), (4, 6), (6, 5), (5, 3), (7, 8), (8, 9), (7, 10), (10, 11)]
        );
        let ranking = m.ranking(n(0)).unwrap();
        assert!(ranking.is_total());
        // Sites: F, Cl, cyclobutyl, pentan-3-yl
        assert_eq!(ranking.classes(), &[vec![s(3)], vec![s(2)], vec![s(0)], vec![s(1)]]);
    }

    #[test]
    fn rings_terminate_and_tie() {
        // Cyclohexane carbon with its two hydrogens
        let mut bonds: Vec<(usize, usize)> = (0..6).map(|i| (i, (i + 1) % 6)).collect();
        bonds.extend([(0, 6), (0, 7)]);
        let m = molecule(&["C", "C", "C", "C", "C", "C", "H", "H"], &bonds);
        assert_eq!(class_elements(&m, n(0)), vec![vec!["H", "H"], vec!["C", "C"]]);
    }

    #[test]
    fn neighbor_order_invariance() {
        // Same substituted center built with atoms in different orders
        let symbols = ["C", "H", "F", "C", "C", "C", "H", "H", "H", "H", "H", "H", "H", "H"];
        let bonds = [(0, 1), (0, 2), (0, 3), (0, 5), (3, 4), (3, 6), (3, 7), (4, 8), (4, 9), (4, 10), (5, 11), (5, 12), (5, 13)];
        let reference = class_elements(&molecule(&symbols, &bonds), n(0));

        for shift in 1..symbols.len() {
            let relabel = |i: usize| (i + shift) % symbols.len();
            let mut shuffled = [""; 14];
            for (i, &symbol) in symbols.iter().enumerate() {
                shuffled[relabel(i)] = symbol;
            }
            let shuffled_bonds: Vec<(usize, usize)> = bonds.iter()
                .rev()
                .map(|&(i, j)| (relabel(j), relabel(i)))
                .collect();
            let m = molecule(&shuffled, &shuffled_bonds);
            let center = n(relabel(0));
            assert_eq!(class_elements(&m, center), reference);

            // The ethyl carbon outranks the methyl carbon regardless of numbering
            let sites = m.sites(center).unwrap();
            let ranking = m.ranking(center).unwrap();
            let rank_of_atom = |atom: usize| {
                let site = sites.iter().position(|s| s == &vec![n(relabel(atom))]).unwrap();
                ranking.rank_of(Site::from(site)).unwrap()
            };
            assert!(rank_of_atom(3) > rank_of_atom(5));
        }
    }

    #[test]
    fn haptic_sites_rank_by_constituents() {
        // Metal with an eta-2 C=C site, an eta-2 C=N site and a chloride
        let mut m = molecule(&["Ru", "C", "C", "C", "N", "Cl"], &[(0, 5)]);
        m.add_bond(n(1), n(2), Bond::DOUBLE).unwrap();
        m.add_bond(n(3), n(4), Bond::DOUBLE).unwrap();
        for i in 1..=4 {
            m.add_bond(n(0), n(i), Bond::Eta).unwrap();
        }
        let sites = m.sites(n(0)).unwrap();
        assert_eq!(sites, vec![vec![n(1), n(2)], vec![n(3), n(4)], vec![n(5)]]);
        let ranking = rank_sites(&m, n(0), &sites).unwrap();
        assert_eq!(ranking.classes(), &[vec![s(0)], vec![s(1)], vec![s(2)]]);
        assert_eq!(m.atom(n(5)).map(|a| a.element), Some(Element::CL));
    }

    #[test]
    fn class_construction() {
        assert!(Ranking::from_classes(vec![vec![s(1)], vec![s(0), s(2)]]).is_some());
        assert!(Ranking::from_classes(vec![vec![s(1)], vec![s(2)]]).is_none());
        assert!(Ranking::from_classes(vec![vec![s(0)], vec![]]).is_none());
        assert!(Ranking::from_classes(vec![vec![s(0), s(0)]]).is_none());
    }
}
