use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::sync::Arc;
use gcd::Gcd;
use sorted_vec::SortedVec;
use thiserror::Error;

use crate::shapes::{Vertex, Entry, Name, Shape};
use crate::strong::{Index, IndexBase};
use crate::strong::surjection::{Surjection, SurjectionError};
use crate::strong::bijection::{Bijection, Bijectable, bijections};
use crate::permutation::PermutationError;
use crate::geometry::angle;

#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Debug)]
/// Ordered homogeneous pair
pub struct OrderedPair<T: Ord>(pub T, pub T);

impl<T: Ord> OrderedPair<T> {
    /// Order two values
    pub fn new(a: T, b: T) -> Self {
        if b < a {
            Self(b, a)
        } else {
            Self(a, b)
        }
    }
}

impl<T: Display + Ord> Display for OrderedPair<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.0, self.1)
    }
}

#[derive(IndexBase, PartialEq, Eq, Copy, Clone, PartialOrd, Ord, Hash, Debug)]
/// Ranking class index, higher ranks have higher priority
pub struct Rank(usize);

impl Display for Rank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Placement of ranks onto shape vertices
pub type Occupation = Surjection<Vertex, Rank>;
/// Pair of vertices whose sites are connected by a path avoiding the center
pub type Link = OrderedPair<Vertex>;

/// Errors arising in stereopermutation enumeration
#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum EnumerationError {
    /// Number of ranked sites differs from the shape size
    #[error("{shape} has {expected} vertices, but {found} sites were supplied")]
    VertexCountMismatch {
        /// Shape enumerated for
        shape: Name,
        /// Vertex count of the shape
        expected: usize,
        /// Number of ranked sites
        found: usize
    },
    /// A link refers to a missing vertex or links a vertex to itself
    #[error("Invalid link between vertices {0:?} and {1:?}")]
    InvalidLink(Vertex, Vertex),
    /// Ranks are not a minimal sequence
    #[error("Invalid occupation: {0}")]
    InvalidOccupation(#[from] SurjectionError)
}

/// Rotationally unique assignment of ranked sites to shape vertices
#[derive(Hash, Eq, PartialEq, Clone, PartialOrd, Ord, Debug)]
pub struct Stereopermutation {
    /// Rank at each vertex
    pub occupation: Occupation,
    /// Vertex pairs whose sites are linked
    pub links: SortedVec<Link>
}

impl Display for Stereopermutation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ranks: Vec<String> = self.occupation.sigma.iter().map(|r| r.to_string()).collect();
        write!(f, "[{}]", ranks.join(", "))?;
        if !self.links.is_empty() {
            let links: Vec<String> = self.links.iter()
                .map(|l| format!("({}, {})", l.0.get(), l.1.get()))
                .collect();
            write!(f, " links {}", links.join(" "))?;
        }
        Ok(())
    }
}

impl Bijectable<Vertex> for Stereopermutation {
    type T = Vertex;
    type Output = Stereopermutation;

    /// Rotating by `r` places the rank of vertex `r(j)` at vertex `j`
    fn biject(&self, rotation: &Bijection<Vertex, Vertex>) -> Result<Stereopermutation, PermutationError> {
        let inverse = rotation.inverse();
        let occupation = self.occupation.relabel(&inverse)
            .map_err(|_| PermutationError::LengthMismatch)?;
        let links = self.links.iter()
            .map(|OrderedPair(a, b)| -> Result<Link, PermutationError> {
                let i = inverse.get(a).ok_or(PermutationError::LengthMismatch)?;
                let j = inverse.get(b).ok_or(PermutationError::LengthMismatch)?;
                Ok(Link::new(i, j))
            })
            .collect::<Result<Vec<Link>, _>>()?;

        Ok(Stereopermutation {occupation, links: SortedVec::from_unsorted(links)})
    }
}

/// Angle between the vertices of a link, if both vertices exist
fn link_angle(link: &Link, shape: &Shape) -> Option<f64> {
    Some(angle(&shape.vertex_position(link.0)?, &shape.vertex_position(link.1)?))
}

/// Links spanning at least this angle are considered trans
pub const TRANS_SPANNING_ANGLE: f64 = 0.95 * std::f64::consts::PI;

impl Stereopermutation {
    /// Construct from unsorted links
    pub fn new(occupation: Occupation, links: Vec<Link>) -> Stereopermutation {
        Stereopermutation {occupation, links: SortedVec::from_unsorted(links)}
    }

    /// Rank at a vertex
    pub fn rank(&self, vertex: Vertex) -> Option<Rank> {
        self.occupation.get(&vertex)
    }

    /// Number of vertices
    pub fn size(&self) -> usize {
        self.occupation.domain_size()
    }

    /// All rotations of this stereopermutation, including itself
    pub fn rotations(&self, entry: &Entry) -> HashSet<Stereopermutation> {
        entry.rotations.iter()
            .filter_map(|r| self.biject(r).ok())
            .collect()
    }

    /// Lexicographically least rotation, the representative of the rotation orbit
    pub fn canonical(&self, entry: &Entry) -> Stereopermutation {
        entry.rotations.iter()
            .filter_map(|r| self.biject(r).ok())
            .min()
            .unwrap_or_else(|| self.clone())
    }

    /// Whether some rotation of the shape superimposes this onto another
    ///
    /// Identical stereopermutations are rotations of one another.
    pub fn is_rotation_of(&self, other: &Stereopermutation, entry: &Entry) -> bool {
        entry.rotations.iter().any(|r| self.biject(r).map_or(false, |rotated| &rotated == other))
    }

    /// Canonical form of the mirror image, if the shape has an improper symmetry element
    ///
    /// Shapes without one are planar or otherwise achiral, so no enantiomer exists.
    pub fn enantiomer(&self, entry: &Entry) -> Option<Stereopermutation> {
        let mirror = entry.shape.mirror.as_ref()?;
        self.biject(mirror).ok().map(|mirrored| mirrored.canonical(entry))
    }

    /// Whether another stereopermutation is the mirror image of this one
    pub fn is_enantiomer_of(&self, other: &Stereopermutation, entry: &Entry) -> bool {
        self.enantiomer(entry).map_or(false, |e| e.is_rotation_of(other, entry))
    }

    /// Whether the mirror image is not superimposable by rotation
    pub fn is_chiral(&self, entry: &Entry) -> bool {
        self.enantiomer(entry).map_or(false, |e| !e.is_rotation_of(self, entry))
    }

    /// Whether any link spans the shape roughly trans
    pub fn has_trans_spanning_link(&self, shape: &Shape) -> bool {
        self.links.iter()
            .any(|link| link_angle(link, shape).map_or(false, |a| a >= TRANS_SPANNING_ANGLE))
    }
}

/// Options for stereopermutation enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EnumerationOptions {
    /// Discard stereopermutations in which linked sites are placed trans
    pub remove_trans_spanning_links: bool
}

/// Rotationally distinct stereopermutations of a shape and ranking pattern
#[derive(Debug, Clone, PartialEq)]
pub struct Stereopermutations {
    /// Shape enumerated for
    pub shape: Name,
    /// Canonical representatives, sorted
    pub list: Vec<Stereopermutation>,
    /// Relative statistical occurrence of each representative
    pub weights: Vec<usize>
}

impl Stereopermutations {
    /// Number of stereopermutations
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// Whether there are no stereopermutations
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Stereopermutation at an index
    pub fn get(&self, index: usize) -> Option<&Stereopermutation> {
        self.list.get(index)
    }

    /// Index of a canonical representative
    pub fn index_of(&self, canonical: &Stereopermutation) -> Option<usize> {
        self.list.binary_search(canonical).ok()
    }

    /// Iterate through representatives and their weights
    pub fn iter(&self) -> impl Iterator<Item=(&Stereopermutation, usize)> {
        self.list.iter().zip(self.weights.iter().copied())
    }
}

fn validate(entry: &Entry, occupation: &Occupation, links: &[Link]) -> Result<(), EnumerationError> {
    let n = entry.size();
    if occupation.domain_size() != n {
        return Err(EnumerationError::VertexCountMismatch {
            shape: entry.name(),
            expected: n,
            found: occupation.domain_size()
        });
    }

    for link in links {
        let in_range = |v: Vertex| v.to_usize().map_or(false, |i| i < n);
        if link.0 == link.1 || !in_range(link.0) || !in_range(link.1) {
            return Err(EnumerationError::InvalidLink(link.0, link.1));
        }
    }

    Ok(())
}

/// Orbit bookkeeping: every member of a found orbit forwards to its orbit index
struct Orbits<'a> {
    entry: &'a Entry,
    representatives: Vec<(Stereopermutation, usize)>,
    forwarding: HashMap<Stereopermutation, usize>
}

impl<'a> Orbits<'a> {
    fn new(entry: &'a Entry) -> Orbits<'a> {
        Orbits {entry, representatives: Vec::new(), forwarding: HashMap::new()}
    }

    fn add(&mut self, trial: Stereopermutation) {
        if let Some(&index) = self.forwarding.get(&trial) {
            self.representatives[index].1 += 1;
            return;
        }

        let rotations = trial.rotations(self.entry);
        let canonical = rotations.iter().min().cloned().unwrap_or_else(|| trial.clone());
        let index = self.representatives.len();
        self.representatives.push((canonical, 1));
        for rotation in rotations {
            self.forwarding.insert(rotation, index);
        }
    }
}

/// Enumerate the rotationally distinct stereopermutations of an occupation
///
/// Each orbit of arrangements under the shape's rotation group yields its
/// lexicographically least member. Weights count the arrangements in each
/// orbit, reduced by their greatest common divisor. The result is sorted.
///
/// ```
/// # use stereomol::shapes::{Catalog, Name};
/// # use stereomol::stereo::*;
/// # use stereomol::strong::surjection::Surjection;
/// # use std::convert::TryFrom;
/// let catalog = Catalog::shared();
/// let tetrahedron = catalog.entry(Name::Tetrahedron);
/// let ranks = (0..4).map(Rank::from).collect::<Vec<_>>();
/// let occupation = Surjection::try_from(ranks).unwrap();
/// let distinct = enumerate(tetrahedron, &occupation, &[], &EnumerationOptions::default()).unwrap();
/// assert_eq!(distinct.len(), 2);
/// assert!(distinct.list[0].is_enantiomer_of(&distinct.list[1], tetrahedron));
/// ```
pub fn enumerate(
    entry: &Entry,
    occupation: &Occupation,
    links: &[Link],
    options: &EnumerationOptions
) -> Result<Stereopermutations, EnumerationError> {
    validate(entry, occupation, links)?;

    let mut orbits = Orbits::new(entry);
    if links.is_empty() {
        for permuted in occupation.sorted().iter_permutations() {
            orbits.add(Stereopermutation {occupation: permuted, links: SortedVec::new()});
        }
    } else {
        // Links break the equivalence of equally ranked sites, so all relabelings are needed
        let base = Stereopermutation::new(occupation.clone(), links.to_vec());
        for bijection in bijections::<Vertex, Vertex>(entry.size()) {
            let trial = base.biject(&bijection).map_err(|_| EnumerationError::VertexCountMismatch {
                shape: entry.name(),
                expected: entry.size(),
                found: occupation.domain_size()
            })?;
            orbits.add(trial);
        }
    }

    let mut distinct = orbits.representatives;
    let total = distinct.len();
    if options.remove_trans_spanning_links {
        distinct.retain(|(s, _)| !s.has_trans_spanning_link(entry.shape));
    }

    if let Some(divisor) = distinct.iter().map(|(_, count)| *count).reduce(|a, b| a.gcd(b)) {
        if divisor > 1 {
            for pair in distinct.iter_mut() {
                pair.1 /= divisor;
            }
        }
    }

    distinct.sort_unstable_by(|(a, _), (b, _)| a.cmp(b));
    tracing::debug!(
        "Enumerated {} stereopermutations ({} before trans filtering) for {}",
        distinct.len(), total, entry.name()
    );

    let (list, weights) = distinct.into_iter().unzip();
    Ok(Stereopermutations {shape: entry.name(), list, weights})
}

type CacheKey = (Name, Occupation, SortedVec<Link>, EnumerationOptions);

/// Memo of enumerations keyed by shape, occupation, links and options
///
/// Owned by the caller. Enumeration is pure, so entries never go stale.
#[derive(Default)]
pub struct EnumerationCache {
    cache: HashMap<CacheKey, Arc<Stereopermutations>>
}

impl EnumerationCache {
    /// Empty cache
    pub fn new() -> EnumerationCache {
        EnumerationCache::default()
    }

    /// Number of cached enumerations
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Whether nothing has been cached yet
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Fetch a cached enumeration or enumerate and cache it
    pub fn get_or_enumerate(
        &mut self,
        entry: &Entry,
        occupation: &Occupation,
        links: &[Link],
        options: &EnumerationOptions
    ) -> Result<Arc<Stereopermutations>, EnumerationError> {
        let key = (entry.name(), occupation.clone(), SortedVec::from_unsorted(links.to_vec()), *options);
        if let Some(cached) = self.cache.get(&key) {
            return Ok(Arc::clone(cached));
        }

        let enumerated = Arc::new(enumerate(entry, occupation, links, options)?);
        self.cache.insert(key, Arc::clone(&enumerated));
        Ok(enumerated)
    }
}
