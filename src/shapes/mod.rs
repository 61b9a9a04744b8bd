extern crate nalgebra as na;
type Matrix3N = na::Matrix3xX<f64>;

use std::collections::{HashSet, HashMap};
use petgraph::unionfind::UnionFind;
use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::strong::{IndexBase, Index};
use crate::strong::bijection::Bijection;

/// Names of the idealized coordination shapes
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Debug, Hash, Serialize, Deserialize)]
pub enum Name {
    // 2
    Line,
    Bent,
    // 3
    EquilateralTriangle,
    VacantTetrahedron,
    T,
    // 4
    Tetrahedron,
    Square,
    Seesaw,
    TrigonalPyramid,
    // 5
    SquarePyramid,
    TrigonalBipyramid,
    Pentagon,
    // 6
    Octahedron,
    TrigonalPrism,
    PentagonalPyramid,
    Hexagon,
    // 7
    PentagonalBipyramid,
    CappedOctahedron,
    CappedTrigonalPrism,
    // 8
    SquareAntiprism,
    Cube,
    TrigonalDodecahedron,
    HexagonalBipyramid,
}

impl Name {
    /// Human readable name
    pub fn repr(&self) -> &'static str {
        match self {
            Name::Line => "line",
            Name::Bent => "bent",
            Name::EquilateralTriangle => "triangle",
            Name::VacantTetrahedron => "vacant tetrahedron",
            Name::T => "T-shaped",
            Name::Tetrahedron => "tetrahedron",
            Name::Square => "square",
            Name::Seesaw => "seesaw",
            Name::TrigonalPyramid => "trigonal pyramid",
            Name::SquarePyramid => "square pyramid",
            Name::TrigonalBipyramid => "trigonal bipyramid",
            Name::Pentagon => "pentagon",
            Name::Octahedron => "octahedron",
            Name::TrigonalPrism => "trigonal prism",
            Name::PentagonalPyramid => "pentagonal pyramid",
            Name::Hexagon => "hexagon",
            Name::PentagonalBipyramid => "pentagonal bipyramid",
            Name::CappedOctahedron => "capped octahedron",
            Name::CappedTrigonalPrism => "capped trigonal prism",
            Name::SquareAntiprism => "square antiprism",
            Name::Cube => "cube",
            Name::TrigonalDodecahedron => "trigonal dodecahedron",
            Name::HexagonalBipyramid => "hexagonal bipyramid",
        }
    }
}

impl std::fmt::Display for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.repr())
    }
}

/// Index of a shape vertex
#[derive(IndexBase, Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Vertex(u8);

/// Proper rotation expressed as a vertex permutation
pub type Rotation = Bijection<Vertex, Vertex>;
/// Improper symmetry element expressed as a vertex permutation
pub type Mirror = Bijection<Vertex, Vertex>;

/// Idealized coordination polyhedron
pub struct Shape {
    /// Name of the shape
    pub name: Name,
    /// Unit sphere coordinates of the vertices, without the center
    pub coordinates: Matrix3N,
    /// Generators of the rotation group, expressed as vertex permutations
    pub rotation_basis: Vec<Rotation>,
    /// An improper symmetry element, if the shape has one
    pub mirror: Option<Mirror>
}

impl Shape {
    /// Number of vertices
    pub fn size(&self) -> usize {
        self.coordinates.ncols()
    }

    /// Iterate through the vertices
    pub fn vertices(&self) -> crate::strong::Range<Vertex> {
        // Shapes have far fewer than 256 vertices
        Vertex::range(self.size() as u8)
    }

    /// Position of a vertex on the unit sphere
    pub fn vertex_position(&self, vertex: Vertex) -> Option<na::VectorView3<f64>> {
        let column = vertex.to_usize()?;
        (column < self.size()).then(|| self.coordinates.column(column))
    }

    /// Close a set of generators under composition
    ///
    /// An empty set of generators yields the group containing only the identity.
    fn expand_rotation_basis(&self, basis: &[Rotation]) -> HashSet<Rotation> {
        let identity = Rotation::identity(self.size());
        let mut rotations = HashSet::from([identity.clone()]);
        let mut frontier = vec![identity];

        while let Some(rotation) = frontier.pop() {
            for generator in basis {
                if let Ok(generated) = rotation.compose(generator) {
                    if rotations.insert(generated.clone()) {
                        frontier.push(generated);
                    }
                }
            }
        }

        rotations
    }

    /// Generate the full rotation group from the shape's rotation basis
    ///
    /// ```
    /// # use stereomol::shapes::*;
    /// # use stereomol::strong::bijection::bijections;
    /// # use std::collections::HashSet;
    /// let line_rotations = LINE.generate_rotations();
    /// assert_eq!(line_rotations, bijections(2).collect::<HashSet<_>>());
    ///
    /// let tetrahedron_rotations = TETRAHEDRON.generate_rotations();
    /// assert_eq!(tetrahedron_rotations.len(), 12);
    /// assert!(tetrahedron_rotations.iter().all(|r| r.set_size() == 4));
    /// ```
    pub fn generate_rotations(&self) -> HashSet<Rotation> {
        self.expand_rotation_basis(&self.rotation_basis)
    }

    fn union_to_groups(sets: UnionFind<usize>) -> Vec<Vec<Vertex>> {
        let mut label_map: HashMap<usize, usize> = HashMap::new();
        let mut groups: Vec<Vec<Vertex>> = Vec::new();
        for (v, label) in sets.into_labeling().into_iter().enumerate() {
            let group = *label_map.entry(label).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            if let Some(vertex) = Vertex::from_usize(v) {
                groups[group].push(vertex);
            }
        }

        groups
    }

    /// Sets of vertices interconvertible by rotation
    ///
    /// Groups are ordered by their lowest vertex.
    pub fn vertex_groups(&self) -> Vec<Vec<Vertex>> {
        self.vertex_groups_holding(&[], &self.generate_rotations())
    }

    /// Sets of vertices interconvertible by rotations that keep some vertices fixed
    pub fn vertex_groups_holding(&self, held: &[Vertex], rotations: &HashSet<Rotation>) -> Vec<Vec<Vertex>> {
        let n = self.size();
        let mut sets = UnionFind::new(n);
        for rotation in rotations.iter().filter(|r| held.iter().all(|v| r.is_fixed_point(*v))) {
            for (v, &w) in rotation.permutation.iter_pairs() {
                sets.union(v, w);
            }
        }

        Self::union_to_groups(sets)
    }
}

mod statics;
pub use statics::*;

/// Look up the static data of a shape
pub fn shape_from_name(name: Name) -> &'static Shape {
    SHAPES[name as usize]
}

/// Errors arising in catalog queries
#[derive(Error, Debug, PartialEq, Eq, Clone, Copy)]
pub enum CatalogError {
    /// No shapes with this many vertices are known
    #[error("No shapes with {0} vertices in the catalog")]
    UnsupportedCoordinationNumber(usize)
}

/// A catalog shape with its precomputed rotation group
pub struct Entry {
    /// Static shape data
    pub shape: &'static Shape,
    /// All proper rotations, sorted, starting with the identity
    pub rotations: Vec<Rotation>,
    /// Rotationally equivalent vertex sets
    pub vertex_groups: Vec<Vec<Vertex>>
}

impl Entry {
    /// Expand the rotation group of a shape
    pub fn new(shape: &'static Shape) -> Entry {
        let group = shape.generate_rotations();
        let vertex_groups = shape.vertex_groups_holding(&[], &group);
        let mut rotations: Vec<Rotation> = group.into_iter().collect();
        rotations.sort();

        tracing::trace!("Expanded {} rotations for {}", rotations.len(), shape.name);
        Entry {shape, rotations, vertex_groups}
    }

    /// Name of the shape
    pub fn name(&self) -> Name {
        self.shape.name
    }

    /// Number of vertices
    pub fn size(&self) -> usize {
        self.shape.size()
    }

    /// Whether two vertex mappings are related by a rotation of this shape
    pub fn is_rotation<T: Index>(&self, a: &Bijection<Vertex, T>, b: &Bijection<Vertex, T>) -> bool {
        self.rotations.iter().any(|r| r.compose(a).map_or(false, |c| &c == b))
    }
}

/// Immutable registry of shapes with precomputed symmetry groups
///
/// Either construct one explicitly and pass it by reference, or use the
/// process-wide instance from [`Catalog::shared`].
pub struct Catalog {
    entries: Vec<Entry>
}

lazy_static! {
    static ref SHARED_CATALOG: Catalog = Catalog::new();
}

impl Catalog {
    /// Build the catalog, expanding every shape's rotation group
    pub fn new() -> Catalog {
        let entries: Vec<Entry> = SHAPES.iter().map(|&shape| Entry::new(shape)).collect();
        tracing::debug!("Constructed shape catalog with {} shapes", entries.len());
        Catalog {entries}
    }

    /// Process-wide catalog, constructed on first access
    pub fn shared() -> &'static Catalog {
        &SHARED_CATALOG
    }

    /// Catalog entry of a shape
    pub fn entry(&self, name: Name) -> &Entry {
        &self.entries[name as usize]
    }

    /// Iterate through all entries
    pub fn entries(&self) -> impl Iterator<Item=&Entry> {
        self.entries.iter()
    }

    /// Shapes of a particular size, ordered by preference
    ///
    /// ```
    /// # use stereomol::shapes::{Catalog, CatalogError, Name};
    /// let catalog = Catalog::shared();
    /// let names: Vec<Name> = catalog.shapes_of_size(4).unwrap().iter().map(|e| e.name()).collect();
    /// assert_eq!(names.first(), Some(&Name::Tetrahedron));
    /// assert_eq!(catalog.shapes_of_size(13).err(), Some(CatalogError::UnsupportedCoordinationNumber(13)));
    /// ```
    pub fn shapes_of_size(&self, size: usize) -> Result<Vec<&Entry>, CatalogError> {
        let shapes: Vec<&Entry> = self.entries.iter().filter(|e| e.size() == size).collect();
        if shapes.is_empty() {
            return Err(CatalogError::UnsupportedCoordinationNumber(size));
        }

        Ok(shapes)
    }

    /// Preferred shape of a size, used when no positions are known
    pub fn default_shape(&self, size: usize) -> Result<&Entry, CatalogError> {
        self.entries.iter()
            .find(|e| e.size() == size)
            .ok_or(CatalogError::UnsupportedCoordinationNumber(size))
    }
}

impl Default for Catalog {
    fn default() -> Catalog {
        Catalog::new()
    }
}

pub mod similarity;
