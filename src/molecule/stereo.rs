extern crate nalgebra as na;

use std::sync::Arc;
use rayon::prelude::*;
use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::geometry::well_defined_dihedral;
use crate::molecule::{Molecule, Nucleus, Site, Bond, GraphError, StereoHint};
use crate::molecule::ranking::{Ranking, rank_sites};
use crate::molecule::resolve::{ResolverConfig, ResolutionError, ShapeFit, fit_shape, lift_flat_directions, site_directions};
use crate::quaternions::Matrix3N;
use crate::shapes::{Catalog, CatalogError, Entry, Name, Vertex};
use crate::stereo::{
    EnumerationCache, EnumerationError, EnumerationOptions, Link, OrderedPair,
    Rank, Stereopermutation, Stereopermutations
};
use crate::strong::{Index, IndexBase};
use crate::strong::matrix::Positions;
use crate::strong::surjection::{Surjection, SurjectionError};

/// Errors arising in perception and assignment of a stereocenter
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StereoError {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Enumeration(#[from] EnumerationError),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error("Invalid occupation: {0}")]
    Occupation(#[from] SurjectionError),
    #[error("Atom {0} has no perceived stereo")]
    NotPerceived(Nucleus),
    #[error("Stereopermutation index {index} out of range for {count} stereopermutations")]
    IndexOutOfRange {
        index: usize,
        count: usize
    },
    #[error("Encoded ranking or links do not match the center")]
    EncodingMismatch,
    #[error("Observed arrangement is not among the enumerated stereopermutations")]
    UnlistedArrangement
}

/// A stereocenter that could not be perceived or assigned
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Center {center}: {error}")]
pub struct CenterFailure {
    pub center: Nucleus,
    pub error: StereoError
}

fn vertex_links(links: &[OrderedPair<Site>]) -> Result<Vec<Link>, SurjectionError> {
    links.iter()
        .map(|OrderedPair(a, b)| {
            let vertex = |s: &Site| Vertex::from_usize(s.get()).ok_or(SurjectionError::LengthMismatch);
            Ok(Link::new(vertex(a)?, vertex(b)?))
        })
        .collect()
}

/// Enumerate with site `i` placed at vertex `i`
fn enumerate_pattern(
    entry: &Entry,
    ranking: &Ranking,
    links: &[OrderedPair<Site>],
    options: &EnumerationOptions,
    cache: &mut EnumerationCache
) -> Result<Arc<Stereopermutations>, StereoError> {
    let occupation = ranking.occupation()?;
    let links = vertex_links(links)?;
    Ok(cache.get_or_enumerate(entry, &occupation, &links, options)?)
}

/// Stereo of an atom: its sites, their ranking and the possible arrangements
#[derive(Debug, Clone)]
pub struct AtomStereo {
    /// Local shape, the default of its size until fitted to positions
    pub shape: Name,
    /// Atoms of each site
    pub sites: Vec<Vec<Nucleus>>,
    pub ranking: Ranking,
    pub links: Vec<OrderedPair<Site>>,
    pub options: EnumerationOptions,
    pub stereopermutations: Arc<Stereopermutations>,
    /// Index of the present stereopermutation, if known
    pub assignment: Option<usize>
}

impl AtomStereo {
    /// Number of possible stereopermutations
    pub fn num_stereopermutations(&self) -> usize {
        self.stereopermutations.len()
    }

    /// Whether there is more than one possible arrangement
    pub fn is_stereogenic(&self) -> bool {
        self.num_stereopermutations() > 1
    }

    /// The assigned stereopermutation
    pub fn assigned(&self) -> Option<&Stereopermutation> {
        self.stereopermutations.get(self.assignment?)
    }

    /// Assign a stereopermutation by index, or unassign
    pub fn assign(&mut self, assignment: Option<usize>) -> Result<(), StereoError> {
        if let Some(index) = assignment {
            let count = self.num_stereopermutations();
            if index >= count {
                return Err(StereoError::IndexOutOfRange {index, count});
            }
        }

        self.assignment = assignment;
        Ok(())
    }

    /// Arrangement of the sites as found by a shape fit, in canonical form
    pub fn fitted(&self, fit: &ShapeFit, catalog: &Catalog) -> Result<Stereopermutation, StereoError> {
        let entry = catalog.entry(fit.shape);
        let sigma = entry.shape.vertices()
            .map(|v| {
                fit.vertex_sites.get(&v)
                    .and_then(|site| self.ranking.rank_of(site))
                    .ok_or(SurjectionError::LengthMismatch)
            })
            .collect::<Result<Vec<Rank>, _>>()?;
        let occupation = Surjection::try_from(sigma)?;

        let links = self.links.iter()
            .map(|OrderedPair(a, b)| {
                let vertex = |s: &Site| fit.vertex_sites.inverse_of(s).ok_or(SurjectionError::LengthMismatch);
                Ok(Link::new(vertex(a)?, vertex(b)?))
            })
            .collect::<Result<Vec<Link>, SurjectionError>>()?;

        Ok(Stereopermutation::new(occupation, links).canonical(entry))
    }

    /// Adopt the fitted shape and assign the observed stereopermutation
    pub fn resolve(&mut self, fit: &ShapeFit, catalog: &Catalog, cache: &mut EnumerationCache) -> Result<usize, StereoError> {
        self.assignment = None;
        if fit.shape != self.shape {
            let entry = catalog.entry(fit.shape);
            self.stereopermutations = enumerate_pattern(entry, &self.ranking, &self.links, &self.options, cache)?;
            self.shape = fit.shape;
        }

        let observed = self.fitted(fit, catalog)?;
        let index = self.stereopermutations.index_of(&observed).ok_or(StereoError::UnlistedArrangement)?;
        self.assignment = Some(index);
        Ok(index)
    }

    /// Canonical encoding of the assignment
    pub fn encode(&self) -> Option<EncodedStereopermutation> {
        Some(EncodedStereopermutation {
            shape: self.shape,
            ranking: self.ranking.classes().iter()
                .map(|class| class.iter().map(|s| s.get()).collect())
                .collect(),
            links: self.links.iter().map(|OrderedPair(a, b)| (a.get(), b.get())).collect(),
            remove_trans_spanning_links: self.options.remove_trans_spanning_links,
            index: self.assignment?
        })
    }
}

/// Canonical encoding of an atom stereopermutation
///
/// Sites are referred to by their position in [`Molecule::sites`]. Decoding
/// needs neither the molecule nor positions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EncodedStereopermutation {
    pub shape: Name,
    /// Sites of each ranking class, by ascending priority
    pub ranking: Vec<Vec<usize>>,
    /// Pairs of linked sites
    pub links: Vec<(usize, usize)>,
    #[serde(default)]
    pub remove_trans_spanning_links: bool,
    /// Index among the enumerated stereopermutations
    pub index: usize
}

impl EncodedStereopermutation {
    fn decoded_ranking(&self) -> Result<Ranking, StereoError> {
        let classes = self.ranking.iter()
            .map(|class| class.iter().map(|&s| Site::from(s)).collect())
            .collect();
        Ranking::from_classes(classes).ok_or(StereoError::EncodingMismatch)
    }

    fn decoded_links(&self) -> Vec<OrderedPair<Site>> {
        let mut links: Vec<OrderedPair<Site>> = self.links.iter()
            .map(|&(a, b)| OrderedPair::new(Site::from(a), Site::from(b)))
            .collect();
        links.sort();
        links
    }

    fn options(&self) -> EnumerationOptions {
        EnumerationOptions {remove_trans_spanning_links: self.remove_trans_spanning_links}
    }

    /// Stereopermutations the index refers to
    pub fn stereopermutations(&self, catalog: &Catalog, cache: &mut EnumerationCache) -> Result<Arc<Stereopermutations>, StereoError> {
        let ranking = self.decoded_ranking()?;
        enumerate_pattern(catalog.entry(self.shape), &ranking, &self.decoded_links(), &self.options(), cache)
    }

    /// Encoded stereopermutation
    pub fn decode(&self, catalog: &Catalog, cache: &mut EnumerationCache) -> Result<Stereopermutation, StereoError> {
        let stereopermutations = self.stereopermutations(catalog, cache)?;
        stereopermutations.get(self.index)
            .cloned()
            .ok_or(StereoError::IndexOutOfRange {index: self.index, count: stereopermutations.len()})
    }
}

/// Relative arrangement of the highest ranked substituents across a double bond
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BondConfiguration {
    Cis,
    Trans
}

/// Stereo of a double bond
#[derive(Debug, Clone, PartialEq)]
pub struct BondStereo {
    /// Bonded atoms, lower index first
    pub ends: [Nucleus; 2],
    /// Atoms of the higher ranked other site at each end
    pub substituents: [Vec<Nucleus>; 2],
    pub assignment: Option<BondConfiguration>
}

impl BondStereo {
    /// Number of possible configurations
    pub fn num_stereopermutations(&self) -> usize {
        2
    }

    /// Configuration from the dihedral between the higher ranked substituents
    ///
    /// Fails if the dihedral is ill-defined: coincident atoms, a substituent
    /// on the bond axis or a dihedral within the configured margin of a right
    /// angle.
    pub fn fitted(&self, positions: &Positions<Nucleus>, config: &ResolverConfig) -> Result<BondConfiguration, ResolutionError> {
        let point = |atoms: &[Nucleus]| -> Result<na::Vector3<f64>, GraphError> {
            let mut sum = na::Vector3::zeros();
            for &atom in atoms {
                sum += positions.point(atom)
                    .ok_or(GraphError::PositionCountMismatch {expected: atom.get() + 1, found: positions.len()})?;
            }
            Ok(sum / atoms.len().max(1) as f64)
        };

        let angle = well_defined_dihedral(
            &point(&self.substituents[0])?,
            &point(&self.ends[0..1])?,
            &point(&self.ends[1..2])?,
            &point(&self.substituents[1])?,
            config.min_site_distance,
            config.min_separation_angle,
            config.dihedral_margin
        ).map_err(ResolutionError::IndeterminateGeometry)?;
        Ok(if angle.abs() < std::f64::consts::FRAC_PI_2 { BondConfiguration::Cis } else { BondConfiguration::Trans })
    }
}

impl Molecule {
    /// Stereo of an atom, if perceived
    pub fn atom_stereo(&self, center: Nucleus) -> Option<&AtomStereo> {
        self.atom_stereo.get(&center)
    }

    /// Stereo of a double bond, if perceived
    pub fn bond_stereo(&self, a: Nucleus, b: Nucleus) -> Option<&BondStereo> {
        self.bond_stereo.get(&OrderedPair::new(a, b))
    }

    /// Atoms with perceived stereo, ascending
    pub fn stereocenters(&self) -> Vec<Nucleus> {
        let mut centers: Vec<Nucleus> = self.atom_stereo.keys().copied().collect();
        centers.sort();
        centers
    }

    /// Assign a stereopermutation of an atom by index, or unassign it
    pub fn set_stereopermutation(&mut self, center: Nucleus, assignment: Option<usize>) -> Result<(), StereoError> {
        self.atom_stereo.get_mut(&center)
            .ok_or(StereoError::NotPerceived(center))?
            .assign(assignment)
    }

    /// Canonical encoding of an atom's assigned stereopermutation
    pub fn encode_stereopermutation(&self, center: Nucleus) -> Result<Option<EncodedStereopermutation>, StereoError> {
        Ok(self.atom_stereo(center).ok_or(StereoError::NotPerceived(center))?.encode())
    }

    /// Assign an encoded stereopermutation to an atom
    ///
    /// The encoded ranking and links must match those perceived for the atom.
    pub fn assign_encoded(
        &mut self,
        center: Nucleus,
        encoded: &EncodedStereopermutation,
        catalog: &Catalog,
        cache: &mut EnumerationCache
    ) -> Result<(), StereoError> {
        let stereo = self.atom_stereo.get_mut(&center).ok_or(StereoError::NotPerceived(center))?;
        if encoded.decoded_ranking()? != stereo.ranking || encoded.decoded_links() != stereo.links {
            return Err(StereoError::EncodingMismatch);
        }

        let stereopermutations = encoded.stereopermutations(catalog, cache)?;
        if encoded.index >= stereopermutations.len() {
            return Err(StereoError::IndexOutOfRange {index: encoded.index, count: stereopermutations.len()});
        }

        stereo.shape = encoded.shape;
        stereo.options = encoded.options();
        stereo.stereopermutations = stereopermutations;
        stereo.assignment = Some(encoded.index);
        Ok(())
    }

    fn perceive_atom(
        &self,
        center: Nucleus,
        sites: Vec<Vec<Nucleus>>,
        catalog: &Catalog,
        cache: &mut EnumerationCache,
        options: &EnumerationOptions
    ) -> Result<AtomStereo, StereoError> {
        let entry = catalog.default_shape(sites.len())?;
        let ranking = rank_sites(self, center, &sites)?;
        let links = self.links(center, &sites)?;
        let stereopermutations = enumerate_pattern(entry, &ranking, &links, options, cache)?;
        let assignment = (stereopermutations.len() == 1).then_some(0);
        tracing::debug!(
            "Atom {} has {} stereopermutations in {}",
            center, stereopermutations.len(), entry.name()
        );

        Ok(AtomStereo {
            shape: entry.name(),
            sites,
            ranking,
            links,
            options: *options,
            stereopermutations,
            assignment
        })
    }

    /// Higher ranked non-partner site of a double bond end, if it has two distinctly ranked ones
    fn bond_end_substituent(&self, end: Nucleus, partner: Nucleus) -> Result<Option<Vec<Nucleus>>, GraphError> {
        let sites = self.sites(end)?;
        if sites.len() != 3 {
            return Ok(None);
        }

        let ranking = rank_sites(self, end, &sites)?;
        let mut others: Vec<(Option<Rank>, &Vec<Nucleus>)> = sites.iter()
            .enumerate()
            .filter(|(_, atoms)| atoms.as_slice() != [partner])
            .map(|(i, atoms)| (ranking.rank_of(Site::from(i)), atoms))
            .collect();
        if others.len() != 2 || others[0].0 == others[1].0 {
            return Ok(None);
        }

        others.sort_by_key(|(rank, _)| *rank);
        Ok(others.pop().map(|(_, atoms)| atoms.clone()))
    }

    fn perceive_bond(&self, a: Nucleus, b: Nucleus) -> Result<Option<BondStereo>, GraphError> {
        let Some(first) = self.bond_end_substituent(a, b)? else { return Ok(None) };
        let Some(second) = self.bond_end_substituent(b, a)? else { return Ok(None) };
        Ok(Some(BondStereo {ends: [a, b], substituents: [first, second], assignment: None}))
    }

    /// Perceive atom and bond stereo from the graph alone
    ///
    /// Replaces any previous stereo. Atoms with fewer than two sites carry no
    /// stereo. Centers with only one stereopermutation are assigned it.
    /// Failing centers are reported and skipped.
    ///
    /// ```
    /// # use stereomol::molecule::{Molecule, Atom, Bond, Element, Nucleus};
    /// # use stereomol::molecule::resolve::ResolverConfig;
    /// # use stereomol::shapes::Catalog;
    /// # use stereomol::stereo::EnumerationCache;
    /// let elements = [Element::C, Element::H, Element::F, Element::CL, Element::BR];
    /// let atoms: Vec<Atom> = elements.iter().map(|&e| Atom::new(e)).collect();
    /// let bonds: Vec<(usize, usize, Bond)> = (1..5).map(|i| (0, i, Bond::SINGLE)).collect();
    /// let mut molecule = Molecule::from_parts(&atoms, &bonds).unwrap();
    ///
    /// let mut cache = EnumerationCache::new();
    /// let failures = molecule.perceive_stereo(Catalog::shared(), &mut cache, &ResolverConfig::default());
    /// assert!(failures.is_empty());
    /// let stereo = molecule.atom_stereo(Nucleus::from(0)).unwrap();
    /// assert_eq!(stereo.num_stereopermutations(), 2);
    /// assert_eq!(stereo.assignment, None);
    /// ```
    pub fn perceive_stereo(
        &mut self,
        catalog: &Catalog,
        cache: &mut EnumerationCache,
        config: &ResolverConfig
    ) -> Vec<CenterFailure> {
        self.atom_stereo.clear();
        self.bond_stereo.clear();
        let options = EnumerationOptions {remove_trans_spanning_links: config.remove_trans_spanning_links};

        let mut failures = Vec::new();
        let atoms: Vec<Nucleus> = self.atoms().collect();
        for center in atoms {
            let perceived = self.sites(center)
                .map_err(StereoError::from)
                .and_then(|sites| match sites.len() {
                    0 | 1 => Ok(None),
                    _ => self.perceive_atom(center, sites, catalog, cache, &options).map(Some)
                });
            match perceived {
                Ok(Some(stereo)) => { self.atom_stereo.insert(center, stereo); },
                Ok(None) => (),
                Err(error) => {
                    tracing::warn!("Could not perceive stereo of atom {}: {}", center, error);
                    failures.push(CenterFailure {center, error});
                }
            }
        }

        let double_bonds: Vec<(Nucleus, Nucleus)> = self.bonds()
            .filter(|(_, _, bond)| *bond == Bond::DOUBLE)
            .map(|(a, b, _)| if a < b { (a, b) } else { (b, a) })
            .collect();
        for (a, b) in double_bonds {
            match self.perceive_bond(a, b) {
                Ok(Some(stereo)) => { self.bond_stereo.insert(OrderedPair::new(a, b), stereo); },
                Ok(None) => (),
                Err(error) => failures.push(CenterFailure {center: a, error: error.into()})
            }
        }

        failures
    }

    /// Perceive stereo and assign it from atom positions
    ///
    /// Positions are columns indexed by atom. Each center is fitted to the
    /// best matching shape of its size, in parallel. Centers whose geometry
    /// cannot be resolved are left unassigned and reported. So are double
    /// bonds whose dihedral is ill-defined, under their lower-indexed end.
    /// Centers drawn entirely flat take depth from wedge and dash hints on
    /// bonds starting at them.
    pub fn assign_stereo_from_positions(
        &mut self,
        positions: &Positions<Nucleus>,
        catalog: &Catalog,
        cache: &mut EnumerationCache,
        config: &ResolverConfig
    ) -> Result<Vec<CenterFailure>, GraphError> {
        if positions.len() < self.index_bound() {
            return Err(GraphError::PositionCountMismatch {expected: self.index_bound(), found: positions.len()});
        }

        let mut failures = self.perceive_stereo(catalog, cache, config);

        let centers: Vec<(Nucleus, Vec<Option<StereoHint>>)> = self.stereocenters().into_iter()
            .map(|center| (center, self.site_hints(center)))
            .collect();
        let perceived = &self.atom_stereo;
        let fits: Vec<(Nucleus, Result<ShapeFit, ResolutionError>)> = centers.par_iter()
            .map(|(center, hints)| {
                let stereo = &perceived[center];
                let fit = site_directions(positions, *center, &stereo.sites, config.min_site_distance)
                    .map(|mut directions| {
                        if lift_flat_directions(&mut directions, hints) {
                            tracing::debug!("Atom {} is drawn flat, using depth cues of its bonds", center);
                        }
                        directions
                    })
                    .map_err(ResolutionError::from)
                    .and_then(|directions| fit_shape(&directions, catalog, config));
                (*center, fit)
            })
            .collect();

        for (center, fit) in fits {
            let Some(stereo) = self.atom_stereo.get_mut(&center) else { continue };
            let resolved = fit.map_err(StereoError::from)
                .and_then(|fit| stereo.resolve(&fit, catalog, cache));
            match resolved {
                Ok(index) => tracing::debug!("Atom {} resolved to stereopermutation {} in {}", center, index, stereo.shape),
                Err(error) => {
                    tracing::warn!("Leaving atom {} unassigned: {}", center, error);
                    stereo.assignment = None;
                    failures.push(CenterFailure {center, error});
                }
            }
        }

        let mut bonds: Vec<OrderedPair<Nucleus>> = self.bond_stereo.keys().cloned().collect();
        bonds.sort();
        for bond in bonds {
            let Some(stereo) = self.bond_stereo.get_mut(&bond) else { continue };
            match stereo.fitted(positions, config) {
                Ok(configuration) => stereo.assignment = Some(configuration),
                Err(error) => {
                    tracing::warn!("Leaving bond {} unassigned: {}", bond, error);
                    stereo.assignment = None;
                    failures.push(CenterFailure {center: stereo.ends[0], error: error.into()});
                }
            }
        }

        Ok(failures)
    }

    /// Depth cues of single-atom sites of a perceived center, drawn from the center
    fn site_hints(&self, center: Nucleus) -> Vec<Option<StereoHint>> {
        let Some(stereo) = self.atom_stereo.get(&center) else { return Vec::new() };
        stereo.sites.iter()
            .map(|atoms| match atoms.as_slice() {
                [atom] => self.stereo_hint(center, *atom)
                    .and_then(|(from, hint)| (from == center).then_some(hint)),
                _ => None
            })
            .collect()
    }

    /// Positions matrix from per-atom coordinates
    pub fn positions_from(coordinates: &[[f64; 3]]) -> Positions<Nucleus> {
        Positions::wrap(Matrix3N::from_fn(coordinates.len(), |i, j| coordinates[j][i]))
    }
}
