use derive_more::Into;
use serde::{Serialize, Deserialize};

static SYMBOLS: [&str; 118] = [
    "H", "He",
    "Li", "Be", "B", "C", "N", "O", "F", "Ne",
    "Na", "Mg", "Al", "Si", "P", "S", "Cl", "Ar",
    "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge", "As", "Se", "Br", "Kr",
    "Rb", "Sr", "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In", "Sn", "Sb", "Te", "I", "Xe",
    "Cs", "Ba",
    "La", "Ce", "Pr", "Nd", "Pm", "Sm", "Eu", "Gd", "Tb", "Dy", "Ho", "Er", "Tm", "Yb",
    "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg", "Tl", "Pb", "Bi", "Po", "At", "Rn",
    "Fr", "Ra",
    "Ac", "Th", "Pa", "U", "Np", "Pu", "Am", "Cm", "Bk", "Cf", "Es", "Fm", "Md", "No",
    "Lr", "Rf", "Db", "Sg", "Bh", "Hs", "Mt", "Ds", "Rg", "Cn", "Nh", "Fl", "Mc", "Lv", "Ts", "Og",
];

/// Chemical element, identified by its atomic number
///
/// Ordered by atomic number, which is the first ranking criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Into, Serialize, Deserialize)]
pub struct Element(u8);

impl Element {
    pub const H: Element = Element(1);
    pub const C: Element = Element(6);
    pub const N: Element = Element(7);
    pub const O: Element = Element(8);
    pub const F: Element = Element(9);
    pub const P: Element = Element(15);
    pub const S: Element = Element(16);
    pub const CL: Element = Element(17);
    pub const FE: Element = Element(26);
    pub const CO: Element = Element(27);
    pub const BR: Element = Element(35);
    pub const RU: Element = Element(44);
    pub const I: Element = Element(53);

    /// Element of an atomic number between 1 and 118
    pub fn from_atomic_number(z: u8) -> Option<Element> {
        (1..=SYMBOLS.len()).contains(&(z as usize)).then_some(Element(z))
    }

    /// Element of a case-sensitive symbol
    pub fn from_symbol(symbol: &str) -> Option<Element> {
        SYMBOLS.iter()
            .position(|&s| s == symbol)
            .map(|i| Element(i as u8 + 1))
    }

    pub fn atomic_number(self) -> u8 {
        self.0
    }

    /// Element symbol, `?` for deserialized atomic numbers out of range
    pub fn symbol(self) -> &'static str {
        (self.0 as usize).checked_sub(1)
            .and_then(|i| SYMBOLS.get(i))
            .copied()
            .unwrap_or("?")
    }
}

impl std::fmt::Display for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

#[cfg(test)]
mod tests {
    use crate::molecule::element::*;

    #[test]
    fn symbols() {
        assert_eq!(Element::from_symbol("C"), Some(Element::C));
        assert_eq!(Element::from_symbol("Cl"), Some(Element::CL));
        assert_eq!(Element::from_symbol("Og").map(Element::atomic_number), Some(118));
        assert_eq!(Element::from_symbol("cl"), None);
        assert_eq!(Element::RU.symbol(), "Ru");
        assert_eq!(Element::I.to_string(), "I");
    }

    #[test]
    fn atomic_numbers() {
        assert_eq!(Element::from_atomic_number(0), None);
        assert_eq!(Element::from_atomic_number(119), None);
        assert_eq!(Element::from_atomic_number(26), Some(Element::FE));
        assert!(Element::H < Element::C && Element::C < Element::BR);
        let z: u8 = Element::CO.into();
        assert_eq!(z, 27);
    }
}
