/* Contracted gaussian type orbitals (CGTO) built on the primitives of gto.rs,
   and per-atom basis blocks read from NWChem-format basis files.
*/
#![allow(non_snake_case)]

use crate::basis::{AOBasis, Basis};
use crate::gto::GTO;
use nalgebra::{Matrix3, Vector3};
use periodic_table_on_an_enum::Element;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BasisError {
    #[error("unknown element symbol: {0}")]
    UnknownElement(String),
    #[error("unsupported shell type: {0}")]
    UnsupportedShell(String),
    #[error("malformed primitive line: {0:?}")]
    MalformedLine(String),
    #[error("no basis functions found")]
    Empty,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractedGTO {
    pub primitives: Vec<GTO>,
    pub coefficients: Vec<f64>,
    // 1s, 2px, 3dxy, ...
    pub shell_type: String,
    pub n: i32,
    pub l: i32,
    pub norm: f64,
}

impl ContractedGTO {
    pub fn new(primitives: Vec<GTO>, coefficients: Vec<f64>, shell_type: &str, n: i32) -> Self {
        let l = primitives
            .first()
            .map(|p| p.l_xyz.x + p.l_xyz.y + p.l_xyz.z)
            .unwrap_or(0);
        let mut cgto = ContractedGTO {
            primitives,
            coefficients,
            shell_type: shell_type.to_string(),
            n,
            l,
            norm: 1.0,
        };
        cgto.normalize();
        cgto
    }

    fn normalize(&mut self) {
        let s = self.contract(self, 0.0, |a, b| GTO::Sab(a, b));
        self.norm = if s > 0.0 { 1.0 / s.sqrt() } else { 1.0 };
    }

    pub fn recenter(&mut self, center: Vector3<f64>) {
        for p in self.primitives.iter_mut() {
            *p = p.recentered(center);
        }
    }

    pub fn center(&self) -> Option<Vector3<f64>> {
        self.primitives.first().map(|p| p.center)
    }

    /// `N_a N_b Σ_ij c_i c_j f(g_i, g_j)` for scalar, vector or matrix valued integrals.
    fn contract<T, F>(&self, other: &ContractedGTO, zero: T, f: F) -> T
    where
        T: std::ops::Add<Output = T> + std::ops::Mul<f64, Output = T>,
        F: Fn(&GTO, &GTO) -> T,
    {
        let mut acc = zero;
        for (pa, ca) in self.primitives.iter().zip(&self.coefficients) {
            for (pb, cb) in other.primitives.iter().zip(&other.coefficients) {
                acc = acc + f(pa, pb) * (ca * cb);
            }
        }
        acc * (self.norm * other.norm)
    }
}

impl Basis for ContractedGTO {
    fn evaluate(&self, r: &Vector3<f64>) -> f64 {
        self.primitives
            .iter()
            .zip(&self.coefficients)
            .map(|(p, c)| c * p.evaluate(r))
            .sum::<f64>()
            * self.norm
    }

    fn Sab(a: &Self, b: &Self) -> f64 {
        a.contract(b, 0.0, |x, y| GTO::Sab(x, y))
    }

    fn Tab(a: &Self, b: &Self) -> f64 {
        a.contract(b, 0.0, |x, y| GTO::Tab(x, y))
    }

    fn Vab(a: &Self, b: &Self, R: Vector3<f64>, Z: u32) -> f64 {
        a.contract(b, 0.0, |x, y| GTO::Vab(x, y, R, Z))
    }

    fn JKabcd(a: &Self, b: &Self, c: &Self, d: &Self) -> f64 {
        let mut val = 0.0;
        for (pa, ca) in a.primitives.iter().zip(&a.coefficients) {
            for (pb, cb) in b.primitives.iter().zip(&b.coefficients) {
                for (pc, cc) in c.primitives.iter().zip(&c.coefficients) {
                    for (pd, cd) in d.primitives.iter().zip(&d.coefficients) {
                        val += ca * cb * cc * cd * GTO::JKabcd(pa, pb, pc, pd);
                    }
                }
            }
        }
        val * a.norm * b.norm * c.norm * d.norm
    }

    fn Rinvab(a: &Self, b: &Self, C: Vector3<f64>) -> f64 {
        a.contract(b, 0.0, |x, y| GTO::Rinvab(x, y, C))
    }

    fn dRinvab(a: &Self, b: &Self, C: Vector3<f64>) -> Vector3<f64> {
        a.contract(b, Vector3::zeros(), |x, y| GTO::dRinvab(x, y, C))
    }

    fn ddRinvab(a: &Self, b: &Self, C: Vector3<f64>) -> Matrix3<f64> {
        a.contract(b, Matrix3::zeros(), |x, y| GTO::ddRinvab(x, y, C))
    }

    fn dRinvdab(a: &Self, b: &Self, C: Vector3<f64>) -> Matrix3<f64> {
        a.contract(b, Matrix3::zeros(), |x, y| GTO::dRinvdab(x, y, C))
    }
}

/// All contracted functions of one element, as read from a basis file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Basis631G {
    pub name: String,
    pub atomic_number: u32,
    pub basis_set: Vec<ContractedGTO>,
    center: Option<Vector3<f64>>,
}

const P_COMPONENTS: [(&str, [i32; 3]); 3] =
    [("px", [1, 0, 0]), ("py", [0, 1, 0]), ("pz", [0, 0, 1])];

const D_COMPONENTS: [(&str, [i32; 3]); 6] = [
    ("dxx", [2, 0, 0]),
    ("dxy", [1, 1, 0]),
    ("dxz", [1, 0, 1]),
    ("dyy", [0, 2, 0]),
    ("dyz", [0, 1, 1]),
    ("dzz", [0, 0, 2]),
];

impl Basis631G {
    // A block of the NWChem format looks like
    //
    // BASIS "ao basis" PRINT
    // Mg    S
    //   0.1172280000E+05       0.1977829317E-02
    //   ...
    // Mg    SP
    //   0.1891800000E+03      -0.3237170471E-02       0.4928129921E-02
    //   ...
    // END
    //
    // SP lines carry the s and p coefficients of a shared exponent.
    fn parse_primitive_block(
        lines: &[&str],
        shell: &str,
        n: i32,
    ) -> Result<Vec<ContractedGTO>, BasisError> {
        let mut rows = Vec::with_capacity(lines.len());
        for line in lines {
            let values = line
                .split_whitespace()
                .map(|tok| tok.replace(['D', 'd'], "E").parse::<f64>())
                .collect::<Result<Vec<f64>, _>>()
                .map_err(|_| BasisError::MalformedLine(line.to_string()))?;
            let needed = if shell == "SP" { 3 } else { 2 };
            if values.len() < needed {
                return Err(BasisError::MalformedLine(line.to_string()));
            }
            rows.push(values);
        }

        let origin = Vector3::zeros();
        let shell_of = |l_xyz: [i32; 3], column: usize, label: String| {
            let primitives = rows
                .iter()
                .map(|r| GTO::new(r[0], Vector3::from(l_xyz), origin))
                .collect();
            let coefficients = rows.iter().map(|r| r[column]).collect();
            ContractedGTO::new(primitives, coefficients, &label, n)
        };

        let res = match shell {
            "S" => vec![shell_of([0, 0, 0], 1, format!("{}s", n))],
            "P" => P_COMPONENTS
                .iter()
                .map(|(name, l)| shell_of(*l, 1, format!("{}{}", n, name)))
                .collect(),
            "SP" => std::iter::once(shell_of([0, 0, 0], 1, format!("{}s", n)))
                .chain(
                    P_COMPONENTS
                        .iter()
                        .map(|(name, l)| shell_of(*l, 2, format!("{}{}", n, name))),
                )
                .collect(),
            "D" => D_COMPONENTS
                .iter()
                .map(|(name, l)| shell_of(*l, 1, format!("{}{}", n, name)))
                .collect(),
            other => return Err(BasisError::UnsupportedShell(other.to_string())),
        };
        Ok(res)
    }

    /// Parses one element's basis in NWChem format.
    pub fn parse_nwchem(input: &str) -> Result<Self, BasisError> {
        let mut element: Option<Element> = None;
        let mut basis_set = Vec::new();
        let mut shell: Option<String> = None;
        let mut block: Vec<&str> = Vec::new();
        // principal quantum number per angular momentum, for shell labels
        let mut shell_count = [0i32; 3];

        let mut flush = |shell: &Option<String>,
                         block: &mut Vec<&str>,
                         basis_set: &mut Vec<ContractedGTO>|
         -> Result<(), BasisError> {
            if let Some(kind) = shell {
                if !block.is_empty() {
                    let l = match kind.as_str() {
                        "D" => 2,
                        "P" => 1,
                        _ => 0,
                    };
                    shell_count[l] += 1;
                    let n = shell_count[l] + l as i32;
                    basis_set.extend(Self::parse_primitive_block(block, kind, n)?);
                }
            }
            block.clear();
            Ok(())
        };

        for line in input.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with("BASIS") {
                continue;
            }
            if line.starts_with("END") {
                break;
            }

            let tokens: Vec<&str> = line.split_whitespace().collect();
            let is_header = tokens.len() == 2
                && tokens[0].chars().all(|c| c.is_ascii_alphabetic())
                && tokens[1].chars().all(|c| c.is_ascii_alphabetic());

            if is_header {
                flush(&shell, &mut block, &mut basis_set)?;
                if element.is_none() {
                    element = Some(
                        Element::from_symbol(tokens[0])
                            .ok_or_else(|| BasisError::UnknownElement(tokens[0].to_string()))?,
                    );
                }
                shell = Some(tokens[1].to_uppercase());
            } else if shell.is_some() {
                block.push(line);
            }
        }
        flush(&shell, &mut block, &mut basis_set)?;

        let element = element.ok_or(BasisError::Empty)?;
        if basis_set.is_empty() {
            return Err(BasisError::Empty);
        }

        Ok(Basis631G {
            name: element.get_symbol().to_string(),
            atomic_number: element.get_atomic_number() as u32,
            basis_set,
            center: None,
        })
    }
}

impl AOBasis for Basis631G {
    type BasisType = ContractedGTO;

    fn basis_size(&self) -> usize {
        self.basis_set.len()
    }

    fn get_basis(&self) -> Vec<Arc<Self::BasisType>> {
        self.basis_set.iter().cloned().map(Arc::new).collect()
    }

    fn set_center(&mut self, center: Vector3<f64>) {
        for cgto in self.basis_set.iter_mut() {
            cgto.recenter(center);
        }
        self.center = Some(center);
    }

    fn get_center(&self) -> Option<Vector3<f64>> {
        self.center
    }
}
