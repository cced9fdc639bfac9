//! Unit registry for `.tdd` drug-model documents.
//!
//! Units are plain strings validated against a closed registry of known
//! spellings, grouped by physical category. Units of the same category are
//! mutually convertible through per-category base factors.

use serde::{Deserialize, Serialize};

/// A measurement unit as written in a document, e.g. `"ug/l"` or `"h"`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Unit(String);

impl Unit {
    pub fn new(s: &str) -> Self {
        Unit(s.to_string())
    }

    pub fn empty() -> Self {
        Unit(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Unit {
    fn from(s: &str) -> Self {
        Unit::new(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitCategory {
    Weight,
    MolarMass,
    Concentration,
    ConcentrationTime,
    MoleConcentration,
    FlowRate,
    Temperature,
    Time,
    Length,
    NoUnit,
}

// Factors are relative to an arbitrary per-category base unit. Only ratios
// within the same category are meaningful.
const WEIGHT: &[(&str, f64)] = &[("kg", 1000.0), ("g", 1.0), ("mg", 0.001), ("ug", 0.000001)];

const MOLAR_MASS: &[(&str, f64)] = &[
    ("g/mol", 1.0),
    ("g/umol", 1_000_000.0),
    ("kg/mol", 1000.0),
    ("kg/umol", 1_000_000_000.0),
];

const CONCENTRATION: &[(&str, f64)] = &[
    ("g/l", 1.0),
    ("mg/l", 0.001),
    ("ug/l", 0.000001),
    ("g/ml", 1000.0),
    ("mg/ml", 1.0),
    ("ug/ml", 0.001),
];

const CONCENTRATION_TIME: &[(&str, f64)] = &[
    ("ug*h/l", 1.0),
    ("mg*h/l", 1000.0),
    ("h*mg/l", 1000.0),
    ("h*ug/l", 1.0),
    ("h*g/l", 1_000_000.0),
    ("g*h/l", 1_000_000.0),
    ("mg*min/l", 1000.0 / 60.0),
    ("min*mg/l", 1000.0 / 60.0),
    ("g*min/l", 1_000_000.0 / 60.0),
    ("min*g/l", 1_000_000.0 / 60.0),
    ("ug*min/l", 1.0 / 60.0),
    ("min*ug/l", 1.0 / 60.0),
    ("ug*h/ml", 1000.0),
    ("mg*h/ml", 1_000_000.0),
    ("h*mg/ml", 1_000_000.0),
    ("h*ug/ml", 1000.0),
    ("h*g/ml", 1_000_000_000.0),
    ("g*h/ml", 1_000_000_000.0),
    ("mg*min/ml", 1_000_000.0 / 60.0),
    ("min*mg/ml", 1_000_000.0 / 60.0),
    ("g*min/ml", 1_000_000_000.0 / 60.0),
    ("min*g/ml", 1_000_000_000.0 / 60.0),
    ("ug*min/ml", 1000.0 / 60.0),
    ("min*ug/ml", 1000.0 / 60.0),
];

const MOLE_CONCENTRATION: &[(&str, f64)] = &[
    ("mol/l", 1.0),
    ("mmol/l", 0.001),
    ("umol/l", 0.000001),
    ("µmol/l", 0.000001),
    ("µmol/L", 0.000001),
    ("mol/ml", 1000.0),
    ("mmol/ml", 1.0),
    ("umol/ml", 0.001),
    ("µmol/ml", 0.001),
];

const FLOW_RATE: &[(&str, f64)] = &[
    ("ml/min", 1.0),
    ("l/min", 1000.0),
    ("ml/h", 1.0 / 60.0),
    ("l/h", 1000.0 / 60.0),
];

const TEMPERATURE: &[(&str, f64)] = &[("celsius", 1.0)];

const TIME: &[(&str, f64)] = &[
    ("min", 1.0),
    ("s", 1.0 / 60.0),
    ("h", 60.0),
    ("d", 24.0 * 60.0),
    ("w", 7.0 * 24.0 * 60.0),
    ("month", 30.0 * 24.0 * 60.0),
    ("y", 365.0 * 24.0 * 60.0),
];

const LENGTH: &[(&str, f64)] = &[
    ("m", 1.0),
    ("cm", 0.01),
    ("dm", 0.1),
    ("mm", 0.001),
    ("ft", 0.3048),
    ("in", 0.0254),
];

const NO_UNIT: &[(&str, f64)] = &[("-", 1.0), ("", 1.0)];

const CATEGORIES: &[(UnitCategory, &[(&str, f64)])] = &[
    (UnitCategory::Weight, WEIGHT),
    (UnitCategory::MolarMass, MOLAR_MASS),
    (UnitCategory::Concentration, CONCENTRATION),
    (UnitCategory::ConcentrationTime, CONCENTRATION_TIME),
    (UnitCategory::MoleConcentration, MOLE_CONCENTRATION),
    (UnitCategory::FlowRate, FLOW_RATE),
    (UnitCategory::Temperature, TEMPERATURE),
    (UnitCategory::Time, TIME),
    (UnitCategory::Length, LENGTH),
    (UnitCategory::NoUnit, NO_UNIT),
];

fn lookup(spelling: &str) -> Option<(UnitCategory, f64)> {
    for (category, table) in CATEGORIES {
        if let Some((_, factor)) = table.iter().find(|(s, _)| *s == spelling) {
            return Some((*category, *factor));
        }
    }
    None
}

/// True if the spelling appears in the registry.
pub fn is_known(unit: &Unit) -> bool {
    lookup(unit.as_str()).is_some()
}

/// Rewrites long-form time spellings to their registry form, e.g.
/// `"days"` to `"d"`. Returns true if a rewrite happened.
pub fn tolerate(spelling: &mut String) -> bool {
    const TOLERATED: &[(&str, &str)] = &[
        ("day", "d"),
        ("days", "d"),
        ("week", "w"),
        ("weeks", "w"),
        ("months", "month"),
        ("year", "y"),
        ("years", "y"),
    ];
    for (long, short) in TOLERATED {
        if spelling == long {
            *spelling = (*short).to_string();
            return true;
        }
    }
    false
}

/// True if the spelling belongs to the given category.
pub fn is_of_type(unit: &Unit, category: UnitCategory) -> bool {
    lookup(unit.as_str()).is_some_and(|(c, _)| c == category)
}

/// True if both units belong to the same category.
pub fn is_compatible(a: &Unit, b: &Unit) -> bool {
    match (lookup(a.as_str()), lookup(b.as_str())) {
        (Some((ca, _)), Some((cb, _))) => ca == cb,
        _ => false,
    }
}

/// Converts a value between two units of the same category.
pub fn convert_to_unit(value: f64, from: &Unit, to: &Unit) -> anyhow::Result<f64> {
    match (lookup(from.as_str()), lookup(to.as_str())) {
        (Some((ca, fa)), Some((cb, fb))) if ca == cb => Ok(value * fa / fb),
        _ => {
            tracing::error!(from = %from, to = %to, "no known unit conversion");
            anyhow::bail!("no known conversion from '{}' to '{}'", from, to)
        }
    }
}

/// Derives the dose unit from a concentration unit by taking the weight
/// part before the `/`, e.g. `"ug/l"` yields `"ug"`.
pub fn weight_from_concentration(unit: &Unit) -> Option<Unit> {
    let numerator = unit.as_str().split('/').next()?;
    let candidate = Unit::new(numerator);
    if WEIGHT.iter().any(|(s, _)| *s == numerator) {
        Some(candidate)
    } else {
        None
    }
}

/// Number of seconds represented by one of `unit`, for the unit spellings
/// accepted on covariate refresh periods.
pub fn duration_unit_in_seconds(unit: &Unit) -> Option<f64> {
    match unit.as_str() {
        "d" => Some(24.0 * 3600.0),
        "h" => Some(3600.0),
        "m" | "min" => Some(60.0),
        "s" => Some(1.0),
        _ => None,
    }
}
