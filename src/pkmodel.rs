//! Catalog of available pharmacokinetic models.
//!
//! Each analyte set in a document names a PK model by id; import fails when
//! the id is not present in the collection. Entries also carry the english
//! distribution and elimination descriptions copied into model metadata.

use crate::model::TranslatableString;
use indexmap::IndexMap;

/// One registered PK model.
#[derive(Debug, Clone)]
pub struct PkModelEntry {
    pub id: String,
    pub distribution: TranslatableString,
    pub elimination: TranslatableString,
}

impl PkModelEntry {
    fn new(id: &str, distribution: &str, elimination: &str) -> Self {
        let mut d = TranslatableString::new();
        d.set("en", distribution);
        let mut e = TranslatableString::new();
        e.set("en", elimination);
        PkModelEntry {
            id: id.to_string(),
            distribution: d,
            elimination: e,
        }
    }
}

/// Registry of PK models, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct PkModelCollection {
    models: IndexMap<String, PkModelEntry>,
}

impl PkModelCollection {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The default collection, including the test models used by
    /// synthetic drug-model documents.
    pub fn standard() -> Self {
        let mut collection = Self::default();

        for (comps, variants) in [
            (1, &["macro", "micro"][..]),
            (2, &["macro", "macroRatios", "micro"][..]),
        ] {
            let plural = if comps == 1 {
                "compartment"
            } else {
                "compartments"
            };
            let distribution = format!("{} {}", comps, plural);
            for variant in variants {
                collection.add(PkModelEntry::new(
                    &format!("linear.{}comp.{}", comps, variant),
                    &distribution,
                    "linear",
                ));
            }
        }

        for transit in 1..=6 {
            let distribution = format!(
                "2 compartments, erlang absorption with {} transit compartments",
                transit
            );
            for variant in ["micro", "macro"] {
                collection.add(PkModelEntry::new(
                    &format!("linear.2comp.erlang{}.{}", transit, variant),
                    &distribution,
                    "linear",
                ));
            }
        }

        for variant in ["micro", "macro"] {
            collection.add(PkModelEntry::new(
                &format!("linear.3comp.{}", variant),
                "Extra- or intra-vascular",
                "Linear",
            ));
        }

        for id in [
            "michaelismenten.1comp",
            "michaelismenten.1comp.vmaxamount",
            "michaelismenten.2comp.micro",
            "michaelismenten.2comp.macro",
            "michaelismenten.2comp.vmaxamount.micro",
            "michaelismenten.2comp.vmaxamount.macro",
        ] {
            collection.add(PkModelEntry::new(
                id,
                "Extra- or intra-vascular",
                "Michaelis-Menten",
            ));
        }

        for id in [
            "michaelismentenlinear.1comp.micro",
            "michaelismentenlinear.1comp.macro",
            "michaelismentenlinear.1comp.vmaxamount.micro",
            "michaelismentenlinear.1comp.vmaxamount.macro",
            "michaelismentenlinear.2comp.micro",
            "michaelismentenlinear.2comp.macro",
            "michaelismentenlinear.2comp.vmaxamount.micro",
            "michaelismentenlinear.2comp.vmaxamount.macro",
        ] {
            collection.add(PkModelEntry::new(
                id,
                "Extra- or intra-vascular",
                "Michaelis-Menten and linear",
            ));
        }

        collection.add(PkModelEntry::new(
            "michaelismenten.enzyme.1comp",
            "Extra- or intra-vascular, transit compartments",
            "Michaelis-Menten",
        ));

        // Synthetic models used by virtual drug files.
        for id in [
            "test.constantelimination",
            "test.multiconstantelimination",
            "test.pkasymptotic",
        ] {
            collection.add(PkModelEntry::new(id, "", ""));
        }

        collection
    }

    pub fn add(&mut self, entry: PkModelEntry) {
        self.models.insert(entry.id.clone(), entry);
    }

    pub fn get(&self, id: &str) -> Option<&PkModelEntry> {
        self.models.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.models.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
