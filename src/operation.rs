//! Catalog of hardcoded operations referenced by `hardFormula` nodes.
//!
//! A hard formula in a document carries only an id; the catalog supplies
//! the declaration (the id plus its typed input signature) that gets cloned
//! into the model graph. Formula execution is out of scope here.

use crate::model::{InputType, Operation, OperationInput};
use indexmap::IndexMap;

/// Registry of known hardcoded operations, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct OperationCatalog {
    operations: IndexMap<String, Operation>,
}

fn input(id: &str, input_type: InputType) -> OperationInput {
    OperationInput {
        id: id.to_string(),
        input_type,
    }
}

impl OperationCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The standard catalog of clinical formulas.
    pub fn standard() -> Self {
        use InputType::{Bool, Double, Int};

        let mut catalog = Self::default();

        catalog.register(
            "IdealBodyWeight",
            vec![input("height", Int), input("isMale", Bool)],
        );
        catalog.register(
            "BodySurfaceArea",
            vec![input("height", Int), input("bodyweight", Double)],
        );
        catalog.register(
            "eGFR_CockcroftGaultGeneral",
            vec![
                input("bodyweight", Double),
                input("age", Int),
                input("creatinine", Double),
                input("isMale", Bool),
            ],
        );
        // Variant taking sex as a continuous value instead of a flag.
        catalog.register(
            "OperationEGFRCockcroftGaultGeneral",
            vec![
                input("bodyweight", Double),
                input("age", Int),
                input("creatinine", Double),
                input("sex", Double),
            ],
        );
        catalog.register(
            "eGFR_CockcroftGaultIBW",
            vec![
                input("bodyweight", Double),
                input("age", Int),
                input("height", Int),
                input("creatinine", Double),
                input("isMale", Bool),
            ],
        );
        catalog.register(
            "eGFR_CockcroftGaultAdjIBW",
            vec![
                input("bodyweight", Double),
                input("age", Int),
                input("height", Int),
                input("creatinine", Double),
                input("isMale", Bool),
            ],
        );
        catalog.register(
            "GFR_MDRD",
            vec![
                input("bodyweight", Double),
                input("height", Int),
                input("age", Int),
                input("creatinine", Double),
                input("isMale", Bool),
                input("isAB", Bool),
            ],
        );
        catalog.register(
            "GFR_CKD_EPI",
            vec![
                input("bodyweight", Double),
                input("height", Int),
                input("age", Int),
                input("creatinine", Double),
                input("isMale", Bool),
                input("isAB", Bool),
            ],
        );
        catalog.register(
            "eGFR_Schwartz",
            vec![
                input("bodyweight", Double),
                input("height", Int),
                input("age", Int),
                input("creatinine", Double),
                input("isMale", Bool),
                input("bornAtTerm", Bool),
            ],
        );
        catalog.register(
            "GFR_Jelliffe",
            vec![
                input("bodyweight", Double),
                input("age", Int),
                input("height", Int),
                input("creatinine", Double),
                input("isMale", Bool),
            ],
        );
        catalog.register(
            "eGFR_SalazarCorcoran",
            vec![
                input("bodyweight", Double),
                input("age", Int),
                input("height", Int),
                input("creatinine", Double),
                input("isMale", Bool),
            ],
        );
        catalog.register("direct", vec![input("input0", Double)]);
        catalog.register(
            "sum2",
            vec![input("input0", Double), input("input1", Double)],
        );

        catalog
    }

    pub fn register(&mut self, id: &str, inputs: Vec<OperationInput>) {
        self.operations.insert(
            id.to_string(),
            Operation::Hard {
                id: id.to_string(),
                inputs,
            },
        );
    }

    /// Resolves an id to a cloned operation declaration.
    pub fn get(&self, id: &str) -> Option<Operation> {
        self.operations.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.operations.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
