use crate::unit::Unit;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────────────────────────────────────
// DrugModelDoc – binary serialization wrapper
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrugModelDoc {
    pub model: DrugModel,
}

impl DrugModelDoc {
    /// Save the DrugModelDoc to a binary file with magic bytes and versioning.
    pub fn save_to_binary<P: AsRef<std::path::Path>>(&self, path: P) -> anyhow::Result<()> {
        let file = std::fs::File::create(path)?;
        let mut writer = std::io::BufWriter::new(file);
        std::io::Write::write_all(&mut writer, b"TDDMODEL")?;
        std::io::Write::write_all(&mut writer, &1u32.to_le_bytes())?;
        bincode::serde::encode_into_std_write(self, &mut writer, bincode::config::standard())?;
        Ok(())
    }

    /// Load a DrugModelDoc from a binary file, checking magic bytes and version.
    pub fn load_from_binary<P: AsRef<std::path::Path>>(path: P) -> anyhow::Result<Self> {
        let file = std::fs::File::open(path)?;
        let mut reader = std::io::BufReader::new(file);
        let mut magic = [0u8; 8];
        std::io::Read::read_exact(&mut reader, &mut magic)?;
        if &magic != b"TDDMODEL" {
            anyhow::bail!("Invalid magic bytes: expected 'TDDMODEL'");
        }
        let mut version_bytes = [0u8; 4];
        std::io::Read::read_exact(&mut reader, &mut version_bytes)?;
        let version = u32::from_le_bytes(version_bytes);
        if version != 1 {
            anyhow::bail!("Unsupported version: {}", version);
        }
        let doc: DrugModelDoc =
            bincode::serde::decode_from_std_read(&mut reader, bincode::config::standard())?;
        Ok(doc)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// DrugModel – root of the imported object graph
// ────────────────────────────────────────────────────────────────────────────

/// A complete drug model as described by a `.tdd` document.
///
/// Ownership is strictly tree-shaped: every node is owned by its parent.
/// The only cross-reference in the graph is [`AbsorptionAssociation`],
/// which refers to an analyte set by index into `analyte_sets`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DrugModel {
    pub drug_id: String,
    pub drug_model_id: String,
    pub domain: Option<DrugModelDomain>,
    pub covariates: Vec<CovariateDefinition>,
    pub active_moieties: Vec<ActiveMoiety>,
    /// Never empty on a successfully imported model.
    pub analyte_sets: Vec<AnalyteSet>,
    pub formulation_and_routes: Option<FormulationAndRoutes>,
    pub time_considerations: Option<TimeConsiderations>,
    /// Filled from the document `head` after the `drugModel` subtree.
    pub metadata: Option<DrugModelMetadata>,
}

impl DrugModel {
    /// Convenience accessor for single-analyte-set models.
    pub fn analyte_set(&self) -> Option<&AnalyteSet> {
        self.analyte_sets.first()
    }

    /// All analyte ids declared across all analyte sets.
    pub fn analyte_ids(&self) -> Vec<&str> {
        self.analyte_sets
            .iter()
            .flat_map(|s| s.analytes.iter().map(|a| a.id.as_str()))
            .collect()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Domain & constraints
// ────────────────────────────────────────────────────────────────────────────

/// Validity domain of a drug model: a description plus patient constraints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DrugModelDomain {
    pub description: TranslatableString,
    pub constraints: Vec<Constraint>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConstraintType {
    Hard,
    Soft,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Constraint {
    pub constraint_type: ConstraintType,
    pub required_covariate_ids: Vec<String>,
    pub check_operation: Option<Operation>,
    pub error_message: TranslatableString,
}

// ────────────────────────────────────────────────────────────────────────────
// Covariates
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CovariateType {
    Standard,
    Sex,
    AgeInYears,
    AgeInDays,
    AgeInWeeks,
    AgeInMonths,
    Dose,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DataType {
    Int,
    Double,
    Bool,
    Date,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum InterpolationType {
    Direct,
    Linear,
    Sigmoid,
    Tanh,
}

/// A patient-specific input variable affecting PK parameter values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CovariateDefinition {
    pub id: String,
    pub covariate_type: CovariateType,
    pub data_type: DataType,
    pub unit: Unit,
    pub interpolation: InterpolationType,
    /// Default value, optionally overridden by an apriori formula.
    pub value: PopulationValue,
    pub validation: Option<Operation>,
    pub validation_error_message: TranslatableString,
    pub refresh_period: Duration,
    pub name: TranslatableString,
    pub description: TranslatableString,
}

// ────────────────────────────────────────────────────────────────────────────
// Active moieties & targets
// ────────────────────────────────────────────────────────────────────────────

/// The clinically active substance derived from one or more analytes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActiveMoiety {
    pub id: String,
    pub unit: Unit,
    pub analyte_ids: Vec<String>,
    /// Formula aggregating the analyte concentrations into the moiety.
    pub formula: Option<Operation>,
    pub targets: Vec<TargetDefinition>,
    pub name: TranslatableString,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TargetType {
    Unknown,
    Peak,
    Residual,
    Mean,
    Auc,
    Auc24,
    CumulativeAuc,
    AucOverMic,
    Auc24OverMic,
    TimeOverMic,
    AucDividedByMic,
    Auc24DividedByMic,
    PeakDividedByMic,
    ResidualDividedByMic,
    FractionTimeOverMic,
}

impl TargetType {
    /// Target types that only make sense relative to a minimum inhibitory
    /// concentration, and therefore require an explicit `mic` sub-target.
    pub fn requires_mic(self) -> bool {
        matches!(
            self,
            TargetType::AucOverMic
                | TargetType::Auc24OverMic
                | TargetType::TimeOverMic
                | TargetType::AucDividedByMic
                | TargetType::Auc24DividedByMic
                | TargetType::PeakDividedByMic
                | TargetType::ResidualDividedByMic
        )
    }
}

/// One of the nine named slots of a target (min, max, best, mic, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SubTarget {
    pub value: f64,
    pub operation: Option<Operation>,
}

/// A desired pharmacodynamic outcome range.
///
/// `min`, `max` and `best` always come from the document; the remaining
/// slots are synthesized as zero-valued placeholders when absent so that
/// consumers never observe a missing sub-target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TargetDefinition {
    pub target_type: TargetType,
    pub unit: Unit,
    /// Id of the owning active moiety, set when the target is attached.
    pub active_moiety_id: String,
    pub min: SubTarget,
    pub max: SubTarget,
    pub best: SubTarget,
    pub mic: SubTarget,
    pub t_min: SubTarget,
    pub t_max: SubTarget,
    pub t_best: SubTarget,
    pub toxicity_alarm: SubTarget,
    pub inefficacy_alarm: SubTarget,
    pub mic_unit: Unit,
    pub time_unit: Unit,
}

// ────────────────────────────────────────────────────────────────────────────
// Analyte sets
// ────────────────────────────────────────────────────────────────────────────

/// A group of analytes sharing one PK model and disposition parameter set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalyteSet {
    pub id: String,
    /// Resolved against the PK-model catalog after import.
    pub pk_model_id: String,
    /// Weight part of the first analyte's concentration unit.
    pub dose_unit: Unit,
    pub analytes: Vec<Analyte>,
    pub disposition_parameters: ParameterSetDefinition,
}

/// A measurable chemical species tracked by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Analyte {
    pub id: String,
    pub unit: Unit,
    pub molar_mass: MolarMass,
    pub error_model: Option<ErrorModel>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MolarMass {
    pub value: f64,
    pub unit: Unit,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ResidualErrorType {
    Additive,
    Proportional,
    Exponential,
    Propexp,
    Mixed,
    Softcoded,
    None,
}

/// Residual error model of an analyte measurement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorModel {
    pub error_model_type: ResidualErrorType,
    pub sigmas: Vec<PopulationValue>,
    pub apply_formula: Option<Operation>,
    pub likelihood_formula: Option<Operation>,
}

// ────────────────────────────────────────────────────────────────────────────
// PK parameters
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ParameterSetDefinition {
    pub parameters: Vec<ParameterDefinition>,
    pub correlations: Vec<Correlation>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ParameterVariabilityType {
    Normal,
    LogNormal,
    Proportional,
    Exponential,
    Additive,
    Logit,
    None,
}

/// Between-subject variability of a PK parameter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParameterVariability {
    pub variability_type: ParameterVariabilityType,
    pub std_devs: Vec<f64>,
}

/// A single PK model parameter (clearance, volume, absorption rate, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParameterDefinition {
    pub id: String,
    pub unit: Unit,
    pub value: PopulationValue,
    pub variability: Option<ParameterVariability>,
    pub validation: Option<Operation>,
}

/// Correlation coefficient between two parameters of the same set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Correlation {
    pub param1: String,
    pub param2: String,
    pub value: f64,
}

// ────────────────────────────────────────────────────────────────────────────
// Formulations & routes
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Formulation {
    Undefined,
    ParenteralSolution,
    OralSolution,
    Test,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AdministrationRoute {
    Undefined,
    Intramuscular,
    IntravenousBolus,
    IntravenousDrip,
    Nasal,
    Oral,
    Rectal,
    Subcutaneous,
    Sublingual,
    Transdermal,
    Vaginal,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AbsorptionModel {
    Undefined,
    Intravascular,
    Extravascular,
    ExtravascularLag,
    Infusion,
}

/// All formulations of a drug model, with one flagged default.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FormulationAndRoutes {
    /// Value of the `default` attribute on the `formulationAndRoutes` node.
    pub default_id: String,
    pub entries: Vec<FullFormulationAndRoute>,
}

impl FormulationAndRoutes {
    /// The entry whose id matches the declared default, if any.
    pub fn default_entry(&self) -> Option<&FullFormulationAndRoute> {
        self.entries.iter().find(|f| f.id == self.default_id)
    }
}

/// One concrete drug presentation and administration pathway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FullFormulationAndRoute {
    pub id: String,
    pub formulation: Formulation,
    pub administration_name: String,
    pub administration_route: AdministrationRoute,
    pub absorption_model: AbsorptionModel,
    pub loading_dose_recommended: bool,
    pub rest_period_recommended: bool,
    pub doses: Option<ValidDoses>,
    pub intervals: Option<ValidDurations>,
    pub infusions: Option<ValidDurations>,
    pub standard_treatment: Option<StandardTreatment>,
    pub analyte_conversions: Vec<AnalyteConversion>,
    pub associations: Vec<AbsorptionAssociation>,
}

/// Scaling factor applied to a specific analyte for this formulation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalyteConversion {
    pub analyte_id: String,
    pub factor: f64,
}

/// Links an analyte set to absorption-specific parameters.
///
/// The analyte set is referenced by index into
/// [`DrugModel::analyte_sets`], keeping the graph free of cycles.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AbsorptionAssociation {
    pub analyte_set_index: usize,
    pub absorption_model: AbsorptionModel,
    pub parameters: ParameterSetDefinition,
}

/// A set of admissible values, either a stepped range or a fixed list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ValidValues {
    Range {
        from: PopulationValue,
        to: PopulationValue,
        step: PopulationValue,
    },
    Fixed(Vec<f64>),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidDoses {
    pub unit: Unit,
    pub default: PopulationValue,
    pub values: Vec<ValidValues>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidDurations {
    pub unit: Unit,
    pub default: PopulationValue,
    pub values: Vec<ValidValues>,
}

/// Standard treatment duration rule for a formulation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StandardTreatment {
    pub is_fixed_duration: bool,
    pub value: f64,
    pub unit: Unit,
}

// ────────────────────────────────────────────────────────────────────────────
// Time considerations
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TimeConsiderations {
    pub half_life: Option<HalfLife>,
    pub outdated_measure: Option<OutdatedMeasure>,
}

/// Elimination half-life used to bound prediction horizons.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HalfLife {
    pub unit: Unit,
    pub value: f64,
    pub multiplier: f64,
    pub operation: Option<Operation>,
}

/// Age after which a measurement no longer informs predictions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutdatedMeasure {
    pub unit: Unit,
    pub value: f64,
    pub operation: Option<Operation>,
}

// ────────────────────────────────────────────────────────────────────────────
// Operations (formula declarations)
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum InputType {
    Int,
    Double,
    Bool,
}

/// A declared typed input of an operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OperationInput {
    pub id: String,
    pub input_type: InputType,
}

/// A named formula with declared typed inputs.
///
/// Soft formulas embed their own opaque script; hard formulas are resolved
/// by id against the hardcoded-operation catalog and cloned. Only the
/// declaration shape is modeled here; execution is out of scope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Operation {
    Soft {
        inputs: Vec<OperationInput>,
        script: String,
    },
    Hard {
        id: String,
        inputs: Vec<OperationInput>,
    },
}

impl Operation {
    pub fn inputs(&self) -> &[OperationInput] {
        match self {
            Operation::Soft { inputs, .. } => inputs,
            Operation::Hard { inputs, .. } => inputs,
        }
    }
}

/// A numeric default optionally overridden by an apriori formula.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PopulationValue {
    pub value: f64,
    pub operation: Option<Operation>,
}

// ────────────────────────────────────────────────────────────────────────────
// Metadata
// ────────────────────────────────────────────────────────────────────────────

/// Descriptive metadata from the document `head`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DrugModelMetadata {
    pub drug_name: TranslatableString,
    pub drug_description: TranslatableString,
    pub study_name: TranslatableString,
    pub study_authors: String,
    pub description: TranslatableString,
    /// Filled from the PK-model catalog for single-analyte-set models.
    pub distribution: TranslatableString,
    pub elimination: TranslatableString,
    pub atcs: Vec<String>,
}

/// A string translated into one or more languages.
///
/// Preserves the insertion order of `lang` attributes from the XML.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TranslatableString {
    strings: IndexMap<String, String>,
}

impl TranslatableString {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, lang: &str, value: &str) {
        self.strings.insert(lang.to_string(), value.to_string());
    }

    pub fn get(&self, lang: &str) -> Option<&str> {
        self.strings.get(lang).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Duration
// ────────────────────────────────────────────────────────────────────────────

/// A span of time with second precision, as written in `.tdd` documents
/// (`HH:MM:SS` literals, or value+unit pairs for refresh periods).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Duration {
    seconds: i64,
}

impl Duration {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn from_secs(seconds: i64) -> Self {
        Duration { seconds }
    }

    pub fn from_hms(hours: i64, minutes: i64, seconds: i64) -> Self {
        Duration {
            seconds: hours * 3600 + minutes * 60 + seconds,
        }
    }

    pub fn as_secs(&self) -> i64 {
        self.seconds
    }

    pub fn is_zero(&self) -> bool {
        self.seconds == 0
    }
}
