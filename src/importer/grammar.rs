//! Recursive-descent walker over the drug-model grammar.
//!
//! One extraction function per grammar production. Every function iterates
//! the direct children of its container node exactly once, dispatching on
//! exact tag names; unknown tags are reported through
//! [`Diagnostics::unexpected_tag`]. Once the error latch is set anywhere in
//! a subtree, record builders return `None` and list builders skip the
//! offending element while keeping the latch set, so the overall import
//! still fails.

use super::diagnostics::Diagnostics;
use super::scalars::{self, CheckUnit};
use crate::model::*;
use crate::operation::OperationCatalog;
use crate::unit::{self, Unit, UnitCategory};

pub struct Walker<'a> {
    pub diags: Diagnostics,
    operations: &'a OperationCatalog,
}

impl<'a> Walker<'a> {
    pub fn new(operations: &'a OperationCatalog) -> Self {
        Walker {
            diags: Diagnostics::new(),
            operations,
        }
    }

    fn text(&self, node: roxmltree::Node) -> String {
        scalars::extract_string(node)
    }

    // ────────────────────────────────────────────────────────────────────
    // Enum productions
    // ────────────────────────────────────────────────────────────────────

    fn enum_lookup<T: Copy>(
        &mut self,
        node: roxmltree::Node,
        table: &[(&str, T)],
        fallback: T,
    ) -> T {
        let value = self.text(node);
        match table.iter().find(|(s, _)| *s == value) {
            Some((_, v)) => *v,
            None => {
                self.diags.node_error(node);
                fallback
            }
        }
    }

    fn extract_covariate_type(&mut self, node: roxmltree::Node) -> CovariateType {
        self.enum_lookup(
            node,
            &[
                ("standard", CovariateType::Standard),
                ("sex", CovariateType::Sex),
                ("ageInYears", CovariateType::AgeInYears),
                ("ageInDays", CovariateType::AgeInDays),
                ("ageInWeeks", CovariateType::AgeInWeeks),
                ("ageInMonths", CovariateType::AgeInMonths),
                ("dose", CovariateType::Dose),
            ],
            CovariateType::Standard,
        )
    }

    fn extract_data_type(&mut self, node: roxmltree::Node) -> DataType {
        self.enum_lookup(
            node,
            &[
                ("int", DataType::Int),
                ("double", DataType::Double),
                ("bool", DataType::Bool),
                ("date", DataType::Date),
            ],
            DataType::Double,
        )
    }

    fn extract_target_type(&mut self, node: roxmltree::Node) -> TargetType {
        self.enum_lookup(
            node,
            &[
                ("peak", TargetType::Peak),
                ("residual", TargetType::Residual),
                ("mean", TargetType::Mean),
                ("auc", TargetType::Auc),
                ("auc24", TargetType::Auc24),
                ("cumulativeAuc", TargetType::CumulativeAuc),
                ("aucOverMic", TargetType::AucOverMic),
                ("auc24OverMic", TargetType::Auc24OverMic),
                ("timeOverMic", TargetType::TimeOverMic),
                ("aucDividedByMic", TargetType::AucDividedByMic),
                ("auc24DividedByMic", TargetType::Auc24DividedByMic),
                ("peakDividedByMic", TargetType::PeakDividedByMic),
                ("residualDividedByMic", TargetType::ResidualDividedByMic),
                ("fractionTimeOverMic", TargetType::FractionTimeOverMic),
            ],
            TargetType::Unknown,
        )
    }

    fn extract_interpolation_type(&mut self, node: roxmltree::Node) -> InterpolationType {
        self.enum_lookup(
            node,
            &[
                ("direct", InterpolationType::Direct),
                ("linear", InterpolationType::Linear),
                ("sigmoid", InterpolationType::Sigmoid),
                ("tanh", InterpolationType::Tanh),
            ],
            InterpolationType::Direct,
        )
    }

    fn extract_residual_error_type(&mut self, node: roxmltree::Node) -> ResidualErrorType {
        self.enum_lookup(
            node,
            &[
                ("additive", ResidualErrorType::Additive),
                ("proportional", ResidualErrorType::Proportional),
                ("exponential", ResidualErrorType::Exponential),
                ("propexp", ResidualErrorType::Propexp),
                ("mixed", ResidualErrorType::Mixed),
                ("softcoded", ResidualErrorType::Softcoded),
                ("none", ResidualErrorType::None),
            ],
            ResidualErrorType::None,
        )
    }

    fn extract_variability_type(&mut self, node: roxmltree::Node) -> ParameterVariabilityType {
        self.enum_lookup(
            node,
            &[
                ("normal", ParameterVariabilityType::Normal),
                ("lognormal", ParameterVariabilityType::LogNormal),
                ("proportional", ParameterVariabilityType::Proportional),
                ("exponential", ParameterVariabilityType::Exponential),
                ("additive", ParameterVariabilityType::Additive),
                ("logit", ParameterVariabilityType::Logit),
                ("none", ParameterVariabilityType::None),
            ],
            ParameterVariabilityType::None,
        )
    }

    fn extract_formulation(&mut self, node: roxmltree::Node) -> Formulation {
        self.enum_lookup(
            node,
            &[
                ("undefined", Formulation::Undefined),
                // Legacy spellings with a space are still accepted.
                ("parenteral solution", Formulation::ParenteralSolution),
                ("parenteralSolution", Formulation::ParenteralSolution),
                ("oral solution", Formulation::OralSolution),
                ("oralSolution", Formulation::OralSolution),
                ("test", Formulation::Test),
            ],
            Formulation::Undefined,
        )
    }

    fn extract_administration_route(&mut self, node: roxmltree::Node) -> AdministrationRoute {
        self.enum_lookup(
            node,
            &[
                ("undefined", AdministrationRoute::Undefined),
                ("intramuscular", AdministrationRoute::Intramuscular),
                ("intravenousBolus", AdministrationRoute::IntravenousBolus),
                ("intravenousDrip", AdministrationRoute::IntravenousDrip),
                ("nasal", AdministrationRoute::Nasal),
                ("oral", AdministrationRoute::Oral),
                ("rectal", AdministrationRoute::Rectal),
                ("subcutaneous", AdministrationRoute::Subcutaneous),
                ("sublingual", AdministrationRoute::Sublingual),
                ("transdermal", AdministrationRoute::Transdermal),
                ("vaginal", AdministrationRoute::Vaginal),
            ],
            AdministrationRoute::Undefined,
        )
    }

    fn extract_absorption_model(&mut self, node: roxmltree::Node) -> AbsorptionModel {
        self.enum_lookup(
            node,
            &[
                ("undefined", AbsorptionModel::Undefined),
                ("bolus", AbsorptionModel::Intravascular),
                ("extra", AbsorptionModel::Extravascular),
                ("extra.lag", AbsorptionModel::ExtravascularLag),
                ("infusion", AbsorptionModel::Infusion),
            ],
            AbsorptionModel::Undefined,
        )
    }

    // ────────────────────────────────────────────────────────────────────
    // Shared productions
    // ────────────────────────────────────────────────────────────────────

    /// Children named `inside` carrying a mandatory `lang` attribute.
    pub fn extract_translatable_string(
        &mut self,
        node: roxmltree::Node,
        inside: &str,
    ) -> TranslatableString {
        let mut result = TranslatableString::new();
        for child in node.children().filter(|n| n.is_element()) {
            let name = child.tag_name().name();
            if name == inside {
                match child.attribute("lang") {
                    Some(lang) => result.set(lang, &self.text(child)),
                    None => {
                        self.diags.node_error(child);
                        return result;
                    }
                }
            } else {
                self.diags.unexpected_tag(name);
            }
        }
        result
    }

    /// A `softFormula` body: typed input declarations plus a script held
    /// in a `code` CDATA section.
    fn extract_soft_formula(&mut self, node: roxmltree::Node) -> Option<Operation> {
        let mut script = String::new();
        let mut inputs: Vec<OperationInput> = Vec::new();

        for child in node.children().filter(|n| n.is_element()) {
            match child.tag_name().name() {
                "code" => {
                    script = scalars::node_text(child);
                    if script.is_empty() {
                        self.diags.node_error(child);
                    }
                }
                "inputs" => {
                    for input_node in child.children().filter(|n| n.is_element()) {
                        if input_node.tag_name().name() != "input" {
                            self.diags.unexpected_tag(input_node.tag_name().name());
                            continue;
                        }
                        let mut id = String::new();
                        let mut input_type = None;
                        for field in input_node.children().filter(|n| n.is_element()) {
                            match field.tag_name().name() {
                                "id" => id = self.text(field),
                                "type" => {
                                    input_type = match self.text(field).as_str() {
                                        "int" => Some(InputType::Int),
                                        "double" => Some(InputType::Double),
                                        "bool" => Some(InputType::Bool),
                                        _ => {
                                            self.diags.node_error(field);
                                            None
                                        }
                                    }
                                }
                                other => self.diags.unexpected_tag(other),
                            }
                        }
                        if let Some(input_type) = input_type {
                            inputs.push(OperationInput { id, input_type });
                        }
                    }
                }
                other => self.diags.unexpected_tag(other),
            }
        }

        if self.diags.has_error() {
            return None;
        }
        Some(Operation::Soft { inputs, script })
    }

    /// Dispatches on `softFormula` / `hardFormula` / `multiFormula`. A
    /// missing or unresolvable formula is an error on the container node.
    pub fn extract_operation(&mut self, node: roxmltree::Node) -> Option<Operation> {
        let mut operation = None;

        for child in node.children().filter(|n| n.is_element()) {
            match child.tag_name().name() {
                "softFormula" => {
                    operation = self.extract_soft_formula(child);
                }
                "hardFormula" => {
                    let id = self.text(child);
                    operation = self.operations.get(&id);
                }
                "multiFormula" => {
                    self.diags
                        .node_error_with(child, "multiFormula is not supported");
                }
                other => self.diags.unexpected_tag(other),
            }
        }

        if self.diags.has_error() {
            return None;
        }
        if operation.is_none() {
            self.diags.node_error(node);
        }
        operation
    }

    /// A mandatory `standardValue` plus an optional `aprioriComputation`.
    pub fn extract_population_value(&mut self, node: roxmltree::Node) -> PopulationValue {
        let mut value = None;
        let mut operation = None;

        for child in node.children().filter(|n| n.is_element()) {
            match child.tag_name().name() {
                "standardValue" => value = Some(scalars::extract_double(child, &mut self.diags)),
                "aprioriComputation" => operation = self.extract_operation(child),
                other => self.diags.unexpected_tag(other),
            }
        }

        let value = match value {
            Some(v) => v,
            None => {
                self.diags
                    .node_error_with(node, "has no standardValue child");
                0.0
            }
        };
        PopulationValue { value, operation }
    }

    // ────────────────────────────────────────────────────────────────────
    // drugModel and its sections
    // ────────────────────────────────────────────────────────────────────

    pub fn extract_drug_model(&mut self, node: roxmltree::Node) -> Option<DrugModel> {
        let mut drug_id = String::new();
        let mut drug_model_id = String::new();
        let mut domain = None;
        let mut covariates = Vec::new();
        let mut active_moieties = Vec::new();
        let mut analyte_sets: Vec<AnalyteSet> = Vec::new();
        let mut formulation_and_routes = None;
        let mut time_considerations = None;

        for child in node.children().filter(|n| n.is_element()) {
            match child.tag_name().name() {
                "drugId" => drug_id = self.text(child),
                "drugModelId" => drug_model_id = self.text(child),
                "domain" => domain = self.extract_domain(child),
                "covariates" => covariates = self.extract_covariates(child),
                "activeMoieties" => active_moieties = self.extract_active_moieties(child),
                "analyteGroups" => analyte_sets = self.extract_analyte_groups(child),
                "formulationAndRoutes" => {
                    formulation_and_routes =
                        self.extract_formulation_and_routes(child, &analyte_sets);
                }
                "timeConsiderations" => {
                    time_considerations = self.extract_time_considerations(child);
                }
                other => self.diags.unexpected_tag(other),
            }
        }

        if self.diags.has_error() {
            return None;
        }

        Some(DrugModel {
            drug_id,
            drug_model_id,
            domain,
            covariates,
            active_moieties,
            analyte_sets,
            formulation_and_routes,
            time_considerations,
            metadata: None,
        })
    }

    fn extract_domain(&mut self, node: roxmltree::Node) -> Option<DrugModelDomain> {
        let mut description = TranslatableString::new();
        let mut constraints = Vec::new();

        for child in node.children().filter(|n| n.is_element()) {
            match child.tag_name().name() {
                "description" => description = self.extract_translatable_string(child, "desc"),
                "constraints" => constraints = self.extract_constraints(child),
                other => self.diags.unexpected_tag(other),
            }
        }

        if self.diags.has_error() {
            return None;
        }
        Some(DrugModelDomain {
            description,
            constraints,
        })
    }

    fn extract_constraints(&mut self, node: roxmltree::Node) -> Vec<Constraint> {
        let mut constraints = Vec::new();
        for child in node.children().filter(|n| n.is_element()) {
            if child.tag_name().name() == "constraint" {
                if let Some(c) = self.extract_constraint(child) {
                    constraints.push(c);
                }
            } else {
                self.diags.unexpected_tag(child.tag_name().name());
            }
        }
        constraints
    }

    fn extract_constraint(&mut self, node: roxmltree::Node) -> Option<Constraint> {
        let mut constraint_type = ConstraintType::Hard;
        let mut required_covariate_ids = Vec::new();
        let mut check_operation = None;
        let mut error_message = TranslatableString::new();

        for child in node.children().filter(|n| n.is_element()) {
            match child.tag_name().name() {
                "constraintType" => match self.text(child).as_str() {
                    "hard" => constraint_type = ConstraintType::Hard,
                    "soft" => constraint_type = ConstraintType::Soft,
                    _ => self.diags.node_error(child),
                },
                "errorMessage" => {
                    error_message = self.extract_translatable_string(child, "text");
                }
                "requiredCovariates" => {
                    for cov in child.children().filter(|n| n.is_element()) {
                        if cov.tag_name().name() == "covariateId" {
                            required_covariate_ids.push(self.text(cov));
                        } else {
                            self.diags.unexpected_tag(cov.tag_name().name());
                        }
                    }
                }
                "checkOperation" => check_operation = self.extract_operation(child),
                other => self.diags.unexpected_tag(other),
            }
        }

        if self.diags.has_error() {
            return None;
        }
        Some(Constraint {
            constraint_type,
            required_covariate_ids,
            check_operation,
            error_message,
        })
    }

    fn extract_covariates(&mut self, node: roxmltree::Node) -> Vec<CovariateDefinition> {
        let mut covariates = Vec::new();
        for child in node.children().filter(|n| n.is_element()) {
            if child.tag_name().name() == "covariate" {
                if let Some(c) = self.extract_covariate(child) {
                    covariates.push(c);
                }
            } else {
                self.diags.unexpected_tag(child.tag_name().name());
            }
        }
        covariates
    }

    fn extract_covariate(&mut self, node: roxmltree::Node) -> Option<CovariateDefinition> {
        let mut id = String::new();
        let mut covariate_type = CovariateType::Standard;
        let mut data_type = DataType::Int;
        let mut covariate_unit = Unit::empty();
        let mut interpolation = InterpolationType::Direct;
        let mut value = None;
        let mut validation = None;
        let mut name = TranslatableString::new();
        let mut description = TranslatableString::new();
        let mut validation_error_message = TranslatableString::new();
        let mut refresh_unit = Unit::empty();
        let mut refresh_value = 0.0;

        for child in node.children().filter(|n| n.is_element()) {
            match child.tag_name().name() {
                "covariateId" => id = self.text(child),
                "unit" => {
                    covariate_unit = scalars::extract_unit(child, CheckUnit::Check, &mut self.diags)
                }
                "covariateName" => name = self.extract_translatable_string(child, "name"),
                "description" => description = self.extract_translatable_string(child, "desc"),
                "covariateType" => covariate_type = self.extract_covariate_type(child),
                "dataType" => data_type = self.extract_data_type(child),
                "interpolationType" => interpolation = self.extract_interpolation_type(child),
                "refreshPeriod" => {
                    for field in child.children().filter(|n| n.is_element()) {
                        match field.tag_name().name() {
                            "unit" => {
                                refresh_unit =
                                    scalars::extract_unit(field, CheckUnit::Check, &mut self.diags)
                            }
                            "value" => {
                                refresh_value = scalars::extract_double(field, &mut self.diags)
                            }
                            other => self.diags.unexpected_tag(other),
                        }
                    }
                }
                "covariateValue" => value = Some(self.extract_population_value(child)),
                "validation" => {
                    for field in child.children().filter(|n| n.is_element()) {
                        match field.tag_name().name() {
                            "operation" => validation = self.extract_operation(field),
                            "errorMessage" => {
                                validation_error_message =
                                    self.extract_translatable_string(field, "text");
                            }
                            other => self.diags.unexpected_tag(other),
                        }
                    }
                }
                other => self.diags.unexpected_tag(other),
            }
        }

        if self.diags.has_error() {
            return None;
        }

        let value = match value {
            Some(v) => v,
            None => {
                self.diags.error("no value in a covariate");
                return None;
            }
        };

        if covariate_type == CovariateType::Dose
            && !unit::is_of_type(&covariate_unit, UnitCategory::Weight)
        {
            self.diags
                .error("Covariate being a dose, but with a unit not being a weight");
            return None;
        }

        let refresh_period = match unit::duration_unit_in_seconds(&refresh_unit) {
            Some(factor) => Duration::from_secs((refresh_value * factor) as i64),
            None => Duration::zero(),
        };

        Some(CovariateDefinition {
            id,
            covariate_type,
            data_type,
            unit: covariate_unit,
            interpolation,
            value,
            validation,
            validation_error_message,
            refresh_period,
            name,
            description,
        })
    }

    fn extract_active_moieties(&mut self, node: roxmltree::Node) -> Vec<ActiveMoiety> {
        let mut moieties = Vec::new();
        for child in node.children().filter(|n| n.is_element()) {
            if child.tag_name().name() == "activeMoiety" {
                if let Some(m) = self.extract_active_moiety(child) {
                    moieties.push(m);
                }
            } else {
                self.diags.unexpected_tag(child.tag_name().name());
            }
        }
        moieties
    }

    fn extract_active_moiety(&mut self, node: roxmltree::Node) -> Option<ActiveMoiety> {
        let mut id = String::new();
        let mut moiety_unit = Unit::empty();
        let mut analyte_ids = Vec::new();
        let mut formula = None;
        let mut targets = Vec::new();
        let mut name = TranslatableString::new();

        for child in node.children().filter(|n| n.is_element()) {
            match child.tag_name().name() {
                "activeMoietyId" => id = self.text(child),
                "unit" => {
                    moiety_unit = scalars::extract_unit(child, CheckUnit::Check, &mut self.diags)
                }
                "activeMoietyName" => name = self.extract_translatable_string(child, "name"),
                "analyteIdList" => {
                    for analyte in child.children().filter(|n| n.is_element()) {
                        if analyte.tag_name().name() == "analyteId" {
                            analyte_ids.push(self.text(analyte));
                        } else {
                            self.diags.unexpected_tag(analyte.tag_name().name());
                        }
                    }
                }
                "analytesToMoietyFormula" => formula = self.extract_operation(child),
                "targets" => targets = self.extract_targets(child),
                other => self.diags.unexpected_tag(other),
            }
        }

        if self.diags.has_error() {
            return None;
        }

        for target in &mut targets {
            target.active_moiety_id = id.clone();
        }
        Some(ActiveMoiety {
            id,
            unit: moiety_unit,
            analyte_ids,
            formula,
            targets,
            name,
        })
    }

    fn extract_targets(&mut self, node: roxmltree::Node) -> Vec<TargetDefinition> {
        let mut targets = Vec::new();
        for child in node.children().filter(|n| n.is_element()) {
            if child.tag_name().name() == "target" {
                if let Some(t) = self.extract_target(child) {
                    targets.push(t);
                }
            } else {
                self.diags.unexpected_tag(child.tag_name().name());
            }
        }
        targets
    }

    fn extract_target(&mut self, node: roxmltree::Node) -> Option<TargetDefinition> {
        let mut target_type = TargetType::Unknown;
        let mut target_unit = Unit::new("ug/l");
        let mut mic_unit = Unit::new("ug/l");
        let mut time_unit = Unit::new("h");
        let mut min = None;
        let mut max = None;
        let mut best = None;
        let mut mic = None;
        let mut t_min = None;
        let mut t_max = None;
        let mut t_best = None;
        let mut toxicity_alarm = None;
        let mut inefficacy_alarm = None;

        for child in node.children().filter(|n| n.is_element()) {
            match child.tag_name().name() {
                "targetType" => target_type = self.extract_target_type(child),
                "targetValues" => {
                    for field in child.children().filter(|n| n.is_element()) {
                        match field.tag_name().name() {
                            "unit" => {
                                target_unit =
                                    scalars::extract_unit(field, CheckUnit::Check, &mut self.diags)
                            }
                            "min" => min = Some(self.extract_population_value(field)),
                            "max" => max = Some(self.extract_population_value(field)),
                            "best" => best = Some(self.extract_population_value(field)),
                            "mic" => {
                                for mic_field in field.children().filter(|n| n.is_element()) {
                                    match mic_field.tag_name().name() {
                                        "unit" => {
                                            mic_unit = scalars::extract_unit(
                                                mic_field,
                                                CheckUnit::Check,
                                                &mut self.diags,
                                            )
                                        }
                                        "micValue" => {
                                            mic = Some(self.extract_population_value(mic_field))
                                        }
                                        other => self.diags.unexpected_tag(other),
                                    }
                                }
                            }
                            "toxicityAlarm" => {
                                toxicity_alarm = Some(self.extract_population_value(field))
                            }
                            "inefficacyAlarm" => {
                                inefficacy_alarm = Some(self.extract_population_value(field))
                            }
                            other => self.diags.unexpected_tag(other),
                        }
                    }
                }
                "times" => {
                    for field in child.children().filter(|n| n.is_element()) {
                        match field.tag_name().name() {
                            "unit" => {
                                time_unit =
                                    scalars::extract_unit(field, CheckUnit::Check, &mut self.diags)
                            }
                            "min" => t_min = Some(self.extract_population_value(field)),
                            "max" => t_max = Some(self.extract_population_value(field)),
                            "best" => t_best = Some(self.extract_population_value(field)),
                            other => self.diags.unexpected_tag(other),
                        }
                    }
                }
                other => self.diags.unexpected_tag(other),
            }
        }

        if target_type.requires_mic() && mic.is_none() {
            self.diags
                .error("A target is using MIC, but no MIC tag is found in the target");
        }

        if min.is_none() {
            self.diags.error("No min value in a target");
        }
        if max.is_none() {
            self.diags.error("No max value in a target");
        }
        if best.is_none() {
            self.diags.error("No best value in a target");
        }
        if self.diags.has_error() {
            return None;
        }

        let sub = |v: Option<PopulationValue>| {
            let v = v.unwrap_or_default();
            SubTarget {
                value: v.value,
                operation: v.operation,
            }
        };

        Some(TargetDefinition {
            target_type,
            unit: target_unit,
            active_moiety_id: String::new(),
            min: sub(min),
            max: sub(max),
            best: sub(best),
            mic: sub(mic),
            t_min: sub(t_min),
            t_max: sub(t_max),
            t_best: sub(t_best),
            toxicity_alarm: sub(toxicity_alarm),
            inefficacy_alarm: sub(inefficacy_alarm),
            mic_unit,
            time_unit,
        })
    }

    fn extract_analyte_groups(&mut self, node: roxmltree::Node) -> Vec<AnalyteSet> {
        let mut groups = Vec::new();
        for child in node.children().filter(|n| n.is_element()) {
            if child.tag_name().name() == "analyteGroup" {
                if let Some(g) = self.extract_analyte_group(child) {
                    groups.push(g);
                }
            } else {
                self.diags.unexpected_tag(child.tag_name().name());
            }
        }
        groups
    }

    fn extract_analyte_group(&mut self, node: roxmltree::Node) -> Option<AnalyteSet> {
        let mut id = String::new();
        let mut pk_model_id = String::new();
        let mut analytes = Vec::new();
        let mut disposition_parameters = None;

        for child in node.children().filter(|n| n.is_element()) {
            match child.tag_name().name() {
                "groupId" => id = self.text(child),
                "pkModelId" => pk_model_id = self.text(child),
                "analytes" => analytes = self.extract_analytes(child),
                "dispositionParameters" => {
                    disposition_parameters = self.extract_parameter_set(child)
                }
                other => self.diags.unexpected_tag(other),
            }
        }

        if self.diags.has_error() {
            return None;
        }

        // All analytes of a group are assumed to share the same unit.
        let dose_unit = analytes
            .first()
            .and_then(|a: &Analyte| unit::weight_from_concentration(&a.unit))
            .unwrap_or_else(Unit::empty);

        Some(AnalyteSet {
            id,
            pk_model_id,
            dose_unit,
            analytes,
            disposition_parameters: disposition_parameters.unwrap_or_default(),
        })
    }

    fn extract_analytes(&mut self, node: roxmltree::Node) -> Vec<Analyte> {
        let mut analytes = Vec::new();
        for child in node.children().filter(|n| n.is_element()) {
            if child.tag_name().name() == "analyte" {
                if let Some(a) = self.extract_analyte(child) {
                    analytes.push(a);
                }
            } else {
                self.diags.unexpected_tag(child.tag_name().name());
            }
        }
        analytes
    }

    fn extract_analyte(&mut self, node: roxmltree::Node) -> Option<Analyte> {
        let mut id = String::new();
        let mut analyte_unit = Unit::empty();
        let mut molar_mass = None;
        let mut error_model = None;

        for child in node.children().filter(|n| n.is_element()) {
            match child.tag_name().name() {
                "analyteId" => id = self.text(child),
                "unit" => {
                    analyte_unit = scalars::extract_unit(child, CheckUnit::Check, &mut self.diags)
                }
                "molarMass" => molar_mass = self.extract_molar_mass(child),
                "errorModel" => error_model = self.extract_error_model(child),
                other => self.diags.unexpected_tag(other),
            }
        }

        if self.diags.has_error() {
            return None;
        }
        let molar_mass = match molar_mass {
            Some(m) => m,
            None => {
                self.diags.error("No molar mass in an analyte");
                return None;
            }
        };

        Some(Analyte {
            id,
            unit: analyte_unit,
            molar_mass,
            error_model,
        })
    }

    fn extract_molar_mass(&mut self, node: roxmltree::Node) -> Option<MolarMass> {
        let mut value = 0.0;
        let mut mass_unit = Unit::empty();

        for child in node.children().filter(|n| n.is_element()) {
            match child.tag_name().name() {
                "value" => value = scalars::extract_double(child, &mut self.diags),
                "unit" => {
                    mass_unit = scalars::extract_unit(child, CheckUnit::Check, &mut self.diags)
                }
                other => self.diags.unexpected_tag(other),
            }
        }

        if self.diags.has_error() {
            return None;
        }
        Some(MolarMass {
            value,
            unit: mass_unit,
        })
    }

    fn extract_error_model(&mut self, node: roxmltree::Node) -> Option<ErrorModel> {
        let mut error_model_type = ResidualErrorType::None;
        let mut apply_formula = None;
        let mut likelihood_formula = None;
        let mut sigmas = Vec::new();

        for child in node.children().filter(|n| n.is_element()) {
            match child.tag_name().name() {
                "errorModelType" => error_model_type = self.extract_residual_error_type(child),
                "applyFormula" => apply_formula = self.extract_operation(child),
                "likelyHoodFormula" => likelihood_formula = self.extract_operation(child),
                "sigmas" => {
                    for sigma in child.children().filter(|n| n.is_element()) {
                        if sigma.tag_name().name() == "sigma" {
                            let value = self.extract_population_value(sigma);
                            if !self.diags.has_error() {
                                sigmas.push(value);
                            }
                        } else {
                            self.diags.unexpected_tag(sigma.tag_name().name());
                        }
                    }
                }
                other => self.diags.unexpected_tag(other),
            }
        }

        if self.diags.has_error() {
            return None;
        }
        Some(ErrorModel {
            error_model_type,
            sigmas,
            apply_formula,
            likelihood_formula,
        })
    }

    fn extract_parameter_set(&mut self, node: roxmltree::Node) -> Option<ParameterSetDefinition> {
        let mut parameters = Vec::new();
        let mut correlations = Vec::new();

        for child in node.children().filter(|n| n.is_element()) {
            match child.tag_name().name() {
                "parameters" => parameters = self.extract_parameters(child),
                "correlations" => correlations = self.extract_correlations(child),
                other => self.diags.unexpected_tag(other),
            }
        }

        if self.diags.has_error() {
            return None;
        }
        Some(ParameterSetDefinition {
            parameters,
            correlations,
        })
    }

    fn extract_parameters(&mut self, node: roxmltree::Node) -> Vec<ParameterDefinition> {
        let mut parameters = Vec::new();
        for child in node.children().filter(|n| n.is_element()) {
            if child.tag_name().name() == "parameter" {
                if let Some(p) = self.extract_parameter(child) {
                    parameters.push(p);
                }
            } else {
                self.diags.unexpected_tag(child.tag_name().name());
            }
        }
        parameters
    }

    fn extract_parameter(&mut self, node: roxmltree::Node) -> Option<ParameterDefinition> {
        let mut id = String::new();
        let mut parameter_unit = Unit::empty();
        let mut value = None;
        let mut variability = None;
        let mut validation = None;

        for child in node.children().filter(|n| n.is_element()) {
            match child.tag_name().name() {
                "parameterId" => id = self.text(child),
                // Parameter units are free-form, no registry check.
                "unit" => {
                    parameter_unit =
                        scalars::extract_unit(child, CheckUnit::DoNotCheck, &mut self.diags)
                }
                "parameterValue" => value = Some(self.extract_population_value(child)),
                "bsv" => variability = self.extract_variability(child),
                "validation" => {
                    for field in child.children().filter(|n| n.is_element()) {
                        match field.tag_name().name() {
                            "operation" => validation = self.extract_operation(field),
                            other => self.diags.unexpected_tag(other),
                        }
                    }
                }
                other => self.diags.unexpected_tag(other),
            }
        }

        if self.diags.has_error() {
            return None;
        }
        let value = match value {
            Some(v) => v,
            None => {
                self.diags.error("No value in a PK parameter");
                return None;
            }
        };

        Some(ParameterDefinition {
            id,
            unit: parameter_unit,
            value,
            variability,
            validation,
        })
    }

    fn extract_correlations(&mut self, node: roxmltree::Node) -> Vec<Correlation> {
        let mut correlations = Vec::new();
        for child in node.children().filter(|n| n.is_element()) {
            if child.tag_name().name() == "correlation" {
                if let Some(c) = self.extract_correlation(child) {
                    correlations.push(c);
                }
            } else {
                self.diags.unexpected_tag(child.tag_name().name());
            }
        }
        correlations
    }

    fn extract_correlation(&mut self, node: roxmltree::Node) -> Option<Correlation> {
        let mut param1 = String::new();
        let mut param2 = String::new();
        let mut value = 0.0;

        for child in node.children().filter(|n| n.is_element()) {
            match child.tag_name().name() {
                "param1" => param1 = self.text(child),
                "param2" => param2 = self.text(child),
                "value" => value = scalars::extract_double(child, &mut self.diags),
                other => self.diags.unexpected_tag(other),
            }
        }

        if self.diags.has_error() {
            return None;
        }
        Some(Correlation {
            param1,
            param2,
            value,
        })
    }

    fn extract_variability(&mut self, node: roxmltree::Node) -> Option<ParameterVariability> {
        let mut variability_type = ParameterVariabilityType::None;
        let mut std_devs = Vec::new();

        for child in node.children().filter(|n| n.is_element()) {
            match child.tag_name().name() {
                "bsvType" => variability_type = self.extract_variability_type(child),
                "stdDevs" => {
                    for std_dev in child.children().filter(|n| n.is_element()) {
                        if std_dev.tag_name().name() == "stdDev" {
                            let value = scalars::extract_double(std_dev, &mut self.diags);
                            if !self.diags.has_error() {
                                std_devs.push(value);
                            }
                        } else {
                            self.diags.unexpected_tag(std_dev.tag_name().name());
                        }
                    }
                }
                other => self.diags.unexpected_tag(other),
            }
        }

        if self.diags.has_error() {
            return None;
        }
        Some(ParameterVariability {
            variability_type,
            std_devs,
        })
    }

    // ────────────────────────────────────────────────────────────────────
    // Formulations & routes
    // ────────────────────────────────────────────────────────────────────

    fn extract_formulation_and_routes(
        &mut self,
        node: roxmltree::Node,
        analyte_sets: &[AnalyteSet],
    ) -> Option<FormulationAndRoutes> {
        let default_id = node.attribute("default").unwrap_or("").to_string();
        let mut entries = Vec::new();

        for child in node.children().filter(|n| n.is_element()) {
            if child.tag_name().name() == "formulationAndRoute" {
                if let Some(f) = self.extract_full_formulation_and_route(child, analyte_sets) {
                    entries.push(f);
                }
            } else {
                self.diags.unexpected_tag(child.tag_name().name());
            }
        }

        if self.diags.has_error() {
            return None;
        }
        Some(FormulationAndRoutes {
            default_id,
            entries,
        })
    }

    fn extract_full_formulation_and_route(
        &mut self,
        node: roxmltree::Node,
        analyte_sets: &[AnalyteSet],
    ) -> Option<FullFormulationAndRoute> {
        let mut id = String::new();
        let mut formulation = Formulation::Undefined;
        let mut administration_name = String::new();
        let mut administration_route = AdministrationRoute::Undefined;
        let mut absorption_model = AbsorptionModel::Undefined;
        let mut loading_dose_recommended = true;
        let mut rest_period_recommended = true;
        let mut doses = None;
        let mut intervals = None;
        let mut infusions = None;
        let mut standard_treatment = None;
        let mut analyte_conversions = Vec::new();
        let mut associations = Vec::new();

        for child in node.children().filter(|n| n.is_element()) {
            match child.tag_name().name() {
                "formulationAndRouteId" => id = self.text(child),
                "formulation" => formulation = self.extract_formulation(child),
                "administrationName" => administration_name = self.text(child),
                "administrationRoute" => {
                    administration_route = self.extract_administration_route(child)
                }
                "absorptionModel" => absorption_model = self.extract_absorption_model(child),
                "dosages" => {
                    for dosage in child.children().filter(|n| n.is_element()) {
                        match dosage.tag_name().name() {
                            "isLoadingDoseRecommended" => {
                                loading_dose_recommended =
                                    scalars::extract_bool(dosage, &mut self.diags)
                            }
                            "isRestPeriodRecommended" => {
                                rest_period_recommended =
                                    scalars::extract_bool(dosage, &mut self.diags)
                            }
                            "standardTreatment" => {
                                standard_treatment = self.extract_standard_treatment(dosage);
                            }
                            "analyteConversions" => {
                                analyte_conversions = self.extract_analyte_conversions(dosage);
                            }
                            "availableDoses" => doses = self.extract_valid_doses(dosage),
                            "availableIntervals" | "intervals" => {
                                intervals = self.extract_valid_durations(dosage)
                            }
                            "availableInfusions" | "infusions" => {
                                infusions = self.extract_valid_durations(dosage)
                            }
                            other => self.diags.unexpected_tag(other),
                        }
                    }
                }
                "absorptionParameters" => {
                    for section in child.children().filter(|n| n.is_element()) {
                        if section.tag_name().name() == "parameterSetAnalyteGroup" {
                            if let Some(a) =
                                self.extract_absorption_association(section, analyte_sets)
                            {
                                associations.push(a);
                            }
                        } else {
                            self.diags.unexpected_tag(section.tag_name().name());
                        }
                    }
                }
                other => self.diags.unexpected_tag(other),
            }
        }

        if self.diags.has_error() {
            return None;
        }

        Some(FullFormulationAndRoute {
            id,
            formulation,
            administration_name,
            administration_route,
            absorption_model,
            loading_dose_recommended,
            rest_period_recommended,
            doses,
            intervals,
            infusions,
            standard_treatment,
            analyte_conversions,
            associations,
        })
    }

    fn extract_standard_treatment(&mut self, node: roxmltree::Node) -> Option<StandardTreatment> {
        let mut is_fixed_duration = false;
        let mut treatment_unit = Unit::empty();
        let mut value = 0.0;

        for child in node.children().filter(|n| n.is_element()) {
            match child.tag_name().name() {
                "isFixedDuration" => {
                    is_fixed_duration = scalars::extract_bool(child, &mut self.diags)
                }
                "timeValue" => {
                    for field in child.children().filter(|n| n.is_element()) {
                        match field.tag_name().name() {
                            "unit" => {
                                treatment_unit =
                                    scalars::extract_unit(field, CheckUnit::Check, &mut self.diags)
                            }
                            "value" => value = scalars::extract_double(field, &mut self.diags),
                            other => self.diags.unexpected_tag(other),
                        }
                    }
                }
                other => self.diags.unexpected_tag(other),
            }
        }

        Some(StandardTreatment {
            is_fixed_duration,
            value,
            unit: treatment_unit,
        })
    }

    fn extract_analyte_conversions(&mut self, node: roxmltree::Node) -> Vec<AnalyteConversion> {
        let mut conversions = Vec::new();
        for child in node.children().filter(|n| n.is_element()) {
            if child.tag_name().name() != "analyteConversion" {
                self.diags.unexpected_tag(child.tag_name().name());
                continue;
            }
            let mut analyte_id = String::new();
            let mut factor = 0.0;
            for field in child.children().filter(|n| n.is_element()) {
                match field.tag_name().name() {
                    "analyteId" => analyte_id = self.text(field),
                    "factor" => factor = scalars::extract_double(field, &mut self.diags),
                    other => self.diags.unexpected_tag(other),
                }
            }
            if !self.diags.has_error() {
                conversions.push(AnalyteConversion { analyte_id, factor });
            }
        }
        conversions
    }

    /// Resolves the declared `analyteGroupId` against the analyte sets
    /// built earlier in the same document.
    fn extract_absorption_association(
        &mut self,
        node: roxmltree::Node,
        analyte_sets: &[AnalyteSet],
    ) -> Option<AbsorptionAssociation> {
        let mut analyte_set_index = None;
        let mut absorption_model = AbsorptionModel::Undefined;
        let mut parameters = None;

        for child in node.children().filter(|n| n.is_element()) {
            match child.tag_name().name() {
                "analyteGroupId" => {
                    let group_id = self.text(child);
                    analyte_set_index = analyte_sets.iter().position(|s| s.id == group_id);
                    if analyte_set_index.is_none() {
                        self.diags.node_error(child);
                    }
                }
                "absorptionModel" => absorption_model = self.extract_absorption_model(child),
                "parameterSet" => parameters = self.extract_parameter_set(child),
                other => self.diags.unexpected_tag(other),
            }
        }

        if self.diags.has_error() {
            return None;
        }
        Some(AbsorptionAssociation {
            analyte_set_index: analyte_set_index?,
            absorption_model,
            parameters: parameters?,
        })
    }

    fn extract_valid_doses(&mut self, node: roxmltree::Node) -> Option<ValidDoses> {
        let (dose_unit, default, values) = self.extract_valid_values(node, "valid doses")?;
        Some(ValidDoses {
            unit: dose_unit,
            default,
            values,
        })
    }

    fn extract_valid_durations(&mut self, node: roxmltree::Node) -> Option<ValidDurations> {
        let (duration_unit, default, values) = self.extract_valid_values(node, "valid durations")?;
        Some(ValidDurations {
            unit: duration_unit,
            default,
            values,
        })
    }

    /// Shared body of `availableDoses`, `availableIntervals` and
    /// `availableInfusions`: a unit, a mandatory default, and any number
    /// of range or fixed-value specs.
    fn extract_valid_values(
        &mut self,
        node: roxmltree::Node,
        what: &str,
    ) -> Option<(Unit, PopulationValue, Vec<ValidValues>)> {
        let mut value_unit = Unit::empty();
        let mut default = None;
        let mut values = Vec::new();

        for child in node.children().filter(|n| n.is_element()) {
            match child.tag_name().name() {
                "unit" => {
                    value_unit = scalars::extract_unit(child, CheckUnit::Check, &mut self.diags)
                }
                "default" => default = Some(self.extract_population_value(child)),
                "rangeValues" => {
                    if let Some(v) = self.extract_values_range(child) {
                        values.push(v);
                    }
                }
                "fixedValues" => {
                    if let Some(v) = self.extract_values_fixed(child) {
                        values.push(v);
                    }
                }
                other => self.diags.unexpected_tag(other),
            }
        }

        if self.diags.has_error() {
            return None;
        }
        let default = match default {
            Some(d) => d,
            None => {
                self.diags.error(format!("No default value in {}.", what));
                return None;
            }
        };
        Some((value_unit, default, values))
    }

    fn extract_values_range(&mut self, node: roxmltree::Node) -> Option<ValidValues> {
        let mut from = None;
        let mut to = None;
        let mut step = None;

        for child in node.children().filter(|n| n.is_element()) {
            match child.tag_name().name() {
                "from" => from = Some(self.extract_population_value(child)),
                "to" => to = Some(self.extract_population_value(child)),
                "step" => step = Some(self.extract_population_value(child)),
                other => self.diags.unexpected_tag(other),
            }
        }

        match (from, to, step) {
            (Some(from), Some(to), Some(step)) if !self.diags.has_error() => {
                Some(ValidValues::Range { from, to, step })
            }
            (Some(_), Some(_), Some(_)) => None,
            _ => {
                self.diags.node_error(node);
                None
            }
        }
    }

    fn extract_values_fixed(&mut self, node: roxmltree::Node) -> Option<ValidValues> {
        let mut values = Vec::new();

        for child in node.children().filter(|n| n.is_element()) {
            if child.tag_name().name() == "value" {
                let v = scalars::extract_double(child, &mut self.diags);
                if !self.diags.has_error() {
                    values.push(v);
                }
            } else {
                self.diags.unexpected_tag(child.tag_name().name());
            }
        }

        if self.diags.has_error() {
            return None;
        }
        Some(ValidValues::Fixed(values))
    }

    // ────────────────────────────────────────────────────────────────────
    // Time considerations
    // ────────────────────────────────────────────────────────────────────

    fn extract_time_considerations(&mut self, node: roxmltree::Node) -> Option<TimeConsiderations> {
        let mut half_life = None;
        let mut outdated_measure = None;

        for child in node.children().filter(|n| n.is_element()) {
            match child.tag_name().name() {
                "halfLife" => half_life = self.extract_half_life(child),
                "outdatedMeasure" => outdated_measure = self.extract_outdated_measure(child),
                other => self.diags.unexpected_tag(other),
            }
        }

        Some(TimeConsiderations {
            half_life,
            outdated_measure,
        })
    }

    fn extract_half_life(&mut self, node: roxmltree::Node) -> Option<HalfLife> {
        let mut life_unit = Unit::empty();
        let mut multiplier = 1.0;
        let mut value = None;

        for child in node.children().filter(|n| n.is_element()) {
            match child.tag_name().name() {
                "unit" => {
                    life_unit = scalars::extract_unit(child, CheckUnit::Check, &mut self.diags)
                }
                "duration" => value = Some(self.extract_population_value(child)),
                "multiplier" => multiplier = scalars::extract_double(child, &mut self.diags),
                other => self.diags.unexpected_tag(other),
            }
        }

        let value = match value {
            Some(v) => v,
            None => {
                self.diags.error("No duration value in half life.");
                return None;
            }
        };

        Some(HalfLife {
            unit: life_unit,
            value: value.value,
            multiplier,
            operation: value.operation,
        })
    }

    fn extract_outdated_measure(&mut self, node: roxmltree::Node) -> Option<OutdatedMeasure> {
        let mut measure_unit = Unit::empty();
        let mut value = None;

        for child in node.children().filter(|n| n.is_element()) {
            match child.tag_name().name() {
                "unit" => {
                    measure_unit = scalars::extract_unit(child, CheckUnit::Check, &mut self.diags)
                }
                "duration" => value = Some(self.extract_population_value(child)),
                other => self.diags.unexpected_tag(other),
            }
        }

        if self.diags.has_error() {
            return None;
        }
        let value = match value {
            Some(v) => v,
            None => {
                self.diags.error("No value in outdated measure");
                return None;
            }
        };

        Some(OutdatedMeasure {
            unit: measure_unit,
            value: value.value,
            operation: value.operation,
        })
    }

    // ────────────────────────────────────────────────────────────────────
    // Document head
    // ────────────────────────────────────────────────────────────────────

    /// Descriptive metadata. Unknown tags inside the known sections are
    /// skipped without a warning, matching the permissive head grammar.
    pub fn extract_head(&mut self, node: roxmltree::Node) -> Option<DrugModelMetadata> {
        let mut metadata = DrugModelMetadata::default();

        for child in node.children().filter(|n| n.is_element()) {
            match child.tag_name().name() {
                "drug" => {
                    for field in child.children().filter(|n| n.is_element()) {
                        match field.tag_name().name() {
                            "drugName" => {
                                metadata.drug_name =
                                    self.extract_translatable_string(field, "name")
                            }
                            "drugDescription" => {
                                metadata.drug_description =
                                    self.extract_translatable_string(field, "desc")
                            }
                            "atcs" => {
                                for atc in field.children().filter(|n| n.is_element()) {
                                    if atc.tag_name().name() == "atc" {
                                        metadata.atcs.push(self.text(atc));
                                    }
                                }
                            }
                            _ => {}
                        }
                    }
                }
                "study" => {
                    for field in child.children().filter(|n| n.is_element()) {
                        match field.tag_name().name() {
                            "studyName" => {
                                metadata.study_name =
                                    self.extract_translatable_string(field, "name")
                            }
                            "studyAuthors" => metadata.study_authors = self.text(field),
                            "description" => {
                                metadata.description =
                                    self.extract_translatable_string(field, "desc")
                            }
                            _ => {}
                        }
                    }
                }
                "modelDescription" => {
                    for field in child.children().filter(|n| n.is_element()) {
                        match field.tag_name().name() {
                            "distribution" => {
                                metadata.distribution =
                                    self.extract_translatable_string(field, "desc")
                            }
                            "elimination" => {
                                metadata.elimination =
                                    self.extract_translatable_string(field, "desc")
                            }
                            _ => {}
                        }
                    }
                }
                other => self.diags.unexpected_tag(other),
            }
        }

        if self.diags.has_error() {
            return None;
        }
        Some(metadata)
    }
}
