use tddmodel::importer::DrugModelImporter;
use tddmodel::model::{
    AbsorptionModel, AdministrationRoute, CovariateType, DataType, Formulation, Operation,
    ParameterVariabilityType, ResidualErrorType, TargetType, ValidValues,
};
use tddmodel::Status;

const MODEL_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<model version="0.6">
  <history>
    <revisions/>
  </history>
  <head>
    <drug>
      <atcs>
        <atc>fake</atc>
      </atcs>
      <drugName>
        <name lang="en">Virtual drug</name>
      </drugName>
      <drugDescription>
        <desc lang="en">Virtual drug used for tests</desc>
      </drugDescription>
    </drug>
    <study>
      <studyName>
        <name lang="en">Virtual drug study</name>
      </studyName>
      <studyAuthors>A. Author</studyAuthors>
      <description>
        <desc lang="en">Infusion model with Michaelis-Menten elimination</desc>
      </description>
      <comments/>
    </study>
    <comments/>
  </head>
  <drugModel>
    <drugId>virtualdrug</drugId>
    <drugModelId>ch.tucuxi.virtualdrug.mod202</drugModelId>
    <domain>
      <description>
        <desc lang="en">Adult patients</desc>
      </description>
      <constraints>
        <constraint>
          <constraintType>hard</constraintType>
          <errorMessage>
            <text lang="en">The age must be positive</text>
          </errorMessage>
          <requiredCovariates>
            <covariateId>age</covariateId>
          </requiredCovariates>
          <checkOperation>
            <softFormula>
              <inputs>
                <input>
                  <id>age</id>
                  <type>double</type>
                </input>
              </inputs>
              <code><![CDATA[return age > 0;]]></code>
            </softFormula>
            <comments/>
          </checkOperation>
          <comments/>
        </constraint>
      </constraints>
    </domain>
    <covariates>
      <covariate>
        <covariateId>sampling_group</covariateId>
        <covariateName>
          <name lang="en">Sampling group</name>
        </covariateName>
        <description>
          <desc lang="en">Group used to select the sampling schedule</desc>
        </description>
        <unit>-</unit>
        <covariateType>standard</covariateType>
        <dataType>int</dataType>
        <interpolationType>direct</interpolationType>
        <refreshPeriod>
          <unit>d</unit>
          <value>30</value>
        </refreshPeriod>
        <covariateValue>
          <standardValue>1</standardValue>
        </covariateValue>
        <validation>
          <operation>
            <softFormula>
              <inputs>
                <input>
                  <id>sampling_group</id>
                  <type>int</type>
                </input>
              </inputs>
              <code><![CDATA[return sampling_group > 0;]]></code>
            </softFormula>
            <comments/>
          </operation>
          <errorMessage>
            <text lang="en">The sampling group must be positive</text>
          </errorMessage>
          <comments/>
        </validation>
        <comments/>
      </covariate>
    </covariates>
    <activeMoieties>
      <activeMoiety>
        <activeMoietyId>virtualdrug</activeMoietyId>
        <activeMoietyName>
          <name lang="en">Virtual drug</name>
        </activeMoietyName>
        <unit>ug/l</unit>
        <analyteIdList>
          <analyteId>virtualdrug</analyteId>
        </analyteIdList>
        <analytesToMoietyFormula>
          <hardFormula>direct</hardFormula>
          <comments/>
        </analytesToMoietyFormula>
        <targets>
          <target>
            <targetType>residual</targetType>
            <targetValues>
              <unit>mg/l</unit>
              <min>
                <standardValue>10</standardValue>
              </min>
              <max>
                <standardValue>20</standardValue>
              </max>
              <best>
                <standardValue>15</standardValue>
              </best>
              <toxicityAlarm>
                <standardValue>30</standardValue>
              </toxicityAlarm>
              <inefficacyAlarm>
                <standardValue>5</standardValue>
              </inefficacyAlarm>
            </targetValues>
            <comments/>
          </target>
        </targets>
      </activeMoiety>
    </activeMoieties>
    <analyteGroups>
      <analyteGroup>
        <groupId>virtualdrug</groupId>
        <pkModelId>michaelismenten.1comp</pkModelId>
        <analytes>
          <analyte>
            <analyteId>virtualdrug</analyteId>
            <unit>ug/l</unit>
            <molarMass>
              <value>1</value>
              <unit>g/mol</unit>
            </molarMass>
            <description>
              <desc lang="en">Virtual analyte</desc>
            </description>
            <errorModel>
              <errorModelType>proportional</errorModelType>
              <sigmas>
                <sigma>
                  <standardValue>0.22</standardValue>
                </sigma>
              </sigmas>
              <comments/>
            </errorModel>
            <comments/>
          </analyte>
        </analytes>
        <dispositionParameters>
          <parameters>
            <parameter>
              <parameterId>Vmax</parameterId>
              <unit>mg/h</unit>
              <parameterValue>
                <standardValue>10</standardValue>
              </parameterValue>
              <bsv>
                <bsvType>exponential</bsvType>
                <stdDevs>
                  <stdDev>0.4</stdDev>
                </stdDevs>
              </bsv>
              <comments/>
            </parameter>
            <parameter>
              <parameterId>V</parameterId>
              <unit>l</unit>
              <parameterValue>
                <standardValue>70</standardValue>
              </parameterValue>
              <bsv>
                <bsvType>exponential</bsvType>
                <stdDevs>
                  <stdDev>0.3</stdDev>
                </stdDevs>
              </bsv>
              <comments/>
            </parameter>
            <parameter>
              <parameterId>Km</parameterId>
              <unit>mg/l</unit>
              <parameterValue>
                <standardValue>2500</standardValue>
              </parameterValue>
              <bsv>
                <bsvType>none</bsvType>
              </bsv>
              <comments/>
            </parameter>
          </parameters>
          <correlations>
            <correlation>
              <param1>Vmax</param1>
              <param2>V</param2>
              <value>0.3</value>
              <comments/>
            </correlation>
          </correlations>
        </dispositionParameters>
      </analyteGroup>
    </analyteGroups>
    <formulationAndRoutes default="id0">
      <formulationAndRoute>
        <formulationAndRouteId>id0</formulationAndRouteId>
        <formulation>parenteralSolution</formulation>
        <administrationName>short infusion</administrationName>
        <administrationRoute>intravenousDrip</administrationRoute>
        <absorptionModel>infusion</absorptionModel>
        <dosages>
          <analyteConversions>
            <analyteConversion>
              <analyteId>virtualdrug</analyteId>
              <factor>1</factor>
            </analyteConversion>
          </analyteConversions>
          <availableDoses>
            <unit>mg</unit>
            <default>
              <standardValue>400</standardValue>
            </default>
            <rangeValues>
              <from>
                <standardValue>100</standardValue>
              </from>
              <to>
                <standardValue>400</standardValue>
              </to>
              <step>
                <standardValue>100</standardValue>
              </step>
            </rangeValues>
            <fixedValues>
              <value>600</value>
              <value>800</value>
            </fixedValues>
          </availableDoses>
          <availableIntervals>
            <unit>h</unit>
            <default>
              <standardValue>24</standardValue>
            </default>
            <fixedValues>
              <value>12</value>
              <value>24</value>
            </fixedValues>
          </availableIntervals>
          <availableInfusions>
            <unit>h</unit>
            <default>
              <standardValue>1</standardValue>
            </default>
            <fixedValues>
              <value>0.5</value>
              <value>1</value>
            </fixedValues>
          </availableInfusions>
          <comments/>
        </dosages>
        <absorptionParameters>
          <parameterSetAnalyteGroup>
            <analyteGroupId>virtualdrug</analyteGroupId>
            <absorptionModel>infusion</absorptionModel>
            <parameterSet>
              <parameters/>
              <correlations/>
            </parameterSet>
          </parameterSetAnalyteGroup>
        </absorptionParameters>
      </formulationAndRoute>
    </formulationAndRoutes>
    <timeConsiderations>
      <halfLife>
        <unit>h</unit>
        <duration>
          <standardValue>1</standardValue>
        </duration>
        <multiplier>80000</multiplier>
        <comments/>
      </halfLife>
      <outdatedMeasure>
        <unit>d</unit>
        <duration>
          <standardValue>15</standardValue>
        </duration>
        <comments/>
      </outdatedMeasure>
    </timeConsiderations>
  </drugModel>
</model>
"#;

#[test]
fn test_import_full_document() {
    let importer = DrugModelImporter::default();
    let model = importer.import_from_str(MODEL_XML).expect("import model");

    assert_eq!(model.drug_id, "virtualdrug");
    assert_eq!(model.drug_model_id, "ch.tucuxi.virtualdrug.mod202");

    let domain = model.domain.as_ref().expect("domain");
    assert_eq!(domain.description.get("en"), Some("Adult patients"));
    assert_eq!(domain.constraints.len(), 1);
    assert_eq!(domain.constraints[0].required_covariate_ids, vec!["age"]);

    assert_eq!(model.covariates.len(), 1);
    let covariate = &model.covariates[0];
    assert_eq!(covariate.id, "sampling_group");
    assert_eq!(covariate.covariate_type, CovariateType::Standard);
    assert_eq!(covariate.data_type, DataType::Int);
    assert_eq!(covariate.value.value, 1.0);
    assert_eq!(covariate.refresh_period.as_secs(), 30 * 86400);
    assert!(covariate.validation.is_some());
    assert_eq!(
        covariate.validation_error_message.get("en"),
        Some("The sampling group must be positive")
    );

    assert_eq!(model.active_moieties.len(), 1);
    let moiety = &model.active_moieties[0];
    assert_eq!(moiety.id, "virtualdrug");
    assert_eq!(moiety.analyte_ids, vec!["virtualdrug"]);
    match moiety.formula.as_ref().expect("formula") {
        Operation::Hard { id, inputs } => {
            assert_eq!(id, "direct");
            assert_eq!(inputs.len(), 1);
            assert_eq!(inputs[0].id, "input0");
        }
        other => panic!("expected hard formula, got {:?}", other),
    }

    assert_eq!(moiety.targets.len(), 1);
    let target = &moiety.targets[0];
    assert_eq!(target.target_type, TargetType::Residual);
    assert_eq!(target.active_moiety_id, "virtualdrug");
    assert_eq!(target.unit.as_str(), "mg/l");
    assert_eq!(target.min.value, 10.0);
    assert_eq!(target.max.value, 20.0);
    assert_eq!(target.best.value, 15.0);
    assert_eq!(target.toxicity_alarm.value, 30.0);
    assert_eq!(target.inefficacy_alarm.value, 5.0);
    // Absent slots are synthesized as zero placeholders.
    assert_eq!(target.mic.value, 0.0);
    assert_eq!(target.t_min.value, 0.0);

    assert_eq!(model.analyte_sets.len(), 1);
    let set = &model.analyte_sets[0];
    assert_eq!(set.id, "virtualdrug");
    assert_eq!(set.pk_model_id, "michaelismenten.1comp");
    assert_eq!(set.dose_unit.as_str(), "ug");
    assert_eq!(set.analytes.len(), 1);
    let analyte = &set.analytes[0];
    assert_eq!(analyte.molar_mass.value, 1.0);
    assert_eq!(analyte.molar_mass.unit.as_str(), "g/mol");
    let error_model = analyte.error_model.as_ref().expect("error model");
    assert_eq!(error_model.error_model_type, ResidualErrorType::Proportional);
    assert_eq!(error_model.sigmas.len(), 1);
    assert_eq!(error_model.sigmas[0].value, 0.22);

    let params = &set.disposition_parameters;
    assert_eq!(params.parameters.len(), 3);
    assert_eq!(params.parameters[0].id, "Vmax");
    assert_eq!(params.parameters[0].value.value, 10.0);
    let bsv = params.parameters[0].variability.as_ref().expect("bsv");
    assert_eq!(bsv.variability_type, ParameterVariabilityType::Exponential);
    assert_eq!(bsv.std_devs, vec![0.4]);
    assert_eq!(params.correlations.len(), 1);
    assert_eq!(params.correlations[0].param1, "Vmax");
    assert_eq!(params.correlations[0].value, 0.3);

    let routes = model.formulation_and_routes.as_ref().expect("routes");
    assert_eq!(routes.default_id, "id0");
    assert_eq!(routes.entries.len(), 1);
    let route = routes.default_entry().expect("default entry");
    assert_eq!(route.formulation, Formulation::ParenteralSolution);
    assert_eq!(route.administration_route, AdministrationRoute::IntravenousDrip);
    assert_eq!(route.absorption_model, AbsorptionModel::Infusion);
    assert!(route.loading_dose_recommended);
    assert!(route.rest_period_recommended);
    assert_eq!(route.analyte_conversions.len(), 1);
    assert_eq!(route.analyte_conversions[0].analyte_id, "virtualdrug");

    let doses = route.doses.as_ref().expect("doses");
    assert_eq!(doses.unit.as_str(), "mg");
    assert_eq!(doses.default.value, 400.0);
    assert_eq!(doses.values.len(), 2);
    match &doses.values[0] {
        ValidValues::Range { from, to, step } => {
            assert_eq!(from.value, 100.0);
            assert_eq!(to.value, 400.0);
            assert_eq!(step.value, 100.0);
        }
        other => panic!("expected range, got {:?}", other),
    }
    assert_eq!(doses.values[1], ValidValues::Fixed(vec![600.0, 800.0]));

    let intervals = route.intervals.as_ref().expect("intervals");
    assert_eq!(intervals.default.value, 24.0);
    let infusions = route.infusions.as_ref().expect("infusions");
    assert_eq!(infusions.default.value, 1.0);

    assert_eq!(route.associations.len(), 1);
    assert_eq!(route.associations[0].analyte_set_index, 0);
    assert_eq!(route.associations[0].absorption_model, AbsorptionModel::Infusion);

    let time = model.time_considerations.as_ref().expect("time");
    let half_life = time.half_life.as_ref().expect("half life");
    assert_eq!(half_life.value, 1.0);
    assert_eq!(half_life.multiplier, 80000.0);
    let outdated = time.outdated_measure.as_ref().expect("outdated measure");
    assert_eq!(outdated.unit.as_str(), "d");
    assert_eq!(outdated.value, 15.0);

    let metadata = model.metadata.as_ref().expect("metadata");
    assert_eq!(metadata.drug_name.get("en"), Some("Virtual drug"));
    assert_eq!(metadata.study_authors, "A. Author");
    assert_eq!(metadata.atcs, vec!["fake"]);
    // Filled from the PK-model catalog, not from the document.
    assert_eq!(metadata.distribution.get("en"), Some("Extra- or intra-vascular"));
    assert_eq!(metadata.elimination.get("en"), Some("Michaelis-Menten"));
}

#[test]
fn test_import_is_idempotent_across_instances() {
    let first = DrugModelImporter::default()
        .import_from_str(MODEL_XML)
        .expect("first import");
    let second = DrugModelImporter::default()
        .import_from_str(MODEL_XML)
        .expect("second import");
    assert_eq!(first, second);
}

#[test]
fn test_missing_drug_model_node() {
    let xml = r#"<?xml version="1.0"?>
<model>
  <head>
    <drug>
      <drugName><name lang="en">Virtual drug</name></drugName>
    </drug>
  </head>
</model>
"#;
    let importer = DrugModelImporter::default();
    let err = importer.import_from_str(xml).expect_err("must fail");
    assert_eq!(err.status(), Status::Error);
    assert!(err.to_string().contains("<drugModel> not found in xml input"));
}

#[test]
fn test_missing_head_node() {
    let xml = MODEL_XML.replace("<head>", "<ignoredHead>").replace("</head>", "</ignoredHead>");
    let importer = DrugModelImporter::default();
    let err = importer.import_from_str(&xml).expect_err("must fail");
    assert_eq!(err.status(), Status::Error);
    assert!(err.to_string().contains("<head> not found in xml input"));
}

#[test]
fn test_unknown_pk_model_id() {
    let xml = MODEL_XML.replace("michaelismenten.1comp", "nonexistent.999comp");
    let importer = DrugModelImporter::default();
    let err = importer.import_from_str(&xml).expect_err("must fail");
    assert_eq!(err.status(), Status::Error);
    assert!(err.to_string().contains("PK model ID"));
    assert!(err.to_string().contains("nonexistent.999comp"));
}

#[test]
fn test_dangling_analyte_group_reference() {
    let xml = MODEL_XML.replace(
        "<analyteGroupId>virtualdrug</analyteGroupId>",
        "<analyteGroupId>someOtherGroup</analyteGroupId>",
    );
    let importer = DrugModelImporter::default();
    let err = importer.import_from_str(&xml).expect_err("must fail");
    assert_eq!(err.status(), Status::Error);
    assert!(err.to_string().contains("analyteGroupId"));
    assert!(err.to_string().contains("someOtherGroup"));
}

#[test]
fn test_malformed_string_xml_reports_error_status() {
    let importer = DrugModelImporter::default();
    let err = importer.import_from_str("<model><head>").expect_err("must fail");
    assert_eq!(err.status(), Status::Error);
    assert_eq!(err.to_string(), "The XML is not valid.");
}

#[test]
fn test_unreadable_file_maps_to_cant_open_file() {
    let importer = DrugModelImporter::default();
    let err = importer
        .import_from_file("/nonexistent/model.tdd")
        .expect_err("must fail");
    assert_eq!(err.status(), Status::CantOpenFile);
}

#[test]
fn test_malformed_file_maps_to_cant_open_file() {
    let temp_file = tempfile::NamedTempFile::new().expect("temp file");
    std::fs::write(temp_file.path(), "<model><head>").expect("write");
    let importer = DrugModelImporter::default();
    let err = importer
        .import_from_file(temp_file.path())
        .expect_err("must fail");
    assert_eq!(err.status(), Status::CantOpenFile);
}
