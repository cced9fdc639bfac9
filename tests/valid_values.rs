use tddmodel::importer::DrugModelImporter;
use tddmodel::model::ValidValues;

const ANALYTE_GROUPS: &str = r#"
    <analyteGroups>
      <analyteGroup>
        <groupId>virtualdrug</groupId>
        <pkModelId>linear.1comp.macro</pkModelId>
        <analytes>
          <analyte>
            <analyteId>virtualdrug</analyteId>
            <unit>ug/l</unit>
            <molarMass>
              <value>1</value>
              <unit>g/mol</unit>
            </molarMass>
          </analyte>
        </analytes>
        <dispositionParameters>
          <parameters/>
          <correlations/>
        </dispositionParameters>
      </analyteGroup>
    </analyteGroups>
"#;

fn document_with_dosages(dosages: &str) -> String {
    format!(
        r#"<?xml version="1.0"?>
<model>
  <head>
    <drug>
      <drugName><name lang="en">Virtual drug</name></drugName>
    </drug>
  </head>
  <drugModel>
    <drugId>virtualdrug</drugId>
    <drugModelId>ch.tucuxi.virtualdrug.test</drugModelId>{ANALYTE_GROUPS}
    <formulationAndRoutes default="id0">
      <formulationAndRoute>
        <formulationAndRouteId>id0</formulationAndRouteId>
        <formulation>oralSolution</formulation>
        <administrationName>oral</administrationName>
        <administrationRoute>oral</administrationRoute>
        <absorptionModel>extra</absorptionModel>
        <dosages>{dosages}</dosages>
      </formulationAndRoute>
    </formulationAndRoutes>
  </drugModel>
</model>
"#
    )
}

#[test]
fn test_doses_with_range_and_fixed_values() {
    let xml = document_with_dosages(
        r#"
          <availableDoses>
            <unit>mg</unit>
            <default><standardValue>200</standardValue></default>
            <rangeValues>
              <from><standardValue>50</standardValue></from>
              <to><standardValue>200</standardValue></to>
              <step><standardValue>50</standardValue></step>
            </rangeValues>
            <fixedValues>
              <value>300</value>
              <value>400</value>
            </fixedValues>
          </availableDoses>
"#,
    );
    let importer = DrugModelImporter::default();
    let model = importer.import_from_str(&xml).expect("import");
    let route = &model.formulation_and_routes.as_ref().unwrap().entries[0];
    let doses = route.doses.as_ref().expect("doses");
    assert_eq!(doses.unit.as_str(), "mg");
    assert_eq!(doses.default.value, 200.0);
    assert_eq!(doses.values.len(), 2);
    match &doses.values[0] {
        ValidValues::Range { from, to, step } => {
            assert_eq!(from.value, 50.0);
            assert_eq!(to.value, 200.0);
            assert_eq!(step.value, 50.0);
        }
        other => panic!("expected range, got {:?}", other),
    }
    assert_eq!(doses.values[1], ValidValues::Fixed(vec![300.0, 400.0]));
}

#[test]
fn test_interval_and_infusion_tag_aliases() {
    let xml = document_with_dosages(
        r#"
          <intervals>
            <unit>h</unit>
            <default><standardValue>12</standardValue></default>
            <fixedValues><value>8</value><value>12</value></fixedValues>
          </intervals>
          <infusions>
            <unit>min</unit>
            <default><standardValue>30</standardValue></default>
            <fixedValues><value>30</value><value>60</value></fixedValues>
          </infusions>
"#,
    );
    let importer = DrugModelImporter::default();
    let model = importer.import_from_str(&xml).expect("import");
    let route = &model.formulation_and_routes.as_ref().unwrap().entries[0];
    let intervals = route.intervals.as_ref().expect("intervals");
    assert_eq!(intervals.unit.as_str(), "h");
    assert_eq!(intervals.default.value, 12.0);
    let infusions = route.infusions.as_ref().expect("infusions");
    assert_eq!(infusions.unit.as_str(), "min");
    assert_eq!(infusions.values[0], ValidValues::Fixed(vec![30.0, 60.0]));
}

#[test]
fn test_doses_without_default_are_rejected() {
    let xml = document_with_dosages(
        r#"
          <availableDoses>
            <unit>mg</unit>
            <fixedValues><value>100</value></fixedValues>
          </availableDoses>
"#,
    );
    let importer = DrugModelImporter::default();
    let err = importer.import_from_str(&xml).expect_err("must fail");
    assert!(err.to_string().contains("No default value in valid doses."));
}

#[test]
fn test_intervals_without_default_are_rejected() {
    let xml = document_with_dosages(
        r#"
          <availableIntervals>
            <unit>h</unit>
            <fixedValues><value>12</value></fixedValues>
          </availableIntervals>
"#,
    );
    let importer = DrugModelImporter::default();
    let err = importer.import_from_str(&xml).expect_err("must fail");
    assert!(err
        .to_string()
        .contains("No default value in valid durations."));
}

#[test]
fn test_incomplete_range_is_rejected() {
    let xml = document_with_dosages(
        r#"
          <availableDoses>
            <unit>mg</unit>
            <default><standardValue>100</standardValue></default>
            <rangeValues>
              <from><standardValue>50</standardValue></from>
              <to><standardValue>200</standardValue></to>
            </rangeValues>
          </availableDoses>
"#,
    );
    let importer = DrugModelImporter::default();
    let err = importer.import_from_str(&xml).expect_err("must fail");
    assert!(err.to_string().contains("<rangeValues>"));
}
