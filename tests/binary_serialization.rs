use anyhow::Result;
use tddmodel::importer::DrugModelImporter;
use tddmodel::model::DrugModelDoc;
use tempfile::NamedTempFile;

const MODEL_XML: &str = r#"<?xml version="1.0"?>
<model>
  <head>
    <drug>
      <drugName><name lang="en">Virtual drug</name></drugName>
    </drug>
  </head>
  <drugModel>
    <drugId>virtualdrug</drugId>
    <drugModelId>ch.tucuxi.virtualdrug.test</drugModelId>
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
          <parameters>
            <parameter>
              <parameterId>CL</parameterId>
              <unit>l/h</unit>
              <parameterValue><standardValue>3.7</standardValue></parameterValue>
              <bsv><bsvType>none</bsvType></bsv>
            </parameter>
          </parameters>
          <correlations/>
        </dispositionParameters>
      </analyteGroup>
    </analyteGroups>
  </drugModel>
</model>
"#;

#[test]
fn test_binary_serialization() -> Result<()> {
    let importer = DrugModelImporter::default();
    let model = importer.import_from_str(MODEL_XML).expect("import model");

    let doc = DrugModelDoc { model };

    // Create a temporary file
    let temp_file = NamedTempFile::new()?;
    let temp_path = temp_file.path();

    // Save to binary
    doc.save_to_binary(temp_path)?;

    // Load from binary
    let loaded_doc = DrugModelDoc::load_from_binary(temp_path)?;

    // Verify content
    assert_eq!(loaded_doc.model, doc.model);
    assert_eq!(loaded_doc.model.drug_id, "virtualdrug");
    assert_eq!(loaded_doc.model.analyte_sets.len(), 1);
    let set = &loaded_doc.model.analyte_sets[0];
    assert_eq!(set.pk_model_id, "linear.1comp.macro");
    assert_eq!(set.disposition_parameters.parameters[0].id, "CL");
    assert_eq!(set.disposition_parameters.parameters[0].value.value, 3.7);

    Ok(())
}

#[test]
fn test_binary_rejects_wrong_magic() -> Result<()> {
    let temp_file = NamedTempFile::new()?;
    std::fs::write(temp_file.path(), b"NOTADOC!rest")?;
    assert!(DrugModelDoc::load_from_binary(temp_file.path()).is_err());
    Ok(())
}
