use std::fs;

use polars::prelude::*;

use metareg::phenos::{ContinuousPhenosConfig, continuous_phenocodes, continuous_phenos};

#[test]
fn continuous_codes_are_distinct_and_sorted() {
    let df = df!(
        "trait_type" => [
            Some("continuous"),
            Some("categorical"),
            Some("continuous"),
            None,
            Some("continuous"),
        ],
        "phenocode" => [
            Some("30780"),
            Some("20002"),
            Some("21001"),
            Some("50"),
            Some("30780"),
        ],
    )
    .expect("df");
    let codes = continuous_phenocodes(&df).expect("codes");
    assert_eq!(codes, vec!["21001".to_string(), "30780".to_string()]);
}

#[test]
fn missing_trait_type_column_is_an_error() {
    let df = df!("phenocode" => ["1"]).expect("df");
    assert!(continuous_phenocodes(&df).is_err());
}

#[test]
fn codes_are_written_one_per_line() {
    let dir = tempfile::tempdir().expect("tempdir");
    let pheno_results = dir.path().join("pheno_results.txt.bgz");
    let output = dir.path().join("continuous.txt");
    {
        use std::io::Write;
        let file = fs::File::create(&pheno_results).expect("create");
        let mut enc = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        enc.write_all(
            b"n_cases\ttrait_type\tphenocode\n100\tcontinuous\t30100\n50\tbinary\t250.2\n80\tcontinuous\t30000\n",
        )
        .expect("write");
        enc.finish().expect("finish");
    }

    let codes = continuous_phenos(&ContinuousPhenosConfig {
        pheno_results,
        output: output.clone(),
    })
    .expect("continuous phenos");
    assert_eq!(codes.len(), 2);
    assert_eq!(fs::read_to_string(&output).expect("output"), "30000\n30100\n");
}
