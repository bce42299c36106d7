use std::fs;
use std::process::Command;

fn metareg() -> Command {
    Command::new(env!("CARGO_BIN_EXE_metareg"))
}

#[test]
fn wrong_argument_count_exits_with_one() {
    let status = metareg()
        .args(["regress", "only-one-path"])
        .status()
        .expect("run binary");
    assert_eq!(status.code(), Some(1));

    let status = metareg()
        .args(["prep", "a", "b", "c", "d", "e"])
        .status()
        .expect("run binary");
    assert_eq!(status.code(), Some(1));
}

#[test]
fn no_subcommand_exits_with_one() {
    let status = metareg().status().expect("run binary");
    assert_eq!(status.code(), Some(1));
}

#[test]
fn help_exits_cleanly() {
    let status = metareg().arg("--help").status().expect("run binary");
    assert_eq!(status.code(), Some(0));
}

#[test]
fn missing_input_file_exits_with_one() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = metareg()
        .args(["regress"])
        .arg(dir.path().join("absent.tsv"))
        .arg(dir.path().join("out.tsv"))
        .output()
        .expect("run binary");
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("does not exist"));
}

#[test]
fn gene_pheno_command_writes_table() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("annotated.tsv");
    fs::write(
        &input,
        "gene\tpos\tmarkerID\tBETA\tSE\tprob_0\tam_pathogenicity\tpLoF_indicator\tmissense_indicator\n\
         G1\t100\tm1\t0.1\t0.05\t0.2\t0.4\t1\t0\n",
    )
    .expect("input");

    let status = metareg()
        .arg("gene-pheno")
        .arg("G1")
        .arg("30780")
        .arg(&input)
        .arg(dir.path())
        .status()
        .expect("run binary");
    assert!(status.success());
    assert!(dir.path().join("G1_30780.tsv").exists());
}
