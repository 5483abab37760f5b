use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;

fn get_test_dir() -> PathBuf {
    let dir = PathBuf::from("target/tmp/tests");
    fs::create_dir_all(&dir).unwrap();
    dir
}

const FIXTURE: &str = "# source target weight
1 2 0.1
1 3 0.3
2 4 0.2
3 4 0.4
";

#[test]
fn test_cli_stats() -> Result<(), Box<dyn std::error::Error>> {
    let dir = get_test_dir();
    let file = dir.join("stats_edges.txt");
    fs::write(&file, FIXTURE)?;

    let mut cmd = Command::cargo_bin("smore")?;
    cmd.arg("stats").arg(&file);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Nodes:          4"))
        .stdout(predicate::str::contains("Edges:          4"))
        .stdout(predicate::str::contains("Total weight:   1.0000"));

    fs::remove_file(file)?;
    Ok(())
}

#[test]
fn test_cli_train() -> Result<(), Box<dyn std::error::Error>> {
    let dir = get_test_dir();
    let file = dir.join("train_edges.txt");
    fs::write(&file, FIXTURE)?;

    let mut cmd = Command::cargo_bin("smore")?;
    cmd.arg("train")
        .arg(&file)
        .arg("--dimension")
        .arg("8")
        .arg("--sample-times")
        .arg("20")
        .arg("--sample-size")
        .arg("50")
        .arg("--seed")
        .arg("42")
        .arg("--threads")
        .arg("2");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Iterations:     20"))
        .stdout(predicate::str::contains("Final loss:"));

    fs::remove_file(file)?;
    Ok(())
}

#[test]
fn test_cli_train_with_config_file() -> Result<(), Box<dyn std::error::Error>> {
    let dir = get_test_dir();
    let edges = dir.join("config_edges.txt");
    let config = dir.join("train.json");
    fs::write(&edges, "10,20\n20,30\n30,10\n")?;
    fs::write(
        &config,
        r#"{"dimension": 4, "sample_times": 3, "sample_size": 16, "seed": 1, "use_l2": false}"#,
    )?;

    let mut cmd = Command::cargo_bin("smore")?;
    cmd.arg("train")
        .arg(&edges)
        .arg("--config")
        .arg(&config)
        .arg("--sample-times")
        .arg("7");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Iterations:     7"));

    fs::remove_file(edges)?;
    fs::remove_file(config)?;
    Ok(())
}

#[test]
fn test_cli_train_rejects_malformed_edges() -> Result<(), Box<dyn std::error::Error>> {
    let dir = get_test_dir();
    let file = dir.join("bad_edges.txt");
    fs::write(&file, "1 2 0.5\n1 2 3 4\n")?;

    let mut cmd = Command::cargo_bin("smore")?;
    cmd.arg("train").arg(&file);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("line 2"));

    fs::remove_file(file)?;
    Ok(())
}

#[test]
fn test_cli_train_rejects_zero_dimension() -> Result<(), Box<dyn std::error::Error>> {
    let dir = get_test_dir();
    let file = dir.join("zero_dim_edges.txt");
    fs::write(&file, FIXTURE)?;

    let mut cmd = Command::cargo_bin("smore")?;
    cmd.arg("train").arg(&file).arg("--dimension").arg("0");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("dimension"));

    fs::remove_file(file)?;
    Ok(())
}

#[test]
fn test_cli_missing_file() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("smore")?;
    cmd.arg("stats").arg("target/tmp/tests/does_not_exist.txt");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load"));
    Ok(())
}

#[test]
fn test_cli_bench() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("smore")?;
    cmd.arg("bench")
        .arg("--edges")
        .arg("200")
        .arg("--nodes")
        .arg("50")
        .arg("--sample-times")
        .arg("3")
        .arg("--sample-size")
        .arg("500");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Generated graph:"))
        .stdout(predicate::str::contains("Iterations:     3"));
    Ok(())
}
