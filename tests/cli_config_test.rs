use std::process::Command;
use tempfile::TempDir;

fn nvrelay(dir: &std::path::Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_nvrelay"));
    cmd.current_dir(dir)
        .env_remove("NVRELAY_CONFIG")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_init_command() {
    let temp_dir = TempDir::new().unwrap();

    let output = nvrelay(temp_dir.path())
        .arg("init")
        .output()
        .expect("Failed to run init command");
    assert!(output.status.success());

    let content = std::fs::read_to_string(temp_dir.path().join("nvrelay.toml")).unwrap();
    assert!(content.contains("version = 1"));
    assert!(content.contains("[sources.masin1]"));
    assert!(content.contains("[delivery]"));

    // A second init refuses to overwrite without --force
    let output = nvrelay(temp_dir.path()).arg("init").output().unwrap();
    assert!(!output.status.success());

    let output = nvrelay(temp_dir.path())
        .args(["init", "--force"])
        .output()
        .unwrap();
    assert!(output.status.success());
}

#[test]
fn test_config_command_reads_local_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_content = r#"
[sources.kassa]
path = "/srv/kassa"
primary = "10.1.1.1:7000"

[delivery]
send_delay_ms = 123
"#;
    std::fs::write(temp_dir.path().join("nvrelay.toml"), config_content).unwrap();

    let output = nvrelay(temp_dir.path())
        .arg("config")
        .output()
        .expect("Failed to run config command");
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("[sources.kassa]"));
    assert!(stdout.contains("send_delay_ms = 123"));
    assert!(stdout.contains("tick_ms = 500"));
}

#[test]
fn test_run_without_sources_fails() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join("nvrelay.toml"), "version = 1\n").unwrap();

    let output = nvrelay(temp_dir.path())
        .arg("run")
        .output()
        .expect("Failed to run run command");
    assert!(!output.status.success());

    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("invalid configuration"));
}

#[test]
fn test_run_with_malformed_config_fails() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("custom.toml");
    std::fs::write(&config_path, "[sources.masin1\npath = ").unwrap();

    let output = nvrelay(temp_dir.path())
        .args(["run", "--config"])
        .arg(&config_path)
        .output()
        .unwrap();
    assert!(!output.status.success());
}

#[test]
fn test_parse_command_prints_message() {
    let temp_dir = TempDir::new().unwrap();
    let report_dir = temp_dir.path().join("masin7");
    std::fs::create_dir(&report_dir).unwrap();
    std::fs::write(
        report_dir.join("0001.xml"),
        r#"<Report><Machine MachineSN="PN7"/><Deposit Currency="USD"><BN Denom="100"/></Deposit></Report>"#,
    )
    .unwrap();

    let output = nvrelay(temp_dir.path())
        .args(["parse", "masin7/0001.xml"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.starts_with("masin7\nSN:PN7\nSaat:\nValyuta:USD\n"));
    assert!(stdout.contains("Nominallar:100(1 Ədəd)"));

    let output = nvrelay(temp_dir.path())
        .args(["parse", "masin7/0001.xml", "--source", "kassa", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let record: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(record["source_id"], "kassa");
    assert_eq!(record["total_count"], 1);
}
