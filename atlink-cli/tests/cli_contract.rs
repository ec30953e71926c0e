//! Integration tests for core CLI contract behavior, driven against the
//! built-in simulated phone.

use {
    predicates::prelude::*,
    std::fs,
    std::path::Path,
    tempfile::{TempDir, tempdir},
};

const TUNE_ID: &str = "5303650005020002FFFF";

/// Command isolated from the user's config files and environment.
fn cli_cmd(home: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("atlink");
    cmd.current_dir(home)
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("ATLINK_PORT")
        .env_remove("ATLINK_BAUD")
        .env_remove("ATLINK_DATA_BITS")
        .env_remove("ATLINK_STOP_BITS")
        .env_remove("ATLINK_PARITY")
        .env_remove("ATLINK_FLOW_CONTROL");
    cmd
}

fn fake_cmd(home: &Path) -> assert_cmd::Command {
    let mut cmd = cli_cmd(home);
    cmd.arg("--fake");
    cmd
}

fn home() -> TempDir {
    tempdir().expect("tempdir should be created")
}

#[test]
fn help_exits_zero_and_writes_stdout_only() {
    let home = home();
    cli_cmd(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("atlink"))
        .stdout(predicate::str::contains("sms-send"))
        .stderr(predicate::str::is_empty());
}

#[test]
fn version_exits_zero_and_writes_stdout_only() {
    let home = home();
    cli_cmd(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("atlink"))
        .stderr(predicate::str::is_empty());
}

#[test]
fn exit_code_two_for_usage_error_unknown_command() {
    let home = home();
    cli_cmd(home.path())
        .arg("frobnicate")
        .assert()
        .code(2)
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_command_succeeds_on_fake_phone() {
    let home = home();
    fake_cmd(home.path())
        .arg("test")
        .assert()
        .success()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Phone responds"));
}

#[test]
fn quiet_mode_keeps_stderr_empty() {
    let home = home();
    fake_cmd(home.path())
        .args(["-q", "test"])
        .assert()
        .success()
        .stderr(predicate::str::is_empty());
}

#[test]
fn missing_port_is_invalid_parameter() {
    let home = home();
    cli_cmd(home.path())
        .arg("test")
        .assert()
        .code(9)
        .stderr(predicate::str::contains("No serial port given"));
}

#[test]
fn invalid_parity_is_invalid_parameter() {
    let home = home();
    fake_cmd(home.path())
        .args(["--parity", "sideways", "test"])
        .assert()
        .code(9)
        .stderr(predicate::str::contains("parity"));
}

#[test]
fn list_category_prints_visible_objects() {
    let home = home();
    fake_cmd(home.path())
        .args(["list", "pictures"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Logo.gif"))
        .stdout(predicate::str::contains("Startup").not());
}

#[test]
fn list_json_is_valid_json_without_extra_lines() {
    let home = home();
    let output = fake_cmd(home.path())
        .args(["--json", "list"])
        .output()
        .expect("command should execute");
    assert!(output.status.success());

    let parsed: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(parsed["code"], 0);
    assert_eq!(parsed["response"]["kind"], "elements");
    let names: Vec<&str> = parsed["response"]["value"]
        .as_array()
        .expect("elements array")
        .iter()
        .filter_map(|e| e["filename"].as_str())
        .collect();
    assert_eq!(names, ["Logo", "Tune", "Contact"]);
}

#[test]
fn info_prints_identification() {
    let home = home();
    fake_cmd(home.path())
        .arg("info")
        .assert()
        .success()
        .stdout(predicate::str::contains("IMEI:"))
        .stdout(predicate::str::contains("SIM:"));
}

#[test]
fn volume_reads_level() {
    let home = home();
    fake_cmd(home.path())
        .arg("volume")
        .assert()
        .success()
        .stdout(predicate::str::diff("3\n"));
}

#[test]
fn volume_out_of_range_is_rejected() {
    let home = home();
    fake_cmd(home.path())
        .args(["volume", "9"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("rejected"));
}

#[test]
fn upload_unsupported_extension_exits_four() {
    let home = home();
    let file = home.path().join("notes.xyz");
    fs::write(&file, b"hello").unwrap();

    fake_cmd(home.path())
        .arg("upload")
        .arg(&file)
        .assert()
        .code(4)
        .stderr(predicate::str::contains("Unsupported file type"));
}

#[test]
fn upload_picture_succeeds() {
    let home = home();
    let file = home.path().join("holiday.gif");
    fs::write(&file, b"GIF89a\x01\x00\x01\x00\x00\x00\x00;").unwrap();

    fake_cmd(home.path())
        .arg("upload")
        .arg(&file)
        .assert()
        .success()
        .stderr(predicate::str::contains("Uploaded holiday.gif"));
}

#[test]
fn upload_missing_file_is_file_error() {
    let home = home();
    fake_cmd(home.path())
        .args(["upload", "absent.gif"])
        .assert()
        .code(7);
}

#[test]
fn download_writes_file_named_after_object() {
    let home = home();
    let out = home.path().join("out");

    let assert = fake_cmd(home.path())
        .args(["download", TUNE_ID, "--dir"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Tune.mid"));
    drop(assert);

    let data = fs::read(out.join("Tune.mid")).expect("downloaded file");
    assert!(data.starts_with(b"MThd"));
}

#[test]
fn download_dir_comes_from_local_config() {
    let home = home();
    fs::write(
        home.path().join("atlink.toml"),
        "[transfer]\ndownload_dir = \"from-config\"\n",
    )
    .unwrap();

    fake_cmd(home.path())
        .args(["download", TUNE_ID])
        .assert()
        .success();

    assert!(home.path().join("from-config").join("Tune.mid").exists());
}

#[test]
fn download_unknown_id_fails() {
    let home = home();
    fake_cmd(home.path())
        .args(["download", "00FF"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("No such object"));
}

#[test]
fn delete_failure_json_reports_code() {
    let home = home();
    let output = fake_cmd(home.path())
        .args(["--json", "delete", "00FF"])
        .output()
        .expect("command should execute");
    assert_eq!(output.status.code(), Some(2));

    let parsed: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(parsed["code"], -2);
    assert!(parsed["response"].is_null());
    assert_eq!(parsed["error"], "No such object on the phone");
}

#[test]
fn sms_list_shows_bodies() {
    let home = home();
    fake_cmd(home.path())
        .arg("sms-list")
        .assert()
        .success()
        .stdout(predicate::str::contains("See you at noon"))
        .stdout(predicate::str::contains("+48600300400"));
}

#[test]
fn sms_send_succeeds() {
    let home = home();
    fake_cmd(home.path())
        .args(["sms-send", "+48600100200", "On my way"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Message sent"));
}

#[test]
fn sms_send_rejects_bad_number() {
    let home = home();
    fake_cmd(home.path())
        .args(["sms-send", "not-a-number", "hi"])
        .assert()
        .code(9);
}

#[test]
fn alarms_lists_seeded_alarm() {
    let home = home();
    fake_cmd(home.path())
        .arg("alarms")
        .assert()
        .success()
        .stdout(predicate::str::contains("07:00:00"))
        .stdout(predicate::str::contains("every day"));
}

#[test]
fn alarm_add_accepts_weekdays() {
    let home = home();
    fake_cmd(home.path())
        .args(["alarm-add", "06:45", "--days", "1,2,3", "--slot", "2"])
        .assert()
        .success();
}

#[test]
fn alarm_add_bad_time_is_invalid_parameter() {
    let home = home();
    fake_cmd(home.path())
        .args(["alarm-add", "25:99"])
        .assert()
        .code(9);
}

#[test]
fn pin_reports_ready() {
    let home = home();
    fake_cmd(home.path())
        .arg("pin")
        .assert()
        .success()
        .stdout(predicate::str::contains("READY"));
}

#[test]
fn run_executes_command_file() {
    let home = home();
    let script = home.path().join("script.at");
    fs::write(&script, "# warm up\nAT\n\nAT+CLVL?\n").unwrap();

    fake_cmd(home.path())
        .arg("run")
        .arg(&script)
        .assert()
        .success()
        .stdout(predicate::str::contains("> AT+CLVL?"))
        .stdout(predicate::str::contains("+CLVL: 3"))
        .stdout(predicate::str::contains("warm up").not());
}

#[test]
fn completions_command_writes_to_stdout() {
    let home = home();
    cli_cmd(home.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("atlink"))
        .stderr(predicate::str::is_empty());
}
