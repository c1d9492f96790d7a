// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::io::Write;

use indoc::indoc;
use tempfile::TempDir;

use crate::{get_cmd_output, make_file_in_dir, viscal};
use viscal::ViscalConfig;

const CONFIG: &str = indoc! {r#"
    [transform]
    chan_average = 2
    hanning = true

    [fit]
    order = 2
    fit_chans = [[0, 3]]
"#};

fn write_config(dir: &TempDir, name: &str, contents: &str) -> String {
    let (path, mut f) = make_file_in_dir(name, dir.path());
    f.write_all(contents.as_bytes()).unwrap();
    path.display().to_string()
}

#[test]
fn test_help() {
    let (stdout, _) = get_cmd_output(viscal().arg("--help").ok());
    assert!(stdout.contains("plan"), "{stdout}");

    let (stdout, _) = get_cmd_output(viscal().args(["plan", "--help"]).ok());
    assert!(stdout.contains("--first-freq"), "{stdout}");
    assert!(stdout.contains("--num-chans"), "{stdout}");
}

#[test]
fn test_plan() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "config.toml", CONFIG);
    let cmd = viscal()
        .args([
            "plan",
            &config,
            "--first-freq",
            "100e6",
            "--freq-res",
            "1e6",
            "--num-chans",
            "8",
        ])
        .ok();
    assert!(cmd.is_ok(), "{:?}", get_cmd_output(cmd));
    let (stdout, stderr) = get_cmd_output(cmd);
    assert!(stderr.is_empty(), "{stderr}");
    assert!(stdout.contains("averageSmooth"), "{stdout}");
    assert!(stdout.contains("Output channels: 4"), "{stdout}");
    assert!(stdout.contains("channels: 0-3"), "{stdout}");
}

#[test]
fn test_dry_run() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "config.toml", CONFIG);
    let cmd = viscal()
        .args([
            "plan",
            &config,
            "--first-freq",
            "100e6",
            "--freq-res",
            "1e6",
            "--num-chans",
            "8",
            "--dry-run",
        ])
        .ok();
    assert!(cmd.is_ok(), "{:?}", get_cmd_output(cmd));
    let (stdout, _) = get_cmd_output(cmd);
    assert!(stdout.contains("Dry run"), "{stdout}");
    assert!(!stdout.contains("Output channels"), "{stdout}");
}

#[test]
fn test_save_toml() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "config.json", r#"{"apply": {"direction": "Corrupt"}}"#);
    let saved = dir.path().join("saved.toml");
    let cmd = viscal()
        .args([
            "plan",
            &config,
            "--first-freq",
            "100e6",
            "--freq-res",
            "1e6",
            "--num-chans",
            "8",
            "--save-toml",
            &saved.display().to_string(),
        ])
        .ok();
    assert!(cmd.is_ok(), "{:?}", get_cmd_output(cmd));

    let original = ViscalConfig::from_file(&config).unwrap();
    let round_tripped = ViscalConfig::from_file(&saved).unwrap();
    assert_eq!(original, round_tripped);
}

#[test]
fn test_bad_inputs() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "config.yaml", "transform: {}");
    let cmd = viscal()
        .args([
            "plan",
            &config,
            "--first-freq",
            "100e6",
            "--freq-res",
            "1e6",
            "--num-chans",
            "8",
        ])
        .ok();
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.contains("recognised file extension"), "{stderr}");

    let config = write_config(&dir, "config.toml", CONFIG);
    let cmd = viscal()
        .args([
            "plan",
            &config,
            "--first-freq",
            "100e6",
            "--freq-res",
            "1e6",
            "--num-chans",
            "0",
        ])
        .ok();
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.contains("at least 1"), "{stderr}");
}
