// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use assert_cmd::Command;
use predicates::prelude::*;
use std::time::Duration;
use tempfile::tempdir;

fn mandel() -> Command {
    Command::cargo_bin("mandel").unwrap()
}

#[test]
fn renders_the_overview_to_a_png() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("overview.png");
    mandel()
        .args(&["--size", "64x48", "--iterations", "128", "--threads", "1"])
        .arg("--output")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("float"));

    let image = image::open(&output).unwrap().to_rgba8();
    assert_eq!(image.dimensions(), (64, 48));
    // The middle of the overview is inside the set.
    assert_eq!(image.get_pixel(32, 24).0, [0, 0, 0, 255]);
    assert_ne!(image.get_pixel(0, 0).0, [0, 0, 0, 255]);
}

#[test]
fn deep_zooms_switch_tiers() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("deep.png");
    mandel()
        .args(&["--size", "16x16", "--iterations", "64", "--threads", "1"])
        .args(&["--center", "-0.743643887037158704752191506114774,0.131825904205311970493132056385139"])
        .args(&["--screen-size", "1e-20"])
        .arg("--output")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("doubledouble<double>"));
    assert!(output.exists());
}

#[test]
fn a_forced_tier_is_honoured() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("forced.png");
    mandel()
        .args(&["--size", "16x8", "--iterations", "32", "--precision", "big128"])
        .arg("--output")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("bigfixed<128>"));
}

#[test]
fn zoom_steps_keep_the_picture_centred() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("zoomed.png");
    mandel()
        .args(&["--size", "32x32", "--iterations", "64", "--zoom", "10"])
        .arg("--output")
        .arg(&output)
        .assert()
        .success();
    let image = image::open(&output).unwrap().to_rgba8();
    assert_eq!(image.get_pixel(16, 16).0, [0, 0, 0, 255]);
}

#[test]
fn unknown_tiers_are_rejected() {
    let dir = tempdir().unwrap();
    mandel()
        .args(&["--precision", "quad", "--output"])
        .arg(dir.path().join("never.png"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown precision tier"));
}

#[test]
fn empty_images_are_rejected() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("empty.png");
    mandel()
        .args(&["--size", "0x10", "--output"])
        .arg(&output)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid output dimensions"));
    assert!(!output.exists());
}

#[test]
fn far_away_centers_fail_promptly() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("far.png");
    mandel()
        .args(&["--size", "4x4", "--threads", "1"])
        .args(&["--center", "1e400,0", "--screen-size", "1e-20"])
        .arg("--output")
        .arg(&output)
        .timeout(Duration::from_secs(30))
        .assert()
        .failure()
        .stderr(predicate::str::contains("outside the renderable range"));
    assert!(!output.exists());
}

#[test]
fn panning_moves_the_center_off_the_set() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("panned.png");
    mandel()
        .args(&["--size", "32x32", "--iterations", "64", "--pan", "0.5,0"])
        .arg("--output")
        .arg(&output)
        .assert()
        .success();
    let image = image::open(&output).unwrap().to_rgba8();
    // The center is now at 0.4, right of the cardioid's cusp.
    assert_ne!(image.get_pixel(16, 16).0, [0, 0, 0, 255]);
}

#[test]
fn an_output_file_is_required() {
    mandel().assert().failure();
}

#[test]
fn the_benchmark_reports_each_requested_tier() {
    Command::cargo_bin("tierbench")
        .unwrap()
        .args(&["--duration", "1", "f32", "f64"])
        .assert()
        .success()
        .stdout(predicate::str::contains("float").and(predicate::str::contains("double")));
}
