//! Termination signals stop the binary cleanly
//!
//! Run with: cargo test --test signals
#![cfg(unix)]

use crabmotion::recording::inspect_avi;
use crabmotion::testing::frame_with_block;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::tempdir;

const FRAMES: u32 = 300;

fn write_moving_frames(dir: &Path) {
    std::fs::create_dir_all(dir).unwrap();
    for n in 0..FRAMES {
        let x = if n % 2 == 0 { 0 } else { 40 };
        frame_with_block(64, 48, 10, 240, (x, 12, 24, 24))
            .to_rgb_image()
            .unwrap()
            .save(dir.join(format!("frame_{:04}.png", n)))
            .unwrap();
    }
}

fn stop_mid_recording(signal: &str) {
    let dir = tempdir().unwrap();
    write_moving_frames(&dir.path().join("frames"));

    let mut child = Command::new(env!("CARGO_BIN_EXE_crabmotion"))
        .current_dir(dir.path())
        .args(["--replay", "frames", "--pace", "--fps", "30"])
        .args(["-t", "1000", "-o", "out", "--no-preview"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    let segment = dir.path().join("out").join("recording_0000.avi");
    let deadline = Instant::now() + Duration::from_secs(10);
    while !segment.exists() {
        assert!(Instant::now() < deadline, "recording never started");
        thread::sleep(Duration::from_millis(20));
    }
    thread::sleep(Duration::from_millis(300));

    let sent = Command::new("kill")
        .args([signal, &child.id().to_string()])
        .status()
        .unwrap();
    assert!(sent.success());

    let status = child.wait().unwrap();
    assert!(status.success(), "exited with {:?}", status);

    let info = inspect_avi(&segment).unwrap();
    assert!(info.total_frames > 0);
    assert!(info.total_frames < FRAMES);
    assert_eq!(info.indexed_frames, info.total_frames);
    assert!(info.riff_consistent);
}

#[test]
fn sigterm_finalizes_open_segment() {
    stop_mid_recording("-TERM");
}

#[test]
fn sigint_finalizes_open_segment() {
    stop_mid_recording("-INT");
}
