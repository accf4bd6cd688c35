use std::path::Path;
use std::process::Command;

use cardreel::model::{Choice, DecisionCard};
use cardreel::pipeline::{GenerateRequest, generate};
use cardreel::text::TextEngine;

fn ffmpeg_tools_available() -> bool {
    let probe = |bin: &str| {
        Command::new(bin)
            .arg("-version")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    };
    probe("ffmpeg") && probe("ffprobe")
}

fn font_available() -> bool {
    TextEngine::from_system_font(None).is_ok()
}

fn pet_card() -> DecisionCard {
    DecisionCard {
        category: "Pets".into(),
        title: "What pet should I get?".into(),
        description: "Apartment living, away 9 hours a day".into(),
        choices: vec![
            Choice::from_free_text("Dog", "Loyal\nGets you outside", "Needs walks\nVet bills"),
            Choice::from_free_text("Cat", "Independent\nQuiet", "Sheds everywhere"),
        ],
    }
}

fn synth_media(root: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(root)?;

    let video_path = root.join("bg.mp4");
    let status = Command::new("ffmpeg")
        .args([
            "-v",
            "error",
            "-y",
            "-f",
            "lavfi",
            "-i",
            "testsrc=size=64x64:rate=24",
            "-t",
            "1",
            "-pix_fmt",
            "yuv420p",
            "-c:v",
            "libx264",
        ])
        .arg(&video_path)
        .status()?;
    anyhow::ensure!(status.success(), "ffmpeg failed creating bg.mp4");

    let wav_path = root.join("tone.wav");
    let status = Command::new("ffmpeg")
        .args([
            "-v",
            "error",
            "-y",
            "-f",
            "lavfi",
            "-i",
            "sine=frequency=220:sample_rate=48000",
            "-t",
            "1",
            "-c:a",
            "pcm_s16le",
        ])
        .arg(&wav_path)
        .status()?;
    anyhow::ensure!(status.success(), "ffmpeg failed creating tone.wav");

    Ok(())
}

fn probed_duration_sec(path: &Path) -> f64 {
    let out = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "csv=p=0",
        ])
        .arg(path)
        .output()
        .unwrap();
    assert!(out.status.success());
    String::from_utf8_lossy(&out.stdout).trim().parse().unwrap()
}

fn probed_dimensions(path: &Path) -> (u32, u32) {
    let out = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height",
            "-of",
            "csv=p=0",
        ])
        .arg(path)
        .output()
        .unwrap();
    assert!(out.status.success());
    let text = String::from_utf8_lossy(&out.stdout);
    let mut parts = text.trim().split(',');
    (
        parts.next().unwrap().parse().unwrap(),
        parts.next().unwrap().parse().unwrap(),
    )
}

#[test]
fn two_choice_card_produces_a_three_second_vertical_video() {
    if !ffmpeg_tools_available() || !font_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("pet.mp4");

    let mut request = GenerateRequest::new(pet_card(), &out);
    request.caption = Some("Help me decide!".into());
    generate(&request).unwrap();

    assert!(out.exists());
    let duration = probed_duration_sec(&out);
    assert!(
        (duration - 3.0).abs() < 0.2,
        "expected ~3.0s, got {duration}"
    );
    assert_eq!(probed_dimensions(&out), (1080, 1920));
}

#[test]
fn background_video_and_audio_are_muxed_in() {
    if !ffmpeg_tools_available() || !font_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    synth_media(dir.path()).unwrap();
    let out = dir.path().join("pet_full.mp4");

    let mut request = GenerateRequest::new(pet_card(), &out);
    request.audio_path = Some(dir.path().join("tone.wav"));
    request.bg_video_path = Some(dir.path().join("bg.mp4"));
    generate(&request).unwrap();

    assert!(out.exists());
    let duration = probed_duration_sec(&out);
    assert!(
        (duration - 3.0).abs() < 0.2,
        "expected ~3.0s, got {duration}"
    );

    // The tone must have survived as an AAC stream.
    let probe = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "a:0",
            "-show_entries",
            "stream=codec_name",
            "-of",
            "csv=p=0",
        ])
        .arg(&out)
        .output()
        .unwrap();
    assert_eq!(String::from_utf8_lossy(&probe.stdout).trim(), "aac");
}

#[test]
fn missing_background_video_falls_back_to_solid() {
    if !ffmpeg_tools_available() || !font_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("pet_fallback.mp4");

    let mut request = GenerateRequest::new(pet_card(), &out);
    request.bg_video_path = Some(dir.path().join("does_not_exist.mp4"));
    generate(&request).unwrap();

    assert!(out.exists());
}

#[test]
fn empty_choice_name_is_rejected_before_any_output() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("never.mp4");

    let card = DecisionCard {
        category: "Pets".into(),
        title: "t".into(),
        description: "d".into(),
        choices: vec![Choice::from_free_text("   ", "", "")],
    };
    let err = generate(&GenerateRequest::new(card, &out)).unwrap_err();
    assert!(err.to_string().contains("validation"));
    assert!(!out.exists());
}
