//! Integration Tests
//!
//! End-to-end properties of the Phantom Words engine, clocked by pulling
//! frames through `OfflineOutput`.

use std::time::Duration;

use approx::assert_relative_eq;
use phantom_words::cli::{commands, SessionArgs};
use phantom_words::engine::io::{encode_wav, generate_dc, generate_test_tone, BitDepth};
use phantom_words::engine::{
    AudioClip, AudioDecoder, ChannelAssignment, GraphBuilder, OfflineOutput, PlaybackController,
    PlaybackParameters, PlaybackState, TrackMode, TrackSlot,
};
use phantom_words::error::{BuildError, PhantomError};
use test_case::test_case;

const RATE: u32 = 1000;

/// Constant-level clip, `frames` long at `RATE`
fn dc_clip(level: f32, frames: usize) -> AudioClip {
    AudioClip::new("dc.wav", vec![0u8], generate_dc(level, frames, RATE))
}

fn offline_controller(rate: u32) -> (PlaybackController, OfflineOutput) {
    let output = OfflineOutput::new(rate, 2);
    let controller = PlaybackController::new(Box::new(output.clone())).with_random_channels(false);
    (controller, output)
}

/// Pull one frame at a time until the controller stops; returns frames pulled
fn frames_until_stopped(controller: &mut PlaybackController, output: &OfflineOutput) -> u64 {
    let mut frames = 0;
    while controller.state() != PlaybackState::Stopped {
        assert!(frames < 1_000_000, "session never completed");
        output.render(1);
        frames += 1;
        controller.process_events();
    }
    frames
}

// === Delay Tests ===

#[test_case(0, 1.0, 1.0 ; "no delay")]
#[test_case(10, 1.0, 1.0 ; "short delay")]
#[test_case(200, 2.0, 0.5 ; "default delay, mixed speeds")]
#[test_case(350, 0.5, 2.0 ; "long delay, inverted speeds")]
#[test_case(500, 1.7, 1.3 ; "max delay, odd speeds")]
fn test_track2_starts_exactly_delay_after_track1(delay_ms: u32, speed1: f32, speed2: f32) {
    let one = dc_clip(0.25, 2000);
    let two = dc_clip(0.75, 2000);
    let params = PlaybackParameters::new(delay_ms, 1, TrackMode::Dual, speed1, speed2).unwrap();

    let graph = GraphBuilder::build(
        Some(&one),
        Some(&two),
        &params,
        ChannelAssignment::Track1Left,
    )
    .unwrap();
    assert_eq!(graph.start_offset(TrackSlot::One), Some(Duration::ZERO));
    assert_eq!(
        graph.start_offset(TrackSlot::Two),
        Some(Duration::from_millis(delay_ms as u64))
    );

    // At 1 kHz output one frame is one millisecond
    let (mut controller, output) = offline_controller(RATE);
    controller.play(Some(&one), Some(&two), params).unwrap();
    let frames = output.render(600);

    let left: Vec<f32> = frames.iter().step_by(2).copied().collect();
    let right: Vec<f32> = frames.iter().skip(1).step_by(2).copied().collect();

    assert_relative_eq!(left[0], 0.25);
    let first_audible = right.iter().position(|&s| s != 0.0).unwrap();
    assert_eq!(first_audible, delay_ms as usize);
}

// === Loop Completion Tests ===

#[test_case(1, 0, 1.0, 1.0 ; "single loop")]
#[test_case(3, 100, 1.0, 1.0 ; "equal speeds with delay")]
#[test_case(4, 50, 2.0, 0.5 ; "track 2 finishes last")]
#[test_case(5, 0, 0.5, 2.0 ; "track 1 finishes last")]
#[test_case(100, 500, 1.0, 2.0 ; "max loops")]
fn test_session_stops_when_both_tracks_finish(loops: u32, delay_ms: u32, speed1: f32, speed2: f32) {
    let one = dc_clip(0.5, 40);
    let two = dc_clip(0.5, 40);
    let params = PlaybackParameters::new(delay_ms, loops, TrackMode::Dual, speed1, speed2).unwrap();

    let track1_frames = (40.0 / speed1) as u64 * loops as u64;
    let track2_frames = delay_ms as u64 + (40.0 / speed2) as u64 * loops as u64;
    let expected = track1_frames.max(track2_frames);

    let (mut controller, output) = offline_controller(RATE);
    controller.play(Some(&one), Some(&two), params).unwrap();

    assert_eq!(frames_until_stopped(&mut controller, &output), expected);
    assert!(controller.session().unwrap().graph().is_none());
}

#[test]
fn test_finish_time_matches_rendered_length() {
    let one = dc_clip(0.5, 300);
    let two = dc_clip(0.5, 500);
    let params = PlaybackParameters::new(120, 2, TrackMode::Dual, 1.5, 1.25).unwrap();

    let (mut controller, output) = offline_controller(RATE);
    controller.play(Some(&one), Some(&two), params).unwrap();
    let finish = controller.session().unwrap().graph().unwrap().finish_time();

    let frames = frames_until_stopped(&mut controller, &output);
    assert!((frames as f64 - finish.as_secs_f64() * RATE as f64).abs() <= 1.0);
}

// === Stop Tests ===

#[derive(Debug, Clone, Copy)]
enum Reach {
    Idle,
    Scheduled,
    Playing,
    Stopped,
}

#[test_case(Reach::Idle ; "from idle")]
#[test_case(Reach::Scheduled ; "from scheduled")]
#[test_case(Reach::Playing ; "from playing")]
#[test_case(Reach::Stopped ; "from stopped")]
fn test_stop_is_idempotent(reach: Reach) {
    let clip = dc_clip(0.5, 100);
    let params = PlaybackParameters::new(0, 1, TrackMode::Single, 1.0, 1.0).unwrap();
    let (mut controller, output) = offline_controller(RATE);

    match reach {
        Reach::Idle => {}
        Reach::Scheduled => {
            controller.play(Some(&clip), None, params).unwrap();
        }
        Reach::Playing => {
            controller.play(Some(&clip), None, params).unwrap();
            output.render(1);
            controller.process_events();
            assert_eq!(controller.state(), PlaybackState::Playing);
        }
        Reach::Stopped => {
            controller.play(Some(&clip), None, params).unwrap();
            frames_until_stopped(&mut controller, &output);
        }
    }

    controller.stop();
    assert_eq!(controller.state(), PlaybackState::Stopped);
    assert!(controller.session().map_or(true, |s| s.graph().is_none()));
    let after_once = controller.drain_transitions();

    controller.stop();
    assert_eq!(controller.state(), PlaybackState::Stopped);
    assert!(controller.drain_transitions().is_empty());
    assert!(!after_once.is_empty() || matches!(reach, Reach::Stopped));
    assert!(output.render(8).iter().all(|&s| s == 0.0));
}

// === Track Mode Tests ===

#[test]
fn test_mode_switch_toggles_track2_requirement() {
    let one = dc_clip(0.5, 100);
    let dual = PlaybackParameters::default();
    let single = dual.with_track_mode(TrackMode::Single);
    let (mut controller, _output) = offline_controller(RATE);

    assert!(matches!(
        controller.play(Some(&one), None, dual),
        Err(PhantomError::Build(BuildError::MissingTrack {
            slot: TrackSlot::Two
        }))
    ));
    assert_eq!(controller.state(), PlaybackState::Idle);

    assert!(controller.play(Some(&one), None, single).is_ok());
    controller.stop();

    assert!(controller.play(Some(&one), None, dual).is_err());
    assert_eq!(controller.state(), PlaybackState::Stopped);
}

#[test]
fn test_single_mode_plays_on_both_channels() {
    let one = dc_clip(0.5, 100);
    let params = PlaybackParameters::new(300, 1, TrackMode::Single, 1.0, 1.0).unwrap();
    let (mut controller, output) = offline_controller(RATE);

    controller.play(Some(&one), None, params).unwrap();
    let frames = output.render(4);
    assert_eq!(frames, vec![0.5; 8]);
}

// === Decode Round Trip Tests ===

#[test_case(BitDepth::Int16, 8000, 1.5 ; "16-bit 8k")]
#[test_case(BitDepth::Int24, 44100, 0.75 ; "24-bit 44.1k")]
#[test_case(BitDepth::Float32, 48000, 2.0 ; "float 48k")]
fn test_reencoded_clip_keeps_duration(depth: BitDepth, rate: u32, secs: f32) {
    let original = generate_test_tone(330.0, secs, rate);
    let bytes = encode_wav(&original, depth).unwrap();

    let clip = AudioDecoder::for_slot(TrackSlot::One)
        .decode(bytes, "tone.wav")
        .unwrap();

    assert_eq!(clip.sample_rate(), rate);
    assert_relative_eq!(clip.duration_seconds(), original.duration_secs(), epsilon = 1e-3);
}

// === CLI Render Tests ===

#[test]
fn test_render_command_writes_full_session() {
    let dir = tempfile::tempdir().unwrap();
    let track1 = dir.path().join("one.wav");
    let track2 = dir.path().join("two.wav");
    let out = dir.path().join("out.wav");

    std::fs::write(
        &track1,
        encode_wav(&generate_test_tone(220.0, 0.5, 8000), BitDepth::Int16).unwrap(),
    )
    .unwrap();
    std::fs::write(
        &track2,
        encode_wav(&generate_test_tone(330.0, 0.5, 8000), BitDepth::Int16).unwrap(),
    )
    .unwrap();

    let args = SessionArgs {
        track1,
        track2: Some(track2),
        mode: Some(TrackMode::Dual),
        delay: Some(250),
        loops: Some(2),
        speed1: Some(1.0),
        speed2: Some(1.0),
        config: None,
    };
    commands::render(&args, &out, 8000).unwrap();

    let reader = hound::WavReader::open(&out).unwrap();
    assert_eq!(reader.spec().channels, 2);
    assert_eq!(reader.spec().sample_rate, 8000);

    // 0.25s + 2 * 0.5s, rounded up to a whole render block
    let secs = reader.duration() as f64 / 8000.0;
    assert!(secs >= 1.25 && secs < 1.25 + 1024.0 / 8000.0, "got {}s", secs);
}

#[test]
fn test_render_command_rejects_missing_track2() {
    let dir = tempfile::tempdir().unwrap();
    let track1 = dir.path().join("one.wav");
    std::fs::write(
        &track1,
        encode_wav(&generate_test_tone(220.0, 0.2, 8000), BitDepth::Int16).unwrap(),
    )
    .unwrap();

    let args = SessionArgs {
        track1,
        track2: None,
        mode: Some(TrackMode::Dual),
        delay: None,
        loops: Some(1),
        speed1: None,
        speed2: None,
        config: None,
    };

    assert!(commands::render(&args, &dir.path().join("out.wav"), 8000).is_err());
}
