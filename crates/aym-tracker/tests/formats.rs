//! Decoding synthetic module images end to end.

use aym_tracker::{detect, ErrorKind, FrameStatus, LoopMode, RenderParams, Renderer, TrackerFormat};

fn put_u16(data: &mut [u8], offset: usize, value: usize) {
    data[offset..offset + 2].copy_from_slice(&(value as u16).to_le_bytes());
}

/// PT2 image: one position, one 5-row pattern, sample 1 (levels 15, 8), ornament 0.
///
/// `channels` holds the three channel streams in file order: channel 1,
/// channel 2, then channel 0, so channel 0 may run to the end of the file.
fn pt2_image(channel0: &[u8], tail: bool) -> Vec<u8> {
    const PATTERNS: usize = 0x85;
    let mut data = vec![0u8; PATTERNS + 6];
    data[0] = 3;
    data[1] = 1;
    data[2] = 0;
    put_u16(&mut data, 0x63, PATTERNS);
    data[0x65..0x83].copy_from_slice(b"Synthetic tune                ");
    data[0x83] = 0;
    data[0x84] = 0xff;

    let ch1 = data.len();
    data.extend_from_slice(&[0x24, 0xe0]);
    let ch2 = data.len();
    data.extend_from_slice(&[0x24, 0xe0]);
    let ch0 = data.len();
    data.extend_from_slice(channel0);
    put_u16(&mut data, PATTERNS, ch0);
    put_u16(&mut data, PATTERNS + 2, ch1);
    put_u16(&mut data, PATTERNS + 4, ch2);

    if tail {
        let sample = data.len();
        data.extend_from_slice(&[2, 0, 0x01, 0xf0, 0x00, 0x01, 0x80, 0x00]);
        let ornament = data.len();
        data.extend_from_slice(&[1, 0, 0]);
        put_u16(&mut data, 0x03 + 2, sample);
        put_u16(&mut data, 0x43, ornament);
    } else {
        put_u16(&mut data, 0x03 + 2, 0x3000);
        put_u16(&mut data, 0x43, 0x3000);
    }
    data
}

/// STC image with one 5-row pattern. `channel1` lets tests select extra samples.
fn stc_image(channel1: &[u8]) -> Vec<u8> {
    let mut data = vec![0u8; 0x1b];
    data[0] = 3;
    data[7..25].copy_from_slice(b"MY STC TUNE       ");

    // sample 1: 32 lines at level 15, noise masked, no loop
    data.push(1);
    for _ in 0..32 {
        data.extend_from_slice(&[0x0f, 0x80, 0x00]);
    }
    data.extend_from_slice(&[0, 0]);

    let positions = data.len();
    data.extend_from_slice(&[0, 1, 0]);
    let ornaments = data.len();
    data.push(0);
    data.extend_from_slice(&[0; 32]);
    let patterns = data.len();
    data.extend_from_slice(&[1, 0, 0, 0, 0, 0, 0, 0]);

    let ch0 = data.len();
    data.extend_from_slice(&[0xa5, 0x61, 0x0c, 0xff]);
    let ch1 = data.len();
    data.extend_from_slice(channel1);
    let ch2 = data.len();
    data.extend_from_slice(&[0xa5, 0x80]);

    put_u16(&mut data, 1, positions);
    put_u16(&mut data, 3, ornaments);
    put_u16(&mut data, 5, patterns);
    put_u16(&mut data, patterns + 1, ch0);
    put_u16(&mut data, patterns + 3, ch1);
    put_u16(&mut data, patterns + 5, ch2);
    let size = data.len();
    put_u16(&mut data, 25, size);
    data
}

/// ST3 image: one transposed position, sample 0 (level 15), ornament 0.
fn st3_image(sample_opcode: u8, transposition: i8) -> Vec<u8> {
    st3_image_with(&[0xa5, sample_opcode, 0x0c, 0xff], transposition, [0, 0, 0x8f, 0])
}

/// ST3 image with channel 0 stream `channel0` and every sample line set to `sample_line`.
fn st3_image_with(channel0: &[u8], transposition: i8, sample_line: [u8; 4]) -> Vec<u8> {
    let mut data = vec![0u8; 9];
    data[0] = 3;
    let positions = data.len();
    data.extend_from_slice(&[1, transposition as u8, 0]);
    let samples = data.len();
    data.extend_from_slice(&[1, 0, 0]);
    let ornaments = data.len();
    data.extend_from_slice(&[1, 0, 0]);
    let patterns = data.len();
    data.extend_from_slice(&[0; 6]);

    let ch0 = data.len();
    data.extend_from_slice(channel0);
    let ch1 = data.len();
    data.extend_from_slice(&[0xa5, 0x80]);
    let ch2 = data.len();
    data.extend_from_slice(&[0xa5, 0x80]);

    let sample = data.len();
    data.extend_from_slice(&[0, 0]);
    for _ in 0..32 {
        data.extend_from_slice(&sample_line);
    }
    let ornament = data.len();
    data.extend_from_slice(&[0; 32]);
    data.resize(0x180, 0);

    put_u16(&mut data, 1, positions);
    put_u16(&mut data, 3, samples);
    put_u16(&mut data, 5, ornaments);
    put_u16(&mut data, 7, patterns);
    put_u16(&mut data, samples + 1, sample);
    put_u16(&mut data, ornaments + 1, ornament);
    put_u16(&mut data, patterns, ch0);
    put_u16(&mut data, patterns + 2, ch1);
    put_u16(&mut data, patterns + 4, ch2);
    data
}

#[test]
fn pt2_image_is_detected_and_rendered() -> anyhow::Result<()> {
    let data = pt2_image(&[0x24, 0xe1, 0x8c, 0x00], true);
    let detected = detect(&data)?;
    assert_eq!(detected.format, TrackerFormat::ProTracker2);
    let module = &detected.module;
    assert_eq!(module.info().title, "Synthetic tune");
    assert_eq!(module.info().program, "Pro Tracker v2.x");
    assert_eq!(module.pattern(0).map(|p| p.size), Some(5));
    assert_eq!(module.stats().frames, 15);
    assert_eq!(detected.report.frames, 15);

    let mut renderer = Renderer::new(module.clone(), RenderParams::default());
    let levels: Vec<u8> = (0..4)
        .map(|_| renderer.render().chunk.level(0).unwrap_or(0))
        .collect();
    assert_eq!(levels, vec![15, 8, 15, 8]);

    let first = Renderer::new(module.clone(), RenderParams::default()).render();
    assert_eq!(first.chunk.tone(0), Some(module.frequency_table().period(12)));
    assert_eq!(first.chunk.level(1), Some(0));
    Ok(())
}

#[test]
fn truncated_pt2_pattern_is_malformed() {
    // glissando-to-note with its word operand cut off by the end of the file
    let data = pt2_image(&[0x24, 0x0d, 0x02], false);
    let err = TrackerFormat::ProTracker2.decode(&data).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedData);
    assert!(matches!(detect(&data), Err(aym_tracker::TrackerError::Unrecognized)));
}

#[test]
fn stc_image_is_detected() -> anyhow::Result<()> {
    let data = stc_image(&[0xa5, 0x80]);
    let detected = detect(&data)?;
    assert_eq!(detected.format, TrackerFormat::SoundTrackerCompiled);
    assert_eq!(detected.module.info().title, "MY STC TUNE");
    assert_eq!(detected.module.stats().frames, 15);

    let mut renderer = Renderer::new(detected.module.clone(), RenderParams::default());
    let frame = renderer.render();
    assert_eq!(frame.chunk.level(0), Some(15));
    assert_eq!(
        frame.chunk.tone(0),
        Some(detected.module.frequency_table().period(12))
    );
    assert!(!frame.chunk.mixer().is_noise_enabled(0));
    Ok(())
}

#[test]
fn stc_missing_sample_becomes_stub() -> anyhow::Result<()> {
    let data = stc_image(&[0xa5, 0x62, 0x0c]);
    let module = TrackerFormat::SoundTrackerCompiled.decode(&data)?;
    assert!(module.has_sample(2));
    assert_eq!(module.sample(2).size(), 0);
    Ok(())
}

#[test]
fn st3_image_is_detected_with_transposition() -> anyhow::Result<()> {
    let data = st3_image(0x60, 2);
    let detected = detect(&data)?;
    assert_eq!(detected.format, TrackerFormat::SoundTracker3);
    assert_eq!(detected.module.positions()[0].transposition, 2);

    let params = RenderParams {
        loop_mode: LoopMode::None,
        ..RenderParams::default()
    };
    let mut renderer = Renderer::new(detected.module.clone(), params);
    let frame = renderer.render();
    assert_eq!(
        frame.chunk.tone(0),
        Some(detected.module.frequency_table().period(14))
    );
    let mut status = frame.status;
    let mut frames = 1;
    while status != FrameStatus::Finished {
        status = renderer.render().status;
        frames += 1;
    }
    assert_eq!(frames, 15);
    Ok(())
}

#[test]
fn st3_undeclared_sample_is_rejected() {
    let data = st3_image(0x63, 0);
    let err = TrackerFormat::SoundTracker3.decode(&data).unwrap_err();
    assert!(matches!(
        err,
        aym_tracker::TrackerError::UnsupportedReference { kind: "sample", index: 3, .. }
    ));
    assert_eq!(err.kind(), ErrorKind::MalformedData);
}

#[test]
fn st3_without_notes_is_not_st3() {
    let data = st3_image_with(&[0xa5, 0x60, 0x80, 0xff], 0, [0, 0, 0x8f, 0]);
    let err = TrackerFormat::SoundTracker3.decode(&data).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FormatMismatch);
    assert!(err.to_string().contains("no notes"), "{err}");
}

#[test]
fn st3_with_silent_samples_is_not_st3() {
    // level 0, noise masked: nothing can sound
    let data = st3_image_with(&[0xa5, 0x60, 0x0c, 0xff], 0, [0, 0, 0x80, 0]);
    let err = TrackerFormat::SoundTracker3.decode(&data).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FormatMismatch);
    assert!(err.to_string().contains("audible"), "{err}");
}

#[test]
fn st3_misaligned_sample_table_is_not_st3() {
    let mut data = st3_image(0x60, 0);
    let samples = usize::from(u16::from_le_bytes([data[3], data[4]]));
    let first = u16::from_le_bytes([data[samples + 1], data[samples + 2]]);
    // second entry 2 bytes after the first cannot start a 130-byte record
    let mut table = vec![2u8];
    table.extend_from_slice(&first.to_le_bytes());
    table.extend_from_slice(&(first + 2).to_le_bytes());
    data.extend_from_slice(&table);
    let moved = data.len() - table.len();
    data[3..5].copy_from_slice(&(moved as u16).to_le_bytes());
    let err = TrackerFormat::SoundTracker3.decode(&data).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FormatMismatch);
}

/// Count frames until the renderer reports the end of the tune.
fn frames_until_finished(renderer: &mut Renderer) -> usize {
    let mut frames = 1;
    while renderer.render().status != FrameStatus::Finished {
        frames += 1;
    }
    frames
}

/// PT1 image: one position, one 5-row pattern, sample 0 (levels 15, 8).
fn pt1_image() -> Vec<u8> {
    const PATTERNS: usize = 0x65;
    let mut data = vec![0u8; PATTERNS + 6];
    data[0] = 3;
    data[1] = 1;
    data[2] = 0;
    put_u16(&mut data, 0x43, PATTERNS);
    data[0x45..0x63].copy_from_slice(b"Synthetic PT1 tune            ");
    data[0x63] = 0;
    data[0x64] = 0xff;

    let ch0 = data.len();
    data.extend_from_slice(&[0xb5, 0x0c, 0xff]);
    let ch1 = data.len();
    data.extend_from_slice(&[0xb5, 0x80]);
    let ch2 = data.len();
    data.extend_from_slice(&[0xb5, 0x80]);
    put_u16(&mut data, PATTERNS, ch0);
    put_u16(&mut data, PATTERNS + 2, ch1);
    put_u16(&mut data, PATTERNS + 4, ch2);

    let sample = data.len();
    data.extend_from_slice(&[2, 0, 0x0f, 0x80, 0x00, 0x08, 0x80, 0x00]);
    put_u16(&mut data, 0x03, sample);
    data
}

/// STP image: tables at the end, sample 0 with two level-15 steps and no loop.
fn stp_image() -> Vec<u8> {
    const POSITIONS: usize = 128;
    const PATTERNS: usize = 132;
    const ORNAMENTS: usize = 138;
    const SAMPLES: usize = 170;
    let mut data = vec![0u8; 200];
    data[0] = 3;
    put_u16(&mut data, 1, POSITIONS);
    put_u16(&mut data, 3, PATTERNS);
    put_u16(&mut data, 5, ORNAMENTS);
    put_u16(&mut data, 7, SAMPLES);

    // pattern data right after the 10-byte header
    data[10..14].copy_from_slice(&[0x84, 0x61, 0x0d, 0x00]);
    data[14..16].copy_from_slice(&[0x84, 0xd0]);
    data[16..18].copy_from_slice(&[0x84, 0xd0]);
    // sample 0: no loop, two steps
    data[21..31].copy_from_slice(&[0xff, 2, 0x8f, 0, 0, 0, 0x8f, 0, 0, 0]);

    data[POSITIONS..POSITIONS + 4].copy_from_slice(&[1, 0, 0, 0]);
    put_u16(&mut data, PATTERNS, 10);
    put_u16(&mut data, PATTERNS + 2, 14);
    put_u16(&mut data, PATTERNS + 4, 16);
    put_u16(&mut data, SAMPLES, 21);
    data
}

/// Uncompiled ST image: sample 1 at level 15, one note in a 32-row pattern.
fn st_image() -> Vec<u8> {
    let mut data = vec![0u8; 3585];
    data[..32].fill(15);
    data[32..64].fill(0x80);
    for entry in data[1950..2462].chunks_exact_mut(2) {
        entry[0] = 1;
    }
    data[2462] = 0;
    data[3007] = 3;
    data[3008] = 0x20;
    data[3009..3012].copy_from_slice(&[0x31, 0x10, 0x00]);
    data
}

#[test]
fn pt1_image_is_detected_and_rendered() -> anyhow::Result<()> {
    let detected = detect(&pt1_image())?;
    assert_eq!(detected.format, TrackerFormat::ProTracker1);
    let module = &detected.module;
    assert_eq!(module.info().title, "Synthetic PT1 tune");
    assert_eq!(module.info().program, "Pro Tracker v1.x");
    assert_eq!(module.stats().frames, 15);

    let mut renderer = Renderer::new(module.clone(), RenderParams::default());
    let frames: Vec<_> = (0..4).map(|_| renderer.render().chunk).collect();
    let levels: Vec<u8> = frames.iter().map(|c| c.level(0).unwrap_or(0)).collect();
    assert_eq!(levels, vec![15, 8, 15, 8]);
    assert_eq!(frames[0].tone(0), Some(module.frequency_table().period(12)));
    assert!(!frames[0].mixer().is_noise_enabled(0));
    Ok(())
}

#[test]
fn stp_image_is_detected_and_rendered() -> anyhow::Result<()> {
    let detected = detect(&stp_image())?;
    assert_eq!(detected.format, TrackerFormat::SoundTrackerPro);
    let module = &detected.module;
    assert_eq!(module.info().program, "Sound Tracker Pro");
    assert_eq!(module.stats().frames, 15);

    let params = RenderParams {
        loop_mode: LoopMode::None,
        ..RenderParams::default()
    };
    let mut renderer = Renderer::new(module.clone(), params);
    let frames: Vec<_> = (0..3).map(|_| renderer.render().chunk).collect();
    assert_eq!(frames[0].level(0), Some(15));
    assert_eq!(frames[0].tone(0), Some(module.frequency_table().period(12)));
    assert_eq!(frames[1].level(0), Some(15));
    // unlooped sample ran out
    assert_eq!(frames[2].level(0), Some(0));
    assert_eq!(frames_until_finished(&mut renderer) + 3, 15);
    Ok(())
}

#[test]
fn stp_ornaments_table_must_fit() {
    let mut data = stp_image();
    // ornaments table now 30 bytes long
    put_u16(&mut data, 5, 140);
    let err = TrackerFormat::SoundTrackerPro.decode(&data).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FormatMismatch);
}

#[test]
fn st_image_is_detected_and_rendered() -> anyhow::Result<()> {
    let detected = detect(&st_image())?;
    assert_eq!(detected.format, TrackerFormat::SoundTracker);
    let module = &detected.module;
    assert_eq!(module.info().program, "Sound Tracker");
    assert_eq!(module.pattern(0).map(|p| p.size), Some(32));
    assert_eq!(module.stats().frames, 96);

    let mut renderer = Renderer::new(module.clone(), RenderParams::default());
    let frame = renderer.render();
    assert_eq!(frame.chunk.level(0), Some(15));
    assert_eq!(frame.chunk.tone(0), Some(module.frequency_table().period(12)));
    Ok(())
}

#[test]
fn st_missing_pattern_plays_silence() -> anyhow::Result<()> {
    let mut data = st_image();
    data[2462] = 1;
    data[1952] = 5;
    let module = TrackerFormat::SoundTracker.decode(&data)?;
    assert_eq!(module.positions().len(), 2);
    assert_eq!(module.pattern(4).map(|p| p.size), Some(32));
    assert_eq!(module.pattern(4).map(|p| p.lines().count()), Some(0));
    Ok(())
}

#[test]
fn st_out_of_range_tempo_is_not_st() {
    let mut data = st_image();
    data[3007] = 1;
    let err = TrackerFormat::SoundTracker.decode(&data).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FormatMismatch);
}
