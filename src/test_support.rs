use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::model::{
    EventKind, InteractionEvent, Modifiers, SignalKind, SignalMap, SignalValue, Submission,
};
use std::collections::HashMap;

/// A complete, realistic signal set for one synthetic device. Eighteen
/// canonical sub-fields across all hashable groups, plus one volatile
/// canvas timing field that canonicalization strips.
pub fn baseline_signals() -> SignalMap {
    let mut signals = SignalMap::new();

    let mut canvas = HashMap::new();
    canvas.insert(
        "pixel_hash".to_string(),
        SignalValue::Text("9f2ce71a44d0".into()),
    );
    canvas.insert(
        "text_hash".to_string(),
        SignalValue::Text("b03d55e1".into()),
    );
    canvas.insert("winding".to_string(), SignalValue::Bool(true));
    canvas.insert("render_time_ms".to_string(), SignalValue::Number(14.7));
    signals.insert(SignalKind::Canvas, canvas);

    let mut webgl = HashMap::new();
    webgl.insert(
        "vendor".to_string(),
        SignalValue::Text("Google Inc. (Apple)".into()),
    );
    webgl.insert(
        "renderer".to_string(),
        SignalValue::Text("ANGLE (Apple, Apple M1, OpenGL 4.1)".into()),
    );
    webgl.insert(
        "extensions".to_string(),
        SignalValue::List(vec![
            "EXT_color_buffer_float".into(),
            "OES_texture_float_linear".into(),
            "WEBGL_debug_renderer_info".into(),
        ]),
    );
    signals.insert(SignalKind::Webgl, webgl);

    let mut audio = HashMap::new();
    audio.insert(
        "dsp_hash".to_string(),
        SignalValue::Text("124.04347527516074".into()),
    );
    audio.insert("sample_rate".to_string(), SignalValue::Number(44100.0));
    audio.insert("channel_count".to_string(), SignalValue::Number(2.0));
    signals.insert(SignalKind::Audio, audio);

    let mut fonts = HashMap::new();
    fonts.insert(
        "installed".to_string(),
        SignalValue::List(vec![
            "Arial".into(),
            "Avenir".into(),
            "Georgia".into(),
            "Helvetica Neue".into(),
            "Menlo".into(),
            "Verdana".into(),
        ]),
    );
    signals.insert(SignalKind::Fonts, fonts);

    let mut webrtc = HashMap::new();
    webrtc.insert(
        "codecs".to_string(),
        SignalValue::List(vec!["H264".into(), "VP8".into(), "VP9".into(), "opus".into()]),
    );
    webrtc.insert(
        "sdp_hash".to_string(),
        SignalValue::Text("77ac01be".into()),
    );
    signals.insert(SignalKind::Webrtc, webrtc);

    let mut wasm = HashMap::new();
    wasm.insert("simd".to_string(), SignalValue::Bool(true));
    wasm.insert("threads".to_string(), SignalValue::Bool(true));
    wasm.insert("streaming_compile".to_string(), SignalValue::Bool(true));
    signals.insert(SignalKind::Wasm, wasm);

    let mut sensors = HashMap::new();
    sensors.insert("accelerometer".to_string(), SignalValue::Bool(false));
    sensors.insert("gyroscope".to_string(), SignalValue::Bool(false));
    signals.insert(SignalKind::Sensors, sensors);

    let mut plugins = HashMap::new();
    plugins.insert(
        "installed".to_string(),
        SignalValue::List(vec!["PDF Viewer".into(), "Chromium PDF Plugin".into()]),
    );
    signals.insert(SignalKind::Plugins, plugins);

    signals
}

/// Copy of a signal set with one sub-field replaced, simulating drift in
/// that group.
pub fn with_drifted_field(
    mut signals: SignalMap,
    kind: SignalKind,
    field: &str,
    value: SignalValue,
) -> SignalMap {
    signals
        .entry(kind)
        .or_default()
        .insert(field.to_string(), value);
    signals
}

/// A signal set sharing nothing with [`baseline_signals`].
pub fn unrelated_signals(seed: u64) -> SignalMap {
    let mut rng = StdRng::seed_from_u64(seed);
    let tag = |rng: &mut StdRng| format!("{:016x}", rng.random::<u64>());

    let mut signals = SignalMap::new();
    let mut canvas = HashMap::new();
    canvas.insert("pixel_hash".to_string(), SignalValue::Text(tag(&mut rng)));
    canvas.insert("winding".to_string(), SignalValue::Bool(false));
    signals.insert(SignalKind::Canvas, canvas);

    let mut webgl = HashMap::new();
    webgl.insert("vendor".to_string(), SignalValue::Text(tag(&mut rng)));
    webgl.insert("renderer".to_string(), SignalValue::Text(tag(&mut rng)));
    signals.insert(SignalKind::Webgl, webgl);

    let mut fonts = HashMap::new();
    fonts.insert(
        "installed".to_string(),
        SignalValue::List(vec![tag(&mut rng), tag(&mut rng)]),
    );
    signals.insert(SignalKind::Fonts, fonts);

    signals
}

/// Submission with an explicit observation time, for deterministic tests.
pub fn submission_at(signals: SignalMap, observed_at_ms: u64, session: &str) -> Submission {
    Submission {
        signals,
        events: Vec::new(),
        user_id: None,
        session_id: Some(session.to_string()),
        observed_at_ms,
    }
}

fn pointer_event(x: f64, y: f64, ts: u64) -> InteractionEvent {
    InteractionEvent {
        kind: EventKind::PointerMove,
        x: Some(x),
        y: Some(y),
        key: None,
        timestamp_ms: ts,
        modifiers: Modifiers::default(),
    }
}

fn key_pair(key: &str, down_at: u64, dwell: u64) -> [InteractionEvent; 2] {
    let press = InteractionEvent {
        kind: EventKind::KeyDown,
        x: None,
        y: None,
        key: Some(key.to_string()),
        timestamp_ms: down_at,
        modifiers: Modifiers::default(),
    };
    let release = InteractionEvent {
        kind: EventKind::KeyUp,
        key: Some(key.to_string()),
        timestamp_ms: down_at + dwell,
        ..press.clone()
    };
    [press, release]
}

/// Pointer trace with human-like jitter: irregular timing, wandering
/// direction, occasional hesitation.
pub fn human_pointer_events(seed: u64, count: usize) -> Vec<InteractionEvent> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut events = Vec::with_capacity(count);
    let mut ts = 0u64;
    let mut x = 200.0;
    let mut y = 300.0;
    for _ in 0..count {
        ts += rng.random_range(8..45);
        if rng.random_bool(0.08) {
            // Hesitation: time passes, pointer barely moves.
            ts += rng.random_range(120..400);
            x += rng.random_range(-1.0..1.0);
            y += rng.random_range(-1.0..1.0);
        } else {
            x += rng.random_range(-6.0..18.0);
            y += rng.random_range(-12.0..12.0);
        }
        events.push(pointer_event(x, y, ts));
    }
    events
}

/// Pointer trace typical of naive automation: constant cadence, constant
/// step, perfectly straight.
pub fn scripted_pointer_events(count: usize) -> Vec<InteractionEvent> {
    (0..count)
        .map(|i| pointer_event(100.0 + i as f64 * 12.0, 400.0, i as u64 * 16))
        .collect()
}

/// Keystroke pairs with fixed dwell and spacing: zero timing variance.
pub fn metronome_typing(count: usize, dwell_ms: u64) -> Vec<InteractionEvent> {
    let mut events = Vec::with_capacity(count * 2);
    for i in 0..count as u64 {
        events.extend(key_pair("a", i * 150, dwell_ms));
    }
    events
}

/// Keystroke pairs with human-like dwell and flight jitter.
pub fn human_typing(seed: u64, count: usize) -> Vec<InteractionEvent> {
    let mut rng = StdRng::seed_from_u64(seed);
    let keys = ["t", "h", "e", "q", "u", "i", "c", "k", "b", "r"];
    let mut events = Vec::with_capacity(count * 2);
    let mut ts = 0u64;
    for i in 0..count {
        let dwell = rng.random_range(55..140);
        events.extend(key_pair(keys[i % keys.len()], ts, dwell));
        ts += dwell + rng.random_range(70..260);
    }
    events
}
