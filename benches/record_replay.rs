//! Benchmarks for the record-playback cycle

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::time::{Duration, Instant};
use tempfile::TempDir;

use msgtape::message::{Message, Value};
use msgtape::recording::{Recorder, RecorderOptions};
use msgtape::replay::Player;
use msgtape::transport::{TransmitTarget, Transmitter};
use msgtape::Result;

struct Discard;

impl Transmitter for Discard {
    fn configure(&mut self, _target: &TransmitTarget) -> Result<()> {
        Ok(())
    }

    fn send(&mut self, message: &Message) -> Result<()> {
        black_box(message);
        Ok(())
    }
}

fn message(i: i32) -> Message {
    Message::new(
        "/bench",
        vec![
            Value::Int(i),
            Value::Float(i as f32 * 0.5),
            Value::String(format!("label{}", i % 8)),
        ],
    )
}

fn record_capture(root: &TempDir, name: &str, count: i32) -> std::path::PathBuf {
    let dir = root.path().join(name);
    let mut recorder = Recorder::new(RecorderOptions {
        root_dir: root.path().to_path_buf(),
        ..RecorderOptions::default()
    });
    let t0 = Instant::now();
    recorder.start_in(&dir, t0).unwrap();
    for i in 0..count {
        let now = t0 + Duration::from_millis(u64::from(i.unsigned_abs()) * 10);
        recorder.on_message_received(&message(i), now).unwrap();
    }
    recorder
        .stop("bench", t0 + Duration::from_millis(u64::from(count.unsigned_abs()) * 10))
        .unwrap();
    dir
}

fn bench_record(c: &mut Criterion) {
    let messages: Vec<_> = (0..1000).map(message).collect();

    c.bench_function("record_1000_messages", |b| {
        b.iter(|| {
            let temp_dir = TempDir::new().unwrap();
            let mut recorder = Recorder::new(RecorderOptions {
                root_dir: temp_dir.path().to_path_buf(),
                ..RecorderOptions::default()
            });
            let t0 = Instant::now();
            recorder.start_in(&temp_dir.path().join("capture"), t0).unwrap();
            for (i, m) in messages.iter().enumerate() {
                let now = t0 + Duration::from_millis(i as u64);
                recorder.on_message_received(black_box(m), now).unwrap();
            }
            recorder.stop("bench", t0 + Duration::from_secs(1)).unwrap();
        });
    });
}

fn bench_play(c: &mut Criterion) {
    let temp_dir = TempDir::new().unwrap();
    let dir = record_capture(&temp_dir, "capture", 1000);

    let mut player = Player::default();
    player.open(&dir).unwrap();
    player.set_loop(true);

    c.bench_function("play_1000_messages", |b| {
        b.iter(|| {
            player.seek(0.0).unwrap();
            player.play();
            player.advance(black_box(20.0), &mut Discard).unwrap();
        });
    });

    c.bench_function("seek", |b| {
        b.iter(|| player.seek(black_box(7.3)).unwrap());
    });
}

criterion_group!(benches, bench_record, bench_play);
criterion_main!(benches);
