//! Criterion benchmarks for the per-poll hot path.
//!
//! A status poll decodes `Status.json`, compares it with the last published
//! flags and, on change, wraps the full flag map in a packet.  All three
//! steps run every poll interval, so they should stay well under a
//! millisecond.
//!
//! Run with:
//! ```bash
//! cargo bench --package edlink-core --bench snapshot_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use edlink_core::{DeltaTracker, JournalEvent, PacketBuilder, PacketSource, StatusFlags};

// ── Fixtures ──────────────────────────────────────────────────────────────────

const STATUS_DOCUMENT: &str = r#"{ "timestamp":"2024-05-01T18:22:03Z", "event":"Status", "Flags":16842765, "Flags2":0, "Pips":[4,8,0], "FireGroup":0, "GuiFocus":0, "Fuel":{ "FuelMain":32.0, "FuelReservoir":0.63 }, "Cargo":0.0, "LegalState":"Clean" }"#;

const JOURNAL_LINE: &str = r#"{ "timestamp":"2024-05-01T18:22:03Z", "event":"FSDJump", "StarSystem":"Shinrarta Dezhra", "SystemAddress":3932277478106, "StarPos":[55.71875,17.59375,27.15625], "JumpDist":8.421, "FuelUsed":0.614, "FuelLevel":31.38 }"#;

// ── Benchmarks: status decode + delta ─────────────────────────────────────────

fn bench_status_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("status");

    group.bench_function("decode", |b| {
        b.iter(|| StatusFlags::from_status_json(black_box(STATUS_DOCUMENT)))
    });

    // Steady state: the file was rewritten but nothing changed.
    group.bench_function("decode_and_observe_unchanged", |b| {
        let mut tracker = DeltaTracker::new();
        tracker.observe(StatusFlags::from_bits(16842765));
        b.iter(|| {
            let flags = StatusFlags::from_status_json(black_box(STATUS_DOCUMENT)).ok();
            flags.map(|f| tracker.observe(f).should_publish())
        })
    });

    group.finish();
}

// ── Benchmarks: packet construction ───────────────────────────────────────────

fn bench_packet_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("packet");
    let builder = PacketBuilder::new();
    let flags = StatusFlags::from_bits(16842765);

    group.bench_function("status_delta_to_json", |b| {
        b.iter(|| {
            builder
                .build(PacketSource::Status, "StatusDelta", black_box(&flags))
                .and_then(|p| p.to_json())
        })
    });

    group.bench_function("journal_parse_and_wrap", |b| {
        b.iter(|| {
            JournalEvent::parse(black_box(JOURNAL_LINE))
                .ok()
                .and_then(|e| builder.build(PacketSource::Journal, "FSDJump", e.record()).ok())
        })
    });

    group.finish();
}

criterion_group!(benches, bench_status_decode, bench_packet_build);
criterion_main!(benches);
