//! Benchmark tests for midroll-core operations
//!
//! Run with: cargo bench -p midroll-core

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use url::Url;

use midroll_core::controller::AdPlaybackController;
use midroll_core::intervals::{covered_duration, merge};
use midroll_core::progress::WatchProgressTracker;
use midroll_core::sequencer::AdBreakSequencer;
use midroll_core::types::*;

// ============================================================================
// Helpers
// ============================================================================

fn bench_ad(num: usize) -> Ad {
    Ad::media(
        format!("ad-{num}"),
        Url::parse(&format!("https://ads.example.com/creative/{num}.mp4")).unwrap(),
        15.0,
    )
    .with_tracking(TrackingUrls {
        impression: Some(Url::parse(&format!("https://t.example.com/{num}/imp")).unwrap()),
        first_quartile: Some(Url::parse(&format!("https://t.example.com/{num}/q1")).unwrap()),
        midpoint: Some(Url::parse(&format!("https://t.example.com/{num}/q2")).unwrap()),
        third_quartile: Some(Url::parse(&format!("https://t.example.com/{num}/q3")).unwrap()),
        complete: Some(Url::parse(&format!("https://t.example.com/{num}/done")).unwrap()),
        progress: vec![
            ProgressTracking {
                offset: 3.0,
                url: Url::parse(&format!("https://t.example.com/{num}/p3")).unwrap(),
            },
            ProgressTracking {
                offset: 9.0,
                url: Url::parse(&format!("https://t.example.com/{num}/p9")).unwrap(),
            },
        ],
        ..Default::default()
    })
}

/// Interleaved spans so roughly half of them coalesce on merge
fn overlapping_segments(count: usize) -> Vec<WatchedSegment> {
    (0..count)
        .map(|i| {
            let start = (i * 7 % (count * 5).max(1)) as f64;
            WatchedSegment {
                start,
                end: start + 6.0,
            }
        })
        .collect()
}

/// A tracker carrying `fragments` disjoint watched spans
fn fragmented_tracker(fragments: usize) -> WatchProgressTracker {
    let mut tracker = WatchProgressTracker::new();
    tracker.set_duration(1e9);
    tracker.on_playing(0.0);
    for i in 0..fragments {
        let base = i as f64 * 20.0;
        tracker.on_time(base);
        let mut t = base;
        while t < base + 5.0 {
            t += 0.5;
            tracker.on_time(t);
        }
    }
    tracker
}

fn mid_roll_schedule(count: usize) -> AdBreakSequencer {
    let breaks = (0..count)
        .map(|i| {
            AdBreak::new(format!("mid-{i}"), BreakPosition::MidRoll)
                .with_trigger_time(i as f64 * 30.0)
                .with_ads(vec![bench_ad(i)])
        })
        .collect();
    AdBreakSequencer::new(breaks)
}

// ============================================================================
// Interval Merge Benchmarks
// ============================================================================

fn bench_interval_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("Interval Merge");

    for &count in &[10, 100, 1000] {
        let segments = overlapping_segments(count);
        group.bench_with_input(
            BenchmarkId::new("merge", count),
            &segments,
            |b, segments| {
                b.iter(|| black_box(merge(black_box(segments))));
            },
        );
    }

    let merged = merge(&overlapping_segments(1000));
    group.bench_function("covered_duration/1000", |b| {
        b.iter(|| black_box(covered_duration(black_box(&merged))));
    });

    group.finish();
}

// ============================================================================
// Watch Progress Benchmarks
// ============================================================================

fn bench_watch_progress(c: &mut Criterion) {
    let mut group = c.benchmark_group("Watch Progress");

    for &fragments in &[1, 10, 50] {
        group.bench_with_input(
            BenchmarkId::new("on_time", format!("{fragments}_fragments")),
            &fragments,
            |b, &fragments| {
                let mut tracker = fragmented_tracker(fragments);
                let mut position = fragments as f64 * 20.0 + 10.0;
                b.iter(|| {
                    position += 0.25;
                    black_box(tracker.on_time(position));
                });
            },
        );
    }

    group.bench_function("snapshot/50_fragments", |b| {
        let tracker = fragmented_tracker(50);
        b.iter(|| black_box(tracker.snapshot()));
    });

    group.finish();
}

// ============================================================================
// Break Scheduling Benchmarks
// ============================================================================

fn bench_break_scheduling(c: &mut Criterion) {
    let mut group = c.benchmark_group("Break Scheduling");

    for &count in &[4, 20, 100] {
        let sequencer = mid_roll_schedule(count);
        // Halfway through the schedule: half the breaks are due candidates
        let position = count as f64 * 15.0;
        group.bench_with_input(
            BenchmarkId::new("due_mid_roll", count),
            &sequencer,
            |b, sequencer| {
                b.iter(|| black_box(sequencer.due_mid_roll(black_box(position))));
            },
        );
    }

    group.bench_function("controller_progress_tick", |b| {
        let mut controller = AdPlaybackController::new();
        let ad_break =
            AdBreak::new("bench", BreakPosition::PreRoll).with_ads(vec![bench_ad(0)]);
        controller.begin(&ad_break, 0, &AdsConfig::default());
        let mut elapsed = 0.0;
        b.iter(|| {
            elapsed += 0.1;
            black_box(controller.on_progress(elapsed));
        });
    });

    group.finish();
}

// ============================================================================
// Serialization Benchmarks
// ============================================================================

fn bench_serialization(c: &mut Criterion) {
    let mut group = c.benchmark_group("Serialization");

    group.bench_function("serialize_playback_state", |b| {
        let ad_break = AdBreak::new("pre", BreakPosition::PreRoll)
            .with_ads(vec![bench_ad(0), bench_ad(1)]);
        let state = AdPlaybackState {
            is_playing_ad: true,
            current_ad: Some(ad_break.ads[0].clone()),
            current_ad_break: Some(ad_break),
            ad_progress: 7.5,
            ad_duration: 15.0,
            can_skip: true,
            skip_countdown: 0.0,
            ads_remaining: 2,
            is_component_ad: false,
        };
        b.iter(|| black_box(serde_json::to_string(black_box(&state)).unwrap()));
    });

    group.bench_function("parse_ads_config", |b| {
        let config = AdsConfig {
            breaks: (0..5)
                .map(|i| {
                    AdBreak::new(format!("mid-{i}"), BreakPosition::MidRoll)
                        .with_trigger_time(i as f64 * 120.0)
                        .with_ads(vec![bench_ad(i * 2), bench_ad(i * 2 + 1)])
                })
                .collect(),
            skip_enabled: true,
            default_skip_after: Some(5.0),
        };
        let json = serde_json::to_string(&config).unwrap();
        b.iter(|| black_box(AdsConfig::from_json(black_box(&json)).unwrap()));
    });

    group.finish();
}

// ============================================================================
// Group Registration
// ============================================================================

criterion_group!(
    interval_benches,
    bench_interval_merge,
);

criterion_group!(
    progress_benches,
    bench_watch_progress,
);

criterion_group!(
    scheduling_benches,
    bench_break_scheduling,
    bench_serialization,
);

criterion_main!(
    interval_benches,
    progress_benches,
    scheduling_benches,
);
