use std::hint::black_box;

use criterion::{
    Criterion,
    Throughput,
    criterion_group,
    criterion_main,
};
use rand::{
    Rng,
    SeedableRng,
    rngs::SmallRng,
};
use robot8::{
    CalibrationStatus,
    ExternalCalibration,
    Framebuffer,
    LinearClassifier,
    PixelColor,
    Receiver,
    Timing,
    ToneEncoder,
};

pub fn bench_receiver(c: &mut Criterion) {
    let timing = Timing::TEST;

    let mut rng = SmallRng::seed_from_u64(0xbe4c);
    let image = Framebuffer::from_fn(|_, _| PixelColor::from_low_bits(rng.r#gen()));
    let tones = ToneEncoder::new(&image, timing).collect::<Vec<_>>();

    let mut group = c.benchmark_group("receiver");
    group.throughput(Throughput::Elements(tones.len() as u64));

    group.bench_function("built-in calibration", |b| {
        b.iter(|| {
            let mut receiver = Receiver::new(timing);
            let frames = receiver.feed(black_box(tones.iter().copied()));
            assert_eq!(frames, 1);
        })
    });

    // flags as a perfect detector would report them
    let preamble = (2 * timing.leader + timing.leader_break) as usize;
    let calibration = (0..tones.len())
        .map(|tick| {
            if tick < preamble {
                CalibrationStatus::ACTIVE
            }
            else {
                CalibrationStatus::OK
            }
        })
        .collect::<Vec<_>>();

    group.bench_function("external calibration", |b| {
        b.iter(|| {
            let mut receiver = Receiver::from_parts(
                timing,
                ExternalCalibration::default(),
                LinearClassifier,
                Framebuffer::new(),
            );
            for (frequency, status) in tones.iter().zip(&calibration) {
                black_box(receiver.step_with_calibration(*frequency, *status));
            }
            assert_eq!(receiver.frames_completed(), 1);
        })
    });

    group.finish();
}

criterion_group!(benches, bench_receiver);
criterion_main!(benches);
