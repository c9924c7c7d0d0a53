// benches/bench_signal_state_machine.rs
use criterion::{
    black_box, criterion_group, criterion_main, AxisScale, Criterion, PlotConfiguration,
};
use signal_orchestrator::{LightState, SignalCommand, SignalStateMachine};
use std::time::Duration;

fn bench_request_signal(c: &mut Criterion) {
    let mut group = c.benchmark_group("request_signal");

    group.sample_size(100);
    group.measurement_time(Duration::from_secs(5));
    group.warm_up_time(Duration::from_secs(2));
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Linear));

    // One machine per intersection, alternating Red/Green requests every 5 seconds.
    for &size in [50, 100, 200].iter() {
        group.bench_function(format!("size_{}", size), |b| {
            let mut machines: Vec<SignalStateMachine> =
                (0..size).map(|_| SignalStateMachine::new(3, 0.0)).collect();
            let mut now = 0.0;
            let mut tick: u64 = 0;
            b.iter(|| {
                now += 5.0;
                tick += 1;
                for (i, machine) in machines.iter_mut().enumerate() {
                    let target = if (tick + i as u64) % 4 < 2 {
                        LightState::Green
                    } else {
                        LightState::Red
                    };
                    let command = SignalCommand::with_duration(target, 20, "bench");
                    black_box(machine.request_signal(command, now));
                }
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_request_signal);
criterion_main!(benches);
