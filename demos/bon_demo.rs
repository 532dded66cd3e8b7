use std::time::{Duration, Instant};

use cluster::config::MockConfig;
use cluster::{Channel, Cluster, ClusterConfig, GaugeBinding, GaugeSpec, Range, ValueFormat};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    // Two gauges assembled with the bon-generated builders
    let boost = GaugeSpec::builder()
        .label("bar")
        .min(0.0)
        .max(2.5)
        .good(Range::new(0.5, 1.8))
        .warn(Range::new(0.2, 2.1))
        .ticks(6)
        .format(ValueFormat::Fixed(1))
        .build();
    let coolant = GaugeSpec::builder()
        .label("Coolant")
        .unit("°C")
        .min(40.0)
        .max(120.0)
        .pivot(90.0)
        .bad(Range::new(105.0, 120.0))
        .build();

    let config = ClusterConfig::builder()
        .gauges(vec![
            GaugeBinding {
                title: "Boost".to_string(),
                channel: Channel::Queue,
                factor: 0.025,
                offset: 0.0,
                spec: boost,
            },
            GaugeBinding {
                title: "Coolant".to_string(),
                channel: Channel::Temperature,
                factor: 1.5,
                offset: 10.0,
                spec: coolant,
            },
        ])
        .mock(MockConfig {
            seed: Some(7),
            jitter: 0.02,
        })
        .build();

    // Let the needles chase a few seconds of synthetic telemetry, then print
    let mut cluster = Cluster::new(config, None);
    let start = Instant::now();
    for frame in 0..180u64 {
        cluster.tick(start + Duration::from_millis(frame * 16));
    }
    for gauge in cluster.gauges() {
        println!(
            "{:>8}  target {:>7.2}°  shown {:>7.2}°  {:?}",
            gauge.readout(),
            gauge.target_angle(),
            gauge.displayed_angle(),
            gauge.status(),
        );
    }

    let dir = std::env::temp_dir().join("cluster-demo");
    for path in cluster.snapshot_svg(&dir)? {
        println!("wrote {}", path.display());
    }
    Ok(())
}
