use rand::rngs::StdRng;
use rand::SeedableRng;

use super::*;

fn secs(d: Duration) -> f64 {
    d.as_secs_f64()
}

fn approx(got: Duration, want: f64) {
    assert!(
        (secs(got) - want).abs() < 1e-6,
        "got {}s, want {}s",
        secs(got),
        want
    );
}

#[test]
fn test_deterministic_interval() {
    let bw = BandwidthConfig::default(); // 400 octets/s of RTCP

    let tests = vec![
        (
            "small session hits the floor",
            IntervalInput {
                members: 2,
                senders: 0,
                we_sent: false,
                avg_rtcp_size: 100.0,
                initial: false,
            },
            5.0,
        ),
        (
            "initial floor is halved",
            IntervalInput {
                members: 2,
                senders: 0,
                we_sent: false,
                avg_rtcp_size: 100.0,
                initial: true,
            },
            2.5,
        ),
        (
            "large session scales with members",
            IntervalInput {
                members: 100,
                senders: 0,
                we_sent: false,
                avg_rtcp_size: 100.0,
                initial: false,
            },
            25.0,
        ),
        (
            "minority sender shares the sender quarter",
            IntervalInput {
                members: 100,
                senders: 2,
                we_sent: true,
                avg_rtcp_size: 400.0,
                initial: false,
            },
            // 2 * 400 / 100
            8.0,
        ),
        (
            "receiver with minority senders shares three quarters",
            IntervalInput {
                members: 100,
                senders: 4,
                we_sent: false,
                avg_rtcp_size: 100.0,
                initial: false,
            },
            // 96 * 100 / 300
            32.0,
        ),
        (
            "majority senders are pooled",
            IntervalInput {
                members: 100,
                senders: 50,
                we_sent: true,
                avg_rtcp_size: 100.0,
                initial: false,
            },
            25.0,
        ),
    ];

    for (name, input, want) in tests {
        let got = IntervalModel::deterministic_interval(&input, &bw);
        assert!(
            (secs(got) - want).abs() < 1e-6,
            "{name}: got {}s, want {want}s",
            secs(got)
        );
    }
}

#[test]
fn test_no_bandwidth() {
    let bw = BandwidthConfig {
        session_bandwidth: 0,
        ..Default::default()
    };
    let input = IntervalInput {
        members: 3,
        avg_rtcp_size: 100.0,
        ..Default::default()
    };
    assert_eq!(
        IntervalModel::deterministic_interval(&input, &bw),
        IntervalModel::NO_BANDWIDTH_INTERVAL
    );
}

#[test]
fn test_compute_interval_factor() {
    let bw = BandwidthConfig::default();
    let receiver = IntervalInput {
        members: 2,
        avg_rtcp_size: 100.0,
        ..Default::default()
    };
    approx(IntervalModel::compute_interval(&receiver, &bw, 0.5), 2.5);
    approx(IntervalModel::compute_interval(&receiver, &bw, 1.5), 7.5);
    approx(IntervalModel::compute_interval(&receiver, &bw, 3.0), 7.5);

    let sender = IntervalInput {
        senders: 1,
        we_sent: true,
        ..receiver
    };
    approx(
        IntervalModel::compute_interval(&sender, &bw, 1.0),
        5.0 / IntervalModel::RECONSIDERATION_COMPENSATION,
    );
}

#[test]
fn test_compute_interval_bounds() {
    let bw = BandwidthConfig::default();
    let min = secs(bw.min_interval);
    let c = IntervalModel::RECONSIDERATION_COMPENSATION;
    let mut rng = StdRng::seed_from_u64(7);

    for members in [1usize, 2, 10, 50, 100, 1000, 10_000] {
        for we_sent in [false, true] {
            let input = IntervalInput {
                members,
                senders: usize::from(we_sent),
                we_sent,
                avg_rtcp_size: 120.0,
                initial: false,
            };
            let td = secs(IntervalModel::deterministic_interval(&input, &bw));
            assert!(td >= min, "Td below the floor for {members} members");

            let (lo, hi) = if we_sent {
                (0.5 / c, 1.5 / c)
            } else {
                (0.5, 1.5)
            };
            for _ in 0..200 {
                let factor = IntervalModel::random_factor(&mut rng);
                assert!((0.5..1.5).contains(&factor));
                let t = secs(IntervalModel::compute_interval(&input, &bw, factor));
                assert!(
                    t >= td * lo - 1e-9 && t <= td * hi + 1e-9,
                    "T={t} outside [{}, {}] for {members} members, we_sent={we_sent}",
                    td * lo,
                    td * hi
                );
                if !we_sent {
                    assert!(t >= min * 0.5);
                }
            }
        }
    }
}

#[test]
fn test_single_sender_64kbps() {
    // 64 kbit/s, 5% control, one sender (us), 100 octet reports, nobody else
    let bw = BandwidthConfig {
        session_bandwidth: 64_000,
        ..Default::default()
    };
    let input = IntervalInput {
        members: 1,
        senders: 1,
        we_sent: true,
        avg_rtcp_size: 100.0,
        initial: true,
    };

    let td = IntervalModel::deterministic_interval(&input, &bw);
    // 100 / 400 = 0.25s raw, so the initial floor wins
    approx(td, 2.5);

    let c = IntervalModel::RECONSIDERATION_COMPENSATION;
    let mut rng = StdRng::seed_from_u64(64_000);
    for _ in 0..100 {
        let factor = IntervalModel::random_factor(&mut rng);
        let t = secs(IntervalModel::compute_interval(&input, &bw, factor));
        assert!(t >= 2.5 * 0.5 / c - 1e-9);
        assert!(t <= 2.5 * 1.5 / c + 1e-9);
    }
}

#[test]
fn test_update_avg_size() {
    let mut avg = IntervalModel::INITIAL_AVG_RTCP_SIZE;
    avg = IntervalModel::update_avg_size(avg, 36);
    assert_eq!(avg, 36.0);

    avg = IntervalModel::update_avg_size(100.0, 260);
    assert_eq!(avg, 110.0);
}
