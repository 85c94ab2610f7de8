//! Behavioural properties of the decision engine.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::atomic::{AtomicUsize, Ordering};

use faultprobe_core::policy::UNLIMITED;
use faultprobe_core::{
    should_fail, should_fail_ex, AddrRange, DecisionEngine, FaultFlags, FaultInjector, NoopEngine,
    PolicyConfig, PolicyState, ThreadContext,
};

fn policy(cfg: PolicyConfig) -> PolicyState {
    PolicyState::from_config(
        "props",
        &PolicyConfig {
            verbose: 0,
            ..cfg
        },
    )
    .unwrap()
}

#[test]
fn zero_probability_never_fails_and_touches_nothing() {
    let p = policy(PolicyConfig {
        probability: 0,
        interval: 5,
        times: UNLIMITED,
        ..PolicyConfig::default()
    });
    p.set_countdown(5);

    for size in [-1isize, 0, 1, 4096] {
        for _ in 0..250 {
            assert!(!should_fail(&p, size));
        }
    }

    assert_eq!(p.countdown(), 5);
    assert_eq!(p.times(), UNLIMITED);
    assert_eq!(p.attempts(), 0);
}

#[test]
fn certain_unlimited_policy_always_fails() {
    let p = policy(PolicyConfig::always());
    assert!((0..1000).all(|i| should_fail(&p, i % 7 - 3)));
    assert_eq!(p.injected(), 1000);
}

#[test]
fn interval_samples_exactly_once_per_window() {
    for n in [1u64, 2, 3, 7, 16] {
        let p = policy(PolicyConfig {
            interval: n,
            times: UNLIMITED,
            ..PolicyConfig::default()
        });
        p.set_countdown(n);

        for window in 0..5 {
            let hits = (0..n).filter(|_| should_fail(&p, 0)).count();
            assert_eq!(hits, 1, "interval={n} window={window}");
            assert!(p.countdown() <= n);
        }
    }
}

#[test]
fn budget_of_three_scenario() {
    let p = policy(PolicyConfig {
        times: 3,
        ..PolicyConfig::default()
    });
    let verdicts: Vec<bool> = (0..5).map(|_| should_fail(&p, 0)).collect();
    assert_eq!(verdicts, [true, true, true, false, false]);
    assert_eq!(p.times(), 0);
}

#[test]
fn budget_never_goes_negative_under_contention() {
    const K: i64 = 37;
    let p = policy(PolicyConfig {
        times: K,
        ..PolicyConfig::default()
    });
    let wins = AtomicUsize::new(0);

    std::thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(|| {
                for _ in 0..500 {
                    if should_fail(&p, 0) {
                        wins.fetch_add(1, Ordering::Relaxed);
                    }
                }
            });
        }
    });

    assert_eq!(wins.load(Ordering::Relaxed) as i64, K);
    assert_eq!(p.times(), 0);
}

#[test]
fn require_range_needs_a_matching_frame() {
    const A: usize = 0x7f00_1234;
    let p = policy(PolicyConfig {
        times: UNLIMITED,
        require: Some(AddrRange::single(A)),
        ..PolicyConfig::default()
    });

    {
        let _outer = ThreadContext::enter_frame(A - 1);
        let _inner = ThreadContext::enter_frame(A + 1);
        assert!((0..100).all(|_| !should_fail(&p, 0)));
    }
    assert!(!should_fail(&p, 0));

    let _hit = ThreadContext::enter_frame(A);
    assert!(should_fail(&p, 0));
}

#[test]
fn reject_range_blocks_matching_stacks() {
    let p = policy(PolicyConfig {
        times: UNLIMITED,
        reject: Some(AddrRange::new(0x1000, 0x1fff)),
        ..PolicyConfig::default()
    });

    assert!(should_fail(&p, 0));
    let _g = ThreadContext::enter_frame(0x1800);
    assert!(!should_fail(&p, 0));
}

#[test]
fn task_filter_without_eligible_task_never_fails() {
    let p = policy(PolicyConfig {
        times: UNLIMITED,
        task_filter: true,
        ..PolicyConfig::default()
    });

    ThreadContext::set_may_fail(false);
    assert!((0..100).all(|_| !should_fail(&p, 0)));

    ThreadContext::set_may_fail(true);
    assert!(should_fail(&p, 0));
    ThreadContext::set_may_fail(false);
}

#[test]
fn seeded_policies_are_reproducible() {
    let cfg = PolicyConfig {
        probability: 30,
        times: UNLIMITED,
        seed: Some(0x5eed),
        ..PolicyConfig::default()
    };
    let a = policy(cfg.clone());
    let b = policy(cfg);

    let xs: Vec<bool> = (0..500).map(|_| should_fail(&a, 0)).collect();
    let ys: Vec<bool> = (0..500).map(|_| should_fail(&b, 0)).collect();
    assert_eq!(xs, ys);

    let hits = xs.iter().filter(|&&v| v).count();
    assert!((90..=210).contains(&hits), "hits={hits}");
}

#[test]
fn nowarn_affects_only_reporting() {
    let p = PolicyState::from_config("props", &PolicyConfig::always()).unwrap();
    assert!(should_fail_ex(&p, 0, FaultFlags::NOWARN));
    assert!(should_fail_ex(&p, 0, FaultFlags::NONE));
}

#[test]
fn fail_nth_on_this_thread() {
    let p = policy(PolicyConfig {
        probability: 0,
        ..PolicyConfig::default()
    });

    ThreadContext::set_fail_nth(2);
    assert!(!should_fail(&p, 0));
    assert!(should_fail(&p, 0));
    assert_eq!(ThreadContext::current_fail_nth(), 0);
    assert!(!should_fail(&p, 0));
}

#[test]
fn injector_is_swappable() {
    fn run(inj: &dyn FaultInjector, p: &PolicyState) -> usize {
        (0..10).filter(|_| inj.should_fail(p, 0)).count()
    }

    let p = policy(PolicyConfig::always());
    assert_eq!(run(&NoopEngine, &p), 0);
    assert_eq!(run(&DecisionEngine::new(), &p), 10);
}
