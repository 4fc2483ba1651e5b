//! Property tests for run configuration identity.
//!
//! 1. A run id depends on config content, not on TOML key order
//! 2. Any change to a parameter changes the run id

use cadence_runner::RunConfig;
use proptest::prelude::*;

// ── Strategies (proptest) ────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Params {
    name: String,
    initial_cash: f64,
    execution: &'static str,
    rate: f64,
    fixed: f64,
    max_asset_weight: f64,
    lot_size: f64,
}

fn arb_params() -> impl Strategy<Value = Params> {
    (
        "[a-z][a-z0-9-]{0,12}",
        1_000.0..1.0e7_f64,
        prop_oneof![Just("current_close"), Just("next_open")],
        0.0..0.01_f64,
        0.0..10.0_f64,
        0.01..1.0_f64,
        prop_oneof![Just(1.0), Just(10.0), Just(100.0)],
    )
        .prop_map(
            |(name, initial_cash, execution, rate, fixed, max_asset_weight, lot_size)| Params {
                name,
                initial_cash,
                execution,
                rate,
                fixed,
                max_asset_weight,
                lot_size,
            },
        )
}

/// The three sections of a config file, each a list of `key = value` lines.
fn sections(p: &Params) -> [Vec<String>; 3] {
    [
        vec![
            format!("name = \"{}\"", p.name),
            format!("initial_cash = {:?}", p.initial_cash),
            format!("execution = \"{}\"", p.execution),
        ],
        vec![format!("rate = {:?}", p.rate), format!("fixed = {:?}", p.fixed)],
        vec![
            format!("max_asset_weight = {:?}", p.max_asset_weight),
            format!("lot_size = {:?}", p.lot_size),
        ],
    ]
}

fn render(top: &[String], commission: &[String], limits: &[String]) -> String {
    format!(
        "{}\n\n[commission]\n{}\n\n[limits]\n{}\n",
        top.join("\n"),
        commission.join("\n"),
        limits.join("\n")
    )
}

fn arb_layouts() -> impl Strategy<Value = (Params, String, String)> {
    arb_params().prop_flat_map(|p| {
        let [top, commission, limits] = sections(&p);
        let canonical = render(&top, &commission, &limits);
        (
            Just(p),
            Just(canonical),
            Just(top).prop_shuffle(),
            Just(commission).prop_shuffle(),
            Just(limits).prop_shuffle(),
        )
            .prop_map(|(p, canonical, top, commission, limits)| {
                (p, canonical, render(&top, &commission, &limits))
            })
    })
}

// ── 1. Layout independence ───────────────────────────────────────────

proptest! {
    #[test]
    fn run_id_ignores_key_order((params, canonical, shuffled) in arb_layouts()) {
        let a = RunConfig::from_toml_str(&canonical).unwrap();
        let b = RunConfig::from_toml_str(&shuffled).unwrap();
        prop_assert_eq!(&a, &b);
        prop_assert_eq!(a.run_id().unwrap(), b.run_id().unwrap());
        prop_assert_eq!(&a.name, &params.name);
        prop_assert_eq!(a.initial_cash, params.initial_cash);
    }
}

// ── 2. Sensitivity ───────────────────────────────────────────────────

proptest! {
    #[test]
    fn run_id_tracks_initial_cash(params in arb_params(), bump in 1.0..1_000.0_f64) {
        let [top, commission, limits] = sections(&params);
        let base = RunConfig::from_toml_str(&render(&top, &commission, &limits)).unwrap();

        let mut changed = base.clone();
        changed.initial_cash += bump;
        prop_assert_ne!(base.run_id().unwrap(), changed.run_id().unwrap());
    }
}
