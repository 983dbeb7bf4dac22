use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub delta: f64,
    pub percent: f64,
}

/// Delta and percent change of `realtime` against `base`.
///
/// A zero base yields a percent of exactly `0.0`. The percent is rounded to
/// two decimals.
pub fn compute(base: f64, realtime: f64) -> Metrics {
    let delta = realtime - base;
    let percent = if base == 0.0 {
        0.0
    } else {
        round_to_cents(delta / base * 100.0)
    };

    Metrics {
        delta,
        percent: if percent.is_finite() { percent } else { 0.0 },
    }
}

fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
