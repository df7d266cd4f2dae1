//! Frequency Resampler.
//!
//! Puts one series onto the canonical grid of a target frequency, one row per
//! period across the observed span. The policy depends on how the native
//! cadence relates to the target:
//!
//! - native finer than target: aggregate (`Aggregation`, mean by default)
//! - native equal to target: pass through, keeping the last value per period
//! - native coarser than target: forward-fill, never back-fill
//!
//! Output dates are always period starts, whatever the input anchoring was.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::domain::{Aggregation, Frequency, NativeFrequency, NormalizedObservation, SeriesFrame};

pub mod calendar;

pub use calendar::{
    count_periods, infer_native_frequency, is_anchored, next_period_start, period_last_day, period_range,
    period_start,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResamplePolicy {
    Aggregate,
    PassThrough,
    ForwardFill,
}

impl ResamplePolicy {
    pub fn between(native: Frequency, target: Frequency) -> Self {
        match native.cmp(&target) {
            std::cmp::Ordering::Less => ResamplePolicy::Aggregate,
            std::cmp::Ordering::Equal => ResamplePolicy::PassThrough,
            std::cmp::Ordering::Greater => ResamplePolicy::ForwardFill,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Resampler {
    target: Frequency,
    aggregation: Aggregation,
}

impl Resampler {
    pub fn new(target: Frequency) -> Self {
        Self {
            target,
            aggregation: Aggregation::default(),
        }
    }

    pub fn with_aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregation = aggregation;
        self
    }

    pub fn target(&self) -> Frequency {
        self.target
    }

    /// Cadence used to pick the policy: the frame's own, or inferred from the
    /// date gaps when every date came through the generic parser.
    pub fn effective_native(&self, frame: &SeriesFrame) -> NativeFrequency {
        match frame.native_frequency {
            NativeFrequency::Unknown => infer_native_frequency(&frame.dates()),
            known => known,
        }
    }

    pub fn policy_for(&self, frame: &SeriesFrame) -> ResamplePolicy {
        match self.effective_native(frame).as_frequency() {
            Some(native) => ResamplePolicy::between(native, self.target),
            None => ResamplePolicy::PassThrough,
        }
    }

    pub fn resample(&self, frame: &SeriesFrame) -> SeriesFrame {
        let native = self.effective_native(frame);
        let policy = self.policy_for(frame);
        let observations = match policy {
            ResamplePolicy::Aggregate => self.aggregate(&frame.observations, native),
            ResamplePolicy::PassThrough => self.pass_through(&frame.observations, native),
            ResamplePolicy::ForwardFill => self.forward_fill(&frame.observations, native),
        };

        log::debug!(
            "resampled '{}' ({} -> {}, {:?}): {} -> {} rows",
            frame.name,
            native.label(),
            self.target,
            policy,
            frame.len(),
            observations.len()
        );

        SeriesFrame {
            name: frame.name.clone(),
            source: frame.source.clone(),
            native_frequency: native,
            frequency: Some(self.target),
            observations,
        }
    }

    fn aggregate(&self, observations: &[NormalizedObservation], native: NativeFrequency) -> Vec<NormalizedObservation> {
        let buckets = self.bucket(observations);
        let Some((first, last)) = span(&buckets) else {
            return Vec::new();
        };

        period_range(self.target, first, last)
            .into_iter()
            .map(|p| {
                let value = buckets
                    .get(&p)
                    .and_then(|values| aggregate_values(self.aggregation, values));
                NormalizedObservation::new(p, value, native)
            })
            .collect()
    }

    fn pass_through(&self, observations: &[NormalizedObservation], native: NativeFrequency) -> Vec<NormalizedObservation> {
        let buckets = self.bucket(observations);
        let Some((first, last)) = span(&buckets) else {
            return Vec::new();
        };

        period_range(self.target, first, last)
            .into_iter()
            .map(|p| {
                let value = buckets.get(&p).and_then(|values| values.last().copied());
                NormalizedObservation::new(p, value, native)
            })
            .collect()
    }

    /// Each target period takes the latest native value whose period starts on
    /// or before the target period's last day. For nested grids (quarterly to
    /// monthly) that is the value on or before the target period start.
    fn forward_fill(&self, observations: &[NormalizedObservation], native: NativeFrequency) -> Vec<NormalizedObservation> {
        // Native period start -> last non-null value in that native period.
        let mut anchored: BTreeMap<NaiveDate, Option<f64>> = BTreeMap::new();
        for obs in observations {
            let key = calendar::native_period_start(native, obs.date);
            let slot = anchored.entry(key).or_insert(None);
            if obs.value.is_some() {
                *slot = obs.value;
            }
        }
        let (Some((&first, _)), Some((&last, _))) = (anchored.first_key_value(), anchored.last_key_value()) else {
            return Vec::new();
        };

        let end = calendar::native_period_last_day(native, last);
        let mut carried: Option<f64> = None;
        let mut pending = anchored.iter().peekable();

        period_range(self.target, first, end)
            .into_iter()
            .map(|p| {
                let p_end = period_last_day(self.target, p);
                while let Some((date, value)) = pending.peek() {
                    if **date > p_end {
                        break;
                    }
                    if value.is_some() {
                        carried = **value;
                    }
                    pending.next();
                }
                NormalizedObservation::new(p, carried, native)
            })
            .collect()
    }

    /// Group non-null values by target period start, in input order. Periods
    /// that only saw nulls are present with an empty list.
    fn bucket(&self, observations: &[NormalizedObservation]) -> BTreeMap<NaiveDate, Vec<f64>> {
        let mut buckets: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
        for obs in observations {
            let values = buckets.entry(period_start(self.target, obs.date)).or_default();
            values.extend(obs.value);
        }
        buckets
    }
}

fn span<V>(buckets: &BTreeMap<NaiveDate, V>) -> Option<(NaiveDate, NaiveDate)> {
    Some((*buckets.first_key_value()?.0, *buckets.last_key_value()?.0))
}

/// Collapse the values of one period. `None` when there is nothing to collapse.
pub fn aggregate_values(aggregation: Aggregation, values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    match aggregation {
        Aggregation::Mean => Some(values.iter().sum::<f64>() / values.len() as f64),
        Aggregation::Sum => Some(values.iter().sum()),
        Aggregation::First => values.first().copied(),
        Aggregation::Last => values.last().copied(),
    }
}
