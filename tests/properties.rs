//! Property tests for calendar anchoring, resampling and merging.

use std::collections::BTreeMap;

use chrono::{Days, Months, NaiveDate};
use proptest::prelude::*;

use kmacro::domain::{Frequency, NativeFrequency, NormalizedObservation, SeriesFrame};
use kmacro::merge::{MergeOptions, SeriesMerger};
use kmacro::normalize::parse_date_str;
use kmacro::resample::{Resampler, count_periods, is_anchored, period_last_day, period_range, period_start};

fn base() -> NaiveDate {
    NaiveDate::from_ymd_opt(2000, 1, 1).unwrap()
}

fn any_date() -> impl Strategy<Value = NaiveDate> {
    (1990i32..2040, 0u64..366).prop_map(|(y, off)| NaiveDate::from_ymd_opt(y, 1, 1).unwrap() + Days::new(off))
}

fn any_frequency() -> impl Strategy<Value = Frequency> {
    prop_oneof![
        Just(Frequency::Daily),
        Just(Frequency::Weekly),
        Just(Frequency::Monthly),
        Just(Frequency::Quarterly),
        Just(Frequency::Yearly),
    ]
}

/// Month offsets from 2000-01 -> value.
fn monthly_points(max_len: usize) -> impl Strategy<Value = BTreeMap<u32, f64>> {
    prop::collection::btree_map(0u32..72, -1.0e6f64..1.0e6, 1..max_len)
}

fn monthly_frame(name: &str, points: &BTreeMap<u32, f64>) -> SeriesFrame {
    let obs = points
        .iter()
        .map(|(off, v)| {
            let date = base().checked_add_months(Months::new(*off)).unwrap();
            NormalizedObservation::new(date, Some(*v), NativeFrequency::Monthly)
        })
        .collect();
    SeriesFrame::from_observations(name, "test", obs)
}

fn value_at(frame: &SeriesFrame, date: NaiveDate) -> Option<f64> {
    frame.observations.iter().find(|o| o.date == date).and_then(|o| o.value)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn period_start_is_anchored_and_contains_the_date(date in any_date(), freq in any_frequency()) {
        let start = period_start(freq, date);
        prop_assert!(is_anchored(freq, start));
        prop_assert!(start <= date);
        prop_assert!(date <= period_last_day(freq, date));
        prop_assert_eq!(period_start(freq, start), start);
    }

    #[test]
    fn coarse_tokens_anchor_to_the_first_day(year in 1950i32..2100, month in 1u32..=12) {
        let monthly = parse_date_str(&format!("{year}{month:02}"), None).unwrap();
        prop_assert_eq!(monthly.date, NaiveDate::from_ymd_opt(year, month, 1).unwrap());
        prop_assert_eq!(monthly.native_frequency, NativeFrequency::Monthly);

        let dotted = parse_date_str(&format!("{year}.{month:02}"), None).unwrap();
        prop_assert_eq!(dotted.date, monthly.date);

        let q = (month - 1) / 3 + 1;
        let quarterly = parse_date_str(&format!("{year}Q{q}"), None).unwrap();
        prop_assert_eq!(quarterly.date, NaiveDate::from_ymd_opt(year, 3 * q - 2, 1).unwrap());
    }

    #[test]
    fn resampling_to_the_native_frequency_keeps_values(points in monthly_points(40)) {
        let frame = monthly_frame("s", &points);
        let resampler = Resampler::new(Frequency::Monthly);
        let once = resampler.resample(&frame);

        for obs in &frame.observations {
            prop_assert_eq!(value_at(&once, obs.date), obs.value);
        }
        let first = frame.first_date().unwrap();
        let last = frame.last_date().unwrap();
        prop_assert_eq!(once.dates(), period_range(Frequency::Monthly, first, last));

        let twice = resampler.resample(&once);
        prop_assert_eq!(twice.observations, once.observations);
    }

    #[test]
    fn forward_fill_never_back_fills(
        quarters in prop::collection::btree_map(4u32..24, -1.0e3f64..1.0e3, 1..8),
    ) {
        let obs: Vec<NormalizedObservation> = quarters
            .iter()
            .map(|(q, v)| {
                let date = base().checked_add_months(Months::new(3 * q)).unwrap();
                NormalizedObservation::new(date, Some(*v), NativeFrequency::Quarterly)
            })
            .collect();
        let first_native = obs[0].date;
        let frame = SeriesFrame::from_observations("gdp", "test", obs.clone());
        let monthly = Resampler::new(Frequency::Monthly).resample(&frame);

        let end = monthly.last_date().unwrap();
        let table = SeriesMerger::new(MergeOptions::new(Frequency::Monthly).with_range(Some((base(), end))))
            .merge(&[monthly])
            .unwrap();
        let column = table.column("gdp_value").unwrap();

        for (date, value) in table.dates.iter().zip(&column.values) {
            if *date < first_native {
                prop_assert_eq!(*value, None);
            }
        }
        for o in &obs {
            prop_assert_eq!(table.value_at("gdp_value", o.date), Some(o.value));
        }
    }

    #[test]
    fn outer_merge_is_gapless_and_loses_nothing(
        series in prop::collection::vec(monthly_points(20), 1..4),
    ) {
        let frames: Vec<SeriesFrame> = series
            .iter()
            .enumerate()
            .map(|(i, points)| monthly_frame(&format!("s{i}"), points))
            .collect();
        let table = SeriesMerger::new(MergeOptions::new(Frequency::Monthly)).merge(&frames).unwrap();

        let start = frames.iter().filter_map(|f| f.first_date()).min().unwrap();
        let end = frames.iter().filter_map(|f| f.last_date()).max().unwrap();
        prop_assert_eq!(table.len(), count_periods(Frequency::Monthly, start, end));
        prop_assert!(table.dates.windows(2).all(|w| w[0] < w[1]));

        for frame in &frames {
            let name = format!("{}_value", frame.name);
            prop_assert_eq!(table.column(&name).unwrap().valid_count(), frame.valid_count());
            for o in &frame.observations {
                prop_assert_eq!(table.value_at(&name, o.date), Some(o.value));
            }
        }
    }
}
