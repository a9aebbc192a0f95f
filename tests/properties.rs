//! Property-based checks over the pure cores: name rules, value parsing,
//! coercion, month/day decoding, bucketing and ranking.

use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::{Column, DataFrame};
use proptest::prelude::*;
use tabula::data::{CoercionTarget, DataProcessor, NameRule, TypeCoercer};
use tabula::stats::{rolling_mean, Aggregator, BucketWidth, ResampleOp, Resampler};
use tabula::{RowSet, Value, ValueKind};

fn timestamp() -> impl Strategy<Value = NaiveDateTime> {
    // 2010-01-01 through roughly 2021
    (0i64..4_000 * 86_400).prop_map(|secs| {
        NaiveDate::from_ymd_opt(2010, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + chrono::TimeDelta::seconds(secs)
    })
}

fn width() -> impl Strategy<Value = BucketWidth> {
    prop_oneof![
        Just(BucketWidth::Day),
        Just(BucketWidth::Week),
        Just(BucketWidth::TwoWeek),
        Just(BucketWidth::Month),
    ]
}

fn name_rule() -> impl Strategy<Value = NameRule> {
    prop_oneof![
        Just(NameRule::Verbatim),
        Just(NameRule::SnakeLower),
        Just(NameRule::Underscore),
        Just(NameRule::StripPunctuation),
    ]
}

fn raw_cell() -> impl Strategy<Value = Option<String>> {
    prop::option::weighted(
        0.85,
        prop_oneof![
            "-?[0-9]{1,6}",
            "-?[0-9]{1,3}\\.[0-9]{1,3}",
            "(19|20)[0-9]{2}-0[1-9]-[12][0-9]",
            "(0[1-9]|1[0-2])/[12][0-9]/20[0-9]{2}",
            "NaN|inf|UNKNOWN|n/a",
            ".{0,12}",
        ],
    )
}

fn target() -> impl Strategy<Value = CoercionTarget> {
    prop_oneof![
        Just(CoercionTarget::Timestamp { format: None }),
        Just(CoercionTarget::timestamp("%Y-%m-%d")),
        Just(CoercionTarget::Integer),
        Just(CoercionTarget::Float),
    ]
}

fn text_rows(columns: Vec<(&str, Vec<Option<String>>)>) -> RowSet {
    let columns = columns
        .into_iter()
        .map(|(name, values)| Column::new(name.into(), values))
        .collect();
    RowSet::from_dataframe(DataFrame::new(columns).unwrap())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn proptest_name_rules_are_idempotent(name in "[ -~]{0,40}", rule in name_rule()) {
        let once = rule.apply(&name);
        prop_assert_eq!(rule.apply(&once), once.clone());
        if rule != NameRule::Verbatim {
            prop_assert!(!once.contains(' '), "space survived: {}", once);
        }
    }

    #[test]
    fn proptest_parsers_never_panic(raw in ".{0,40}", format in "%[YmdHMSIpBb]{1,6}") {
        let _ = TypeCoercer::parse_integer(&raw);
        let _ = TypeCoercer::parse_timestamp(&raw, None);
        let _ = TypeCoercer::parse_timestamp(&raw, Some(&format));
        if let Some(f) = TypeCoercer::parse_float(&raw) {
            prop_assert!(f.is_finite());
        }
    }

    #[test]
    fn proptest_integers_round_trip_through_text(n in any::<i64>()) {
        prop_assert_eq!(TypeCoercer::parse_integer(&n.to_string()), Some(n));
    }

    #[test]
    fn proptest_month_day_decoding(value in -100.0f64..20_000.0) {
        if let Some((month, day)) = DataProcessor::decode_month_day(value) {
            prop_assert!((1..=12).contains(&month));
            prop_assert!((1..=31).contains(&day));
            prop_assert_eq!(f64::from(month * 100 + day), value);
            prop_assert!(DataProcessor::month_name(month).is_some());
        }
        prop_assert_eq!(
            DataProcessor::decode_month_day(value),
            DataProcessor::decode_month_day(value)
        );
    }

    #[test]
    fn proptest_buckets_cover_every_row(
        stamps in prop::collection::vec(prop::option::weighted(0.9, timestamp()), 0..60),
        width in width(),
    ) {
        let series = Resampler::bucket(&stamps, None, width, &ResampleOp::Count);
        let present = stamps.iter().flatten().count();
        let counted: f64 = series.values().into_iter().flatten().sum();
        prop_assert_eq!(counted as usize, present);

        // contiguous and ascending
        for pair in series.buckets.windows(2) {
            prop_assert_eq!(width.next(pair[0].start.date()), Some(pair[1].start.date()));
        }
        // every timestamp lands in [start, next start)
        for stamp in stamps.iter().flatten() {
            let hit = series.buckets.iter().any(|b| {
                let start = b.start.date();
                let end = width.next(start).unwrap();
                stamp.date() >= start && stamp.date() < end
            });
            prop_assert!(hit, "{} not bucketed", stamp);
        }
    }

    #[test]
    fn proptest_rolling_mean_stays_within_window_bounds(
        values in prop::collection::vec(prop::option::of(-1_000.0f64..1_000.0), 0..50),
        window in 1usize..10,
    ) {
        let min_periods = (window / 2).max(1);
        let smoothed = rolling_mean(&values, window, min_periods).unwrap();
        prop_assert_eq!(smoothed.len(), values.len());
        for (i, mean) in smoothed.iter().enumerate() {
            let lo = (i + 1).saturating_sub(window);
            let present: Vec<f64> = values[lo..=i].iter().flatten().copied().collect();
            match mean {
                Some(m) => {
                    let min = present.iter().copied().fold(f64::INFINITY, f64::min);
                    let max = present.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                    prop_assert!(*m >= min - 1e-9 && *m <= max + 1e-9);
                }
                None => prop_assert!(present.len() < min_periods),
            }
        }
    }

    #[test]
    fn proptest_coercion_is_total(raw in prop::collection::vec(raw_cell(), 0..40), target in target()) {
        let rows = text_rows(vec![("raw", raw.clone())]);
        let typed = TypeCoercer::coerce(&rows, "raw", &target).unwrap();
        prop_assert_eq!(typed.height(), raw.len());

        for (row, cell) in raw.iter().enumerate() {
            let value = typed.value("raw", row).unwrap();
            let expected = cell.as_deref().and_then(|text| match &target {
                CoercionTarget::Timestamp { format } => {
                    TypeCoercer::parse_timestamp(text, format.as_deref()).map(Value::Timestamp)
                }
                CoercionTarget::Integer => TypeCoercer::parse_integer(text).map(Value::Int),
                CoercionTarget::Float => TypeCoercer::parse_float(text).map(Value::Float),
            });
            prop_assert_eq!(value, expected.unwrap_or(Value::Missing), "row {}", row);
        }

        let kind = typed.kind("raw").unwrap();
        let expected_kind = match target {
            CoercionTarget::Timestamp { .. } => ValueKind::Timestamp,
            CoercionTarget::Integer => ValueKind::Integer,
            CoercionTarget::Float => ValueKind::Float,
        };
        prop_assert_eq!(kind, expected_kind);
    }

    #[test]
    fn proptest_top_n_is_stable_and_keeps_first_seen_ties(
        pairs in prop::collection::vec(
            (prop::option::weighted(0.9, "[A-C]"), prop::option::weighted(0.9, "[a-e]")),
            0..60,
        ),
        n in 1usize..4,
    ) {
        let (groups, subs): (Vec<Option<String>>, Vec<Option<String>>) = pairs.iter().cloned().unzip();
        let rows = text_rows(vec![("group", groups), ("sub", subs)]);

        let first = Aggregator::top_n_per_group(&rows, "group", "sub", n).unwrap();
        let second = Aggregator::top_n_per_group(&rows, "group", "sub", n).unwrap();
        prop_assert_eq!(&first, &second);

        for ranked in &first {
            // counts in first-seen order, then a stable sort by count
            let mut expected: Vec<(String, usize)> = Vec::new();
            for (g, s) in &pairs {
                let (Some(g), Some(s)) = (g, s) else {
                    continue;
                };
                if *g != ranked.group {
                    continue;
                }
                match expected.iter_mut().find(|(value, _)| value == s) {
                    Some(entry) => entry.1 += 1,
                    None => expected.push((s.clone(), 1)),
                }
            }
            let total: usize = expected.iter().map(|(_, c)| c).sum();
            expected.sort_by(|a, b| b.1.cmp(&a.1));
            expected.truncate(n);

            let actual: Vec<(String, usize)> =
                ranked.counts.iter().map(|c| (c.value.clone(), c.count)).collect();
            prop_assert_eq!(actual, expected);
            prop_assert_eq!(ranked.total, total);
        }
    }
}
