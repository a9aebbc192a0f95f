//! NYC 311 service request questions.

use super::{format_counts, format_group_counts, format_millis, format_number, top, Finding, Report};
use crate::charts::{ChartKind, ChartPlotter, DisplayOptions};
use crate::data::{CalendarField, DataProcessor, FrameError, RowSet};
use crate::stats::{Aggregator, BucketWidth, GroupSummary, ResampleOp, Resampler, Stat, TimeSeries};
use chrono::{NaiveDate, NaiveTime, TimeDelta};

const CREATED: &str = "created_date";
const CLOSED: &str = "closed_date";
const AGENCY: &str = "agency";
const AGENCY_NAME: &str = "agency_name";
const COMPLAINT: &str = "complaint_type";
const DESCRIPTOR: &str = "descriptor";
const BOROUGH: &str = "borough";
const CHANNEL: &str = "open_data_channel_type";
const TIME_TO_FIX: &str = "time_to_fix";

const RESIDENTIAL_NOISE: &str = "Noise - Residential";
const BEES: &str = "Harboring Bees/Wasps";
const SUMMER: [&str; 3] = ["June", "July", "August"];

/// Run the 311 questions. Expects `created_date` and `closed_date` already
/// typed as timestamps.
pub fn service_requests(rows: &RowSet, mut report: Report<'_>) -> Result<Vec<Finding>, FrameError> {
    tracing::info!(rows = rows.height(), "running service request recipe");

    calendar_questions(rows, &mut report)?;
    agency_questions(rows, &mut report)?;
    noise_and_bees(rows, &mut report)?;
    resolution_times(rows, &mut report)?;
    holidays(rows, &mut report)?;
    fireworks(rows, &mut report)?;
    channels(rows, &mut report)?;

    Ok(report.finish())
}

fn calendar_questions(rows: &RowSet, report: &mut Report<'_>) -> Result<(), FrameError> {
    let by_month = DataProcessor::calendar_field(rows, CREATED, CalendarField::MonthName, "created_month")?;
    report.note(
        "Calls by month of the year",
        format_counts(&Aggregator::value_counts(&by_month, "created_month")?),
    );

    let monthly = Resampler::resample(rows, CREATED, BucketWidth::Month, &ResampleOp::Count)?;
    report.note("Busiest calendar months", format_buckets(&monthly, "%B %Y", 5));

    let weekly = Resampler::resample(rows, CREATED, BucketWidth::Week, &ResampleOp::Count)?;
    report.chart(
        ChartPlotter::from_time_series("311 calls per week", &weekly),
        DisplayOptions::default(),
    );

    let with_hour = DataProcessor::calendar_field(rows, CREATED, CalendarField::Hour, "created_hour")?;
    let ranked = Aggregator::value_counts(&with_hour, "created_hour")?;
    let body = match (ranked.first(), ranked.last()) {
        (Some(most), Some(least)) => format!(
            "most common hour: {} ({} calls)\nleast common hour: {} ({} calls)",
            most.value, most.count, least.value, least.count
        ),
        _ => "(no rows)".to_string(),
    };
    report.note("Calls by hour of day", body);

    let hourly = Aggregator::value_counts_by_key(&with_hour, "created_hour")?;
    let title = ranked
        .first()
        .map(|h| format!("Most 311 complaints are made at hour {}", h.value))
        .unwrap_or_else(|| "311 complaints by hour".to_string());
    report.chart(
        ChartPlotter::from_value_counts("calls by hour", &hourly),
        DisplayOptions::default().title(&title),
    );
    Ok(())
}

fn agency_questions(rows: &RowSet, report: &mut Report<'_>) -> Result<(), FrameError> {
    let agencies = top(Aggregator::value_counts(rows, AGENCY)?, 5);
    report.note("Agencies fielding the most complaints", format_counts(&agencies));
    if rows.has_column(AGENCY_NAME) {
        report.note(
            "Agency names fielding the most complaints",
            format_counts(&top(Aggregator::value_counts(rows, AGENCY_NAME)?, 15)),
        );
    }
    report.chart(
        ChartPlotter::from_value_counts("top agencies", &agencies),
        DisplayOptions::default().kind(ChartKind::Bar),
    );

    let hpd = rows.filter_eq(AGENCY, "HPD")?;
    report.note(
        "Most common complaints to HPD",
        format_counts(&top(Aggregator::value_counts(&hpd, COMPLAINT)?, 5)),
    );

    report.note(
        "Top 3 complaints per agency",
        format_group_counts(&Aggregator::top_n_per_group(rows, AGENCY, COMPLAINT, 3)?),
    );
    Ok(())
}

fn noise_and_bees(rows: &RowSet, report: &mut Report<'_>) -> Result<(), FrameError> {
    let noise = rows.filter_eq(COMPLAINT, RESIDENTIAL_NOISE)?;
    report.note(
        "Most common residential noise complaints",
        format_counts(&top(Aggregator::value_counts(&noise, DESCRIPTOR)?, 5)),
    );

    let noise_hours = DataProcessor::calendar_field(&noise, CREATED, CalendarField::Hour, "created_hour")?;
    report.chart(
        ChartPlotter::from_value_counts(
            "residential noise by hour",
            &Aggregator::value_counts_by_key(&noise_hours, "created_hour")?,
        ),
        DisplayOptions::default(),
    );

    let biweekly = Resampler::resample(&noise, CREATED, BucketWidth::TwoWeek, &ResampleOp::Count)?;
    report.note(
        "Biweekly residential noise peaks",
        format_buckets(&biweekly, "%Y-%m-%d", 5),
    );
    report.chart(
        ChartPlotter::from_time_series("residential noise every two weeks", &biweekly),
        DisplayOptions::default(),
    );

    let bee_related = rows.filter_contains(COMPLAINT, "bee", true)?;
    report.note(
        "Bee-related complaint types",
        format_counts(&Aggregator::value_counts(&bee_related, COMPLAINT)?),
    );

    let bees = rows.filter_eq(COMPLAINT, BEES)?;
    let bee_months = DataProcessor::calendar_field(&bees, CREATED, CalendarField::Month, "created_month")?;
    let per_month = Aggregator::value_counts_by_key(&bee_months, "created_month")?;
    report.chart(
        ChartPlotter::from_value_counts("bee complaints by month", &per_month),
        DisplayOptions::default().kind(ChartKind::BarHorizontal),
    );
    report.note(
        "Bee complaints: beekeepers or not",
        format_counts(&Aggregator::value_counts(&bees, DESCRIPTOR)?),
    );
    Ok(())
}

fn resolution_times(rows: &RowSet, report: &mut Report<'_>) -> Result<(), FrameError> {
    let fixed = DataProcessor::duration(rows, CLOSED, CREATED, TIME_TO_FIX)?;

    let overall = Aggregator::describe(&fixed, TIME_TO_FIX)?;
    report.note(
        "Time to resolve a complaint",
        format!(
            "resolved: {}\nmean: {}\nmedian: {}\nmax: {}",
            overall.count,
            format_millis(overall.mean),
            format_millis(overall.median),
            format_millis(overall.max)
        ),
    );

    let body = Aggregator::group_describe(&fixed, &[AGENCY], TIME_TO_FIX)?
        .iter()
        .map(|(key, d)| {
            format!(
                "{}  count {}  mean {}  min {}  25% {}  50% {}  75% {}  max {}",
                key.join("/"),
                d.count,
                format_millis(d.mean),
                format_millis(d.min),
                format_millis(d.p25),
                format_millis(d.median),
                format_millis(d.p75),
                format_millis(d.max)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    report.note("Time to fix by agency", body);

    let mut per_agency =
        Aggregator::group_stats(&fixed, &[AGENCY], TIME_TO_FIX, &[Stat::Median])?;
    Aggregator::sort_by_stat(&mut per_agency, Stat::Median, false);
    report.note(
        "Fastest agencies by median time to fix",
        format_medians(&per_agency[..per_agency.len().min(5)]),
    );

    let nypd = fixed.filter_eq(AGENCY, "NYPD")?;
    let mut by_type = Aggregator::group_stats(&nypd, &[COMPLAINT], TIME_TO_FIX, &[Stat::Median])?;
    Aggregator::sort_by_stat(&mut by_type, Stat::Median, false);
    let body = by_type
        .iter()
        .map(|g| {
            format!(
                "{}  {}",
                g.key.join("/"),
                format_millis(g.get(Stat::Median).unwrap_or(f64::NAN))
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    report.note("NYPD median time to fix by complaint type", body);

    let by_borough = Aggregator::group_stats(&fixed, &[AGENCY, BOROUGH], TIME_TO_FIX, &[Stat::Median])?;
    report.note("Median time to fix by agency and borough", format_medians(&by_borough));

    let medians = Aggregator::pivot(&fixed, AGENCY, BOROUGH, TIME_TO_FIX, Stat::Median)?;
    let body = medians
        .row_labels
        .iter()
        .map(|agency| {
            let cells: Vec<String> = medians
                .column_labels
                .iter()
                .map(|borough| {
                    let cell = medians.get(agency, borough).map_or_else(|| "-".to_string(), format_millis);
                    format!("{borough} {cell}")
                })
                .collect();
            format!("{agency}  {}", cells.join("  "))
        })
        .collect::<Vec<_>>()
        .join("\n");
    report.note("Median time to fix, agency by borough", body);

    let mut means = Aggregator::pivot(&fixed, AGENCY, BOROUGH, TIME_TO_FIX, Stat::Mean)?;
    means.sort_by_column("BRONX", true);
    let body = means
        .row_labels
        .iter()
        .take(5)
        .map(|agency| {
            let cell = |borough: &str| {
                means
                    .get(agency, borough)
                    .map(format_millis)
                    .unwrap_or_else(|| "-".to_string())
            };
            format!(
                "{agency}  Bronx {}  Staten Island {}",
                cell("BRONX"),
                cell("STATEN ISLAND")
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    report.note("Slowest agencies in the Bronx vs Staten Island, mean time to fix", body);
    Ok(())
}

/// One line per group: key, median time to fix and group size.
fn format_medians(groups: &[GroupSummary]) -> String {
    groups
        .iter()
        .map(|g| {
            format!(
                "{}  median {}  size {}",
                g.key.join("/"),
                format_millis(g.get(Stat::Median).unwrap_or(f64::NAN)),
                g.size
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn holidays(rows: &RowSet, report: &mut Report<'_>) -> Result<(), FrameError> {
    let days = [
        ("Top complaints on Thanksgiving 2020", NaiveDate::from_ymd_opt(2020, 11, 26)),
        ("Top complaints the day before Thanksgiving 2020", NaiveDate::from_ymd_opt(2020, 11, 25)),
    ];
    for (title, day) in days {
        let Some(day) = day else {
            continue;
        };
        let start = day.and_time(NaiveTime::MIN);
        let on_day = rows.filter_time_range(CREATED, start, start + TimeDelta::days(1))?;
        report.note(
            title,
            format_counts(&top(Aggregator::value_counts(&on_day, COMPLAINT)?, 10)),
        );
    }

    let christmas = rows.filter_calendar(
        CREATED,
        &[(CalendarField::Month, 12), (CalendarField::Day, 25)],
    )?;
    report.note(
        "Top complaints on Christmas day, all years",
        format_counts(&top(Aggregator::value_counts(&christmas, COMPLAINT)?, 10)),
    );
    Ok(())
}

fn fireworks(rows: &RowSet, report: &mut Report<'_>) -> Result<(), FrameError> {
    let fireworks = rows.filter_contains(COMPLAINT, "illegal firework", true)?;
    let named = DataProcessor::calendar_field(&fireworks, CREATED, CalendarField::MonthName, "create_month")?;
    let summer = named.filter_in("create_month", &SUMMER)?;
    let summer = DataProcessor::calendar_field(&summer, CREATED, CalendarField::Year, "year")?;
    let summer = DataProcessor::concat(&summer, &["year", "create_month"], " ", "monthyear")?;

    let counts = Aggregator::value_counts_by_key(&summer, "monthyear")?;
    report.note("Summer fireworks complaints by month", format_counts(&counts));
    report.chart(
        ChartPlotter::from_value_counts("summer fireworks", &counts),
        DisplayOptions::default().title("Summer illegal fireworks complaints"),
    );
    Ok(())
}

fn channels(rows: &RowSet, report: &mut Report<'_>) -> Result<(), FrameError> {
    let per_agency = Aggregator::top_n_per_group(rows, AGENCY, CHANNEL, 3)?;
    let body = Aggregator::rank_across_groups(&per_agency)
        .into_iter()
        .take(10)
        .map(|(agency, channel, count)| format!("{agency}  {channel}  {count}"))
        .collect::<Vec<_>>()
        .join("\n");
    report.note("Submission channels per agency", body);
    Ok(())
}

fn format_buckets(series: &TimeSeries, layout: &str, n: usize) -> String {
    let lines: Vec<String> = series
        .sorted_by_value_desc()
        .iter()
        .take(n)
        .map(|b| {
            format!(
                "{}  {}",
                b.start.format(layout),
                format_number(b.value)
            )
        })
        .collect();
    if lines.is_empty() {
        "(no rows)".to_string()
    } else {
        lines.join("\n")
    }
}
