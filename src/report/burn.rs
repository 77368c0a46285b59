//! Burn-rate aggregation: opened vs. closed task counts per day, week and
//! month, plus the running net-open series drawn on the burn chart.

use serde::Serialize;

use super::calendar::ViewerTimezone;
use super::classify::{classify_rows, RawStatusRow, StatusTransitionEvent, Transition};
use super::format::format_count;
use super::ReportError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PeriodCounts {
    pub opened: u64,
    pub closed: u64,
}

impl PeriodCounts {
    fn record(&mut self, transition: Transition) {
        match transition {
            Transition::Open => self.opened += 1,
            Transition::Close => self.closed += 1,
            Transition::Ignored => {}
        }
    }

    fn absorb(&mut self, other: PeriodCounts) {
        self.opened += other.opened;
        self.closed += other.closed;
    }

    /// Opened minus closed.
    pub fn change(&self) -> i64 {
        self.opened as i64 - self.closed as i64
    }
}

/// Presentation tag for a row. Day rows carry none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RowClass {
    Week,
    Month,
    Aggregate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeltaTone {
    /// More tasks opened than closed.
    Red,
    Green,
}

impl DeltaTone {
    fn as_str(self) -> &'static str {
        match self {
            DeltaTone::Red => "red",
            DeltaTone::Green => "green",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BurnRow {
    pub label: String,
    pub opened: String,
    pub closed: String,
    pub delta: String,
    pub tone: DeltaTone,
    #[serde(skip)]
    pub counts: PeriodCounts,
}

impl BurnRow {
    fn new(label: impl Into<String>, counts: PeriodCounts) -> Self {
        let change = counts.change();
        let (delta, tone) = if change > 0 {
            (format!("+{}", format_count(change)), DeltaTone::Red)
        } else {
            (format_count(change), DeltaTone::Green)
        };
        Self {
            label: label.into(),
            opened: format_count(counts.opened as i64),
            closed: format_count(counts.closed as i64),
            delta,
            tone,
            counts,
        }
    }

    /// The change column as table markup, e.g. `<span class="red">+3</span>`.
    pub fn delta_markup(&self) -> String {
        format!(r#"<span class="{}">{}</span>"#, self.tone.as_str(), self.delta)
    }
}

/// Net-open task count over time. `x` and `y` always have equal length.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BurnSeries {
    pub x: Vec<i64>,
    pub y: Vec<i64>,
}

impl BurnSeries {
    fn record(&mut self, timestamp: i64, value: i64) {
        match (self.x.last(), self.y.last_mut()) {
            (Some(&last), Some(slot)) if last == timestamp => *slot = value,
            _ => {
                self.x.push(timestamp);
                self.y.push(value);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// Rows newest first, with `row_classes` aligned index for index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BurnReport {
    pub rows: Vec<BurnRow>,
    pub row_classes: Vec<Option<RowClass>>,
    pub series: BurnSeries,
}

struct DayBucket {
    /// Time of the last event that day.
    epoch: i64,
    day: (i32, u32),
    week: (i32, u32),
    month: (i32, u32),
    counts: PeriodCounts,
}

struct Rollup {
    key: (i32, u32),
    /// Time of the first day bucket in the period; used for its label.
    epoch: i64,
    counts: PeriodCounts,
}

impl Rollup {
    fn start(key: (i32, u32), epoch: i64) -> Self {
        Self {
            key,
            epoch,
            counts: PeriodCounts::default(),
        }
    }
}

/// Classify raw transaction rows and build the burn report.
pub fn build_burn_report(
    rows: &[RawStatusRow],
    tz: ViewerTimezone,
) -> Result<BurnReport, ReportError> {
    let events = classify_rows(rows)?;
    aggregate(&events, tz)
}

/// Build the report from events already in time order.
pub fn aggregate(
    events: &[StatusTransitionEvent],
    tz: ViewerTimezone,
) -> Result<BurnReport, ReportError> {
    let days = bucket_by_day(events, tz)?;

    let mut emitted: Vec<(BurnRow, Option<RowClass>)> = Vec::with_capacity(days.len() + 3);
    let mut week: Option<Rollup> = None;
    let mut month: Option<Rollup> = None;
    let mut all_time = PeriodCounts::default();

    for day in &days {
        if week.as_ref().map(|w| w.key) != Some(day.week) {
            if let Some(done) = week.take() {
                let label = format!("Week of {}", tz.date_label(done.epoch));
                emitted.push((BurnRow::new(label, done.counts), Some(RowClass::Week)));
            }
            week = Some(Rollup::start(day.week, day.epoch));
        }

        if month.as_ref().map(|m| m.key) != Some(day.month) {
            if let Some(done) = month.take() {
                let label = tz.month_label(done.epoch);
                emitted.push((BurnRow::new(label, done.counts), Some(RowClass::Month)));
            }
            month = Some(Rollup::start(day.month, day.epoch));
        }

        emitted.push((BurnRow::new(tz.date_label(day.epoch), day.counts), None));

        for period in [week.as_mut(), month.as_mut()].into_iter().flatten() {
            period.counts.absorb(day.counts);
        }
        all_time.absorb(day.counts);
    }

    if let Some(w) = week {
        emitted.push((BurnRow::new("Week To Date", w.counts), Some(RowClass::Week)));
    }
    if let Some(m) = month {
        emitted.push((BurnRow::new("Month To Date", m.counts), Some(RowClass::Month)));
    }
    emitted.push((BurnRow::new("All Time", all_time), Some(RowClass::Aggregate)));

    emitted.reverse();
    let (rows, row_classes): (Vec<_>, Vec<_>) = emitted.into_iter().unzip();

    tracing::debug!(
        events = events.len(),
        days = days.len(),
        "built burn report"
    );

    let series = build_series(events);
    if series.is_empty() {
        tracing::debug!("burn report has no chart points");
    } else {
        tracing::debug!(points = series.len(), "burn chart series built");
    }

    Ok(BurnReport {
        rows,
        row_classes,
        series,
    })
}

fn bucket_by_day(
    events: &[StatusTransitionEvent],
    tz: ViewerTimezone,
) -> Result<Vec<DayBucket>, ReportError> {
    let mut days: Vec<DayBucket> = Vec::new();

    for (i, event) in events.iter().enumerate().filter(|(_, e)| e.counts()) {
        let bad = || ReportError::BadTimestamp {
            row: i,
            timestamp: event.timestamp,
        };
        let day = tz.day_key(event.timestamp).ok_or_else(bad)?;

        // Input is time ordered, so a day's events are contiguous.
        if let Some(bucket) = days.last_mut().filter(|b| b.day == day) {
            bucket.epoch = event.timestamp;
            bucket.counts.record(event.transition);
            continue;
        }

        let mut counts = PeriodCounts::default();
        counts.record(event.transition);
        days.push(DayBucket {
            epoch: event.timestamp,
            day,
            week: tz.week_key(event.timestamp).ok_or_else(bad)?,
            month: tz.month_key(event.timestamp).ok_or_else(bad)?,
            counts,
        });
    }

    Ok(days)
}

/// Running net-open count at every open/close event. Events sharing a
/// timestamp collapse into one point holding the last value.
pub fn build_series(events: &[StatusTransitionEvent]) -> BurnSeries {
    let mut series = BurnSeries::default();
    let mut counter: i64 = 0;

    for event in events {
        match event.transition {
            Transition::Open => counter += 1,
            Transition::Close => counter -= 1,
            Transition::Ignored => continue,
        }
        series.record(event.timestamp, counter);
    }

    series
}
