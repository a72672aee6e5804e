use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, SecondsFormat, TimeZone, Utc};

use shared_config::AppConfig;

/// Wall clock of the clinic. Queue numbers, dashboards and "today" filters
/// are all keyed on the clinic-local calendar date.
#[derive(Debug, Clone, Copy)]
pub struct ClinicClock {
    offset: FixedOffset,
}

impl ClinicClock {
    pub fn new(offset_minutes: i32) -> Self {
        let offset = FixedOffset::east_opt(offset_minutes * 60).unwrap_or_else(|| Utc.fix());
        Self { offset }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.clinic_utc_offset_minutes)
    }

    pub fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    pub fn today(&self) -> NaiveDate {
        self.local_date(self.now())
    }

    pub fn local(&self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        instant.with_timezone(&self.offset)
    }

    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        self.local(instant).date_naive()
    }

    /// Half-open UTC range `[start, end)` covering one clinic-local day.
    pub fn day_bounds(&self, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let local_midnight = date.and_time(NaiveTime::default());
        let utc_midnight = local_midnight - Duration::seconds(self.offset.local_minus_utc() as i64);
        let start = Utc.from_utc_datetime(&utc_midnight);
        (start, start + Duration::days(1))
    }

    /// UTC range covering `first..=last` clinic days.
    pub fn range_bounds(&self, first: NaiveDate, last: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let (start, _) = self.day_bounds(first);
        let (_, end) = self.day_bounds(last);
        (start, end)
    }
}

/// Timestamp formatted for PostgREST filters (`Z` suffix, nothing to percent-encode).
/// Sub-second digits are kept when present so range bounds stay exact.
pub fn query_timestamp(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}
