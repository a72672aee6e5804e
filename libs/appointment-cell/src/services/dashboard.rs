use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_utils::clock::{query_timestamp, ClinicClock};

use crate::models::{AppointmentDetails, AppointmentError, SecretaryDashboard, WeeklyChart};
use crate::services::booking::DETAILS_SELECT;

const WEEK_DAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

#[derive(Debug, Deserialize)]
struct ScheduledAt {
    scheduled_time: DateTime<Utc>,
}

/// Monday of the clinic week containing `today`.
pub fn week_start(today: NaiveDate) -> NaiveDate {
    today - Duration::days(today.weekday().num_days_from_monday() as i64)
}

/// Appointment counts for Monday through Sunday of the week starting `monday`.
pub fn weekly_counts(clock: &ClinicClock, monday: NaiveDate, times: &[DateTime<Utc>]) -> WeeklyChart {
    let mut data = vec![0usize; 7];
    for time in times {
        let offset = (clock.local_date(*time) - monday).num_days();
        if (0..7).contains(&offset) {
            data[offset as usize] += 1;
        }
    }

    WeeklyChart {
        labels: WEEK_DAYS.iter().map(|d| d.to_string()).collect(),
        data,
    }
}

pub struct SecretaryDashboardService {
    supabase: SupabaseClient,
    clock: ClinicClock,
}

impl SecretaryDashboardService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            clock: ClinicClock::from_config(config),
        }
    }

    pub async fn dashboard(&self, auth_token: &str) -> Result<SecretaryDashboard, AppointmentError> {
        let today = self.clock.today();
        let (day_start, day_end) = self.clock.day_bounds(today);
        let monday = week_start(today);
        let (week_from, week_to) = self.clock.range_bounds(monday, monday + Duration::days(6));

        debug!("Building secretary dashboard for {}", today);

        let schedule_path = format!(
            "/rest/v1/appointments?scheduled_time=gte.{}&scheduled_time=lt.{}&order=scheduled_time.desc&select={}",
            query_timestamp(day_start),
            query_timestamp(day_end),
            DETAILS_SELECT
        );
        let patients_path = format!(
            "/rest/v1/patients?created_at=gte.{}&created_at=lt.{}&select=id",
            query_timestamp(day_start),
            query_timestamp(day_end)
        );
        let week_path = format!(
            "/rest/v1/appointments?scheduled_time=gte.{}&scheduled_time=lt.{}&select=scheduled_time",
            query_timestamp(week_from),
            query_timestamp(week_to)
        );

        let (schedule, new_patients, week) = futures::try_join!(
            self.supabase.request::<Vec<Value>>(Method::GET, &schedule_path, Some(auth_token), None),
            self.supabase.request::<Vec<Value>>(Method::GET, &patients_path, Some(auth_token), None),
            self.supabase.request::<Vec<ScheduledAt>>(Method::GET, &week_path, Some(auth_token), None),
        )?;

        let today_appointments = schedule
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<AppointmentDetails>, _>>()?;
        let revenue_today_iqd = today_appointments.iter().map(|a| a.appointment.iqd_amount).sum();
        let times: Vec<DateTime<Utc>> = week.into_iter().map(|row| row.scheduled_time).collect();

        Ok(SecretaryDashboard {
            appointments_today: today_appointments.len(),
            patients_today: new_patients.len(),
            new_patients_today: new_patients.len(),
            revenue_today_iqd,
            weekly_chart: weekly_counts(&self.clock, monday, &times),
            today_appointments,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn week_starts_on_monday() {
        let thursday = NaiveDate::from_ymd_opt(2025, 3, 13).unwrap();
        assert_eq!(week_start(thursday), NaiveDate::from_ymd_opt(2025, 3, 10).unwrap());
        let monday = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        assert_eq!(week_start(monday), monday);
    }

    #[test]
    fn weekly_counts_use_clinic_days() {
        let clock = ClinicClock::new(180);
        let monday = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let times = vec![
            // 22:30 UTC Sunday is already Monday in the clinic
            Utc.with_ymd_and_hms(2025, 3, 9, 22, 30, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 10, 8, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 16, 12, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 17, 12, 0, 0).unwrap(),
        ];

        let chart = weekly_counts(&clock, monday, &times);
        assert_eq!(chart.labels[0], "Mon");
        assert_eq!(chart.data, vec![2, 0, 0, 0, 0, 0, 1]);
    }
}
