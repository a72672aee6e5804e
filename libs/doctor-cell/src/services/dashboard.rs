use std::collections::HashSet;

use chrono::{Duration, NaiveDate};
use futures::try_join;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::User;
use shared_utils::clock::{query_timestamp, ClinicClock};

use crate::models::{
    ArchiveSummary, ChartPoint, Doctor, DoctorAppointment, DoctorDashboard, DoctorError,
    HomeSummary, PatientRecord,
};
use crate::services::doctor::DoctorService;

const RECENT_ARCHIVES: usize = 5;
const RECENT_PATIENTS: usize = 5;
const CHART_DAYS: i64 = 7;

pub struct DoctorDashboardService {
    supabase: SupabaseClient,
    doctors: DoctorService,
    clock: ClinicClock,
}

impl DoctorDashboardService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            doctors: DoctorService::new(config),
            clock: ClinicClock::from_config(config),
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, path: &str, auth_token: &str) -> Result<Vec<T>, DoctorError> {
        let rows: Vec<Value> = self.supabase.request(Method::GET, path, Some(auth_token), None).await?;
        Ok(rows
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<T>, _>>()?)
    }

    pub async fn dashboard(&self, doctor: Doctor, auth_token: &str) -> Result<DoctorDashboard, DoctorError> {
        let today = self.clock.today();
        let first_day = today - Duration::days(CHART_DAYS - 1);
        let (week_start, week_end) = self.clock.range_bounds(first_day, today);
        let (today_start, today_end) = self.clock.day_bounds(today);
        debug!("Building dashboard for doctor {} on {}", doctor.id, today);

        let recent_archives_path = format!(
            "/rest/v1/patient_archives?doctor_id=eq.{}&select=*,patients(full_name)&order=created_at.desc&limit={}",
            doctor.id, RECENT_ARCHIVES
        );
        let archive_ids_path = format!("/rest/v1/patient_archives?doctor_id=eq.{}&select=id", doctor.id);
        let prescription_ids_path = format!("/rest/v1/prescriptions?doctor_id=eq.{}&select=id", doctor.id);
        let patient_ids_path = format!("/rest/v1/appointments?doctor_id=eq.{}&select=patient_id", doctor.id);
        let week_path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&scheduled_time=gte.{}&scheduled_time=lt.{}&select=*,patients(full_name)&order=scheduled_time.asc",
            doctor.id, query_timestamp(week_start), query_timestamp(week_end)
        );
        let new_patients_path = format!(
            "/rest/v1/patients?doctor_id=eq.{}&created_at=gte.{}&created_at=lt.{}&select=id",
            doctor.id, query_timestamp(today_start), query_timestamp(today_end)
        );

        let (recent_archives, archive_ids, prescription_ids, patient_ids, week, new_patients) = try_join!(
            self.fetch::<ArchiveSummary>(&recent_archives_path, auth_token),
            self.fetch::<Value>(&archive_ids_path, auth_token),
            self.fetch::<Value>(&prescription_ids_path, auth_token),
            self.fetch::<Value>(&patient_ids_path, auth_token),
            self.fetch::<DoctorAppointment>(&week_path, auth_token),
            self.fetch::<Value>(&new_patients_path, auth_token),
        )?;

        let patient_count = patient_ids
            .iter()
            .filter_map(|row| row.get("patient_id").and_then(Value::as_str))
            .collect::<HashSet<_>>()
            .len();

        let weekly_chart = weekly_chart(&self.clock, today, &week);
        let todays_appointments: Vec<DoctorAppointment> = week
            .into_iter()
            .filter(|a| self.clock.local_date(a.scheduled_time) == today)
            .collect();

        Ok(DoctorDashboard {
            doctor,
            recent_archives,
            archive_count: archive_ids.len(),
            prescription_count: prescription_ids.len(),
            patient_count,
            patients_today: distinct_patients(&todays_appointments),
            appointments_today: todays_appointments.len(),
            new_patients_today: new_patients.len(),
            weekly_chart,
            todays_appointments,
        })
    }

    /// Patients who have been booked with this doctor at least once.
    pub async fn records(&self, doctor_id: Uuid, auth_token: &str) -> Result<Vec<PatientRecord>, DoctorError> {
        let path = format!(
            "/rest/v1/patients?select=*,appointments!inner(doctor_id)&appointments.doctor_id=eq.{}&order=full_name.asc",
            doctor_id
        );
        self.fetch(&path, auth_token).await
    }

    pub async fn home_summary(&self, user: &User, auth_token: &str) -> Result<HomeSummary, DoctorError> {
        let doctors = self.doctors.list_available(Some(auth_token)).await?;

        if !user.is_doctor() {
            return Ok(HomeSummary {
                doctors,
                todays_appointments: vec![],
                next_queue_number: None,
                recent_patients: vec![],
            });
        }

        let doctor = self.doctors.get_doctor_by_user(&user.id, auth_token).await?;
        let (start, end) = self.clock.day_bounds(self.clock.today());

        let appointments_path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&scheduled_time=gte.{}&scheduled_time=lt.{}&select=*,patients(full_name)&order=scheduled_time.asc",
            doctor.id, query_timestamp(start), query_timestamp(end)
        );
        let patients_path = format!(
            "/rest/v1/patients?created_at=gte.{}&created_at=lt.{}&order=created_at.desc&limit={}",
            query_timestamp(start), query_timestamp(end), RECENT_PATIENTS
        );

        let (todays_appointments, recent_patients) = try_join!(
            self.fetch::<DoctorAppointment>(&appointments_path, auth_token),
            self.fetch::<PatientRecord>(&patients_path, auth_token),
        )?;

        Ok(HomeSummary {
            doctors,
            next_queue_number: todays_appointments.first().map(|a| a.queue_number),
            todays_appointments,
            recent_patients,
        })
    }
}

/// Appointment counts for the seven clinic days ending `today`, labelled Mon, Tue, ...
pub fn weekly_chart(clock: &ClinicClock, today: NaiveDate, appointments: &[DoctorAppointment]) -> Vec<ChartPoint> {
    (0..CHART_DAYS)
        .rev()
        .map(|back| {
            let date = today - Duration::days(back);
            let count = appointments
                .iter()
                .filter(|a| clock.local_date(a.scheduled_time) == date)
                .count();
            ChartPoint {
                label: date.format("%a").to_string(),
                date,
                count,
            }
        })
        .collect()
}

pub fn distinct_patients(appointments: &[DoctorAppointment]) -> usize {
    appointments
        .iter()
        .map(|a| a.patient_id)
        .collect::<HashSet<_>>()
        .len()
}
