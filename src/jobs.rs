//! Applied-jobs export from iimjobs.com
//!
//! The API is called with the session cookie of a logged-in browser. Pages of
//! raw JSON jobs are flattened into [`AppliedJob`] records and written as CSV.

use std::path::{Path, PathBuf};
use std::time::Duration;
use chrono::{DateTime, Utc};
use log::{debug, info};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, COOKIE, REFERER};
use serde::Serialize;
use serde_json::Value;
use crate::atomic::write_atomically;
use crate::comic::USER_AGENT;
use crate::config::JOBS_COOKIE_ENV;
use crate::error::{Error, Result};

/// Page the API calls are made on behalf of
pub const APPLIED_JOBS_URL: &str = "https://www.iimjobs.com/applied-jobs";

/// Paginated applied-jobs endpoint; `{page}` is replaced by the page number
pub const APPLIED_JOBS_API: &str = "https://gladiator.iimjobs.com/job/applied-jobs?page={page}&status=&ref=menu&referenceText=menu&refPool=%7B%22ref%22:%22menu%22%7D";

/// A full page; anything shorter is the last one
pub const PAGE_SIZE: usize = 50;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// CSV columns, in order
pub const CSV_COLUMNS: [&str; 17] = [
    "application_id",
    "application_date",
    "title",
    "company",
    "locations",
    "job_url",
    "app_status_code",
    "app_status_label",
    "recruiter_name",
    "recruiter_email",
    "recruiter_org",
    "recruiter_last_login",
    "recruiter_last_active",
    "views",
    "app_count",
    "recruiter_actions",
    "invite_status",
];

/// One exported row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AppliedJob {
    pub application_id: Option<i64>,
    pub application_date: Option<String>,
    pub title: String,
    pub company: String,
    pub locations: String,
    pub job_url: String,
    pub app_status_code: Option<i64>,
    pub app_status_label: String,
    pub recruiter_name: String,
    pub recruiter_email: String,
    pub recruiter_org: String,
    pub recruiter_last_login: String,
    pub recruiter_last_active: String,
    pub views: Option<i64>,
    pub app_count: Option<i64>,
    pub recruiter_actions: Option<i64>,
    pub invite_status: Option<i64>,
}

/// Human-readable application status
pub fn status_label(code: Option<i64>) -> &'static str {
    match code {
        Some(0) => "APPLIED/SENT",
        Some(1) => "SHORTLISTED",
        Some(2) => "NOT SUITABLE",
        Some(3) => "SAVED FOR FUTURE",
        Some(4) => "VIEWED",
        Some(5) => "DOWNLOADED",
        Some(9) => "ROUND ZERO VIEWED",
        Some(101) => "YOUR STATUS HAS BEEN CHANGED",
        _ => "UNKNOWN",
    }
}

/// Epoch milliseconds as an ISO-8601 UTC timestamp with a `+00:00` offset
///
/// Zero, missing or non-numeric values give `None`. Fractional seconds are
/// written with microsecond precision only when present.
pub fn to_iso_date(timestamp_ms: Option<&Value>) -> Option<String> {
    let ms = timestamp_ms?.as_f64()?;
    if ms == 0.0 {
        return None;
    }

    let micros = (ms * 1000.0).round() as i64;
    let secs = micros.div_euclid(1_000_000);
    let nanos = (micros.rem_euclid(1_000_000) * 1000) as u32;
    let date: DateTime<Utc> = DateTime::from_timestamp(secs, nanos)?;

    let format = if nanos == 0 {
        "%Y-%m-%dT%H:%M:%S+00:00"
    } else {
        "%Y-%m-%dT%H:%M:%S%.6f+00:00"
    };
    Some(date.format(format).to_string())
}

/// Flatten one raw API job into a row
pub fn serialize_job(raw: &Value) -> AppliedJob {
    let job = &raw["jobDetail"];
    let recruiter = &raw["recruiterDetail"];
    let status = integer(&raw["app_status"]);

    let locations = job["location"]
        .as_array()
        .map(|locations| {
            locations
                .iter()
                .filter_map(|location| location["name"].as_str())
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_default();

    let organisation = text(&recruiter["organisationName"]);
    let company = if organisation.is_empty() {
        text(&job["company"])
    } else {
        organisation.clone()
    };

    AppliedJob {
        application_id: integer(&raw["applicationId"]),
        application_date: to_iso_date(raw.get("applicationDate")),
        title: text(&job["title"]),
        company,
        locations,
        job_url: text(&job["jobUrl"]),
        app_status_code: status,
        app_status_label: status_label(status).to_string(),
        recruiter_name: text(&recruiter["name"]),
        recruiter_email: text(&recruiter["email"]),
        recruiter_org: organisation,
        recruiter_last_login: text(&raw["recr_last_login"]["loginDate"]),
        recruiter_last_active: text(&raw["lastActive"]["lastActiveDate"]),
        views: integer(&raw["views"]),
        app_count: integer(&raw["app_count"]),
        recruiter_actions: integer(&raw["recruiterActions"]),
        invite_status: integer(&raw["inviteStatus"]),
    }
}

/// String form of a scalar; null, missing and containers become empty
fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Jobs array of one API response; a missing `data.jobs` is an empty page
pub fn page_jobs(payload: &Value) -> Vec<Value> {
    payload["data"]["jobs"].as_array().cloned().unwrap_or_default()
}

/// Call `fetch_page` for page 0, 1, … until a page is empty or short
pub fn collect_pages<F>(mut fetch_page: F) -> Result<Vec<Value>>
where
    F: FnMut(usize) -> Result<Vec<Value>>,
{
    let mut jobs = Vec::new();
    let mut page = 0;

    loop {
        let batch = fetch_page(page)?;
        debug!("Page {}: {} job(s)", page, batch.len());
        if batch.is_empty() {
            break;
        }
        let last = batch.len() < PAGE_SIZE;
        jobs.extend(batch);
        if last {
            break;
        }
        page += 1;
    }

    Ok(jobs)
}

/// Authenticated API client
pub struct JobsClient {
    client: Client,
}

impl JobsClient {
    /// Build a client sending `cookie` with every request
    ///
    /// An empty cookie is a configuration error; nothing is sent.
    pub fn new(cookie: &str) -> Result<Self> {
        let cookie = cookie.trim();
        if cookie.is_empty() {
            return Err(Error::MissingConfig(JOBS_COOKIE_ENV.to_string()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));
        headers.insert(REFERER, HeaderValue::from_static(APPLIED_JOBS_URL));
        let mut cookie = HeaderValue::from_str(cookie)
            .map_err(|e| Error::General(format!("Invalid {}: {}", JOBS_COOKIE_ENV, e)))?;
        cookie.set_sensitive(true);
        headers.insert(COOKIE, cookie);

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }

    /// Raw jobs of one API page
    pub fn fetch_page(&self, page: usize) -> Result<Vec<Value>> {
        let url = APPLIED_JOBS_API.replace("{page}", &page.to_string());
        let payload: Value = self.client.get(url).send()?.error_for_status()?.json()?;
        Ok(page_jobs(&payload))
    }

    /// Every applied job across all pages
    pub fn fetch_applied_jobs(&self) -> Result<Vec<Value>> {
        collect_pages(|page| self.fetch_page(page))
    }
}

/// Write rows to `output` as CSV with a header row
pub fn write_jobs_csv(jobs: &[AppliedJob], output: &Path) -> Result<()> {
    write_atomically(output, |file| {
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        writer.write_record(CSV_COLUMNS)?;
        for job in jobs {
            writer.serialize(job)?;
        }
        writer.flush()?;
        Ok(())
    })
}

/// Export every applied job to `output`
///
/// Returns the output path and the number of rows written.
///
/// # Example
///
/// ```no_run
/// use scrubkit::jobs::export_applied_jobs;
/// use std::path::Path;
///
/// let cookie = std::env::var("IIMJOBS_COOKIE").unwrap_or_default();
/// let (path, count) = export_applied_jobs(&cookie, Path::new("applied.csv"))
///     .expect("Export failed");
/// println!("Exported {} jobs to {}", count, path.display());
/// ```
pub fn export_applied_jobs(cookie: &str, output: &Path) -> Result<(PathBuf, usize)> {
    let client = JobsClient::new(cookie)?;
    let raw_jobs = client.fetch_applied_jobs()?;
    let jobs: Vec<AppliedJob> = raw_jobs.iter().map(serialize_job).collect();

    write_jobs_csv(&jobs, output)?;
    info!("Exported {} jobs to {}", jobs.len(), output.display());
    Ok((output.to_path_buf(), jobs.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample_job() -> Value {
        json!({
            "applicationId": 987654,
            "applicationDate": 1709287200000i64,
            "app_status": 1,
            "views": 3,
            "app_count": 120,
            "recruiterActions": 2,
            "inviteStatus": 0,
            "jobDetail": {
                "title": "Senior Analyst",
                "company": "Fallback Co",
                "jobUrl": "https://www.iimjobs.com/j/senior-analyst-1234",
                "location": [{"name": " Mumbai "}, {"name": ""}, {"name": "Pune"}, {}]
            },
            "recruiterDetail": {
                "name": "Priya",
                "email": "priya@example.com",
                "organisationName": "Acme Analytics"
            },
            "recr_last_login": {"loginDate": "2024-03-05"},
            "lastActive": "yesterday"
        })
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(status_label(Some(0)), "APPLIED/SENT");
        assert_eq!(status_label(Some(9)), "ROUND ZERO VIEWED");
        assert_eq!(status_label(Some(101)), "YOUR STATUS HAS BEEN CHANGED");
        assert_eq!(status_label(Some(42)), "UNKNOWN");
        assert_eq!(status_label(None), "UNKNOWN");
    }

    #[test]
    fn test_to_iso_date() {
        assert_eq!(
            to_iso_date(Some(&json!(1709287200000i64))).as_deref(),
            Some("2024-03-01T10:00:00+00:00")
        );
        assert_eq!(
            to_iso_date(Some(&json!(1709287200123i64))).as_deref(),
            Some("2024-03-01T10:00:00.123000+00:00")
        );
        assert_eq!(to_iso_date(Some(&json!(0))), None);
        assert_eq!(to_iso_date(Some(&Value::Null)), None);
        assert_eq!(to_iso_date(None), None);
    }

    #[test]
    fn test_serialize_job() {
        let job = serialize_job(&sample_job());

        assert_eq!(job.application_id, Some(987654));
        assert_eq!(job.application_date.as_deref(), Some("2024-03-01T10:00:00+00:00"));
        assert_eq!(job.title, "Senior Analyst");
        assert_eq!(job.company, "Acme Analytics");
        assert_eq!(job.locations, "Mumbai, Pune");
        assert_eq!(job.app_status_code, Some(1));
        assert_eq!(job.app_status_label, "SHORTLISTED");
        assert_eq!(job.recruiter_org, "Acme Analytics");
        assert_eq!(job.recruiter_last_login, "2024-03-05");
        // Not an object
        assert_eq!(job.recruiter_last_active, "");
        assert_eq!(job.views, Some(3));
        assert_eq!(job.invite_status, Some(0));
    }

    #[test]
    fn test_company_falls_back_to_job() {
        let mut raw = sample_job();
        raw["recruiterDetail"] = Value::Null;

        let job = serialize_job(&raw);

        assert_eq!(job.company, "Fallback Co");
        assert_eq!(job.recruiter_org, "");
        assert_eq!(job.recruiter_name, "");
    }

    #[test]
    fn test_empty_job() {
        let job = serialize_job(&json!({}));
        assert_eq!(job.app_status_label, "UNKNOWN");
        assert_eq!(job.application_date, None);
        assert_eq!(job.locations, "");
    }

    #[test]
    fn test_page_jobs() {
        assert_eq!(page_jobs(&json!({"data": {"jobs": [1, 2]}})).len(), 2);
        assert!(page_jobs(&json!({"data": null})).is_empty());
        assert!(page_jobs(&json!({})).is_empty());
    }

    #[test]
    fn test_collect_pages_stops_on_short_page() {
        let mut requested = Vec::new();
        let jobs = collect_pages(|page| {
            requested.push(page);
            let size = if page < 2 { PAGE_SIZE } else { 7 };
            Ok(vec![json!({}); size])
        })
        .unwrap();

        assert_eq!(requested, vec![0, 1, 2]);
        assert_eq!(jobs.len(), 2 * PAGE_SIZE + 7);
    }

    #[test]
    fn test_collect_pages_stops_on_empty_page() {
        let mut calls = 0;
        let jobs = collect_pages(|page| {
            calls += 1;
            Ok(if page == 0 { vec![json!({}); PAGE_SIZE] } else { Vec::new() })
        })
        .unwrap();

        assert_eq!(calls, 2);
        assert_eq!(jobs.len(), PAGE_SIZE);
    }

    #[test]
    fn test_collect_pages_propagates_errors() {
        let result = collect_pages(|_| Err(Error::General("boom".to_string())));
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_cookie_fails_before_io() {
        assert!(matches!(JobsClient::new("  "), Err(Error::MissingConfig(_))));
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("jobs.csv");
        assert!(matches!(export_applied_jobs("", &output), Err(Error::MissingConfig(_))));
        assert!(!output.exists());
    }

    #[test]
    fn test_write_jobs_csv() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("jobs.csv");
        let jobs = vec![serialize_job(&sample_job()), serialize_job(&json!({}))];

        write_jobs_csv(&jobs, &output).unwrap();

        let mut reader = csv::Reader::from_path(&output).unwrap();
        let header: Vec<String> = reader.headers().unwrap().iter().map(str::to_string).collect();
        assert_eq!(header, CSV_COLUMNS.iter().map(|c| c.to_string()).collect::<Vec<_>>());

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][0], "987654");
        assert_eq!(&rows[0][4], "Mumbai, Pune");
        assert_eq!(&rows[1][7], "UNKNOWN");
        assert_eq!(&rows[1][0], "");
    }

    #[test]
    fn test_empty_export_still_has_header() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("jobs.csv");

        write_jobs_csv(&[], &output).unwrap();

        let content = std::fs::read_to_string(&output).unwrap();
        assert_eq!(content.trim_end(), CSV_COLUMNS.join(","));
    }
}
