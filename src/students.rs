//! Typed access to the dashboard's student endpoints.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use crate::{CacheMode, FetchClient, FetchError, RequestOptions, Result, Url};

/// Collection endpoint, resolved against the client's base address.
pub const STUDENTS_RESOURCE: &str = "/api/students";

/// Page sizes offered by the dashboard.
pub const PAGINATION_LIMITS: [u32; 4] = [10, 20, 50, 100];

pub const PROGRAMS: [&str; 8] = [
    "Bachelors in Computer Science",
    "Masters in Business",
    "PhD in Physics",
    "Undergraduate Arts",
    "Masters in Engineering",
    "Bachelors in Medicine",
    "Masters in Data Science",
    "PhD in Chemistry",
];

/// Application status of a student.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StudentStatus {
    Pending,
    Approved,
    Rejected,
    #[serde(rename = "Interview Scheduled")]
    InterviewScheduled,
    #[serde(rename = "Documents Required")]
    DocumentsRequired,
    #[serde(rename = "Under Review")]
    UnderReview,
}

impl StudentStatus {
    pub const ALL: [Self; 6] = [
        Self::Pending,
        Self::Approved,
        Self::Rejected,
        Self::InterviewScheduled,
        Self::DocumentsRequired,
        Self::UnderReview,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
            Self::InterviewScheduled => "Interview Scheduled",
            Self::DocumentsRequired => "Documents Required",
            Self::UnderReview => "Under Review",
        }
    }
}

impl fmt::Display for StudentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    pub email: String,
    pub program: String,
    pub status: StudentStatus,
    pub application_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// One page of the student listing.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentPage {
    #[serde(default)]
    pub data: Vec<Student>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub total_pages: u32,
}

/// Listing filters. Empty strings count as absent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StudentQuery {
    pub page: u32,
    pub page_size: u32,
    /// Case-insensitive name match, sent as `name`.
    pub search: Option<String>,
    pub status: Option<StudentStatus>,
    pub program: Option<String>,
}

impl Default for StudentQuery {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: PAGINATION_LIMITS[0],
            search: None,
            status: None,
            program: None,
        }
    }
}

impl StudentQuery {
    /// Query string for the listing endpoint, including the leading `?`.
    pub fn to_query_string(&self) -> String {
        let non_empty = |value: &Option<String>| value.clone().filter(|value| !value.is_empty());
        build_query_params([
            ("page", Some(self.page.to_string())),
            ("limit", Some(self.page_size.to_string())),
            ("name", non_empty(&self.search)),
            ("status", self.status.map(|status| status.as_str().to_owned())),
            ("program", non_empty(&self.program)),
        ])
    }
}

/// Encodes the present pairs as `?k=v&...`, or `""` when none are present.
pub fn build_query_params<I, K, V>(pairs: I) -> String
where
    I: IntoIterator<Item = (K, Option<V>)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    let mut any = false;
    for (key, value) in pairs {
        if let Some(value) = value {
            serializer.append_pair(key.as_ref(), value.as_ref());
            any = true;
        }
    }
    if any {
        format!("?{}", serializer.finish())
    } else {
        String::new()
    }
}

#[derive(Serialize)]
struct StatusUpdate<'a> {
    id: &'a str,
    status: StudentStatus,
}

/// Student endpoints on top of a [`FetchClient`].
#[derive(Clone, Debug)]
pub struct StudentsApi {
    client: FetchClient,
}

impl StudentsApi {
    pub fn new(client: FetchClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &FetchClient {
        &self.client
    }

    /// Fetches one page of students matching `query`.
    pub async fn list(&self, query: &StudentQuery) -> Result<StudentPage> {
        let resource = format!("{STUDENTS_RESOURCE}{}", query.to_query_string());
        let options = RequestOptions::get()
            .validate_status(|status| status.is_success())
            .tags(["students", "list"])
            .cache(CacheMode::NoCache);

        self.client.execute(&resource, options).await?.into_json()
    }

    /// Sets the application status of student `id` and returns the updated record.
    pub async fn update_status(&self, id: &str, status: StudentStatus) -> Result<Student> {
        let url = self.student_url(id)?;
        let options = RequestOptions::patch()
            .json(&StatusUpdate { id, status })?
            .tags(["students"]);

        self.client.execute(url.as_str(), options).await?.into_json()
    }

    /// URL of a single student, with `id` percent-encoded as one path segment.
    fn student_url(&self, id: &str) -> Result<Url> {
        let mut url = self.client.resolve(STUDENTS_RESOURCE)?;
        url.path_segments_mut()
            .map_err(|()| {
                FetchError::InvalidRequest(format!("cannot append an id to {STUDENTS_RESOURCE}"))
            })?
            .pop_if_empty()
            .push(id);
        Ok(url)
    }
}
