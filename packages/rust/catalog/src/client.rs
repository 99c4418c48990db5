//! HTTP client for catalog pages.

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, info, instrument};
use url::Url;

use coursemap_shared::{CatalogConfig, CourseMapError, MajorSource, Requirement, Result};

use crate::courses::{CourseBlockParser, ParsedCourse};
use crate::requirements::parse_requirements_page;

/// User-Agent string for catalog requests.
const USER_AGENT: &str = concat!("coursemap/", env!("CARGO_PKG_VERSION"));

/// Fetches and parses catalog pages for one subject.
pub struct CatalogClient {
    client: Client,
    subject: String,
    parser: CourseBlockParser,
}

impl CatalogClient {
    /// Create a client for the configured subject and timeout.
    pub fn new(config: &CatalogConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CourseMapError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            subject: config.subject.to_uppercase(),
            parser: CourseBlockParser::new(&config.subject)?,
        })
    }

    /// GET a page and return its body. Non-2xx responses are errors.
    pub async fn fetch_html(&self, url: &Url) -> Result<String> {
        debug!(%url, "fetching catalog page");

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| CourseMapError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CourseMapError::Network(format!("{url}: HTTP {status}")));
        }

        response
            .text()
            .await
            .map_err(|e| CourseMapError::Network(format!("{url}: body read failed: {e}")))
    }

    /// Fetch a department course-description page and parse its course blocks.
    #[instrument(skip_all, fields(url = %url, subject = %self.subject))]
    pub async fn fetch_courses(&self, url: &Url) -> Result<Vec<ParsedCourse>> {
        let body = self.fetch_html(url).await?;
        let courses = self.parser.parse_page(&body)?;
        info!(count = courses.len(), "parsed course blocks");
        Ok(courses)
    }

    /// Fetch a major's requirement page and bucket the course codes it lists.
    #[instrument(skip_all, fields(major = %major.name))]
    pub async fn fetch_requirements(&self, major: &MajorSource) -> Result<Vec<Requirement>> {
        let url = major.url()?;
        let body = self.fetch_html(&url).await?;
        let requirements = parse_requirements_page(&body, &self.subject, major);
        info!(count = requirements.len(), "parsed requirement codes");
        Ok(requirements)
    }
}
