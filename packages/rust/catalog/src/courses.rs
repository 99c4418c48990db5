//! Course-description page parsing.
//!
//! A catalog department page lists one `div.courseblock` per course. Each
//! block carries a title line (`CS 141. Program Design II. 3 hours.`) and a
//! description paragraph that may embed a `Prerequisite(s):` clause.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html};
use tracing::{debug, warn};

use coursemap_shared::{CourseMapError, Result};

use crate::{collapse_whitespace, selector};

/// Locates the prerequisite clause inside a description.
static PREREQ_CLAUSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Prerequisite\s*\(s\):(.+?)(?:\.|$)").expect("valid prerequisite regex")
});

/// One course block, parsed but not yet normalized into a store record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCourse {
    /// `SUBJ NNN`, single-spaced.
    pub course_code: String,
    pub course_number: String,
    pub title: String,
    /// Credits text as printed, e.g. `3 hours.`; `None` when the title line has none.
    pub credits: Option<String>,
    pub description: String,
    /// Codes from the prerequisite clause, de-duplicated in order of appearance.
    pub prerequisites: Vec<String>,
    /// Whole block text with whitespace collapsed.
    pub raw_text: String,
}

/// Parses course blocks for one subject (e.g. `CS`).
pub struct CourseBlockParser {
    subject: String,
    title_line: Regex,
    prereq_code: Regex,
}

impl CourseBlockParser {
    /// Build a parser for `subject`. The subject must be letters only.
    pub fn new(subject: &str) -> Result<Self> {
        let subject = subject.trim().to_uppercase();
        if subject.is_empty() || !subject.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(CourseMapError::validation(format!(
                "subject must be letters only, got '{subject}'"
            )));
        }
        let escaped = regex::escape(&subject);

        let title_line = Regex::new(&format!(
            r"^({escaped}\s+\d+)\.\s+(.+?)\.?\s*(\d+(?:-\d+)?\s+hours?\.?)?$"
        ))
        .map_err(|e| CourseMapError::parse(format!("title regex: {e}")))?;

        let prereq_code = Regex::new(&format!(r"(?i)\b{escaped}\s*(\d{{3}})"))
            .map_err(|e| CourseMapError::parse(format!("prerequisite regex: {e}")))?;

        Ok(Self {
            subject,
            title_line,
            prereq_code,
        })
    }

    /// Parse every course block in a department page.
    ///
    /// Blocks whose title line does not parse are skipped with a warning.
    pub fn parse_page(&self, html: &str) -> Result<Vec<ParsedCourse>> {
        let doc = Html::parse_document(html);
        let block_sel = selector("div.courseblock")?;
        let title_sel = selector("p.courseblocktitle")?;
        let desc_sel = selector("p.courseblockdesc")?;

        let mut courses = Vec::new();
        for block in doc.select(&block_sel) {
            let Some(title_el) = block.select(&title_sel).next() else {
                continue;
            };
            let title_text = normalize_nbsp(&title_el.text().collect::<String>());
            let title_text = title_text.trim();

            let Some(caps) = self.title_line.captures(title_text) else {
                warn!(title = title_text, "could not parse course title line");
                continue;
            };

            let course_code = collapse_whitespace(&caps[1]);
            let course_number = course_code
                .split_whitespace()
                .last()
                .unwrap_or_default()
                .to_string();
            let title = clean_title(&caps[2]);
            let credits = caps.get(3).map(|m| m.as_str().trim().to_string());

            let description = block
                .select(&desc_sel)
                .next()
                .map(|el| spaced_text(&el))
                .unwrap_or_default();

            let prerequisites = PREREQ_CLAUSE
                .captures(&description)
                .map(|c| self.parse_prerequisites(&c[1]))
                .unwrap_or_default();

            let raw_text = spaced_text(&block);

            debug!(
                code = %course_code,
                prereqs = prerequisites.len(),
                "parsed course block"
            );

            courses.push(ParsedCourse {
                course_code,
                course_number,
                title,
                credits,
                description,
                prerequisites,
                raw_text,
            });
        }

        Ok(courses)
    }

    /// Extract `SUBJ NNN` codes from prerequisite text, normalized to upper case
    /// with a single space, de-duplicated keeping first appearance.
    pub fn parse_prerequisites(&self, text: &str) -> Vec<String> {
        let mut codes: Vec<String> = Vec::new();
        for caps in self.prereq_code.captures_iter(text) {
            let code = format!("{} {}", self.subject, &caps[1]);
            if !codes.contains(&code) {
                codes.push(code);
            }
        }
        codes
    }
}

/// Title group up to its first period, with a dangling trailing "or" removed.
fn clean_title(raw: &str) -> String {
    let head = raw.split('.').next().unwrap_or(raw).trim();
    head.strip_suffix(" or")
        .map(str::trim_end)
        .unwrap_or(head)
        .to_string()
}

fn normalize_nbsp(s: &str) -> String {
    s.replace('\u{a0}', " ")
}

/// Element text with each text node trimmed and joined by single spaces.
fn spaced_text(el: &ElementRef<'_>) -> String {
    let joined = el
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    collapse_whitespace(&joined)
}
