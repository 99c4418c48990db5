//! Major requirement page parsing.
//!
//! Requirement pages are free-form, so every `DEPT NNN` code in the page text
//! is sorted into a bucket by department and number.

use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;

use coursemap_shared::{MajorSource, Requirement};

/// Any course code mentioned in page text.
static COURSE_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([A-Z]{2,4})\s+(\d{3})\b").expect("valid course code regex")
});

const MATH_DEPARTMENTS: &[&str] = &["MATH", "IE", "STAT"];
const SCIENCE_DEPARTMENTS: &[&str] = &["PHYS", "CHEM", "BIOS"];

/// Graduate courses (500+) in the major's own subject are not requirements.
const GRADUATE_LEVEL: u32 = 500;

/// Buckets in output order.
struct Buckets {
    names: [String; 4],
    codes: [Vec<String>; 4],
}

const CORE: usize = 0;
const CONCENTRATION: usize = 1;
const MATH: usize = 2;
const SCIENCE: usize = 3;

impl Buckets {
    fn new(subject: &str, concentration_bucket: &str) -> Self {
        Self {
            names: [
                format!("Core {subject}"),
                concentration_bucket.to_string(),
                "Math".to_string(),
                "Science".to_string(),
            ],
            codes: Default::default(),
        }
    }

    fn add(&mut self, bucket: usize, code: String) {
        if !self.codes[bucket].contains(&code) {
            self.codes[bucket].push(code);
        }
    }

    fn into_requirements(self) -> Vec<Requirement> {
        self.names
            .into_iter()
            .zip(self.codes)
            .flat_map(|(name, codes)| {
                codes.into_iter().map(move |course_code| Requirement {
                    course_code,
                    requirement_type: name.clone(),
                })
            })
            .collect()
    }
}

/// Sort every course code found in a requirements page into buckets.
///
/// Codes in `subject` go to the concentration bucket when their number is in
/// `major.concentration_courses`, otherwise to `Core <subject>` if below 500.
/// MATH/IE/STAT go to `Math`, PHYS/CHEM/BIOS to `Science`; everything else is
/// ignored. Buckets are emitted in that order, codes in first-seen order.
pub fn parse_requirements_page(html: &str, subject: &str, major: &MajorSource) -> Vec<Requirement> {
    let doc = Html::parse_document(html);
    let text = doc
        .root_element()
        .text()
        .collect::<Vec<_>>()
        .join(" ");

    let subject = subject.trim().to_uppercase();
    let mut buckets = Buckets::new(&subject, &major.concentration_bucket);

    for caps in COURSE_CODE.captures_iter(&text) {
        let dept = &caps[1];
        let number = &caps[2];
        let code = format!("{dept} {number}");

        if dept == subject {
            let Ok(num) = number.parse::<u32>() else {
                continue;
            };
            if major.concentration_courses.contains(&num) {
                buckets.add(CONCENTRATION, code);
            } else if num < GRADUATE_LEVEL {
                buckets.add(CORE, code);
            }
        } else if MATH_DEPARTMENTS.contains(&dept) {
            buckets.add(MATH, code);
        } else if SCIENCE_DEPARTMENTS.contains(&dept) {
            buckets.add(SCIENCE, code);
        }
    }

    buckets.into_requirements()
}
