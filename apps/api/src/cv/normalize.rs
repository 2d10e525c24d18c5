//! CV normalization — the only place that knows about historical field aliases.
//!
//! Stored CV documents come from several editor generations: a role may be
//! `title`, `position`, `role` or `jobTitle`; bullet points may be
//! `achievements`, `content`, `highlights`, `responsibilities` or `bullets`;
//! contact data may sit at the root or under `personalInfo`/`contact`. All of
//! that "try A, then B, then C" logic lives here. Everything downstream works on
//! `CanonicalCv`.

use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct CanonicalCv {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub links: ContactLinks,
    pub summary: Option<String>,
    pub experience: Vec<ExperienceItem>,
    pub education: Vec<EducationItem>,
    pub skills: Vec<String>,
    pub certifications: Vec<String>,
    pub languages: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ContactLinks {
    pub linkedin: Option<String>,
    pub github: Option<String>,
    pub website: Option<String>,
    pub other: Vec<String>,
}

impl ContactLinks {
    pub fn count(&self) -> usize {
        [&self.linkedin, &self.github, &self.website]
            .iter()
            .filter(|l| l.is_some())
            .count()
            + self.other.len()
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ExperienceItem {
    pub title: Option<String>,
    pub company: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub current: bool,
    pub description: Option<String>,
    pub achievements: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct EducationItem {
    pub degree: Option<String>,
    pub field: Option<String>,
    pub institution: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub grade: Option<String>,
}

impl CanonicalCv {
    /// First listed experience is treated as the most recent one, matching how
    /// every editor generation orders entries.
    pub fn most_recent_role(&self) -> Option<&ExperienceItem> {
        self.experience.first()
    }

    pub fn most_recent_education(&self) -> Option<&EducationItem> {
        self.education.first()
    }
}

const NAME_KEYS: &[&str] = &["fullName", "full_name", "name"];
const EMAIL_KEYS: &[&str] = &["email", "emailAddress", "email_address", "mail"];
const PHONE_KEYS: &[&str] = &["phone", "phoneNumber", "phone_number", "mobile", "telephone"];
const LOCATION_KEYS: &[&str] = &["location", "address", "city"];
const SUMMARY_KEYS: &[&str] = &["summary", "profile", "about", "objective"];
const CONTACT_CONTAINERS: &[&str] = &["personalInfo", "personal_info", "contact", "contactInfo"];

const TITLE_KEYS: &[&str] = &["title", "position", "role", "jobTitle", "job_title"];
const COMPANY_KEYS: &[&str] = &["company", "employer", "organization", "companyName"];
const START_KEYS: &[&str] = &["startDate", "start_date", "from", "start"];
const END_KEYS: &[&str] = &["endDate", "end_date", "to", "end"];
const DESCRIPTION_KEYS: &[&str] = &["description", "summary"];
const ACHIEVEMENT_KEYS: &[&str] = &[
    "achievements",
    "content",
    "highlights",
    "responsibilities",
    "bullets",
];

const DEGREE_KEYS: &[&str] = &["degree", "qualification", "diploma"];
const FIELD_KEYS: &[&str] = &["field", "fieldOfStudy", "field_of_study", "major", "area"];
const INSTITUTION_KEYS: &[&str] = &["institution", "school", "university", "college"];
const GRADE_KEYS: &[&str] = &["grade", "gpa", "honors"];

/// Builds the canonical record from a raw CV document. Unknown shapes yield
/// empty fields rather than errors.
pub fn normalize_cv(raw: &Value) -> CanonicalCv {
    let empty = Map::new();
    let root = raw.as_object().unwrap_or(&empty);
    let contact = CONTACT_CONTAINERS
        .iter()
        .find_map(|k| root.get(*k).and_then(Value::as_object));

    // Contact fields may live under a container or at the root
    let contact_str = |keys: &[&str]| {
        contact
            .and_then(|c| first_str(c, keys))
            .or_else(|| first_str(root, keys))
    };

    let full_name = contact_str(NAME_KEYS).or_else(|| {
        let first = contact_str(&["firstName", "first_name"]);
        let last = contact_str(&["lastName", "last_name"]);
        match (first, last) {
            (Some(f), Some(l)) => Some(format!("{f} {l}")),
            (Some(n), None) | (None, Some(n)) => Some(n),
            (None, None) => None,
        }
    });

    CanonicalCv {
        full_name,
        email: contact_str(EMAIL_KEYS),
        phone: contact_str(PHONE_KEYS),
        location: contact_str(LOCATION_KEYS),
        links: collect_links(contact, root),
        summary: first_str(root, SUMMARY_KEYS)
            .or_else(|| contact.and_then(|c| first_str(c, SUMMARY_KEYS))),
        experience: list_of(root, &["experience", "workExperience", "work_experience", "work"])
            .filter_map(Value::as_object)
            .map(normalize_experience)
            .collect(),
        education: list_of(root, &["education", "studies"])
            .filter_map(Value::as_object)
            .map(normalize_education)
            .collect(),
        skills: flatten_named(root.get("skills")),
        certifications: flatten_named(first_present(root, &["certifications", "certificates"])),
        languages: flatten_named(root.get("languages")),
    }
}

fn normalize_experience(entry: &Map<String, Value>) -> ExperienceItem {
    let end = first_str(entry, END_KEYS);
    let current = entry
        .get("current")
        .or_else(|| entry.get("isCurrent"))
        .and_then(Value::as_bool)
        .unwrap_or(false)
        || end
            .as_deref()
            .is_some_and(|e| e.eq_ignore_ascii_case("present") || e.eq_ignore_ascii_case("current"));

    // `content` is an achievements alias only when it is a list
    let achievements: Vec<String> = ACHIEVEMENT_KEYS
        .iter()
        .find_map(|k| entry.get(*k).and_then(Value::as_array))
        .map(|items| items.iter().filter_map(text_of).collect())
        .unwrap_or_default();

    let description = first_str(entry, DESCRIPTION_KEYS).or_else(|| {
        entry
            .get("content")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
    });

    ExperienceItem {
        title: first_str(entry, TITLE_KEYS),
        company: first_str(entry, COMPANY_KEYS),
        start: first_str(entry, START_KEYS),
        end,
        current,
        description,
        achievements,
    }
}

fn normalize_education(entry: &Map<String, Value>) -> EducationItem {
    EducationItem {
        degree: first_str(entry, DEGREE_KEYS),
        field: first_str(entry, FIELD_KEYS),
        institution: first_str(entry, INSTITUTION_KEYS),
        start: first_str(entry, START_KEYS),
        end: first_str(entry, END_KEYS),
        grade: first_str(entry, GRADE_KEYS),
    }
}

fn collect_links(contact: Option<&Map<String, Value>>, root: &Map<String, Value>) -> ContactLinks {
    let lookup = |keys: &[&str]| {
        contact
            .and_then(|c| first_str(c, keys))
            .or_else(|| first_str(root, keys))
    };

    let mut links = ContactLinks {
        linkedin: lookup(&["linkedin", "linkedIn", "linkedinUrl"]),
        github: lookup(&["github", "gitHub", "githubUrl"]),
        website: lookup(&["website", "portfolio", "url"]),
        other: Vec::new(),
    };

    // `links` may be a list of strings or of {label,url} objects
    let extra = contact
        .and_then(|c| c.get("links"))
        .or_else(|| root.get("links"));
    if let Some(items) = extra.and_then(Value::as_array) {
        for item in items {
            let url = item
                .as_str()
                .map(String::from)
                .or_else(|| item.as_object().and_then(|o| first_str(o, &["url", "href", "link"])));
            let Some(url) = url else { continue };
            let lower = url.to_lowercase();
            if lower.contains("linkedin.com") && links.linkedin.is_none() {
                links.linkedin = Some(url);
            } else if lower.contains("github.com") && links.github.is_none() {
                links.github = Some(url);
            } else {
                links.other.push(url);
            }
        }
    }
    links
}

fn first_present<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| map.get(*k).filter(|v| !v.is_null()))
}

/// First key holding a non-blank string.
fn first_str(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| {
        map.get(*k)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
    })
}

fn list_of<'a>(
    map: &'a Map<String, Value>,
    keys: &[&str],
) -> impl Iterator<Item = &'a Value> + 'a {
    keys.iter()
        .find_map(|k| map.get(*k).and_then(Value::as_array))
        .into_iter()
        .flatten()
}

/// Text of a list item that is either a plain string or an object with a
/// `text`/`description`/`content` field.
fn text_of(item: &Value) -> Option<String> {
    match item {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Object(o) => first_str(o, &["text", "description", "content", "value"]),
        _ => None,
    }
}

/// Flattens skill-like collections: a comma-separated string, a list of
/// strings, a list of `{name, level}` objects, or a map of category → list.
fn flatten_named(value: Option<&Value>) -> Vec<String> {
    let mut out = Vec::new();
    match value {
        Some(Value::String(s)) => out.extend(
            s.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from),
        ),
        Some(Value::Array(items)) => {
            for item in items {
                match item {
                    Value::Object(o) => {
                        if let Some(name) =
                            first_str(o, &["name", "skill", "language", "title", "label"])
                        {
                            out.push(name);
                        }
                        // Category objects nest their own list
                        if let Some(nested) = o.get("items").or_else(|| o.get("skills")) {
                            out.extend(flatten_named(Some(nested)));
                        }
                    }
                    other => out.extend(text_of(other)),
                }
            }
        }
        Some(Value::Object(categories)) => {
            for nested in categories.values() {
                out.extend(flatten_named(Some(nested)));
            }
        }
        _ => {}
    }
    out.dedup();
    out
}
