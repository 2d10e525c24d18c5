//! Privacy-preserving CV rendering for external model calls.
//!
//! Contact fields never leave as literal values: each one is replaced by an
//! availability/format indicator (`Email: Available | Format: Valid |
//! Professional format: Yes`). After rendering, the whole body is scrubbed of
//! the literal email, phone number and name (including individual name parts)
//! plus any email- or phone-shaped substring found in free text.

use std::fmt::Write as _;
use std::sync::OnceLock;

use regex::Regex;

use crate::cv::normalize::{CanonicalCv, EducationItem, ExperienceItem};

const REDACTED: &str = "[redacted]";

/// Words that make an otherwise valid address look unprofessional.
const UNPROFESSIONAL_EMAIL_WORDS: &[&str] = &[
    "sexy", "hot", "babe", "cool", "lover", "gamer", "princess", "killer", "party", "crazy",
    "420", "69",
];

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}$").expect("valid email regex")
    })
}

fn email_in_text_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}").expect("valid email regex")
    })
}

fn phone_in_text_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\+?\d[\d \t().-]{5,}\d").expect("valid phone regex"))
}

fn professional_local_part_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^[a-z]+([._-]?[a-z]+)*[0-9]{0,2}$").expect("valid local-part regex")
    })
}

pub fn is_valid_email(email: &str) -> bool {
    email_re().is_match(email.trim())
}

/// Name-like local part, at most two trailing digits, no juvenile words.
pub fn is_professional_email(email: &str) -> bool {
    let Some((local, _)) = email.trim().split_once('@') else {
        return false;
    };
    let lower = local.to_lowercase();
    professional_local_part_re().is_match(local)
        && !UNPROFESSIONAL_EMAIL_WORDS.iter().any(|w| lower.contains(w))
}

pub fn is_valid_phone(phone: &str) -> bool {
    let allowed = phone
        .chars()
        .all(|c| c.is_ascii_digit() || " +-().".contains(c));
    let digits = digit_count(phone);
    allowed && (7..=15).contains(&digits)
}

fn digit_count(s: &str) -> usize {
    s.chars().filter(|c| c.is_ascii_digit()).count()
}

fn digits_of(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}

fn valid_invalid(flag: bool) -> &'static str {
    if flag {
        "Valid"
    } else {
        "Invalid"
    }
}

/// One indicator line per contact field. Never contains the literal values.
pub fn contact_indicators(cv: &CanonicalCv) -> Vec<String> {
    let mut lines = Vec::with_capacity(6);

    lines.push(match &cv.full_name {
        Some(name) => format!(
            "Name: Available | Parts: {}",
            name.split_whitespace().count()
        ),
        None => "Name: Not provided".to_string(),
    });

    lines.push(match &cv.email {
        Some(email) => format!(
            "Email: Available | Format: {} | Professional format: {}",
            valid_invalid(is_valid_email(email)),
            yes_no(is_valid_email(email) && is_professional_email(email))
        ),
        None => "Email: Not provided".to_string(),
    });

    lines.push(match &cv.phone {
        Some(phone) => format!(
            "Phone: Available | Format: {} | International prefix: {}",
            valid_invalid(is_valid_phone(phone)),
            yes_no(phone.trim_start().starts_with('+'))
        ),
        None => "Phone: Not provided".to_string(),
    });

    lines.push(match &cv.location {
        Some(location) => format!(
            "Location: Available | Detail: {}",
            if location.contains(',') {
                "City and region"
            } else {
                "Single term"
            }
        ),
        None => "Location: Not provided".to_string(),
    });

    lines.push(match &cv.links.linkedin {
        Some(url) => format!(
            "LinkedIn: Available | Format: {}",
            valid_invalid(url.to_lowercase().contains("linkedin.com/in/"))
        ),
        None => "LinkedIn: Not provided".to_string(),
    });

    let other_links = cv.links.count() - usize::from(cv.links.linkedin.is_some());
    lines.push(if other_links > 0 {
        format!("Other links: {other_links} provided")
    } else {
        "Other links: Not provided".to_string()
    });

    lines
}

/// Renders the full CV for assessment. Sections without content are left out
/// entirely rather than rendered as placeholders.
pub fn sanitize_cv(cv: &CanonicalCv) -> String {
    let mut out = String::new();

    out.push_str("CONTACT INFORMATION\n");
    for line in contact_indicators(cv) {
        let _ = writeln!(out, "{line}");
    }

    if let Some(summary) = &cv.summary {
        let _ = write!(out, "\nPROFESSIONAL SUMMARY\n{summary}\n");
    }

    if !cv.experience.is_empty() {
        out.push_str("\nWORK EXPERIENCE\n");
        for item in &cv.experience {
            render_experience(&mut out, item);
        }
    }

    if !cv.education.is_empty() {
        out.push_str("\nEDUCATION\n");
        for item in &cv.education {
            render_education(&mut out, item);
        }
    }

    if !cv.skills.is_empty() {
        let _ = write!(out, "\nSKILLS\n{}\n", cv.skills.join(", "));
    }

    if !cv.certifications.is_empty() {
        let _ = write!(out, "\nCERTIFICATIONS\n{}\n", cv.certifications.join(", "));
    }

    if !cv.languages.is_empty() {
        let _ = write!(out, "\nLANGUAGES\n{}\n", cv.languages.join(", "));
    }

    scrub_personal_data(&out, cv)
}

fn render_experience(out: &mut String, item: &ExperienceItem) {
    let heading = match (&item.title, &item.company) {
        (Some(t), Some(c)) => format!("{t} at {c}"),
        (Some(t), None) => t.clone(),
        (None, Some(c)) => format!("Role at {c}"),
        (None, None) => "Untitled role".to_string(),
    };
    let end = if item.current {
        Some("Present")
    } else {
        item.end.as_deref()
    };
    let dates = match (item.start.as_deref(), end) {
        (Some(s), Some(e)) => format!(" ({s} - {e})"),
        (Some(s), None) => format!(" (from {s})"),
        (None, Some(e)) => format!(" (until {e})"),
        (None, None) => String::new(),
    };
    let _ = writeln!(out, "- {heading}{dates}");
    if let Some(desc) = &item.description {
        let _ = writeln!(out, "  {desc}");
    }
    for achievement in &item.achievements {
        let _ = writeln!(out, "  * {achievement}");
    }
}

fn render_education(out: &mut String, item: &EducationItem) {
    let mut parts: Vec<String> = Vec::new();
    match (&item.degree, &item.field) {
        (Some(d), Some(f)) => parts.push(format!("{d} in {f}")),
        (Some(d), None) => parts.push(d.clone()),
        (None, Some(f)) => parts.push(f.clone()),
        (None, None) => {}
    }
    if let Some(inst) = &item.institution {
        parts.push(inst.clone());
    }
    if let Some(end) = &item.end {
        parts.push(end.clone());
    }
    if let Some(grade) = &item.grade {
        parts.push(format!("Grade: {grade}"));
    }
    if !parts.is_empty() {
        let _ = writeln!(out, "- {}", parts.join(", "));
    }
}

/// Removes every literal contact value of `cv`, plus email/phone-shaped
/// substrings, from `text`.
pub fn scrub_personal_data(text: &str, cv: &CanonicalCv) -> String {
    let mut text = email_in_text_re()
        .replace_all(text, REDACTED)
        .into_owned();

    let known_phone_digits = cv.phone.as_deref().map(digits_of);
    text = phone_in_text_re()
        .replace_all(&text, |caps: &regex::Captures| {
            let candidate = &caps[0];
            let digits = digits_of(candidate);
            let is_known = known_phone_digits
                .as_deref()
                .is_some_and(|known| !known.is_empty() && digits == known);
            // Date ranges such as "2019 - 2021" stay below nine digits
            if is_known || digits.len() >= 9 {
                REDACTED.to_string()
            } else {
                candidate.to_string()
            }
        })
        .into_owned();

    let mut literals: Vec<&str> = Vec::new();
    literals.extend(cv.email.as_deref());
    literals.extend(cv.phone.as_deref());
    if let Some(name) = cv.full_name.as_deref() {
        literals.push(name);
        literals.extend(name.split_whitespace().filter(|p| p.chars().count() >= 3));
    }
    // Longest first so a full name is replaced before its parts
    literals.sort_by_key(|l| std::cmp::Reverse(l.len()));

    for literal in literals {
        let literal = literal.trim();
        if literal.is_empty() {
            continue;
        }
        let pattern = format!(r"(?i)\b{}\b", regex::escape(literal));
        match Regex::new(&pattern) {
            Ok(re) => text = re.replace_all(&text, REDACTED).into_owned(),
            Err(_) => text = text.replace(literal, REDACTED),
        }
        // Word boundaries do not apply around leading `+` or trailing punctuation
        if text.contains(literal) {
            text = text.replace(literal, REDACTED);
        }
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cv::normalize::normalize_cv;
    use serde_json::json;

    const EMAIL: &str = "jane.doe@example.com";
    const PHONE: &str = "+1 (555) 201-3344";
    const NAME: &str = "Jane Doe";

    fn sample_cv() -> CanonicalCv {
        normalize_cv(&json!({
            "personalInfo": {
                "fullName": NAME,
                "email": EMAIL,
                "phone": PHONE,
                "location": "Berlin, Germany",
                "linkedin": "https://linkedin.com/in/janedoe"
            },
            "summary": "Jane Doe is a backend engineer. Reach Jane at jane.doe@example.com or +1 555 201 3344.",
            "experience": [{
                "position": "Senior Engineer",
                "company": "Acme",
                "startDate": "2019",
                "endDate": "2021",
                "achievements": ["Cut p99 latency by 40%", "Mentored 4 engineers; contact 15552013344"]
            }],
            "skills": ["Rust", "PostgreSQL"]
        }))
    }

    #[test]
    fn test_sanitized_output_has_no_literal_pii_but_has_markers() {
        let cv = sample_cv();
        let body = sanitize_cv(&cv);

        assert!(!body.contains(EMAIL));
        assert!(!body.contains(PHONE));
        assert!(!body.contains("15552013344"));
        assert!(!body.contains("555 201 3344"));
        assert!(!body.to_lowercase().contains("jane"));
        assert!(!body.contains("Doe"));

        assert!(body.contains("Email: Available | Format: Valid | Professional format: Yes"));
        assert!(body.contains("Phone: Available | Format: Valid"));
        assert!(body.contains("Name: Available"));
        assert!(body.contains("Location: Available"));
        assert!(body.contains("LinkedIn: Available | Format: Valid"));
    }

    #[test]
    fn test_root_name_is_scrubbed_when_contact_block_lacks_it() {
        let cv = normalize_cv(&json!({
            "personalInfo": {"email": EMAIL},
            "firstName": "Jane",
            "lastName": "Doe",
            "summary": "Jane Doe builds reliable systems."
        }));
        let body = sanitize_cv(&cv);

        assert!(body.contains("Name: Available"));
        assert!(!body.contains("Jane"));
        assert!(!body.contains("Doe"));
        assert!(body.contains("builds reliable systems."));
    }

    #[test]
    fn test_dates_and_metrics_survive_scrubbing() {
        let body = sanitize_cv(&sample_cv());
        assert!(body.contains("Senior Engineer at Acme (2019 - 2021)"));
        assert!(body.contains("Cut p99 latency by 40%"));
    }

    #[test]
    fn test_missing_sections_are_omitted() {
        let cv = normalize_cv(&json!({"name": "Sam Roe", "skills": ["Go"]}));
        let body = sanitize_cv(&cv);
        assert!(!body.contains("WORK EXPERIENCE"));
        assert!(!body.contains("EDUCATION"));
        assert!(!body.contains("PROFESSIONAL SUMMARY"));
        assert!(body.contains("SKILLS\nGo"));
        assert!(body.contains("Email: Not provided"));
    }

    #[test]
    fn test_unprofessional_email_flagged() {
        let cv = normalize_cv(&json!({"email": "partyking420@mail.com"}));
        let lines = contact_indicators(&cv);
        assert!(lines
            .iter()
            .any(|l| l == "Email: Available | Format: Valid | Professional format: No"));
    }

    #[test]
    fn test_invalid_email_format() {
        assert!(!is_valid_email("not-an-email"));
        assert!(is_valid_email("a.b@c.io"));
    }

    #[test]
    fn test_phone_validation() {
        assert!(is_valid_phone("+49 30 1234567"));
        assert!(!is_valid_phone("12"));
        assert!(!is_valid_phone("call me maybe"));
    }

    #[test]
    fn test_free_text_email_of_someone_else_is_scrubbed() {
        let cv = CanonicalCv::default();
        let text = scrub_personal_data("ping ops@corp.example for access", &cv);
        assert_eq!(text, "ping [redacted] for access");
    }
}
