use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonalInfo {
    pub full_name: String,
    pub role: String,
    pub department: String,
    #[serde(default)]
    pub seniority: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// A named group of skills, rendered as one line per category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeySkill {
    pub category: String,
    pub items: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Certification {
    pub name: String,
    pub code: String,
    pub year: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Language {
    pub language: String,
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experience {
    pub role: String,
    pub company: String,
    pub start_date: String,
    pub end_date: String,
    pub description_list: Vec<String>,
}

/// Input record for one CV. Every string is untrusted and escaped at render time,
/// never by the caller.
///
/// `id` is opaque to the pipeline; it only shows up in log spans.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CvRecord {
    pub id: String,
    pub personal_info: PersonalInfo,
    pub summary: String,
    pub key_achievements: Vec<String>,
    pub key_skills: Vec<KeySkill>,
    pub certifications: Vec<Certification>,
    pub languages: Vec<Language>,
    pub experience: Vec<Experience>,
}
