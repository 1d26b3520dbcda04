//! Extracted (loosely typed) and canonical (validated) directory records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::id::ProgramId;
use super::rich_text::RichText;

// =============================================================================
// Extracted side
// =============================================================================

/// A raw field value as returned by the extraction service or a CSV cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Number(f64),
    Text(String),
}

const TRUTHY: [&str; 4] = ["true", "yes", "1", "y"];

impl Scalar {
    /// Trimmed, non-empty textual form.
    pub fn as_text(&self) -> Option<String> {
        let text = match self {
            Scalar::Text(s) => s.trim().to_string(),
            Scalar::Number(n) => format_number(*n),
            Scalar::Bool(b) => b.to_string(),
        };
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// Numeric value, parsing text when needed. Non-finite values are rejected.
    pub fn as_number(&self) -> Option<f64> {
        let n = match self {
            Scalar::Number(n) => *n,
            Scalar::Text(s) => parse_leading_float(s)?,
            Scalar::Bool(_) => return None,
        };
        n.is_finite().then_some(n)
    }

    /// `true`/`yes`/`1`/`y` (any case) are true; everything else is false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Scalar::Bool(b) => *b,
            Scalar::Number(n) => *n == 1.0,
            Scalar::Text(s) => TRUTHY.contains(&s.trim().to_lowercase().as_str()),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Text(s)
    }
}

impl From<f64> for Scalar {
    fn from(n: f64) -> Self {
        Scalar::Number(n)
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Parse the longest numeric prefix, so "3 hours" reads as 3.
fn parse_leading_float(s: &str) -> Option<f64> {
    let s = s.trim();
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;
    for (i, c) in s.char_indices() {
        match c {
            '0'..='9' => {
                seen_digit = true;
                end = i + 1;
            }
            '.' if !seen_dot => {
                seen_dot = true;
            }
            '-' | '+' if i == 0 => {}
            _ => break,
        }
    }
    if !seen_digit {
        return None;
    }
    s[..end].parse().ok()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat_citation: Option<CitationValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lng_citation: Option<CitationValue>,
}

/// One cited source URL, or several.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CitationValue {
    One(String),
    Many(Vec<String>),
}

impl CitationValue {
    fn urls(&self) -> impl Iterator<Item = &str> {
        let slice: &[String] = match self {
            CitationValue::One(url) => std::slice::from_ref(url),
            CitationValue::Many(urls) => urls.as_slice(),
        };
        slice.iter().map(String::as_str)
    }
}

/// Per-field source citations returned by prompt-driven extraction.
///
/// Each `<field>_citation` (field name as it appears on the record, e.g.
/// `zipCode_citation`) names where that field's value was found; `citations`
/// is a record-level list. Snake-case keys are accepted too.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldCitations {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citations: Option<CitationValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_citation: Option<CitationValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_citation: Option<CitationValue>,
    #[serde(
        rename = "religiousAffiliation_citation",
        alias = "religious_affiliation_citation",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub religious_affiliation_citation: Option<CitationValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_citation: Option<CitationValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city_citation: Option<CitationValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_citation: Option<CitationValue>,
    #[serde(
        rename = "zipCode_citation",
        alias = "zip_code_citation",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub zip_code_citation: Option<CitationValue>,
    #[serde(
        rename = "meetingFormat_citation",
        alias = "meeting_format_citation",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub meeting_format_citation: Option<CitationValue>,
    #[serde(
        rename = "meetingFrequency_citation",
        alias = "meeting_frequency_citation",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub meeting_frequency_citation: Option<CitationValue>,
    #[serde(
        rename = "meetingLength_citation",
        alias = "meeting_length_citation",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub meeting_length_citation: Option<CitationValue>,
    #[serde(
        rename = "meetingType_citation",
        alias = "meeting_type_citation",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub meeting_type_citation: Option<CitationValue>,
    #[serde(
        rename = "averageAttendance_citation",
        alias = "average_attendance_citation",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub average_attendance_citation: Option<CitationValue>,
    #[serde(
        rename = "hasConferences_citation",
        alias = "has_conferences_citation",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub has_conferences_citation: Option<CitationValue>,
    #[serde(
        rename = "hasOutsideSpeakers_citation",
        alias = "has_outside_speakers_citation",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub has_outside_speakers_citation: Option<CitationValue>,
    #[serde(
        rename = "hasEducationTraining_citation",
        alias = "has_education_training_citation",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub has_education_training_citation: Option<CitationValue>,
    #[serde(
        rename = "annualPrice_citation",
        alias = "annual_price_citation",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub annual_price_citation: Option<CitationValue>,
    #[serde(
        rename = "monthlyPrice_citation",
        alias = "monthly_price_citation",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub monthly_price_citation: Option<CitationValue>,
    #[serde(
        rename = "contactEmail_citation",
        alias = "contact_email_citation",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub contact_email_citation: Option<CitationValue>,
    #[serde(
        rename = "contactPhone_citation",
        alias = "contact_phone_citation",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub contact_phone_citation: Option<CitationValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website_citation: Option<CitationValue>,
}

impl FieldCitations {
    fn all(&self) -> [&Option<CitationValue>; 21] {
        [
            &self.citations,
            &self.name_citation,
            &self.description_citation,
            &self.religious_affiliation_citation,
            &self.address_citation,
            &self.city_citation,
            &self.state_citation,
            &self.zip_code_citation,
            &self.meeting_format_citation,
            &self.meeting_frequency_citation,
            &self.meeting_length_citation,
            &self.meeting_type_citation,
            &self.average_attendance_citation,
            &self.has_conferences_citation,
            &self.has_outside_speakers_citation,
            &self.has_education_training_citation,
            &self.annual_price_citation,
            &self.monthly_price_citation,
            &self.contact_email_citation,
            &self.contact_phone_citation,
            &self.website_citation,
        ]
    }
}

/// Candidate fields for one record. Nothing is required at this stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedRecord {
    #[serde(default)]
    pub name: Option<Scalar>,
    #[serde(default)]
    pub description: Option<Scalar>,
    #[serde(default)]
    pub religious_affiliation: Option<Scalar>,
    #[serde(default)]
    pub address: Option<Scalar>,
    #[serde(default)]
    pub city: Option<Scalar>,
    #[serde(default)]
    pub state: Option<Scalar>,
    #[serde(default)]
    pub zip_code: Option<Scalar>,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
    #[serde(default)]
    pub meeting_format: Option<Scalar>,
    #[serde(default)]
    pub meeting_frequency: Option<Scalar>,
    #[serde(default)]
    pub meeting_length: Option<Scalar>,
    #[serde(default)]
    pub meeting_type: Option<Scalar>,
    #[serde(default)]
    pub average_attendance: Option<Scalar>,
    #[serde(default)]
    pub has_conferences: Option<Scalar>,
    #[serde(default)]
    pub has_outside_speakers: Option<Scalar>,
    #[serde(default)]
    pub has_education_training: Option<Scalar>,
    #[serde(default)]
    pub annual_price: Option<Scalar>,
    #[serde(default)]
    pub monthly_price: Option<Scalar>,
    #[serde(default)]
    pub contact_email: Option<Scalar>,
    #[serde(default)]
    pub contact_phone: Option<Scalar>,
    #[serde(default)]
    pub website: Option<Scalar>,

    #[serde(flatten)]
    pub citations: FieldCitations,
}

impl ExtractedRecord {
    /// Every cited URL on this record, including coordinate citations.
    pub fn source_urls(&self) -> BTreeSet<String> {
        let mut urls = BTreeSet::new();
        let nested = self
            .coordinates
            .iter()
            .flat_map(|c| [&c.lat_citation, &c.lng_citation]);

        for citation in self.citations.all().into_iter().chain(nested).flatten() {
            for url in citation.urls() {
                let url = url.trim();
                if !url.is_empty() {
                    urls.insert(url.to_string());
                }
            }
        }
        urls
    }

    /// Best-effort display name for error reports.
    pub fn display_name(&self) -> Option<String> {
        self.name.as_ref().and_then(Scalar::as_text)
    }
}

/// A prompt-extraction result with its citations flattened to source URLs.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentRecord {
    pub record: ExtractedRecord,
    pub source_urls: BTreeSet<String>,
}

impl From<ExtractedRecord> for AgentRecord {
    fn from(record: ExtractedRecord) -> Self {
        let source_urls = record.source_urls();
        Self {
            record,
            source_urls,
        }
    }
}

// =============================================================================
// Canonical side
// =============================================================================

macro_rules! labelled_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident { $($variant:ident => $label:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $label)] $variant),+
        }

        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }

            /// Match an exact label.
            pub fn from_label(label: &str) -> Option<Self> {
                match label {
                    $($label => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

labelled_enum! {
    pub enum ReligiousAffiliation {
        Protestant => "protestant",
        Catholic => "catholic",
    }
}

labelled_enum! {
    pub enum MeetingFormat {
        InPerson => "in-person",
        Online => "online",
        Both => "both",
    }
}

labelled_enum! {
    pub enum MeetingFrequency {
        Weekly => "weekly",
        Monthly => "monthly",
        Quarterly => "quarterly",
    }
}

labelled_enum! {
    pub enum MeetingType {
        PeerGroup => "peer-group",
        Forum => "forum",
        SmallGroup => "small-group",
    }
}

labelled_enum! {
    pub enum ConferenceLevel {
        None => "none",
        Annual => "annual",
        Multiple => "multiple",
    }
}

impl Default for ConferenceLevel {
    fn default() -> Self {
        ConferenceLevel::None
    }
}

labelled_enum! {
    /// Meeting length in hours.
    pub enum MeetingLengthRange {
        OneToTwo => "1-2",
        TwoToFour => "2-4",
        FourToEight => "4-8",
    }
}

labelled_enum! {
    pub enum AttendanceRange {
        UpTo10 => "1-10",
        UpTo20 => "10-20",
        UpTo50 => "20-50",
        UpTo100 => "50-100",
        Over100 => "100+",
    }
}

labelled_enum! {
    /// Annual price in USD.
    pub enum AnnualPriceRange {
        UpTo240 => "0-240",
        UpTo600 => "241-600",
        UpTo2400 => "601-2400",
        UpTo8400 => "2401-8400",
        Over8400 => "8401+",
    }
}

labelled_enum! {
    /// Monthly price in USD.
    pub enum MonthlyPriceRange {
        UpTo20 => "0-20",
        UpTo50 => "21-50",
        UpTo200 => "51-200",
        UpTo700 => "201-700",
        Over700 => "701+",
    }
}

/// A validated directory record, ready for storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramRecord {
    pub name: String,
    pub description: Option<RichText>,
    pub religious_affiliation: ReligiousAffiliation,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,

    pub meeting_format: MeetingFormat,
    pub meeting_frequency: MeetingFrequency,
    pub meeting_type: MeetingType,
    pub meeting_length: Option<f64>,
    pub meeting_length_range: Option<MeetingLengthRange>,
    pub average_attendance: Option<f64>,
    pub average_attendance_range: Option<AttendanceRange>,

    pub has_conferences: ConferenceLevel,
    pub has_outside_speakers: bool,
    pub has_education_training: bool,

    pub annual_price: Option<f64>,
    pub annual_price_range: Option<AnnualPriceRange>,
    pub monthly_price: Option<f64>,
    pub monthly_price_range: Option<MonthlyPriceRange>,

    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub website: Option<String>,

    /// Extracting URL, or the citation set for prompt-driven imports
    #[serde(default)]
    pub source_urls: Vec<String>,
}

/// Deduplication key: (name, city, state).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DedupKey {
    pub name: String,
    pub city: String,
    pub state: String,
}

impl ProgramRecord {
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey {
            name: self.name.clone(),
            city: self.city.clone(),
            state: self.state.clone(),
        }
    }

    pub fn with_source_urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source_urls = urls.into_iter().map(Into::into).collect();
        self
    }
}

/// A record as held by the record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredProgram {
    pub id: ProgramId,
    pub draft: bool,
    pub record: ProgramRecord,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_coercions() {
        assert_eq!(Scalar::from("  Denver ").as_text().as_deref(), Some("Denver"));
        assert_eq!(Scalar::from(55401.0).as_text().as_deref(), Some("55401"));
        assert_eq!(Scalar::from("3 hours").as_number(), Some(3.0));
        assert_eq!(Scalar::from("2.5").as_number(), Some(2.5));
        assert_eq!(Scalar::from("about").as_number(), None);
        assert!(Scalar::from("YES").is_truthy());
        assert!(Scalar::from("y").is_truthy());
        assert!(!Scalar::from("sometimes").is_truthy());
        assert!(Scalar::from(true).is_truthy());
        assert!(Scalar::from("").as_text().is_none());
    }

    #[test]
    fn test_extracted_record_accepts_mixed_types() {
        let json = r#"{
            "name": "Faith at Work",
            "zipCode": 80202,
            "hasOutsideSpeakers": true,
            "meetingLength": "3",
            "coordinates": {"lat": 39.7, "lng": -104.9}
        }"#;
        let record: ExtractedRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.display_name().as_deref(), Some("Faith at Work"));
        assert_eq!(record.zip_code, Some(Scalar::Number(80202.0)));
        assert_eq!(record.has_outside_speakers, Some(Scalar::Bool(true)));
        assert_eq!(record.coordinates.unwrap().lat, Some(39.7));
    }

    #[test]
    fn test_source_urls_collects_field_and_nested_citations() {
        let json = r#"{
            "name": "Forum",
            "name_citation": "https://a.example/about",
            "city_citation": ["https://a.example/contact", "https://a.example/about"],
            "citations": ["https://b.example"],
            "coordinates": {"lat": 1.0, "lat_citation": "https://maps.example/x"}
        }"#;
        let record: ExtractedRecord = serde_json::from_str(json).unwrap();
        let urls: Vec<String> = record.source_urls().into_iter().collect();

        assert_eq!(
            urls,
            vec![
                "https://a.example/about",
                "https://a.example/contact",
                "https://b.example",
                "https://maps.example/x",
            ]
        );
    }

    #[test]
    fn test_multi_word_field_citations_reach_source_urls() {
        let json = r#"{
            "city_citation": "https://src.example/city",
            "zipCode_citation": "https://src.example/zip",
            "religiousAffiliation_citation": ["https://src.example/faith"],
            "meetingFormat_citation": "https://src.example/format",
            "has_outside_speakers_citation": "https://src.example/speakers"
        }"#;
        let record: ExtractedRecord = serde_json::from_str(json).unwrap();
        let agent = AgentRecord::from(record);
        let urls: Vec<&str> = agent.source_urls.iter().map(String::as_str).collect();

        assert_eq!(
            urls,
            vec![
                "https://src.example/city",
                "https://src.example/faith",
                "https://src.example/format",
                "https://src.example/speakers",
                "https://src.example/zip",
            ]
        );
    }

    #[test]
    fn test_labelled_enums_use_wire_labels() {
        assert_eq!(
            serde_json::to_string(&MeetingFormat::InPerson).unwrap(),
            "\"in-person\""
        );
        assert_eq!(AttendanceRange::from_label("100+"), Some(AttendanceRange::Over100));
        assert_eq!(MeetingLengthRange::TwoToFour.to_string(), "2-4");
        assert_eq!(ConferenceLevel::default(), ConferenceLevel::None);
    }
}
