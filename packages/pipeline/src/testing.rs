//! Testing utilities: test doubles and sample records.
//!
//! Lets applications exercise the pipeline without calling the real
//! extraction service or a database.

use crate::types::record::{
    AttendanceRange, ConferenceLevel, ExtractedRecord, MeetingFormat, MeetingFrequency,
    MeetingLengthRange, MeetingType, ProgramRecord, ReligiousAffiliation, Scalar,
};
use crate::types::rich_text::RichText;
use crate::types::settings::ScraperSettings;

pub use crate::extractors::MockExtractor;
pub use crate::stores::MemoryStore;

/// A raw record carrying every required field, named `name`.
pub fn sample_extracted(name: &str) -> ExtractedRecord {
    ExtractedRecord {
        name: Some(Scalar::from(name)),
        description: Some(Scalar::from("A weekly gathering of business leaders.")),
        religious_affiliation: Some(Scalar::from("protestant")),
        address: Some(Scalar::from("100 Main St")),
        city: Some(Scalar::from("Minneapolis")),
        state: Some(Scalar::from("MN")),
        zip_code: Some(Scalar::from("55401")),
        meeting_format: Some(Scalar::from("in-person")),
        meeting_frequency: Some(Scalar::from("weekly")),
        meeting_type: Some(Scalar::from("forum")),
        meeting_length: Some(Scalar::from(2.0)),
        average_attendance: Some(Scalar::from(15.0)),
        has_conferences: Some(Scalar::from("annual")),
        has_outside_speakers: Some(Scalar::from(true)),
        has_education_training: Some(Scalar::from("no")),
        contact_email: Some(Scalar::from("hello@example.org")),
        website: Some(Scalar::from("https://example.org")),
        ..ExtractedRecord::default()
    }
}

/// The canonical form of [`sample_extracted`].
pub fn sample_program(name: &str) -> ProgramRecord {
    ProgramRecord {
        name: name.to_string(),
        description: RichText::from_plain("A weekly gathering of business leaders."),
        religious_affiliation: ReligiousAffiliation::Protestant,
        address: "100 Main St".to_string(),
        city: "Minneapolis".to_string(),
        state: "MN".to_string(),
        zip_code: "55401".to_string(),
        meeting_format: MeetingFormat::InPerson,
        meeting_frequency: MeetingFrequency::Weekly,
        meeting_type: MeetingType::Forum,
        meeting_length: Some(2.0),
        meeting_length_range: Some(MeetingLengthRange::OneToTwo),
        average_attendance: Some(15.0),
        average_attendance_range: Some(AttendanceRange::UpTo20),
        has_conferences: ConferenceLevel::Annual,
        has_outside_speakers: true,
        has_education_training: false,
        annual_price: None,
        annual_price_range: None,
        monthly_price: None,
        monthly_price_range: None,
        contact_email: Some("hello@example.org".to_string()),
        contact_phone: None,
        website: Some("https://example.org".to_string()),
        source_urls: Vec::new(),
    }
}

/// Enabled settings with no inter-request delay and no frequency gate
/// history.
pub fn fast_settings() -> ScraperSettings {
    ScraperSettings {
        delay_between_requests_seconds: 0,
        ..ScraperSettings::default()
    }
}
