//! Raw extracted fields → validated `ProgramRecord`.
//!
//! Every failing check is collected; nothing short-circuits. Partially typed
//! data never leaves this module: callers get a complete record or the list
//! of what was wrong with it.

pub mod buckets;
pub mod csv;
pub mod keywords;

use crate::error::{ValidationError, ValidationErrors};
use crate::types::record::{
    AttendanceRange, ConferenceLevel, ExtractedRecord, MeetingLengthRange, ProgramRecord,
    Scalar, AnnualPriceRange, MonthlyPriceRange,
};
use crate::types::rich_text::RichText;

/// Normalize one raw record into canonical form.
pub fn normalize(raw: &ExtractedRecord) -> Result<ProgramRecord, ValidationErrors> {
    let mut errors = ValidationErrors::default();

    let name = required_text(&raw.name, "name", &mut errors);

    let religious_affiliation = text(&raw.religious_affiliation)
        .and_then(|t| keywords::religious_affiliation(&t));
    if religious_affiliation.is_none() {
        errors.push(ValidationError::new(
            "religiousAffiliation",
            "Missing or invalid religiousAffiliation (must be \"protestant\" or \"catholic\")",
        ));
    }

    let address = required_text(&raw.address, "address", &mut errors);
    let city = required_text(&raw.city, "city", &mut errors);

    // A value that is not a 2-letter code is dropped, then reported as missing
    let state = text(&raw.state).and_then(|t| keywords::state_code(&t));
    if state.is_none() {
        errors.push(ValidationError::missing("state"));
    }

    let zip_code = match raw.zip_code.as_ref().and_then(keywords::zip_text) {
        None => {
            errors.push(ValidationError::missing("zipCode"));
            None
        }
        Some(zip) if keywords::is_valid_zip(&zip) => Some(zip),
        Some(_) => {
            errors.push(ValidationError::new(
                "zipCode",
                "Invalid zipCode format (must be 5 digits or 5+4 format)",
            ));
            None
        }
    };

    let meeting_format = text(&raw.meeting_format).and_then(|t| keywords::meeting_format(&t));
    if meeting_format.is_none() {
        errors.push(ValidationError::new(
            "meetingFormat",
            "Missing or invalid meetingFormat (must be \"in-person\", \"online\", or \"both\")",
        ));
    }

    let meeting_frequency =
        text(&raw.meeting_frequency).and_then(|t| keywords::meeting_frequency(&t));
    if meeting_frequency.is_none() {
        errors.push(ValidationError::new(
            "meetingFrequency",
            "Missing or invalid meetingFrequency (must be \"weekly\", \"monthly\", or \"quarterly\")",
        ));
    }

    let meeting_type = text(&raw.meeting_type).and_then(|t| keywords::meeting_type(&t));
    if meeting_type.is_none() {
        errors.push(ValidationError::new(
            "meetingType",
            "Missing or invalid meetingType (must be \"peer-group\", \"forum\", or \"small-group\")",
        ));
    }

    let (meeting_length, meeting_length_range) = bucketed(
        &raw.meeting_length,
        MeetingLengthRange::from_label,
        buckets::meeting_length_range,
    );
    let (average_attendance, average_attendance_range) = bucketed(
        &raw.average_attendance,
        AttendanceRange::from_label,
        buckets::attendance_range,
    );
    let (annual_price, annual_price_range) = bucketed(
        &raw.annual_price,
        AnnualPriceRange::from_label,
        buckets::annual_price_range,
    );
    let (monthly_price, monthly_price_range) = bucketed(
        &raw.monthly_price,
        MonthlyPriceRange::from_label,
        buckets::monthly_price_range,
    );

    // Every required field is Some exactly when no error was pushed for it.
    let (
        Some(name),
        Some(religious_affiliation),
        Some(address),
        Some(city),
        Some(state),
        Some(zip_code),
        Some(meeting_format),
        Some(meeting_frequency),
        Some(meeting_type),
    ) = (
        name,
        religious_affiliation,
        address,
        city,
        state,
        zip_code,
        meeting_format,
        meeting_frequency,
        meeting_type,
    )
    else {
        return Err(errors);
    };

    Ok(ProgramRecord {
        name,
        description: text(&raw.description).and_then(|d| RichText::from_plain(&d)),
        religious_affiliation,
        address,
        city,
        state,
        zip_code,
        meeting_format,
        meeting_frequency,
        meeting_type,
        meeting_length,
        meeting_length_range,
        average_attendance,
        average_attendance_range,
        has_conferences: raw
            .has_conferences
            .as_ref()
            .map(keywords::conference_level)
            .unwrap_or(ConferenceLevel::None),
        has_outside_speakers: flag(&raw.has_outside_speakers),
        has_education_training: flag(&raw.has_education_training),
        annual_price,
        annual_price_range,
        monthly_price,
        monthly_price_range,
        contact_email: text(&raw.contact_email),
        contact_phone: text(&raw.contact_phone),
        website: text(&raw.website),
        source_urls: Vec::new(),
    })
}

fn text(value: &Option<Scalar>) -> Option<String> {
    value.as_ref().and_then(Scalar::as_text)
}

fn flag(value: &Option<Scalar>) -> bool {
    value.as_ref().is_some_and(Scalar::is_truthy)
}

fn required_text(
    value: &Option<Scalar>,
    field: &'static str,
    errors: &mut ValidationErrors,
) -> Option<String> {
    let out = text(value);
    if out.is_none() {
        errors.push(ValidationError::missing(field));
    }
    out
}

/// A value that is either already a range label or a number to bucket.
fn bucketed<R>(
    value: &Option<Scalar>,
    from_label: fn(&str) -> Option<R>,
    bucket: fn(f64) -> Option<R>,
) -> (Option<f64>, Option<R>) {
    let Some(value) = value else {
        return (None, None);
    };
    if let Some(range) = value.as_text().and_then(|t| from_label(&t)) {
        return (None, Some(range));
    }
    match value.as_number() {
        Some(n) => (Some(n), bucket(n)),
        None => (None, None),
    }
}
