//! CSV text → raw records, via a fixed header alias table.

use crate::error::PipelineError;
use crate::types::record::{ExtractedRecord, Scalar};

/// Canonical fields a CSV column can feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsvField {
    Name,
    Description,
    ReligiousAffiliation,
    Address,
    City,
    State,
    ZipCode,
    MeetingFormat,
    MeetingFrequency,
    MeetingLength,
    MeetingType,
    AverageAttendance,
    HasConferences,
    HasOutsideSpeakers,
    HasEducationTraining,
    AnnualPrice,
    MonthlyPrice,
    ContactEmail,
    ContactPhone,
    Website,
}

const HEADER_ALIASES: &[(&str, CsvField)] = &[
    ("name", CsvField::Name),
    ("program_name", CsvField::Name),
    ("programname", CsvField::Name),
    ("program name", CsvField::Name),
    ("organization", CsvField::Name),
    ("org", CsvField::Name),
    ("description", CsvField::Description),
    ("desc", CsvField::Description),
    ("about", CsvField::Description),
    ("religiousaffiliation", CsvField::ReligiousAffiliation),
    ("religious_affiliation", CsvField::ReligiousAffiliation),
    ("religious affiliation", CsvField::ReligiousAffiliation),
    ("affiliation", CsvField::ReligiousAffiliation),
    ("religion", CsvField::ReligiousAffiliation),
    ("address", CsvField::Address),
    ("street_address", CsvField::Address),
    ("street address", CsvField::Address),
    ("street", CsvField::Address),
    ("city", CsvField::City),
    ("state", CsvField::State),
    ("st", CsvField::State),
    ("zipcode", CsvField::ZipCode),
    ("zip_code", CsvField::ZipCode),
    ("zip code", CsvField::ZipCode),
    ("zip", CsvField::ZipCode),
    ("postal_code", CsvField::ZipCode),
    ("postal code", CsvField::ZipCode),
    ("meetingformat", CsvField::MeetingFormat),
    ("meeting_format", CsvField::MeetingFormat),
    ("meeting format", CsvField::MeetingFormat),
    ("format", CsvField::MeetingFormat),
    ("meetingfrequency", CsvField::MeetingFrequency),
    ("meeting_frequency", CsvField::MeetingFrequency),
    ("meeting frequency", CsvField::MeetingFrequency),
    ("frequency", CsvField::MeetingFrequency),
    ("meetinglength", CsvField::MeetingLength),
    ("meeting_length", CsvField::MeetingLength),
    ("meeting length", CsvField::MeetingLength),
    ("length", CsvField::MeetingLength),
    ("duration", CsvField::MeetingLength),
    ("meetingtype", CsvField::MeetingType),
    ("meeting_type", CsvField::MeetingType),
    ("meeting type", CsvField::MeetingType),
    ("type", CsvField::MeetingType),
    ("averageattendance", CsvField::AverageAttendance),
    ("average_attendance", CsvField::AverageAttendance),
    ("average attendance", CsvField::AverageAttendance),
    ("attendance", CsvField::AverageAttendance),
    ("avg_attendance", CsvField::AverageAttendance),
    ("hasconferences", CsvField::HasConferences),
    ("has_conferences", CsvField::HasConferences),
    ("has conferences", CsvField::HasConferences),
    ("conferences", CsvField::HasConferences),
    ("hasoutsidespeakers", CsvField::HasOutsideSpeakers),
    ("has_outside_speakers", CsvField::HasOutsideSpeakers),
    ("has outside speakers", CsvField::HasOutsideSpeakers),
    ("outside_speakers", CsvField::HasOutsideSpeakers),
    ("outside speakers", CsvField::HasOutsideSpeakers),
    ("speakers", CsvField::HasOutsideSpeakers),
    ("haseducationtraining", CsvField::HasEducationTraining),
    ("has_education_training", CsvField::HasEducationTraining),
    ("has education training", CsvField::HasEducationTraining),
    ("education_training", CsvField::HasEducationTraining),
    ("education training", CsvField::HasEducationTraining),
    ("training", CsvField::HasEducationTraining),
    ("education", CsvField::HasEducationTraining),
    ("annualprice", CsvField::AnnualPrice),
    ("annual_price", CsvField::AnnualPrice),
    ("annual price", CsvField::AnnualPrice),
    ("yearly_price", CsvField::AnnualPrice),
    ("yearly price", CsvField::AnnualPrice),
    ("monthlyprice", CsvField::MonthlyPrice),
    ("monthly_price", CsvField::MonthlyPrice),
    ("monthly price", CsvField::MonthlyPrice),
    ("contactemail", CsvField::ContactEmail),
    ("contact_email", CsvField::ContactEmail),
    ("contact email", CsvField::ContactEmail),
    ("email", CsvField::ContactEmail),
    ("contactphone", CsvField::ContactPhone),
    ("contact_phone", CsvField::ContactPhone),
    ("contact phone", CsvField::ContactPhone),
    ("phone", CsvField::ContactPhone),
    ("website", CsvField::Website),
    ("url", CsvField::Website),
    ("site", CsvField::Website),
    ("web", CsvField::Website),
];

/// Map a header cell to its canonical field. Unknown headers map to `None`.
pub fn canonical_field(header: &str) -> Option<CsvField> {
    let key = header.trim().to_lowercase();
    HEADER_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, field)| *field)
}

/// One data row of an import file.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvRow {
    /// Position among non-blank data rows, offset by 2 so the first data row
    /// is 2 (the header counts as 1). Blank lines are not counted.
    pub row: usize,
    pub record: ExtractedRecord,
}

/// Parse CSV text with a header row into raw records.
///
/// Blank lines are ignored. Fails if there is no header or no data row.
pub fn parse_csv(text: &str) -> Result<Vec<CsvRow>, PipelineError> {
    let mut reader = ::csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(::csv::Trim::All)
        .from_reader(text.as_bytes());

    let fields: Vec<Option<CsvField>> = reader
        .headers()
        .map_err(csv_error)?
        .iter()
        .map(canonical_field)
        .collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let cells = result.map_err(csv_error)?;
        if cells.iter().all(|c| c.is_empty()) {
            continue;
        }

        let mut record = ExtractedRecord::default();
        for (field, value) in fields.iter().zip(cells.iter()) {
            if let (Some(field), false) = (field, value.is_empty()) {
                assign(&mut record, *field, value);
            }
        }

        rows.push(CsvRow {
            row: rows.len() + 2,
            record,
        });
    }

    if rows.is_empty() {
        return Err(PipelineError::Csv {
            reason: "CSV must have a header row and at least one data row".to_string(),
        });
    }

    Ok(rows)
}

fn csv_error(e: ::csv::Error) -> PipelineError {
    PipelineError::Csv {
        reason: e.to_string(),
    }
}

fn assign(record: &mut ExtractedRecord, field: CsvField, value: &str) {
    let value = Some(Scalar::Text(value.to_string()));
    match field {
        CsvField::Name => record.name = value,
        CsvField::Description => record.description = value,
        CsvField::ReligiousAffiliation => record.religious_affiliation = value,
        CsvField::Address => record.address = value,
        CsvField::City => record.city = value,
        CsvField::State => record.state = value,
        CsvField::ZipCode => record.zip_code = value,
        CsvField::MeetingFormat => record.meeting_format = value,
        CsvField::MeetingFrequency => record.meeting_frequency = value,
        CsvField::MeetingLength => record.meeting_length = value,
        CsvField::MeetingType => record.meeting_type = value,
        CsvField::AverageAttendance => record.average_attendance = value,
        CsvField::HasConferences => record.has_conferences = value,
        CsvField::HasOutsideSpeakers => record.has_outside_speakers = value,
        CsvField::HasEducationTraining => record.has_education_training = value,
        CsvField::AnnualPrice => record.annual_price = value,
        CsvField::MonthlyPrice => record.monthly_price = value,
        CsvField::ContactEmail => record.contact_email = value,
        CsvField::ContactPhone => record.contact_phone = value,
        CsvField::Website => record.website = value,
    }
}
