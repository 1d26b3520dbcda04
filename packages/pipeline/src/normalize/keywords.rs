//! Free-text → category matching.
//!
//! An exact canonical label always wins. Otherwise the lower-cased text is
//! checked for keywords in table order and the first hit decides. Unmatched
//! text yields `None`, never an error.

use regex::Regex;
use std::sync::LazyLock;

use crate::types::record::{
    ConferenceLevel, MeetingFormat, MeetingFrequency, MeetingType, ReligiousAffiliation, Scalar,
};

static RE_STATE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Z]{2}$").unwrap());
static RE_ZIP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{5}(-\d{4})?$").unwrap());

const AFFILIATION_KEYWORDS: &[(&[&str], ReligiousAffiliation)] = &[
    (&["catholic"], ReligiousAffiliation::Catholic),
    (&["protestant", "christian"], ReligiousAffiliation::Protestant),
];

const FORMAT_KEYWORDS: &[(&[&str], MeetingFormat)] = &[
    (&["both", "hybrid"], MeetingFormat::Both),
    (&["online", "virtual", "remote"], MeetingFormat::Online),
    (&["in-person", "in person", "person"], MeetingFormat::InPerson),
];

const FREQUENCY_KEYWORDS: &[(&[&str], MeetingFrequency)] = &[
    (&["week"], MeetingFrequency::Weekly),
    (&["month"], MeetingFrequency::Monthly),
    (&["quarter"], MeetingFrequency::Quarterly),
];

// "group" is checked before "small", so "small group" reads as peer-group.
const TYPE_KEYWORDS: &[(&[&str], MeetingType)] = &[
    (&["peer", "group"], MeetingType::PeerGroup),
    (&["forum", "speaker", "q&a"], MeetingType::Forum),
    (&["small", "discussion"], MeetingType::SmallGroup),
];

fn match_keywords<T: Copy>(text: &str, table: &[(&[&str], T)]) -> Option<T> {
    let lower = text.to_lowercase();
    table
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(_, value)| *value)
}

pub fn religious_affiliation(text: &str) -> Option<ReligiousAffiliation> {
    ReligiousAffiliation::from_label(text.trim())
        .or_else(|| match_keywords(text, AFFILIATION_KEYWORDS))
}

pub fn meeting_format(text: &str) -> Option<MeetingFormat> {
    MeetingFormat::from_label(text.trim()).or_else(|| match_keywords(text, FORMAT_KEYWORDS))
}

pub fn meeting_frequency(text: &str) -> Option<MeetingFrequency> {
    MeetingFrequency::from_label(text.trim())
        .or_else(|| match_keywords(text, FREQUENCY_KEYWORDS))
}

pub fn meeting_type(text: &str) -> Option<MeetingType> {
    MeetingType::from_label(text.trim()).or_else(|| match_keywords(text, TYPE_KEYWORDS))
}

/// Conference level. A boolean `true` reads as annual; any other non-empty
/// value that matches nothing reads as none.
pub fn conference_level(value: &Scalar) -> ConferenceLevel {
    let Some(text) = value.as_text() else {
        return ConferenceLevel::None;
    };
    if let Some(level) = ConferenceLevel::from_label(&text) {
        return level;
    }

    let lower = text.to_lowercase();
    if lower.contains("multiple") || lower.contains("many") {
        ConferenceLevel::Multiple
    } else if lower.contains("annual")
        || lower.contains("yearly")
        || lower.contains("one")
        || value.is_truthy()
    {
        ConferenceLevel::Annual
    } else {
        ConferenceLevel::None
    }
}

/// Upper-cased two-letter state code, or `None` if the text isn't one.
pub fn state_code(text: &str) -> Option<String> {
    let upper = text.trim().to_uppercase();
    RE_STATE.is_match(&upper).then_some(upper)
}

/// Textual zip code. Numeric values are zero-padded to five digits.
pub fn zip_text(value: &Scalar) -> Option<String> {
    match value {
        Scalar::Number(n) if n.fract() == 0.0 && *n >= 0.0 && *n < 100_000.0 => {
            Some(format!("{:05}", *n as u32))
        }
        other => other.as_text(),
    }
}

pub fn is_valid_zip(zip: &str) -> bool {
    RE_ZIP.is_match(zip)
}
