//! CSV text through the normalizer into the record store.

use scrape_pipeline::{
    import_csv,
    normalize::csv::parse_csv,
    normalize,
    testing::MemoryStore,
    types::record::{AnnualPriceRange, AttendanceRange, MeetingLengthRange, MonthlyPriceRange},
    types::record::{ConferenceLevel, MeetingFormat, MeetingFrequency, MeetingType},
};

const HEADER: &str = "name,religious_affiliation,address,city,state,zip,meeting_format,meeting_frequency,meeting_type,meeting_length,average_attendance,annual_price,monthly_price,has_conferences,description";

fn row(length: &str, attendance: &str, annual: &str, monthly: &str) -> String {
    format!(
        "{}\nHarbor Forum,Catholic,9 Pier Rd,Duluth,mn,55802-1234,Hybrid,Every month,Peer Group,{},{},{},{},Multiple per year,Monthly roundtable\n",
        HEADER, length, attendance, annual, monthly
    )
}

fn normalize_row(text: &str) -> scrape_pipeline::ProgramRecord {
    let rows = parse_csv(text).unwrap();
    assert_eq!(rows.len(), 1);
    normalize(&rows[0].record).unwrap()
}

#[test]
fn test_complete_row_round_trips_with_buckets() {
    let record = normalize_row(&row("3", "12", "300", "45"));

    assert_eq!(record.name, "Harbor Forum");
    assert_eq!(record.state, "MN");
    assert_eq!(record.zip_code, "55802-1234");
    assert_eq!(record.meeting_format, MeetingFormat::Both);
    assert_eq!(record.meeting_frequency, MeetingFrequency::Monthly);
    assert_eq!(record.meeting_type, MeetingType::PeerGroup);
    assert_eq!(record.has_conferences, ConferenceLevel::Multiple);

    assert_eq!(record.meeting_length, Some(3.0));
    assert_eq!(record.meeting_length_range, Some(MeetingLengthRange::TwoToFour));
    assert_eq!(record.average_attendance_range, Some(AttendanceRange::UpTo20));
    assert_eq!(record.annual_price_range, Some(AnnualPriceRange::UpTo600));
    assert_eq!(record.annual_price_range.map(|r| r.as_str()), Some("241-600"));
    assert_eq!(record.monthly_price_range, Some(MonthlyPriceRange::UpTo50));

    let description = record.description.unwrap();
    assert_eq!(description.plain_text(), "Monthly roundtable");
}

#[test]
fn test_zero_price_has_no_bucket() {
    let record = normalize_row(&row("1.5", "8", "0", "0"));
    assert_eq!(record.annual_price_range, None);
    assert_eq!(record.monthly_price_range, None);
    assert_eq!(record.meeting_length_range, Some(MeetingLengthRange::OneToTwo));
}

#[test]
fn test_attendance_boundaries() {
    let cases = [
        ("10", AttendanceRange::UpTo10, "1-10"),
        ("11", AttendanceRange::UpTo20, "10-20"),
        ("100", AttendanceRange::UpTo100, "50-100"),
        ("101", AttendanceRange::Over100, "100+"),
    ];
    for (attendance, expected, label) in cases {
        let record = normalize_row(&row("2", attendance, "", ""));
        assert_eq!(record.average_attendance_range, Some(expected), "attendance {}", attendance);
        assert_eq!(expected.as_str(), label);
    }
}

#[tokio::test]
async fn test_import_reports_per_row_outcomes() {
    let store = MemoryStore::new();
    let text = format!(
        "{}\n\
         ,protestant,1 A St,Austin,TX,73301,online,weekly,forum,,,,,,\n\
         Lakeside Forum,protestant,1 A St,Austin,TX,73301,online,weekly,forum,,,,,,",
        row("2", "30", "", "").trim_end()
    );

    let summary = import_csv(&store, &text).await.unwrap();
    assert_eq!(summary.total, 3);
    assert_eq!(summary.created, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.errors[0].row, Some(3));
    assert_eq!(summary.errors[0].name, None);
    assert_eq!(summary.errors[0].error, "Missing required field: name");

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["errors"][0]["row"], 3);
    assert!(json["errors"][0].get("name").is_none());
}
