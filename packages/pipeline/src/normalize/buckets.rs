//! Numeric → range-label bucketing for faceted filters.
//!
//! A non-positive value has no bucket. It is treated as unset rather than
//! invalid, so a price of exactly 0 never lands in the lowest bucket.

use crate::types::record::{AnnualPriceRange, AttendanceRange, MeetingLengthRange, MonthlyPriceRange};

/// Hours per meeting: ≤2, ≤4, else.
pub fn meeting_length_range(hours: f64) -> Option<MeetingLengthRange> {
    if hours.is_nan() || hours <= 0.0 {
        return None;
    }
    Some(if hours <= 2.0 {
        MeetingLengthRange::OneToTwo
    } else if hours <= 4.0 {
        MeetingLengthRange::TwoToFour
    } else {
        MeetingLengthRange::FourToEight
    })
}

/// Average attendance over breakpoints 10/20/50/100.
pub fn attendance_range(count: f64) -> Option<AttendanceRange> {
    if count.is_nan() || count <= 0.0 {
        return None;
    }
    Some(if count <= 10.0 {
        AttendanceRange::UpTo10
    } else if count <= 20.0 {
        AttendanceRange::UpTo20
    } else if count <= 50.0 {
        AttendanceRange::UpTo50
    } else if count <= 100.0 {
        AttendanceRange::UpTo100
    } else {
        AttendanceRange::Over100
    })
}

/// Annual price in USD over breakpoints 240/600/2400/8400.
pub fn annual_price_range(usd: f64) -> Option<AnnualPriceRange> {
    if usd.is_nan() || usd <= 0.0 {
        return None;
    }
    Some(if usd <= 240.0 {
        AnnualPriceRange::UpTo240
    } else if usd <= 600.0 {
        AnnualPriceRange::UpTo600
    } else if usd <= 2400.0 {
        AnnualPriceRange::UpTo2400
    } else if usd <= 8400.0 {
        AnnualPriceRange::UpTo8400
    } else {
        AnnualPriceRange::Over8400
    })
}

/// Monthly price in USD over breakpoints 20/50/200/700.
pub fn monthly_price_range(usd: f64) -> Option<MonthlyPriceRange> {
    if usd.is_nan() || usd <= 0.0 {
        return None;
    }
    Some(if usd <= 20.0 {
        MonthlyPriceRange::UpTo20
    } else if usd <= 50.0 {
        MonthlyPriceRange::UpTo50
    } else if usd <= 200.0 {
        MonthlyPriceRange::UpTo200
    } else if usd <= 700.0 {
        MonthlyPriceRange::UpTo700
    } else {
        MonthlyPriceRange::Over700
    })
}
