use jiff::{Span, civil::Date};

use crate::models::DateWindow;

/// Plans discovery windows around `anchor`: `recent_months` one-month windows
/// walking back from the anchor, `upcoming_months` walking forward from it,
/// then `past_years` one-year windows walking back from where the recent
/// windows stop.
///
/// Every window is computed from the anchor directly, so the result does not
/// depend on the order in which the categories are produced.
pub fn plan(
    anchor: Date,
    recent_months: u32,
    upcoming_months: u32,
    past_years: u32,
) -> Result<Vec<DateWindow>, jiff::Error> {
    let mut windows = Vec::new();

    for i in 0..recent_months {
        windows.push(DateWindow {
            start: shift_months(anchor, -(i64::from(i) + 1))?,
            end: shift_months(anchor, -i64::from(i))?,
        });
    }

    for i in 0..upcoming_months {
        windows.push(DateWindow {
            start: shift_months(anchor, i64::from(i))?,
            end: shift_months(anchor, i64::from(i) + 1)?,
        });
    }

    let past_anchor = shift_months(anchor, -i64::from(recent_months))?;
    for i in 0..past_years {
        windows.push(DateWindow {
            start: shift_years(past_anchor, -(i64::from(i) + 1))?,
            end: shift_years(past_anchor, -i64::from(i))?,
        });
    }

    Ok(windows)
}

fn shift_months(date: Date, months: i64) -> Result<Date, jiff::Error> {
    date.checked_add(Span::new().try_months(months)?)
}

fn shift_years(date: Date, years: i64) -> Result<Date, jiff::Error> {
    date.checked_add(Span::new().try_years(years)?)
}
