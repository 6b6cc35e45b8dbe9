use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: i32,
    /// 1-based.
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|_| Self { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn previous(self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    pub fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn first_day(self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn last_day(self) -> NaiveDate {
        self.next().first_day().pred_opt().unwrap_or(NaiveDate::MAX)
    }

    pub fn days_in_month(self) -> u32 {
        self.last_day().day()
    }

    pub fn contains(self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (year, month) = raw
            .trim()
            .split_once('-')
            .ok_or_else(|| format!("expected YYYY-MM, got {raw:?}"))?;
        let year = year.parse::<i32>().map_err(|err| err.to_string())?;
        let month = month.parse::<u32>().map_err(|err| err.to_string())?;
        Self::new(year, month).ok_or_else(|| format!("no such month {raw:?}"))
    }
}

/// The slice of time projections are computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "value")]
pub enum DateWindow {
    Day(NaiveDate),
    Month(YearMonth),
}

impl DateWindow {
    pub fn contains(self, date: NaiveDate) -> bool {
        match self {
            Self::Day(day) => day == date,
            Self::Month(month) => month.contains(date),
        }
    }
}

/// Transient, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewingContext {
    pub month: YearMonth,
    pub selected_date: Option<NaiveDate>,
}

impl ViewingContext {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            month: YearMonth::of(today),
            selected_date: None,
        }
    }

    pub fn previous_month(&mut self) {
        self.go_to(self.month.previous());
    }

    pub fn next_month(&mut self) {
        self.go_to(self.month.next());
    }

    /// Any month change drops the date selection.
    pub fn go_to(&mut self, month: YearMonth) {
        self.month = month;
        self.selected_date = None;
    }

    pub fn select_date(&mut self, date: NaiveDate) {
        self.month = YearMonth::of(date);
        self.selected_date = Some(date);
    }

    pub fn clear_selection(&mut self) {
        self.selected_date = None;
    }

    pub fn window(&self) -> DateWindow {
        match self.selected_date {
            Some(date) => DateWindow::Day(date),
            None => DateWindow::Month(self.month),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarCell<T> {
    pub date: NaiveDate,
    /// False for the previous/next month days padding the first and last week.
    pub in_month: bool,
    pub selected: bool,
    /// Only filled for days of the viewed month.
    pub detail: Option<T>,
}

/// Whole weeks covering `month`, padded with neighbouring days.
pub fn month_grid(month: YearMonth, week_start: Weekday) -> Vec<NaiveDate> {
    let first = month.first_day();
    let last = month.last_day();
    let leading = u64::from(
        (first.weekday().num_days_from_sunday() + 7 - week_start.num_days_from_sunday()) % 7,
    );
    let week_end = week_start.pred();
    let trailing = u64::from(
        (week_end.num_days_from_sunday() + 7 - last.weekday().num_days_from_sunday()) % 7,
    );

    let start = first.checked_sub_days(Days::new(leading)).unwrap_or(first);
    let total = leading + u64::from(month.days_in_month()) + trailing;
    start
        .iter_days()
        .take(usize::try_from(total).unwrap_or(0))
        .collect()
}

/// Builds the cell list for a month, asking `detail` about in-month days only.
pub fn calendar_cells<T>(
    context: &ViewingContext,
    week_start: Weekday,
    mut detail: impl FnMut(NaiveDate) -> T,
) -> Vec<CalendarCell<T>> {
    month_grid(context.month, week_start)
        .into_iter()
        .map(|date| {
            let in_month = context.month.contains(date);
            CalendarCell {
                date,
                in_month,
                selected: context.selected_date == Some(date),
                detail: if in_month { Some(detail(date)) } else { None },
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{month_grid, DateWindow, ViewingContext, YearMonth};
    use chrono::{Datelike, NaiveDate, Weekday};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn month_navigation_rolls_over_years() {
        let january = YearMonth::new(2024, 1).expect("month");
        assert_eq!(january.previous(), YearMonth::new(2023, 12).expect("month"));
        let december = YearMonth::new(2023, 12).expect("month");
        assert_eq!(december.next(), january);
    }

    #[test]
    fn navigating_clears_selected_date() {
        let mut context = ViewingContext::new(date(2024, 6, 15));
        context.select_date(date(2024, 6, 5));
        assert_eq!(context.window(), DateWindow::Day(date(2024, 6, 5)));

        context.next_month();
        assert_eq!(context.selected_date, None);
        assert_eq!(context.window(), DateWindow::Month(YearMonth::new(2024, 7).expect("month")));
    }

    #[test]
    fn selecting_a_date_moves_the_month() {
        let mut context = ViewingContext::new(date(2024, 6, 15));
        context.select_date(date(2024, 2, 29));
        assert_eq!(context.month, YearMonth::new(2024, 2).expect("month"));
    }

    #[test]
    fn days_in_month_handles_leap_years() {
        assert_eq!(YearMonth::new(2024, 2).expect("month").days_in_month(), 29);
        assert_eq!(YearMonth::new(2023, 2).expect("month").days_in_month(), 28);
        assert_eq!(YearMonth::new(2023, 12).expect("month").last_day(), date(2023, 12, 31));
    }

    #[test]
    fn grid_pads_to_whole_weeks() {
        // June 2024 starts on a Saturday and ends on a Sunday.
        let june = YearMonth::new(2024, 6).expect("month");
        let sunday_grid = month_grid(june, Weekday::Sun);
        assert_eq!(sunday_grid.len() % 7, 0);
        assert_eq!(sunday_grid.first().copied(), Some(date(2024, 5, 26)));
        assert_eq!(sunday_grid.last().copied(), Some(date(2024, 7, 6)));

        let monday_grid = month_grid(june, Weekday::Mon);
        assert_eq!(monday_grid.len() % 7, 0);
        assert_eq!(monday_grid.first().map(|d| d.weekday()), Some(Weekday::Mon));
        assert_eq!(monday_grid.last().copied(), Some(date(2024, 6, 30)));
    }

    #[test]
    fn parses_year_month() {
        let parsed: YearMonth = "2024-06".parse().expect("parse");
        assert_eq!(parsed.to_string(), "2024-06");
        assert!("2024-13".parse::<YearMonth>().is_err());
    }
}
