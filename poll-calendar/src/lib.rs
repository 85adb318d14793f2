//! Rolling weekly periods for recurring polls.
//!
//! Two independent windows recur every week:
//!
//! - **Weekend block**: Friday, Saturday, Sunday. Pinned to the ISO week of
//!   the reference date, resetting at Monday 00:00.
//! - **Weekday block**: Monday through Thursday. Rolls over to next week's
//!   dates at Friday 00:00.
//!
//! All resolution happens in the deployment's timezone; instants from any
//! other zone are converted first.
//!
//! # Example
//!
//! ```
//! use chrono::NaiveDate;
//! use poll_calendar::{Day, PeriodKind, PeriodResolver};
//!
//! let monday = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
//! let block = PeriodResolver::resolve_date(PeriodKind::Weekend, monday);
//! assert_eq!(block.date_of(Day::Friday), NaiveDate::from_ymd_opt(2026, 1, 9));
//! ```

pub mod resolver;
pub mod types;

pub use resolver::{BlockDates, PeriodResolver};
pub use types::*;
