//! Value types with their own storage representation.

pub mod date_range;
pub mod datetime;
pub mod geo_point;

pub use date_range::DateRange;
pub use datetime::{DB_DATE_FORMAT, DB_DATETIME_FORMAT, DateTime, ISO_DATETIME_FORMAT};
pub use geo_point::GeoPoint;
