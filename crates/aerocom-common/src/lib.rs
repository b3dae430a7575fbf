//! Common types shared across the aerocom-grid workspace.

pub mod error;
pub mod time;
pub mod tstype;
pub mod vertical;

pub use error::{CommonError, CommonResult};
pub use time::{parse_time_bound, TimeWindow, CLIMATOLOGY_YEAR};
pub use tstype::TsType;
pub use vertical::VerticalCode;
