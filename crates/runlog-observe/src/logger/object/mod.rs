pub mod clock;
pub use clock::{Clock, FixedClock, SystemClock};

pub mod level;
pub use level::LoggerLevel;

pub mod path_format;
pub use path_format::PathFormat;

pub mod template;
pub use template::{LogTemplate, Segment};

pub mod timestamp;

pub mod timezone;
pub use timezone::{LoggerTimeZone, init_local_offset};
