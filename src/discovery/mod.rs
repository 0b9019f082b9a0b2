//! Race discovery: which tracks race on which days, and which race ids
//! they run.

pub mod dates;
pub mod enumerator;
pub mod resolver;

pub use dates::{date_range, parse_base_date};
pub use enumerator::RaceIdEnumerator;
pub use resolver::TrackActivityResolver;
