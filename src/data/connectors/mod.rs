mod csv;
mod types;
mod validator;

pub use csv::CsvFeed;
pub use types::{OptionalColumn, RequiredColumn};
pub use validator::CandleValidator;
