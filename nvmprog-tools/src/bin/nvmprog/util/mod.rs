pub mod common_options;
pub mod logging;
pub mod progress;

use std::num::ParseIntError;

pub fn parse_u64(input: &str) -> Result<u64, ParseIntError> {
    parse_int::parse(input)
}
