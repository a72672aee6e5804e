pub mod clock;
pub mod extractor;
pub mod jwt;
pub mod roles;
pub mod test_utils;
