pub mod path;
pub mod test_helpers;
