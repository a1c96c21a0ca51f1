pub mod analyzer;
pub mod checks;
pub mod classifier;
pub mod constants;
pub mod model;
pub mod request;

#[cfg(test)]
mod test_utils;
