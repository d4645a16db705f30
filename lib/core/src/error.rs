//! Error handling foundation for the ILM platform.
//!
//! This module provides only the `Result` type alias using rootcause.
//! Each crate defines its own domain-specific error enums and returns them
//! wrapped in a `Report` from its service operations.

use rootcause::Report;

/// A Result type alias using rootcause's Report for error handling.
///
/// `C` is the domain error carried at the root of the report.
pub type Result<T, C> = std::result::Result<T, Report<C>>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug)]
    struct Boom;

    impl fmt::Display for Boom {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "boom")
        }
    }

    impl std::error::Error for Boom {}

    #[test]
    fn result_type_works() {
        let ok: Result<i32, Boom> = Ok(42);
        assert_eq!(ok.expect("should be ok"), 42);
    }

    #[test]
    fn report_wraps_domain_error() {
        let err: Result<i32, Boom> = Err(Boom.into());
        let report = err.expect_err("should be err");
        assert!(report.to_string().contains("boom"));
    }
}
