//! Pure computation: geocell encoding, spherical distance and input validation.
//!
//! Nothing in this module touches the index store.

pub mod distance;
pub mod geocell;
pub mod validation;
