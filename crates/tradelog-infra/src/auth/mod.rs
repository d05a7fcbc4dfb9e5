//! Bearer token support.

mod jwt;

pub use jwt::{JwtConfig, JwtTokenService};
