// Identity boundary: bearer tokens in, `Principal` out, plus the
// per-operation authorization predicates.

pub mod errors;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod policy;

pub use errors::AuthError;
pub use jwt::JwtService;
pub use models::{Claims, Principal, UserRole};
