// handlers/public/auth/mod.rs - Public authentication handlers
//
// Token acquisition endpoints. Everything under /api expects the token these return.

pub mod login;    // POST /auth/login
pub mod register; // POST /auth/register

pub use login::login_post;
pub use register::register_post;
