// handlers/protected/mod.rs - Protected handlers (JWT required, /api prefix)
//
// Every handler here receives the `ValidatedUser` injected by
// `validate_user_middleware`. All but auth and account sit behind
// `require_onboarded_middleware` as well.
pub mod account;
pub mod albums;
pub mod auth;
pub mod images;
pub mod uploads;
