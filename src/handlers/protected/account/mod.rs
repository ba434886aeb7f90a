// handlers/protected/account/mod.rs - Profile management
pub mod onboarding; // PUT /api/account/onboarding

pub use onboarding::onboarding_put;
