// handlers/mod.rs - Handler tiers
//
// Public (no auth) → Protected (JWT + user lookup, album and image routes
// additionally require a finished onboarding)
pub mod protected;
pub mod public;
