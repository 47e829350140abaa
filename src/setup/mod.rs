//! Administrator setup wizard.
//!
//! - `session`: pending session registry and single-message collectors
//! - `wizard`: the two-step `!setup` flow

pub mod session;
pub mod wizard;

pub use wizard::{SetupRequest, SetupWizard, WizardOutcome};
