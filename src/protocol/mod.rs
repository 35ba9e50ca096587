//! BOINC account-manager protocol: wire format, client capability detection,
//! preference knobs and the reconciliation engine.

pub mod preferences;
pub mod reconcile;
pub mod version;
pub mod wire;

pub use preferences::PreferenceSettings;
pub use reconcile::{ReconcileInput, ReconcileOutcome, Verdict, reconcile};
pub use version::{ClientCapabilities, ParsedVersion};
pub use wire::{
    AccountDirective, AccountManagerReply, AccountManagerRequest, BoincErrorCode, ClientProject,
    WireError,
};
