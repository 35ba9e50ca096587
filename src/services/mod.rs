pub mod auth_service;
pub mod auth_service_impl;
pub use auth_service::{AuthError, AuthService};
pub use auth_service_impl::SeaOrmAuthService;

pub mod computer_registry;
pub use computer_registry::ComputerMatch;

pub mod preference_service;
pub mod preference_service_impl;
pub use preference_service::{PreferenceError, PreferenceService};
pub use preference_service_impl::SeaOrmPreferenceService;

pub mod rpc_service;
pub mod rpc_service_impl;
pub use rpc_service::{RpcError, RpcOutcome, RpcService};
pub use rpc_service_impl::SeaOrmRpcService;
