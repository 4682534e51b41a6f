//! RecoFine server: HTTP trigger surface for the similarity engines.

pub mod routes;
pub mod state;

pub use routes::build_router;
pub use state::AppState;
