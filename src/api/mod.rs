//! Clients for the remote licensing service.

pub mod authenticated;
pub mod errors;
pub mod http;
pub mod public;
pub mod signature;

pub use authenticated::{AuthenticatedApi, Scope};
pub use errors::ApiError;
pub use http::{validate_response, RawResponse};
pub use public::PublicApi;
pub use signature::{AuthScheme, RequestSigner, SignedHeaders};
