//! Auth-domain identifiers, client credentials, and token models.

pub mod credentials;
pub mod id;
pub mod token;

pub use credentials::*;
pub use id::*;
pub use token::{record::*, secret::*};
