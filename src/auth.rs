//! Auth-domain identifiers, resource/authority addressing, and the credential record model.

pub mod id;
pub mod resource;
pub mod token;

pub use id::*;
pub use resource::*;
pub use token::{record::*, secret::*, session::*};
