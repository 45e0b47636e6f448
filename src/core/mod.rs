// Domain-layer modules and shared errors/models
pub mod validation {
    pub use crate::validation::*;
}

pub mod query {
    pub use crate::query::*;
}

pub mod import {
    pub use crate::import::*;
}

pub mod export {
    pub use crate::export::*;
}

pub mod stats {
    pub use crate::stats::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod services {
    pub use crate::services::*;
}

pub mod errors {
    pub use crate::errors::*;
}
