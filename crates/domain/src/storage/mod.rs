//! Persistence contracts implemented by `fleetd_storage`.

mod traits;

pub use traits::*;
