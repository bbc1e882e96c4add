//! Staged rotation of the API token.
//!
//! A rotation attempt is four invocations sharing a secret id and a request
//! token:
//! 1. **createSecret**: mint a token and store it as the `AWSPENDING` version
//! 2. **setSecret**: install it with the consuming service (nothing to do here)
//! 3. **testSecret**: prove the pending token is live and usable
//! 4. **finishSecret**: atomically move `AWSCURRENT` onto the pending version

mod coordinator;
mod error;
mod phases;
pub mod simulate;
mod types;

pub use coordinator::{Precondition, RotationCoordinator};
pub use error::RotationError;
pub use simulate::{run_simulation, SimulationOptions, SimulationReport};
pub use types::{PhaseOutcome, RotationEvent, RotationStep};
