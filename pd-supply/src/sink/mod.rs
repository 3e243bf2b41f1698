//! The PD sink side, built around the AP33772 sink controller.
//!
//! The controller runs the PD protocol on its own. The host reads the source's capabilities
//! from it, decides on a profile and writes back a request data object (RDO).
//!
//! - [`pdo`] parses the raw capability table into a typed catalog.
//! - [`request`] holds the request data objects and the profile selection policy.
//! - [`status`] decodes the status register into negotiation events.
//! - [`device`] ties these together in a session that owns all negotiation state.
pub mod device;
pub mod pdo;
pub mod registers;
pub mod request;
pub mod status;

pub use device::{Ap33772, Config, Contract};
