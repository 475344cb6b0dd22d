//! Communication layer: point-to-point backends, collectives, ownership and
//! wire records.

pub mod collective;
pub mod communicator;
pub mod ownership;
pub mod wire;

pub use collective::{BlockLayout, ProcessGroup};
pub use communicator::{CommTag, Communicator, NoComm, ThreadComm};
pub use ownership::Ownership;
