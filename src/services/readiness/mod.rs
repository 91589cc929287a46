pub mod types;
pub mod policy;
pub mod clock;
pub mod probe;
pub mod poller;
pub mod gate;

pub use types::*;
pub use policy::*;
pub use clock::*;
pub use probe::*;
pub use poller::*;
pub use gate::*;
