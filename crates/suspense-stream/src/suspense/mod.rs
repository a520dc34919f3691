pub mod bootstrap;
pub mod channel;
pub mod coordinator;
pub mod multiplexer;
pub mod registry;
pub mod resolver;
pub mod types;


pub use bootstrap::{BOOTSTRAP_SCRIPT_END, BOOTSTRAP_SCRIPT_START, insertion_instruction};
pub use channel::{ChannelStatus, OutOfBandReceiver, OutOfBandSender, out_of_band_channel};
pub use coordinator::{CoordinatorObserver, SuspenseCoordinator, SuspenseHooks};
pub use multiplexer::{MultiplexerState, PrimaryStream, StreamMultiplexer};
pub use registry::BoundaryRegistry;
pub use resolver::BoundaryResolver;
pub use types::{BoundaryId, ReadyChunk};
