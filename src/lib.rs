//! # EJECTA-TRANSPORT
//!
//! Monte Carlo radiative transfer of photon packets through homologously
//! expanding supernova ejecta.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                          EJECTA-TRANSPORT                                   │
//! │                Monte Carlo r-packet transport in Rust                       │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │  INPUT:   ModelSnapshot (ShellGeometry + OpacityTables), RunConfig          │
//! │  SOURCE:  BlackBodySource at the inner boundary                             │
//! │  KERNEL:  trace_packet → move_packet → boundary / e-scatter / line          │
//! │  RESOLVE: InteractionResolver (ScatterResolver)                             │
//! │  OUTPUT:  Estimators (J, ν̄, J_blue, Ė_lu) + emitted spectrum               │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Frames
//!
//! Packets carry lab-frame frequency and energy. Opacities and estimators live
//! in the co-moving frame; [`frame`] holds the Doppler and aberration transforms
//! between the two, to first order in β or with full special relativity.
//!
//! ## Determinism
//!
//! Every packet draws from its own ChaCha8 generator seeded by the run seed and
//! its index, so a run is reproducible regardless of the thread count.

pub mod constants;
pub mod error;
pub mod config;
pub mod stochastic;
pub mod frame;
pub mod geometry;
pub mod plasma;
pub mod packet;
pub mod estimators;
pub mod transport;
pub mod interaction;
pub mod source;
pub mod model;
pub mod simulator;

// Re-exports
pub use config::{LineInteraction, RunConfig, TransportSettings};
pub use error::{Result, TransportError};
pub use estimators::Estimators;
pub use geometry::ShellGeometry;
pub use interaction::{InteractionResolver, ScatterResolver};
pub use model::ModelSnapshot;
pub use packet::{InteractionType, PacketStatus, RPacket};
pub use plasma::OpacityTables;
pub use simulator::{IterationResult, MonteCarloRunner, TransportStats};
pub use stochastic::{RandomGenerator, RandomSource};
pub use transport::{move_across_shell_boundary, move_packet, trace_packet, TraceOutcome};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Information about the transport engine
pub fn info() -> String {
    format!(
        "EJECTA-TRANSPORT v{}\n\
         Monte Carlo photon-packet transport for supernova ejecta\n\
         Sobolev line opacities, Thomson scattering, homologous expansion",
        VERSION
    )
}
