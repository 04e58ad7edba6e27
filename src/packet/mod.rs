//! # Packet Module
//!
//! The energy packet traced through the ejecta and its lifecycle states.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of a packet
///
/// `Created → InProcess → {Emitted, Reabsorbed}`; the last two are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PacketStatus {
    /// Launched but not yet traced
    Created,
    /// Being transported
    InProcess,
    /// Escaped through the outer boundary
    Emitted,
    /// Fell through the inner boundary
    Reabsorbed,
}

impl PacketStatus {
    /// No further transitions possible
    pub fn is_terminal(self) -> bool {
        matches!(self, PacketStatus::Emitted | PacketStatus::Reabsorbed)
    }
}

/// Next event selected by the trace step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InteractionType {
    /// Packet reaches the inner or outer sphere of its shell
    Boundary,
    /// Thomson scattering off a free electron
    ElectronScattering,
    /// Resonant interaction with an atomic line
    Line,
}

impl fmt::Display for InteractionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InteractionType::Boundary => write!(f, "boundary"),
            InteractionType::ElectronScattering => write!(f, "e-scattering"),
            InteractionType::Line => write!(f, "line"),
        }
    }
}

/// A Monte Carlo energy packet (r-packet)
#[derive(Debug, Clone, PartialEq)]
pub struct RPacket {
    /// Packet id within its iteration, used in diagnostics
    pub index: u64,
    /// Radius (cm)
    pub r: f64,
    /// Direction cosine relative to the radial direction
    pub mu: f64,
    /// Lab-frame frequency (Hz)
    pub nu: f64,
    /// Lab-frame energy weight
    pub energy: f64,
    /// Shell the packet is in
    pub current_shell_id: usize,
    /// First line of the descending line list not yet passed
    pub next_line_id: usize,
    /// Lifecycle state
    pub status: PacketStatus,
    /// Most recent interaction, `None` until the first one
    pub last_interaction_type: Option<InteractionType>,
    /// Lab frequency when the last line interaction started
    pub last_interaction_in_nu: f64,
    /// Line that absorbed the packet last
    pub last_line_interaction_in_id: Option<usize>,
    /// Line that re-emitted the packet last
    pub last_line_interaction_out_id: Option<usize>,
}

impl RPacket {
    /// Create new packet in `shell`; `next_line_id` starts at 0
    pub fn new(index: u64, r: f64, mu: f64, nu: f64, energy: f64, shell: usize) -> Self {
        Self {
            index,
            r,
            mu,
            nu,
            energy,
            current_shell_id: shell,
            next_line_id: 0,
            status: PacketStatus::Created,
            last_interaction_type: None,
            last_interaction_in_nu: 0.0,
            last_line_interaction_in_id: None,
            last_line_interaction_out_id: None,
        }
    }

    /// Packet is still in the ejecta
    pub fn is_alive(&self) -> bool {
        !self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_creation() {
        let p = RPacket::new(3, 1e15, 0.5, 1e15, 1e-3, 0);
        assert_eq!(p.status, PacketStatus::Created);
        assert_eq!(p.next_line_id, 0);
        assert!(p.is_alive());
        assert!(p.last_interaction_type.is_none());
    }

    #[test]
    fn test_terminal_states() {
        assert!(PacketStatus::Emitted.is_terminal());
        assert!(PacketStatus::Reabsorbed.is_terminal());
        assert!(!PacketStatus::Created.is_terminal());
        assert!(!PacketStatus::InProcess.is_terminal());
    }

    #[test]
    fn test_interaction_display() {
        assert_eq!(InteractionType::Line.to_string(), "line");
        assert_eq!(InteractionType::ElectronScattering.to_string(), "e-scattering");
    }
}
