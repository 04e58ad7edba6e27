//! # Interaction Resolution
//!
//! What happens to a packet after the trace step hands it an electron or line
//! event. The kernel only decides *where* a packet interacts; a resolver decides
//! its new direction, frequency and energy and gives it back for another trace.
//!
//! [`ScatterResolver`] implements coherent Thomson scattering and resonant line
//! scattering. Macro-atom style branching needs transition data that lives
//! outside this crate and plugs in through [`InteractionResolver`].

use crate::config::{LineInteraction, TransportSettings};
use crate::error::{Result, TransportError};
use crate::frame::{angle_aberration_cmf_to_lf, doppler_factor, inverse_doppler_factor};
use crate::packet::RPacket;
use crate::plasma::OpacityTables;
use crate::stochastic::RandomSource;

/// Decides the outgoing state of an interacting packet
pub trait InteractionResolver: Sync {
    /// Thomson scattering at the packet's current position
    fn electron_scatter(
        &self,
        packet: &mut RPacket,
        time_explosion: f64,
        settings: &TransportSettings,
        rng: &mut dyn RandomSource,
    ) -> Result<()>;

    /// Line interaction in `packet.next_line_id` at the current position
    fn line_interaction(
        &self,
        packet: &mut RPacket,
        time_explosion: f64,
        opacity: &OpacityTables,
        settings: &TransportSettings,
        rng: &mut dyn RandomSource,
    ) -> Result<()>;
}

/// Coherent (in the co-moving frame) isotropic scattering
#[derive(Debug, Clone, Copy, Default)]
pub struct ScatterResolver;

impl ScatterResolver {
    /// Resolver for the configured line treatment
    ///
    /// Only resonant scattering is self-contained; the branching modes need
    /// macro-atom data and are refused here.
    pub fn for_mode(mode: LineInteraction) -> Result<Self> {
        match mode {
            LineInteraction::Scatter => Ok(Self),
            other => Err(TransportError::config(format!(
                "line interaction {other:?} needs a macro-atom resolver"
            ))),
        }
    }
}

impl InteractionResolver for ScatterResolver {
    fn electron_scatter(
        &self,
        packet: &mut RPacket,
        time_explosion: f64,
        settings: &TransportSettings,
        rng: &mut dyn RandomSource,
    ) -> Result<()> {
        let old_doppler = doppler_factor(packet.r, packet.mu, time_explosion, settings.full_relativity);
        let comov_nu = packet.nu * old_doppler;
        let comov_energy = packet.energy * old_doppler;

        let mu_cmf = rng.random_mu();
        emit(packet, mu_cmf, comov_nu, comov_energy, time_explosion, settings);
        Ok(())
    }

    fn line_interaction(
        &self,
        packet: &mut RPacket,
        time_explosion: f64,
        opacity: &OpacityTables,
        settings: &TransportSettings,
        rng: &mut dyn RandomSource,
    ) -> Result<()> {
        let line = packet.next_line_id;
        if line >= opacity.n_lines() {
            return Err(TransportError::precondition(
                packet.index,
                packet.current_shell_id,
                format!("line interaction requested past the line list (line {line})"),
            ));
        }

        let old_doppler = doppler_factor(packet.r, packet.mu, time_explosion, settings.full_relativity);
        let comov_energy = packet.energy * old_doppler;

        let mu_cmf = rng.random_mu();
        emit(packet, mu_cmf, opacity.line_nu[line], comov_energy, time_explosion, settings);

        packet.last_line_interaction_out_id = Some(line);
        packet.next_line_id = line + 1;
        Ok(())
    }
}

/// Set lab-frame state from a co-moving emission with direction `mu_cmf`
fn emit(
    packet: &mut RPacket,
    mu_cmf: f64,
    comov_nu: f64,
    comov_energy: f64,
    time_explosion: f64,
    settings: &TransportSettings,
) {
    let inverse = inverse_doppler_factor(packet.r, mu_cmf, time_explosion, settings.full_relativity);
    packet.nu = comov_nu * inverse;
    packet.energy = comov_energy * inverse;
    packet.mu = if settings.full_relativity {
        angle_aberration_cmf_to_lf(packet.r, mu_cmf, time_explosion)
    } else {
        mu_cmf
    };
}
