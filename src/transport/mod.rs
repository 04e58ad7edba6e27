//! # Packet Transport Kernel
//!
//! Trace, move and boundary-crossing steps for a single r-packet.
//!
//! ## Algorithm
//!
//! A packet in shell `s` draws an optical depth budget `τ_event = −ln U` and
//! walks the descending line list from `next_line_id`. For each line it compares
//! three candidate distances:
//!
//! ```text
//! d_boundary   straight line to the shell edge
//! d_electron   distance that spends the remaining budget on Thomson scattering
//! d_trace      distance until the co-moving frequency redshifts onto the line
//! ```
//!
//! The boundary wins ties, then electron scattering, then the line. A line is
//! only taken once the accumulated Sobolev plus electron optical depth exceeds
//! the budget. Because the co-moving frequency only decreases along a flight,
//! the scan resumes where the previous one stopped and costs O(lines crossed).
//!
//! ## References
//!
//! - Lucy, "Computing radiative equilibria with Monte Carlo techniques", A&A 344 (1999)
//! - Mazzali & Lucy, "The application of Monte Carlo methods to the synthesis of
//!   early-time supernovae spectra", A&A 279 (1993)

use log::trace;

use crate::config::TransportSettings;
use crate::constants::BOUNDARY_ROUNDOFF;
use crate::error::{Result, TransportError};
use crate::estimators::Estimators;
use crate::frame::doppler_factor;
use crate::geometry::{distance_boundary, distance_electron, distance_line, tau_electron, ShellGeometry};
use crate::packet::{InteractionType, PacketStatus, RPacket};
use crate::plasma::OpacityTables;
use crate::stochastic::RandomSource;

/// Next event of a packet and how far away it is
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceOutcome {
    /// Distance to the event (cm)
    pub distance: f64,
    /// Event type
    pub interaction: InteractionType,
    /// Shell change if the event is a boundary crossing (+1 outward, −1 inward)
    pub delta_shell: i32,
}

// ============================================================================
// TRACE STEP
// ============================================================================

/// Find the next event of `packet`
///
/// Mutates only `status` (Created → InProcess), `next_line_id` and, on a line
/// event, the line diagnostics. Line estimators are incremented for every line
/// passed on the way, but not for a line at which a boundary or electron event
/// cuts the flight short.
pub fn trace_packet<R: RandomSource + ?Sized>(
    packet: &mut RPacket,
    geometry: &ShellGeometry,
    opacity: &OpacityTables,
    estimators: &mut Estimators,
    settings: &TransportSettings,
    rng: &mut R,
) -> Result<TraceOutcome> {
    check_packet(packet, geometry, opacity)?;
    if packet.status == PacketStatus::Created {
        packet.status = PacketStatus::InProcess;
    }

    let shell = packet.current_shell_id;
    let time_explosion = geometry.time_explosion;

    let (mut distance_boundary, delta_shell) = distance_boundary(
        packet.r,
        packet.mu,
        geometry.r_inner[shell],
        geometry.r_outer[shell],
    );
    if distance_boundary < 0.0 && distance_boundary >= -packet.r * BOUNDARY_ROUNDOFF {
        // On the edge after an interaction there
        distance_boundary = 0.0;
    }
    if !(distance_boundary >= 0.0) {
        return Err(numerical(packet, packet.next_line_id, "distance_boundary", distance_boundary));
    }

    let tau_event = rng.tau_event();
    let electron_density = opacity.electron_density[shell];
    let mut distance_electron = distance_electron(electron_density, tau_event);

    let comov_nu = packet.nu
        * doppler_factor(packet.r, packet.mu, time_explosion, settings.full_relativity);

    let n_lines = opacity.n_lines();
    let last_line = n_lines - 1;
    let mut tau_line_combined = 0.0;

    for line in packet.next_line_id..n_lines {
        // Disabled lines are transparent: they neither absorb nor eat the budget
        if !settings.disable_line_scattering {
            tau_line_combined += opacity.tau_sobolev(line, shell);
        }

        let distance_trace = distance_line(
            packet.nu,
            comov_nu,
            opacity.line_nu[line],
            line == last_line,
            packet.r,
            packet.mu,
            time_explosion,
            settings.full_relativity,
        );
        if !(distance_trace >= 0.0) {
            return Err(numerical(packet, line, "distance_trace", distance_trace));
        }

        let tau_trace_combined = tau_line_combined + tau_electron(electron_density, distance_trace);

        if let Some(interaction) = competing_event(distance_boundary, distance_electron, distance_trace) {
            packet.next_line_id = line;
            let distance = match interaction {
                InteractionType::Boundary => distance_boundary,
                _ => distance_electron,
            };
            return Ok(finish(packet, distance, interaction, delta_shell));
        }

        estimators.update_line(
            packet,
            line,
            distance_trace,
            time_explosion,
            settings.full_relativity,
        );

        if tau_trace_combined > tau_event && !settings.disable_line_scattering {
            packet.last_interaction_in_nu = packet.nu;
            packet.last_line_interaction_in_id = Some(line);
            packet.next_line_id = line;
            return Ok(finish(packet, distance_trace, InteractionType::Line, delta_shell));
        }

        distance_electron = crate::geometry::distance_electron(
            electron_density,
            tau_event - tau_line_combined,
        );
    }

    // Blueward of the whole list: only the continuum and the boundary remain
    packet.next_line_id = n_lines;
    let (distance, interaction) = continuum_event(distance_boundary, distance_electron);
    Ok(finish(packet, distance, interaction, delta_shell))
}

/// Boundary or electron event that pre-empts the line at `distance_trace`
///
/// A packet sitting exactly on a resonance (`distance_trace == 0`) cannot be
/// pre-empted. Exact ties go to the boundary, then to electron scattering.
fn competing_event(
    distance_boundary: f64,
    distance_electron: f64,
    distance_trace: f64,
) -> Option<InteractionType> {
    if distance_trace == 0.0 {
        return None;
    }
    if distance_boundary <= distance_trace && distance_boundary <= distance_electron {
        Some(InteractionType::Boundary)
    } else if distance_electron < distance_trace && distance_electron < distance_boundary {
        Some(InteractionType::ElectronScattering)
    } else {
        None
    }
}

/// Event once no lines are left; ties go to the boundary
fn continuum_event(distance_boundary: f64, distance_electron: f64) -> (f64, InteractionType) {
    if distance_electron < distance_boundary {
        (distance_electron, InteractionType::ElectronScattering)
    } else {
        (distance_boundary, InteractionType::Boundary)
    }
}

fn finish(packet: &RPacket, distance: f64, interaction: InteractionType, delta_shell: i32) -> TraceOutcome {
    trace!(
        "packet {} shell {}: {} in {:.4e} cm (next line {})",
        packet.index,
        packet.current_shell_id,
        interaction,
        distance,
        packet.next_line_id
    );
    TraceOutcome {
        distance,
        interaction,
        delta_shell,
    }
}

fn check_packet(packet: &RPacket, geometry: &ShellGeometry, opacity: &OpacityTables) -> Result<()> {
    let fail = |reason: String| Err(TransportError::precondition(packet.index, packet.current_shell_id, reason));

    if packet.status.is_terminal() {
        return fail(format!("cannot trace a packet in terminal state {:?}", packet.status));
    }
    if opacity.n_lines() == 0 {
        return fail("line list is empty".to_string());
    }
    if packet.current_shell_id >= geometry.n_shells().min(opacity.n_shells()) {
        return fail(format!("shell index outside the {} shells", geometry.n_shells()));
    }
    if !(-1.0..=1.0).contains(&packet.mu) {
        return fail(format!("mu = {} outside [-1, 1]", packet.mu));
    }
    if !(packet.r.is_finite() && packet.r > 0.0) {
        return fail(format!("radius {} is not a positive number", packet.r));
    }
    if !(packet.nu.is_finite() && packet.nu > 0.0) {
        return fail(format!("frequency {} is not a positive number", packet.nu));
    }
    if packet.next_line_id > opacity.n_lines() {
        return fail(format!(
            "next_line_id {} beyond the {} lines",
            packet.next_line_id,
            opacity.n_lines()
        ));
    }
    Ok(())
}

fn numerical(packet: &RPacket, line: usize, quantity: &'static str, value: f64) -> TransportError {
    TransportError::Numerical {
        packet: packet.index,
        shell: packet.current_shell_id,
        line,
        quantity,
        value,
    }
}

// ============================================================================
// MOVE STEP
// ============================================================================

/// Fly `packet` a lab-frame `distance` along its direction
///
/// Updates radius and direction by the law of cosines and adds the flight to
/// the shell's radiation-field estimators, using co-moving quantities at the
/// starting point. Under full relativity the estimator path length is the
/// co-moving (contracted) one. A zero distance does nothing.
pub fn move_packet(
    packet: &mut RPacket,
    distance: f64,
    time_explosion: f64,
    estimators: &mut Estimators,
    settings: &TransportSettings,
) {
    debug_assert!(distance >= 0.0, "negative move distance {distance}");
    if !(distance > 0.0) {
        return;
    }

    let doppler = doppler_factor(packet.r, packet.mu, time_explosion, settings.full_relativity);

    let r = packet.r;
    let new_r = (r * r + distance * distance + 2.0 * r * distance * packet.mu).sqrt();
    packet.mu = ((packet.mu * r + distance) / new_r).clamp(-1.0, 1.0);
    packet.r = new_r;

    let comov_nu = packet.nu * doppler;
    let comov_energy = packet.energy * doppler;
    let path = if settings.full_relativity {
        distance * doppler
    } else {
        distance
    };

    estimators.increment_radiation_field(packet.current_shell_id, path, comov_nu, comov_energy);
}

// ============================================================================
// BOUNDARY CROSSING
// ============================================================================

/// Move `packet` into the neighbouring shell or retire it
///
/// Leaving the outermost shell emits the packet, leaving the innermost one
/// reabsorbs it.
pub fn move_across_shell_boundary(packet: &mut RPacket, delta_shell: i32, n_shells: usize) {
    let next_shell = packet.current_shell_id as i64 + delta_shell as i64;

    if next_shell >= n_shells as i64 {
        packet.status = PacketStatus::Emitted;
    } else if next_shell < 0 {
        packet.status = PacketStatus::Reabsorbed;
    } else {
        packet.current_shell_id = next_shell as usize;
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{C_SPEED_OF_LIGHT, MISS_DISTANCE, SIGMA_THOMSON};
    use crate::geometry::{INWARD, OUTWARD};
    use crate::stochastic::{FixedSequence, RandomGenerator};
    use approx::assert_relative_eq;

    const T: f64 = 1e6;

    fn one_shell() -> ShellGeometry {
        ShellGeometry::new(vec![1e15], vec![1.2e15], T).unwrap()
    }

    fn three_shells() -> ShellGeometry {
        ShellGeometry::new(vec![1e15, 1.2e15, 1.4e15], vec![1.2e15, 1.4e15, 1.6e15], T).unwrap()
    }

    fn comov(packet: &RPacket) -> f64 {
        packet.nu * doppler_factor(packet.r, packet.mu, T, false)
    }

    fn packet_at(r: f64, mu: f64) -> RPacket {
        RPacket::new(0, r, mu, 1e15, 1.0, 0)
    }

    #[test]
    fn test_radial_packet_reaches_outer_edge() {
        let geometry = one_shell();
        let opacity = OpacityTables::uniform(vec![1e14], 1, 0.0, 0.0).unwrap();
        let mut est = Estimators::new(1, 1);
        let mut packet = packet_at(1.1e15, 1.0);

        let outcome = trace_packet(
            &mut packet,
            &geometry,
            &opacity,
            &mut est,
            &TransportSettings::default(),
            &mut FixedSequence::for_tau(1.0),
        )
        .unwrap();

        assert_eq!(outcome.interaction, InteractionType::Boundary);
        assert_eq!(outcome.distance, 1e14);
        assert_eq!(outcome.delta_shell, OUTWARD);
        assert_eq!(packet.next_line_id, 0);
        assert_eq!(packet.status, PacketStatus::InProcess);
        // The line that lost to the boundary is not counted
        assert!(est.is_empty());
    }

    #[test]
    fn test_no_electrons_no_lines_always_boundary() {
        let geometry = three_shells();
        let line_nu: Vec<f64> = (0..50).map(|i| 1.2e15 * (1.0 - 0.015 * i as f64)).collect();
        let opacity = OpacityTables::uniform(line_nu, 3, 1e3, 0.0).unwrap();
        let settings = TransportSettings {
            full_relativity: false,
            disable_line_scattering: true,
        };
        let mut est = Estimators::new(3, 50);
        let mut rng = RandomGenerator::new(2024);

        for i in 0..500 {
            let shell = i % 3;
            let r = rng.uniform_range(geometry.r_inner[shell], geometry.r_outer[shell]);
            let mu = rng.uniform_range(-1.0, 1.0);
            let mut packet = RPacket::new(i as u64, r, mu, rng.uniform_range(0.5e15, 1.1e15), 1.0, shell);
            packet.next_line_id = opacity.first_line_below(comov(&packet));
            let start = packet.next_line_id;

            let outcome = trace_packet(&mut packet, &geometry, &opacity, &mut est, &settings, &mut rng).unwrap();
            assert_eq!(outcome.interaction, InteractionType::Boundary, "packet {i}");
            assert!(packet.next_line_id >= start);
        }
    }

    #[test]
    fn test_huge_optical_depth_line_is_taken() {
        let geometry = one_shell();
        let mut packet = packet_at(1.1e15, 1.0);
        let nu_line = comov(&packet) * 0.999;
        let opacity = OpacityTables::uniform(vec![nu_line], 1, 1e6, 0.0).unwrap();
        let mut est = Estimators::new(1, 1);

        let outcome = trace_packet(
            &mut packet,
            &geometry,
            &opacity,
            &mut est,
            &TransportSettings::default(),
            &mut FixedSequence::for_tau(5.0),
        )
        .unwrap();

        assert_eq!(outcome.interaction, InteractionType::Line);
        assert_eq!(packet.next_line_id, 0);
        assert_eq!(packet.last_line_interaction_in_id, Some(0));
        assert_eq!(packet.last_interaction_in_nu, packet.nu);
        assert!(outcome.distance > 0.0 && outcome.distance < 1e14);
        assert!(est.edot_lu(0, 0) > 0.0);
    }

    #[test]
    fn test_line_distance_matches_redshift() {
        let geometry = one_shell();
        let mut packet = packet_at(1.1e15, 1.0);
        let c = comov(&packet);
        let opacity = OpacityTables::uniform(vec![c * 0.999, c * 0.5], 1, 1e6, 0.0).unwrap();
        let mut est = Estimators::new(1, 2);

        let outcome = trace_packet(
            &mut packet,
            &geometry,
            &opacity,
            &mut est,
            &TransportSettings::default(),
            &mut FixedSequence::for_tau(1.0),
        )
        .unwrap();

        assert_eq!(outcome.interaction, InteractionType::Line);
        let expected = (c - c * 0.999) / packet.nu * C_SPEED_OF_LIGHT * T;
        assert_relative_eq!(outcome.distance, expected, max_relative = 1e-9);
    }

    #[test]
    fn test_weak_lines_accumulate_before_interaction() {
        let geometry = one_shell();
        let mut packet = packet_at(1.1e15, 1.0);
        let c = comov(&packet);
        let line_nu = vec![c * 0.9999, c * 0.9998, c * 0.9997, c * 0.5];
        // 0.4 per line: the third line pushes past τ_event = 1
        let opacity = OpacityTables::uniform(line_nu, 1, 0.4, 0.0).unwrap();
        let mut est = Estimators::new(1, 4);

        let outcome = trace_packet(
            &mut packet,
            &geometry,
            &opacity,
            &mut est,
            &TransportSettings::default(),
            &mut FixedSequence::for_tau(1.0),
        )
        .unwrap();

        assert_eq!(outcome.interaction, InteractionType::Line);
        assert_eq!(packet.next_line_id, 2);
        assert!(est.edot_lu(0, 0) > 0.0);
        assert!(est.edot_lu(1, 0) > 0.0);
        assert!(est.edot_lu(2, 0) > 0.0);
        assert_eq!(est.edot_lu(3, 0), 0.0);
    }

    #[test]
    fn test_disabled_lines_never_interact() {
        let geometry = one_shell();
        let mut packet = packet_at(1.1e15, 1.0);
        let nu_line = comov(&packet) * 0.999;
        let opacity = OpacityTables::uniform(vec![nu_line], 1, 1e6, 0.0).unwrap();
        let settings = TransportSettings {
            full_relativity: false,
            disable_line_scattering: true,
        };
        let mut est = Estimators::new(1, 1);

        let outcome = trace_packet(
            &mut packet,
            &geometry,
            &opacity,
            &mut est,
            &settings,
            &mut FixedSequence::for_tau(0.1),
        )
        .unwrap();

        assert_eq!(outcome.interaction, InteractionType::Boundary);
        assert_eq!(packet.next_line_id, 1);
        // The line was still passed and counted
        assert!(est.edot_lu(0, 0) > 0.0);
    }

    #[test]
    fn test_electron_scattering_wins() {
        let geometry = one_shell();
        let mut packet = packet_at(1.1e15, 1.0);
        let c = comov(&packet);
        let opacity = OpacityTables::uniform(vec![c * 0.99, c * 0.5], 1, 0.0, 1e12).unwrap();
        let mut est = Estimators::new(1, 2);

        let outcome = trace_packet(
            &mut packet,
            &geometry,
            &opacity,
            &mut est,
            &TransportSettings::default(),
            &mut FixedSequence::for_tau(1.0),
        )
        .unwrap();

        assert_eq!(outcome.interaction, InteractionType::ElectronScattering);
        assert_relative_eq!(outcome.distance, distance_electron(1e12, 1.0), max_relative = 1e-12);
        assert_eq!(packet.next_line_id, 0);
        assert!(est.is_empty());
    }

    #[test]
    fn test_resonant_packet_not_preempted() {
        let geometry = one_shell();
        let mut packet = packet_at(1.1e15, 1.0);
        let c = comov(&packet);
        // Packet sits exactly on line 0; electrons would win against any real distance
        let opacity = OpacityTables::new(vec![c, c * 0.99, c * 0.5], vec![0.0; 3], vec![1e12]).unwrap();
        let mut est = Estimators::new(1, 3);

        let outcome = trace_packet(
            &mut packet,
            &geometry,
            &opacity,
            &mut est,
            &TransportSettings::default(),
            &mut FixedSequence::for_tau(1.0),
        )
        .unwrap();

        assert_eq!(outcome.interaction, InteractionType::ElectronScattering);
        assert_eq!(packet.next_line_id, 1);
        assert!(est.edot_lu(0, 0) > 0.0);
    }

    #[test]
    fn test_resonant_packet_on_boundary_passes_line_first() {
        let geometry = one_shell();
        // On the outer edge heading out: d_boundary = 0
        let mut packet = packet_at(1.2e15, 1.0);
        let c = comov(&packet);
        let opacity = OpacityTables::new(vec![c, c * 0.99], vec![0.0; 2], vec![0.0]).unwrap();
        let mut est = Estimators::new(1, 2);

        let outcome = trace_packet(
            &mut packet,
            &geometry,
            &opacity,
            &mut est,
            &TransportSettings::default(),
            &mut FixedSequence::for_tau(1.0),
        )
        .unwrap();

        assert_eq!(outcome.interaction, InteractionType::Boundary);
        assert_eq!(outcome.distance, 0.0);
        assert_eq!(packet.next_line_id, 1);
        assert!(est.edot_lu(0, 0) > 0.0);
    }

    #[test]
    fn test_exhausted_line_list() {
        let geometry = one_shell();
        let opacity = OpacityTables::uniform(vec![2e15, 1.5e15], 1, 1.0, 1e12).unwrap();
        let mut est = Estimators::new(1, 2);
        let mut packet = packet_at(1.1e15, 1.0);
        packet.next_line_id = 2;

        let outcome = trace_packet(
            &mut packet,
            &geometry,
            &opacity,
            &mut est,
            &TransportSettings::default(),
            &mut FixedSequence::for_tau(1.0),
        )
        .unwrap();
        assert_eq!(outcome.interaction, InteractionType::ElectronScattering);
        assert_eq!(packet.next_line_id, 2);

        let opacity = OpacityTables::uniform(vec![2e15, 1.5e15], 1, 1.0, 0.0).unwrap();
        let outcome = trace_packet(
            &mut packet,
            &geometry,
            &opacity,
            &mut est,
            &TransportSettings::default(),
            &mut FixedSequence::for_tau(1.0),
        )
        .unwrap();
        assert_eq!(outcome.interaction, InteractionType::Boundary);
        assert_eq!(outcome.distance, 1e14);
        assert!(est.is_empty());
    }

    #[test]
    fn test_all_lines_passed_falls_back_to_boundary() {
        let geometry = one_shell();
        let mut packet = packet_at(1.1e15, 1.0);
        let c = comov(&packet);
        let opacity = OpacityTables::uniform(vec![c * 0.9999, c * 0.9998, c * 0.9997], 1, 0.0, 0.0).unwrap();
        let mut est = Estimators::new(1, 3);

        let outcome = trace_packet(
            &mut packet,
            &geometry,
            &opacity,
            &mut est,
            &TransportSettings::default(),
            &mut FixedSequence::for_tau(1.0),
        )
        .unwrap();

        assert_eq!(outcome.interaction, InteractionType::Boundary);
        assert_eq!(packet.next_line_id, 3);
        assert!((0..3).all(|line| est.edot_lu(line, 0) > 0.0));
    }

    #[test]
    fn test_competing_event_ties() {
        // Boundary beats electron and line on exact ties
        assert_eq!(competing_event(1.0, 1.0, 1.0), Some(InteractionType::Boundary));
        assert_eq!(competing_event(1.0, 2.0, 1.0), Some(InteractionType::Boundary));
        assert_eq!(competing_event(1.0, 1.0, 2.0), Some(InteractionType::Boundary));
        // Electron must be strictly closer than both
        assert_eq!(competing_event(2.0, 1.0, 3.0), Some(InteractionType::ElectronScattering));
        assert_eq!(competing_event(2.0, 1.0, 1.0), None);
        // Line closest
        assert_eq!(competing_event(2.0, 3.0, 1.0), None);
        // Degenerate resonance is never pre-empted
        assert_eq!(competing_event(0.0, 0.0, 0.0), None);
        assert_eq!(competing_event(1.0, 0.5, 0.0), None);
    }

    #[test]
    fn test_continuum_event_ties() {
        assert_eq!(continuum_event(1.0, 1.0), (1.0, InteractionType::Boundary));
        assert_eq!(continuum_event(1.0, 0.5), (0.5, InteractionType::ElectronScattering));
        assert_eq!(continuum_event(1.0, MISS_DISTANCE), (1.0, InteractionType::Boundary));
    }

    #[test]
    fn test_line_behind_packet_is_fatal() {
        let geometry = one_shell();
        let mut packet = packet_at(1.1e15, 1.0);
        let c = comov(&packet);
        let opacity = OpacityTables::uniform(vec![c * 1.1, c * 0.5], 1, 0.0, 0.0).unwrap();
        let mut est = Estimators::new(1, 2);

        let err = trace_packet(
            &mut packet,
            &geometry,
            &opacity,
            &mut est,
            &TransportSettings::default(),
            &mut FixedSequence::for_tau(1.0),
        )
        .unwrap_err();

        assert!(matches!(err, TransportError::Numerical { line: 0, quantity: "distance_trace", .. }));
    }

    #[test]
    fn test_preconditions() {
        let geometry = one_shell();
        let opacity = OpacityTables::uniform(vec![1e14], 1, 0.0, 0.0).unwrap();
        let mut est = Estimators::new(1, 1);
        let settings = TransportSettings::default();
        let mut rng = FixedSequence::constant(0.5);

        let mut emitted = packet_at(1.1e15, 1.0);
        emitted.status = PacketStatus::Emitted;
        let err = trace_packet(&mut emitted, &geometry, &opacity, &mut est, &settings, &mut rng);
        assert!(matches!(err, Err(TransportError::Precondition { .. })));

        let mut bad_mu = packet_at(1.1e15, 1.5);
        let err = trace_packet(&mut bad_mu, &geometry, &opacity, &mut est, &settings, &mut rng);
        assert!(matches!(err, Err(TransportError::Precondition { .. })));
        assert_eq!(bad_mu.status, PacketStatus::Created);

        let mut bad_shell = packet_at(1.1e15, 0.5);
        bad_shell.current_shell_id = 4;
        let err = trace_packet(&mut bad_shell, &geometry, &opacity, &mut est, &settings, &mut rng);
        assert!(matches!(err, Err(TransportError::Precondition { shell: 4, .. })));

        assert_eq!(rng.draws(), 0);
    }

    #[test]
    fn test_empty_line_list_is_precondition() {
        let geometry = one_shell();
        let opacity = OpacityTables {
            line_nu: vec![],
            tau_sobolev: vec![],
            electron_density: vec![0.0],
        };
        let mut est = Estimators::new(1, 0);
        let mut packet = RPacket::new(17, 1.1e15, 0.5, 1e15, 1.0, 0);
        let mut rng = FixedSequence::constant(0.5);

        let err = trace_packet(&mut packet, &geometry, &opacity, &mut est, &TransportSettings::default(), &mut rng);
        assert!(matches!(err, Err(TransportError::Precondition { packet: 17, shell: 0, .. })));
    }

    #[test]
    fn test_packet_on_inner_edge_crosses_inward() {
        let geometry = three_shells();
        let opacity = OpacityTables::uniform(vec![1e14], 3, 0.0, 0.0).unwrap();
        let settings = TransportSettings::default();
        let mut est = Estimators::new(3, 1);
        let mut rng = FixedSequence::for_tau(1.0);

        // Rounding leaves the packet a few ulp below the edge it sits on
        let r_edge = geometry.r_inner[1];
        let mut packet = RPacket::new(3, r_edge * (1.0 - 1e-14), -0.9, 1e15, 1.0, 1);
        packet.last_interaction_type = Some(InteractionType::Line);

        let outcome = trace_packet(&mut packet, &geometry, &opacity, &mut est, &settings, &mut rng).unwrap();
        assert_eq!(outcome.interaction, InteractionType::Boundary);
        assert_eq!(outcome.distance, 0.0);
        assert_eq!(outcome.delta_shell, INWARD);

        move_packet(&mut packet, outcome.distance, T, &mut est, &settings);
        move_across_shell_boundary(&mut packet, outcome.delta_shell, 3);
        assert_eq!(packet.current_shell_id, 0);

        let outcome = trace_packet(&mut packet, &geometry, &opacity, &mut est, &settings, &mut rng).unwrap();
        assert_eq!(outcome.interaction, InteractionType::Boundary);
        assert_eq!(outcome.delta_shell, INWARD);
        assert!(outcome.distance > 0.0);

        for mu in [-0.4, -0.9] {
            let mut on_edge = RPacket::new(4, r_edge, mu, 1e15, 1.0, 1);
            let outcome = trace_packet(&mut on_edge, &geometry, &opacity, &mut est, &settings, &mut rng).unwrap();
            assert_eq!(outcome.delta_shell, INWARD);
            assert!(outcome.distance >= 0.0 && outcome.distance < 1.0, "mu = {mu}");
        }
    }

    #[test]
    fn test_packet_far_outside_shell_is_fatal() {
        let geometry = three_shells();
        let opacity = OpacityTables::uniform(vec![1e14], 3, 0.0, 0.0).unwrap();
        let mut est = Estimators::new(3, 1);
        let mut packet = RPacket::new(5, 0.9 * geometry.r_inner[1], -0.4, 1e15, 1.0, 1);

        let err = trace_packet(
            &mut packet,
            &geometry,
            &opacity,
            &mut est,
            &TransportSettings::default(),
            &mut FixedSequence::for_tau(1.0),
        );
        assert!(matches!(
            err,
            Err(TransportError::Numerical { packet: 5, shell: 1, quantity: "distance_boundary", .. })
        ));
    }

    #[test]
    fn test_disabled_lines_leave_electron_budget_intact() {
        let geometry = one_shell();
        let mut packet = packet_at(1.1e15, 1.0);
        let c = comov(&packet);
        // τ_e = 1 over 5e13 cm; both weak lines resonate well before that
        let electron_density = 1.0 / (SIGMA_THOMSON * 5e13);
        let opacity = OpacityTables::uniform(vec![c * 0.9999, c * 0.9998, c * 0.5], 1, 0.6, electron_density).unwrap();
        let settings = TransportSettings {
            full_relativity: false,
            disable_line_scattering: true,
        };
        let mut est = Estimators::new(1, 3);

        let outcome = trace_packet(
            &mut packet,
            &geometry,
            &opacity,
            &mut est,
            &settings,
            &mut FixedSequence::for_tau(1.0),
        )
        .unwrap();

        assert_eq!(outcome.interaction, InteractionType::ElectronScattering);
        assert_relative_eq!(outcome.distance, 5e13, max_relative = 1e-9);
        assert_eq!(packet.next_line_id, 2);
        assert!(est.edot_lu(0, 0) > 0.0);
        assert!(est.edot_lu(1, 0) > 0.0);
    }

    #[test]
    fn test_move_zero_distance_is_noop() {
        let mut packet = packet_at(1.1e15, 0.3);
        let before = packet.clone();
        let mut est = Estimators::new(1, 1);

        move_packet(&mut packet, 0.0, T, &mut est, &TransportSettings::default());

        assert_eq!(packet, before);
        assert!(est.is_empty());
    }

    #[test]
    fn test_move_radial() {
        let mut packet = packet_at(1.1e15, 1.0);
        let mut est = Estimators::new(1, 1);
        let doppler = doppler_factor(1.1e15, 1.0, T, false);

        move_packet(&mut packet, 5e13, T, &mut est, &TransportSettings::default());

        assert_relative_eq!(packet.r, 1.15e15, max_relative = 1e-14);
        assert_relative_eq!(packet.mu, 1.0, max_relative = 1e-14);
        assert!(packet.mu <= 1.0);
        assert_relative_eq!(est.j[0], doppler * 5e13, max_relative = 1e-14);
        assert_relative_eq!(est.nu_bar[0], doppler * 5e13 * 1e15 * doppler, max_relative = 1e-14);
    }

    #[test]
    fn test_move_oblique_geometry() {
        let r = 1.1e15;
        let mu: f64 = -0.4;
        let d = 3e14;
        let mut packet = packet_at(r, mu);
        let mut est = Estimators::new(1, 1);

        move_packet(&mut packet, d, T, &mut est, &TransportSettings::default());

        // Cartesian check: start at (r, 0), direction (mu, sqrt(1 - mu²))
        let sin = (1.0 - mu * mu).sqrt();
        let (x, y) = (r + d * mu, d * sin);
        let r_new = (x * x + y * y).sqrt();
        assert_relative_eq!(packet.r, r_new, max_relative = 1e-12);
        assert_relative_eq!(packet.mu, (x * mu + y * sin) / r_new, max_relative = 1e-12);
    }

    #[test]
    fn test_move_full_relativity_contracts_path() {
        let settings = TransportSettings {
            full_relativity: true,
            disable_line_scattering: false,
        };
        let mut packet = packet_at(1.1e15, 0.5);
        let mut est = Estimators::new(1, 1);
        let doppler = doppler_factor(1.1e15, 0.5, T, true);

        move_packet(&mut packet, 1e13, T, &mut est, &settings);

        assert_relative_eq!(est.j[0], doppler * doppler * 1e13, max_relative = 1e-14);
    }

    #[test]
    fn test_boundary_crossing() {
        let mut packet = packet_at(1.1e15, 1.0);
        packet.status = PacketStatus::InProcess;

        move_across_shell_boundary(&mut packet, 1, 3);
        assert_eq!(packet.current_shell_id, 1);
        assert_eq!(packet.status, PacketStatus::InProcess);

        move_across_shell_boundary(&mut packet, -1, 3);
        assert_eq!(packet.current_shell_id, 0);

        move_across_shell_boundary(&mut packet, -1, 3);
        assert_eq!(packet.status, PacketStatus::Reabsorbed);
        assert_eq!(packet.current_shell_id, 0);

        let mut outer = packet_at(1.5e15, 1.0);
        outer.status = PacketStatus::InProcess;
        outer.current_shell_id = 2;
        move_across_shell_boundary(&mut outer, 1, 3);
        assert_eq!(outer.status, PacketStatus::Emitted);
        assert_eq!(outer.current_shell_id, 2);
    }
}
