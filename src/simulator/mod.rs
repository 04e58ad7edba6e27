//! # Simulator Module
//!
//! Per-iteration driver: launches packets, runs each one to termination through
//! the transport kernel and reduces the estimators.
//!
//! ## Parallelism
//!
//! Packets are independent given the frozen model, so an iteration is a rayon
//! fold over packets into per-worker [`IterationTally`] values followed by a
//! reduction. Each packet draws from its own ChaCha stream of the run seed,
//! which makes every trajectory independent of the thread count.
//! The floating-point summation order of the reduction is unspecified.

use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::{RunConfig, TransportSettings};
use crate::error::{Result, TransportError};
use crate::estimators::Estimators;
use crate::frame::{angle_aberration_cmf_to_lf, doppler_factor, inverse_doppler_factor};
use crate::interaction::{InteractionResolver, ScatterResolver};
use crate::model::ModelSnapshot;
use crate::packet::{InteractionType, PacketStatus, RPacket};
use crate::source::{BlackBodySource, PacketSource};
use crate::stochastic::{RandomGenerator, RandomSource};
use crate::transport::{move_across_shell_boundary, move_packet, trace_packet};

// ============================================================================
// STATISTICS
// ============================================================================

/// Transport statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportStats {
    pub packets_run: usize,
    pub emitted: usize,
    pub reabsorbed: usize,
    /// Packets abandoned at the interaction cap
    pub truncated: usize,
    pub boundary_crossings: usize,
    pub electron_scatterings: usize,
    pub line_interactions: usize,
}

impl TransportStats {
    /// Add another worker's counts
    pub fn merge(&mut self, other: &TransportStats) {
        self.packets_run += other.packets_run;
        self.emitted += other.emitted;
        self.reabsorbed += other.reabsorbed;
        self.truncated += other.truncated;
        self.boundary_crossings += other.boundary_crossings;
        self.electron_scatterings += other.electron_scatterings;
        self.line_interactions += other.line_interactions;
    }

    /// Fraction of packets that escaped
    pub fn escape_fraction(&self) -> f64 {
        self.emitted as f64 / self.packets_run.max(1) as f64
    }
}

/// Final state of one packet
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PacketRecord {
    pub index: u64,
    pub status: PacketStatus,
    /// Lab-frame frequency at termination (Hz)
    pub nu: f64,
    /// Lab-frame energy at termination
    pub energy: f64,
}

/// What one worker accumulated
#[derive(Debug, Clone)]
pub struct IterationTally {
    pub estimators: Estimators,
    pub stats: TransportStats,
    pub records: Vec<PacketRecord>,
}

impl IterationTally {
    pub fn new(n_shells: usize, n_lines: usize) -> Self {
        Self {
            estimators: Estimators::new(n_shells, n_lines),
            stats: TransportStats::default(),
            records: Vec::new(),
        }
    }

    /// Combine two workers' tallies
    pub fn merge(mut self, other: IterationTally) -> Self {
        self.estimators.merge(&other.estimators);
        self.stats.merge(&other.stats);
        self.records.extend(other.records);
        self
    }
}

/// Outcome of one Monte Carlo iteration
#[derive(Debug, Clone)]
pub struct IterationResult {
    pub estimators: Estimators,
    pub stats: TransportStats,
    /// Lab frequency of every packet at termination, by packet index
    pub output_nus: Vec<f64>,
    /// Lab energy by packet index; negative for reabsorbed, zero for truncated packets
    pub output_energies: Vec<f64>,
}

impl IterationResult {
    /// Energy that left through the outer boundary
    pub fn emitted_energy(&self) -> f64 {
        self.output_energies.iter().filter(|e| **e > 0.0).sum()
    }

    /// Energy that fell back through the inner boundary
    pub fn reabsorbed_energy(&self) -> f64 {
        -self.output_energies.iter().filter(|e| **e < 0.0).sum::<f64>()
    }

    fn from_tally(tally: IterationTally, n_packets: usize) -> Self {
        let mut output_nus = vec![0.0; n_packets];
        let mut output_energies = vec![0.0; n_packets];
        for record in &tally.records {
            let i = record.index as usize;
            output_nus[i] = record.nu;
            output_energies[i] = match record.status {
                PacketStatus::Emitted => record.energy,
                PacketStatus::Reabsorbed => -record.energy,
                _ => 0.0,
            };
        }
        Self {
            estimators: tally.estimators,
            stats: tally.stats,
            output_nus,
            output_energies,
        }
    }
}

// ============================================================================
// SINGLE PACKET
// ============================================================================

/// Convert a freshly created packet to the lab frame and find its first line
///
/// The source hands out co-moving frequency, energy and direction. The packet
/// is placed in the shell containing its radius.
pub fn initialize_packet(packet: &mut RPacket, model: &ModelSnapshot, settings: &TransportSettings) -> Result<()> {
    let t = model.time_explosion();
    let full = settings.full_relativity;

    let shell = model.geometry.shell_containing(packet.r).ok_or_else(|| {
        TransportError::precondition(
            packet.index,
            packet.current_shell_id,
            format!("radius {:e} outside the ejecta", packet.r),
        )
    })?;
    packet.current_shell_id = shell;

    let inverse = inverse_doppler_factor(packet.r, packet.mu, t, full);
    packet.nu *= inverse;
    packet.energy *= inverse;
    if full {
        packet.mu = angle_aberration_cmf_to_lf(packet.r, packet.mu, t);
    }

    let comov_nu = packet.nu * doppler_factor(packet.r, packet.mu, t, full);
    packet.next_line_id = model.opacity.first_line_below(comov_nu);
    Ok(())
}

/// Run one packet through the ejecta until it is emitted, reabsorbed or
/// exceeds `max_interactions`
///
/// Returns `true` if the packet terminated.
#[allow(clippy::too_many_arguments)]
pub fn single_packet_loop(
    packet: &mut RPacket,
    model: &ModelSnapshot,
    estimators: &mut Estimators,
    stats: &mut TransportStats,
    settings: &TransportSettings,
    resolver: &dyn InteractionResolver,
    rng: &mut dyn RandomSource,
    max_interactions: usize,
) -> Result<bool> {
    let t = model.time_explosion();
    let n_shells = model.n_shells();
    let mut interactions = 0;

    while packet.is_alive() {
        if interactions >= max_interactions {
            warn!(
                "packet {} abandoned after {} interactions in shell {}",
                packet.index, interactions, packet.current_shell_id
            );
            stats.truncated += 1;
            return Ok(false);
        }

        let outcome = trace_packet(packet, &model.geometry, &model.opacity, estimators, settings, rng)?;
        move_packet(packet, outcome.distance, t, estimators, settings);

        match outcome.interaction {
            InteractionType::Boundary => {
                move_across_shell_boundary(packet, outcome.delta_shell, n_shells);
                stats.boundary_crossings += 1;
            }
            InteractionType::ElectronScattering => {
                packet.last_interaction_type = Some(InteractionType::ElectronScattering);
                resolver.electron_scatter(packet, t, settings, rng)?;
                stats.electron_scatterings += 1;
                interactions += 1;
            }
            InteractionType::Line => {
                packet.last_interaction_type = Some(InteractionType::Line);
                resolver.line_interaction(packet, t, &model.opacity, settings, rng)?;
                stats.line_interactions += 1;
                interactions += 1;
            }
        }
    }

    match packet.status {
        PacketStatus::Emitted => stats.emitted += 1,
        PacketStatus::Reabsorbed => stats.reabsorbed += 1,
        _ => {}
    }
    Ok(true)
}

// ============================================================================
// ITERATION DRIVER
// ============================================================================

/// Monte Carlo packet transport for one frozen model
pub struct MonteCarloRunner<'a> {
    model: &'a ModelSnapshot,
    config: RunConfig,
    resolver: Box<dyn InteractionResolver + 'a>,
}

impl<'a> MonteCarloRunner<'a> {
    /// Runner with the resolver matching `config.line_interaction`
    pub fn new(model: &'a ModelSnapshot, config: RunConfig) -> Result<Self> {
        let resolver = ScatterResolver::for_mode(config.line_interaction)?;
        Self::with_resolver(model, config, Box::new(resolver))
    }

    /// Runner with a caller-supplied interaction resolver
    pub fn with_resolver(
        model: &'a ModelSnapshot,
        config: RunConfig,
        resolver: Box<dyn InteractionResolver + 'a>,
    ) -> Result<Self> {
        config.validate()?;
        model.validate()?;
        Ok(Self {
            model,
            config,
            resolver,
        })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Launch `n_packets` blackbody packets from the inner boundary and transport them
    pub fn run(&self) -> Result<IterationResult> {
        let source = BlackBodySource::new(self.model.geometry.r_inner[0], self.config.t_inner);
        let packets = source.create_packets(self.config.n_packets, self.config.seed);
        self.run_iteration(packets)
    }

    /// Transport the given packets to termination
    ///
    /// Packet indices must be `0..packets.len()`.
    pub fn run_iteration(&self, packets: Vec<RPacket>) -> Result<IterationResult> {
        let n_packets = packets.len();
        if let Some(p) = packets.iter().find(|p| p.index as usize >= n_packets) {
            return Err(TransportError::config(format!(
                "packet index {} outside 0..{}",
                p.index, n_packets
            )));
        }

        info!(
            "transporting {} packets through {} shells and {} lines",
            n_packets,
            self.model.n_shells(),
            self.model.n_lines()
        );
        let start = std::time::Instant::now();

        let tally = if self.config.n_threads > 0 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.n_threads)
                .build()
                .map_err(|e| TransportError::config(format!("thread pool: {e}")))?;
            pool.install(|| self.transport_all(packets))?
        } else {
            self.transport_all(packets)?
        };

        let result = IterationResult::from_tally(tally, n_packets);
        info!(
            "iteration done in {:.3} s: {} emitted, {} reabsorbed, {} truncated",
            start.elapsed().as_secs_f64(),
            result.stats.emitted,
            result.stats.reabsorbed,
            result.stats.truncated
        );
        Ok(result)
    }

    fn transport_all(&self, packets: Vec<RPacket>) -> Result<IterationTally> {
        let (n_shells, n_lines) = (self.model.n_shells(), self.model.n_lines());

        packets
            .into_par_iter()
            .try_fold(
                || IterationTally::new(n_shells, n_lines),
                |mut tally, mut packet| {
                    self.transport_one(&mut packet, &mut tally)?;
                    Ok::<_, TransportError>(tally)
                },
            )
            .try_reduce(
                || IterationTally::new(n_shells, n_lines),
                |a, b| Ok(a.merge(b)),
            )
    }

    fn transport_one(&self, packet: &mut RPacket, tally: &mut IterationTally) -> Result<()> {
        let settings = &self.config.settings;
        let mut rng = RandomGenerator::for_packet(self.config.seed, packet.index);

        initialize_packet(packet, self.model, settings)?;
        single_packet_loop(
            packet,
            self.model,
            &mut tally.estimators,
            &mut tally.stats,
            settings,
            self.resolver.as_ref(),
            &mut rng,
            self.config.max_interactions,
        )?;

        tally.stats.packets_run += 1;
        tally.records.push(PacketRecord {
            index: packet.index,
            status: packet.status,
            nu: packet.nu,
            energy: packet.energy,
        });
        debug!("packet {} finished as {:?}", packet.index, packet.status);
        Ok(())
    }
}

/// Human-readable iteration report
pub fn summary(result: &IterationResult) -> String {
    let stats = &result.stats;
    let mut s = String::new();
    s.push_str("=== Monte Carlo Transport Summary ===\n");
    s.push_str(&format!("Packets run: {}\n", stats.packets_run));
    s.push_str(&format!("Emitted: {} ({:.2}%)\n", stats.emitted, stats.escape_fraction() * 100.0));
    s.push_str(&format!("Reabsorbed: {}\n", stats.reabsorbed));
    s.push_str(&format!("Truncated: {}\n", stats.truncated));
    s.push_str(&format!("Boundary crossings: {}\n", stats.boundary_crossings));
    s.push_str(&format!("Electron scatterings: {}\n", stats.electron_scatterings));
    s.push_str(&format!("Line interactions: {}\n", stats.line_interactions));
    s.push_str(&format!("Emitted energy: {:.4e}\n", result.emitted_energy()));
    s.push_str(&format!("Reabsorbed energy: {:.4e}\n", result.reabsorbed_energy()));
    s
}

// ============================================================================
// TESTS
// ============================================================================
