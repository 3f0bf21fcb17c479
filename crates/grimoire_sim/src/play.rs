// SPDX-License-Identifier: MIT OR Apache-2.0
//! Fixed-timestep simulation of a predicting client and an authoritative server.
//!
//! Each step:
//! - issues client casts that are due
//! - forwards requests and results over the links
//! - ticks both casters and both worlds

use crate::session::{ScheduledCast, Session, SessionError};
use crate::transport::{Link, LinkError, Message};
use grimoire_caster::{Authority, CastResult, CasterEvent, CasterState};
use grimoire_graph::host::{Sandbox, SandboxActor};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::VecDeque;

/// Maximum fixed steps run for one frame
const MAX_STEPS_PER_FRAME: u32 = 8;

/// What happened during a simulation
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    /// Session name
    pub session: String,
    /// Fixed steps run
    pub ticks: u64,
    /// Simulated seconds
    pub elapsed: f64,
    /// Casts issued by the client
    pub casts_issued: usize,
    /// Client mana at the end
    pub client_mana: f32,
    /// Server mana at the end
    pub server_mana: f32,
    /// Predictions still waiting for a result
    pub outstanding_predictions: usize,
    /// Results the client received, in order
    pub results: Vec<CastResult>,
    /// Damage dealt in the server world, per actor
    pub server_damage: IndexMap<String, f32>,
    /// Encoded bytes sent to the server
    pub bytes_up: usize,
    /// Encoded bytes sent back
    pub bytes_down: usize,
    /// Messages delivered over both links
    pub messages_delivered: u64,
    /// Messages still in flight when the run ended
    pub messages_in_flight: usize,
    /// Client notifications
    pub client_events: Vec<CasterEvent>,
    /// Server notifications
    pub server_events: Vec<CasterEvent>,
}

/// Client and server running side by side
pub struct Simulation {
    name: String,
    client: CasterState,
    server: CasterState,
    client_world: Sandbox,
    server_world: Sandbox,
    uplink: Link,
    downlink: Link,
    casts: VecDeque<ScheduledCast>,
    fixed_timestep: f64,
    accumulated_time: f64,
    clock: f64,
    ticks: u64,
    casts_issued: usize,
    results: Vec<CastResult>,
    client_events: Vec<CasterEvent>,
    server_events: Vec<CasterEvent>,
}

fn world(session: &Session) -> Sandbox {
    let mut world = Sandbox::new();
    for actor in &session.actors {
        world.spawn(actor.id, SandboxActor::new(actor.location, actor.max_health));
    }
    world
}

impl Simulation {
    /// Build both sides from a session
    pub fn new(session: &Session) -> Result<Self, SessionError> {
        let mut client = CasterState::new(
            session.caster,
            &session.config_with_mana(session.client_mana),
            Authority::Predicting,
        );
        let mut server = CasterState::new(
            session.caster,
            &session.config_with_mana(session.server_mana),
            Authority::Authoritative,
        );
        for spec in &session.spells {
            client.insert_spell(spec.build()?);
            server.insert_spell(spec.build()?);
        }

        let latency = f64::from(session.latency);
        Ok(Self {
            name: session.name.clone(),
            client,
            server,
            client_world: world(session),
            server_world: world(session),
            uplink: Link::new("uplink", latency),
            downlink: Link::new("downlink", latency),
            casts: session.casts.iter().cloned().collect(),
            fixed_timestep: 1.0 / f64::from(session.tick_rate),
            accumulated_time: 0.0,
            clock: 0.0,
            ticks: 0,
            casts_issued: 0,
            results: Vec::new(),
            client_events: Vec::new(),
            server_events: Vec::new(),
        })
    }

    /// Simulated seconds so far
    pub fn elapsed(&self) -> f64 {
        self.clock
    }

    /// Feed one frame of wall time; returns the fixed steps run
    pub fn update(&mut self, delta_time: f64) -> Result<u32, LinkError> {
        self.accumulated_time += delta_time.max(0.0);

        let mut steps = 0;
        while self.accumulated_time >= self.fixed_timestep {
            self.accumulated_time -= self.fixed_timestep;
            self.step()?;
            steps += 1;

            if steps >= MAX_STEPS_PER_FRAME {
                tracing::warn!("Simulation fell behind, dropping accumulated time");
                self.accumulated_time = 0.0;
                break;
            }
        }
        Ok(steps)
    }

    /// Run fixed steps until `duration` seconds have been simulated
    pub fn run_for(&mut self, duration: f64) -> Result<(), LinkError> {
        while self.clock + self.fixed_timestep * 0.5 < duration {
            self.step()?;
        }
        Ok(())
    }

    /// Run one fixed step
    pub fn step(&mut self) -> Result<(), LinkError> {
        let now = self.clock;

        while self
            .casts
            .front()
            .is_some_and(|cast| f64::from(cast.at) <= now)
        {
            let Some(cast) = self.casts.pop_front() else {
                break;
            };
            self.casts_issued += 1;
            match self.client.execute_spell(&mut self.client_world, cast.request) {
                Ok(outcome) => tracing::info!(
                    "[{:.2}s] client predicted '{}' ({:.1} mana)",
                    now,
                    outcome.spell,
                    outcome.mana_spent
                ),
                Err(err) => tracing::info!("[{:.2}s] client could not predict: {}", now, err),
            }
        }

        for request in self.client.drain_outbox() {
            self.uplink.send(now, &Message::Cast(request))?;
        }

        for message in self.uplink.receive(now)? {
            let Message::Cast(request) = message else {
                tracing::warn!("Server ignored unexpected message on uplink");
                continue;
            };
            let spell = request.spell.clone();
            let cost = self.server.spell_cost(&spell).unwrap_or(0.0);
            let success = match self.server.execute_spell(&mut self.server_world, request) {
                Ok(_) => true,
                Err(err) => {
                    tracing::info!("[{:.2}s] server refused '{}': {}", now, spell, err);
                    false
                }
            };
            let result = CastResult {
                spell,
                success,
                actual_mana_cost: cost,
            };
            self.downlink.send(now, &Message::Result(result))?;
        }

        for message in self.downlink.receive(now)? {
            let Message::Result(result) = message else {
                tracing::warn!("Client ignored unexpected message on downlink");
                continue;
            };
            self.client.apply_cast_result(&result);
            self.results.push(result);
        }

        let dt = self.fixed_timestep as f32;
        self.client.advance(dt, &mut self.client_world);
        self.server.advance(dt, &mut self.server_world);
        self.client_world.advance(dt);
        self.server_world.advance(dt);

        self.client_events.extend(self.client.drain_events());
        self.server_events.extend(self.server.drain_events());

        self.clock += self.fixed_timestep;
        self.ticks += 1;
        Ok(())
    }

    /// Summarize the run
    pub fn report(&self) -> SimulationReport {
        let server_damage = self
            .server_world
            .actors()
            .map(|(id, _)| (id.to_string(), self.server_world.damage_dealt_to(*id)))
            .filter(|(_, damage)| *damage > 0.0)
            .collect();

        SimulationReport {
            session: self.name.clone(),
            ticks: self.ticks,
            elapsed: self.clock,
            casts_issued: self.casts_issued,
            client_mana: self.client.current_mana(),
            server_mana: self.server.current_mana(),
            outstanding_predictions: self.client.predictions().len(),
            results: self.results.clone(),
            server_damage,
            bytes_up: self.uplink.bytes_sent(),
            bytes_down: self.downlink.bytes_sent(),
            messages_delivered: self.uplink.delivered() + self.downlink.delivered(),
            messages_in_flight: self.uplink.in_flight() + self.downlink.in_flight(),
            client_events: self.client_events.clone(),
            server_events: self.server_events.clone(),
        }
    }
}
