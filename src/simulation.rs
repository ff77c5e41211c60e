//! Simulation: owns the network and traffic manager behind a single mutex,
//! runs ticks on a dedicated worker thread with wall-clock pacing, and emits
//! the `stepped()` signal once per tick. Grounded in the teacher's
//! `simple::simulation::Simulator::simulation_loop`, which paces itself
//! against `SystemTime`/`thread::sleep` the same way.

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::network::Network;
use crate::randomizer::Lcg;
use crate::signal::Signal;
use crate::traffic_manager::TrafficManager;

#[derive(Debug, Clone, Copy)]
pub struct SimulationConfig {
    pub ticks_per_second: f64,
    /// Multiplier applied to wall-clock pacing; 1.0 is real time, higher
    /// values run faster than real time (and 0.0 disables pacing entirely,
    /// running as fast as the CPU allows).
    pub speed: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            ticks_per_second: 15.0,
            speed: 1.0,
        }
    }
}

struct SimulationState {
    network: Network,
    traffic_manager: TrafficManager,
    rng: Lcg,
    now: f64,
}

/// The simulation kernel. Cloning shares the same underlying state (the
/// mutex is behind an `Arc`), matching the "mutex held during tick, released
/// during observer emission" concurrency model.
#[derive(Clone)]
pub struct Simulation {
    state: Arc<Mutex<SimulationState>>,
    config: SimulationConfig,
    pub stepped: Arc<Mutex<Signal<f64>>>,
    running: Arc<std::sync::atomic::AtomicBool>,
    worker: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Simulation {
    pub fn new(network: Network, traffic_manager: TrafficManager, config: SimulationConfig, seed: u64) -> Self {
        Simulation {
            state: Arc::new(Mutex::new(SimulationState {
                network,
                traffic_manager,
                rng: Lcg::new(seed),
                now: 0.0,
            })),
            config,
            stepped: Arc::new(Mutex::new(Signal::new())),
            running: Arc::new(std::sync::atomic::AtomicBool::new(false)),
            worker: Arc::new(Mutex::new(None)),
        }
    }

    /// Advances the simulation by exactly one tick, holding the state mutex
    /// for the duration of `prepare`/`think`/`move`, then releasing it before
    /// emitting `stepped()` so observers may themselves call back into the
    /// simulation without deadlocking.
    pub fn step(&self) {
        let dt = 1.0 / self.config.ticks_per_second;
        let now = {
            let mut state = self.state.lock().expect("simulation mutex poisoned");
            state.now += dt;
            let SimulationState { network, traffic_manager, rng, now } = &mut *state;
            traffic_manager.tick(network, rng, *now, dt);
            *now
        };
        self.stepped.lock().expect("signal mutex poisoned").emit(&now);
    }

    pub fn vehicle_count(&self) -> usize {
        self.state.lock().expect("simulation mutex poisoned").traffic_manager.vehicle_count()
    }

    pub fn now(&self) -> f64 {
        self.state.lock().expect("simulation mutex poisoned").now
    }

    pub fn with_network<R>(&self, f: impl FnOnce(&Network) -> R) -> R {
        f(&self.state.lock().expect("simulation mutex poisoned").network)
    }

    pub fn with_network_mut<R>(&self, f: impl FnOnce(&mut Network) -> R) -> R {
        f(&mut self.state.lock().expect("simulation mutex poisoned").network)
    }

    pub fn with_traffic_manager_mut<R>(&self, f: impl FnOnce(&mut TrafficManager) -> R) -> R {
        f(&mut self.state.lock().expect("simulation mutex poisoned").traffic_manager)
    }

    /// Spawns the dedicated kernel worker thread, which calls `step()` in a
    /// loop, sleeping at the end of each tick to pace itself against wall
    /// clock time scaled by `config.speed`, until `duration` of wall-clock
    /// time has elapsed or `stop()` is called -- whichever comes first. The
    /// handle is kept internally so `stop()` can join it rather than merely
    /// signalling the thread to exit.
    pub fn start(&self, duration: Duration) {
        self.running.store(true, std::sync::atomic::Ordering::SeqCst);
        let sim = self.clone();
        let handle = thread::spawn(move || {
            let run_start = Instant::now();
            let tick_duration = Duration::from_secs_f64(1.0 / sim.config.ticks_per_second);
            while sim.running.load(std::sync::atomic::Ordering::SeqCst) && run_start.elapsed() < duration {
                let tick_start = Instant::now();
                sim.step();
                if sim.config.speed > 0.0 {
                    let paced = Duration::from_secs_f64(tick_duration.as_secs_f64() / sim.config.speed);
                    let elapsed = tick_start.elapsed();
                    if elapsed < paced {
                        thread::sleep(paced - elapsed);
                    }
                }
            }
            sim.running.store(false, std::sync::atomic::Ordering::SeqCst);
        });
        *self.worker.lock().expect("simulation mutex poisoned") = Some(handle);
    }

    /// Runs the background worker with no deadline -- equivalent to
    /// `start(Duration::MAX)`, for callers that only ever stop it explicitly.
    pub fn run_in_background(&self) {
        self.start(Duration::MAX);
    }

    /// Signals the worker thread to stop and blocks until it has actually
    /// exited, so that by the time this returns no further ticks can occur.
    pub fn stop(&self) {
        self.running.store(false, std::sync::atomic::Ordering::SeqCst);
        let handle = self.worker.lock().expect("simulation mutex poisoned").take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}
