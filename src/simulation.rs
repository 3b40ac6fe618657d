use indicatif::{ProgressBar, ProgressStyle};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use crate::{
    dalg_framework::{
        sim_status::{RunControl, RunOutcome, SimStatus},
        simulation_error::escalate_guard_error,
    },
    dalg_objects::{
        data_petri_net::DataPetriNet,
        event_log::EventLog,
        simulation_configuration::{SimulationConfiguration, SimulationStrategy},
    },
    techniques::{
        exhaustive_exploration::generate_exploration_logs,
        full_exploration::generate_full_exploration_logs, random_generation::generate_random_logs,
    },
};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub logs: Vec<EventLog>,
    pub outcome: RunOutcome,
    /// why the run failed; the logs generated before the failure are kept
    pub error: Option<String>,
    pub status: SimStatus,
}

impl SimulationResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

pub struct Simulation;

impl Simulation {
    /**
     * Runs the simulation on the calling thread.
     */
    pub fn run_blocking(net: &DataPetriNet, config: &SimulationConfiguration) -> SimulationResult {
        Self::run(net, config, RunControl::detached())
    }

    /**
     * Runs the simulation on a worker thread of its own.
     */
    pub fn start(net: DataPetriNet, config: SimulationConfiguration) -> SimulationHandle {
        let stop = Arc::new(AtomicBool::new(false));
        let (sender, receiver) = mpsc::channel();
        let control = RunControl::new(stop.clone(), Some(sender));
        let expected_traces = config.number_of_logs.saturating_mul(config.number_of_traces);
        let traces_per_log = config.number_of_traces;
        let worker = thread::spawn(move || Self::run(&net, &config, control));
        SimulationHandle {
            stop,
            receiver,
            status: SimStatus::default(),
            worker,
            expected_traces,
            traces_per_log,
        }
    }

    fn run(
        net: &DataPetriNet,
        config: &SimulationConfiguration,
        mut control: RunControl,
    ) -> SimulationResult {
        log::info!(
            "start simulating `{}` with strategy {} and seed {}",
            net.get_name(),
            config.strategy,
            config.seed
        );
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let mut logs = vec![];

        let result = match config.strategy {
            SimulationStrategy::Random => {
                generate_random_logs(net, config, &mut control, &mut rng, &mut logs)
            }
            SimulationStrategy::RandomExploration => {
                generate_exploration_logs(net, config, &mut control, &mut rng, &mut logs)
            }
            SimulationStrategy::FullExploration => {
                generate_full_exploration_logs(net, config, &mut control, &mut rng, &mut logs)
            }
        }
        .map_err(escalate_guard_error);

        let (outcome, error) = match result {
            Ok(outcome) => (outcome, None),
            Err(error) => {
                log::error!("simulation failed: {:#}", error);
                (RunOutcome::Failed, Some(format!("{:#}", error)))
            }
        };
        let number_of_logs = logs.len();
        control.report(|status| {
            status.number_of_logs = number_of_logs;
            status.estimation_running = false;
            status.ended = true;
        });
        log::info!(
            "simulation ended ({:?}) with {} logs and {} traces",
            outcome,
            logs.len(),
            logs.iter().map(|log| log.len()).sum::<usize>()
        );

        SimulationResult {
            logs,
            outcome,
            error,
            status: *control.get_status(),
        }
    }
}

/// A simulation running on its worker thread.
pub struct SimulationHandle {
    stop: Arc<AtomicBool>,
    receiver: Receiver<SimStatus>,
    status: SimStatus,
    worker: JoinHandle<SimulationResult>,
    expected_traces: usize,
    traces_per_log: usize,
}

impl SimulationHandle {
    /**
     * The latest status the worker sent.
     */
    pub fn status(&mut self) -> SimStatus {
        if let Some(status) = self.receiver.try_iter().last() {
            self.status = status;
        }
        self.status
    }

    /**
     * Asks the worker to stop at the next trace or branch; it keeps what it generated so far.
     */
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    /**
     * Polls the worker until it ends, showing a progress bar of the generated traces.
     */
    pub fn wait_with_progress(&mut self, poll_interval: Duration) -> SimStatus {
        let progress_bar = ProgressBar::new(self.expected_traces as u64);
        if let Ok(style) = ProgressStyle::with_template("[{wide_bar:.cyan/blue}] {pos:>7}/{len:7}")
        {
            progress_bar.set_style(style.progress_chars("#>-"));
        }
        progress_bar.set_position(0);

        loop {
            let finished = self.is_finished();
            let status = self.status();
            let position = status
                .number_of_logs
                .saturating_mul(self.traces_per_log)
                .saturating_add(status.number_of_traces);
            progress_bar.set_position(position as u64);
            if finished || status.ended {
                break;
            }
            thread::sleep(poll_interval);
        }
        progress_bar.finish();
        self.status()
    }

    /**
     * Waits for the worker and returns what it generated.
     */
    pub fn join(self) -> SimulationResult {
        let status = self.status;
        match self.worker.join() {
            Ok(result) => result,
            Err(_) => {
                log::error!("the simulation worker panicked");
                SimulationResult {
                    logs: vec![],
                    outcome: RunOutcome::Failed,
                    error: Some("the simulation worker panicked".to_string()),
                    status,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use ntest::timeout;

    use crate::{
        dalg_framework::sim_status::RunOutcome,
        dalg_objects::simulation_configuration::SimulationStrategy,
        test_nets::{
            configuration, dead_net, guarded_choice_net, init_logging, loop_net, two_path_net,
        },
    };

    use super::{DEFAULT_POLL_INTERVAL, Simulation};

    #[test]
    #[timeout(20000)]
    fn worker_thread() {
        init_logging();
        let mut config = configuration();
        config.number_of_logs = 2;
        config.number_of_traces = 5;
        config.max_trace_duplicates = 10;
        let mut handle = Simulation::start(guarded_choice_net(), config);
        let status = handle.wait_with_progress(DEFAULT_POLL_INTERVAL);
        assert!(status.ended);
        let result = handle.join();
        assert!(result.is_success());
        assert_eq!(result.outcome, RunOutcome::Completed);
        assert_eq!(result.logs.len(), 2);
        assert!(result.logs.iter().all(|log| log.len() == 5));
        assert_eq!(result.status.number_of_logs, 2);
    }

    #[test]
    #[timeout(20000)]
    fn stopping() {
        let mut config = configuration();
        config.number_of_traces = 1_000_000;
        config.max_trace_duplicates = usize::MAX;
        let handle = Simulation::start(loop_net(), config);
        handle.stop();
        let result = handle.join();
        assert_eq!(result.outcome, RunOutcome::Cancelled);
        assert!(result.is_success());
        assert!(result.logs.iter().all(|log| log.len() < 1_000_000));
    }

    #[test]
    #[timeout(20000)]
    fn all_strategies() {
        init_logging();
        for strategy in [
            SimulationStrategy::Random,
            SimulationStrategy::RandomExploration,
            SimulationStrategy::FullExploration,
        ] {
            let mut config = configuration();
            config.strategy = strategy;
            config.number_of_traces = 2;
            config.max_trace_duplicates = 0;
            let result = Simulation::run_blocking(&two_path_net(), &config);
            assert!(result.is_success(), "{:?}", result.error);
            assert_eq!(result.logs[0].len(), 2);
        }
    }

    #[test]
    #[timeout(20000)]
    fn same_seed_same_logs() {
        let mut config = configuration();
        config.number_of_traces = 10;
        config.max_trace_duplicates = 10;
        let net = guarded_choice_net();
        let first = Simulation::run_blocking(&net, &config);
        let second = Simulation::run_blocking(&net, &config);
        assert_eq!(first.logs, second.logs);
        assert!(serde_json::to_string(&first).is_ok());
    }

    #[test]
    #[timeout(20000)]
    fn failures_are_reported() {
        let mut config = configuration();
        config.strategy = SimulationStrategy::RandomExploration;
        config.min_trace_length = 5;
        let result = Simulation::run_blocking(&dead_net(), &config);
        assert_eq!(result.outcome, RunOutcome::Failed);
        assert!(result.error.unwrap().contains("minimum trace length"));
        assert!(result.logs.is_empty());
        assert!(result.status.ended);
    }
}
