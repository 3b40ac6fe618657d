use serde::{Deserialize, Serialize};
use std::{
    fmt::{self, Display},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc::Sender,
    },
};

/// A snapshot of the progress of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimStatus {
    pub number_of_logs: usize,
    /// traces in the log that is currently being generated
    pub number_of_traces: usize,
    /// traces the exploration found possible; None if not estimated
    pub estimated_traces: Option<usize>,
    pub estimation_running: bool,
    pub ended: bool,
}

impl Display for SimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} logs, {} traces in the current log",
            self.number_of_logs, self.number_of_traces
        )?;
        if let Some(estimated) = self.estimated_traces {
            write!(f, ", {} traces possible", estimated)?;
        }
        if self.estimation_running {
            write!(f, ", estimating")?;
        }
        if self.ended {
            write!(f, ", ended")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunOutcome {
    Completed,
    Cancelled,
    /// see the error of the result
    Failed,
}

/**
 * What a strategy uses to talk to whoever started the run: the stop flag it polls and the
 * channel it reports its status on.
 */
#[derive(Debug, Clone)]
pub struct RunControl {
    stop: Arc<AtomicBool>,
    sender: Option<Sender<SimStatus>>,
    status: SimStatus,
}

impl RunControl {
    pub fn new(stop: Arc<AtomicBool>, sender: Option<Sender<SimStatus>>) -> Self {
        Self {
            stop,
            sender,
            status: SimStatus::default(),
        }
    }

    /**
     * A control that is never stopped and reports to nobody.
     */
    pub fn detached() -> Self {
        Self::new(Arc::new(AtomicBool::new(false)), None)
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    pub fn get_status(&self) -> &SimStatus {
        &self.status
    }

    /**
     * Changes the status and sends a snapshot of it. A receiver that went away is not an error:
     * the run goes on and its result is collected through the join.
     */
    pub fn report(&mut self, update: impl FnOnce(&mut SimStatus)) {
        update(&mut self.status);
        if let Some(sender) = &self.sender {
            if sender.send(self.status).is_err() {
                self.sender = None;
            }
        }
    }
}
