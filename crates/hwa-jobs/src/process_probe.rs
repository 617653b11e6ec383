//! Liveness probing and signal delivery for tracked pids.
//!
//! The pid namespace is shared and reused by the OS, so a probe only answers
//! "does some process with this id exist right now". Callers that need more
//! than that must not assume the process is still the one they spawned.

use anyhow::Result;

/// Result of a non-destructive liveness probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The process exists and the caller may signal it.
    Alive,
    /// The process exists but belongs to someone the caller cannot signal.
    AliveNotPermitted,
    /// No process with this id exists.
    Gone,
}

impl ProbeOutcome {
    pub fn is_alive(self) -> bool {
        !matches!(self, Self::Gone)
    }
}

/// Signals the executor sends to tracked processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationSignal {
    Terminate,
    Kill,
}

/// Whether a signal targets one process or the process group it leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalScope {
    Process,
    Group,
}

/// Result of delivering a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOutcome {
    Delivered,
    NotFound,
    PermissionDenied,
}

/// Reports whether a pid currently names a live process.
pub trait ProcessProbe: Send + Sync {
    fn probe(&self, pid: u32) -> ProbeOutcome;

    /// Permission-denied probes count as alive: the process exists even though
    /// the caller cannot signal it.
    fn is_alive(&self, pid: u32) -> bool {
        self.probe(pid).is_alive()
    }
}

/// Probe plus signal delivery; the executor's view of the host.
pub trait ProcessControl: ProcessProbe {
    fn signal(
        &self,
        pid: u32,
        signal: TerminationSignal,
        scope: SignalScope,
    ) -> Result<SignalOutcome>;
}

/// Host implementation backed by `kill(2)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcessControl;

/// Pid 0 and ids beyond `i32::MAX` would address the caller's own group or
/// every process once negated or truncated, so they never reach `kill(2)`.
#[cfg_attr(not(unix), allow(dead_code))]
fn signalable_pid(pid: u32) -> Option<i32> {
    i32::try_from(pid).ok().filter(|value| *value > 0)
}

#[cfg(unix)]
mod host {
    use anyhow::{anyhow, Result};

    use super::{
        signalable_pid, ProbeOutcome, ProcessControl, ProcessProbe, SignalOutcome, SignalScope,
        SystemProcessControl, TerminationSignal,
    };

    fn send_signal(target: i32, signal: i32) -> std::result::Result<(), std::io::Error> {
        // SAFETY: kill(2) has no memory-safety preconditions; `target` is never 0 or -1.
        let result = unsafe { libc::kill(target, signal) };
        if result == 0 {
            Ok(())
        } else {
            Err(std::io::Error::last_os_error())
        }
    }

    impl ProcessProbe for SystemProcessControl {
        fn probe(&self, pid: u32) -> ProbeOutcome {
            let Some(target) = signalable_pid(pid) else {
                return ProbeOutcome::Gone;
            };
            match send_signal(target, 0) {
                Ok(()) => ProbeOutcome::Alive,
                Err(error) => match error.raw_os_error() {
                    Some(libc::EPERM) => ProbeOutcome::AliveNotPermitted,
                    Some(libc::ESRCH) => ProbeOutcome::Gone,
                    _ => {
                        tracing::warn!(pid, %error, "unexpected liveness probe failure");
                        ProbeOutcome::AliveNotPermitted
                    }
                },
            }
        }
    }

    impl ProcessControl for SystemProcessControl {
        fn signal(
            &self,
            pid: u32,
            signal: TerminationSignal,
            scope: SignalScope,
        ) -> Result<SignalOutcome> {
            let Some(target) = signalable_pid(pid) else {
                return Ok(SignalOutcome::NotFound);
            };
            let target = match scope {
                SignalScope::Process => target,
                SignalScope::Group => -target,
            };
            let signo = match signal {
                TerminationSignal::Terminate => libc::SIGTERM,
                TerminationSignal::Kill => libc::SIGKILL,
            };
            match send_signal(target, signo) {
                Ok(()) => Ok(SignalOutcome::Delivered),
                Err(error) => match error.raw_os_error() {
                    Some(libc::ESRCH) => Ok(SignalOutcome::NotFound),
                    Some(libc::EPERM) => Ok(SignalOutcome::PermissionDenied),
                    _ => Err(anyhow!("failed to signal pid {pid}: {error}")),
                },
            }
        }
    }
}

#[cfg(not(unix))]
mod host {
    use anyhow::{bail, Result};

    use super::{
        ProbeOutcome, ProcessControl, ProcessProbe, SignalOutcome, SignalScope,
        SystemProcessControl, TerminationSignal,
    };

    impl ProcessProbe for SystemProcessControl {
        fn probe(&self, _pid: u32) -> ProbeOutcome {
            ProbeOutcome::AliveNotPermitted
        }
    }

    impl ProcessControl for SystemProcessControl {
        fn signal(
            &self,
            pid: u32,
            _signal: TerminationSignal,
            _scope: SignalScope,
        ) -> Result<SignalOutcome> {
            bail!("signalling pid {pid} is not supported on this platform")
        }
    }
}
