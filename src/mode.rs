use std::fmt;

use crate::error::BootstrapError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Provision,
    Destroy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Execution {
    /// Probes run against the real account; mutations are only described.
    Simulate,
    Execute,
}

/// The single mode of a run, fixed once the arguments are parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunMode {
    pub direction: Direction,
    pub execution: Execution,
    /// `--yes` was given.
    pub pre_confirmed: bool,
}

impl RunMode {
    pub fn is_simulation(&self) -> bool {
        self.execution == Execution::Simulate
    }

    /// Only real runs ask; a dry run never mutates anything.
    pub fn requires_confirmation(&self) -> bool {
        self.execution == Execution::Execute && !self.pre_confirmed
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let direction = match self.direction {
            Direction::Provision => "provision",
            Direction::Destroy => "destroy",
        };
        match self.execution {
            Execution::Simulate => write!(f, "{} (dry-run)", direction),
            Execution::Execute => write!(f, "{}", direction),
        }
    }
}

/// The mode-relevant flags as given on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModeFlags {
    pub provision: bool,
    pub destroy: bool,
    pub dry_run: bool,
    pub yes: bool,
    pub usage: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invocation {
    /// Print short usage and do nothing.
    Usage,
    Run(RunMode),
}

impl Invocation {
    pub fn from_flags(flags: ModeFlags) -> Result<Self, BootstrapError> {
        if flags.usage {
            return Ok(Invocation::Usage);
        }

        let direction = match (flags.provision, flags.destroy, flags.dry_run) {
            (true, true, _) => return Err(BootstrapError::ConflictingModes),
            (_, true, _) => Direction::Destroy,
            (true, false, _) | (false, false, true) => Direction::Provision,
            (false, false, false) => return Ok(Invocation::Usage),
        };

        let execution = if flags.dry_run {
            Execution::Simulate
        } else {
            Execution::Execute
        };

        Ok(Invocation::Run(RunMode {
            direction,
            execution,
            pre_confirmed: flags.yes,
        }))
    }
}
