//! The capability every environment handler implements

use crate::environment::Environment;
use crate::error::HandlerError;
use crate::worker::WorkerContext;
use farm_graph::Command;

/// Environment handler for one family of env keys
///
/// Handlers are pure with respect to their inputs: both operations return
/// a new value and leave the arguments untouched. The chain threads the
/// results from one handler into the next.
pub trait EnvHandler: Send + Sync + std::fmt::Debug {
    /// Handler name, used in logs and errors
    fn name(&self) -> &str;

    /// Key prefixes this handler claims in a [`HandlerRegistry`](crate::HandlerRegistry)
    fn prefixes(&self) -> Vec<String>;

    /// Apply this handler's `keys` to `env`
    ///
    /// # Errors
    /// [`HandlerError::Unresolved`] to be skipped, [`HandlerError::Fatal`]
    /// to abort the command.
    fn update_environment(
        &self,
        command: &Command,
        env: &Environment,
        keys: &[String],
        worker: &WorkerContext,
    ) -> Result<Environment, HandlerError>;

    /// Rewrite the argument vector once the environment is complete
    ///
    /// The default leaves `argv` unchanged.
    ///
    /// # Errors
    /// Same classification as [`EnvHandler::update_environment`].
    fn remap_arguments(
        &self,
        command: &Command,
        argv: &[String],
        env: &Environment,
        worker: &WorkerContext,
    ) -> Result<Vec<String>, HandlerError> {
        let _ = (command, env, worker);
        Ok(argv.to_vec())
    }
}
