//! Run a command or script against targets while forwarding environment
//! variables supplied out-of-band through `BOLT_ENV_VARS`.
//!
//! The payload travels to the execution primitive as the concealed `_env_vars`
//! parameter and is never interpolated into command lines, scripts or logs.

pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod execution;
pub mod printer;
pub mod secrets;

pub use dispatch::{Dispatcher, InvocationRequest, Mode, ValidationError};
pub use error::Error;
pub use execution::{ExecutionError, ExecutionResult, Executor, Params, TargetResult, CONCEALED_PARAM};
pub use secrets::{EnvParseError, EnvSecretProvider, SecretProvider, SecureEnvMap, StaticSecretProvider, ENV_VARS_VAR};
