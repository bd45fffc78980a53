//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module    | Commands handled   |
//! |-----------|--------------------|
//! | `init`    | `Init`             |
//! | `run`     | `Run`              |
//! | `status`  | `Status`, `List`   |
//! | `archive` | `Archive`          |
//! | `config`  | `Config`           |

pub mod archive;
pub mod config;
pub mod init;
pub mod run;
pub mod status;

pub use archive::cmd_archive;
pub use config::cmd_config;
pub use init::cmd_init;
pub use run::cmd_run;
pub use status::{cmd_list, cmd_status};
