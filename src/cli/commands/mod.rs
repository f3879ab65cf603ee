//! One module per subcommand.

pub mod add;
#[cfg(feature = "audit-log")]
pub mod audit_cmd;
pub mod backup;
pub mod code;
pub mod completions;
pub mod export;
pub mod import_cmd;
pub mod init;
pub mod keyfile;
pub mod list;
pub mod passwd;
pub mod remove;
pub mod rename;
pub mod restore;
pub mod update;
pub mod uri;
