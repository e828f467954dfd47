//! Host platform utility functions

use std::env;
use std::path::PathBuf;

/// Name of the environment variable pointing at the software root.
///
/// Parameter files are found in `$AUV_TRAJ_SW_ROOT/params` and sessions are
/// created beneath the root.
pub const SW_ROOT_ENV_VAR: &str = "AUV_TRAJ_SW_ROOT";

/// Get the software root directory from the environment.
pub fn get_sw_root() -> Result<PathBuf, env::VarError> {
    env::var(SW_ROOT_ENV_VAR).map(PathBuf::from)
}

/// Retrieve uname information.
pub fn get_uname() -> std::io::Result<uname::Info> {
    uname::uname()
}

/// Node name of the host machine, or `"unknown"` if it can't be determined.
pub fn get_hostname() -> String {
    get_uname()
        .map(|info| info.nodename)
        .unwrap_or_else(|_| String::from("unknown"))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_hostname() {
        let info = get_uname().unwrap();
        assert!(!info.sysname.is_empty());
        assert_eq!(get_hostname(), info.nodename);
    }
}
