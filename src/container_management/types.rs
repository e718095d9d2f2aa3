use crate::configuration::Config;

/// Hard resource ceiling applied to every sandbox.
///
/// Untrusted code runs under all of these at once; none is optional. The
/// values mirror the configuration and default to 200 MiB of memory, half a
/// core, 32 processes and a 32 MiB writable scratch mount.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceProfile {
    pub memory_limit_mb: u64,
    pub cpu_limit: f64,
    pub pids_limit: u32,
    pub scratch_tmpfs_mb: u64,
}

impl Default for ResourceProfile {
    fn default() -> Self {
        Self {
            memory_limit_mb: 200,
            cpu_limit: 0.5,
            pids_limit: 32,
            scratch_tmpfs_mb: 32,
        }
    }
}

impl ResourceProfile {
    pub fn from_config(config: &Config) -> Self {
        Self {
            memory_limit_mb: config.memory_limit_mb,
            cpu_limit: config.cpu_limit,
            pids_limit: config.pids_limit,
            scratch_tmpfs_mb: config.scratch_tmpfs_mb,
        }
    }
}
