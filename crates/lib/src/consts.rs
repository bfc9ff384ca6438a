/// Version pinned into every encoded ID.
pub const ID_FORMAT_VERSION: u32 = 1;

/// Permissions for files created without an explicit mode.
pub const DEFAULT_FILE_MODE: u32 = 0o644;

/// Permissions for directories created without an explicit mode.
pub const DEFAULT_DIR_MODE: u32 = 0o755;

/// Default build definition path for `dockerBuild`.
pub const DEFAULT_DOCKERFILE: &str = "Dockerfile";

/// Length of the digest prefix used in service hostnames.
pub const SERVICE_HOSTNAME_DIGEST_LEN: usize = 12;

/// Environment variable overriding the default target platform.
pub const PLATFORM_ENV: &str = "GRAFT_PLATFORM";

/// Environment variable overriding the base directory for relative exports.
pub const WORKDIR_ENV: &str = "GRAFT_WORKDIR";
