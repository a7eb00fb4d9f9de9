pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const BINARY_NAME: &str = env!("CARGO_BIN_NAME");
/// Client key used when `--key` is not given
pub const DEFAULT_CLIENT_KEY: &str = "cli";
