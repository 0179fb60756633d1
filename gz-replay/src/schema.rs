//! Replay tensor schema and ids.

/// Protocol version for replay shards.
pub const PROTOCOL_VERSION: u32 = 1;

/// Every board point in row-major order from the top-left corner, then pass.
pub const ACTION_SPACE_ID: &str = "go_points_then_pass_v1";

/// Area scoring, simple ko, suicide illegal, two passes end the game.
pub const RULESET_ID: &str = "tromp_taylor_simple_ko_v1";

/// Tensor names inside safetensors.
pub const T_PI: &str = "pi";
pub const T_VALUE: &str = "value";
pub const T_Z: &str = "z";
