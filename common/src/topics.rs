pub const TOPIC_RELAY_CMD: &str = "master/relay/cmd";
pub const TOPIC_STATUS: &str = "master/status";
