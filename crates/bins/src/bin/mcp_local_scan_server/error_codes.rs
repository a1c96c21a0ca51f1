// exit codes of the server process
pub const ERROR_GENERAL: i32 = 1;
pub const ERROR_INVALID_ARGUMENT: i32 = 2;
pub const ERROR_BAD_ADDRESS: i32 = 3;
// the keep-alive thread lost its channel to the rocket
pub const ERROR_CHANNEL_SENDER_DROPPED: i32 = 4;
