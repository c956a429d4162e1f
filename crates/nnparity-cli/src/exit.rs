// Exit codes for CI triage
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_VERDICT_FAIL: i32 = 1;
pub const EXIT_FATAL: i32 = 2;
