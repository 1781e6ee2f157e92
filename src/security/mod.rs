pub mod approval;
pub mod command;
pub mod defaults;
pub mod path;
pub mod rate_limit;
pub mod sanitizer;

pub use approval::{
    ApprovalBroker, ApprovalDecision, ApprovalManager, ApprovalPolicy, ApprovalRequest,
    AutoDenyBroker, CliApprovalBroker, Disposition,
};
pub use command::{CommandClass, CommandVerdict, ShellCommandValidator};
pub use path::PathSandbox;
pub use rate_limit::{RateLimitStatus, RateLimiter};
pub use sanitizer::InputSanitizer;
