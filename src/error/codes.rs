/// Error code registry for the generation pipeline
///
/// Error codes are organized by category:
/// - 1000-1999: Specification errors
/// - 2000-2999: Content generation errors
/// - 3000-3999: Quality validator errors
/// - 4000-4999: Budget errors
/// - 5000-5999: Cancellation errors
/// - 6000-6999: Collaborator errors
/// - 7000-7999: Persistence errors
/// - 8000-8999: Configuration errors
/// - 9000-9999: Orchestration errors
pub struct ErrorCode;

impl ErrorCode {
    // Specification errors (1000-1999)
    pub const SPEC_PARSE: u16 = 1001;
    pub const SPEC_MISSING_FIELD: u16 = 1002;
    pub const SPEC_INVALID_ID: u16 = 1003;
    pub const SPEC_STAGE_COUNT: u16 = 1004;
    pub const SPEC_VOCABULARY: u16 = 1005;
    pub const SPEC_DUPLICATE_ID: u16 = 1006;
    pub const SPEC_INVALID_VALUE: u16 = 1007;

    // Content generation errors (2000-2999)
    pub const CONTENT_GENERATION: u16 = 2001;
    pub const CONTENT_STRUCTURAL: u16 = 2002;

    // Quality validator errors (3000-3999)
    pub const VALIDATOR_INFRASTRUCTURE: u16 = 3001;
    pub const VALIDATOR_TIMEOUT: u16 = 3002;

    // Budget errors (4000-4999)
    pub const BUDGET_EXCEEDED: u16 = 4001;

    // Cancellation errors (5000-5999)
    pub const CANCELLED: u16 = 5001;
    pub const REQUEST_TIMEOUT: u16 = 5002;

    // Collaborator errors (6000-6999)
    pub const COLLABORATOR_TRANSIENT: u16 = 6001;
    pub const COLLABORATOR_PERMANENT: u16 = 6002;
    pub const COLLABORATOR_TIMEOUT: u16 = 6003;

    // Persistence errors (7000-7999)
    pub const PERSISTENCE_GENERIC: u16 = 7000;
    pub const PERSISTENCE_IO: u16 = 7001;
    pub const PERSISTENCE_SERIALIZATION: u16 = 7002;

    // Configuration errors (8000-8999)
    pub const CONFIG_GENERIC: u16 = 8000;
    pub const CONFIG_NOT_FOUND: u16 = 8001;
    pub const CONFIG_PARSE: u16 = 8002;
    pub const CONFIG_INVALID_VALUE: u16 = 8003;

    // Orchestration errors (9000-9999)
    pub const ILLEGAL_TRANSITION: u16 = 9001;
}

/// Get a human-readable description for an error code
pub fn describe_error_code(code: u16) -> &'static str {
    match code {
        1001 => "Generated specification could not be parsed",
        1002 => "Specification is missing a required field",
        1003 => "Specification id is not a path-safe slug",
        1004 => "Specification has the wrong number of stages",
        1005 => "Specification uses a value outside the closed vocabulary",
        1006 => "Specification id collides with a prior specification",
        1007 => "Specification field has an invalid value",

        2001 => "Content generator failed",
        2002 => "Generated content failed the structural check",

        3001 => "Validation tooling unavailable",
        3002 => "Validation tooling timed out",

        4001 => "Cost budget exhausted",

        5001 => "Generation request cancelled",
        5002 => "Generation request timed out",

        6001 => "Transient collaborator failure",
        6002 => "Permanent collaborator failure",
        6003 => "Collaborator call timed out",

        7000 => "Generic persistence error",
        7001 => "Persistence I/O error",
        7002 => "Persistence serialization error",

        8000 => "Generic configuration error",
        8001 => "Configuration file not found",
        8002 => "Configuration file could not be parsed",
        8003 => "Invalid value in configuration",

        9001 => "Orchestrator attempted an illegal state transition",

        _ => "Unknown error code",
    }
}
