//! Protocol constants shared with peers running other implementations.

// =============================================================================
// LIMITS
// =============================================================================

/// Peers returned by one `list` response.
pub const MAX_PEER_LIST_BATCH_SIZE: usize = 100;
/// Peers accepted from one discovery response.
pub const MAX_PEER_DISCOVERY_RESPONSE_LENGTH: usize = 1_000;
/// Peers probed per discovery round.
pub const MAX_PEER_DISCOVERY_PROBE_SAMPLE_SIZE: usize = 100;
/// Serialized size cap for a single PeerInfo.
pub const DEFAULT_MAX_PEER_INFO_SIZE: usize = 20_480;

pub const DEFAULT_REPUTATION_SCORE: i32 = 100;
/// Penalty for a malformed packet or response. Enough to ban on its own.
pub const INVALID_PACKET_PENALTY: i32 = 100;

// =============================================================================
// TIMING (milliseconds)
// =============================================================================

pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 2_000;
pub const DEFAULT_ACK_TIMEOUT_MS: u64 = 2_000;
pub const DEFAULT_DISCOVERY_INTERVAL_MS: u64 = 30_000;
pub const DEFAULT_POPULATOR_INTERVAL_MS: u64 = 10_000;
pub const DEFAULT_PEER_BAN_TIME_MS: u64 = 86_400_000;

// =============================================================================
// CONNECTIONS
// =============================================================================

pub const DEFAULT_MAX_OUTBOUND_CONNECTIONS: usize = 20;
pub const DEFAULT_MAX_INBOUND_CONNECTIONS: usize = 100;
pub const DEFAULT_SEND_PEER_LIMIT: usize = 16;
pub const DEFAULT_NEW_PEERS_CAPACITY: usize = 4_096;
pub const DEFAULT_TRIED_PEERS_CAPACITY: usize = 1_024;

// =============================================================================
// PROCEDURES AND MESSAGE EVENTS
// =============================================================================

pub const PROCEDURE_STATUS: &str = "status";
pub const PROCEDURE_LIST: &str = "list";
pub const PROCEDURE_UPDATE_MYSELF: &str = "updateMyself";

pub const MESSAGE_POST_BLOCK: &str = "postBlock";
pub const MESSAGE_POST_TRANSACTIONS: &str = "postTransactions";
pub const MESSAGE_POST_SIGNATURES: &str = "postSignatures";

/// Wire tag of the generic message envelope.
pub const REMOTE_MESSAGE_EVENT: &str = "remote-message";

// =============================================================================
// COMPATIBILITY ERRORS
// =============================================================================

pub const NETWORK_MISMATCH_ERROR: &str = "Peer networkIdentifier did not match our own";
pub const PROTOCOL_VERSION_MISMATCH_ERROR: &str = "Peer protocol version did not match our own";
