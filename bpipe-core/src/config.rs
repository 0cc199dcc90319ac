/// The default local service address
pub const DEFAULT_SERVICE_ADDRESS: &str = "127.0.0.1:1080";

/// The default preset list for both sides
pub const DEFAULT_PRESETS: &str = "ss-base,erp";

pub const SERVICE_CONNECTION_THRESHOLD: usize = 1024;

/// The timeout for resolving ip address
pub const DNS_RESOLVE_TIMEOUT_SECONDS: u64 = 10;

/// How long a resolved ip address stays in the dns cache
pub const DEFAULT_DNS_EXPIRE_SECONDS: u64 = 3600;

/// Max number of hostnames kept in the dns cache
pub const DNS_CACHE_CAPACITY: usize = 4096;

/// The timeout for tcp connect
pub const TCP_CONNECT_TIMEOUT_SECONDS: u64 = 10;

/// The read or write timeout for each connection
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 600;

/// Receive buffer size for each connection
pub const RECV_BUFFER_SIZE: usize = 64 * 1024;

/// Stop reading the opposite side once this many bytes are queued for writing
pub const MAX_BUFFERED_SIZE: usize = 1024 * 1024; // 1MB

/// Max number of pending reads between a socket pump and its session
pub const READ_CHANNEL_CAPACITY: usize = 32;

/// Max size of an incomplete HTTP request head kept by the detector
pub const MAX_HTTP_HEAD_SIZE: usize = 8 * 1024;
