/// Display defaults used by the event normalizer and gallery resolver.
/// These can be overridden through the `[display]` section of `config.toml`.

pub const DEFAULT_CURRENCY: &str = "GHS";
pub const FREE_PRICE_LABEL: &str = "Free";
pub const UNLIMITED_CAPACITY_LABEL: &str = "Unlimited";
pub const TBA_TIME_LABEL: &str = "TBA";
pub const NO_DESCRIPTION: &str = "No description available";

pub const PLACEHOLDER_IMAGE_URL: &str = "https://placehold.co/600x400?text=Community+Event";

/// Curated photos shown for past events that never had a gallery uploaded.
pub const DEFAULT_PAST_GALLERY: &[&str] = &[
    "https://res.cloudinary.com/community-events/image/upload/v1/gallery/default-crowd.jpg",
    "https://res.cloudinary.com/community-events/image/upload/v1/gallery/default-stage.jpg",
    "https://res.cloudinary.com/community-events/image/upload/v1/gallery/default-team.jpg",
    "https://res.cloudinary.com/community-events/image/upload/v1/gallery/default-venue.jpg",
];

// Registration limits (the form offers a 1..=10 dropdown)
pub const MIN_PARTICIPANTS: u32 = 1;
pub const MAX_PARTICIPANTS: u32 = 10;

pub const DEFAULT_STORE_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 30;
pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 64;
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_SQLITE_PATH: &str = "data/events.db";

/// Header carrying the identity asserted by the upstream identity provider.
pub const USER_ID_HEADER: &str = "x-user-id";

// Logging
pub const DEFAULT_LOG_DIR: &str = "logs";
pub const DEFAULT_LOG_FILE_PREFIX: &str = "community_events.log";
pub const DEFAULT_LOG_FILTER: &str = "community_events=info,tower_http=info";
